use esml::{parse, parse_lenient, render, to_markup, validate, Block, Email, StyleVariant};
use pretty_assertions::assert_eq;

// ─── Core scenarios ──────────────────────────────────────────────────────────

#[test]
fn single_text_block_document() {
    let email = parse("<EMAIL><ROW><COLUMN><TEXT>Hello</TEXT></COLUMN></ROW></EMAIL>").unwrap();

    assert_eq!(email.rows.len(), 1);
    let row = &email.rows[0];
    assert_eq!(row.columns.len(), 1);
    assert_eq!(row.columns[0].span, 12);
    match &row.columns[0].blocks[0] {
        Block::Text(text) => assert_eq!(text.content, "Hello"),
        other => panic!("expected text block, got {:?}", other),
    }
}

#[test]
fn brace_dialect_half_width_columns() {
    let email = parse(
        "ROW { COLUMN width=50% { TEXT content=\"L\" } COLUMN width=50% { TEXT content=\"R\" } }",
    )
    .unwrap();

    let row = &email.rows[0];
    assert_eq!(row.columns.len(), 2);
    assert_eq!(row.columns[0].span, 6);
    assert_eq!(row.columns[1].span, 6);
}

#[test]
fn bare_blocks_get_one_implicit_column() {
    let email = parse(
        "<EMAIL><ROW><HEADING level=h2>Title</HEADING><TEXT>Body</TEXT>\
         <BUTTON href=\"https://example.com\">Go</BUTTON></ROW></EMAIL>",
    )
    .unwrap();

    let row = &email.rows[0];
    assert_eq!(row.columns.len(), 1);
    assert_eq!(row.columns[0].span, 12);
    assert_eq!(row.columns[0].blocks.len(), 3);
    assert!(matches!(row.columns[0].blocks[0], Block::Heading(_)));
    assert!(matches!(row.columns[0].blocks[1], Block::Text(_)));
    assert!(matches!(row.columns[0].blocks[2], Block::Button(_)));
}

#[test]
fn outline_preset_merges_under_explicit_button_attributes() {
    let email = parse(
        "<EMAIL styleVariant=\"outline\"><ROW>\
         <BUTTON href=\"https://example.com\" color=\"#00ff00\">Go</BUTTON>\
         </ROW></EMAIL>",
    )
    .unwrap();

    let row = &email.rows[0];
    let column = &row.columns[0];
    let button = &column.blocks[0];
    let resolved = esml::cascade::resolve(button, column, row, &email);

    // Outline preset border fields are present...
    assert_eq!(resolved.get("border-width").map(String::as_str), Some("1px"));
    assert_eq!(resolved.get("border-style").map(String::as_str), Some("solid"));
    assert_eq!(resolved.get("border-color").map(String::as_str), Some("#e0e0e0"));
    // ...and the button's own explicit attribute wins over every preset.
    assert_eq!(resolved.get("color").map(String::as_str), Some("#00ff00"));
    // Unset background falls back to the button template, not the canvas.
    assert_eq!(
        resolved.get("background-color").map(String::as_str),
        Some("#2563eb")
    );
}

#[test]
fn script_tags_never_survive_rendering() {
    let email =
        parse("<EMAIL><ROW><TEXT><script>alert(1)</script>Hi</TEXT></ROW></EMAIL>").unwrap();
    let html = render(&email);
    assert!(!html.contains("<script"));
    assert!(html.contains("Hi"));
}

// ─── Dialect equivalence ─────────────────────────────────────────────────────

#[test]
fn both_dialects_produce_identical_trees() {
    let xml = parse(
        "<EMAIL preview=\"Hi\">\
           <ROW type=\"header\">\
             <COLUMN width=12><HEADING level=h1 align=center>Shop</HEADING></COLUMN>\
           </ROW>\
           <ROW>\
             <COLUMN width=6><TEXT content=\"Left\"/></COLUMN>\
             <COLUMN width=6><TEXT content=\"Right\"/></COLUMN>\
           </ROW>\
         </EMAIL>",
    )
    .unwrap();

    let brace = parse(
        "EMAIL preview=\"Hi\" {\
           ROW type=header {\
             COLUMN width=12 { HEADING level=h1 align=center content=\"Shop\" }\
           }\
           ROW {\
             COLUMN width=6 { TEXT content=\"Left\" }\
             COLUMN width=6 { TEXT content=\"Right\" }\
           }\
         }",
    )
    .unwrap();

    assert_eq!(xml, brace);
}

// ─── Round-trips ─────────────────────────────────────────────────────────────

fn rich_document() -> Email {
    parse(
        "<EMAIL preview=\"June deals\" styleVariant=\"floating\" bgColor=\"#eeeeee\">\
           <ROW type=\"header\"><HEADING level=h1>Shop</HEADING></ROW>\
           <ROW columnSpacing=16>\
             <COLUMN width=4><IMAGE src=\"https://cdn.example.com/a.png\" width=160 alt=\"A\"/></COLUMN>\
             <COLUMN width=8><TEXT>Our <b>best</b> lineup</TEXT>\
               <BUTTON href=\"https://example.com/buy\">Buy</BUTTON></COLUMN>\
           </ROW>\
           <ROW type=\"cart\"><CART_ITEM image=\"https://cdn.example.com/i.png\" name=\"Mug\" price=\"$18\"/></ROW>\
           <ROW><SURVEY kind=\"rating\" question=\"Rate us\">\
             <CHOICE label=\"1\" url=\"https://example.com/r/1\"/>\
             <CHOICE label=\"5\" url=\"https://example.com/r/5\"/>\
           </SURVEY></ROW>\
           <ROW type=\"footer\">\
             <SOCIALS align=center><SOCIAL platform=\"instagram\" url=\"https://ig.example.com\"/></SOCIALS>\
             <LINK href=\"https://example.com/unsub\" content=\"Unsubscribe\"/>\
           </ROW>\
         </EMAIL>",
    )
    .unwrap()
}

#[test]
fn json_roundtrip_is_exact() {
    let email = rich_document();
    let json = serde_json::to_string(&email).unwrap();
    let back: Email = serde_json::from_str(&json).unwrap();
    assert_eq!(email, back);
}

#[test]
fn markup_roundtrip_is_exact() {
    let email = rich_document();
    let markup = to_markup(&email);
    let back = parse(&markup).unwrap();
    assert_eq!(email, back);
}

#[test]
fn block_json_carries_a_type_tag() {
    let email = parse("<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>").unwrap();
    let json = serde_json::to_value(&email).unwrap();
    assert_eq!(
        json["rows"][0]["columns"][0]["blocks"][0]["type"],
        serde_json::Value::String("text".to_string())
    );
}

// ─── Invariants ──────────────────────────────────────────────────────────────

#[test]
fn every_mapped_row_satisfies_the_grid_invariant() {
    let sources = [
        "<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>",
        "<EMAIL><ROW><COLUMN><TEXT>a</TEXT></COLUMN><COLUMN><TEXT>b</TEXT></COLUMN>\
         <COLUMN><TEXT>c</TEXT></COLUMN></ROW></EMAIL>",
        "ROW { COLUMN width=25% { TEXT content=a } COLUMN width=75% { TEXT content=b } }",
        "<EMAIL><ROW><COLUMN width=3><TEXT>a</TEXT></COLUMN><TEXT>mid</TEXT>\
         <COLUMN width=3><TEXT>b</TEXT></COLUMN></ROW></EMAIL>",
    ];
    for src in sources {
        let email = parse(src).unwrap();
        for row in &email.rows {
            assert_eq!(row.span_sum(), 12, "grid invariant violated for {}", src);
        }
        assert!(validate(&email).is_ok());
    }
}

#[test]
fn render_twice_is_byte_identical() {
    let email = rich_document();
    assert_eq!(render(&email), render(&email));

    // Parsing the same source twice renders identically too.
    let again = rich_document();
    assert_eq!(render(&email), render(&again));
}

// ─── Lenient parsing (assistant stream) ──────────────────────────────────────

#[test]
fn truncated_stream_degrades_gracefully() {
    let (email, repairs) = parse_lenient(
        "<EMAIL preview=\"Deals\"><ROW type=\"hero\"><HEADING level=h1>Half written",
    )
    .unwrap();

    assert!(!repairs.is_empty());
    assert_eq!(email.preview.as_deref(), Some("Deals"));
    match &email.rows[0].columns[0].blocks[0] {
        Block::Heading(h) => assert_eq!(h.content, "Half written"),
        other => panic!("expected heading, got {:?}", other),
    }
}

#[test]
fn strict_parse_rejects_what_lenient_repairs() {
    let src = "<EMAIL><ROW><TEXT>cut off";
    assert!(parse(src).is_err());
    assert!(parse_lenient(src).is_ok());
}

// ─── Defaults & variants ─────────────────────────────────────────────────────

#[test]
fn documented_defaults() {
    let email = parse("<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>").unwrap();
    assert_eq!(email.width, "600");
    assert_eq!(email.color, "#000000");
    assert_eq!(email.style_variant, StyleVariant::Default);
    assert_eq!(email.font_family, "Arial, Helvetica, sans-serif");
}

#[test]
fn unknown_style_variant_is_preserved_not_dropped() {
    let email = parse("<EMAIL styleVariant=\"neon\"><ROW><TEXT>x</TEXT></ROW></EMAIL>").unwrap();
    assert_eq!(email.style_variant, StyleVariant::Default);
    assert_eq!(email.extra.get("styleVariant").map(String::as_str), Some("neon"));
}
