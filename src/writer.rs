//! Serializer from the document tree back to XML-dialect markup.
//!
//! This is the inverse of the mapper: `to_document(parse_markup(
//! to_markup(email)))` reproduces the same tree, ids included. The editor
//! uses it to hand the current document back to the assistant as context,
//! and the round-trip property keeps the markup and JSON forms honest
//! against each other.

use std::collections::BTreeMap;

use crate::blocks::{Block, Link, RawBlock};
use crate::document::{Column, Email, Row, RowKind, StyleVariant};
use crate::style::{Border, Padding};

/// Serialize a document to XML-dialect ESML source.
pub fn to_markup(email: &Email) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("<EMAIL");
    attr(&mut out, "id", &email.id);
    opt_attr(&mut out, "name", &email.name);
    opt_attr(&mut out, "preview", &email.preview);
    attr(&mut out, "fontFamily", &email.font_family);
    attr(&mut out, "width", &email.width);
    attr(&mut out, "color", &email.color);
    attr(&mut out, "bgColor", &email.background_color);
    opt_attr(&mut out, "backgroundImage", &email.background_image);
    opt_attr(&mut out, "backgroundPosition", &email.background_position);
    opt_attr(&mut out, "backgroundSize", &email.background_size);
    opt_attr(&mut out, "backgroundRepeat", &email.background_repeat);
    if email.style_variant != StyleVariant::Default {
        attr(&mut out, "styleVariant", email.style_variant.as_str());
    }
    extra_attrs(&mut out, &email.extra);
    out.push_str(">\n");

    for row in &email.rows {
        write_row(&mut out, row, 1);
    }

    out.push_str("</EMAIL>\n");
    out
}

fn write_row(out: &mut String, row: &Row, depth: usize) {
    indent(out, depth);
    out.push_str("<ROW");
    attr(out, "id", &row.id);
    if row.kind != RowKind::Plain {
        attr(out, "type", row.kind.as_str());
    }
    padding_attrs(out, &row.padding);
    opt_attr(out, "bgColor", &row.background_color);
    border_attrs(out, &row.border);
    if let Some(align) = row.align {
        attr(out, "align", align.as_css());
    }
    if let Some(stack) = row.stack_on_mobile {
        attr(out, "stackOnMobile", if stack { "true" } else { "false" });
    }
    opt_attr(out, "columnSpacing", &row.column_spacing);
    opt_attr(out, "maxWidth", &row.max_width);
    if let Some(align) = row.container_align {
        attr(out, "containerAlign", align.as_css());
    }
    extra_attrs(out, &row.extra);
    out.push_str(">\n");

    for column in &row.columns {
        write_column(out, column, depth + 1);
    }

    indent(out, depth);
    out.push_str("</ROW>\n");
}

fn write_column(out: &mut String, column: &Column, depth: usize) {
    indent(out, depth);
    out.push_str("<COLUMN");
    attr(out, "id", &column.id);
    attr(out, "width", &column.span.to_string());
    padding_attrs(out, &column.padding);
    if let Some(align) = column.align {
        attr(out, "align", align.as_css());
    }
    if let Some(valign) = column.vertical_align {
        attr(out, "verticalAlign", valign.as_css());
    }
    border_attrs(out, &column.border);
    extra_attrs(out, &column.extra);
    out.push_str(">\n");

    for block in &column.blocks {
        write_block(out, block, depth + 1);
    }

    indent(out, depth);
    out.push_str("</COLUMN>\n");
}

fn write_block(out: &mut String, block: &Block, depth: usize) {
    indent(out, depth);
    match block {
        Block::Heading(b) => {
            out.push_str("<HEADING");
            attr(out, "id", &b.id);
            attr(out, "level", b.level.as_tag());
            opt_attr(out, "color", &b.color);
            opt_attr(out, "fontSize", &b.font_size);
            opt_attr(out, "fontWeight", &b.font_weight);
            if let Some(align) = b.text_align {
                attr(out, "align", align.as_css());
            }
            opt_attr(out, "lineHeight", &b.line_height);
            padding_attrs(out, &b.padding);
            extra_attrs(out, &b.extra);
            close_with_content(out, "HEADING", &b.content);
        }
        Block::Text(b) => {
            out.push_str("<TEXT");
            attr(out, "id", &b.id);
            opt_attr(out, "color", &b.color);
            opt_attr(out, "fontSize", &b.font_size);
            opt_attr(out, "fontWeight", &b.font_weight);
            if let Some(align) = b.text_align {
                attr(out, "align", align.as_css());
            }
            opt_attr(out, "lineHeight", &b.line_height);
            padding_attrs(out, &b.padding);
            extra_attrs(out, &b.extra);
            close_with_content(out, "TEXT", &b.content);
        }
        Block::Button(b) => {
            out.push_str("<BUTTON");
            attr(out, "id", &b.id);
            attr(out, "href", &b.href);
            opt_attr(out, "bgColor", &b.background_color);
            opt_attr(out, "color", &b.color);
            opt_attr(out, "fontSize", &b.font_size);
            if let Some(align) = b.align {
                attr(out, "align", align.as_css());
            }
            border_attrs(out, &b.border);
            padding_attrs(out, &b.padding);
            extra_attrs(out, &b.extra);
            close_with_content(out, "BUTTON", &b.content);
        }
        Block::Image(b) => {
            out.push_str("<IMAGE");
            attr(out, "id", &b.id);
            attr(out, "src", &b.src);
            opt_attr(out, "alt", &b.alt);
            opt_attr(out, "width", &b.width);
            opt_attr(out, "height", &b.height);
            opt_attr(out, "borderRadius", &b.border_radius);
            if let Some(align) = b.align {
                attr(out, "align", align.as_css());
            }
            extra_attrs(out, &b.extra);
            out.push_str("/>\n");
        }
        Block::Divider(b) => {
            out.push_str("<DIVIDER");
            attr(out, "id", &b.id);
            opt_attr(out, "borderWidth", &b.border_width);
            opt_attr(out, "borderColor", &b.border_color);
            if let Some(style) = b.border_style {
                attr(out, "borderStyle", style.as_css());
            }
            padding_attrs(out, &b.padding);
            extra_attrs(out, &b.extra);
            out.push_str("/>\n");
        }
        Block::Spacer(b) => {
            out.push_str("<SPACER");
            attr(out, "id", &b.id);
            attr(out, "height", &b.height);
            extra_attrs(out, &b.extra);
            out.push_str("/>\n");
        }
        Block::Link(b) => write_link(out, b, depth),
        Block::List(b) => {
            out.push_str("<LIST");
            attr(out, "id", &b.id);
            attr(
                out,
                "kind",
                match b.kind {
                    crate::blocks::ListKind::Unordered => "unordered",
                    crate::blocks::ListKind::Ordered => "ordered",
                },
            );
            opt_attr(out, "color", &b.color);
            opt_attr(out, "fontSize", &b.font_size);
            padding_attrs(out, &b.padding);
            extra_attrs(out, &b.extra);
            out.push_str(">\n");
            for item in &b.items {
                indent(out, depth + 1);
                out.push_str("<ITEM");
                close_with_content(out, "ITEM", item);
            }
            indent(out, depth);
            out.push_str("</LIST>\n");
        }
        Block::Table(b) => {
            out.push_str("<TABLE");
            attr(out, "id", &b.id);
            if b.has_header {
                attr(out, "header", "true");
            }
            opt_attr(out, "borderColor", &b.border_color);
            padding_attrs(out, &b.padding);
            extra_attrs(out, &b.extra);
            out.push_str(">\n");
            for cells in &b.rows {
                indent(out, depth + 1);
                out.push_str("<TR>\n");
                for cell in cells {
                    indent(out, depth + 2);
                    out.push_str("<CELL");
                    close_with_content(out, "CELL", cell);
                }
                indent(out, depth + 1);
                out.push_str("</TR>\n");
            }
            indent(out, depth);
            out.push_str("</TABLE>\n");
        }
        Block::Socials(b) => {
            out.push_str("<SOCIALS");
            attr(out, "id", &b.id);
            if let Some(align) = b.align {
                attr(out, "align", align.as_css());
            }
            opt_attr(out, "iconSize", &b.icon_size);
            extra_attrs(out, &b.extra);
            out.push_str(">\n");
            for link in &b.links {
                indent(out, depth + 1);
                out.push_str("<SOCIAL");
                attr(out, "platform", &link.platform);
                attr(out, "url", &link.url);
                opt_attr(out, "icon", &link.icon);
                out.push_str("/>\n");
            }
            indent(out, depth);
            out.push_str("</SOCIALS>\n");
        }
        Block::CartItem(b) => {
            out.push_str("<CART_ITEM");
            attr(out, "id", &b.id);
            attr(out, "image", &b.image);
            attr(out, "name", &b.name);
            opt_attr(out, "description", &b.description);
            opt_attr(out, "quantity", &b.quantity);
            opt_attr(out, "price", &b.price);
            extra_attrs(out, &b.extra);
            out.push_str("/>\n");
        }
        Block::Survey(b) => {
            out.push_str("<SURVEY");
            attr(out, "id", &b.id);
            attr(
                out,
                "kind",
                match b.kind {
                    crate::blocks::SurveyKind::YesNo => "yes-no",
                    crate::blocks::SurveyKind::Rating => "rating",
                },
            );
            attr(out, "question", &b.question);
            extra_attrs(out, &b.extra);
            out.push_str(">\n");
            for choice in &b.choices {
                indent(out, depth + 1);
                out.push_str("<CHOICE");
                attr(out, "label", &choice.label);
                attr(out, "url", &choice.url);
                out.push_str("/>\n");
            }
            indent(out, depth);
            out.push_str("</SURVEY>\n");
        }
        Block::Raw(b) => write_raw(out, b),
    }
}

fn write_link(out: &mut String, link: &Link, depth: usize) {
    out.push_str("<LINK");
    attr(out, "id", &link.id);
    attr(out, "href", &link.href);
    opt_attr(out, "color", &link.color);
    if let Some(underline) = link.underline {
        attr(out, "underline", if underline { "true" } else { "false" });
    }
    extra_attrs(out, &link.extra);
    if link.children.is_empty() {
        match &link.content {
            Some(content) => close_with_content(out, "LINK", content),
            None => out.push_str("/>\n"),
        }
    } else {
        opt_attr(out, "content", &link.content);
        out.push_str(">\n");
        for child in &link.children {
            write_block(out, child, depth + 1);
        }
        indent(out, depth);
        out.push_str("</LINK>\n");
    }
}

fn write_raw(out: &mut String, raw: &RawBlock) {
    out.push('<');
    out.push_str(&raw.name);
    attr(out, "id", &raw.id);
    for (key, value) in &raw.attributes {
        attr(out, key, value);
    }
    match &raw.content {
        Some(content) => {
            out.push('>');
            out.push_str(content);
            out.push_str("</");
            out.push_str(&raw.name);
            out.push_str(">\n");
        }
        None => out.push_str("/>\n"),
    }
}

// ─── Attribute & content helpers ─────────────────────────────────────────────

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn opt_attr(out: &mut String, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        attr(out, key, v);
    }
}

fn extra_attrs(out: &mut String, extra: &BTreeMap<String, String>) {
    for (key, value) in extra {
        attr(out, key, value);
    }
}

fn padding_attrs(out: &mut String, padding: &Padding) {
    opt_attr(out, "paddingTop", &padding.top);
    opt_attr(out, "paddingRight", &padding.right);
    opt_attr(out, "paddingBottom", &padding.bottom);
    opt_attr(out, "paddingLeft", &padding.left);
}

fn border_attrs(out: &mut String, border: &Border) {
    opt_attr(out, "borderWidth", &border.width);
    if let Some(style) = border.style {
        attr(out, "borderStyle", style.as_css());
    }
    opt_attr(out, "borderColor", &border.color);
    opt_attr(out, "borderRadius", &border.radius);
}

/// Close an opened tag, placing content in the body when that re-parses
/// cleanly and in a quoted `content` attribute when it would be taken for
/// nested markup (a `<` followed by an uppercase letter).
fn close_with_content(out: &mut String, tag: &str, content: &str) {
    if content.is_empty() {
        out.push_str("/>\n");
        return;
    }
    if body_safe(content) {
        out.push('>');
        out.push_str(content);
        out.push_str("</");
        out.push_str(tag);
        out.push_str(">\n");
    } else {
        attr(out, "content", content);
        out.push_str("/>\n");
    }
}

fn body_safe(content: &str) -> bool {
    let bytes = content.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'<' {
            match bytes.get(i + 1).copied() {
                Some(c) if c.is_ascii_uppercase() => return false,
                Some(b'/') if bytes.get(i + 2).is_some_and(|c| c.is_ascii_uppercase()) => {
                    return false
                }
                Some(b'!') => return false,
                _ => {}
            }
        }
    }
    // Leading/trailing whitespace would be trimmed on re-parse.
    content.trim() == content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::parse_markup;
    use crate::mapper::to_document;
    use pretty_assertions::assert_eq;

    fn roundtrip(src: &str) -> (Email, Email) {
        let first = to_document(&parse_markup(src).unwrap()).unwrap();
        let markup = to_markup(&first);
        let second = to_document(&parse_markup(&markup).unwrap()).unwrap();
        (first, second)
    }

    #[test]
    fn markup_roundtrip_simple() {
        let (first, second) =
            roundtrip("<EMAIL><ROW><COLUMN><TEXT>Hello</TEXT></COLUMN></ROW></EMAIL>");
        assert_eq!(first, second);
    }

    #[test]
    fn markup_roundtrip_rich_document() {
        let src = "<EMAIL preview=\"June deals\" styleVariant=\"outline\" bgColor=\"#eeeeee\">\
          <ROW type=\"header\"><HEADING level=h1 align=center>Shop</HEADING></ROW>\
          <ROW><COLUMN width=6 verticalAlign=middle><IMAGE src=\"https://cdn.example.com/p.png\" width=280 alt=\"Product\"/></COLUMN>\
          <COLUMN width=6 padding=16><TEXT fontSize=14>Our <b>best</b> yet</TEXT>\
          <BUTTON href=\"https://example.com/buy\" bgColor=\"#111111\">Buy now</BUTTON></COLUMN></ROW>\
          <ROW type=\"cart\"><CART_ITEM image=\"https://cdn.example.com/i.png\" name=\"Mug\" quantity=\"2\" price=\"$18.00\"/></ROW>\
          <ROW><LIST kind=ordered><ITEM>First</ITEM><ITEM>Second</ITEM></LIST>\
          <TABLE header=true><TR><CELL>Item</CELL><CELL>Price</CELL></TR><TR><CELL>Mug</CELL><CELL>$18</CELL></TR></TABLE></ROW>\
          <ROW><SURVEY kind=\"yes-no\" question=\"Was this useful?\" yesUrl=\"https://example.com/y\" noUrl=\"https://example.com/n\"/></ROW>\
          <ROW type=\"footer\"><SOCIALS><SOCIAL platform=\"instagram\" url=\"https://ig.example.com\"/></SOCIALS>\
          <TEXT>Unsubscribe anytime</TEXT></ROW></EMAIL>";
        let (first, second) = roundtrip(src);
        assert_eq!(first, second);
    }

    #[test]
    fn markup_roundtrip_preserves_extras_and_raw() {
        let src = "<EMAIL futureKnob=\"7\"><ROW mystery=\"yes\"><COUNTDOWN until=\"2026-01-01\"/>\
                   <TEXT>x</TEXT></ROW></EMAIL>";
        let (first, second) = roundtrip(src);
        assert_eq!(first, second);
    }

    #[test]
    fn unsafe_body_content_moves_to_attribute() {
        let (first, second) = roundtrip("<EMAIL><ROW><TEXT content=\"see <STRONG>\"/></ROW></EMAIL>");
        assert_eq!(first, second);
        let markup = to_markup(&first);
        assert!(markup.contains("content=\"see <STRONG>\""));
    }

    #[test]
    fn quotes_in_attributes_are_escaped() {
        let (first, second) =
            roundtrip("<EMAIL name=\"Launch \\\"v2\\\"\"><ROW><TEXT>x</TEXT></ROW></EMAIL>");
        assert_eq!(first, second);
    }
}
