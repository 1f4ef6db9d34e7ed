//! Attribute resolution.
//!
//! Styling is decided ahead of render by one ordered merge, not by ad hoc
//! overrides scattered through the renderer. [`resolve`] flattens the
//! cascade for a block into a plain attribute map; [`resolve_row`] does the
//! same for a row's own box. Both are pure: same inputs, same output.
//!
//! Merge order, lowest to highest:
//!
//! 1. hard-coded fallback constants
//! 2. email-level defaults (`color`, `fontFamily`)
//! 3. style-variant preset, keyed `(styleVariant, rowKind)`
//! 4. row-kind preset (`footer` → muted small text, `hero` → centered, ...)
//! 5. block-type template constants (a button's label color is the
//!    template's, not the document text color)
//! 6. column-level explicit attributes (alignment)
//! 7. block-level explicit attributes
//!
//! Presets are fixed tables. Adding a variant means adding rows here, not
//! branching logic in the renderer.

use std::collections::BTreeMap;

use crate::blocks::Block;
use crate::document::{Column, Email, Row, RowKind, StyleVariant};

/// Flat, deterministic attribute map keyed by CSS-ish property names.
pub type ResolvedStyle = BTreeMap<String, String>;

// ─── Preset tables ───────────────────────────────────────────────────────────

const BASE_FALLBACK: &[(&str, &str)] = &[
    ("color", "#000000"),
    ("font-family", "Arial, Helvetica, sans-serif"),
    ("font-size", "16px"),
    ("line-height", "1.5"),
    ("text-align", "left"),
];

const HEADER_PRESET: &[(&str, &str)] = &[
    ("font-weight", "bold"),
    ("padding-top", "24px"),
    ("padding-bottom", "24px"),
];

const FOOTER_PRESET: &[(&str, &str)] = &[
    ("color", "#666666"),
    ("font-size", "12px"),
    ("line-height", "1.6"),
    ("text-align", "center"),
    ("padding-top", "24px"),
    ("padding-bottom", "24px"),
];

const HERO_PRESET: &[(&str, &str)] = &[
    ("text-align", "center"),
    ("padding-top", "40px"),
    ("padding-bottom", "40px"),
];

const CART_PRESET: &[(&str, &str)] = &[
    ("padding-top", "16px"),
    ("padding-bottom", "16px"),
];

const DISCOUNT_PRESET: &[(&str, &str)] = &[
    ("text-align", "center"),
    ("font-weight", "bold"),
    ("padding-top", "24px"),
    ("padding-bottom", "24px"),
];

const GALLERY_PRESET: &[(&str, &str)] = &[
    ("padding-top", "16px"),
    ("padding-bottom", "16px"),
];

fn row_kind_preset(kind: RowKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        RowKind::Plain => &[],
        RowKind::Header => HEADER_PRESET,
        RowKind::Footer => FOOTER_PRESET,
        RowKind::Hero => HERO_PRESET,
        RowKind::Cart => CART_PRESET,
        RowKind::Discount => DISCOUNT_PRESET,
        RowKind::Gallery => GALLERY_PRESET,
    }
}

const OUTLINE_ROW: &[(&str, &str)] = &[
    ("background-color", "#ffffff"),
    ("border-width", "1px"),
    ("border-style", "solid"),
    ("border-color", "#e0e0e0"),
    ("border-radius", "8px"),
];

const FLOATING_ROW: &[(&str, &str)] = &[
    ("background-color", "#ffffff"),
    ("border-radius", "12px"),
    ("padding-top", "24px"),
    ("padding-right", "24px"),
    ("padding-bottom", "24px"),
    ("padding-left", "24px"),
];

const CLEAR_ROW: &[(&str, &str)] = &[
    ("background-color", "transparent"),
    ("border-width", "0"),
];

/// Variant presets apply per row. `outline` and `floating` leave header and
/// footer rows untouched; `clear` strips everything everywhere.
fn variant_preset(
    variant: StyleVariant,
    kind: RowKind,
) -> &'static [(&'static str, &'static str)] {
    match (variant, kind) {
        (StyleVariant::Default, _) => &[],
        (StyleVariant::Outline, RowKind::Header | RowKind::Footer) => &[],
        (StyleVariant::Outline, _) => OUTLINE_ROW,
        (StyleVariant::Floating, RowKind::Header | RowKind::Footer) => &[],
        (StyleVariant::Floating, _) => FLOATING_ROW,
        (StyleVariant::Clear, _) => CLEAR_ROW,
    }
}

const BUTTON_TEMPLATE: &[(&str, &str)] = &[
    ("background-color", "#2563eb"),
    ("color", "#ffffff"),
    ("font-weight", "bold"),
    ("text-align", "center"),
    ("border-radius", "4px"),
    ("padding-top", "12px"),
    ("padding-right", "24px"),
    ("padding-bottom", "12px"),
    ("padding-left", "24px"),
];

const LINK_TEMPLATE: &[(&str, &str)] = &[
    ("color", "#2563eb"),
    ("text-decoration", "underline"),
];

const DIVIDER_TEMPLATE: &[(&str, &str)] = &[
    ("border-width", "1px"),
    ("border-style", "solid"),
    ("border-color", "#e0e0e0"),
    ("padding-top", "16px"),
    ("padding-bottom", "16px"),
];

const SOCIALS_TEMPLATE: &[(&str, &str)] = &[
    ("icon-size", "24px"),
    ("text-align", "center"),
];

fn block_template(block: &Block) -> &'static [(&'static str, &'static str)] {
    match block {
        Block::Button(_) => BUTTON_TEMPLATE,
        Block::Link(_) => LINK_TEMPLATE,
        Block::Divider(_) => DIVIDER_TEMPLATE,
        Block::Socials(_) => SOCIALS_TEMPLATE,
        _ => &[],
    }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

fn apply(style: &mut ResolvedStyle, entries: &[(&str, &str)]) {
    for (key, value) in entries {
        style.insert((*key).to_string(), (*value).to_string());
    }
}

fn set(style: &mut ResolvedStyle, key: &str, value: impl Into<String>) {
    style.insert(key.to_string(), value.into());
}

fn set_opt(style: &mut ResolvedStyle, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        style.insert(key.to_string(), v.clone());
    }
}

fn apply_padding(style: &mut ResolvedStyle, padding: &crate::style::Padding) {
    set_opt(style, "padding-top", &padding.top);
    set_opt(style, "padding-right", &padding.right);
    set_opt(style, "padding-bottom", &padding.bottom);
    set_opt(style, "padding-left", &padding.left);
}

fn apply_border(style: &mut ResolvedStyle, border: &crate::style::Border) {
    set_opt(style, "border-width", &border.width);
    if let Some(s) = border.style {
        set(style, "border-style", s.as_css());
    }
    set_opt(style, "border-color", &border.color);
    set_opt(style, "border-radius", &border.radius);
}

/// Compute the effective attributes for a block in its context.
pub fn resolve(block: &Block, column: &Column, row: &Row, email: &Email) -> ResolvedStyle {
    let mut style = ResolvedStyle::new();

    apply(&mut style, BASE_FALLBACK);
    set(&mut style, "color", email.color.clone());
    set(&mut style, "font-family", email.font_family.clone());
    apply(&mut style, variant_preset(email.style_variant, row.kind));
    apply(&mut style, row_kind_preset(row.kind));
    apply(&mut style, block_template(block));

    if let Some(align) = column.align {
        set(&mut style, "text-align", align.as_css());
    }

    match block {
        Block::Heading(b) => {
            set(&mut style, "font-weight", "bold");
            set(&mut style, "font-size", b.level.default_font_size());
            set_opt(&mut style, "color", &b.color);
            set_opt(&mut style, "font-size", &b.font_size);
            set_opt(&mut style, "font-weight", &b.font_weight);
            if let Some(align) = b.text_align {
                set(&mut style, "text-align", align.as_css());
            }
            set_opt(&mut style, "line-height", &b.line_height);
            apply_padding(&mut style, &b.padding);
        }
        Block::Text(b) => {
            set_opt(&mut style, "color", &b.color);
            set_opt(&mut style, "font-size", &b.font_size);
            set_opt(&mut style, "font-weight", &b.font_weight);
            if let Some(align) = b.text_align {
                set(&mut style, "text-align", align.as_css());
            }
            set_opt(&mut style, "line-height", &b.line_height);
            apply_padding(&mut style, &b.padding);
        }
        Block::Button(b) => {
            set_opt(&mut style, "background-color", &b.background_color);
            set_opt(&mut style, "color", &b.color);
            set_opt(&mut style, "font-size", &b.font_size);
            if let Some(align) = b.align {
                set(&mut style, "text-align", align.as_css());
            }
            apply_border(&mut style, &b.border);
            apply_padding(&mut style, &b.padding);
        }
        Block::Image(b) => {
            set_opt(&mut style, "width", &b.width);
            set_opt(&mut style, "height", &b.height);
            set_opt(&mut style, "border-radius", &b.border_radius);
            if let Some(align) = b.align {
                set(&mut style, "text-align", align.as_css());
            }
        }
        Block::Divider(b) => {
            set_opt(&mut style, "border-width", &b.border_width);
            set_opt(&mut style, "border-color", &b.border_color);
            if let Some(s) = b.border_style {
                set(&mut style, "border-style", s.as_css());
            }
            apply_padding(&mut style, &b.padding);
        }
        Block::Spacer(b) => {
            set(&mut style, "height", b.height.clone());
        }
        Block::Link(b) => {
            set_opt(&mut style, "color", &b.color);
            if let Some(underline) = b.underline {
                set(
                    &mut style,
                    "text-decoration",
                    if underline { "underline" } else { "none" },
                );
            }
        }
        Block::List(b) => {
            set_opt(&mut style, "color", &b.color);
            set_opt(&mut style, "font-size", &b.font_size);
            apply_padding(&mut style, &b.padding);
        }
        Block::Table(b) => {
            set_opt(&mut style, "border-color", &b.border_color);
            apply_padding(&mut style, &b.padding);
        }
        Block::Socials(b) => {
            if let Some(align) = b.align {
                set(&mut style, "text-align", align.as_css());
            }
            set_opt(&mut style, "icon-size", &b.icon_size);
        }
        Block::CartItem(_) | Block::Survey(_) | Block::Raw(_) => {}
    }

    style
}

/// Effective box attributes for a row's own wrapper (background, border,
/// padding). Same tiers as [`resolve`], without block or column input.
pub fn resolve_row(row: &Row, email: &Email) -> ResolvedStyle {
    let mut style = ResolvedStyle::new();

    apply(&mut style, variant_preset(email.style_variant, row.kind));
    apply(&mut style, row_kind_preset(row.kind));

    set_opt(&mut style, "background-color", &row.background_color);
    apply_border(&mut style, &row.border);
    apply_padding(&mut style, &row.padding);
    if let Some(align) = row.align {
        set(&mut style, "text-align", align.as_css());
    }

    style
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Button, Text};
    use crate::style::Padding;
    use std::collections::BTreeMap;

    fn text_block(color: Option<&str>) -> Block {
        Block::Text(Text {
            id: "b1".to_string(),
            content: "hi".to_string(),
            color: color.map(str::to_string),
            font_size: None,
            font_weight: None,
            text_align: None,
            line_height: None,
            padding: Padding::default(),
            extra: BTreeMap::new(),
        })
    }

    fn context(variant: StyleVariant, kind: RowKind) -> (Email, Row, Column) {
        let mut email = Email::default();
        email.style_variant = variant;
        let mut row = Row::new("r1".to_string());
        row.kind = kind;
        let column = Column::new("c1".to_string(), 12);
        (email, row, column)
    }

    #[test]
    fn explicit_block_attribute_beats_row_preset() {
        let (email, row, column) = context(StyleVariant::Default, RowKind::Footer);

        let inherited = resolve(&text_block(None), &column, &row, &email);
        assert_eq!(inherited.get("color").map(String::as_str), Some("#666666"));

        let explicit = resolve(&text_block(Some("#ff0000")), &column, &row, &email);
        assert_eq!(explicit.get("color").map(String::as_str), Some("#ff0000"));
    }

    #[test]
    fn outline_variant_adds_border_to_plain_rows_only() {
        let (email, row, column) = context(StyleVariant::Outline, RowKind::Plain);
        let style = resolve(&text_block(None), &column, &row, &email);
        assert_eq!(style.get("border-width").map(String::as_str), Some("1px"));
        assert_eq!(style.get("border-style").map(String::as_str), Some("solid"));

        let (email, row, column) = context(StyleVariant::Outline, RowKind::Footer);
        let style = resolve(&text_block(None), &column, &row, &email);
        assert_eq!(style.get("border-width"), None);
    }

    #[test]
    fn button_defaults_survive_email_text_color() {
        let (mut email, row, column) = context(StyleVariant::Default, RowKind::Plain);
        email.color = "#222222".to_string();
        let block = Block::Button(Button {
            id: "b1".to_string(),
            content: "Go".to_string(),
            href: "https://example.com".to_string(),
            background_color: None,
            color: None,
            font_size: None,
            align: None,
            border: Default::default(),
            padding: Padding::default(),
            extra: BTreeMap::new(),
        });
        let style = resolve(&block, &column, &row, &email);
        assert_eq!(style.get("color").map(String::as_str), Some("#ffffff"));
        assert_eq!(style.get("background-color").map(String::as_str), Some("#2563eb"));

        // A text block in the same context does inherit the email color.
        let style = resolve(&text_block(None), &column, &row, &email);
        assert_eq!(style.get("color").map(String::as_str), Some("#222222"));
    }

    #[test]
    fn resolve_is_idempotent() {
        let (email, row, column) = context(StyleVariant::Floating, RowKind::Hero);
        let block = text_block(Some("#123456"));
        let a = resolve(&block, &column, &row, &email);
        let b = resolve(&block, &column, &row, &email);
        assert_eq!(a, b);
    }
}
