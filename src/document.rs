use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::blocks::Block;
use crate::style::{Alignment, Border, Padding, VerticalAlignment};

/// Named preset controlling the default visual treatment of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleVariant {
    #[default]
    Default,
    Outline,
    Floating,
    Clear,
}

/// Optional semantic hint on a row. Presets in the cascade key off this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    #[default]
    Plain,
    Header,
    Footer,
    Hero,
    Cart,
    Discount,
    Gallery,
}

/// The root document: ordered rows of columns of blocks.
///
/// Treat every `Email` as an immutable value. Edits produce a new tree;
/// multiple readers (editor canvas, settings panel, context serializer)
/// share one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Inbox preview text, rendered hidden at the top of the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub font_family: String,
    /// Content width in px, kept as the author's string. Must parse as a
    /// positive integer (checked by `validate`).
    pub width: String,
    pub color: String,
    pub background_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_repeat: Option<String>,
    #[serde(default)]
    pub style_variant: StyleVariant,
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

pub const DEFAULT_WIDTH: &str = "600";
pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#f5f5f5";
pub const DEFAULT_FONT_FAMILY: &str = "Arial, Helvetica, sans-serif";

impl Default for Email {
    fn default() -> Self {
        Email {
            id: "email".to_string(),
            name: None,
            preview: None,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            width: DEFAULT_WIDTH.to_string(),
            color: DEFAULT_COLOR.to_string(),
            background_color: DEFAULT_BACKGROUND.to_string(),
            background_image: None,
            background_position: None,
            background_size: None,
            background_repeat: None,
            style_variant: StyleVariant::Default,
            rows: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl Email {
    /// Content width in px. Falls back to the default when the stored
    /// string is not a number (`validate` reports that case).
    pub fn width_px(&self) -> u32 {
        self.width.parse().unwrap_or(600)
    }
}

/// A horizontal section of the email, holding one or more columns whose
/// spans partition a 12-unit grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    #[serde(default)]
    pub kind: RowKind,
    #[serde(default, skip_serializing_if = "Padding::is_empty")]
    pub padding: Padding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Border::is_empty")]
    pub border: Border,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    /// Whether columns stack vertically on narrow clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_on_mobile: Option<bool>,
    /// Horizontal gap between columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_spacing: Option<String>,
    /// Container wrapper: optional max-width narrower than the email width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_align: Option<Alignment>,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Row {
    pub fn new(id: String) -> Self {
        Row {
            id,
            kind: RowKind::Plain,
            padding: Padding::default(),
            background_color: None,
            border: Border::default(),
            align: None,
            stack_on_mobile: None,
            column_spacing: None,
            max_width: None,
            container_align: None,
            columns: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Sum of the column grid shares. 12 in any well-formed row.
    pub fn span_sum(&self) -> u32 {
        self.columns.iter().map(|c| c.span as u32).sum()
    }
}

/// A vertical partition of a row, sized in twelfths of the row width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    /// Grid share, 1-12.
    pub span: u8,
    #[serde(default, skip_serializing_if = "Padding::is_empty")]
    pub padding: Padding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlignment>,
    #[serde(default, skip_serializing_if = "Border::is_empty")]
    pub border: Border,
    pub blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Column {
    pub fn new(id: String, span: u8) -> Self {
        Column {
            id,
            span,
            padding: Padding::default(),
            align: None,
            vertical_align: None,
            border: Border::default(),
            blocks: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Column width as an integer percentage of the row.
    pub fn width_percent(&self) -> u32 {
        (self.span as u32 * 100 + 6) / 12
    }
}

impl StyleVariant {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Some(StyleVariant::Default),
            "outline" => Some(StyleVariant::Outline),
            "floating" => Some(StyleVariant::Floating),
            "clear" => Some(StyleVariant::Clear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleVariant::Default => "default",
            StyleVariant::Outline => "outline",
            StyleVariant::Floating => "floating",
            StyleVariant::Clear => "clear",
        }
    }
}

impl RowKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" => Some(RowKind::Plain),
            "header" => Some(RowKind::Header),
            "footer" => Some(RowKind::Footer),
            "hero" => Some(RowKind::Hero),
            "cart" => Some(RowKind::Cart),
            "discount" => Some(RowKind::Discount),
            "gallery" => Some(RowKind::Gallery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Plain => "plain",
            RowKind::Header => "header",
            RowKind::Footer => "footer",
            RowKind::Hero => "hero",
            RowKind::Cart => "cart",
            RowKind::Discount => "discount",
            RowKind::Gallery => "gallery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_width_percent_rounds() {
        assert_eq!(Column::new("c1".into(), 12).width_percent(), 100);
        assert_eq!(Column::new("c1".into(), 6).width_percent(), 50);
        assert_eq!(Column::new("c1".into(), 4).width_percent(), 33);
        assert_eq!(Column::new("c1".into(), 8).width_percent(), 67);
        assert_eq!(Column::new("c1".into(), 3).width_percent(), 25);
    }

    #[test]
    fn email_defaults() {
        let email = Email::default();
        assert_eq!(email.width, "600");
        assert_eq!(email.width_px(), 600);
        assert_eq!(email.style_variant, StyleVariant::Default);
    }
}
