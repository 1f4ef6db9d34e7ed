use serde::{Deserialize, Serialize};

/// Four-sided padding. Values are CSS lengths ("12px"), kept as strings so
/// the document round-trips exactly what the author wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Padding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
}

impl Padding {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }

    /// Expand a CSS-style shorthand (`"12"`, `"12,0"`, `"12,0,8"`,
    /// `"12,0,8,4"`, spaces also accepted) into four sides. Bare numbers
    /// are normalized to px.
    pub fn from_shorthand(value: &str) -> Self {
        let parts: Vec<String> = value
            .split(|c| c == ',' || c == ' ')
            .filter(|p| !p.is_empty())
            .map(|p| px(p.trim()))
            .collect();
        let (top, right, bottom, left) = match parts.as_slice() {
            [a] => (a.clone(), a.clone(), a.clone(), a.clone()),
            [v, h] => (v.clone(), h.clone(), v.clone(), h.clone()),
            [t, h, b] => (t.clone(), h.clone(), b.clone(), h.clone()),
            [t, r, b, l] => (t.clone(), r.clone(), b.clone(), l.clone()),
            _ => return Padding::default(),
        };
        Padding {
            top: Some(top),
            right: Some(right),
            bottom: Some(bottom),
            left: Some(left),
        }
    }
}

/// Border attributes shared by rows, columns and button/divider blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Border {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<BorderStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<String>,
}

impl Border {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.style.is_none() && self.color.is_none() && self.radius.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Solid,
    Dashed,
    Dotted,
}

impl BorderStyle {
    pub fn as_css(&self) -> &'static str {
        match self {
            BorderStyle::Solid => "solid",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Dotted => "dotted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_css(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    Top,
    Middle,
    Bottom,
}

impl VerticalAlignment {
    pub fn as_css(&self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Middle => "middle",
            VerticalAlignment::Bottom => "bottom",
        }
    }
}

/// Heading levels h1-h6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

impl HeadingLevel {
    pub fn as_tag(&self) -> &'static str {
        match self {
            HeadingLevel::H1 => "h1",
            HeadingLevel::H2 => "h2",
            HeadingLevel::H3 => "h3",
            HeadingLevel::H4 => "h4",
            HeadingLevel::H5 => "h5",
            HeadingLevel::H6 => "h6",
        }
    }

    /// Default font size for a heading when nothing in the cascade sets one.
    pub fn default_font_size(&self) -> &'static str {
        match self {
            HeadingLevel::H1 => "32px",
            HeadingLevel::H2 => "28px",
            HeadingLevel::H3 => "24px",
            HeadingLevel::H4 => "20px",
            HeadingLevel::H5 => "18px",
            HeadingLevel::H6 => "16px",
        }
    }
}

/// Normalize a bare number to a px length; anything with a unit (or any
/// non-numeric string) passes through untouched.
pub fn px(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        format!("{}px", value)
    } else {
        value.to_string()
    }
}

/// Parse boolean-like attribute tokens. Model output is loose about these,
/// so `1`/`0` and `yes`/`no` are accepted alongside `true`/`false`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub fn parse_alignment(value: &str) -> Option<Alignment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "left" => Some(Alignment::Left),
        "center" | "middle" => Some(Alignment::Center),
        "right" => Some(Alignment::Right),
        _ => None,
    }
}

pub fn parse_vertical_alignment(value: &str) -> Option<VerticalAlignment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "top" => Some(VerticalAlignment::Top),
        "middle" | "center" => Some(VerticalAlignment::Middle),
        "bottom" => Some(VerticalAlignment::Bottom),
        _ => None,
    }
}

pub fn parse_border_style(value: &str) -> Option<BorderStyle> {
    match value.trim().to_ascii_lowercase().as_str() {
        "solid" => Some(BorderStyle::Solid),
        "dashed" => Some(BorderStyle::Dashed),
        "dotted" => Some(BorderStyle::Dotted),
        _ => None,
    }
}

pub fn parse_heading_level(value: &str) -> Option<HeadingLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "h1" | "1" => Some(HeadingLevel::H1),
        "h2" | "2" => Some(HeadingLevel::H2),
        "h3" | "3" => Some(HeadingLevel::H3),
        "h4" | "4" => Some(HeadingLevel::H4),
        "h5" | "5" => Some(HeadingLevel::H5),
        "h6" | "6" => Some(HeadingLevel::H6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_shorthand_expansion() {
        let p = Padding::from_shorthand("12,0");
        assert_eq!(p.top.as_deref(), Some("12px"));
        assert_eq!(p.right.as_deref(), Some("0px"));
        assert_eq!(p.bottom.as_deref(), Some("12px"));
        assert_eq!(p.left.as_deref(), Some("0px"));

        let p = Padding::from_shorthand("8");
        assert_eq!(p.left.as_deref(), Some("8px"));

        let p = Padding::from_shorthand("4,8,12,16");
        assert_eq!(p.top.as_deref(), Some("4px"));
        assert_eq!(p.right.as_deref(), Some("8px"));
        assert_eq!(p.bottom.as_deref(), Some("12px"));
        assert_eq!(p.left.as_deref(), Some("16px"));
    }

    #[test]
    fn px_leaves_units_alone() {
        assert_eq!(px("12"), "12px");
        assert_eq!(px("12px"), "12px");
        assert_eq!(px("1.5em"), "1.5em");
        assert_eq!(px("auto"), "auto");
    }

    #[test]
    fn bool_tokens() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }
}
