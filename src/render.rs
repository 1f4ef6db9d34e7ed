//! Email-client-safe HTML emission.
//!
//! Modern layout (flexbox/grid) is unreliable across email clients, so the
//! output is nested `role="presentation"` tables with inline styles and no
//! external stylesheet. The renderer is pure and deterministic: the same
//! document always produces byte-identical HTML, which is what diffing and
//! send-time snapshotting rely on.

use crate::blocks::{
    Block, Button, CartItem, Divider, Heading, Image, Link, List, ListKind, Socials, Survey,
    Table, Text,
};
use crate::cascade::{resolve, resolve_row, ResolvedStyle};
use crate::document::{Column, Email, Row};
use crate::sanitize::{escape_text, sanitize_inline};

/// Render a document to a self-contained HTML fragment suitable as an
/// email body.
pub fn render(email: &Email) -> String {
    let mut out = String::with_capacity(4096);

    if let Some(preview) = &email.preview {
        out.push_str("<div style=\"display:none;max-height:0;overflow:hidden;mso-hide:all;\">");
        out.push_str(&escape_text(preview));
        out.push_str("</div>");
    }

    let mut canvas = format!("background-color:{};", email.background_color);
    if let Some(image) = &email.background_image {
        canvas.push_str(&format!("background-image:url('{}');", image));
        if let Some(position) = &email.background_position {
            canvas.push_str(&format!("background-position:{};", position));
        }
        if let Some(size) = &email.background_size {
            canvas.push_str(&format!("background-size:{};", size));
        }
        if let Some(repeat) = &email.background_repeat {
            canvas.push_str(&format!("background-repeat:{};", repeat));
        }
    }

    out.push_str(&format!(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" style=\"{}\">",
        esc_style(&canvas)
    ));
    out.push_str("<tr><td align=\"center\" style=\"padding:24px 12px;\">");
    out.push_str(&format!(
        "<table role=\"presentation\" width=\"{w}\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" style=\"width:{w}px;max-width:100%;\">",
        w = email.width_px()
    ));

    for row in &email.rows {
        render_row(&mut out, row, email);
    }

    out.push_str("</table></td></tr></table>");
    out
}

// ─── Rows & columns ──────────────────────────────────────────────────────────

const ROW_BOX_KEYS: &[&str] = &[
    "background-color",
    "border-width",
    "border-style",
    "border-color",
    "border-radius",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "text-align",
];

fn render_row(out: &mut String, row: &Row, email: &Email) {
    let resolved = resolve_row(row, email);
    let box_style = style_of(&resolved, ROW_BOX_KEYS);

    out.push_str("<tr><td");
    if !box_style.is_empty() {
        out.push_str(&format!(" style=\"{}\"", esc_style(&box_style)));
    }
    out.push('>');

    let constrained = row.max_width.is_some();
    if let Some(max_width) = &row.max_width {
        let align = row
            .container_align
            .map(|a| a.as_css())
            .unwrap_or("center");
        out.push_str(&format!(
            "<table role=\"presentation\" align=\"{}\" width=\"{}\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr><td>",
            align,
            strip_px(max_width)
        ));
    }

    out.push_str(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr>",
    );
    let last = row.columns.len().saturating_sub(1);
    for (i, column) in row.columns.iter().enumerate() {
        render_column(out, column, row, email, i == last);
    }
    out.push_str("</tr></table>");

    if constrained {
        out.push_str("</td></tr></table>");
    }
    out.push_str("</td></tr>");
}

fn render_column(out: &mut String, column: &Column, row: &Row, email: &Email, is_last: bool) {
    let mut td_style = String::new();
    push_style(&mut td_style, "padding-top", &column.padding.top);
    push_style(&mut td_style, "padding-right", &column.padding.right);
    push_style(&mut td_style, "padding-bottom", &column.padding.bottom);
    push_style(&mut td_style, "padding-left", &column.padding.left);
    push_style(&mut td_style, "border-width", &column.border.width);
    if let Some(style) = column.border.style {
        td_style.push_str(&format!("border-style:{};", style.as_css()));
    }
    push_style(&mut td_style, "border-color", &column.border.color);
    push_style(&mut td_style, "border-radius", &column.border.radius);
    if !is_last {
        if let Some(spacing) = &row.column_spacing {
            td_style.push_str(&format!("padding-right:{};", spacing));
        }
    }

    let valign = column
        .vertical_align
        .map(|v| v.as_css())
        .unwrap_or("top");
    out.push_str(&format!(
        "<td width=\"{}%\" valign=\"{}\"",
        column.width_percent(),
        valign
    ));
    if let Some(align) = column.align {
        out.push_str(&format!(" align=\"{}\"", align.as_css()));
    }
    if !td_style.is_empty() {
        out.push_str(&format!(" style=\"{}\"", esc_style(&td_style)));
    }
    out.push('>');

    for block in &column.blocks {
        render_block(out, block, column, row, email);
    }

    out.push_str("</td>");
}

// ─── Blocks ──────────────────────────────────────────────────────────────────

fn render_block(out: &mut String, block: &Block, column: &Column, row: &Row, email: &Email) {
    let style = resolve(block, column, row, email);
    match block {
        Block::Heading(b) => render_heading(out, b, &style),
        Block::Text(b) => render_text(out, b, &style),
        Block::Button(b) => render_button(out, b, &style),
        Block::Image(b) => render_image(out, b, &style),
        Block::Divider(b) => render_divider(out, b, &style),
        Block::Spacer(b) => render_spacer(out, b),
        Block::Link(b) => render_link(out, b, &style, column, row, email),
        Block::List(b) => render_list(out, b, &style),
        Block::Table(b) => render_table(out, b, &style),
        Block::Socials(b) => render_socials(out, b, &style),
        Block::CartItem(b) => render_cart_item(out, b, &style),
        Block::Survey(b) => render_survey(out, b, &style),
        // Raw blocks carry data for other consumers; HTML output skips them.
        Block::Raw(_) => {}
    }
}

fn render_heading(out: &mut String, heading: &Heading, style: &ResolvedStyle) {
    block_open(out, style);
    let inner = style_of(
        style,
        &["color", "font-family", "font-size", "font-weight", "line-height"],
    );
    out.push_str(&format!(
        "<{tag} style=\"margin:0;{}\">{}</{tag}>",
        esc_style(&inner),
        sanitize_inline(&heading.content),
        tag = heading.level.as_tag()
    ));
    block_close(out);
}

fn render_text(out: &mut String, text: &Text, style: &ResolvedStyle) {
    block_open(out, style);
    let inner = style_of(
        style,
        &["color", "font-family", "font-size", "font-weight", "line-height"],
    );
    out.push_str(&format!(
        "<p style=\"margin:0;{}\">{}</p>",
        esc_style(&inner),
        sanitize_inline(&text.content)
    ));
    block_close(out);
}

fn render_button(out: &mut String, button: &Button, style: &ResolvedStyle) {
    let align = style.get("text-align").map(String::as_str).unwrap_or("center");
    out.push_str(&format!(
        "<table role=\"presentation\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" align=\"{}\">",
        align
    ));
    let td = style_of(
        style,
        &[
            "background-color",
            "border-width",
            "border-style",
            "border-color",
            "border-radius",
        ],
    );
    let anchor = style_of(
        style,
        &[
            "padding-top",
            "padding-right",
            "padding-bottom",
            "padding-left",
            "color",
            "font-family",
            "font-size",
            "font-weight",
        ],
    );
    out.push_str(&format!(
        "<tr><td style=\"{}\"><a href=\"{}\" target=\"_blank\" style=\"display:inline-block;text-decoration:none;{}\">{}</a></td></tr></table>",
        esc_style(&td),
        href_attr(&button.href),
        esc_style(&anchor),
        sanitize_inline(&button.content)
    ));
}

fn render_image(out: &mut String, image: &Image, style: &ResolvedStyle) {
    block_open(out, style);
    let mut img_style = String::from("display:block;border:0;max-width:100%;height:auto;");
    if let Some(radius) = style.get("border-radius") {
        img_style.push_str(&format!("border-radius:{};", radius));
    }
    out.push_str(&format!(
        "<img src=\"{}\" alt=\"{}\"",
        crate::sanitize::escape_attr(&image.src),
        crate::sanitize::escape_attr(image.alt.as_deref().unwrap_or(""))
    ));
    if let Some(width) = style.get("width") {
        out.push_str(&format!(" width=\"{}\"", strip_px(width)));
    }
    if let Some(height) = style.get("height") {
        out.push_str(&format!(" height=\"{}\"", strip_px(height)));
    }
    out.push_str(&format!(" style=\"{}\"/>", esc_style(&img_style)));
    block_close(out);
}

fn render_divider(out: &mut String, _divider: &Divider, style: &ResolvedStyle) {
    let td = style_of(style, &["padding-top", "padding-bottom"]);
    let width = style.get("border-width").map(String::as_str).unwrap_or("1px");
    let line_style = style.get("border-style").map(String::as_str).unwrap_or("solid");
    let color = style.get("border-color").map(String::as_str).unwrap_or("#e0e0e0");
    out.push_str(&format!(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr><td style=\"{}\"><div style=\"border-top:{} {} {};font-size:0;line-height:0;\">&#160;</div></td></tr></table>",
        esc_style(&td),
        width,
        line_style,
        color
    ));
}

fn render_spacer(out: &mut String, spacer: &crate::blocks::Spacer) {
    out.push_str(&format!(
        "<div style=\"height:{h};line-height:{h};font-size:0;\">&#160;</div>",
        h = spacer.height
    ));
}

fn render_link(
    out: &mut String,
    link: &Link,
    style: &ResolvedStyle,
    column: &Column,
    row: &Row,
    email: &Email,
) {
    let anchor = style_of(style, &["color", "font-family", "font-size", "text-decoration"]);
    out.push_str(&format!(
        "<a href=\"{}\" target=\"_blank\" style=\"{}\">",
        href_attr(&link.href),
        esc_style(&anchor)
    ));
    if link.children.is_empty() {
        out.push_str(&sanitize_inline(link.content.as_deref().unwrap_or("")));
    } else {
        for child in &link.children {
            render_block(out, child, column, row, email);
        }
    }
    out.push_str("</a>");
}

fn render_list(out: &mut String, list: &List, style: &ResolvedStyle) {
    block_open(out, style);
    let inner = style_of(
        style,
        &["color", "font-family", "font-size", "line-height"],
    );
    let tag = match list.kind {
        ListKind::Unordered => "ul",
        ListKind::Ordered => "ol",
    };
    out.push_str(&format!(
        "<{tag} style=\"margin:0;padding-left:24px;{}\">",
        esc_style(&inner),
        tag = tag
    ));
    for item in &list.items {
        out.push_str(&format!(
            "<li style=\"margin:0 0 8px 0;\">{}</li>",
            sanitize_inline(item)
        ));
    }
    out.push_str(&format!("</{}>", tag));
    block_close(out);
}

fn render_table(out: &mut String, table: &Table, style: &ResolvedStyle) {
    block_open(out, style);
    let border_color = style
        .get("border-color")
        .map(String::as_str)
        .unwrap_or("#e0e0e0");
    let cell_base = format!(
        "padding:8px;border:1px solid {};{}",
        border_color,
        style_of(style, &["color", "font-family", "font-size"])
    );
    out.push_str(
        "<table width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" style=\"border-collapse:collapse;\">",
    );
    for (i, cells) in table.rows.iter().enumerate() {
        let header = table.has_header && i == 0;
        out.push_str("<tr>");
        for cell in cells {
            if header {
                out.push_str(&format!(
                    "<td style=\"{}font-weight:bold;background-color:#f5f5f5;\">{}</td>",
                    esc_style(&cell_base),
                    sanitize_inline(cell)
                ));
            } else {
                out.push_str(&format!(
                    "<td style=\"{}\">{}</td>",
                    esc_style(&cell_base),
                    sanitize_inline(cell)
                ));
            }
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    block_close(out);
}

fn render_socials(out: &mut String, socials: &Socials, style: &ResolvedStyle) {
    let align = style.get("text-align").map(String::as_str).unwrap_or("center");
    let size = style.get("icon-size").map(String::as_str).unwrap_or("24px");
    out.push_str(&format!(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr><td align=\"{}\">",
        align
    ));
    for (i, link) in socials.links.iter().enumerate() {
        if i > 0 {
            out.push_str("&#160;&#160;");
        }
        match &link.icon {
            Some(icon) => out.push_str(&format!(
                "<a href=\"{}\" target=\"_blank\"><img src=\"{}\" alt=\"{}\" width=\"{}\" style=\"display:inline-block;border:0;\"/></a>",
                href_attr(&link.url),
                crate::sanitize::escape_attr(icon),
                crate::sanitize::escape_attr(&link.platform),
                strip_px(size)
            )),
            None => out.push_str(&format!(
                "<a href=\"{}\" target=\"_blank\" style=\"{}\">{}</a>",
                href_attr(&link.url),
                esc_style(&style_of(style, &["color", "font-family", "font-size"])),
                escape_text(&link.platform)
            )),
        }
    }
    out.push_str("</td></tr></table>");
}

fn render_cart_item(out: &mut String, item: &CartItem, style: &ResolvedStyle) {
    let font = style_of(style, &["color", "font-family"]);
    out.push_str(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr>",
    );
    out.push_str(&format!(
        "<td width=\"96\" valign=\"top\"><img src=\"{}\" alt=\"{}\" width=\"80\" style=\"display:block;border:0;border-radius:4px;\"/></td>",
        crate::sanitize::escape_attr(&item.image),
        crate::sanitize::escape_attr(&item.name)
    ));
    out.push_str(&format!(
        "<td valign=\"top\" style=\"padding-left:16px;{}\">",
        esc_style(&font)
    ));
    out.push_str(&format!(
        "<p style=\"margin:0;font-weight:bold;\">{}</p>",
        sanitize_inline(&item.name)
    ));
    if let Some(description) = &item.description {
        out.push_str(&format!(
            "<p style=\"margin:4px 0 0 0;color:#666666;font-size:14px;\">{}</p>",
            sanitize_inline(description)
        ));
    }
    if let Some(quantity) = &item.quantity {
        out.push_str(&format!(
            "<p style=\"margin:4px 0 0 0;font-size:14px;\">Qty: {}</p>",
            escape_text(quantity)
        ));
    }
    if let Some(price) = &item.price {
        out.push_str(&format!(
            "<p style=\"margin:4px 0 0 0;font-weight:bold;\">{}</p>",
            escape_text(price)
        ));
    }
    out.push_str("</td></tr></table>");
}

fn render_survey(out: &mut String, survey: &Survey, style: &ResolvedStyle) {
    let font = style_of(style, &["color", "font-family", "font-size"]);
    out.push_str(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr><td align=\"center\">",
    );
    out.push_str(&format!(
        "<p style=\"margin:0 0 12px 0;{}\">{}</p>",
        esc_style(&font),
        sanitize_inline(&survey.question)
    ));
    for choice in &survey.choices {
        out.push_str(&format!(
            "<a href=\"{}\" target=\"_blank\" style=\"display:inline-block;margin:0 4px;padding:8px 16px;border:1px solid #2563eb;border-radius:4px;color:#2563eb;text-decoration:none;\">{}</a>",
            href_attr(&choice.url),
            escape_text(&choice.label)
        ));
    }
    out.push_str("</td></tr></table>");
}

// ─── Emission helpers ────────────────────────────────────────────────────────

/// Standard block wrapper: one full-width presentation table whose cell
/// carries the block's padding and alignment.
fn block_open(out: &mut String, style: &ResolvedStyle) {
    let td = style_of(
        style,
        &[
            "padding-top",
            "padding-right",
            "padding-bottom",
            "padding-left",
            "text-align",
        ],
    );
    out.push_str(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr><td",
    );
    if !td.is_empty() {
        out.push_str(&format!(" style=\"{}\"", esc_style(&td)));
    }
    out.push('>');
}

fn block_close(out: &mut String) {
    out.push_str("</td></tr></table>");
}

/// Inline style string from the listed keys, in list order.
fn style_of(style: &ResolvedStyle, keys: &[&str]) -> String {
    let mut out = String::new();
    for key in keys {
        if let Some(value) = style.get(*key) {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push(';');
        }
    }
    out
}

fn push_style(out: &mut String, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        out.push_str(&format!("{}:{};", key, v));
    }
}

/// Escape a style-attribute value (single quotes stay usable for `url()`).
fn esc_style(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Block-level hrefs go through the same scheme filter as rich-content
/// anchors; an unsafe destination degrades to "#".
fn href_attr(url: &str) -> String {
    match crate::sanitize::safe_href(url) {
        Some(safe) => crate::sanitize::escape_attr(&safe),
        None => "#".to_string(),
    }
}

fn strip_px(value: &str) -> &str {
    value.strip_suffix("px").unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::parse_markup;
    use crate::mapper::to_document;

    fn render_src(src: &str) -> String {
        render(&to_document(&parse_markup(src).unwrap()).unwrap())
    }

    #[test]
    fn render_is_deterministic() {
        let src = "<EMAIL preview=\"Hi\"><ROW type=\"header\"><HEADING level=h1>Welcome</HEADING></ROW>\
                   <ROW><COLUMN width=6><TEXT>left</TEXT></COLUMN><COLUMN width=6><TEXT>right</TEXT></COLUMN></ROW></EMAIL>";
        assert_eq!(render_src(src), render_src(src));
    }

    #[test]
    fn output_is_table_based() {
        let html = render_src("<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>");
        assert!(html.contains("role=\"presentation\""));
        assert!(html.starts_with("<table"));
        assert!(!html.contains("display:flex"));
    }

    #[test]
    fn column_widths_are_percentages() {
        let html = render_src(
            "<EMAIL><ROW><COLUMN width=6><TEXT>a</TEXT></COLUMN><COLUMN width=6><TEXT>b</TEXT></COLUMN></ROW></EMAIL>",
        );
        assert_eq!(html.matches("width=\"50%\"").count(), 2);
    }

    #[test]
    fn script_content_never_reaches_output() {
        let html = render_src("<EMAIL><ROW><TEXT><script>alert(1)</script>Hi</TEXT></ROW></EMAIL>");
        assert!(!html.contains("<script"));
        assert!(html.contains("Hi"));
    }

    #[test]
    fn unsafe_button_href_degrades() {
        let html = render_src(
            "<EMAIL><ROW><BUTTON href=\"javascript:alert(1)\">Go</BUTTON></ROW></EMAIL>",
        );
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));
    }

    #[test]
    fn preview_text_is_hidden_up_front() {
        let html = render_src("<EMAIL preview=\"Deal inside\"><ROW><TEXT>x</TEXT></ROW></EMAIL>");
        assert!(html.starts_with("<div style=\"display:none;"));
        assert!(html.contains("Deal inside"));
    }

    #[test]
    fn raw_blocks_emit_nothing() {
        let html = render_src("<EMAIL><ROW><COUNTDOWN until=\"soon\"/></ROW></EMAIL>");
        assert!(!html.contains("COUNTDOWN"));
        assert!(!html.contains("soon"));
    }

    #[test]
    fn outline_variant_border_shows_up_on_plain_rows() {
        let html = render_src(
            "<EMAIL styleVariant=\"outline\"><ROW><TEXT>x</TEXT></ROW><ROW type=\"footer\"><TEXT>y</TEXT></ROW></EMAIL>",
        );
        assert!(html.contains("border-width:1px;border-style:solid;border-color:#e0e0e0;"));
    }
}
