//! Inline-markup sanitizer for rich content fields.
//!
//! Block content may come from a model or from user input, so everything
//! outside a small allowlist is entity-escaped in place immediately before
//! emission: visible, never silently dropped. Allowed tags lose all
//! attributes except `href` on anchors, and `href` only survives with an
//! http/https/mailto (or relative) destination.

/// Tags allowed to pass through in rich content.
pub const ALLOWED_TAGS: &[&str] = &["b", "i", "em", "strong", "a", "span"];

/// Sanitize one rich-content string for HTML emission.
///
/// Allowed tags are re-emitted in normalized form and auto-closed at end of
/// input; stray closers are dropped. Everything else, `<script>` included,
/// comes out escaped.
pub fn sanitize_inline(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open: Vec<&'static str> = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let c = input[pos..].chars().next().unwrap();
        if c != '<' {
            push_escaped_char(&mut out, c, &input[pos + c.len_utf8()..]);
            pos += c.len_utf8();
            continue;
        }

        match scan_tag(input, pos) {
            Some(tag) => {
                if let Some(allowed) = ALLOWED_TAGS
                    .iter()
                    .copied()
                    .find(|t| t.eq_ignore_ascii_case(&tag.name))
                {
                    if tag.closing {
                        emit_close(&mut out, &mut open, allowed);
                    } else {
                        if allowed == "a" {
                            match tag.href.as_deref().and_then(safe_href) {
                                Some(href) => {
                                    out.push_str("<a href=\"");
                                    out.push_str(&escape_attr(&href));
                                    out.push_str("\">");
                                }
                                None => out.push_str("<a>"),
                            }
                        } else {
                            out.push('<');
                            out.push_str(allowed);
                            out.push('>');
                        }
                        open.push(allowed);
                    }
                } else {
                    // Disallowed tag: escape the whole thing in place.
                    for c in input[pos..tag.end].chars() {
                        push_escaped_char(&mut out, c, "");
                    }
                }
                pos = tag.end;
            }
            None => {
                // '<' that never becomes a tag.
                out.push_str("&lt;");
                pos += 1;
            }
        }
    }

    // Auto-close whatever is still open so the emitted fragment nests.
    while let Some(name) = open.pop() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }

    out
}

struct ScannedTag {
    name: String,
    closing: bool,
    href: Option<String>,
    /// Byte offset just past the closing '>'.
    end: usize,
}

/// Scan a `<...>` run starting at `start` (which points at '<'). Returns
/// `None` when no '>' closes it; that '<' is ordinary text.
fn scan_tag(input: &str, start: usize) -> Option<ScannedTag> {
    let rest = &input[start + 1..];
    let mut chars = rest.char_indices().peekable();

    let closing = matches!(chars.peek(), Some((_, '/')));
    if closing {
        chars.next();
    }

    let mut name = String::new();
    while let Some((_, c)) = chars.peek().copied() {
        if c.is_ascii_alphabetic() {
            name.push(c.to_ascii_lowercase());
            chars.next();
        } else {
            break;
        }
    }
    if name.is_empty() {
        return None;
    }

    // Scan to '>' with quote awareness, collecting the raw attribute run.
    let mut attrs = String::new();
    let mut quote: Option<char> = None;
    for (i, c) in chars {
        match quote {
            Some(q) => {
                attrs.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    attrs.push(c);
                    quote = Some(c);
                }
                '>' => {
                    return Some(ScannedTag {
                        href: extract_href(&attrs),
                        name,
                        closing,
                        end: start + 1 + i + 1,
                    });
                }
                _ => attrs.push(c),
            },
        }
    }
    None
}

/// Pull the href value out of a raw attribute run.
fn extract_href(attrs: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let idx = lower.find("href")?;
    let after = attrs[idx + 4..].trim_start();
    let after = after.strip_prefix('=')?.trim_start();
    let mut chars = after.chars();
    match chars.next()? {
        q @ ('"' | '\'') => {
            let rest: String = chars.take_while(|c| *c != q).collect();
            Some(rest)
        }
        first => {
            let mut value = String::new();
            value.push(first);
            value.extend(chars.take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/'));
            Some(value)
        }
    }
}

/// Accept http/https/mailto destinations and scheme-less relative paths;
/// reject everything else (javascript:, data:, ...).
pub fn safe_href(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let scheme_end = trimmed
        .find(|c: char| c == ':' || c == '/' || c == '?' || c == '#')
        .filter(|&i| trimmed[i..].starts_with(':'));
    match scheme_end {
        None => Some(trimmed.to_string()),
        Some(i) => {
            let scheme = trimmed[..i].to_ascii_lowercase();
            if matches!(scheme.as_str(), "http" | "https" | "mailto") {
                Some(trimmed.to_string())
            } else {
                None
            }
        }
    }
}

fn emit_close(out: &mut String, open: &mut Vec<&'static str>, name: &'static str) {
    if let Some(depth) = open.iter().rposition(|t| *t == name) {
        // Close intermediates so the output stays properly nested.
        while open.len() > depth {
            let top = open.pop().unwrap();
            out.push_str("</");
            out.push_str(top);
            out.push('>');
        }
    }
    // A closer with no matching opener is dropped.
}

fn push_escaped_char(out: &mut String, c: char, lookahead: &str) {
    match c {
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '&' => {
            if is_entity_ahead(lookahead) {
                out.push('&');
            } else {
                out.push_str("&amp;");
            }
        }
        _ => out.push(c),
    }
}

/// True when the text after an '&' reads like an HTML entity (`amp;`,
/// `#160;`), so already-encoded content is not double-escaped.
fn is_entity_ahead(rest: &str) -> bool {
    let mut len = 0;
    for c in rest.chars() {
        if c == ';' {
            return len > 0;
        }
        if len >= 10 || !(c.is_ascii_alphanumeric() || c == '#') {
            return false;
        }
        len += 1;
    }
    false
}

/// Escape a string for use inside a double-quoted HTML attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape plain text content (no markup interpretation at all).
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        push_escaped_char(&mut out, c, rest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_escaped_not_dropped() {
        let out = sanitize_inline("<script>alert(1)</script>Hi");
        assert!(!out.contains("<script"));
        assert!(out.contains("Hi"));
        assert_eq!(out, "&lt;script&gt;alert(1)&lt;/script&gt;Hi");
    }

    #[test]
    fn allowed_tags_pass_through_normalized() {
        assert_eq!(sanitize_inline("Hello <b>world</b>"), "Hello <b>world</b>");
        assert_eq!(sanitize_inline("<EM>x</EM>"), "<em>x</em>");
    }

    #[test]
    fn anchor_keeps_only_safe_href() {
        assert_eq!(
            sanitize_inline(r#"<a href="https://example.com" onclick="evil()">go</a>"#),
            r#"<a href="https://example.com">go</a>"#
        );
        assert_eq!(
            sanitize_inline(r#"<a href="javascript:alert(1)">go</a>"#),
            "<a>go</a>"
        );
        assert_eq!(
            sanitize_inline(r#"<a href="mailto:hi@example.com">write</a>"#),
            r#"<a href="mailto:hi@example.com">write</a>"#
        );
    }

    #[test]
    fn attributes_on_other_tags_are_stripped() {
        assert_eq!(
            sanitize_inline(r#"<span style="font-size:99px">x</span>"#),
            "<span>x</span>"
        );
    }

    #[test]
    fn unclosed_tags_are_autoclosed() {
        assert_eq!(sanitize_inline("<b>bold"), "<b>bold</b>");
        assert_eq!(sanitize_inline("<b><i>x</b>"), "<b><i>x</i></b>");
    }

    #[test]
    fn stray_closers_are_dropped() {
        assert_eq!(sanitize_inline("x</b>y"), "xy");
    }

    #[test]
    fn entities_are_not_double_escaped() {
        assert_eq!(sanitize_inline("Fish &amp; chips"), "Fish &amp; chips");
        assert_eq!(sanitize_inline("A & B"), "A &amp; B");
        assert_eq!(sanitize_inline("&#160;"), "&#160;");
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        assert_eq!(sanitize_inline("1 < 2"), "1 &lt; 2");
        assert_eq!(sanitize_inline("a <"), "a &lt;");
    }
}
