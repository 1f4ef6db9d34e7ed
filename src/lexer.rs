//! Tokenizer for the two concrete ESML dialects.
//!
//! The XML-like form (`<ROW type="header"><COLUMN>...</COLUMN></ROW>`) and
//! the brace-delimited form (`ROW type=header { COLUMN { ... } }`) both
//! produce the same [`TagNode`] tree. The dialect is detected from the first
//! significant character: `<` selects the XML form, a bare identifier
//! selects the brace form.
//!
//! ESML tag names are UPPERCASE identifiers. A `<` followed by a lowercase
//! letter is not a tag: it is inline HTML content (`<b>`, `<span>`) captured
//! verbatim into the node's text, never re-tokenized. In the brace dialect
//! an ALL-CAPS word starts a child tag, so ALL-CAPS words inside text
//! content must be quoted or written in the XML dialect.
//!
//! Attribute values may be bare tokens, quoted strings, comma-separated
//! lists (`padding=12,0`) or JSON-like literals (`links=[{...}]`); bare
//! values are scanned with bracket/brace/quote balancing so nested commas
//! and delimiters stay inside the value.

use crate::error::{EsmlError, EsmlResult};

/// A parsed markup tag: name, ordered attributes, child tags and verbatim
/// text content. This is the lexer's output and the schema mapper's input.
#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    pub name: String,
    /// Attribute pairs in source order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<TagNode>,
    /// Concatenated non-tag content, trimmed; `None` when empty.
    pub text: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl TagNode {
    /// First value of the named attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Xml,
    Brace,
}

/// Parse a markup source into its single root tag. Strict: any malformed or
/// unbalanced markup is an error. This is the template-authoring entry
/// point; for streamed assistant output use [`parse_markup_lenient`].
pub fn parse_markup(source: &str) -> EsmlResult<TagNode> {
    let mut recovered = Vec::new();
    parse_roots(source, false, &mut recovered)
}

/// Parse a markup source, repairing what can be repaired: tags left open at
/// end of input are auto-closed (streamed model output is routinely
/// truncated mid-document) and multiple root tags are wrapped in a
/// synthetic `EMAIL`. Returns the tree plus the list of repairs made.
/// Only unrecoverable input (an empty document, garbage where a tag name
/// must be) is an error.
pub fn parse_markup_lenient(source: &str) -> EsmlResult<(TagNode, Vec<EsmlError>)> {
    let mut recovered = Vec::new();
    let node = parse_roots(source, true, &mut recovered)?;
    Ok((node, recovered))
}

fn parse_roots(source: &str, lenient: bool, recovered: &mut Vec<EsmlError>) -> EsmlResult<TagNode> {
    let mut sc = Scanner::new(source);
    sc.skip_trivia();
    if sc.eof() {
        return Err(EsmlError::EmptyDocument);
    }
    let dialect = if lenient {
        // Prose may precede the markup; pick the dialect from the first
        // real tag start anywhere in the input.
        detect_dialect(source)
    } else if sc.peek() == Some('<') {
        Dialect::Xml
    } else {
        Dialect::Brace
    };

    let mut roots = Vec::new();
    loop {
        sc.skip_trivia();
        if sc.eof() {
            break;
        }
        // Streamed output often carries prose around the markup; in lenient
        // mode skip to the next tag start instead of failing on it.
        if lenient && !at_tag_start(&sc, dialect) {
            recovered.push(EsmlError::Parse {
                line: sc.line,
                column: sc.column,
                message: "skipped non-markup content around top-level tags".to_string(),
            });
            while !sc.eof() && !at_tag_start(&sc, dialect) {
                sc.bump();
            }
            continue;
        }
        let node = match dialect {
            Dialect::Xml => parse_xml_tag(&mut sc, lenient, recovered)?,
            Dialect::Brace => parse_brace_tag(&mut sc, lenient, recovered)?,
        };
        roots.push(node);
    }

    match roots.len() {
        0 => Err(EsmlError::EmptyDocument),
        1 => Ok(roots.into_iter().next().unwrap()),
        _ if lenient => {
            recovered.push(EsmlError::MultipleRoots);
            Ok(TagNode {
                name: "EMAIL".to_string(),
                attributes: Vec::new(),
                children: roots,
                text: None,
                line: 1,
                column: 1,
            })
        }
        _ => Err(EsmlError::MultipleRoots),
    }
}

fn detect_dialect(source: &str) -> Dialect {
    let bytes = source.as_bytes();
    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i] == b'<' && bytes[i + 1].is_ascii_uppercase() {
            return Dialect::Xml;
        }
    }
    Dialect::Brace
}

fn at_tag_start(sc: &Scanner, dialect: Dialect) -> bool {
    match dialect {
        Dialect::Xml => {
            sc.peek() == Some('<') && sc.char_at(1).is_some_and(|c| c.is_ascii_uppercase())
        }
        Dialect::Brace => sc.upper_token_len().is_some(),
    }
}

// ─── XML dialect ─────────────────────────────────────────────────────────────

fn parse_xml_tag(
    sc: &mut Scanner,
    lenient: bool,
    recovered: &mut Vec<EsmlError>,
) -> EsmlResult<TagNode> {
    let line = sc.line;
    let column = sc.column;
    sc.expect('<')?;
    let name = sc.read_tag_name()?;
    let attributes = parse_attributes(sc, Dialect::Xml, lenient, recovered)?;
    sc.skip_ws();

    if sc.eat_str("/>") {
        return Ok(TagNode {
            name,
            attributes,
            children: Vec::new(),
            text: None,
            line,
            column,
        });
    }
    if !sc.eat('>') {
        if lenient && sc.eof() {
            recovered.push(EsmlError::UnclosedTag {
                tag: name.clone(),
                line,
                column,
            });
            return Ok(TagNode {
                name,
                attributes,
                children: Vec::new(),
                text: None,
                line,
                column,
            });
        }
        return Err(sc.parse_error(format!("expected '>' to close <{}>", name)));
    }

    let mut children = Vec::new();
    let mut text = String::new();
    loop {
        if sc.eof() {
            if lenient {
                recovered.push(EsmlError::UnclosedTag {
                    tag: name.clone(),
                    line,
                    column,
                });
                break;
            }
            return Err(EsmlError::UnclosedTag { tag: name, line, column });
        }

        if sc.starts_with("<!--") {
            sc.skip_comment();
            continue;
        }

        // Closing tag for this element or an ancestor. Lowercase closers
        // (`</b>`) are HTML content and fall through to the text run.
        if sc.starts_with("</") && sc.char_at(2).is_some_and(|c| c.is_ascii_uppercase()) {
            let close_line = sc.line;
            let close_column = sc.column;
            let checkpoint = sc.checkpoint();
            sc.bump();
            sc.bump();
            let close = sc.read_tag_name()?;
            sc.skip_ws();
            if !sc.eat('>') {
                if lenient {
                    recovered.push(EsmlError::UnclosedTag {
                        tag: name.clone(),
                        line,
                        column,
                    });
                    break;
                }
                return Err(sc.parse_error(format!("expected '>' after '</{}'", close)));
            }
            if close == name {
                break;
            }
            if lenient {
                // A closer for some ancestor: auto-close this tag and let
                // the ancestor consume it.
                recovered.push(EsmlError::UnclosedTag {
                    tag: name.clone(),
                    line,
                    column,
                });
                sc.restore(checkpoint);
                break;
            }
            return Err(EsmlError::UnexpectedClosingTag {
                tag: close,
                expected: name,
                line: close_line,
                column: close_column,
            });
        }

        if sc.peek() == Some('<') && sc.char_at(1).is_some_and(|c| c.is_ascii_uppercase()) {
            children.push(parse_xml_tag(sc, lenient, recovered)?);
            continue;
        }

        // Text run: everything up to the next ESML tag boundary, kept
        // verbatim (inline HTML included).
        let start = sc.pos;
        while !sc.eof() {
            if sc.peek() == Some('<') {
                if sc.char_at(1).is_some_and(|c| c.is_ascii_uppercase()) {
                    break;
                }
                if sc.starts_with("</") && sc.char_at(2).is_some_and(|c| c.is_ascii_uppercase()) {
                    break;
                }
                if sc.starts_with("<!--") {
                    break;
                }
            }
            sc.bump();
        }
        text.push_str(&sc.src[start..sc.pos]);
        if sc.pos == start {
            // Nothing consumed; avoid spinning on a stray '<'.
            sc.bump();
        }
    }

    Ok(TagNode {
        name,
        attributes,
        children,
        text: finish_text(text),
        line,
        column,
    })
}

// ─── Brace dialect ───────────────────────────────────────────────────────────

fn parse_brace_tag(
    sc: &mut Scanner,
    lenient: bool,
    recovered: &mut Vec<EsmlError>,
) -> EsmlResult<TagNode> {
    let line = sc.line;
    let column = sc.column;
    let name = sc.read_tag_name()?;
    let attributes = parse_attributes(sc, Dialect::Brace, lenient, recovered)?;
    sc.skip_ws();

    let mut children = Vec::new();
    let mut text = String::new();

    if sc.eat('{') {
        loop {
            sc.skip_ws();
            if sc.eof() {
                if lenient {
                    recovered.push(EsmlError::UnclosedTag {
                        tag: name.clone(),
                        line,
                        column,
                    });
                    break;
                }
                return Err(EsmlError::UnclosedTag { tag: name, line, column });
            }
            if sc.eat('}') {
                break;
            }
            if sc.upper_token_len().is_some() {
                children.push(parse_brace_tag(sc, lenient, recovered)?);
                continue;
            }

            // Text run up to the closing brace or the next ALL-CAPS token
            // at a word boundary.
            let start = sc.pos;
            let mut prev_ws = true;
            while !sc.eof() {
                let c = sc.peek().unwrap();
                if c == '}' {
                    break;
                }
                if prev_ws && sc.upper_token_len().is_some() {
                    break;
                }
                prev_ws = c.is_whitespace();
                sc.bump();
            }
            text.push_str(&sc.src[start..sc.pos]);
            if sc.pos == start {
                sc.bump();
            }
        }
    }
    // No body brace: self-closing equivalent, ends before the next tag.

    Ok(TagNode {
        name,
        attributes,
        children,
        text: finish_text(text),
        line,
        column,
    })
}

// ─── Attributes ──────────────────────────────────────────────────────────────

fn parse_attributes(
    sc: &mut Scanner,
    dialect: Dialect,
    lenient: bool,
    recovered: &mut Vec<EsmlError>,
) -> EsmlResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    loop {
        sc.skip_ws();
        match dialect {
            Dialect::Xml => {
                if sc.eof() || sc.peek() == Some('>') || sc.starts_with("/>") {
                    break;
                }
            }
            Dialect::Brace => {
                if sc.eof() || matches!(sc.peek(), Some('{') | Some('}')) {
                    break;
                }
            }
        }

        let checkpoint = sc.checkpoint();
        let name = sc.read_ident();
        if name.is_empty() {
            if dialect == Dialect::Brace {
                break;
            }
            return Err(sc.parse_error("unexpected character in tag attributes".to_string()));
        }

        sc.skip_ws();
        if !sc.eat('=') {
            if dialect == Dialect::Brace && name.chars().all(|c| !c.is_ascii_lowercase()) {
                // An ALL-CAPS token without '=' is the next tag, not an
                // attribute flag.
                sc.restore(checkpoint);
                break;
            }
            // Bare flag attribute: <ROW stackOnMobile>
            attrs.push((name, "true".to_string()));
            continue;
        }
        sc.skip_ws();
        let value = read_attr_value(sc, dialect, lenient, recovered)?;
        attrs.push((name, value));
    }
    Ok(attrs)
}

fn read_attr_value(
    sc: &mut Scanner,
    dialect: Dialect,
    lenient: bool,
    recovered: &mut Vec<EsmlError>,
) -> EsmlResult<String> {
    if let Some(quote) = sc.peek().filter(|c| *c == '"' || *c == '\'') {
        let line = sc.line;
        let column = sc.column;
        sc.bump();
        let mut value = String::new();
        loop {
            match sc.peek() {
                None => {
                    if lenient {
                        recovered.push(EsmlError::Parse {
                            line,
                            column,
                            message: "unterminated quoted attribute value".to_string(),
                        });
                        return Ok(value);
                    }
                    return Err(EsmlError::Parse {
                        line,
                        column,
                        message: "unterminated quoted attribute value".to_string(),
                    });
                }
                Some('\\') => {
                    sc.bump();
                    if let Some(c) = sc.bump() {
                        value.push(c);
                    }
                }
                Some(c) if c == quote => {
                    sc.bump();
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    sc.bump();
                }
            }
        }
    }

    // Bare value with delimiter balancing: `[`, `{`, `(` open, their
    // partners close, quoted runs pass through verbatim. Terminators only
    // count at depth zero.
    let start = sc.pos;
    let mut depth: usize = 0;
    let mut first = true;
    while let Some(c) = sc.peek() {
        let at_depth_zero = depth == 0;
        match c {
            '[' | '(' => depth += 1,
            '{' => {
                if at_depth_zero && !first {
                    break;
                }
                depth += 1;
            }
            ']' | ')' => {
                if at_depth_zero {
                    // Stray closer: keep it in the value.
                } else {
                    depth -= 1;
                }
            }
            '}' => {
                if at_depth_zero {
                    break;
                }
                depth -= 1;
            }
            '"' | '\'' => {
                sc.skip_quoted_run(c);
                first = false;
                continue;
            }
            '>' if at_depth_zero && dialect == Dialect::Xml => break,
            '/' if at_depth_zero
                && dialect == Dialect::Xml
                && sc.char_at(1) == Some('>') =>
            {
                break;
            }
            c if c.is_whitespace() && at_depth_zero => break,
            _ => {}
        }
        sc.bump();
        first = false;
    }
    Ok(sc.src[start..sc.pos].trim().to_string())
}

fn finish_text(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ─── Scanner ─────────────────────────────────────────────────────────────────

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    /// Character `n` chars ahead of the cursor.
    fn char_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            for _ in s.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> EsmlResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.parse_error(format!("expected '{}'", c)))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    /// Whitespace and XML comments between tags.
    fn skip_trivia(&mut self) {
        loop {
            self.skip_ws();
            if self.starts_with("<!--") {
                self.skip_comment();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        // Caller checked for "<!--"; consume until "-->" or end of input.
        while !self.eof() && !self.starts_with("-->") {
            self.bump();
        }
        self.eat_str("-->");
    }

    /// Consume a quoted run inside a bare attribute value, quotes included.
    fn skip_quoted_run(&mut self, quote: char) {
        self.bump();
        while let Some(c) = self.peek() {
            self.bump();
            if c == quote {
                break;
            }
        }
    }

    /// ESML tag name: `[A-Z][A-Z0-9_]*`.
    fn read_tag_name(&mut self) -> EsmlResult<String> {
        match self.peek() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => return Err(self.parse_error("expected a tag name (UPPERCASE identifier)".to_string())),
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Attribute name: `[A-Za-z_][A-Za-z0-9_-]*`. Empty when the cursor is
    /// not at an identifier.
    fn read_ident(&mut self) -> String {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return String::new(),
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    /// Length of an ALL-CAPS identifier token at the cursor, if the token
    /// as a whole is uppercase (`COLUMN` yes, `Hello` no).
    fn upper_token_len(&self) -> Option<usize> {
        let rest = &self.src[self.pos..];
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => return None,
        }
        let mut len = 1;
        for c in chars {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                len += 1;
            } else if c.is_ascii_lowercase() {
                return None;
            } else {
                break;
            }
        }
        Some(len)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn restore(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.line = cp.line;
        self.column = cp.column;
    }

    fn parse_error(&self, message: String) -> EsmlError {
        EsmlError::Parse {
            line: self.line,
            column: self.column,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_simple_nesting() {
        let tag = parse_markup("<EMAIL><ROW><COLUMN><TEXT>Hello</TEXT></COLUMN></ROW></EMAIL>")
            .unwrap();
        assert_eq!(tag.name, "EMAIL");
        assert_eq!(tag.children.len(), 1);
        let row = &tag.children[0];
        assert_eq!(row.name, "ROW");
        let text = &row.children[0].children[0];
        assert_eq!(text.name, "TEXT");
        assert_eq!(text.text.as_deref(), Some("Hello"));
    }

    #[test]
    fn brace_simple_nesting() {
        let tag = parse_markup("EMAIL { ROW type=header { COLUMN { TEXT content=\"Hi\" } } }")
            .unwrap();
        assert_eq!(tag.name, "EMAIL");
        let row = &tag.children[0];
        assert_eq!(row.attr("type"), Some("header"));
        let text = &row.children[0].children[0];
        assert_eq!(text.attr("content"), Some("Hi"));
    }

    #[test]
    fn bare_values_balance_delimiters() {
        let tag = parse_markup(
            r#"<SOCIALS links=[{platform:instagram,url:https://example.com/a},{platform:x,url:https://example.com/b}] align=center/>"#,
        )
        .unwrap();
        assert_eq!(
            tag.attr("links"),
            Some("[{platform:instagram,url:https://example.com/a},{platform:x,url:https://example.com/b}]")
        );
        assert_eq!(tag.attr("align"), Some("center"));
    }

    #[test]
    fn comma_list_stays_one_value() {
        let tag = parse_markup("<TEXT padding=12,0>Hi</TEXT>").unwrap();
        assert_eq!(tag.attr("padding"), Some("12,0"));
    }

    #[test]
    fn inline_html_is_verbatim_text() {
        let tag = parse_markup("<TEXT>Hello <b>world</b>, see <a href=\"https://x.com\">this</a></TEXT>")
            .unwrap();
        assert_eq!(
            tag.text.as_deref(),
            Some("Hello <b>world</b>, see <a href=\"https://x.com\">this</a>")
        );
        assert!(tag.children.is_empty());
    }

    #[test]
    fn self_closing_and_quoted_attrs() {
        let tag = parse_markup("<ROW><IMAGE src=\"https://cdn.example.com/a.png\" width=300/></ROW>")
            .unwrap();
        let img = &tag.children[0];
        assert_eq!(img.name, "IMAGE");
        assert_eq!(img.attr("src"), Some("https://cdn.example.com/a.png"));
        assert_eq!(img.attr("width"), Some("300"));
    }

    #[test]
    fn unbalanced_markup_is_a_parse_error() {
        let err = parse_markup("<EMAIL><ROW></EMAIL>").unwrap_err();
        assert!(matches!(err, EsmlError::UnexpectedClosingTag { .. }));

        let err = parse_markup("<EMAIL><ROW>").unwrap_err();
        assert!(matches!(err, EsmlError::UnclosedTag { .. }));
    }

    #[test]
    fn lenient_autocloses_truncated_stream() {
        let (tag, recovered) =
            parse_markup_lenient("<EMAIL><ROW><COLUMN><TEXT>partial sentence").unwrap();
        assert_eq!(tag.name, "EMAIL");
        let text = &tag.children[0].children[0].children[0];
        assert_eq!(text.text.as_deref(), Some("partial sentence"));
        assert!(!recovered.is_empty());
    }

    #[test]
    fn lenient_skips_prose_around_markup() {
        let (tag, recovered) = parse_markup_lenient(
            "Sure! Here is the email:\n<EMAIL><ROW><TEXT>Hi</TEXT></ROW></EMAIL>\nEnjoy!",
        )
        .unwrap();
        assert_eq!(tag.name, "EMAIL");
        assert_eq!(tag.children.len(), 1);
        assert_eq!(recovered.len(), 2);
    }

    #[test]
    fn empty_document_is_an_error() {
        assert_eq!(parse_markup("   \n  "), Err(EsmlError::EmptyDocument));
    }

    #[test]
    fn multiple_roots_strict_vs_lenient() {
        let src = "<ROW></ROW><ROW></ROW>";
        assert_eq!(parse_markup(src), Err(EsmlError::MultipleRoots));
        let (tag, recovered) = parse_markup_lenient(src).unwrap();
        assert_eq!(tag.name, "EMAIL");
        assert_eq!(tag.children.len(), 2);
        assert_eq!(recovered, vec![EsmlError::MultipleRoots]);
    }

    #[test]
    fn comments_are_skipped_between_tags() {
        let tag = parse_markup("<EMAIL><!-- header --><ROW></ROW></EMAIL>").unwrap();
        assert_eq!(tag.children.len(), 1);
    }

    #[test]
    fn brace_text_content() {
        let tag = parse_markup("TEXT { Hello world }").unwrap();
        assert_eq!(tag.text.as_deref(), Some("Hello world"));
    }

    #[test]
    fn positions_are_tracked() {
        let err = parse_markup("<EMAIL>\n  <ROW><column></ROW></EMAIL>").unwrap_err();
        match err {
            EsmlError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
