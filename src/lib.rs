//! # ESML: Email Script Markup Language
//!
//! Parser, document model, and email-client-safe HTML renderer for the
//! markup language marketing emails are authored in.
//!
//! ## Pipeline
//!
//! markup source → [`lexer`] (tag tree) → [`mapper`] (typed [`Email`]
//! document) → [`cascade`] (effective attributes per block) → [`render`]
//! (nested-table HTML). [`to_markup`] serializes a document back to markup
//! and [`validate`] is the strict structural gate.
//!
//! ## Example (XML dialect)
//! ```
//! let email = esml::parse(r#"
//! <EMAIL preview="June deals">
//!   <ROW type="header"><HEADING level=h1>Hello</HEADING></ROW>
//!   <ROW>
//!     <COLUMN width=6><TEXT>Left</TEXT></COLUMN>
//!     <COLUMN width=6><TEXT>Right</TEXT></COLUMN>
//!   </ROW>
//! </EMAIL>
//! "#).unwrap();
//!
//! assert_eq!(email.rows[1].columns.len(), 2);
//! let html = esml::render(&email);
//! assert!(html.contains("role=\"presentation\""));
//! ```
//!
//! ## Example (brace dialect)
//! ```
//! let email = esml::parse(r#"
//! EMAIL {
//!   ROW { COLUMN width=50% { TEXT content="Hi" } COLUMN width=50% { TEXT content="There" } }
//! }
//! "#).unwrap();
//! assert_eq!(email.rows[0].columns[0].span, 6);
//! ```
//!
//! Documents are values: every API takes `&Email` and returns new data, so
//! one snapshot can be shared by an editor canvas, a settings panel and a
//! context serializer without coordination.

pub mod blocks;
pub mod cascade;
pub mod document;
pub mod error;
pub mod lexer;
pub mod mapper;
pub mod render;
pub mod sanitize;
pub mod style;
pub mod validator;
pub mod writer;

// --- Core types ---
pub use blocks::Block;
pub use document::{Column, Email, Row, RowKind, StyleVariant};
pub use error::{EsmlError, EsmlResult};
pub use lexer::TagNode;

/// Parse ESML markup (either dialect) into an [`Email`] document.
///
/// Strict mode: malformed markup is an error. This is the right entry
/// point for stored templates; for streamed assistant output prefer
/// [`parse_lenient`].
pub fn parse(source: &str) -> EsmlResult<Email> {
    let tag = lexer::parse_markup(source)?;
    mapper::to_document(&tag)
}

/// Parse ESML markup, repairing truncation instead of failing on it.
///
/// Tags left open at end of input are auto-closed and multiple roots are
/// wrapped, so a partially streamed document still produces a usable tree.
/// Returns the document together with the repairs that were made.
pub fn parse_lenient(source: &str) -> EsmlResult<(Email, Vec<EsmlError>)> {
    let (tag, recovered) = lexer::parse_markup_lenient(source)?;
    let email = mapper::to_document(&tag)?;
    Ok((email, recovered))
}

/// Render a document to a self-contained, email-client-safe HTML fragment.
pub fn render(email: &Email) -> String {
    render::render(email)
}

/// Serialize a document back to XML-dialect ESML markup.
pub fn to_markup(email: &Email) -> String {
    writer::to_markup(email)
}

/// Validate structural invariants (grid sums, unique ids, hex colors,
/// positive width).
pub fn validate(email: &Email) -> EsmlResult<()> {
    validator::validate(email)
}
