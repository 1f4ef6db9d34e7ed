use thiserror::Error;

pub type EsmlResult<T> = Result<T, EsmlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EsmlError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unclosed tag '{tag}' opened at line {line}, column {column}")]
    UnclosedTag {
        tag: String,
        line: usize,
        column: usize,
    },

    #[error("Unexpected closing tag '</{tag}>' at line {line}, column {column}: expected '</{expected}>'")]
    UnexpectedClosingTag {
        tag: String,
        expected: String,
        line: usize,
        column: usize,
    },

    #[error("Empty document: no tags found")]
    EmptyDocument,

    #[error("Multiple root tags found. An ESML document must have exactly one root tag")]
    MultipleRoots,

    #[error("Unknown tag '{tag}': {reason}")]
    UnknownTag { tag: String, reason: String },

    #[error("Missing required attribute '{attribute}' on <{tag}>")]
    MissingAttribute { tag: String, attribute: String },

    #[error("Invalid attribute '{attribute}' on <{tag}>: {reason}")]
    InvalidAttribute {
        tag: String,
        attribute: String,
        reason: String,
    },

    // --- structural validation ---

    #[error("Column spans in row '{row_id}' sum to {sum}, expected 12")]
    GridSum { row_id: String, sum: u32 },

    #[error("Invalid span {span} for column '{column_id}': must be between 1 and 12")]
    InvalidSpan { column_id: String, span: u32 },

    #[error("Duplicate id '{id}': node ids must be unique within the document")]
    DuplicateId { id: String },

    #[error("Invalid color value '{value}': {reason}")]
    InvalidColor { value: String, reason: String },

    #[error("Invalid email width '{value}': must be a positive integer")]
    InvalidWidth { value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for EsmlError {
    fn from(err: serde_json::Error) -> Self {
        EsmlError::Json(err.to_string())
    }
}
