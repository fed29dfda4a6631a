use std::fmt;

/// Error type for the PDF core: lexing, parsing, xref resolution, and
/// document construction all report through this enum.
#[derive(Debug, Clone)]
pub enum PdfError {
    /// The byte source does not start with a recognizable `%PDF-M.N` header.
    NotAPdf,

    /// A token did not match what the grammar expected at this position.
    MalformedToken { offset: usize, expected: String },

    /// The cursor ran out of bytes while a routine still expected more.
    UnexpectedEof { offset: usize },

    /// A cross-reference section or subsection failed to parse or violated
    /// one of its structural invariants.
    InvalidXRef { offset: usize, detail: String },

    /// A `Prev` chain revisited an offset already seen earlier in the walk.
    XRefChainCycle { offset: usize },

    /// A dictionary is missing a mandatory key.
    MissingRequiredEntry { dict: String, key: String },

    /// A stream named a `/Filter` this core does not implement.
    UnsupportedFilter { name: String },

    /// A stream named a `/Predictor` value this core does not implement.
    UnsupportedPredictor { value: i64 },

    /// An in-use xref entry's offset did not hold the object it claimed to.
    ObjectMismatch {
        xref_says: (u32, u16),
        found: (u32, u16),
    },

    /// No increment in the chain has an entry for this object.
    ObjectNotFound { obj_no: u32, gen_no: u16 },

    /// The document was queried before construction finished.
    NotReady,

    /// Failure reading the underlying byte source.
    Io(String),
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::NotAPdf => write!(f, "not a PDF file (missing %PDF-M.N header)"),
            PdfError::MalformedToken { offset, expected } => {
                write!(f, "malformed token at offset {offset}: expected {expected}")
            }
            PdfError::UnexpectedEof { offset } => {
                write!(f, "unexpected end of input at offset {offset}")
            }
            PdfError::InvalidXRef { offset, detail } => {
                write!(f, "invalid cross-reference section at offset {offset}: {detail}")
            }
            PdfError::XRefChainCycle { offset } => {
                write!(f, "cross-reference chain revisits offset {offset}")
            }
            PdfError::MissingRequiredEntry { dict, key } => {
                write!(f, "{dict} dictionary is missing required entry /{key}")
            }
            PdfError::UnsupportedFilter { name } => {
                write!(f, "unsupported filter /{name}")
            }
            PdfError::UnsupportedPredictor { value } => {
                write!(f, "unsupported predictor {value}")
            }
            PdfError::ObjectMismatch { xref_says, found } => {
                write!(
                    f,
                    "xref says object {}.{} but found {}.{} at that offset",
                    xref_says.0, xref_says.1, found.0, found.1
                )
            }
            PdfError::ObjectNotFound { obj_no, gen_no } => {
                write!(f, "object {obj_no} {gen_no} not found")
            }
            PdfError::NotReady => write!(f, "document queried before construction completed"),
            PdfError::Io(message) => write!(f, "I/O error: {message}"),
        }
    }
}

impl PdfError {
    pub fn malformed_token<S: Into<String>>(offset: usize, expected: S) -> Self {
        PdfError::MalformedToken {
            offset,
            expected: expected.into(),
        }
    }

    pub fn invalid_xref<S: Into<String>>(offset: usize, detail: S) -> Self {
        PdfError::InvalidXRef {
            offset,
            detail: detail.into(),
        }
    }

    pub fn missing_required_entry<S: Into<String>>(dict: S, key: S) -> Self {
        PdfError::MissingRequiredEntry {
            dict: dict.into(),
            key: key.into(),
        }
    }

    pub fn unsupported_filter<S: Into<String>>(name: S) -> Self {
        PdfError::UnsupportedFilter { name: name.into() }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        PdfError::Io(err.to_string())
    }
}

/// Result type alias for PDF core operations.
pub type PdfResult<T> = Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PdfError::malformed_token(12, "digit");
        assert_eq!(format!("{err}"), "malformed token at offset 12: expected digit");

        let err = PdfError::ObjectNotFound { obj_no: 4, gen_no: 0 };
        assert_eq!(format!("{err}"), "object 4 0 not found");

        let err = PdfError::XRefChainCycle { offset: 900 };
        assert_eq!(format!("{err}"), "cross-reference chain revisits offset 900");
    }

    #[test]
    fn test_error_chain_compatibility() {
        let err = PdfError::Io("file not found".to_string());
        let _dyn_err: &dyn std::error::Error = &err;
        let result: PdfResult<()> = Err(err);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_entry() {
        let err = PdfError::missing_required_entry("trailer", "Root");
        match err {
            PdfError::MissingRequiredEntry { dict, key } => {
                assert_eq!(dict, "trailer");
                assert_eq!(key, "Root");
            }
            _ => panic!("expected MissingRequiredEntry"),
        }
    }
}
