pub mod cursor;
pub mod document;
pub mod error;
pub mod filters;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

pub use cursor::ByteCursor;
pub use document::{Document, Increment, OpenOptions, Progress, ProgressHandle};
pub use error::{PdfError, PdfResult};
pub use object::{Dictionary, Name, Numeric, Object};
pub use parser::ObjectParser;
pub use xref::{XRefEntry, XRefSection, XRefSubsection};
