pub mod core;

pub use core::{
    ByteCursor, Dictionary, Document, Increment, Name, Numeric, Object, ObjectParser, OpenOptions,
    PdfError, PdfResult, Progress, ProgressHandle, XRefEntry, XRefSection, XRefSubsection,
};
