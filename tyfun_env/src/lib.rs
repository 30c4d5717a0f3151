//! Source tracking and location types for Tyfun.
//!
//! Every other crate depends on this crate for attaching
//! source locations to tokens, AST nodes and diagnostics.

mod loc;
mod source;

pub use loc::{Unit, Pos, Span, Spanned, WithLoc};
pub use source::{Source, SourceFile, SourceLineSpans};
