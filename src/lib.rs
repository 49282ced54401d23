//! Docstring Patcher: rewrites the docstrings of Python source files.
//!
//! Documentable elements (the module, classes, functions, methods) are
//! located with tree-sitter, each one is sent to an annotation provider, and
//! the returned text is patched into the file. Every byte outside the
//! docstring regions is preserved.
//!
//! # Architecture
//!
//! All edits are line-range operations expressed in the coordinates of the
//! original file: [`PatchOp`]. A [`RewriteSession`] owns the buffer and a
//! running line offset, translating each op into current-buffer coordinates
//! as ops are applied in ascending order. Intelligence lives in span
//! acquisition ([`extract_elements`]), not in the application logic.
//!
//! # Safety
//!
//! - Removed docstring text is verified before it is replaced
//! - Out-of-order, overlapping and out-of-bounds ops are rejected
//! - Rewritten text is re-parsed before it is persisted
//! - Atomic file writes (tempfile + fsync + rename), once per file
//!
//! # Example
//!
//! ```no_run
//! use docstring_patcher::{
//!     Annotation, AnnotationError, AnnotationProvider, ElementKind, RewriteOptions, Rewriter,
//! };
//!
//! struct Fixed;
//!
//! impl AnnotationProvider for Fixed {
//!     fn annotate(&self, _: ElementKind, _: &str) -> Result<Annotation, AnnotationError> {
//!         Ok(Annotation::new("Documented."))
//!     }
//! }
//!
//! let rewriter = Rewriter::new(Fixed, RewriteOptions::default());
//! let rewrite = rewriter.rewrite_source("def f():\n    return 1\n").unwrap();
//! println!("{}", rewrite.text);
//! ```

pub mod config;
pub mod extract;
pub mod format;
pub mod output;
pub mod patch;
pub mod pool;
pub mod provider;
pub mod rewrite;
pub mod select;
pub mod ts;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PatcherConfig, ProviderSettings};
pub use extract::{extract_elements, list_elements, Element, ElementKind, LineSpan};
pub use format::{format_docstring, FormatStyle};
pub use output::{OutputError, OutputMode};
pub use patch::{AppliedPatch, EditVerification, PatchOp, PatchRangeError, RewriteSession};
pub use provider::{Annotation, AnnotationError, AnnotationProvider, OpenAiProvider};
pub use rewrite::{
    ElementOutcome, ElementState, FileReport, FileStatus, RewriteError, RewriteOptions, Rewriter,
    SkipReason, SourceRewrite,
};
pub use select::SelectError;
pub use ts::{ParseError, PythonParser};
