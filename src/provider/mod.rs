//! Annotation providers: the external collaborators that produce new
//! docstring text for an element.
//!
//! The rewrite engine only sees the [`AnnotationProvider`] trait. A failed
//! call never aborts a file; the element is skipped.

pub mod openai;

use crate::extract::ElementKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use openai::OpenAiProvider;

/// Response of a provider for one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub doc_string: String,
}

impl Annotation {
    pub fn new(doc_string: impl Into<String>) -> Self {
        Self {
            doc_string: doc_string.into(),
        }
    }

    /// Validate a JSON object against the expected response shape: a
    /// `doc_string` key holding a string.
    pub fn from_json(value: &Value) -> Result<Self, AnnotationError> {
        let object = value.as_object().ok_or_else(|| {
            AnnotationError::Malformed("response is not a JSON object".to_string())
        })?;
        match object.get("doc_string") {
            Some(Value::String(doc)) => Ok(Self::new(doc.clone())),
            Some(other) => Err(AnnotationError::Malformed(format!(
                "'doc_string' must be a string, got {}",
                json_type(other)
            ))),
            None => Err(AnnotationError::Malformed("missing 'doc_string' key".to_string())),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, AnnotationError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AnnotationError::Malformed(format!("invalid JSON: {e}")))?;
        Self::from_json(&value)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("{0} elements are not supported by this provider")]
    UnsupportedKind(ElementKind),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),
}

/// Produces docstring text for an element's source.
///
/// Implementations must be shareable across threads: annotation requests
/// for one file may be issued concurrently.
pub trait AnnotationProvider: Send + Sync {
    fn annotate(&self, kind: ElementKind, source_text: &str) -> Result<Annotation, AnnotationError>;
}

impl<P: AnnotationProvider + ?Sized> AnnotationProvider for Box<P> {
    fn annotate(
        &self,
        kind: ElementKind,
        source_text: &str,
    ) -> Result<Annotation, AnnotationError> {
        (**self).annotate(kind, source_text)
    }
}

impl<P: AnnotationProvider + ?Sized> AnnotationProvider for &P {
    fn annotate(
        &self,
        kind: ElementKind,
        source_text: &str,
    ) -> Result<Annotation, AnnotationError> {
        (**self).annotate(kind, source_text)
    }
}
