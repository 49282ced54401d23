//! Per-file orchestration: extract elements, annotate them, format the
//! annotations and feed the resulting ops to the patch engine.
//!
//! Elements are processed in ascending line order. An element whose
//! annotation fails is skipped: its region stays untouched and it
//! contributes nothing to the running offset. A patch engine failure aborts
//! the whole file and nothing is written. Persistence happens once per file,
//! after every element has been handled.

use crate::config::RewriteSettings;
use crate::extract::{list_elements, Element, ElementKind, LineSpan};
use crate::format::{format_docstring, FormatStyle};
use crate::output::{self, OutputError, OutputMode};
use crate::patch::{AppliedPatch, EditVerification, PatchOp, PatchRangeError, RewriteSession};
use crate::provider::{Annotation, AnnotationError, AnnotationProvider};
use crate::ts::{validate_syntax, ParseError};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    pub mode: OutputMode,
    /// Annotation requests in flight per file; 1 means strictly sequential.
    pub concurrency: usize,
    pub kinds: Vec<ElementKind>,
    pub style: FormatStyle,
    pub validate_output: bool,
    /// Compute the rewrite without persisting it.
    pub dry_run: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::from(&RewriteSettings::default())
    }
}

impl From<&RewriteSettings> for RewriteOptions {
    fn from(settings: &RewriteSettings) -> Self {
        Self {
            mode: settings.mode,
            concurrency: settings.concurrency.max(1),
            kinds: settings.kinds.clone(),
            style: settings.style(),
            validate_output: settings.validate_output,
            dry_run: false,
        }
    }
}

/// Lifecycle of one element within a file rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Extracted,
    Annotating,
    Patching,
    Done,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    KindDisabled,
    InlineBody,
    EmptyDocstring,
    /// The formatted block would not parse on its own.
    InvalidDocstring(String),
    Annotation(AnnotationError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::KindDisabled => write!(f, "element kind not selected"),
            SkipReason::InlineBody => {
                write!(f, "body shares a line with the header or docstring")
            }
            SkipReason::EmptyDocstring => write!(f, "provider returned an empty docstring"),
            SkipReason::InvalidDocstring(err) => write!(f, "formatted docstring is invalid: {err}"),
            SkipReason::Annotation(err) => write!(f, "annotation failed: {err}"),
        }
    }
}

/// What happened to one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementOutcome {
    pub kind: ElementKind,
    pub name: Option<String>,
    pub span: LineSpan,
    pub state: ElementState,
    pub skip_reason: Option<SkipReason>,
    pub patch: Option<AppliedPatch>,
}

impl ElementOutcome {
    fn new(element: &Element) -> Self {
        Self {
            kind: element.kind,
            name: element.name.clone(),
            span: element.span(),
            state: ElementState::Extracted,
            skip_reason: None,
            patch: None,
        }
    }

    fn advance(&mut self, state: ElementState) {
        tracing::debug!(
            kind = %self.kind,
            name = self.name.as_deref().unwrap_or("-"),
            lines = %self.span,
            from = ?self.state,
            to = ?state,
            "element state"
        );
        self.state = state;
    }

    fn skip(&mut self, reason: SkipReason) {
        tracing::warn!(
            kind = %self.kind,
            name = self.name.as_deref().unwrap_or("-"),
            lines = %self.span,
            %reason,
            "skipping element"
        );
        self.advance(ElementState::Skipped);
        self.skip_reason = Some(reason);
    }

    fn finish(&mut self, patch: AppliedPatch) {
        self.advance(ElementState::Done);
        self.patch = Some(patch);
    }

    pub fn is_patched(&self) -> bool {
        self.state == ElementState::Done
    }
}

/// Result of rewriting one source text in memory.
#[derive(Debug, Clone)]
pub struct SourceRewrite {
    pub original: String,
    pub text: String,
    pub outcomes: Vec<ElementOutcome>,
    pub cumulative_offset: isize,
}

impl SourceRewrite {
    pub fn changed(&self) -> bool {
        self.text != self.original
    }

    pub fn patched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_patched()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == ElementState::Skipped)
            .count()
    }
}

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse source: {0}")]
    Parse(#[from] ParseError),

    #[error("patching {element} failed: {source}")]
    Patch {
        element: String,
        #[source]
        source: PatchRangeError,
    },

    #[error("rewritten source no longer parses: {0}")]
    Validation(#[source] ParseError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Rewritten text was persisted to `output`.
    Rewritten { output: PathBuf },
    /// Dry run: rewritten text would go to `output`.
    DryRun { output: PathBuf },
    /// No element received a new docstring; nothing written.
    Unchanged,
    /// Not a Python source file; nothing done.
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub rewrite: Option<SourceRewrite>,
}

/// Drives the rewrite of whole files against one annotation provider.
pub struct Rewriter<P> {
    provider: P,
    options: RewriteOptions,
}

impl<P: AnnotationProvider> Rewriter<P> {
    pub fn new(provider: P, options: RewriteOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    /// Rewrite one file and persist the result according to the run mode.
    pub fn rewrite_file(&self, path: &Path) -> Result<FileReport, RewriteError> {
        if !output::is_supported(path) {
            tracing::info!(path = %path.display(), "not a Python source file, skipping");
            return Ok(FileReport {
                path: path.to_path_buf(),
                status: FileStatus::Unsupported,
                rewrite: None,
            });
        }

        let source = fs::read_to_string(path).map_err(|source| RewriteError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let rewrite = self.rewrite_source(&source).inspect_err(|err| {
            tracing::error!(path = %path.display(), error = %err, "file rewrite failed");
        })?;

        let destination = output::output_path(path, self.options.mode)?;
        let status = if !rewrite.changed() {
            FileStatus::Unchanged
        } else if self.options.dry_run {
            FileStatus::DryRun {
                output: destination,
            }
        } else {
            output::persist(&destination, &rewrite.text)?;
            tracing::info!(
                path = %path.display(),
                output = %destination.display(),
                patched = rewrite.patched(),
                skipped = rewrite.skipped(),
                "wrote rewritten file"
            );
            FileStatus::Rewritten {
                output: destination,
            }
        };

        Ok(FileReport {
            path: path.to_path_buf(),
            status,
            rewrite: Some(rewrite),
        })
    }

    /// Rewrite `source` in memory.
    pub fn rewrite_source(&self, source: &str) -> Result<SourceRewrite, RewriteError> {
        let elements = list_elements(source)?;
        let original_lines: Vec<&str> = source.split_inclusive('\n').collect();

        let mut prefetched = (self.options.concurrency > 1).then(|| self.prefetch(&elements));
        let mut session = RewriteSession::new(source);
        let mut outcomes = Vec::with_capacity(elements.len());

        for (index, element) in elements.iter().enumerate() {
            let mut outcome = ElementOutcome::new(element);

            if let Some(reason) = self.precheck(element) {
                outcome.skip(reason);
                outcomes.push(outcome);
                continue;
            }

            outcome.advance(ElementState::Annotating);
            let result = prefetched
                .as_mut()
                .and_then(|results| results.get_mut(index).and_then(Option::take))
                .unwrap_or_else(|| self.provider.annotate(element.kind, &element.source));

            let annotation = match result {
                Ok(annotation) if annotation.doc_string.trim().is_empty() => {
                    outcome.skip(SkipReason::EmptyDocstring);
                    outcomes.push(outcome);
                    continue;
                }
                Ok(annotation) => annotation,
                Err(err) => {
                    outcome.skip(SkipReason::Annotation(err));
                    outcomes.push(outcome);
                    continue;
                }
            };

            let block =
                format_docstring(&annotation.doc_string, element.body_indent, self.options.style);
            if let Err(err) = check_block(&block, element.body_indent) {
                outcome.skip(SkipReason::InvalidDocstring(err.to_string()));
                outcomes.push(outcome);
                continue;
            }

            outcome.advance(ElementState::Patching);
            let op = build_op(element, block, &original_lines);
            let applied = session.apply(&op).map_err(|source| {
                tracing::error!(
                    element = %element.label(),
                    offset = session.cumulative_offset(),
                    error = %source,
                    "patch engine rejected op"
                );
                RewriteError::Patch {
                    element: element.label(),
                    source,
                }
            })?;
            outcome.finish(applied);
            outcomes.push(outcome);
        }

        let cumulative_offset = session.cumulative_offset();
        let text = session.into_text();
        if self.options.validate_output && text != source {
            validate_syntax(&text).map_err(RewriteError::Validation)?;
        }

        Ok(SourceRewrite {
            original: source.to_string(),
            text,
            outcomes,
            cumulative_offset,
        })
    }

    fn precheck(&self, element: &Element) -> Option<SkipReason> {
        if !self.options.kinds.contains(&element.kind) {
            Some(SkipReason::KindDisabled)
        } else if element.inline_body {
            Some(SkipReason::InlineBody)
        } else {
            None
        }
    }

    /// Issue every annotation request up front, at most `concurrency` at a
    /// time. Results keep element order.
    fn prefetch(&self, elements: &[Element]) -> Vec<Option<Result<Annotation, AnnotationError>>> {
        let fetch = |element: &Element| {
            self.precheck(element)
                .is_none()
                .then(|| self.provider.annotate(element.kind, &element.source))
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency)
            .build()
        {
            Ok(pool) => pool.install(|| elements.par_iter().map(fetch).collect()),
            Err(err) => {
                tracing::warn!(error = %err, "thread pool unavailable, annotating sequentially");
                elements.iter().map(fetch).collect()
            }
        }
    }
}

/// Parse a formatted block in isolation, nested under a header when it is
/// indented.
fn check_block(block: &str, indent: usize) -> Result<(), ParseError> {
    if indent == 0 {
        validate_syntax(&format!("{block}\n"))
    } else {
        validate_syntax(&format!("if True:\n{block}\n"))
    }
}

/// Turn a formatted docstring block into a patch op in original coordinates.
fn build_op(element: &Element, mut block: String, original_lines: &[&str]) -> PatchOp {
    match element.existing_docstring_span {
        Some(span) => {
            if let Some(trailer) = &element.docstring_trailer {
                block.push_str(trailer);
            }
            let op = PatchOp::replace(span, block);
            match original_lines.get(span.start.saturating_sub(1)..span.end) {
                Some(lines) => op.verified(EditVerification::from_text(&lines.concat())),
                None => op,
            }
        }
        None => PatchOp::insert_after(element.header_end_line, block),
    }
}
