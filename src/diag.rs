//! Error kinds produced while building and checking a program set.
//!
//! Mirrors the separation metamath-knife draws between diagnostic *kinds* and
//! their rendering: [`CheckerError`] carries only the data needed to decide
//! what went wrong, and [`CheckerError::render`] is the only place that turns
//! it into text, using `annotate-snippets` the same way the teacher's
//! `diag::to_annotations` turns a `Notation` into a printable report.
//!
//! Configuration and internal errors propagate to the caller uncaught (see
//! the propagation policy in the distilled spec's error handling section).
//! `AssertionFailure` is deliberately not a variant here: it never escapes
//! the explorer, it is carried as data inside `RunFailure`.

use std::fmt;

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};

/// A label referenced by an op or a sentinel but never defined, or found
/// twice, or otherwise structurally wrong -- none of these can be recovered
/// from, so they always abort the checking run before search begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A variable reference does not exist in the memory map.
    UnknownVariable { reference: String },
    /// A value assigned or compared against a variable is outside its
    /// declared domain.
    OutOfDomain { reference: String, value: String },
    /// `with atomic:` blocks were nested; atomic regions may not nest.
    NestedAtomic { program: String },
    /// `AtomicSentinel::Enter`/`Exit` did not alternate strictly, or the
    /// sequence ended still inside an atomic region.
    UnbalancedAtomicSentinels { program: String },
    /// A `goto`/`cond` target label does not resolve in the program's label
    /// table.
    UnknownLabel { program: String, label: String },
    /// The domain specification itself was malformed (e.g. an empty integer
    /// range, or a repeated variable name).
    MalformedDomain { detail: String },
    /// `break` used outside any enclosing `while`. The front-end parser
    /// would ordinarily catch this as a `SyntaxError`, but the reference
    /// lowering in `crate::lower` has no source spans to report, so it
    /// surfaces the same underlying problem as a `ConfigurationError`.
    BreakOutsideLoop { program: String },
    /// `continue` used outside any enclosing `while`.
    ContinueOutsideLoop { program: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::UnknownVariable { reference } => {
                write!(f, "unknown variable `{reference}`")
            }
            ConfigurationError::OutOfDomain { reference, value } => {
                write!(f, "value `{value}` is out of domain for `{reference}`")
            }
            ConfigurationError::NestedAtomic { program } => {
                write!(f, "nested atomic region in program `{program}`")
            }
            ConfigurationError::UnbalancedAtomicSentinels { program } => {
                write!(
                    f,
                    "unbalanced atomic sentinels in program `{program}`"
                )
            }
            ConfigurationError::UnknownLabel { program, label } => {
                write!(f, "program `{program}` jumps to unknown label `{label}`")
            }
            ConfigurationError::MalformedDomain { detail } => {
                write!(f, "malformed domain specification: {detail}")
            }
            ConfigurationError::BreakOutsideLoop { program } => {
                write!(f, "`break` outside a loop in program `{program}`")
            }
            ConfigurationError::ContinueOutsideLoop { program } => {
                write!(f, "`continue` outside a loop in program `{program}`")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// A bug in this crate's own builder or explorer, as opposed to a problem
/// with caller input. Must never be masked; callers should treat this as a
/// panic-equivalent they are allowed to `unwrap()` through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalInvariantViolation {
    /// `Op::step` jumped to a label index that passed label-table
    /// construction but does not exist in `ops` at run time.
    LabelResolvedOutOfBounds { program: String, label: String },
    /// A traceback step found zero or more than one differing position
    /// component between consecutive states.
    MalformedTraceback { expected: usize, found: usize },
}

impl fmt::Display for InternalInvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalInvariantViolation::LabelResolvedOutOfBounds { program, label } => {
                write!(
                    f,
                    "internal error: program `{program}` resolved label `{label}` out of bounds"
                )
            }
            InternalInvariantViolation::MalformedTraceback { expected, found } => {
                write!(
                    f,
                    "internal error: traceback expected exactly 1 differing position, found {found} (expected {expected})"
                )
            }
        }
    }
}

impl std::error::Error for InternalInvariantViolation {}

/// Surfaced with filename/line/column by the front-end parser described in
/// the distilled spec's §4.5. This crate never constructs one -- lowering
/// structured statements to ops (`crate::lower`) only ever fails with
/// [`ConfigurationError`] -- but the variant documents the contract an
/// external parser is expected to honor before handing a `Program` to this
/// crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Top-level error type returned by anything that builds a `Program` or a
/// `MemoryMap` before a checking run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckerError {
    Configuration(ConfigurationError),
    Internal(InternalInvariantViolation),
    Syntax(SyntaxError),
}

impl fmt::Display for CheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckerError::Configuration(e) => write!(f, "{e}"),
            CheckerError::Internal(e) => write!(f, "{e}"),
            CheckerError::Syntax(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CheckerError {}

impl From<ConfigurationError> for CheckerError {
    fn from(e: ConfigurationError) -> Self {
        CheckerError::Configuration(e)
    }
}

impl From<InternalInvariantViolation> for CheckerError {
    fn from(e: InternalInvariantViolation) -> Self {
        CheckerError::Internal(e)
    }
}

impl From<SyntaxError> for CheckerError {
    fn from(e: SyntaxError) -> Self {
        CheckerError::Syntax(e)
    }
}

/// Renders a [`CheckerError`] as a one-paragraph annotated snippet, the way
/// metamath-knife's `diag::to_annotations` renders a `Notation` for display.
/// Configuration and internal errors carry no source span of their own (the
/// core has no source text), so the "snippet" is just the message on its own
/// line; this still gets us consistent severity labelling and colorization
/// from `annotate-snippets`.
pub fn render(error: &CheckerError) -> String {
    let label = error.to_string();
    let annotation_type = match error {
        CheckerError::Internal(_) => AnnotationType::Error,
        CheckerError::Configuration(_) => AnnotationType::Error,
        CheckerError::Syntax(_) => AnnotationType::Error,
    };
    let snippet = Snippet {
        title: Some(Annotation {
            id: None,
            label: Some(&label),
            annotation_type,
        }),
        footer: vec![],
        slices: vec![Slice {
            source: "",
            line_start: 1,
            origin: None,
            fold: false,
            annotations: Vec::<SourceAnnotation>::new(),
        }],
        opt: FormatOptions {
            color: true,
            ..Default::default()
        },
    };
    DisplayList::from(snippet).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn configuration_error_converts_and_displays() {
        let e: CheckerError = ConfigurationError::UnknownVariable {
            reference: "turn".into(),
        }
        .into();
        assert_matches!(e, CheckerError::Configuration(_));
        assert_eq!(e.to_string(), "unknown variable `turn`");
    }

    #[test]
    fn render_includes_message() {
        let e: CheckerError = InternalInvariantViolation::MalformedTraceback {
            expected: 1,
            found: 0,
        }
        .into();
        let text = render(&e);
        assert!(text.contains("malformed"));
    }
}
