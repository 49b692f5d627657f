//! Typed error surface of the editing engine.
//!
//! Everything a mutating operation can report crosses the boundary as an
//! [`EditError`] value; the engine never panics at a caller in non-test
//! code. Presentation of these conditions is the UI collaborator's job.

/// Why an operation completed without touching any state.
///
/// A no-op is reported, not raised: the caller decides whether to surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// The operation requires a non-empty active palette.
    EmptyPalette,
    /// A merge classified zero pixels as the colour being dropped.
    NothingToMerge,
    /// A bounded selection produced no target colours to recolour against.
    EmptySelection,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoOpReason::EmptyPalette => write!(f, "the active palette is empty"),
            NoOpReason::NothingToMerge => {
                write!(f, "no pixels were assigned to the colour being merged")
            }
            NoOpReason::EmptySelection => write!(f, "no target colours could be selected"),
        }
    }
}

/// Error type for all editing-engine operations.
#[derive(Debug)]
pub enum EditError {
    /// Bad input rejected before any mutation (out-of-range canvas size,
    /// unknown palette code, stroke protocol violation).
    Validation(String),
    /// The operation had nothing to do; state is unchanged. Not fatal.
    NoOp(NoOpReason),
    /// External data could not be used (corrupt snapshot, bad catalog).
    Data(String),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Validation(msg) => write!(f, "Invalid input: {}", msg),
            EditError::NoOp(reason) => write!(f, "Nothing to do: {}", reason),
            EditError::Data(msg) => write!(f, "Data error: {}", msg),
        }
    }
}

impl std::error::Error for EditError {}

impl EditError {
    /// True for conditions the caller may treat as informational.
    pub fn is_noop(&self) -> bool {
        matches!(self, EditError::NoOp(_))
    }
}
