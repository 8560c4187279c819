use thiserror::Error;

/// Result type alias for permission operations.
pub type Result<T> = std::result::Result<T, PermissionError>;

/// Errors produced while parsing, comparing, or reshaping permissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The text is not a well-formed node or group.
    ///
    /// Valid text starts with a letter, contains at least one `.`, has no
    /// empty segments, and places `*` only as the final segment of a group.
    #[error("invalid permission: {input:?}")]
    InvalidPermission {
        /// The rejected input, as given.
        input: String,
    },

    /// One of the operands of a comparison is not a valid permission of the
    /// kind the comparison needs.
    #[error("cannot compare {left:?} with {right:?}")]
    InvalidComparison {
        /// Left operand, as given.
        left: String,
        /// Right operand, as given.
        right: String,
    },

    /// A broaden depth that would leave no concrete segment (or broaden nothing).
    #[error("broaden depth {depth} out of bounds for {len} segment(s)")]
    DepthOutOfBounds {
        /// Requested depth.
        depth: usize,
        /// Number of concrete segments available.
        len: usize,
    },

    /// Removal through a whole collection was requested.
    ///
    /// Flatten the collection into an explicit batch instead.
    #[error("removing permissions via a whole collection is not supported; pass an explicit batch")]
    UnsupportedBulkRemoval,

    /// A value of one kind was converted into an incompatible kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the conversion required.
        expected: &'static str,
        /// Kind that was supplied.
        found: &'static str,
    },
}

impl PermissionError {
    pub(crate) fn invalid(input: impl Into<String>) -> Self {
        PermissionError::InvalidPermission {
            input: input.into(),
        }
    }
}
