/// An error encountered while decoding a module or applying a mutation.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl Error {
    /// Construct a new `Error` from an `ErrorKind`.
    pub fn new(kind: ErrorKind) -> Self {
        kind.into()
    }

    /// Construct a truncated-input error at the given byte offset.
    pub fn truncated(offset: usize) -> Self {
        ErrorKind::TruncatedInput { offset }.into()
    }

    /// Construct a malformed-varint error at the given byte offset.
    pub fn malformed_varint(offset: usize) -> Self {
        ErrorKind::MalformedVarint { offset }.into()
    }

    /// Construct an unknown-choice-tag error.
    pub fn unknown_tag(tag: u64, offset: usize) -> Self {
        ErrorKind::UnknownChoiceTag { tag, offset }.into()
    }

    /// Construct an invariant-violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        ErrorKind::InvariantViolation(msg.into()).into()
    }

    /// Get the kind of error that this is.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }
}

/// The kind of error.
#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    /// The input buffer ended before a field could be fully decoded.
    #[error("unexpected end of input at offset {offset:#x}")]
    TruncatedInput {
        /// Byte offset at which more input was required.
        offset: usize,
    },

    /// A LEB128 value did not terminate within its maximum group count, or
    /// carried set bits beyond the target bit width.
    #[error("malformed varint at offset {offset:#x}")]
    MalformedVarint {
        /// Byte offset of the first byte of the varint.
        offset: usize,
    },

    /// A tagged-union selector matched none of the declared alternatives.
    #[error("unknown choice tag {tag} at offset {offset:#x}")]
    UnknownChoiceTag {
        /// The selector value that had no matching alternative.
        tag: u64,
        /// Byte offset at which the union would have been decoded.
        offset: usize,
    },

    /// Fix-up could not restore a length or count invariant.
    #[error("length invariant violated: {0}")]
    InvariantViolation(String),
}

impl ErrorKind {
    /// A short, stable name for this kind, used for tallying failures.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::TruncatedInput { .. } => "truncated input",
            ErrorKind::MalformedVarint { .. } => "malformed varint",
            ErrorKind::UnknownChoiceTag { .. } => "unknown choice tag",
            ErrorKind::InvariantViolation(_) => "invariant violation",
        }
    }
}

/// A `Result` type that is either `Ok(T)` or `Err(wasm_scramble::Error)`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
