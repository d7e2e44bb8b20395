//! Tagged error kinds for the codec core, plus the application-scoped
//! error used by the ambient collector binary.

use thiserror::Error;

/// Severity attached to a [`CoreError`], mirroring the handling the
/// dispatcher (`handler::PlacementCollector`) gives each kind: `Fatal`
/// unwinds `parse` entirely, `Recoverable` skips the current set, and
/// `Programmer` indicates a misuse of the API that the caller should
/// have prevented (e.g. encoding against an inactive template).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Recoverable,
    Programmer,
}

/// Tagged (non-string) error kinds produced by the core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u16, got: u16 },

    #[error("truncated read mid-structure")]
    Truncated,

    #[error("malformed set: {reason}")]
    MalformedSet { reason: &'static str },

    #[error("data set references undefined template {tid}")]
    UnknownTemplate { tid: u16 },

    #[error("encode attempted on inactive template")]
    TemplateInactive,

    #[error("plan compilation failed for IE {ie}: {reason}")]
    PlanCompilationError { ie: String, reason: &'static str },

    #[error("sequence number gap: expected {expected}, got {got}")]
    SequenceGap { expected: u32, got: u32 },

    #[error("boolean octet out of range: {value}")]
    BooleanOutOfRange { value: u8 },

    #[error("encode buffer full")]
    EncodeBufferFull,
}

impl CoreError {
    /// The severity a conforming content handler / driver should apply.
    pub fn severity(&self) -> Severity {
        match self {
            CoreError::VersionMismatch { .. } => Severity::Recoverable,
            CoreError::Truncated => Severity::Fatal,
            CoreError::MalformedSet { .. } => Severity::Recoverable,
            CoreError::UnknownTemplate { .. } => Severity::Recoverable,
            CoreError::TemplateInactive => Severity::Programmer,
            CoreError::PlanCompilationError { .. } => Severity::Fatal,
            CoreError::SequenceGap { .. } => Severity::Recoverable,
            CoreError::BooleanOutOfRange { .. } => Severity::Recoverable,
            CoreError::EncodeBufferFull => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Carried alongside every `ContentHandler` return, per the dispatch
/// contract: `Ok(())` or a tagged [`CoreError`].
pub type ErrorContext = Result<(), CoreError>;

/// Application-level error for the ambient collector binary: wraps the
/// core's tagged errors alongside I/O and configuration failures so a
/// single `?`-chain can flow from socket read through dispatch.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
