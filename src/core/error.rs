use thiserror::Error;

/// Errors that can occur along the document pipeline.
///
/// Variants map one-to-one to the error taxonomy surfaced by the HTTP
/// layer; intermediate layers propagate the kind unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturaError {
    /// One or more validation rules failed on the incoming document.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The UBL builder could not produce a document tree.
    #[error("builder error: {0}")]
    Builder(String),

    /// The signer could not be initialized (missing key or certificate).
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    /// Signing an otherwise valid document failed.
    #[error("signature error: {0}")]
    Signature(String),

    /// Network-level failure talking to the tax authority. Retriable.
    #[error("transport error: {0}")]
    Transport(String),

    /// SUNAT rejected the document with an application-level fault.
    /// The fault string is preserved verbatim.
    #[error("rejected by SUNAT ({code}): {message}")]
    Rejected { code: String, message: String },

    /// Document id or business tuple not known.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate id on save.
    #[error("conflict: {0}")]
    Conflict(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

impl FacturaError {
    /// HTTP status code for this error. Used only by the HTTP layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Rejected { .. } => 422,
            Self::Transport(_) => 502,
            Self::Builder(_) | Self::SignerUnavailable(_) | Self::Signature(_) | Self::Xml(_) => {
                500
            }
        }
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "receptor.num_doc").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collapse a list of validation errors into a single [`FacturaError`].
pub fn validation_failure(errors: &[ValidationError]) -> FacturaError {
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    FacturaError::Validation(joined)
}
