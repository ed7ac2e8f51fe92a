use thiserror::Error;

/// Result type alias for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors that can occur while turning raw JSON into a [`crate::Report`].
///
/// Everything below the root object degrades to "absent" instead of failing,
/// so the list is short on purpose.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The document root was valid JSON but not an object.
    #[error("report root must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// The document was not valid JSON.
    #[error("report parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
