/// Domain-level error type shared across the workspace.
///
/// HTTP handlers wrap this in their own response type; the variants here
/// carry only what the domain knows (entity names, messages), never status
/// codes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a not-found error on a job id.
    pub fn unknown_job(id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        }
    }
}
