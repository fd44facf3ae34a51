use thiserror::Error;

/// Failure categories the poll loop cares about. Everything here is scoped to
/// a single record — none of these terminate the loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network or timeout failure that survived the bounded retries.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The revision call returned content identical to the input, twice.
    /// The record is left untouched for manual inspection.
    #[error("revision made no progress for record {0}")]
    NoProgress(String),

    /// Record is missing a field the pipeline requires.
    #[error("malformed record {id}: missing field `{field}`")]
    Malformed { id: String, field: &'static str },
}
