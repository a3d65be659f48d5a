use thiserror::Error;

/// Errors surfaced by the coordinator handle.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The coordinator task is gone or a transport channel is closed.
    /// Callers treat this as soft failure; re-advertisement retries cover
    /// the transient cases.
    #[error("Realtime transport unavailable")]
    TransportUnavailable,
}
