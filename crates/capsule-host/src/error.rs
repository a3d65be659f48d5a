use thiserror::Error;

/// Errors produced by the host-side state layer.
#[derive(Error, Debug)]
pub enum HostError {
    /// The backing store could not be queried (poisoned lock). The
    /// capability gate treats this as denied.
    #[error("Permission store unavailable")]
    StoreUnavailable,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HostError>;
