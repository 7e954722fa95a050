use thiserror::Error;

/// Errors raised while relaying events to a client transport.
///
/// Publishing never fails; only the per-connection side can.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The receiving end of the transport is gone (client disconnected).
    #[error("transport closed")]
    TransportClosed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
