use thiserror::Error;

/// Failure taxonomy for conversation-core operations.
///
/// Every failure is scoped to the single operation that raised it; nothing
/// here is fatal to the process. Extraction and snapshot derivation never
/// raise; they degrade to empty results instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The target patient or conversation could not be identified.
    /// The operation was aborted with no write performed.
    #[error("patient not found: {0}")]
    ResolutionFailure(String),

    /// The operation's preconditions do not hold (append against a
    /// non-persisted conversation, role violation). No write performed.
    #[error("precondition failed: {0}")]
    PreconditionFailure(String),

    /// A store or blob-store call failed. Prior state is untouched and the
    /// caller may retry.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Phase 2 of an attachment send failed after the blob was stored.
    /// The blob at `blob_key` is orphaned: logged, never retried or
    /// cleaned up by this core.
    #[error("attachment stored at {blob_key} but message append failed: {source}")]
    PartialFailure {
        blob_key: String,
        #[source]
        source: Box<CoreError>,
    },
}

/// Errors raised by document-store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the blob-store collaborator.
#[derive(Debug, Error)]
#[error("blob store failure: {0}")]
pub struct BlobError(pub String);

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            // A missing document at this layer means the caller addressed a
            // conversation that does not exist (yet): a precondition issue,
            // not a transport one.
            StoreError::NotFound(what) => CoreError::PreconditionFailure(what),
            StoreError::Unavailable(why) => CoreError::TransportFailure(why),
        }
    }
}

impl From<BlobError> for CoreError {
    fn from(err: BlobError) -> Self {
        CoreError::TransportFailure(err.0)
    }
}
