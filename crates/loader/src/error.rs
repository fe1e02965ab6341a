use net::FetchError;
use thiserror::Error;

/// The single error type a load surfaces to its caller.
///
/// `Clone` because the outcome is observed through shared futures.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("entry {entry} response body is empty!")]
    EmptyBody { entry: String },
    #[error("entry {entry} loading failed as entry script trigger error -> {message}")]
    EntryScript { entry: String, message: String },
    #[error("entry {entry} node transform failed: {message}")]
    Transform { entry: String, message: String },
    #[error("entry {entry} markup stream failed: {message}")]
    Parse { entry: String, message: String },
    #[error("entry {entry} container refused a node: {message}")]
    Container { entry: String, message: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("entry {entry} is a location but no fetch was configured")]
    MissingFetch { entry: String },
    #[error("could not spawn load task: {message}")]
    Spawn { message: String },
    #[error("load abandoned before it settled")]
    Abandoned,
}

/// Failure returned by a node transform hook.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A host container refused to append a node.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("no such parent node {0}")]
    UnknownParent(u32),
    #[error("{0}")]
    Refused(String),
}
