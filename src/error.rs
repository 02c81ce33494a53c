/// Errors surfacing from a lifecycle hook. Any of these turns a successful
/// response into a failed one, with the error message as the reason.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The external resource is not in a state this provider can work with.
    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("invalid resource properties: {0}")]
    Properties(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn precondition<S: Into<String>>(message: S) -> Self {
        ProviderError::Precondition(message.into())
    }
}

/// A failed call to an external service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        RemoteError { message: message.into() }
    }
}
