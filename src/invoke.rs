use crate::error::RemoteError;

/// Schedules an asynchronous invocation of a function with a JSON payload,
/// without waiting for it to run.
pub trait FunctionInvoker: Send + Sync {
    fn invoke_async(&self, function_name: &str, payload: &[u8]) -> Result<(), RemoteError>;
}
