//! Exactly-once delivery of a call's outcome.

use tokio::sync::oneshot;

use super::ClientError;

/// Receives the outcome of one call.
///
/// Both methods consume `self`, so the type system guarantees a callback
/// observes exactly one of success or failure, exactly once.
pub trait ServiceMethodCallback<T>: Send + 'static {
    fn on_success(self, result: T);
    fn on_error(self, error: ClientError);
}

impl<T: Send + 'static> ServiceMethodCallback<T> for oneshot::Sender<Result<T, ClientError>> {
    fn on_success(self, result: T) {
        // The receiver may have been dropped; the outcome is then discarded.
        let _ = self.send(Ok(result));
    }

    fn on_error(self, error: ClientError) {
        let _ = self.send(Err(error));
    }
}

/// Adapts a closure taking `Result<T, ClientError>` into a callback.
pub struct FnCallback<F>(pub F);

impl<T, F> ServiceMethodCallback<T> for FnCallback<F>
where
    F: FnOnce(Result<T, ClientError>) + Send + 'static,
{
    fn on_success(self, result: T) {
        (self.0)(Ok(result))
    }

    fn on_error(self, error: ClientError) {
        (self.0)(Err(error))
    }
}
