//! Domain layer: the contracts between the dispatcher and its callers.
//!
//! # What lives here? (for beginners)
//!
//! - **`call`** – what the dispatcher needs to know about a method call:
//!   its name, how to write its arguments, and (for two-way calls) how to
//!   read its result struct.  Generated service code implements these.
//!
//! - **`callback`** – how an outcome is delivered: exactly once, either as a
//!   success value or as a [`ClientError`].
//!
//! - **`listener`** – connection-level lifecycle hooks, independent of any
//!   single call.
//!
//! - **`error`** – the [`ClientError`] taxonomy shared by all of the above.

pub mod call;
pub mod callback;
pub mod error;
pub mod listener;

pub use call::{MethodCall, ReplyingCall};
pub use callback::{FnCallback, ServiceMethodCallback};
pub use error::ClientError;
pub use listener::{ClientListener, NoopListener};
