//! Application layer: turning calls into wire exchanges.
//!
//! - **`dispatcher`** – [`ClientBase`], which owns the connection, allocates
//!   sequence ids, runs each request/reply exchange on the blocking pool, and
//!   resolves callbacks.
//!
//! - **`pending`** – the table of calls awaiting a reply.

pub mod dispatcher;
pub(crate) mod pending;

pub use dispatcher::{ClientBase, DispatcherState};
