//! rpcwire-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rpcwire-client do? (for beginners)
//!
//! A remote procedure call should look like a local async function:
//!
//! ```text
//! let echoed = client.test_string("hello").await?;
//! ```
//!
//! Behind that line the client:
//!
//! 1. Allocates a sequence id that no other in-flight call is using.
//! 2. Writes a `Call` envelope (method name + sequence id) and the arguments
//!    struct onto the transport, then flushes.
//! 3. Blocks (on tokio's blocking pool, never on the async runtime) until the
//!    reply envelope arrives, and checks that its sequence id, method name,
//!    and kind belong to this call.
//! 4. Decodes the result struct and resolves the caller's callback with the
//!    value, a declared service exception, or an application exception.
//!
//! If the connection dies at any point, the call fails with a transport
//! error, the [`ClientListener`] hears about it once, and the client refuses
//! further calls.
//!
//! # Layers
//!
//! - **`domain`** – contracts: [`MethodCall`], [`ReplyingCall`],
//!   [`ServiceMethodCallback`], [`ClientListener`], [`ClientError`].
//! - **`application`** – [`ClientBase`], the dispatcher.
//! - **`infrastructure`** – TOML configuration and a logging listener.
//! - **`conformance`** – a typed client for the standard conformance service.

/// Application layer: the dispatcher and its pending-call table.
pub mod application;

/// Typed client and structs for the conformance service.
pub mod conformance;

/// Domain layer: call, callback, listener, and error contracts.
pub mod domain;

/// Infrastructure layer: configuration and logging listener.
pub mod infrastructure;

pub use application::{ClientBase, DispatcherState};
pub use domain::{
    ClientError, ClientListener, FnCallback, MethodCall, NoopListener, ReplyingCall,
    ServiceMethodCallback,
};
