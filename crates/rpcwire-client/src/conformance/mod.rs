//! A client for the standard cross-language conformance service.
//!
//! The types and calls here are what a schema compiler would emit for the
//! service's IDL.  They exercise the whole stack: struct codec contract,
//! every container type, declared exceptions, and oneway calls.

pub mod calls;
pub mod client;
pub mod types;

pub use client::ConformanceClient;
pub use types::{Insanity, Xception, Xception2, Xtruct, Xtruct2};
