//! Example flows built on the `OrderCore` checkout core.
//!
//! The [`storefront`] module wires every service over the in-memory
//! backend and seeds a small catalog. The integration tests and the
//! runnable `storefront` example both build on it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod storefront;
