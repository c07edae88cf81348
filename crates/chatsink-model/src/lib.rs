//! # chatsink-model — shared contract for the chat capture sink
//!
//! Types every other crate in the workspace agrees on. Kept free of runtime
//! dependencies (no tokio, no axum) so it can be used from the store, the
//! classifier and the binaries alike.
//!
//! ## Module Overview
//!
//! - [`event`] — `Event`, `Role`, `EventHints` and the on-disk timestamp format
//! - [`log`] — `LogId`, the named rolling logs and their file names
//! - [`error`] — `SinkError`, `SinkResult`

pub mod error;
pub mod event;
pub mod log;

pub use error::{SinkError, SinkResult};
pub use event::{Event, EventHints, Role};
pub use log::LogId;
