//! ilreplay Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Everything here is shared by the log reader and the replay engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod digest;
pub mod error;
pub mod id;
pub mod phase;
pub mod types;

// Re-exports
pub use digest::{Digest, DigestError};
pub use error::{
    BuilderError, DispatchError, LexError, ProtocolError, RegistryError, ReplayError,
    ReplayResult,
};
pub use id::{EntryKind, IdTag, LogId};
pub use phase::Phase;
pub use types::DataType;
