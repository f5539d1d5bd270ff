//! Storage adapters — one per replicated backend.
//!
//! Every adapter is a hard isolation boundary: failures become `false`
//! or `None` plus a log line and a registry update, never a panic or an
//! error type that crosses into the orchestrator.

pub mod document;
pub mod drive;
pub mod object;

pub use document::DocumentVaultAdapter;
pub use drive::DriveVaultAdapter;
pub use object::ObjectVaultAdapter;
