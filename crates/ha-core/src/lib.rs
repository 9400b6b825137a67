//! Core types shared by integrations
//!
//! This crate provides the small set of types every integration module
//! depends on: the closed error classification exposed to users
//! ([`ErrorKind`]) and the per-instance logging handle ([`Context`]).

mod context;
mod error_kind;

pub use context::Context;
pub use error_kind::{Classify, ErrorKind, UnknownErrorKey};

/// State value reported by entities whose coordinator has no usable data
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Error key used by config flows when the user input names an existing entry
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Abort reason returned when a reauthentication flow replaced entry data
pub const ABORT_REAUTH_SUCCESSFUL: &str = "reauth_successful";
