//! ICB Core Library
//!
//! Connection configuration, the group model and the who-listing driven
//! membership tracker for ICB ("Internet Citizen's Band") sessions.

pub mod config;
pub mod error;
pub mod membership;
pub mod models;

pub use config::{Config, ServerConfig, DEFAULT_GROUP, DEFAULT_PORT};
pub use error::{Error, Result};
pub use membership::{GroupChange, GroupHeader, MembershipTracker, WhoEntry};
pub use models::*;
