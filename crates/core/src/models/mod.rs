//! Data models for ICB sessions

mod group;

pub use group::*;
