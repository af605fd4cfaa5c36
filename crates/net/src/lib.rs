//! ICB Network Library
//!
//! Client side of the ICB (Internet Citizen's Band) chat protocol.
//!
//! # Architecture
//!
//! - **Frame**: 256-byte blocks reassembled into packets
//! - **Protocol**: Packet types and field encoding
//! - **Dispatch**: Packets decoded into typed server events
//! - **Session**: Login handshake, membership tracking and commands, without I/O
//! - **Client**: Tokio task driving a session over TCP
//!
//! # Usage
//!
//! ```ignore
//! let client = Client::connect(ServerConfig::new("icb.example.net", "al")).await?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         Event::PublicMessage { nick, text, .. } => { /* handle */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod split;

pub use client::Client;
pub use dispatch::{dispatch, CommandOutput, ServerEvent, StatusKind, StatusMessage};
pub use error::{Error, Result};
pub use event::Event;
pub use frame::PacketDecoder;
pub use protocol::{Packet, PacketKind, PROTOCOL_LEVEL};
pub use session::{Session, SessionState, MAX_PACKETS_PER_WAKEUP};
pub use split::{open_message_limit, private_message_limit, split_message};

/// Default port for ICB servers
pub use icb_core::DEFAULT_PORT;
