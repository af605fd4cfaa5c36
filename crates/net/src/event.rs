//! Events emitted by a session for the UI layer to consume.

use chrono::{DateTime, Utc};

use crate::dispatch::ServerEvent;

/// Events that the session emits to the consumer (terminal UI, bot, etc.)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Login accepted. `group` is the group we start in.
    Connected { nick: String, group: String },

    /// Topic of our group changed, from a topic status or a who scrape.
    TopicChanged {
        group: String,
        topic: Option<String>,
        set_by: Option<String>,
        set_at: Option<DateTime<Utc>>,
    },

    /// A membership scrape finished; `members` is the full member list.
    GroupJoined { group: String, members: Vec<String> },

    /// Public message in our group.
    PublicMessage {
        group: String,
        nick: String,
        text: String,
    },

    /// Private message to us.
    PrivateMessage { nick: String, text: String },

    /// Someone changed nick. `own` is set when it was us.
    NickChanged { old: String, new: String, own: bool },

    /// A collaborator command could not be sent.
    CommandRejected { reason: String },

    /// Every decoded server packet, except who output consumed by a scrape.
    Server(ServerEvent),

    /// Session is gone. `connection_lost` is set for transport failures.
    Disconnected { connection_lost: bool },
}
