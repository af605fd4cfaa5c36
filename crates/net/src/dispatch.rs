//! Packet to event dispatch
//!
//! Every packet type maps to one [`ServerEvent`] variant. `cmdout` and
//! `status` packets dispatch a second time on their first field; keywords
//! without a dedicated variant land in a default variant that keeps all
//! the fields, so nothing the server sends is lost.

use icb_core::WhoEntry;
use tracing::trace;

use crate::protocol::{Packet, PacketKind};

/// Event decoded from one server packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Login accepted
    Login,
    /// Public message in our group
    Open { nick: String, text: String },
    /// Private message to us
    Personal { nick: String, text: String },
    Status(StatusMessage),
    Error { text: String },
    Important { category: String, text: String },
    /// Server is closing the connection
    Exit,
    Command { fields: Vec<String> },
    CommandOutput(CommandOutput),
    /// Server greeting with its protocol level
    Protocol {
        level: String,
        host_id: String,
        server_id: String,
    },
    Beep { nick: String },
    /// Ping; the raw fields are echoed back as-is
    Ping { fields: Vec<Vec<u8>> },
    Pong { fields: Vec<Vec<u8>> },
}

/// Status categories, matched case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Arrive,
    Depart,
    SignOn,
    SignOff,
    /// "You are now in group ..."
    Status,
    Topic,
    Name,
    Pass,
    Other,
}

impl StatusKind {
    fn from_category(category: &str) -> Self {
        match category.to_ascii_lowercase().as_str() {
            "arrive" => StatusKind::Arrive,
            "depart" => StatusKind::Depart,
            "sign-on" => StatusKind::SignOn,
            "sign-off" => StatusKind::SignOff,
            "status" => StatusKind::Status,
            "topic" => StatusKind::Topic,
            "name" => StatusKind::Name,
            "pass" => StatusKind::Pass,
            _ => StatusKind::Other,
        }
    }
}

/// Status packet: category as sent plus free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub category: String,
    pub text: String,
}

/// Command output packet, keyed on its first field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// `co`: one line of generic output
    Line(String),
    /// `wl`: one user of a who listing
    Who(WhoEntry),
    /// Anything else, with the keyword and the remaining fields
    Other { keyword: String, fields: Vec<String> },
}

impl CommandOutput {
    fn from_fields(keyword: &str, fields: &[String]) -> Self {
        match keyword {
            "co" => CommandOutput::Line(fields.join("\u{1}")),
            "wl" => match WhoEntry::from_fields(fields) {
                Some(entry) => CommandOutput::Who(entry),
                None => CommandOutput::Other {
                    keyword: keyword.to_string(),
                    fields: fields.to_vec(),
                },
            },
            _ => CommandOutput::Other {
                keyword: keyword.to_string(),
                fields: fields.to_vec(),
            },
        }
    }
}

/// Map a packet to its event. Unknown packet types, and `status`/`cmdout`
/// packets with no fields, yield `None`.
pub fn dispatch(packet: &Packet) -> Option<ServerEvent> {
    let Some(kind) = PacketKind::from_byte(packet.kind) else {
        trace!(kind = packet.kind, "Ignoring unknown packet type");
        return None;
    };

    let event = match kind {
        PacketKind::Login => ServerEvent::Login,
        PacketKind::Open => ServerEvent::Open {
            nick: packet.field(0).to_string(),
            text: packet.rest_from(1),
        },
        PacketKind::Personal => ServerEvent::Personal {
            nick: packet.field(0).to_string(),
            text: packet.rest_from(1),
        },
        PacketKind::Status => {
            if packet.fields.is_empty() {
                return None;
            }
            let category = packet.field(0).into_owned();
            ServerEvent::Status(StatusMessage {
                kind: StatusKind::from_category(&category),
                category,
                text: packet.rest_from(1),
            })
        }
        PacketKind::Error => ServerEvent::Error {
            text: packet.rest_from(0),
        },
        PacketKind::Important => ServerEvent::Important {
            category: packet.field(0).to_string(),
            text: packet.rest_from(1),
        },
        PacketKind::Exit => ServerEvent::Exit,
        PacketKind::Command => ServerEvent::Command {
            fields: packet.text_fields(),
        },
        PacketKind::CommandOutput => {
            let fields = packet.text_fields();
            let (keyword, rest) = fields.split_first()?;
            ServerEvent::CommandOutput(CommandOutput::from_fields(keyword, rest))
        }
        PacketKind::Protocol => ServerEvent::Protocol {
            level: packet.field(0).to_string(),
            host_id: packet.field(1).to_string(),
            server_id: packet.field(2).to_string(),
        },
        PacketKind::Beep => ServerEvent::Beep {
            nick: packet.field(0).to_string(),
        },
        PacketKind::Ping => ServerEvent::Ping {
            fields: packet.fields.clone(),
        },
        PacketKind::Pong => ServerEvent::Pong {
            fields: packet.fields.clone(),
        },
        PacketKind::Noop => return None,
    };

    Some(event)
}
