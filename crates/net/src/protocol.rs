//! ICB packet types
//!
//! A packet is one type byte followed by fields separated by `^A` (0x01)
//! and terminated by a NUL. Fields are positional; their meaning depends
//! on the packet type.
//!
//! Fields are kept as raw bytes. ICB servers relay whatever the sender
//! typed, often Latin-1, so text is only decoded when it is read.

use std::borrow::Cow;

use crate::frame::encode_blocks;

/// Separates fields inside a packet
pub const FIELD_SEPARATOR: u8 = 0x01;

/// Protocol level announced by this client
pub const PROTOCOL_LEVEL: &str = "1";

/// Packet types. `a`..`m` can arrive from the server; `Noop` is only sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Login = b'a',
    Open = b'b',
    Personal = b'c',
    Status = b'd',
    Error = b'e',
    Important = b'f',
    Exit = b'g',
    Command = b'h',
    CommandOutput = b'i',
    Protocol = b'j',
    Beep = b'k',
    Ping = b'l',
    Pong = b'm',
    Noop = b'n',
}

/// Receivable packet types, indexed from `a`
const DISPATCH_TABLE: [PacketKind; 13] = [
    PacketKind::Login,
    PacketKind::Open,
    PacketKind::Personal,
    PacketKind::Status,
    PacketKind::Error,
    PacketKind::Important,
    PacketKind::Exit,
    PacketKind::Command,
    PacketKind::CommandOutput,
    PacketKind::Protocol,
    PacketKind::Beep,
    PacketKind::Ping,
    PacketKind::Pong,
];

impl PacketKind {
    /// Look up a received type byte. Anything outside `a`..`m` is unknown.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let index = byte.checked_sub(b'a')?;
        DISPATCH_TABLE.get(index as usize).copied()
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketKind::Login => "login",
            PacketKind::Open => "open",
            PacketKind::Personal => "personal",
            PacketKind::Status => "status",
            PacketKind::Error => "error",
            PacketKind::Important => "important",
            PacketKind::Exit => "exit",
            PacketKind::Command => "command",
            PacketKind::CommandOutput => "cmdout",
            PacketKind::Protocol => "protocol",
            PacketKind::Beep => "beep",
            PacketKind::Ping => "ping",
            PacketKind::Pong => "pong",
            PacketKind::Noop => "noop",
        }
    }
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One logical packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw type byte; may be outside the known range on receive
    pub kind: u8,
    pub fields: Vec<Vec<u8>>,
}

impl Packet {
    pub fn new(kind: PacketKind, fields: Vec<Vec<u8>>) -> Self {
        Self {
            kind: kind.as_byte(),
            fields,
        }
    }

    /// Packet from text fields
    pub fn with_fields(kind: PacketKind, fields: &[&str]) -> Self {
        Self::new(kind, fields.iter().map(|f| f.as_bytes().to_vec()).collect())
    }

    /// `a`: username, nick, group, "login", password
    pub fn login(username: &str, nick: &str, group: &str, password: &str) -> Self {
        Self::with_fields(PacketKind::Login, &[username, nick, group, "login", password])
    }

    /// `b`: public message to the current group
    pub fn open(text: &str) -> Self {
        Self::with_fields(PacketKind::Open, &[text])
    }

    /// `h`: server command with optional message id
    pub fn command(name: &str, args: &str, id: Option<&str>) -> Self {
        match id {
            Some(id) => Self::with_fields(PacketKind::Command, &[name, args, id]),
            None => Self::with_fields(PacketKind::Command, &[name, args]),
        }
    }

    /// `h` `m`: private message, sent as `"<target> <text>"`
    pub fn private(target: &str, text: &str) -> Self {
        Self::command("m", &format!("{} {}", target, text), None)
    }

    /// `j`: protocol level, host id, client id
    pub fn protocol(level: &str, host_id: &str, client_id: &str) -> Self {
        Self::with_fields(PacketKind::Protocol, &[level, host_id, client_id])
    }

    pub fn ping(id: &str) -> Self {
        Self::with_fields(PacketKind::Ping, &[id])
    }

    /// `m`: echoes the ping's fields byte for byte
    pub fn pong(fields: Vec<Vec<u8>>) -> Self {
        Self::new(PacketKind::Pong, fields)
    }

    pub fn noop() -> Self {
        Self::new(PacketKind::Noop, Vec::new())
    }

    /// Known type, if any
    pub fn packet_kind(&self) -> Option<PacketKind> {
        PacketKind::from_byte(self.kind)
    }

    /// Field `index` as text, or "" if missing. Invalid UTF-8 is replaced.
    pub fn field(&self, index: usize) -> Cow<'_, str> {
        self.fields
            .get(index)
            .map(|f| String::from_utf8_lossy(f))
            .unwrap_or(Cow::Borrowed(""))
    }

    /// All fields as text
    pub fn text_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    /// Fields from `index` on, rejoined with the separator, as text. Used
    /// where the last field is free text that may itself contain `^A`.
    pub fn rest_from(&self, index: usize) -> String {
        self.fields
            .get(index..)
            .map(|rest| String::from_utf8_lossy(&rest.join(&FIELD_SEPARATOR)).into_owned())
            .unwrap_or_default()
    }

    /// Flat, unframed payload: type byte, fields, NUL
    pub fn payload(&self) -> Vec<u8> {
        let len = self.fields.iter().map(|f| f.len() + 1).sum::<usize>() + 2;
        let mut buf = Vec::with_capacity(len);
        buf.push(self.kind);
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                buf.push(FIELD_SEPARATOR);
            }
            buf.extend_from_slice(field);
        }
        buf.push(0);
        buf
    }

    /// Wire bytes, framed into blocks
    pub fn encode(&self) -> Vec<u8> {
        encode_blocks(&self.payload())
    }

    /// Parse a reassembled payload. Data after the first NUL is ignored.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let (&kind, rest) = payload.split_first()?;
        let data = match rest.iter().position(|&b| b == 0) {
            Some(nul) => &rest[..nul],
            None => rest,
        };

        let fields = if data.is_empty() {
            Vec::new()
        } else {
            data.split(|&b| b == FIELD_SEPARATOR)
                .map(<[u8]>::to_vec)
                .collect()
        };

        Some(Self { kind, fields })
    }
}
