//! ICB session state machine
//!
//! `Session` holds all protocol state for one server connection but does
//! no I/O itself: bytes read from the socket go in through [`Session::receive`],
//! packets to send accumulate in an outbound buffer, and events for the
//! consumer accumulate in a queue. The client task moves bytes and events
//! between the session, the socket and the consumer.
//!
//! Teardown is just a state change, so a handler may disconnect the session
//! while [`Session::process`] is working through a batch; the loop checks
//! the state after every packet and stops.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use icb_core::{Group, GroupChange, MembershipTracker, ServerConfig};
use tracing::{debug, info, trace};

use crate::dispatch::{dispatch, CommandOutput, ServerEvent, StatusKind, StatusMessage};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::frame::PacketDecoder;
use crate::protocol::{Packet, PROTOCOL_LEVEL};
use crate::split::{open_message_limit, private_message_limit, split_message};

/// Packets handled per socket wakeup before yielding to other tasks
pub const MAX_PACKETS_PER_WAKEUP: usize = 5;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connect in progress
    Connecting,
    /// Waiting for the server's protocol packet
    Negotiating,
    /// Login sent, waiting for confirmation
    LoggingIn,
    Connected,
    /// Terminal
    Disconnected,
}

/// Protocol state for one connection
pub struct Session {
    config: ServerConfig,
    state: SessionState,
    nick: String,
    decoder: PacketDecoder,
    outbound: Vec<u8>,
    connection_lost: bool,
    group: Option<Group>,
    tracker: MembershipTracker,
    events: VecDeque<Event>,
}

impl Session {
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let nick = config.nick.clone();
        Ok(Self {
            config,
            state: SessionState::Connecting,
            nick,
            decoder: PacketDecoder::new(),
            outbound: Vec::new(),
            connection_lost: false,
            group: None,
            tracker: MembershipTracker::new(),
            events: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// False once the session has been torn down
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn connection_lost(&self) -> bool {
        self.connection_lost
    }

    /// Our current nick
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// The group we are in, once logged in
    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn tracker(&self) -> &MembershipTracker {
        &self.tracker
    }

    pub fn keepalive(&self) -> Option<Duration> {
        self.config
            .keepalive_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// TCP connect finished; wait for the server greeting
    pub fn transport_connected(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Negotiating;
        }
    }

    /// Append bytes read from the socket
    pub fn receive(&mut self, bytes: &[u8]) {
        if self.is_active() {
            self.decoder.extend(bytes);
        }
    }

    /// Handle up to `budget` buffered packets. Returns how many were
    /// handled; stops early when the buffer runs dry or the session ends.
    pub fn process(&mut self, budget: usize) -> usize {
        let mut handled = 0;
        while handled < budget && self.is_active() {
            let Some(packet) = self.decoder.next_packet() else {
                break;
            };
            self.handle_packet(&packet);
            handled += 1;
        }
        handled
    }

    /// Encoded bytes waiting to be written
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    /// A read or write on the socket failed
    pub fn transport_failed(&mut self) {
        if self.is_active() {
            self.connection_lost = true;
            self.disconnect();
        }
    }

    /// Tear the session down. ICB has no logout handshake, so nothing is
    /// flushed: pending output and buffered input are dropped.
    pub fn disconnect(&mut self) {
        if !self.is_active() {
            return;
        }
        info!(
            nick = %self.nick,
            connection_lost = self.connection_lost,
            "Session disconnected"
        );

        self.state = SessionState::Disconnected;
        self.decoder.clear();
        self.outbound = Vec::new();
        self.group = None;
        self.tracker.reset();
        self.emit(Event::Disconnected {
            connection_lost: self.connection_lost,
        });
    }

    // ── Outgoing commands ──

    /// Public message to the group, split to fit
    pub fn send_open_message(&mut self, text: &str) -> Result<()> {
        self.require_connected()?;
        let limit = open_message_limit(&self.nick);
        for chunk in split_message(text, limit) {
            self.queue(Packet::open(chunk));
        }
        Ok(())
    }

    /// Private message, split to fit
    pub fn send_private_message(&mut self, target: &str, text: &str) -> Result<()> {
        self.require_connected()?;
        if target.is_empty() {
            return Err(Error::InvalidArgument("message target required".to_string()));
        }
        let limit = private_message_limit(&self.nick, target);
        for chunk in split_message(text, limit) {
            self.queue(Packet::private(target, chunk));
        }
        Ok(())
    }

    /// Raw server command
    pub fn command(&mut self, name: &str, args: &str, id: Option<&str>) -> Result<()> {
        self.require_connected()?;
        if name.is_empty() {
            return Err(Error::InvalidArgument("command name required".to_string()));
        }
        self.queue(Packet::command(name, args, id));
        Ok(())
    }

    /// Visible who listing
    pub fn who(&mut self, args: &str) -> Result<()> {
        self.command("w", args, None)
    }

    pub fn change_nick(&mut self, nick: &str) -> Result<()> {
        self.command("name", nick, None)
    }

    pub fn boot(&mut self, args: &str) -> Result<()> {
        self.command("boot", args, None)
    }

    /// Beep someone. A beep needs a nick.
    pub fn beep(&mut self, nick: &str) -> Result<()> {
        if nick.is_empty() {
            return Err(Error::InvalidArgument("beep needs a nick".to_string()));
        }
        self.command("beep", nick, None)
    }

    /// Switch groups. The old group is dropped and a new, empty one takes
    /// its place; membership is filled in once the server confirms.
    pub fn change_group(&mut self, name: &str) -> Result<()> {
        self.require_connected()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("group name required".to_string()));
        }
        if self.group.as_ref().is_some_and(|g| g.is_named(name)) {
            return Ok(());
        }

        debug!(group = %name, "Changing group");
        self.group = Some(Group::new(name));
        self.tracker.reset();
        self.queue(Packet::command("g", name, None));
        Ok(())
    }

    pub fn ping(&mut self, id: &str) -> Result<()> {
        self.require_connected()?;
        self.queue(Packet::ping(id));
        Ok(())
    }

    pub fn noop(&mut self) -> Result<()> {
        self.require_connected()?;
        self.queue(Packet::noop());
        Ok(())
    }

    /// Announce our protocol level. Allowed before login.
    pub fn send_protocol(&mut self, host_id: &str, client_id: &str) {
        self.queue(Packet::protocol(PROTOCOL_LEVEL, host_id, client_id));
    }

    fn require_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn queue(&mut self, packet: Packet) {
        if !self.is_active() {
            return;
        }
        trace!(kind = %(packet.kind as char), fields = ?packet.text_fields(), "->");
        self.outbound.extend_from_slice(&packet.encode());
    }

    fn emit(&mut self, event: Event) {
        self.events.push_back(event);
    }

    // ── Incoming packets ──

    /// Dispatch one packet and react to it
    pub fn handle_packet(&mut self, packet: &Packet) {
        if !self.is_active() {
            return;
        }
        let Some(event) = dispatch(packet) else {
            return;
        };

        match &event {
            ServerEvent::Protocol { level, .. } => self.on_protocol(level),
            ServerEvent::Login => {
                self.emit(Event::Server(event));
                self.on_login();
                return;
            }
            ServerEvent::Ping { fields } => self.queue(Packet::pong(fields.clone())),
            ServerEvent::Open { nick, text } => {
                let group = self.group_name();
                self.emit(Event::PublicMessage {
                    group,
                    nick: nick.clone(),
                    text: text.clone(),
                });
            }
            ServerEvent::Personal { nick, text } => {
                self.emit(Event::PrivateMessage {
                    nick: nick.clone(),
                    text: text.clone(),
                });
            }
            ServerEvent::Status(status) => {
                let status = status.clone();
                self.emit(Event::Server(event));
                self.on_status(&status);
                return;
            }
            ServerEvent::CommandOutput(output) => {
                let output = output.clone();
                self.on_command_output(output);
                return;
            }
            ServerEvent::Exit => {
                self.emit(Event::Server(event));
                self.disconnect();
                return;
            }
            _ => {}
        }

        self.emit(Event::Server(event));
    }

    fn group_name(&self) -> String {
        self.group
            .as_ref()
            .map(|g| g.name.clone())
            .unwrap_or_else(|| self.config.initial_group().to_string())
    }

    fn on_protocol(&mut self, level: &str) {
        match self.state {
            SessionState::Connecting | SessionState::Negotiating => {
                debug!(level = %level, "Server protocol received, logging in");
                let packet = Packet::login(
                    self.config.login_name(),
                    &self.nick,
                    self.config.initial_group(),
                    self.config.password(),
                );
                self.queue(packet);
                self.state = SessionState::LoggingIn;
            }
            state => debug!(?state, "Ignoring protocol packet"),
        }
    }

    fn on_login(&mut self) {
        if self.is_connected() {
            debug!("Ignoring repeated login confirmation");
            return;
        }

        let group = self.config.initial_group().to_string();
        info!(nick = %self.nick, group = %group, "Logged in");
        self.state = SessionState::Connected;
        self.group = Some(Group::new(group.clone()));
        self.emit(Event::Connected {
            nick: self.nick.clone(),
            group,
        });
    }

    fn on_status(&mut self, status: &StatusMessage) {
        let text = status.text.as_str();

        match status.kind {
            StatusKind::Status => {
                // "You are now in group ..."; rebuild membership
                if self.group.is_none() {
                    debug!(text = %text, "Group status before login, not scraping");
                    return;
                }
                self.tracker.begin_scrape();
                self.queue(Packet::command("w", "", None));
            }
            StatusKind::Arrive | StatusKind::SignOn => {
                if let Some(group) = self.group.as_mut() {
                    if self.tracker.member_arrived(group, text).is_none() {
                        debug!(text = %text, "Could not parse arriving nick");
                    }
                }
            }
            StatusKind::Depart | StatusKind::SignOff => {
                if let Some(group) = self.group.as_mut() {
                    if self.tracker.member_departed(group, text).is_none() {
                        debug!(text = %text, "Could not parse departing nick");
                    }
                }
            }
            StatusKind::Topic => {
                let change = match self.group.as_mut() {
                    Some(group) => self.tracker.topic_changed(group, text, Utc::now()),
                    None => None,
                };
                if let Some(change) = change {
                    self.apply_change(change);
                }
            }
            StatusKind::Name => {
                let mut scratch = Group::new("");
                let group = self.group.as_mut().unwrap_or(&mut scratch);
                if let Some(change) = self.tracker.member_renamed(group, text) {
                    self.apply_change(change);
                }
            }
            StatusKind::Pass | StatusKind::Other => {}
        }
    }

    fn on_command_output(&mut self, output: CommandOutput) {
        let silent = self.tracker.is_silent();

        let change = match (&output, self.group.as_mut()) {
            (CommandOutput::Line(line), Some(group)) => {
                self.tracker.command_output(group, line, Utc::now())
            }
            (CommandOutput::Who(entry), Some(group)) => {
                self.tracker.who_line(group, entry);
                None
            }
            _ => None,
        };

        if !silent {
            self.emit(Event::Server(ServerEvent::CommandOutput(output)));
        }
        if let Some(change) = change {
            self.apply_change(change);
        }
    }

    fn apply_change(&mut self, change: GroupChange) {
        match change {
            GroupChange::TopicChanged => {
                if let Some(group) = &self.group {
                    let event = Event::TopicChanged {
                        group: group.name.clone(),
                        topic: group.topic.clone(),
                        set_by: group.topic_by.clone(),
                        set_at: group.topic_time,
                    };
                    self.emit(event);
                }
            }
            GroupChange::MembershipSettled => {
                if let Some(group) = &self.group {
                    let event = Event::GroupJoined {
                        group: group.name.clone(),
                        members: group.members().map(str::to_string).collect(),
                    };
                    debug!(group = %group.name, members = group.member_count(), "Membership settled");
                    self.emit(event);
                }
            }
            GroupChange::Renamed { old, new } => {
                let own = old.eq_ignore_ascii_case(&self.nick);
                if own {
                    info!(old = %old, new = %new, "Own nick changed");
                    self.nick = new.clone();
                }
                self.emit(Event::NickChanged { old, new, own });
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.config.address)
            .field("state", &self.state)
            .field("nick", &self.nick)
            .field("group", &self.group.as_ref().map(|g| &g.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            username: Some("alice".to_string()),
            group: Some("1".to_string()),
            password: Some("pw".to_string()),
            ..ServerConfig::new("icb.example.net", "al")
        }
    }

    fn server_packet(kind: u8, fields: &[&str]) -> Vec<u8> {
        Packet {
            kind,
            fields: fields.iter().map(|f| f.as_bytes().to_vec()).collect(),
        }
        .encode()
    }

    fn sent_packets(session: &mut Session) -> Vec<Packet> {
        let mut decoder = PacketDecoder::new();
        decoder.extend(&session.take_outbound());
        std::iter::from_fn(|| decoder.next_packet()).collect()
    }

    fn feed(session: &mut Session, bytes: &[u8]) {
        session.receive(bytes);
        while session.process(MAX_PACKETS_PER_WAKEUP) > 0 {}
    }

    fn logged_in() -> Session {
        let mut session = Session::new(config()).unwrap();
        session.transport_connected();
        feed(&mut session, &server_packet(b'j', &["1", "host", "server"]));
        feed(&mut session, &server_packet(b'a', &[]));
        session.take_outbound();
        session.drain_events().for_each(drop);
        session
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(Session::new(ServerConfig::new("", "al")).is_err());
    }

    #[test]
    fn test_login_handshake() {
        let mut session = Session::new(config()).unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        session.transport_connected();
        assert_eq!(session.state(), SessionState::Negotiating);

        feed(&mut session, &server_packet(b'j', &["1", "host", "server"]));
        assert_eq!(session.state(), SessionState::LoggingIn);
        let sent = sent_packets(&mut session);
        assert_eq!(sent, vec![Packet::login("alice", "al", "1", "pw")]);

        feed(&mut session, &server_packet(b'a', &[]));
        assert!(session.is_connected());
        assert_eq!(session.group().unwrap().name, "1");

        let events: Vec<Event> = session.drain_events().collect();
        assert!(events.contains(&Event::Connected {
            nick: "al".to_string(),
            group: "1".to_string()
        }));
    }

    #[test]
    fn test_ping_answered_with_same_id() {
        let mut session = logged_in();
        feed(&mut session, &server_packet(b'l', &["42"]));
        let sent = sent_packets(&mut session);
        assert_eq!(sent, vec![Packet::pong(vec![b"42".to_vec()])]);
    }

    #[test]
    fn test_ping_id_echoed_byte_for_byte() {
        let mut session = logged_in();
        feed(&mut session, &[5, b'l', b'4', 0xE9, b'2', 0]);
        assert_eq!(
            session.take_outbound(),
            vec![5, b'm', b'4', 0xE9, b'2', 0]
        );
    }

    #[test]
    fn test_protocol_announcement() {
        let mut session = Session::new(config()).unwrap();
        session.transport_connected();
        session.send_protocol("host", "icb");
        assert_eq!(
            sent_packets(&mut session),
            vec![Packet::protocol("1", "host", "icb")]
        );
    }

    #[test]
    fn test_commands_require_login() {
        let mut session = Session::new(config()).unwrap();
        assert!(matches!(
            session.send_open_message("hi"),
            Err(Error::NotConnected)
        ));
        assert!(!session.has_outbound());
    }

    #[test]
    fn test_open_message_split() {
        let mut session = logged_in();
        let text = "word ".repeat(120);
        session.send_open_message(&text).unwrap();

        let sent = sent_packets(&mut session);
        assert!(sent.len() > 1);
        let limit = open_message_limit("al");
        for packet in &sent {
            assert_eq!(packet.kind, b'b');
            assert!(packet.fields[0].len() <= limit);
        }
        let joined: String = sent.iter().map(|p| p.field(0).into_owned()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_private_message() {
        let mut session = logged_in();
        session.send_private_message("bob", "hello").unwrap();
        let sent = sent_packets(&mut session);
        assert_eq!(sent, vec![Packet::private("bob", "hello")]);

        session.send_private_message("bob", "").unwrap();
        assert!(!session.has_outbound());
    }

    #[test]
    fn test_status_starts_silent_scrape() {
        let mut session = logged_in();
        feed(
            &mut session,
            &server_packet(b'd', &["Status", "You are now in group 1"]),
        );
        assert!(session.tracker().is_silent());
        let sent = sent_packets(&mut session);
        assert_eq!(sent, vec![Packet::command("w", "", None)]);
    }

    #[test]
    fn test_group_status_before_login_ignored() {
        let mut session = Session::new(config()).unwrap();
        session.transport_connected();
        feed(
            &mut session,
            &server_packet(b'd', &["Status", "You are now in group 1"]),
        );
        assert!(!session.tracker().is_silent());
        assert!(!session.has_outbound());

        // later who output is still visible
        feed(&mut session, &server_packet(b'j', &["1", "host", "server"]));
        feed(&mut session, &server_packet(b'a', &[]));
        session.drain_events().for_each(drop);
        feed(&mut session, &server_packet(b'i', &["co", "Total: 3"]));
        let events: Vec<Event> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![Event::Server(ServerEvent::CommandOutput(CommandOutput::Line(
                "Total: 3".to_string()
            )))]
        );
    }

    #[test]
    fn test_full_scrape_settles_membership() {
        let mut session = logged_in();
        feed(
            &mut session,
            &server_packet(b'd', &["Status", "You are now in group 1"]),
        );
        session.drain_events().for_each(drop);

        let mut stream = Vec::new();
        stream.extend(server_packet(b'i', &["co", "Group: 1 Topic: (None)"]));
        stream.extend(server_packet(
            b'i',
            &["wl", " ", "bob", "0", "0", "1000000000", "bob", "host", "(nr)"],
        ));
        stream.extend(server_packet(
            b'i',
            &["wl", " ", "carol", "0", "0", "1000000000", "carol", "host", "(nr)"],
        ));
        stream.extend(server_packet(b'i', &["co", "Total: 2"]));
        feed(&mut session, &stream);

        let members: Vec<&str> = session.group().unwrap().members().collect();
        assert_eq!(members, vec!["bob", "carol"]);
        assert!(!session.tracker().is_silent());

        // scrape output is swallowed; only the settle event surfaces, once
        let events: Vec<Event> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![Event::GroupJoined {
                group: "1".to_string(),
                members: vec!["bob".to_string(), "carol".to_string()],
            }]
        );
    }

    #[test]
    fn test_visible_who_output_forwarded() {
        let mut session = logged_in();
        feed(&mut session, &server_packet(b'i', &["co", "Group: 1 Topic: hi"]));
        let events: Vec<Event> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![Event::Server(ServerEvent::CommandOutput(CommandOutput::Line(
                "Group: 1 Topic: hi".to_string()
            )))]
        );
        assert!(session.group().unwrap().topic.is_none());
    }

    #[test]
    fn test_incremental_membership() {
        let mut session = logged_in();
        feed(&mut session, &server_packet(b'd', &["Arrive", "bob (bob@h) entered group"]));
        feed(&mut session, &server_packet(b'd', &["Sign-on", "carol (c@h) entered group"]));
        feed(&mut session, &server_packet(b'd', &["Depart", "bob (bob@h) just left"]));
        let group = session.group().unwrap();
        assert!(!group.has_member("bob"));
        assert!(group.has_member("carol"));

        // malformed status still surfaces raw
        feed(&mut session, &server_packet(b'd', &["Sign-off", "garbled"]));
        let events: Vec<Event> = session.drain_events().collect();
        assert!(matches!(
            events.last(),
            Some(Event::Server(ServerEvent::Status(StatusMessage { kind: StatusKind::SignOff, .. })))
        ));
    }

    #[test]
    fn test_topic_status() {
        let mut session = logged_in();
        feed(
            &mut session,
            &server_packet(b'd', &["Topic", "bob changed the topic to \"rust\""]),
        );
        let group = session.group().unwrap();
        assert_eq!(group.topic.as_deref(), Some("rust"));
        assert_eq!(group.topic_by.as_deref(), Some("bob"));

        let events: Vec<Event> = session.drain_events().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::TopicChanged { topic: Some(t), set_by: Some(s), .. } if t == "rust" && s == "bob"
        )));
    }

    #[test]
    fn test_own_rename_updates_nick() {
        let mut session = logged_in();
        feed(
            &mut session,
            &server_packet(b'd', &["Name", "al changed nickname to alfred"]),
        );
        assert_eq!(session.nick(), "alfred");
        let events: Vec<Event> = session.drain_events().collect();
        assert!(events.contains(&Event::NickChanged {
            old: "al".to_string(),
            new: "alfred".to_string(),
            own: true
        }));

        feed(
            &mut session,
            &server_packet(b'd', &["Name", "bob changed nickname to robert"]),
        );
        assert_eq!(session.nick(), "alfred");
    }

    #[test]
    fn test_change_group_replaces_group() {
        let mut session = logged_in();
        feed(&mut session, &server_packet(b'd', &["Arrive", "bob (b@h) entered group"]));
        session.take_outbound();

        session.change_group("1").unwrap();
        assert!(!session.has_outbound());

        session.change_group("rust").unwrap();
        let group = session.group().unwrap();
        assert_eq!(group.name, "rust");
        assert_eq!(group.member_count(), 0);
        assert_eq!(sent_packets(&mut session), vec![Packet::command("g", "rust", None)]);

        assert!(matches!(
            session.change_group(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_public_message_event() {
        let mut session = logged_in();
        feed(&mut session, &server_packet(b'b', &["bob", "hello"]));
        let events: Vec<Event> = session.drain_events().collect();
        assert_eq!(
            events[0],
            Event::PublicMessage {
                group: "1".to_string(),
                nick: "bob".to_string(),
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_exit_stops_processing() {
        let mut session = logged_in();
        let mut stream = server_packet(b'g', &[]);
        stream.extend(server_packet(b'l', &["1"]));
        session.receive(&stream);

        assert_eq!(session.process(MAX_PACKETS_PER_WAKEUP), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.connection_lost());
        assert!(!session.has_outbound());
        assert!(session.group().is_none());

        let events: Vec<Event> = session.drain_events().collect();
        assert_eq!(
            events.last(),
            Some(&Event::Disconnected {
                connection_lost: false
            })
        );
    }

    #[test]
    fn test_transport_failure_is_terminal() {
        let mut session = logged_in();
        session.send_open_message("pending").unwrap();
        session.transport_failed();

        assert!(session.connection_lost());
        assert!(!session.has_outbound());
        session.receive(&server_packet(b'l', &["1"]));
        assert_eq!(session.process(MAX_PACKETS_PER_WAKEUP), 0);

        // second teardown is a no-op
        session.disconnect();
        let disconnects = session
            .drain_events()
            .filter(|e| matches!(e, Event::Disconnected { .. }))
            .count();
        assert_eq!(disconnects, 1);
    }

    #[test]
    fn test_process_respects_budget() {
        let mut session = logged_in();
        let stream: Vec<u8> = (0..7)
            .flat_map(|i| server_packet(b'l', &[i.to_string().as_str()]))
            .collect();
        session.receive(&stream);

        assert_eq!(session.process(MAX_PACKETS_PER_WAKEUP), 5);
        assert_eq!(session.process(MAX_PACKETS_PER_WAKEUP), 2);
        assert_eq!(session.process(MAX_PACKETS_PER_WAKEUP), 0);
        assert_eq!(sent_packets(&mut session).len(), 7);
    }

    #[test]
    fn test_unknown_packets_ignored() {
        let mut session = logged_in();
        feed(&mut session, &server_packet(b'z', &["future"]));
        assert!(session.is_connected());
        assert_eq!(session.drain_events().count(), 0);
    }
}
