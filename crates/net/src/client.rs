//! TCP client for connecting to an ICB server
//!
//! One task per connection owns the socket and the [`Session`]. It wakes on
//! socket readability, consumer commands and the optional keepalive timer,
//! and forwards session events to the consumer over a channel.

use std::sync::Arc;
use std::time::Duration;

use icb_core::{Group, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::frame::{write_blocks, READ_CHUNK};
use crate::session::{Session, SessionState, MAX_PACKETS_PER_WAKEUP};

/// Client handle for network operations
pub struct Client {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::Receiver<Event>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

/// Snapshot of session state readable from outside the task
struct ClientState {
    connection: SessionState,
    nick: String,
    group: Option<Group>,
}

#[derive(Debug)]
enum ClientCommand {
    Open(String),
    Private { target: String, text: String },
    Command {
        name: String,
        args: String,
        id: Option<String>,
    },
    Who(String),
    Nick(String),
    Group(String),
    Boot(String),
    Beep(String),
    Ping(String),
    Noop,
    Protocol { host_id: String, client_id: String },
    Disconnect,
}

impl Client {
    /// Connect to an ICB server and start the session task
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let mut session = Session::new(config)?;
        let addr = session.config().socket_addr();
        info!(addr = %addr, nick = %session.nick(), "Connecting to server");

        let stream = TcpStream::connect(&addr).await?;
        session.transport_connected();
        debug!(addr = %addr, "TCP connected, waiting for protocol packet");

        let (reader, writer) = tokio::io::split(stream);

        let state = Arc::new(RwLock::new(ClientState {
            connection: session.state(),
            nick: session.nick().to_string(),
            group: None,
        }));

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let state_clone = state.clone();
        tokio::spawn(connection_task(
            reader,
            writer,
            session,
            state_clone,
            event_tx,
            cmd_rx,
        ));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next session event
    pub async fn next_event(&mut self) -> Option<Event> {
        self.event_rx.recv().await
    }

    async fn send(&self, cmd: ClientCommand) -> Result<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| Error::NotConnected)
    }

    /// Public message to the current group
    pub async fn send_open(&self, text: &str) -> Result<()> {
        self.send(ClientCommand::Open(text.to_string())).await
    }

    /// Private message
    pub async fn send_private(&self, target: &str, text: &str) -> Result<()> {
        self.send(ClientCommand::Private {
            target: target.to_string(),
            text: text.to_string(),
        })
        .await
    }

    /// Raw server command
    pub async fn command(&self, name: &str, args: &str, id: Option<&str>) -> Result<()> {
        self.send(ClientCommand::Command {
            name: name.to_string(),
            args: args.to_string(),
            id: id.map(str::to_string),
        })
        .await
    }

    pub async fn who(&self, args: &str) -> Result<()> {
        self.send(ClientCommand::Who(args.to_string())).await
    }

    pub async fn change_nick(&self, nick: &str) -> Result<()> {
        self.send(ClientCommand::Nick(nick.to_string())).await
    }

    pub async fn change_group(&self, group: &str) -> Result<()> {
        self.send(ClientCommand::Group(group.to_string())).await
    }

    pub async fn boot(&self, args: &str) -> Result<()> {
        self.send(ClientCommand::Boot(args.to_string())).await
    }

    pub async fn beep(&self, nick: &str) -> Result<()> {
        self.send(ClientCommand::Beep(nick.to_string())).await
    }

    pub async fn ping(&self, id: &str) -> Result<()> {
        self.send(ClientCommand::Ping(id.to_string())).await
    }

    pub async fn noop(&self) -> Result<()> {
        self.send(ClientCommand::Noop).await
    }

    /// Announce our protocol level to the server
    pub async fn send_protocol(&self, host_id: &str, client_id: &str) -> Result<()> {
        self.send(ClientCommand::Protocol {
            host_id: host_id.to_string(),
            client_id: client_id.to_string(),
        })
        .await
    }

    /// Drop the connection
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current session state
    pub async fn connection_state(&self) -> SessionState {
        self.state.read().await.connection
    }

    /// Get our current nick
    pub async fn nick(&self) -> String {
        self.state.read().await.nick.clone()
    }

    /// Get a copy of the current group
    pub async fn group(&self) -> Option<Group> {
        self.state.read().await.group.clone()
    }
}

/// Main connection task
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    mut session: Session,
    state: Arc<RwLock<ClientState>>,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    let mut buf = [0u8; READ_CHUNK];
    let keepalive = session.keepalive();
    let mut last_write = Instant::now();

    while session.is_active() {
        tokio::select! {
            // Incoming data from server
            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Server closed connection");
                        session.transport_failed();
                    }
                    Ok(n) => {
                        session.receive(&buf[..n]);
                        loop {
                            let handled = session.process(MAX_PACKETS_PER_WAKEUP);
                            if flush(&mut session, &mut writer).await {
                                last_write = Instant::now();
                            }
                            publish(&mut session, &state, &event_tx).await;
                            if handled < MAX_PACKETS_PER_WAKEUP || !session.is_active() {
                                break;
                            }
                            tokio::task::yield_now().await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        session.transport_failed();
                    }
                }
            }

            // Outgoing command
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        session.disconnect();
                    }
                    Some(cmd) => {
                        let name = format!("{:?}", cmd);
                        if let Err(e) = apply_command(&mut session, cmd) {
                            warn!(command = %name, error = %e, "Command rejected");
                            let _ = event_tx
                                .send(Event::CommandRejected { reason: e.to_string() })
                                .await;
                        }
                    }
                }
                if flush(&mut session, &mut writer).await {
                    last_write = Instant::now();
                }
            }

            // Client-side keepalive
            _ = idle_timer(keepalive, last_write) => {
                if session.noop().is_ok() {
                    debug!("Sending keepalive");
                    flush(&mut session, &mut writer).await;
                }
                last_write = Instant::now();
            }
        }

        publish(&mut session, &state, &event_tx).await;
    }

    info!("Disconnected from server");
}

fn apply_command(session: &mut Session, cmd: ClientCommand) -> Result<()> {
    match cmd {
        ClientCommand::Open(text) => session.send_open_message(&text),
        ClientCommand::Private { target, text } => session.send_private_message(&target, &text),
        ClientCommand::Command { name, args, id } => session.command(&name, &args, id.as_deref()),
        ClientCommand::Who(args) => session.who(&args),
        ClientCommand::Nick(nick) => session.change_nick(&nick),
        ClientCommand::Group(group) => session.change_group(&group),
        ClientCommand::Boot(args) => session.boot(&args),
        ClientCommand::Beep(nick) => session.beep(&nick),
        ClientCommand::Ping(id) => session.ping(&id),
        ClientCommand::Noop => session.noop(),
        ClientCommand::Protocol { host_id, client_id } => {
            session.send_protocol(&host_id, &client_id);
            Ok(())
        }
        ClientCommand::Disconnect => {
            session.disconnect();
            Ok(())
        }
    }
}

/// Write pending output. A failed write ends the session.
async fn flush<W: AsyncWrite + Unpin>(session: &mut Session, writer: &mut W) -> bool {
    let bytes = session.take_outbound();
    if bytes.is_empty() {
        return false;
    }
    if let Err(e) = write_blocks(writer, &bytes).await {
        warn!(error = %e, "Write error");
        session.transport_failed();
        return false;
    }
    true
}

/// Forward queued events and refresh the state snapshot
async fn publish(
    session: &mut Session,
    state: &Arc<RwLock<ClientState>>,
    event_tx: &mpsc::Sender<Event>,
) {
    {
        let mut s = state.write().await;
        s.connection = session.state();
        s.nick = session.nick().to_string();
        s.group = session.group().cloned();
    }

    let events: Vec<Event> = session.drain_events().collect();
    for event in events {
        if event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
            break;
        }
    }
}

/// Fires after `interval` without outbound traffic; never without one
async fn idle_timer(interval: Option<Duration>, since: Instant) {
    match interval {
        Some(interval) => tokio::time::sleep_until(since + interval).await,
        None => std::future::pending().await,
    }
}
