//! Rendering session events as terminal lines

use icb_core::WhoEntry;
use icb_net::{CommandOutput, Event, ServerEvent};

const MIN_LEN: u64 = 60;
const HOUR_LEN: u64 = 60 * MIN_LEN;
const DAY_LEN: u64 = 24 * HOUR_LEN;
const WEEK_LEN: u64 = 7 * DAY_LEN;

/// Server output that repeats the topic we already show
const TOPIC_IS: &str = "The topic is";

/// Six-column idle time, two units at most
pub fn idle_time(idle: u64) -> String {
    if idle >= WEEK_LEN {
        format!("{:2}w{:2}d", idle / WEEK_LEN, (idle % WEEK_LEN) / DAY_LEN)
    } else if idle >= DAY_LEN {
        format!("{:2}d{:2}h", idle / DAY_LEN, (idle % DAY_LEN) / HOUR_LEN)
    } else if idle >= HOUR_LEN {
        format!("{:2}h{:2}m", idle / HOUR_LEN, (idle % HOUR_LEN) / MIN_LEN)
    } else if idle >= MIN_LEN {
        format!("{:2}m{:2}s", idle / MIN_LEN, idle % MIN_LEN)
    } else {
        format!("   {:2}s", idle)
    }
}

/// One user of a who listing
pub fn who_line(entry: &WhoEntry) -> String {
    let login = entry
        .login_time
        .map(|t| t.format("%b %e %H:%M").to_string())
        .unwrap_or_default();
    format!(
        "*** {}{:<14.14} {:>6.6} {:>12.12} {}@{} {}",
        if entry.moderator { '*' } else { ' ' },
        entry.nick,
        idle_time(entry.idle_secs),
        login,
        entry.username,
        entry.hostname,
        entry.registration
    )
}

/// Text to print for an event, if any
pub fn render(event: &Event) -> Option<String> {
    let line = match event {
        Event::Connected { nick, group } => format!("*** Logged in as {} in group {}", nick, group),
        Event::TopicChanged {
            group,
            topic: Some(topic),
            set_by,
            ..
        } => match set_by {
            Some(by) => format!("*** Topic for {}: {} (set by {})", group, topic, by),
            None => format!("*** Topic for {}: {}", group, topic),
        },
        Event::TopicChanged { group, .. } => format!("*** No topic for {}", group),
        Event::GroupJoined { group, members } => format!(
            "*** Group {} ({} members): {}",
            group,
            members.len(),
            members.join(" ")
        ),
        Event::PublicMessage { nick, text, .. } => format!("<{}> {}", nick, text),
        Event::PrivateMessage { nick, text } => format!("*{}* {}", nick, text),
        Event::NickChanged { new, own: true, .. } => format!("*** You are now known as {}", new),
        Event::NickChanged { .. } => return None,
        Event::CommandRejected { reason } => format!("! {}", reason),
        Event::Server(event) => return render_server(event),
        Event::Disconnected {
            connection_lost: true,
        } => "*** Connection lost".to_string(),
        Event::Disconnected { .. } => "*** Disconnected".to_string(),
    };
    Some(line)
}

fn render_server(event: &ServerEvent) -> Option<String> {
    let line = match event {
        ServerEvent::Status(status) => format!("[{}] {}", status.category, status.text),
        ServerEvent::Error { text } => format!("! {}", text),
        ServerEvent::Important { category, text } => format!("!! {}: {}", category, text),
        ServerEvent::Beep { nick } => format!("* {} beeps you", nick),
        ServerEvent::Command { fields } => fields.join(" "),
        ServerEvent::CommandOutput(CommandOutput::Line(line)) => {
            if line.starts_with(TOPIC_IS) {
                return None;
            }
            line.clone()
        }
        ServerEvent::CommandOutput(CommandOutput::Who(entry)) => who_line(entry),
        ServerEvent::CommandOutput(CommandOutput::Other { fields, .. }) => fields.join(" "),
        ServerEvent::Protocol {
            level, server_id, ..
        } => format!("*** Server {} (protocol level {})", server_id, level),
        // Shown through their session events or not at all
        ServerEvent::Login
        | ServerEvent::Open { .. }
        | ServerEvent::Personal { .. }
        | ServerEvent::Exit
        | ServerEvent::Ping { .. }
        | ServerEvent::Pong { .. } => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use icb_net::{StatusKind, StatusMessage};

    #[test]
    fn test_idle_time() {
        assert_eq!(idle_time(5), "    5s");
        assert_eq!(idle_time(59), "   59s");
        assert_eq!(idle_time(61), " 1m 1s");
        assert_eq!(idle_time(3 * HOUR_LEN + 20 * MIN_LEN), " 3h20m");
        assert_eq!(idle_time(2 * DAY_LEN + 5 * HOUR_LEN), " 2d 5h");
        assert_eq!(idle_time(3 * WEEK_LEN + DAY_LEN), " 3w 1d");
    }

    #[test]
    fn test_who_line() {
        let entry = WhoEntry {
            moderator: true,
            nick: "averyveryverylongnick".to_string(),
            idle_secs: 75,
            login_time: Utc.timestamp_opt(1_000_000_000, 0).single(),
            username: "al".to_string(),
            hostname: "example.net".to_string(),
            registration: "(nr)".to_string(),
        };
        assert_eq!(
            who_line(&entry),
            "*** *averyveryveryl  1m15s Sep  9 01:46 al@example.net (nr)"
        );
    }

    #[test]
    fn test_topic_is_hidden() {
        let event = Event::Server(ServerEvent::CommandOutput(CommandOutput::Line(
            "The topic is: rust".to_string(),
        )));
        assert_eq!(render(&event), None);

        let event = Event::Server(ServerEvent::CommandOutput(CommandOutput::Line(
            "Group: 1".to_string(),
        )));
        assert_eq!(render(&event).as_deref(), Some("Group: 1"));
    }

    #[test]
    fn test_server_lines() {
        let status = Event::Server(ServerEvent::Status(StatusMessage {
            kind: StatusKind::Arrive,
            category: "Arrive".to_string(),
            text: "bob (b@h) entered group".to_string(),
        }));
        assert_eq!(
            render(&status).as_deref(),
            Some("[Arrive] bob (b@h) entered group")
        );

        let beep = Event::Server(ServerEvent::Beep {
            nick: "bob".to_string(),
        });
        assert_eq!(render(&beep).as_deref(), Some("* bob beeps you"));

        let important = Event::Server(ServerEvent::Important {
            category: "Shutdown".to_string(),
            text: "in 5 minutes".to_string(),
        });
        assert_eq!(
            render(&important).as_deref(),
            Some("!! Shutdown: in 5 minutes")
        );

        let other = Event::Server(ServerEvent::CommandOutput(CommandOutput::Other {
            keyword: "ec".to_string(),
            fields: vec!["end".to_string(), "of list".to_string()],
        }));
        assert_eq!(render(&other).as_deref(), Some("end of list"));
    }

    #[test]
    fn test_session_events() {
        let joined = Event::GroupJoined {
            group: "1".to_string(),
            members: vec!["al".to_string(), "bob".to_string()],
        };
        assert_eq!(
            render(&joined).as_deref(),
            Some("*** Group 1 (2 members): al bob")
        );

        let msg = Event::PublicMessage {
            group: "1".to_string(),
            nick: "bob".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(render(&msg).as_deref(), Some("<bob> hi"));

        let rename = Event::NickChanged {
            old: "bob".to_string(),
            new: "robert".to_string(),
            own: false,
        };
        assert_eq!(render(&rename), None);
        assert_eq!(render(&Event::Server(ServerEvent::Login)), None);
    }
}
