//! Group membership tracking
//!
//! ICB never pushes a membership list for the group we are in. The only
//! reliable source is the output of a *full* who listing: a single-group
//! listing has no end marker, while a full one ends with a `Total:` line.
//! So membership is rebuilt by running a silent full `/who`, picking out the
//! header of our own group, collecting the `wl` lines that follow it, and
//! treating the `Total:` line as the end of the scrape.
//!
//! Between scrapes, arrive/depart/sign-on/sign-off/name status messages are
//! applied incrementally. Moderator status is not tracked: moderators can
//! leave and return under another nick, moderation can pass while the
//! moderator is off-group, and one user can moderate several groups.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Group;

const GROUP_PREFIX: &str = "Group: ";
const TOPIC_MARKER: &str = "Topic: ";
const TOPIC_UNSET: &str = "(None)";
const TOTAL_PREFIX: &str = "Total: ";

/// Who set a topic learned from a who listing
pub const UNKNOWN_SETTER: &str = "unknown";

/// Something the tracker changed on the group that collaborators care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChange {
    /// Topic, setter or set time changed
    TopicChanged,
    /// A scrape finished; the member set is complete
    MembershipSettled,
    /// A member changed nick
    Renamed { old: String, new: String },
}

/// One user line (`wl`) of a who listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoEntry {
    /// Moderator flag as sent. Shown, never tracked.
    pub moderator: bool,
    pub nick: String,
    pub idle_secs: u64,
    pub login_time: Option<DateTime<Utc>>,
    pub username: String,
    pub hostname: String,
    pub registration: String,
}

impl WhoEntry {
    /// Parse the fields that follow the `wl` keyword:
    /// moderator flag, nick, idle seconds, response time (unused),
    /// login time, username, hostname, registration status.
    ///
    /// Only the nick is required; missing or malformed numbers become 0/None.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        let field = |i: usize| fields.get(i).map(|f| f.as_ref()).unwrap_or("");

        let nick = field(1).trim();
        if nick.is_empty() {
            return None;
        }

        let login_time = field(4)
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Some(Self {
            moderator: !matches!(field(0).chars().next(), None | Some(' ')),
            nick: nick.to_string(),
            idle_secs: field(2).trim().parse().unwrap_or(0),
            login_time,
            username: field(5).to_string(),
            hostname: field(6).to_string(),
            registration: field(7).to_string(),
        })
    }
}

/// `Group: <name> ... Topic: <topic>` header line of a who listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHeader {
    pub name: String,
    /// `None` when the topic is absent or `(None)`
    pub topic: Option<String>,
}

impl GroupHeader {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix(GROUP_PREFIX)?;
        let name = rest.split(' ').next().unwrap_or("");
        if name.is_empty() {
            return None;
        }

        let topic = line
            .find(TOPIC_MARKER)
            .map(|idx| &line[idx + TOPIC_MARKER.len()..])
            .filter(|topic| !topic.starts_with(TOPIC_UNSET))
            .map(|topic| topic.trim_end().to_string());

        Some(Self {
            name: name.to_string(),
            topic,
        })
    }
}

/// Leading nick of a status message such as
/// `"bob (bob@host) entered group"`. Needs the space that ends the nick.
pub fn leading_nick(text: &str) -> Option<&str> {
    let (nick, _) = text.split_once(' ')?;
    (!nick.is_empty()).then_some(nick)
}

/// `"<old> changed nickname to <new>"`: old nick is the first token,
/// new nick the last one.
// Heuristic: anything the server appends after the new nick ends up in it.
pub fn parse_rename(text: &str) -> Option<(&str, &str)> {
    let old = leading_nick(text)?;
    let (_, new) = text.rsplit_once(' ')?;
    (!new.is_empty()).then_some((old, new))
}

/// `<setter> changed the topic to "<topic>"`: returns `(setter, topic)`.
pub fn parse_topic_change(text: &str) -> Option<(&str, &str)> {
    let start = text.find('"')? + 1;
    let end = text.rfind('"')?;
    if end < start {
        return None;
    }
    let setter = leading_nick(text)?;
    Some((setter, &text[start..end]))
}

/// Scrape state for one session
#[derive(Debug, Default, Clone)]
pub struct MembershipTracker {
    silent_who: bool,
    accepting_nicks: bool,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a silent full who listing as requested. The caller sends the
    /// actual `w` command.
    pub fn begin_scrape(&mut self) {
        self.silent_who = true;
        self.accepting_nicks = false;
    }

    /// True while who output belongs to a scrape and should not be shown
    pub fn is_silent(&self) -> bool {
        self.silent_who
    }

    pub fn is_accepting_nicks(&self) -> bool {
        self.accepting_nicks
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Handle one `co` output line.
    ///
    /// Every `co` line ends the run of `wl` lines before it. During a scrape
    /// the header of our group starts a new run (and may carry the topic),
    /// and the `Total:` line ends the scrape.
    pub fn command_output(
        &mut self,
        group: &mut Group,
        line: &str,
        now: DateTime<Utc>,
    ) -> Option<GroupChange> {
        self.accepting_nicks = false;

        if !self.silent_who {
            return None;
        }

        if let Some(header) = GroupHeader::parse(line) {
            if group.is_named(&header.name) {
                self.accepting_nicks = true;
                group.clear_members();

                if let Some(topic) = header.topic {
                    group.set_topic(Some(&topic), Some(UNKNOWN_SETTER), now);
                    return Some(GroupChange::TopicChanged);
                }
            }
            return None;
        }

        if line.starts_with(TOTAL_PREFIX) {
            self.silent_who = false;
            return Some(GroupChange::MembershipSettled);
        }

        None
    }

    /// Handle one `wl` line. Returns true if the nick was recorded.
    pub fn who_line(&mut self, group: &mut Group, entry: &WhoEntry) -> bool {
        if !self.accepting_nicks {
            return false;
        }
        group.insert_member(&entry.nick);
        true
    }

    /// `Arrive` / `Sign-on` status text
    pub fn member_arrived(&mut self, group: &mut Group, text: &str) -> Option<String> {
        let nick = leading_nick(text)?;
        group.insert_member(nick);
        Some(nick.to_string())
    }

    /// `Depart` / `Sign-off` status text
    pub fn member_departed(&mut self, group: &mut Group, text: &str) -> Option<String> {
        let nick = leading_nick(text)?;
        group.remove_member(nick);
        Some(nick.to_string())
    }

    /// `Name` status text. The rename is reported even when the old nick is
    /// not in our group, since it may be our own nick.
    pub fn member_renamed(&mut self, group: &mut Group, text: &str) -> Option<GroupChange> {
        let (old, new) = parse_rename(text)?;
        group.rename_member(old, new);
        Some(GroupChange::Renamed {
            old: old.to_string(),
            new: new.to_string(),
        })
    }

    /// `Topic` status text. ICB carries no set time, so `now` is used.
    pub fn topic_changed(
        &mut self,
        group: &mut Group,
        text: &str,
        now: DateTime<Utc>,
    ) -> Option<GroupChange> {
        let (setter, topic) = parse_topic_change(text)?;
        group.set_topic(Some(topic), Some(setter), now);
        Some(GroupChange::TopicChanged)
    }
}
