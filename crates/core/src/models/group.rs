//! Group model - ICB's only channel concept

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The group a session currently occupies.
///
/// A session is in exactly one group at a time. Switching groups replaces
/// the whole record, so nothing here is ever renamed in place. Nick and
/// group names compare case-insensitively, as ICB does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub topic: Option<String>,
    pub topic_by: Option<String>,
    pub topic_time: Option<DateTime<Utc>>,
    /// Lowercased nick -> nick as last seen
    members: BTreeMap<String, String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: None,
            topic_by: None,
            topic_time: None,
            members: BTreeMap::new(),
        }
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Update topic fields. `None` leaves the existing value untouched; the
    /// set time is always replaced.
    pub fn set_topic(&mut self, topic: Option<&str>, set_by: Option<&str>, at: DateTime<Utc>) {
        if let Some(topic) = topic {
            self.topic = Some(topic.to_string());
        }
        if let Some(set_by) = set_by {
            self.topic_by = Some(set_by.to_string());
        }
        self.topic_time = Some(at);
    }

    /// Add a member. Returns false if already present.
    pub fn insert_member(&mut self, nick: &str) -> bool {
        let key = nick.to_ascii_lowercase();
        let added = !self.members.contains_key(&key);
        self.members.insert(key, nick.to_string());
        added
    }

    /// Remove a member. Returns false if unknown.
    pub fn remove_member(&mut self, nick: &str) -> bool {
        self.members.remove(&nick.to_ascii_lowercase()).is_some()
    }

    /// Rename a member in place. Returns false if `old` is not a member.
    pub fn rename_member(&mut self, old: &str, new: &str) -> bool {
        if !self.remove_member(old) {
            return false;
        }
        self.insert_member(new);
        true
    }

    pub fn clear_members(&mut self) {
        self.members.clear();
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.members.contains_key(&nick.to_ascii_lowercase())
    }

    /// Member nicks, sorted case-insensitively
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.values().map(String::as_str)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
