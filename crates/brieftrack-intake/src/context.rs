// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime settings and the role directory, shared as one swappable snapshot.
//!
//! Readers take a cheap [`Arc`] of the current snapshot and never see a
//! half-applied reload. [`ContextHandle::reload`] replaces the whole thing.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use brieftrack_config::BriefConfig;
use brieftrack_config::model::RolesConfig;
use brieftrack_core::{CallbackEvent, InboundMessage};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::info;

/// Who sent a message or pressed a button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub name: Option<String>,
}

impl Sender {
    pub fn from_message(msg: &InboundMessage) -> Self {
        Self {
            id: msg.sender_id,
            username: msg.sender_username.clone(),
            name: msg.sender_name.clone(),
        }
    }

    pub fn from_callback(cb: &CallbackEvent) -> Self {
        Self {
            id: Some(cb.sender_id),
            username: cb.sender_username.clone(),
            name: cb.sender_name.clone(),
        }
    }

    /// `@username` when known, else the display name, else the numeric id.
    pub fn display(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{username}");
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.id {
            Some(id) => format!("user {id}"),
            None => "unknown".to_string(),
        }
    }

    /// Name recorded in the audit log.
    pub fn audit_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| self.display())
    }
}

fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('@').to_lowercase();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Members of one role, by id or by username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    ids: HashSet<i64>,
    usernames: HashSet<String>,
    ordered_usernames: Vec<String>,
    ordered_ids: Vec<i64>,
}

impl RoleSet {
    pub fn new(ids: &[i64], usernames: &[String]) -> Self {
        let mut set = Self::default();
        for &id in ids {
            if set.ids.insert(id) {
                set.ordered_ids.push(id);
            }
        }
        for name in usernames.iter().filter_map(|u| normalize_username(u)) {
            if set.usernames.insert(name.clone()) {
                set.ordered_usernames.push(name);
            }
        }
        set
    }

    pub fn contains(&self, sender: &Sender) -> bool {
        if sender.id.is_some_and(|id| self.ids.contains(&id)) {
            return true;
        }
        sender
            .username
            .as_deref()
            .and_then(normalize_username)
            .is_some_and(|u| self.usernames.contains(&u))
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.usernames.is_empty()
    }

    /// HTML mentions: `@name` for usernames, a user link for bare ids.
    pub fn mentions(&self, link_label: &str) -> String {
        self.ordered_usernames
            .iter()
            .map(|u| format!("@{u}"))
            .chain(
                self.ordered_ids
                    .iter()
                    .map(|id| format!("<a href=\"tg://user?id={id}\">{link_label}</a>")),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Admins, teamleads, and models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDirectory {
    pub admins: RoleSet,
    pub teamleads: RoleSet,
    pub models: RoleSet,
}

impl RoleDirectory {
    pub fn from_config(roles: &RolesConfig) -> Self {
        Self {
            admins: RoleSet::new(&roles.admin_ids, &roles.admin_usernames),
            teamleads: RoleSet::new(&roles.teamlead_ids, &roles.teamlead_usernames),
            models: RoleSet::new(&roles.model_ids, &roles.model_usernames),
        }
    }

    pub fn is_admin(&self, sender: &Sender) -> bool {
        self.admins.contains(sender)
    }

    /// Teamleads are trusted submitters: their messages skip the heuristics.
    pub fn is_teamlead(&self, sender: &Sender) -> bool {
        self.teamleads.contains(sender)
    }

    pub fn is_model(&self, sender: &Sender) -> bool {
        self.models.contains(sender)
    }

    pub fn is_admin_or_teamlead(&self, sender: &Sender) -> bool {
        self.is_admin(sender) || self.is_teamlead(sender)
    }

    pub fn can_change_deadline(&self, sender: &Sender) -> bool {
        self.is_admin_or_teamlead(sender) || self.is_model(sender)
    }

    /// Anyone with a role may register a brief by hand with `/add`.
    pub fn can_register_brief(&self, sender: &Sender) -> bool {
        self.is_admin_or_teamlead(sender) || self.is_model(sender)
    }
}

/// Immutable view of configuration plus derived lookups.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub config: BriefConfig,
    pub roles: RoleDirectory,
    timezone: Option<Tz>,
}

impl RuntimeContext {
    pub fn new(config: BriefConfig) -> Self {
        let roles = RoleDirectory::from_config(&config.roles);
        let timezone = config.reminders.timezone.trim().parse::<Tz>().ok();
        Self {
            config,
            roles,
            timezone,
        }
    }

    /// Configured zone, or `None` if the name does not parse.
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    /// Calendar date in the configured zone (UTC if the zone is invalid).
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match self.timezone {
            Some(tz) => now.with_timezone(&tz).date_naive(),
            None => now.date_naive(),
        }
    }

    pub fn working_chat(&self) -> Option<i64> {
        self.config.telegram.chat_id.filter(|&id| id != 0)
    }

    pub fn working_topic(&self) -> Option<i64> {
        self.config.telegram.topic_id.filter(|&id| id != 0)
    }

    pub fn is_working_chat(&self, chat_id: i64) -> bool {
        self.working_chat() == Some(chat_id)
    }

    pub fn is_working_topic(&self, chat_id: i64, topic_id: Option<i64>) -> bool {
        self.is_working_chat(chat_id) && topic_id == self.working_topic()
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.config.intake.confidence_threshold
    }
}

/// Shared, atomically swappable [`RuntimeContext`].
#[derive(Debug, Clone)]
pub struct ContextHandle {
    inner: Arc<ArcSwap<RuntimeContext>>,
}

impl ContextHandle {
    pub fn new(config: BriefConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(RuntimeContext::new(config))),
        }
    }

    /// Current snapshot. Hold it for the duration of one operation.
    pub fn load(&self) -> Arc<RuntimeContext> {
        self.inner.load_full()
    }

    /// Replace settings and roles in one step.
    pub fn reload(&self, config: BriefConfig) {
        let next = RuntimeContext::new(config);
        info!(
            admins_configured = !next.roles.admins.is_empty(),
            chat_id = ?next.working_chat(),
            topic_id = ?next.working_topic(),
            "runtime context reloaded"
        );
        self.inner.store(Arc::new(next));
    }
}
