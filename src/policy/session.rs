//! Session policy
//!
//! Either stateless (no record is ever created) or bounded concurrency,
//! where each subject may hold at most `max_sessions` live records.
//!
//! The registry is keyed by subject. All reads and writes of one subject's
//! records happen under that subject's map entry guard, so two concurrent
//! logins cannot both observe a free slot. Idle expiry is checked lazily on
//! access; terminal records linger as tombstones (capped per subject) so a
//! client presenting an evicted token is told its session expired.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::provider::Identity;
use crate::config::{BoundedSessionConfig, SessionConfig};
use crate::utils::errors::{GateError, GateResult};

/// What happens when a subject already holds the maximum number of sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFull {
    /// Refuse the new login
    RejectNew,
    /// Invalidate the oldest live session and admit the new one
    EvictOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Expired,
    Invalidated,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Expired | SessionState::Invalidated)
    }

    fn can_transition_to(self, next: SessionState) -> bool {
        match (self, next) {
            (SessionState::Created, SessionState::Active) => true,
            (SessionState::Active, SessionState::Active) => true,
            (from, to) => !from.is_terminal() && to.is_terminal(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub identity: Identity,
    pub token: String,
    pub created_at: DateTime<Utc>,
    last_accessed: Instant,
    state: SessionState,
}

impl SessionRecord {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            token: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            last_accessed: Instant::now(),
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply a state change; returns false when the transition is not allowed
    fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    fn touch(&mut self) -> bool {
        if self.transition(SessionState::Active) {
            self.last_accessed = Instant::now();
            true
        } else {
            false
        }
    }

    fn is_idle(&self, timeout: Duration) -> bool {
        self.last_accessed.elapsed() > timeout
    }
}

/// Handed back to the caller after a successful bounded-mode login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub token: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

/// Result of looking a session token up
#[derive(Debug, Clone, PartialEq)]
pub enum SessionLookup {
    Active(Identity),
    /// Token belonged to a session that expired or was invalidated
    Expired,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedSessions {
    pub max_sessions: usize,
    pub on_full: OnFull,
    pub idle_timeout: Duration,
    pub expired_url: String,
    pub cookie_name: String,
}

impl From<&BoundedSessionConfig> for BoundedSessions {
    fn from(config: &BoundedSessionConfig) -> Self {
        Self {
            max_sessions: config.max_sessions.max(1),
            on_full: if config.prevent_new_login_when_full {
                OnFull::RejectNew
            } else {
                OnFull::EvictOldest
            },
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            expired_url: config.expired_url.clone(),
            cookie_name: config.cookie_name.clone(),
        }
    }
}

pub struct SessionRegistry {
    settings: BoundedSessions,
    by_subject: DashMap<String, Vec<SessionRecord>>,
    tokens: DashMap<String, String>,
}

impl SessionRegistry {
    pub fn new(settings: BoundedSessions) -> Self {
        Self {
            settings,
            by_subject: DashMap::new(),
            tokens: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &BoundedSessions {
        &self.settings
    }

    fn expire_idle(&self, records: &mut [SessionRecord]) {
        for record in records.iter_mut() {
            if !record.state.is_terminal() && record.is_idle(self.settings.idle_timeout) {
                record.transition(SessionState::Expired);
                debug!(subject = %record.identity.subject, "session expired after idle timeout");
            }
        }
    }

    /// Drop the oldest tombstones beyond the per-subject cap
    fn cap_tombstones(&self, records: &mut Vec<SessionRecord>) -> Vec<String> {
        let terminal = records.iter().filter(|r| r.state.is_terminal()).count();
        let mut excess = terminal.saturating_sub(self.settings.max_sessions);
        let mut dropped = Vec::new();
        records.retain(|r| {
            if excess > 0 && r.state.is_terminal() {
                excess -= 1;
                dropped.push(r.token.clone());
                false
            } else {
                true
            }
        });
        dropped
    }

    /// Create a session for a freshly authenticated identity
    pub fn register(&self, identity: &Identity) -> GateResult<SessionTicket> {
        let subject = identity.subject.clone();
        let mut entry = self.by_subject.entry(subject.clone()).or_default();
        let records = entry.value_mut();

        self.expire_idle(records);

        let live = records.iter().filter(|r| !r.state.is_terminal()).count();
        if live >= self.settings.max_sessions {
            match self.settings.on_full {
                OnFull::RejectNew => {
                    info!(%subject, live, "login rejected, session limit reached");
                    return Err(GateError::TooManySessions {
                        subject,
                        redirect: self.settings.expired_url.clone(),
                    });
                }
                OnFull::EvictOldest => {
                    let mut to_evict = live + 1 - self.settings.max_sessions;
                    for record in records.iter_mut().filter(|r| !r.state.is_terminal()) {
                        if to_evict == 0 {
                            break;
                        }
                        record.transition(SessionState::Invalidated);
                        to_evict -= 1;
                        info!(%subject, "oldest session invalidated to admit a new login");
                    }
                }
            }
        }

        let record = SessionRecord::new(identity.clone());
        let ticket = SessionTicket {
            token: record.token.clone(),
            subject: subject.clone(),
            created_at: record.created_at,
        };
        self.tokens.insert(record.token.clone(), subject.clone());
        records.push(record);

        for token in self.cap_tombstones(records) {
            self.tokens.remove(&token);
        }

        debug!(%subject, "session created");
        Ok(ticket)
    }

    /// Resolve a session token, marking the session active
    pub fn lookup(&self, token: &str) -> SessionLookup {
        let Some(subject) = self.tokens.get(token).map(|s| s.value().clone()) else {
            return SessionLookup::Unknown;
        };

        let outcome = {
            let Some(mut entry) = self.by_subject.get_mut(&subject) else {
                self.tokens.remove(token);
                return SessionLookup::Unknown;
            };
            let records = entry.value_mut();
            self.expire_idle(records);

            match records.iter().position(|r| r.token == token) {
                None => SessionLookup::Unknown,
                Some(idx) if records[idx].state.is_terminal() => {
                    records.remove(idx);
                    SessionLookup::Expired
                }
                Some(idx) => {
                    let record = &mut records[idx];
                    if record.touch() {
                        SessionLookup::Active(record.identity.clone())
                    } else {
                        SessionLookup::Expired
                    }
                }
            }
        };

        if !matches!(outcome, SessionLookup::Active(_)) {
            self.tokens.remove(token);
            self.by_subject.remove_if(&subject, |_, records| records.is_empty());
        }
        outcome
    }

    /// Explicit logout; returns false when the token is not a live session
    pub fn invalidate(&self, token: &str) -> bool {
        let Some((_, subject)) = self.tokens.remove(token) else {
            return false;
        };

        let invalidated = match self.by_subject.get_mut(&subject) {
            Some(mut entry) => {
                let records = entry.value_mut();
                match records.iter().position(|r| r.token == token) {
                    Some(idx) => {
                        let mut record = records.remove(idx);
                        record.transition(SessionState::Invalidated)
                    }
                    None => false,
                }
            }
            None => false,
        };

        self.by_subject.remove_if(&subject, |_, records| records.is_empty());
        if invalidated {
            debug!(%subject, "session invalidated by logout");
        }
        invalidated
    }

    /// Live sessions for a subject, after lazy expiry
    pub fn live_sessions(&self, subject: &str) -> usize {
        match self.by_subject.get_mut(subject) {
            Some(mut entry) => {
                let records = entry.value_mut();
                self.expire_idle(records);
                records.iter().filter(|r| !r.state.is_terminal()).count()
            }
            None => 0,
        }
    }

    /// Number of tokens tracked, tombstones included
    pub fn tracked_tokens(&self) -> usize {
        self.tokens.len()
    }
}

/// Session handling mode, fixed at startup
pub enum SessionPolicy {
    Stateless,
    BoundedConcurrency(SessionRegistry),
}

impl SessionPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        match config {
            SessionConfig::Stateless => SessionPolicy::Stateless,
            SessionConfig::Bounded(bounded) => {
                SessionPolicy::BoundedConcurrency(SessionRegistry::new(bounded.into()))
            }
        }
    }

    pub fn is_stateless(&self) -> bool {
        matches!(self, SessionPolicy::Stateless)
    }

    /// Cookie carrying the session token, bounded mode only
    pub fn cookie_name(&self) -> Option<&str> {
        match self {
            SessionPolicy::Stateless => None,
            SessionPolicy::BoundedConcurrency(registry) => Some(&registry.settings.cookie_name),
        }
    }

    /// Stateless logins create nothing and return `None`
    pub fn login(&self, identity: &Identity) -> GateResult<Option<SessionTicket>> {
        match self {
            SessionPolicy::Stateless => Ok(None),
            SessionPolicy::BoundedConcurrency(registry) => registry.register(identity).map(Some),
        }
    }

    /// Identity attached to a session token, if any
    pub fn resolve(&self, token: Option<&str>) -> GateResult<Option<Identity>> {
        let (SessionPolicy::BoundedConcurrency(registry), Some(token)) = (self, token) else {
            return Ok(None);
        };
        match registry.lookup(token) {
            SessionLookup::Active(identity) => Ok(Some(identity)),
            SessionLookup::Expired => Err(GateError::SessionExpired {
                redirect: registry.settings.expired_url.clone(),
            }),
            SessionLookup::Unknown => Ok(None),
        }
    }

    pub fn logout(&self, token: &str) -> bool {
        match self {
            SessionPolicy::Stateless => false,
            SessionPolicy::BoundedConcurrency(registry) => registry.invalidate(token),
        }
    }
}
