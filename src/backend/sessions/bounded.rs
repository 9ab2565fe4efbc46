//! Bounded session list
//!
//! A user's sessions kept sorted by `login_at` with a hard capacity. Every
//! insert enforces the capacity through [`SessionList::evict_oldest`], so the
//! list can never exceed it.

use crate::shared::messaging::Session;

/// Maximum concurrent device sessions per user
pub const MAX_SESSIONS_PER_USER: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionList {
    /// Sorted by `login_at`; equal timestamps keep insertion order
    entries: Vec<Session>,
    capacity: usize,
}

impl Default for SessionList {
    fn default() -> Self {
        Self::new(MAX_SESSIONS_PER_USER)
    }
}

impl SessionList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild from stored rows, which may arrive in any order
    pub fn from_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let mut list = Self::default();
        for session in sessions {
            list.place(session);
        }
        list
    }

    /// Insert a session, evicting the oldest entries first if the list is full.
    ///
    /// Returns the evicted sessions, oldest first.
    pub fn insert(&mut self, session: Session) -> Vec<Session> {
        let evicted = self.evict_oldest(self.capacity - 1);
        self.place(session);
        evicted
    }

    /// Drop the oldest sessions until at most `keep` remain
    pub fn evict_oldest(&mut self, keep: usize) -> Vec<Session> {
        if self.entries.len() <= keep {
            return Vec::new();
        }
        let excess = self.entries.len() - keep;
        self.entries.drain(..excess).collect()
    }

    fn place(&mut self, session: Session) {
        let at = self
            .entries
            .partition_point(|existing| existing.login_at <= session.login_at);
        self.entries.insert(at, session);
    }

    pub fn remove(&mut self, device_id: &str) -> Option<Session> {
        let index = self.entries.iter().position(|s| s.device_id == device_id)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.entries)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.entries.iter().any(|s| s.device_id == device_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.entries.iter()
    }
}
