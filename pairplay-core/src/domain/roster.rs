use crate::domain::{PeerIdentity, PlayerInfo, PlayerStatus, RosterEntry};
use serde::{Deserialize, Serialize};

/// Participants of a two-party session: always self, at most one remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    local: RosterEntry,
    remote: Option<RosterEntry>,
}

impl Roster {
    pub fn new(local_id: PeerIdentity, info: PlayerInfo) -> Self {
        Self {
            local: RosterEntry::new(local_id, info, PlayerStatus::Connecting),
            remote: None,
        }
    }

    pub fn local(&self) -> &RosterEntry {
        &self.local
    }

    pub fn remote(&self) -> Option<&RosterEntry> {
        self.remote.as_ref()
    }

    /// Self first, then the remote if known
    pub fn players(&self) -> Vec<RosterEntry> {
        std::iter::once(self.local.clone())
            .chain(self.remote.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.remote.is_some())
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn set_local_status(&mut self, status: PlayerStatus) {
        self.local.set_status(status);
    }

    /// Replace local info; returns whether anything changed
    pub fn apply_local_info(&mut self, info: PlayerInfo) -> bool {
        if self.local.info() == &info {
            return false;
        }
        self.local.set_info(info);
        true
    }

    /// Insert or update the remote entry
    ///
    /// An announcement from a different identity replaces the previous remote.
    pub fn upsert_remote(&mut self, id: PeerIdentity, info: PlayerInfo, status: PlayerStatus) {
        match self.remote.as_mut() {
            Some(entry) if entry.id() == &id => {
                entry.set_info(info);
                entry.set_status(status);
            }
            _ => self.remote = Some(RosterEntry::new(id, info, status)),
        }
    }

    pub fn set_remote_status(&mut self, status: PlayerStatus) {
        if let Some(entry) = self.remote.as_mut() {
            entry.set_status(status);
        }
    }

    pub fn remove_remote(&mut self) -> Option<RosterEntry> {
        self.remote.take()
    }

    /// Move self to a new identity, dropping the remote
    pub fn reset_local(&mut self, id: PeerIdentity) {
        let info = self.local.info().clone();
        self.local = RosterEntry::new(id, info, PlayerStatus::Connecting);
        self.remote = None;
    }
}
