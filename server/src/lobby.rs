//! Pre-game roster and readiness

use crate::replicated::{ListChange, ReplicatedList, SubscriptionId};
use crate::validation::{authorize_host, Rejection};
use log::{debug, info};
use shared::{ClientId, RosterEntry};

#[derive(Debug)]
pub struct LobbyManager {
    roster: ReplicatedList<RosterEntry>,
    min_players: usize,
}

impl LobbyManager {
    pub fn new(min_players: usize) -> Self {
        Self {
            roster: ReplicatedList::new(),
            min_players,
        }
    }

    pub fn roster(&self) -> &[RosterEntry] {
        self.roster.as_slice()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.roster.iter().any(|entry| entry.client_id == client_id)
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ListChange<RosterEntry>, &[RosterEntry]) + Send + 'static,
    {
        self.roster.subscribe(observer)
    }

    /// Adds a not-ready entry; returns false when the client is already listed
    pub fn add_player(&mut self, client_id: ClientId) -> bool {
        if self.contains(client_id) {
            return false;
        }
        self.roster.push(RosterEntry::new(client_id));
        info!("Lobby: player {} joined ({} total)", client_id, self.len());
        true
    }

    pub fn remove_player(&mut self, client_id: ClientId) -> bool {
        match self.roster.position(|entry| entry.client_id == client_id) {
            Some(index) => {
                self.roster.remove_at(index);
                info!("Lobby: player {} left ({} total)", client_id, self.len());
                true
            }
            None => false,
        }
    }

    /// Flips the caller's own ready flag
    ///
    /// The caller identity selects the entry, so a client can never toggle
    /// somebody else.
    pub fn toggle_ready(&mut self, caller: ClientId) -> Result<bool, Rejection> {
        let index = self
            .roster
            .position(|entry| entry.client_id == caller)
            .ok_or(Rejection::UnknownEntity)?;

        let mut entry = self.roster.as_slice()[index].clone();
        entry.is_ready = !entry.is_ready;
        let ready = entry.is_ready;
        self.roster.set(index, entry);
        Ok(ready)
    }

    pub fn can_start(&self) -> bool {
        self.len() >= self.min_players && self.roster.iter().all(|entry| entry.is_ready)
    }

    /// Host-only; succeeds only when enough players are present and all ready
    pub fn start_game(&self, caller: ClientId) -> Result<(), Rejection> {
        authorize_host(caller)?;

        if self.len() < self.min_players {
            debug!("Not enough players! ({}/{})", self.len(), self.min_players);
            return Err(Rejection::WrongPhase);
        }
        if !self.roster.iter().all(|entry| entry.is_ready) {
            debug!("Not all players ready!");
            return Err(Rejection::WrongPhase);
        }
        Ok(())
    }
}
