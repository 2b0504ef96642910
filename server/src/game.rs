use crate::replicated::{Replicated, SubscriptionId};
use log::info;
use shared::ClientId;

/// Last-kart-standing tracker
///
/// Registered players form the active list. Each elimination removes one;
/// when one or zero remain the game is over, with the survivor (if any) as
/// the winner. Game over is terminal until `restart`.
#[derive(Debug)]
pub struct GameState {
    active_players: Vec<ClientId>,
    is_game_over: Replicated<bool>,
    winner: Replicated<Option<ClientId>>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            active_players: Vec::new(),
            is_game_over: Replicated::new(false),
            winner: Replicated::new(None),
        }
    }

    pub fn active_players(&self) -> &[ClientId] {
        &self.active_players
    }

    pub fn is_game_over(&self) -> bool {
        *self.is_game_over.get()
    }

    pub fn winner(&self) -> Option<ClientId> {
        *self.winner.get()
    }

    pub fn subscribe_game_over<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&bool, &bool) + Send + 'static,
    {
        self.is_game_over.subscribe(observer)
    }

    pub fn subscribe_winner<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Option<ClientId>, &Option<ClientId>) + Send + 'static,
    {
        self.winner.subscribe(observer)
    }

    pub fn register_player(&mut self, client_id: ClientId) {
        if self.is_game_over() || self.active_players.contains(&client_id) {
            return;
        }
        self.active_players.push(client_id);
        info!(
            "Player {} joined. Total active: {}",
            client_id,
            self.active_players.len()
        );
    }

    /// Returns true if the elimination was counted
    pub fn on_player_eliminated(&mut self, client_id: ClientId) -> bool {
        if self.is_game_over() {
            return false;
        }
        let Some(index) = self.active_players.iter().position(|id| *id == client_id) else {
            return false;
        };

        self.active_players.remove(index);
        info!(
            "Player {} eliminated. Remaining: {}",
            client_id,
            self.active_players.len()
        );
        self.check_win_condition();
        true
    }

    /// A player leaving mid-game counts as eliminated
    pub fn on_client_disconnect(&mut self, client_id: ClientId) -> bool {
        self.on_player_eliminated(client_id)
    }

    fn check_win_condition(&mut self) {
        if self.active_players.len() > 1 {
            return;
        }

        let winner = self.active_players.first().copied();
        // Winner first so observers of game over can read it
        self.winner.set(winner);
        self.is_game_over.set(true);

        match winner {
            Some(id) => info!("Game over, winner is player {}", id),
            None => info!("Game over, draw"),
        }
    }

    pub fn restart(&mut self) {
        self.is_game_over.set(false);
        self.winner.set(None);
        self.active_players.clear();
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
