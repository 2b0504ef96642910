//! Kart placement for newly ready players

use log::{debug, error, info};
use rand::Rng;
use shared::ClientId;
use std::collections::HashSet;

/// Height karts are dropped in at
const SPAWN_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub model: usize,
    pub position: (f32, f32, f32),
}

/// Hands out spawn positions and kart models
///
/// Positions cycle North, South, East, West around the arena center. Models
/// are drawn at random from those not yet used and the pool refills once
/// every model has been handed out.
#[derive(Debug)]
pub struct Spawner {
    spawn_distance: f32,
    model_count: usize,
    spawn_index: usize,
    used_models: Vec<usize>,
    spawned: HashSet<ClientId>,
}

impl Spawner {
    pub fn new(spawn_distance: f32, model_count: usize) -> Self {
        Self {
            spawn_distance,
            model_count,
            spawn_index: 0,
            used_models: Vec::new(),
            spawned: HashSet::new(),
        }
    }

    pub fn has_kart(&self, client_id: ClientId) -> bool {
        self.spawned.contains(&client_id)
    }

    /// Picks a model and position for `client_id`
    ///
    /// Returns `None` when the client already has a kart or there are no
    /// models to pick from.
    pub fn spawn<R: Rng + ?Sized>(&mut self, client_id: ClientId, rng: &mut R) -> Option<SpawnPoint> {
        if self.has_kart(client_id) {
            debug!("Client {} already has a kart, skipping duplicate spawn", client_id);
            return None;
        }
        if self.model_count == 0 {
            error!("No kart models configured, cannot spawn client {}", client_id);
            return None;
        }

        let model = self.select_model(rng);
        let position = self.next_position();
        self.spawned.insert(client_id);

        info!(
            "Spawning client {} with model {} at ({:.1}, {:.1}, {:.1})",
            client_id, model, position.0, position.1, position.2
        );
        Some(SpawnPoint { model, position })
    }

    /// Forgets the client's kart so a later spawn is allowed
    pub fn despawn(&mut self, client_id: ClientId) -> bool {
        self.spawned.remove(&client_id)
    }

    pub fn reset(&mut self) {
        self.spawn_index = 0;
        self.used_models.clear();
        self.spawned.clear();
    }

    fn select_model<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        if self.used_models.len() >= self.model_count {
            debug!("All kart models used, resetting model pool");
            self.used_models.clear();
        }

        let available: Vec<usize> = (0..self.model_count)
            .filter(|model| !self.used_models.contains(model))
            .collect();
        let model = available[rng.gen_range(0..available.len())];
        self.used_models.push(model);
        model
    }

    fn next_position(&mut self) -> (f32, f32, f32) {
        let d = self.spawn_distance;
        let position = match self.spawn_index {
            0 => (0.0, SPAWN_HEIGHT, d),
            1 => (0.0, SPAWN_HEIGHT, -d),
            2 => (d, SPAWN_HEIGHT, 0.0),
            _ => (-d, SPAWN_HEIGHT, 0.0),
        };
        self.spawn_index = (self.spawn_index + 1) % 4;
        position
    }
}
