//! Scripted player that drives a headless client
//!
//! Each decision looks only at the mirrored state, so the bot behaves like a
//! real player reacting to what the authority told it.

use crate::mirror::ClientMirror;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ItemType, Request};

#[derive(Debug)]
pub struct ScriptedPlayer {
    rng: StdRng,
    /// Chance per decision of reporting a crash into a wall
    crash_chance: f64,
    scene_ready_sent: bool,
}

impl ScriptedPlayer {
    pub fn new(seed: u64, crash_chance: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            crash_chance: crash_chance.clamp(0.0, 1.0),
            scene_ready_sent: false,
        }
    }

    /// Next request to send, if any
    pub fn next_request(&mut self, mirror: &ClientMirror) -> Option<Request> {
        let client_id = mirror.client_id()?;

        if !mirror.in_game() {
            self.scene_ready_sent = false;
            let entry = mirror.own_entry()?;
            return (!entry.is_ready).then_some(Request::ToggleReady);
        }

        if mirror.is_game_over() {
            self.scene_ready_sent = false;
            return None;
        }

        if mirror.kart(client_id).is_none() {
            if self.scene_ready_sent {
                return None;
            }
            self.scene_ready_sent = true;
            return Some(Request::SceneReady);
        }

        match mirror.item(client_id) {
            ItemType::None => {
                if self.rng.gen_bool(self.crash_chance) {
                    Some(Request::Damage { amount: 1 })
                } else {
                    None
                }
            }
            item => Some(Request::UseItem { item }),
        }
    }
}
