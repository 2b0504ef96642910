//! Per-kart lives and the one-way elimination latch

use crate::events::{EventSender, SessionEvent};
use crate::replicated::{Replicated, SubscriptionId};
use crate::validation::{authorize, validate_damage, Rejection};
use log::{debug, info};
use shared::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    Damaged { remaining: u32 },
    Eliminated,
}

/// Server-owned lives of a single kart
///
/// Lives stay within `[0, max_lives]`. The first time they reach zero the kart
/// is latched as eliminated and `PlayerEliminated` is published exactly once;
/// later damage is dropped as terminal.
#[derive(Debug)]
pub struct HealthSystem {
    owner: ClientId,
    max_lives: u32,
    damage_cap: i32,
    lives: Replicated<u32>,
    eliminated: bool,
    events: EventSender,
}

impl HealthSystem {
    /// Creates the kart's health at full lives and announces the player
    pub fn spawn(owner: ClientId, max_lives: u32, damage_cap: i32, events: EventSender) -> Self {
        let max_lives = max_lives.max(1);
        events.publish(SessionEvent::PlayerJoined(owner));

        Self {
            owner,
            max_lives,
            damage_cap,
            lives: Replicated::new(max_lives),
            eliminated: false,
            events,
        }
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn lives(&self) -> u32 {
        *self.lives.get()
    }

    pub fn max_lives(&self) -> u32 {
        self.max_lives
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&u32, &u32) + Send + 'static,
    {
        self.lives.subscribe(observer)
    }

    /// Remote entry point: a client reports damage to its own kart
    pub fn request_damage(&mut self, caller: ClientId, amount: i32) -> Result<DamageOutcome, Rejection> {
        authorize(caller, self.owner)?;
        self.take_damage(amount)
    }

    /// Authority-side damage, used by projectiles and validated requests
    pub fn take_damage(&mut self, amount: i32) -> Result<DamageOutcome, Rejection> {
        if self.eliminated {
            debug!("Player {} already eliminated, ignoring damage", self.owner);
            return Err(Rejection::Terminal);
        }

        let amount = validate_damage(amount, self.damage_cap)?;
        let remaining = self.lives().saturating_sub(amount);
        self.lives.set(remaining);

        if remaining == 0 {
            self.eliminated = true;
            info!("Player {} eliminated", self.owner);
            self.events.publish(SessionEvent::PlayerEliminated(self.owner));
            return Ok(DamageOutcome::Eliminated);
        }

        Ok(DamageOutcome::Damaged { remaining })
    }

    /// Restores lives up to the maximum; an eliminated kart stays out
    pub fn add_lives(&mut self, amount: u32) -> Result<u32, Rejection> {
        if self.eliminated {
            return Err(Rejection::Terminal);
        }
        let lives = self.lives().saturating_add(amount).min(self.max_lives);
        self.lives.set(lives);
        Ok(lives)
    }
}
