//! Item box pickup arbitration
//!
//! A box hands out at most one item per activation. Contacts are only honoured
//! while the box is active, the claimant is not the latched last claimant, and
//! the claimant's slot is empty. Once claimed the box goes inactive until its
//! respawn timer fires, at which point the claimant latch is cleared so that
//! nobody stays locked out.

use crate::items::{select_weighted, ItemDrop};
use crate::kart_items::KartItemSystem;
use crate::replicated::{Replicated, SubscriptionId};
use log::{debug, info};
use rand::Rng;
use shared::{BoxId, ClientId, ItemType};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted(ItemType),
    Inactive,
    RepeatClaimant,
    SlotFull,
    NothingToDrop,
}

#[derive(Debug)]
pub struct ItemBox {
    id: BoxId,
    active: Replicated<bool>,
    respawn_delay: Duration,
    drops: Vec<ItemDrop>,
    last_claimant: Option<ClientId>,
}

impl ItemBox {
    pub fn new(id: BoxId, respawn_delay: Duration, drops: Vec<ItemDrop>) -> Self {
        Self {
            id,
            active: Replicated::new(true),
            respawn_delay,
            drops,
            last_claimant: None,
        }
    }

    pub fn id(&self) -> BoxId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        *self.active.get()
    }

    pub fn respawn_delay(&self) -> Duration {
        self.respawn_delay
    }

    pub fn last_claimant(&self) -> Option<ClientId> {
        self.last_claimant
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&bool, &bool) + Send + 'static,
    {
        self.active.subscribe(observer)
    }

    /// Evaluates a contact from the kart owning `kart`
    ///
    /// On `Granted` the box is already inactive; the caller is responsible for
    /// scheduling `respawn` after `respawn_delay`. Contacts against one box are
    /// serialized through `&mut self`, so one activation has one winner.
    pub fn try_claim<R: Rng + ?Sized>(&mut self, kart: &mut KartItemSystem, rng: &mut R) -> ClaimOutcome {
        if !self.is_active() {
            return ClaimOutcome::Inactive;
        }

        let claimant = kart.owner();

        if self.last_claimant == Some(claimant) {
            debug!("Box {}: duplicate pickup attempt by {}", self.id, claimant);
            return ClaimOutcome::RepeatClaimant;
        }
        if !kart.can_pickup() {
            return ClaimOutcome::SlotFull;
        }

        let item = select_weighted(&self.drops, rng);
        if item == ItemType::None || !kart.grant(item) {
            return ClaimOutcome::NothingToDrop;
        }

        self.last_claimant = Some(claimant);
        self.active.set(false);
        info!("Box {}: granted {} to player {}", self.id, item, claimant);
        ClaimOutcome::Granted(item)
    }

    /// Reactivates the box and forgets the last claimant
    pub fn respawn(&mut self) {
        self.active.set(true);
        self.last_claimant = None;
        debug!("Box {} respawned", self.id);
    }
}
