//! Held-item slot of a kart
//!
//! Pickup and consumption are mutually exclusive transitions on the same
//! slot: a full slot refuses pickups, an empty slot has nothing to use, and a
//! use request must name exactly the item the authority has on record.

use crate::replicated::{Replicated, SubscriptionId};
use crate::validation::{authorize, Rejection};
use log::debug;
use shared::{ClientId, ItemType};

#[derive(Debug)]
pub struct KartItemSystem {
    owner: ClientId,
    current: Replicated<ItemType>,
    /// Last-used latch, cleared by `end_tick`
    used_this_tick: bool,
}

impl KartItemSystem {
    pub fn new(owner: ClientId) -> Self {
        Self {
            owner,
            current: Replicated::new(ItemType::None),
            used_this_tick: false,
        }
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn current(&self) -> ItemType {
        *self.current.get()
    }

    pub fn can_pickup(&self) -> bool {
        self.current() == ItemType::None
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ItemType, &ItemType) + Send + 'static,
    {
        self.current.subscribe(observer)
    }

    /// Authority-side equip, used when an item box awards an item
    pub fn grant(&mut self, item: ItemType) -> bool {
        if item == ItemType::None || !self.can_pickup() {
            return false;
        }
        self.current.set(item)
    }

    /// Remote entry point: the owner asks to equip an item directly
    pub fn request_equip(&mut self, caller: ClientId, item: ItemType) -> Result<(), Rejection> {
        authorize(caller, self.owner)?;
        if item == ItemType::None {
            return Err(Rejection::EmptyPayload);
        }
        if !self.can_pickup() {
            debug!(
                "Player {} already holds {}, refusing {}",
                self.owner,
                self.current(),
                item
            );
            return Err(Rejection::Duplicate);
        }
        self.current.set(item);
        Ok(())
    }

    /// Remote entry point: the owner uses the item it believes it holds
    ///
    /// Returns the consumed item. A request naming a different item than the
    /// one on record comes from stale client state and changes nothing.
    pub fn request_use(&mut self, caller: ClientId, item: ItemType) -> Result<ItemType, Rejection> {
        authorize(caller, self.owner)?;

        if self.used_this_tick {
            return Err(Rejection::Duplicate);
        }

        let held = self.current();
        if held == ItemType::None || held != item {
            debug!(
                "Player {} tried to use {} but holds {}",
                self.owner, item, held
            );
            return Err(Rejection::Stale);
        }

        self.used_this_tick = true;
        self.current.set(ItemType::None);
        Ok(held)
    }

    pub fn end_tick(&mut self) {
        self.used_this_tick = false;
    }

    /// Empties the slot without using the item (session reset)
    pub fn clear(&mut self) {
        self.current.set(ItemType::None);
        self.used_this_tick = false;
    }
}
