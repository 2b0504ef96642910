//! Projectiles and the pool they are recycled through
//!
//! A projectile hits at most once. The first contact with a kart that is not
//! its owner applies damage and removes it; a wall or any other
//! non-damageable surface just removes it. Contacts after the first in the
//! same evaluation window are ignored through the hit latch.

use log::{debug, warn};
use shared::{ClientId, ProjectileId};
use std::collections::{HashMap, VecDeque};

/// What a projectile touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactTarget {
    Kart(ClientId),
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactResolution {
    /// Contact had no effect, projectile keeps flying
    Ignored,
    /// Damage `target` and remove the projectile
    Hit { target: ClientId, damage: u32 },
    /// Remove the projectile without damage
    Absorbed,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    id: ProjectileId,
    owner: ClientId,
    damage: u32,
    has_hit: bool,
}

impl Projectile {
    pub fn id(&self) -> ProjectileId {
        self.id
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn has_hit(&self) -> bool {
        self.has_hit
    }

    pub fn resolve_contact(&mut self, target: ContactTarget) -> ContactResolution {
        if self.has_hit {
            return ContactResolution::Ignored;
        }

        match target {
            ContactTarget::Kart(client_id) if client_id == self.owner => {
                debug!(
                    "Projectile {} touched its owner {}, ignoring",
                    self.id, self.owner
                );
                ContactResolution::Ignored
            }
            ContactTarget::Kart(client_id) => {
                self.has_hit = true;
                ContactResolution::Hit {
                    target: client_id,
                    damage: self.damage,
                }
            }
            ContactTarget::Surface => {
                self.has_hit = true;
                ContactResolution::Absorbed
            }
        }
    }
}

/// Recycles projectile slots instead of allocating per shot
///
/// Slots are prewarmed up front. Acquiring reuses an idle slot when one is
/// available and grows the pool otherwise. A reused slot gets a fresh owner
/// and a cleared hit latch.
#[derive(Debug)]
pub struct ProjectilePool {
    idle: VecDeque<ProjectileId>,
    in_flight: HashMap<ProjectileId, Projectile>,
    next_id: ProjectileId,
}

impl ProjectilePool {
    pub fn new(prewarm: usize) -> Self {
        let mut pool = Self {
            idle: VecDeque::with_capacity(prewarm),
            in_flight: HashMap::new(),
            next_id: 0,
        };
        for _ in 0..prewarm {
            let id = pool.allocate_id();
            pool.idle.push_back(id);
        }
        pool
    }

    fn allocate_id(&mut self) -> ProjectileId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn acquire(&mut self, owner: ClientId, damage: u32) -> ProjectileId {
        let id = match self.idle.pop_front() {
            Some(id) => id,
            None => self.allocate_id(),
        };

        self.in_flight.insert(
            id,
            Projectile {
                id,
                owner,
                damage,
                has_hit: false,
            },
        );
        id
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.in_flight.get(&id)
    }

    pub fn get_mut(&mut self, id: ProjectileId) -> Option<&mut Projectile> {
        self.in_flight.get_mut(&id)
    }

    /// Returns a projectile to the idle queue; false when it was not in flight
    pub fn release(&mut self, id: ProjectileId) -> bool {
        if self.in_flight.remove(&id).is_none() {
            warn!("Projectile {} was not spawned by the pool, ignoring return", id);
            return false;
        }
        self.idle.push_back(id);
        true
    }

    /// Ids of everything currently in flight, in ascending order
    pub fn in_flight_ids(&self) -> Vec<ProjectileId> {
        let mut ids: Vec<ProjectileId> = self.in_flight.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn release_all(&mut self) -> Vec<ProjectileId> {
        let ids = self.in_flight_ids();
        for id in &ids {
            self.release(*id);
        }
        ids
    }
}
