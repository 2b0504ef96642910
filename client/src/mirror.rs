//! Local copy of the authority's replicated state
//!
//! The mirror never decides anything. It applies the notifications the
//! authority sends, in the order they arrive, and tells local observers
//! which packet changed it.

use log::{debug, info};
use shared::{BoxId, ClientId, ItemType, Packet, ProjectileId, RosterEntry, SessionSnapshot};
use std::collections::BTreeMap;

type Observer = Box<dyn FnMut(&Packet, &ClientMirror) + Send>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KartView {
    pub model: usize,
    pub position: (f32, f32, f32),
}

#[derive(Default)]
pub struct ClientMirror {
    client_id: Option<ClientId>,
    join_code: String,
    roster: Vec<RosterEntry>,
    in_game: bool,
    is_game_over: bool,
    winner: Option<ClientId>,
    lives: BTreeMap<ClientId, u32>,
    items: BTreeMap<ClientId, ItemType>,
    boxes: BTreeMap<BoxId, bool>,
    karts: BTreeMap<ClientId, KartView>,
    projectiles: BTreeMap<ProjectileId, ClientId>,
    observers: Vec<Observer>,
}

impl ClientMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.client_id.is_some()
    }

    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn in_game(&self) -> bool {
        self.in_game
    }

    pub fn is_game_over(&self) -> bool {
        self.is_game_over
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn lives(&self, client_id: ClientId) -> Option<u32> {
        self.lives.get(&client_id).copied()
    }

    pub fn item(&self, client_id: ClientId) -> ItemType {
        self.items.get(&client_id).copied().unwrap_or_default()
    }

    pub fn box_active(&self, box_id: BoxId) -> Option<bool> {
        self.boxes.get(&box_id).copied()
    }

    pub fn kart(&self, client_id: ClientId) -> Option<&KartView> {
        self.karts.get(&client_id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = (&ProjectileId, &ClientId)> {
        self.projectiles.iter()
    }

    /// Our own roster entry, once connected
    pub fn own_entry(&self) -> Option<&RosterEntry> {
        let client_id = self.client_id?;
        self.roster.iter().find(|entry| entry.client_id == client_id)
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&Packet, &ClientMirror) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Applies one authority notification
    ///
    /// Returns false for packets that carry no replicated state.
    pub fn apply(&mut self, packet: &Packet) -> bool {
        let applied = match packet {
            Packet::Connected {
                client_id,
                snapshot,
            } => {
                info!("Connected as client {}", client_id);
                self.client_id = Some(*client_id);
                self.load_snapshot(snapshot);
                true
            }
            Packet::Disconnected { reason } => {
                info!("Disconnected: {}", reason);
                self.client_id = None;
                true
            }
            Packet::LivesChanged {
                client_id, current, ..
            } => {
                self.lives.insert(*client_id, *current);
                true
            }
            Packet::ItemChanged {
                client_id, current, ..
            } => {
                self.items.insert(*client_id, *current);
                true
            }
            Packet::PickupActiveChanged { box_id, active } => {
                self.boxes.insert(*box_id, *active);
                true
            }
            Packet::GameOverChanged { is_game_over } => {
                self.is_game_over = *is_game_over;
                true
            }
            Packet::WinnerChanged { winner } => {
                self.winner = *winner;
                true
            }
            Packet::JoinCodeChanged { code } => {
                self.join_code = code.clone();
                true
            }
            Packet::RosterChanged { roster } => {
                self.roster = roster.clone();
                true
            }
            Packet::GameStarted => {
                self.in_game = true;
                true
            }
            Packet::KartSpawned {
                client_id,
                model,
                position,
                lives,
            } => {
                self.karts.insert(
                    *client_id,
                    KartView {
                        model: *model,
                        position: *position,
                    },
                );
                self.lives.insert(*client_id, *lives);
                self.items.insert(*client_id, ItemType::None);
                true
            }
            Packet::KartDespawned { client_id } => {
                self.karts.remove(client_id);
                self.lives.remove(client_id);
                self.items.remove(client_id);
                true
            }
            Packet::ProjectileSpawned {
                projectile_id,
                owner,
            } => {
                self.projectiles.insert(*projectile_id, *owner);
                true
            }
            Packet::ProjectileDespawned { projectile_id } => {
                self.projectiles.remove(projectile_id);
                true
            }
            Packet::BoostActivated { .. } => true,
            Packet::Connect { .. } | Packet::Request { .. } | Packet::Heartbeat | Packet::Disconnect => {
                debug!("Ignoring client-bound packet {:?}", packet);
                false
            }
        };

        if applied {
            self.notify(packet);
        }
        applied
    }

    fn load_snapshot(&mut self, snapshot: &SessionSnapshot) {
        self.join_code = snapshot.join_code.clone();
        self.roster = snapshot.roster.clone();
        self.in_game = snapshot.in_game;
        self.is_game_over = snapshot.is_game_over;
        self.winner = snapshot.winner;
        self.lives = snapshot.lives.iter().copied().collect();
        self.items = snapshot.items.iter().copied().collect();
        self.boxes = snapshot.boxes.iter().copied().collect();
        self.karts = snapshot
            .karts
            .iter()
            .map(|kart| {
                (
                    kart.client_id,
                    KartView {
                        model: kart.model,
                        position: kart.position,
                    },
                )
            })
            .collect();
        self.projectiles = snapshot.projectiles.iter().copied().collect();
    }

    fn notify(&mut self, packet: &Packet) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer(packet, self);
        }
        self.observers = observers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn connected_mirror() -> ClientMirror {
        let mut mirror = ClientMirror::new();
        mirror.apply(&Packet::Connected {
            client_id: 2,
            snapshot: SessionSnapshot {
                join_code: "AB12CD".to_string(),
                roster: vec![RosterEntry::new(0), RosterEntry::new(2)],
                lives: vec![(0, 3)],
                boxes: vec![(0, true), (1, false)],
                ..SessionSnapshot::default()
            },
        });
        mirror
    }

    #[test]
    fn test_snapshot_loads_state() {
        let mirror = connected_mirror();
        assert_eq!(mirror.client_id(), Some(2));
        assert_eq!(mirror.join_code(), "AB12CD");
        assert_eq!(mirror.own_entry().map(|e| e.client_id), Some(2));
        assert_eq!(mirror.lives(0), Some(3));
        assert_eq!(mirror.box_active(1), Some(false));
        assert!(!mirror.in_game());
    }

    #[test]
    fn test_notifications_update_local_copies() {
        let mut mirror = connected_mirror();
        mirror.apply(&Packet::GameStarted);
        mirror.apply(&Packet::KartSpawned {
            client_id: 2,
            model: 1,
            position: (0.0, 1.0, 10.0),
            lives: 3,
        });
        mirror.apply(&Packet::LivesChanged {
            client_id: 2,
            previous: 3,
            current: 2,
        });
        mirror.apply(&Packet::ItemChanged {
            client_id: 2,
            previous: ItemType::None,
            current: ItemType::GreenShell,
        });

        assert!(mirror.in_game());
        assert_eq!(mirror.kart(2).map(|k| k.model), Some(1));
        assert_eq!(mirror.lives(2), Some(2));
        assert_eq!(mirror.item(2), ItemType::GreenShell);
    }

    #[test]
    fn test_despawn_forgets_kart() {
        let mut mirror = connected_mirror();
        mirror.apply(&Packet::KartSpawned {
            client_id: 0,
            model: 0,
            position: (0.0, 1.0, 10.0),
            lives: 3,
        });
        mirror.apply(&Packet::KartDespawned { client_id: 0 });

        assert!(mirror.kart(0).is_none());
        assert_eq!(mirror.lives(0), None);
    }

    #[test]
    fn test_game_over_and_winner() {
        let mut mirror = connected_mirror();
        mirror.apply(&Packet::WinnerChanged { winner: Some(0) });
        mirror.apply(&Packet::GameOverChanged { is_game_over: true });

        assert!(mirror.is_game_over());
        assert_eq!(mirror.winner(), Some(0));
    }

    #[test]
    fn test_observers_see_updated_state() {
        let mut mirror = connected_mirror();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        mirror.subscribe(move |packet, mirror| {
            if let Packet::PickupActiveChanged { box_id, .. } = packet {
                sink.lock().unwrap().push(mirror.box_active(*box_id));
            }
        });

        mirror.apply(&Packet::PickupActiveChanged {
            box_id: 1,
            active: true,
        });
        assert!(!mirror.apply(&Packet::Heartbeat));

        assert_eq!(*seen.lock().unwrap(), vec![Some(true)]);
    }

    #[test]
    fn test_projectiles_tracked() {
        let mut mirror = connected_mirror();
        mirror.apply(&Packet::ProjectileSpawned {
            projectile_id: 4,
            owner: 2,
        });
        assert_eq!(mirror.projectiles().count(), 1);

        mirror.apply(&Packet::ProjectileDespawned { projectile_id: 4 });
        assert_eq!(mirror.projectiles().count(), 0);
    }
}
