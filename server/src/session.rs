//! The authoritative session
//!
//! `Session` owns every piece of server-side state for one match: lobby,
//! join code, karts, item boxes, projectiles, timers and the event bus.
//! Remote requests and physics contacts are queued as they arrive and applied
//! at the next tick boundary, so all mutation happens on one thread in a
//! well-defined order. Every replicated write is forwarded as a `Packet` on
//! the outbox for the transport to broadcast.

use crate::config::ServerConfig;
use crate::events::{EventBus, EventSender, SessionEvent};
use crate::game::GameState;
use crate::health::HealthSystem;
use crate::item_box::{ClaimOutcome, ItemBox};
use crate::items::{effect_of, ItemEffect};
use crate::join_code::JoinCodeManager;
use crate::kart_items::KartItemSystem;
use crate::lobby::LobbyManager;
use crate::projectile::{ContactResolution, ContactTarget, ProjectilePool};
use crate::spawner::{SpawnPoint, Spawner};
use crate::timer::{Scheduler, TimerId};
use crate::validation::{authorize_host, Rejection};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    BoxId, ClientId, ItemType, KartSnapshot, Packet, ProjectileId, Request, SessionSnapshot,
    HOST_CLIENT_ID,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    InGame,
}

/// A collision reported by the physics collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    ItemBox { box_id: BoxId, kart: ClientId },
    Projectile { id: ProjectileId, target: ContactTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    RespawnBox(BoxId),
    ExpireProjectile(ProjectileId),
}

#[derive(Debug)]
struct Kart {
    health: HealthSystem,
    items: KartItemSystem,
    spawn: SpawnPoint,
}

fn notify(outbox: &mpsc::UnboundedSender<Packet>, packet: Packet) {
    if outbox.send(packet).is_err() {
        debug!("Outbox closed, dropping notification");
    }
}

pub struct Session {
    config: ServerConfig,
    phase: Phase,
    lobby: LobbyManager,
    join_code: JoinCodeManager,
    game: GameState,
    spawner: Spawner,
    karts: BTreeMap<ClientId, Kart>,
    boxes: Vec<ItemBox>,
    projectiles: ProjectilePool,
    projectile_timers: HashMap<ProjectileId, TimerId>,
    scheduler: Scheduler<TimerEvent>,
    event_sender: EventSender,
    events: EventBus,
    rng: StdRng,
    outbox: mpsc::UnboundedSender<Packet>,
    pending_requests: VecDeque<(ClientId, Request)>,
    pending_contacts: VecDeque<Contact>,
}

impl Session {
    /// Creates a session in the lobby phase with the host already listed
    ///
    /// `join_code` is the code handed out by the relay, if any.
    pub fn new(
        config: ServerConfig,
        join_code: Option<String>,
        outbox: mpsc::UnboundedSender<Packet>,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (event_sender, events) = EventBus::channel();

        let mut join_code = JoinCodeManager::spawn(join_code, &mut rng);
        let sink = outbox.clone();
        join_code.subscribe(move |_, code| notify(&sink, Packet::JoinCodeChanged { code: code.clone() }));

        let mut lobby = LobbyManager::new(config.min_players);
        let sink = outbox.clone();
        lobby.subscribe(move |_, roster| {
            notify(
                &sink,
                Packet::RosterChanged {
                    roster: roster.to_vec(),
                },
            )
        });

        let mut game = GameState::new();
        let sink = outbox.clone();
        game.subscribe_winner(move |_, winner| notify(&sink, Packet::WinnerChanged { winner: *winner }));
        let sink = outbox.clone();
        game.subscribe_game_over(move |_, is_game_over| {
            notify(
                &sink,
                Packet::GameOverChanged {
                    is_game_over: *is_game_over,
                },
            )
        });

        let boxes = (0..config.item_box_count)
            .map(|box_id| {
                let mut item_box = ItemBox::new(box_id, config.item_respawn_delay, config.item_drops.clone());
                let sink = outbox.clone();
                item_box.subscribe(move |_, active| {
                    notify(
                        &sink,
                        Packet::PickupActiveChanged {
                            box_id,
                            active: *active,
                        },
                    )
                });
                item_box
            })
            .collect();

        let mut session = Self {
            phase: Phase::Lobby,
            lobby,
            join_code,
            game,
            spawner: Spawner::new(config.spawn_distance, config.kart_models),
            karts: BTreeMap::new(),
            boxes,
            projectiles: ProjectilePool::new(config.projectile_pool_size),
            projectile_timers: HashMap::new(),
            scheduler: Scheduler::new(),
            event_sender,
            events,
            rng,
            outbox,
            pending_requests: VecDeque::new(),
            pending_contacts: VecDeque::new(),
            config,
        };

        session.lobby.add_player(HOST_CLIENT_ID);
        info!("Session created with join code {}", session.join_code.code());
        session
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn join_code(&self) -> &str {
        self.join_code.code()
    }

    /// Case-insensitive check of a code presented by a connecting client
    pub fn validate_join_code(&self, candidate: &str) -> bool {
        self.join_code.validate(candidate)
    }

    pub fn lobby(&self) -> &LobbyManager {
        &self.lobby
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn has_kart(&self, client_id: ClientId) -> bool {
        self.karts.contains_key(&client_id)
    }

    pub fn lives(&self, client_id: ClientId) -> Option<u32> {
        self.karts.get(&client_id).map(|kart| kart.health.lives())
    }

    pub fn held_item(&self, client_id: ClientId) -> Option<ItemType> {
        self.karts.get(&client_id).map(|kart| kart.items.current())
    }

    pub fn box_active(&self, box_id: BoxId) -> Option<bool> {
        self.find_box(box_id).map(ItemBox::is_active)
    }

    pub fn projectiles_in_flight(&self) -> Vec<ProjectileId> {
        self.projectiles.in_flight_ids()
    }

    pub fn projectile_owner(&self, id: ProjectileId) -> Option<ClientId> {
        self.projectiles.get(id).map(|projectile| projectile.owner())
    }

    pub fn pending_requests(&self) -> usize {
        self.pending_requests.len()
    }

    /// Everything a late joiner needs to catch up
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            join_code: self.join_code.code().to_string(),
            roster: self.lobby.roster().to_vec(),
            in_game: self.phase == Phase::InGame,
            is_game_over: self.game.is_game_over(),
            winner: self.game.winner(),
            lives: self
                .karts
                .iter()
                .map(|(id, kart)| (*id, kart.health.lives()))
                .collect(),
            items: self
                .karts
                .iter()
                .map(|(id, kart)| (*id, kart.items.current()))
                .collect(),
            boxes: self
                .boxes
                .iter()
                .map(|item_box| (item_box.id(), item_box.is_active()))
                .collect(),
            karts: self
                .karts
                .iter()
                .map(|(id, kart)| KartSnapshot {
                    client_id: *id,
                    model: kart.spawn.model,
                    position: kart.spawn.position,
                })
                .collect(),
            projectiles: self
                .projectiles
                .in_flight_ids()
                .into_iter()
                .filter_map(|id| self.projectile_owner(id).map(|owner| (id, owner)))
                .collect(),
        }
    }

    pub fn client_connected(&mut self, client_id: ClientId) {
        self.lobby.add_player(client_id);
    }

    /// Removes the client from the roster and the match
    ///
    /// Its kart is despawned and counted as eliminated. Projectiles it already
    /// fired keep flying.
    pub fn client_disconnected(&mut self, client_id: ClientId) {
        self.lobby.remove_player(client_id);
        // Route a pending join first so the departure is not undone by it
        self.route_events();
        self.despawn_kart(client_id);
        self.game.on_client_disconnect(client_id);
    }

    pub fn queue_request(&mut self, caller: ClientId, request: Request) {
        self.pending_requests.push_back((caller, request));
    }

    pub fn queue_contact(&mut self, contact: Contact) {
        self.pending_contacts.push_back(contact);
    }

    /// Advances the session by one tick
    ///
    /// Moves the clock to the end of this tick and fires due timers, then
    /// applies queued requests and contacts in arrival order, routes lifecycle
    /// events to the game tracker and finally clears per-tick latches. Timers
    /// scheduled while applying requests count from the advanced clock.
    pub fn tick(&mut self, dt: Duration) {
        for event in self.scheduler.advance(dt) {
            self.fire_timer(event);
        }

        while let Some((caller, request)) = self.pending_requests.pop_front() {
            if let Err(rejection) = self.apply_request(caller, &request) {
                debug!("Dropped {:?} from client {}: {}", request, caller, rejection);
            }
        }

        while let Some(contact) = self.pending_contacts.pop_front() {
            if let Err(rejection) = self.apply_contact(contact) {
                debug!("Dropped {:?}: {}", contact, rejection);
            }
        }

        self.route_events();

        for kart in self.karts.values_mut() {
            kart.items.end_tick();
        }
    }

    fn apply_request(&mut self, caller: ClientId, request: &Request) -> Result<(), Rejection> {
        match request {
            Request::ToggleReady => {
                self.require_phase(Phase::Lobby)?;
                self.lobby.toggle_ready(caller).map(|_| ())
            }
            Request::StartGame => {
                self.require_phase(Phase::Lobby)?;
                self.lobby.start_game(caller)?;
                self.phase = Phase::InGame;
                info!("Game started with {} players", self.lobby.len());
                notify(&self.outbox, Packet::GameStarted);
                Ok(())
            }
            Request::SceneReady => {
                self.require_phase(Phase::InGame)?;
                if !self.lobby.contains(caller) {
                    return Err(Rejection::UnknownEntity);
                }
                self.spawn_kart(HOST_CLIENT_ID);
                self.spawn_kart(caller);
                Ok(())
            }
            Request::Damage { amount } => {
                self.require_phase(Phase::InGame)?;
                let kart = self.karts.get_mut(&caller).ok_or(Rejection::UnknownEntity)?;
                kart.health.request_damage(caller, *amount).map(|_| ())
            }
            Request::Equip { item } => {
                self.require_phase(Phase::InGame)?;
                let kart = self.karts.get_mut(&caller).ok_or(Rejection::UnknownEntity)?;
                kart.items.request_equip(caller, *item)
            }
            Request::UseItem { item } => {
                self.require_phase(Phase::InGame)?;
                let kart = self.karts.get_mut(&caller).ok_or(Rejection::UnknownEntity)?;
                let used = kart.items.request_use(caller, *item)?;
                self.apply_item_effect(caller, used);
                Ok(())
            }
            Request::Restart => {
                authorize_host(caller)?;
                self.require_phase(Phase::InGame)?;
                self.restart();
                Ok(())
            }
        }
    }

    fn require_phase(&self, phase: Phase) -> Result<(), Rejection> {
        if self.phase != phase {
            return Err(Rejection::WrongPhase);
        }
        Ok(())
    }

    fn apply_item_effect(&mut self, user: ClientId, item: ItemType) {
        match effect_of(item, self.config.boost_multiplier, self.config.boost_duration) {
            Some(ItemEffect::FireProjectile) => {
                self.spawn_projectile(user);
            }
            Some(ItemEffect::SpeedBoost {
                multiplier,
                duration,
            }) => {
                info!("Player {} boosting x{} for {:?}", user, multiplier, duration);
                notify(
                    &self.outbox,
                    Packet::BoostActivated {
                        client_id: user,
                        multiplier,
                        duration_ms: duration.as_millis() as u64,
                    },
                );
            }
            None => {}
        }
    }

    fn apply_contact(&mut self, contact: Contact) -> Result<(), Rejection> {
        self.require_phase(Phase::InGame)?;

        match contact {
            Contact::ItemBox { box_id, kart } => {
                let item_box = self
                    .boxes
                    .iter_mut()
                    .find(|item_box| item_box.id() == box_id)
                    .ok_or(Rejection::UnknownEntity)?;
                let kart = self.karts.get_mut(&kart).ok_or(Rejection::UnknownEntity)?;

                match item_box.try_claim(&mut kart.items, &mut self.rng) {
                    ClaimOutcome::Granted(_) => {
                        self.scheduler
                            .schedule(item_box.respawn_delay(), TimerEvent::RespawnBox(box_id));
                        Ok(())
                    }
                    ClaimOutcome::RepeatClaimant | ClaimOutcome::SlotFull => {
                        Err(Rejection::Duplicate)
                    }
                    ClaimOutcome::Inactive => Err(Rejection::Stale),
                    ClaimOutcome::NothingToDrop => Err(Rejection::EmptyPayload),
                }
            }
            Contact::Projectile { id, target } => {
                let projectile = self.projectiles.get_mut(id).ok_or(Rejection::UnknownEntity)?;

                match projectile.resolve_contact(target) {
                    ContactResolution::Ignored => Ok(()),
                    ContactResolution::Absorbed => {
                        self.despawn_projectile(id);
                        Ok(())
                    }
                    ContactResolution::Hit { target, damage } => {
                        self.despawn_projectile(id);
                        let kart = self.karts.get_mut(&target).ok_or(Rejection::UnknownEntity)?;
                        let damage = i32::try_from(damage).unwrap_or(i32::MAX);
                        kart.health.take_damage(damage).map(|_| ())
                    }
                }
            }
        }
    }

    fn fire_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::RespawnBox(box_id) => {
                if let Some(item_box) = self.boxes.iter_mut().find(|item_box| item_box.id() == box_id) {
                    item_box.respawn();
                }
            }
            TimerEvent::ExpireProjectile(id) => {
                self.projectile_timers.remove(&id);
                if self.projectiles.release(id) {
                    debug!("Projectile {} expired", id);
                    notify(&self.outbox, Packet::ProjectileDespawned { projectile_id: id });
                }
            }
        }
    }

    fn route_events(&mut self) {
        for event in self.events.drain() {
            match event {
                SessionEvent::PlayerJoined(client_id) => self.game.register_player(client_id),
                SessionEvent::PlayerEliminated(client_id) => {
                    self.game.on_player_eliminated(client_id);
                }
            }
        }
    }

    fn find_box(&self, box_id: BoxId) -> Option<&ItemBox> {
        self.boxes.iter().find(|item_box| item_box.id() == box_id)
    }

    fn spawn_kart(&mut self, client_id: ClientId) {
        let Some(point) = self.spawner.spawn(client_id, &mut self.rng) else {
            return;
        };

        let mut health = HealthSystem::spawn(
            client_id,
            self.config.max_lives,
            self.config.damage_cap,
            self.event_sender.clone(),
        );
        let sink = self.outbox.clone();
        health.subscribe(move |previous, current| {
            notify(
                &sink,
                Packet::LivesChanged {
                    client_id,
                    previous: *previous,
                    current: *current,
                },
            )
        });

        let mut items = KartItemSystem::new(client_id);
        let sink = self.outbox.clone();
        items.subscribe(move |previous, current| {
            notify(
                &sink,
                Packet::ItemChanged {
                    client_id,
                    previous: *previous,
                    current: *current,
                },
            )
        });

        let lives = health.lives();
        self.karts.insert(
            client_id,
            Kart {
                health,
                items,
                spawn: point,
            },
        );
        notify(
            &self.outbox,
            Packet::KartSpawned {
                client_id,
                model: point.model,
                position: point.position,
                lives,
            },
        );
    }

    /// Dropping the kart drops its observers with it
    fn despawn_kart(&mut self, client_id: ClientId) {
        self.spawner.despawn(client_id);
        if self.karts.remove(&client_id).is_some() {
            notify(&self.outbox, Packet::KartDespawned { client_id });
        }
    }

    fn spawn_projectile(&mut self, owner: ClientId) {
        let id = self.projectiles.acquire(owner, self.config.projectile_damage);
        let timer = self
            .scheduler
            .schedule(self.config.projectile_lifetime, TimerEvent::ExpireProjectile(id));
        self.projectile_timers.insert(id, timer);

        debug!("Player {} fired projectile {}", owner, id);
        notify(
            &self.outbox,
            Packet::ProjectileSpawned {
                projectile_id: id,
                owner,
            },
        );
    }

    fn despawn_projectile(&mut self, id: ProjectileId) {
        if let Some(timer) = self.projectile_timers.remove(&id) {
            self.scheduler.cancel(timer);
        }
        if self.projectiles.release(id) {
            notify(&self.outbox, Packet::ProjectileDespawned { projectile_id: id });
        }
    }

    /// Back to a fresh round; karts come back on the next scene-ready
    fn restart(&mut self) {
        info!("Restarting game");

        self.game.restart();
        // Stale joins from the previous round must not repopulate the tracker
        self.events.drain();

        let karts: Vec<ClientId> = self.karts.keys().copied().collect();
        for client_id in karts {
            self.despawn_kart(client_id);
        }
        self.spawner.reset();

        for id in self.projectiles.in_flight_ids() {
            self.despawn_projectile(id);
        }

        let cancelled = self.scheduler.cancel_where(|_| true);
        debug!("Cancelled {} pending timers", cancelled);
        for item_box in &mut self.boxes {
            item_box.respawn();
        }
    }
}
