use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric identity of a connected participant.
pub type ClientId = u64;

/// Identity of an item box placed on the track.
pub type BoxId = u32;

/// Identity of a projectile currently in flight.
pub type ProjectileId = u32;

pub const PROTOCOL_VERSION: u32 = 1;
pub const HOST_CLIENT_ID: ClientId = 0;
pub const JOIN_CODE_LENGTH: usize = 6;
pub const JOIN_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DEFAULT_MAX_LIVES: u32 = 3;
pub const MAX_DAMAGE_PER_REQUEST: i32 = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemType {
    #[default]
    None,
    GreenShell,
    Mushroom,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemType::None => "none",
            ItemType::GreenShell => "green shell",
            ItemType::Mushroom => "mushroom",
        };
        f.write_str(name)
    }
}

/// One row of the lobby roster.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub client_id: ClientId,
    pub display_name: String,
    pub is_ready: bool,
}

impl RosterEntry {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            display_name: format!("Player {}", client_id),
            is_ready: false,
        }
    }
}

/// Intent a client asks the authority to evaluate.
///
/// The caller identity is never part of the payload; the transport supplies it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Request {
    Damage { amount: i32 },
    Equip { item: ItemType },
    UseItem { item: ItemType },
    ToggleReady,
    StartGame,
    Restart,
    SceneReady,
}

/// Full replicated state sent to a client right after it connects.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub join_code: String,
    pub roster: Vec<RosterEntry>,
    pub in_game: bool,
    pub is_game_over: bool,
    pub winner: Option<ClientId>,
    pub lives: Vec<(ClientId, u32)>,
    pub items: Vec<(ClientId, ItemType)>,
    pub boxes: Vec<(BoxId, bool)>,
    pub karts: Vec<KartSnapshot>,
    pub projectiles: Vec<(ProjectileId, ClientId)>,
}

/// Placement of a kart already on the track.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct KartSnapshot {
    pub client_id: ClientId,
    pub model: usize,
    pub position: (f32, f32, f32),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> authority
    Connect {
        client_version: u32,
        join_code: String,
    },
    Request {
        sequence: u32,
        request: Request,
    },
    Heartbeat,
    Disconnect,

    // Authority -> client
    Connected {
        client_id: ClientId,
        snapshot: SessionSnapshot,
    },
    Disconnected {
        reason: String,
    },
    LivesChanged {
        client_id: ClientId,
        previous: u32,
        current: u32,
    },
    ItemChanged {
        client_id: ClientId,
        previous: ItemType,
        current: ItemType,
    },
    PickupActiveChanged {
        box_id: BoxId,
        active: bool,
    },
    GameOverChanged {
        is_game_over: bool,
    },
    WinnerChanged {
        winner: Option<ClientId>,
    },
    JoinCodeChanged {
        code: String,
    },
    RosterChanged {
        roster: Vec<RosterEntry>,
    },
    GameStarted,
    KartSpawned {
        client_id: ClientId,
        model: usize,
        position: (f32, f32, f32),
        lives: u32,
    },
    KartDespawned {
        client_id: ClientId,
    },
    ProjectileSpawned {
        projectile_id: ProjectileId,
        owner: ClientId,
    },
    ProjectileDespawned {
        projectile_id: ProjectileId,
    },
    BoostActivated {
        client_id: ClientId,
        multiplier: f32,
        duration_ms: u64,
    },
}
