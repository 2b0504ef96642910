use crate::items::ItemDrop;
use shared::{ItemType, DEFAULT_MAX_LIVES, MAX_DAMAGE_PER_REQUEST};
use std::time::Duration;

/// Authority configuration - immutable once the session is created
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate_hz: u32,
    pub max_clients: usize,
    pub client_timeout: Duration,

    pub max_lives: u32,
    pub damage_cap: i32,
    pub min_players: usize,

    pub item_box_count: u32,
    pub item_respawn_delay: Duration,
    pub item_drops: Vec<ItemDrop>,

    pub projectile_damage: u32,
    pub projectile_lifetime: Duration,
    pub projectile_pool_size: usize,

    pub boost_multiplier: f32,
    pub boost_duration: Duration,

    pub spawn_distance: f32,
    pub kart_models: usize,

    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            max_clients: 8,
            client_timeout: Duration::from_secs(5),
            max_lives: DEFAULT_MAX_LIVES,
            damage_cap: MAX_DAMAGE_PER_REQUEST,
            min_players: 2,
            item_box_count: 4,
            item_respawn_delay: Duration::from_secs(3),
            item_drops: vec![
                ItemDrop::new(ItemType::Mushroom, 50.0),
                ItemDrop::new(ItemType::GreenShell, 50.0),
            ],
            projectile_damage: 1,
            projectile_lifetime: Duration::from_secs(5),
            projectile_pool_size: 8,
            boost_multiplier: 2.0,
            boost_duration: Duration::from_secs(2),
            spawn_distance: 10.0,
            kart_models: 4,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate_hz.max(1) as u64)
    }
}
