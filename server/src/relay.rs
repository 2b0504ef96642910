//! Relay allocation and session bootstrap
//!
//! The relay service is an external collaborator that hands out
//! (allocation, join code) pairs for hosts and resolves join codes for
//! clients. Each call is a single attempt; failures come back as
//! `RelayError`. Bootstrapping falls back to a direct connection exactly once
//! when the relay fails and records why, so the caller can tell the user.

use crate::join_code;
use log::{error, info, warn};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A reserved slot on the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub allocation_id: u64,
    pub endpoint: SocketAddr,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("max players must be at least 2 (host + 1 client), got {0}")]
    InvalidMaxPlayers(usize),
    #[error("join code is empty")]
    EmptyJoinCode,
    #[error("no allocation for join code {0}")]
    UnknownJoinCode(String),
    #[error("relay service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid join code format: {0:?}")]
    InvalidJoinCode(String),
}

pub trait RelayService {
    /// Reserves room for `max_connections` remote clients
    fn create_allocation(
        &self,
        max_connections: usize,
    ) -> impl Future<Output = Result<(Allocation, String), RelayError>> + Send;

    fn join_allocation(
        &self,
        join_code: &str,
    ) -> impl Future<Output = Result<Allocation, RelayError>> + Send;
}

/// Creates a host allocation; the host itself does not count against it
pub async fn create_host_allocation<R: RelayService>(
    relay: &R,
    max_players: usize,
) -> Result<(Allocation, String), RelayError> {
    if max_players < 2 {
        return Err(RelayError::InvalidMaxPlayers(max_players));
    }
    relay.create_allocation(max_players - 1).await
}

pub async fn join_allocation<R: RelayService>(relay: &R, join_code: &str) -> Result<Allocation, RelayError> {
    if join_code.trim().is_empty() {
        return Err(RelayError::EmptyJoinCode);
    }
    relay.join_allocation(join_code).await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    Relay(Allocation),
    Direct {
        addr: SocketAddr,
        /// Set when direct mode was entered because the relay failed
        fallback_reason: Option<RelayError>,
    },
}

impl ConnectionMode {
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            ConnectionMode::Direct {
                fallback_reason: Some(_),
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBootstrap {
    pub mode: ConnectionMode,
    pub join_code: String,
}

/// Starts hosting through the relay, or directly on `direct_addr`
///
/// With no relay configured the host goes straight to direct mode. When the
/// relay fails the host falls back to direct mode once with a locally
/// generated join code.
pub async fn bootstrap_host<R, G>(
    relay: Option<&R>,
    max_players: usize,
    direct_addr: SocketAddr,
    rng: &mut G,
) -> HostBootstrap
where
    R: RelayService,
    G: Rng + ?Sized,
{
    let fallback_reason = match relay {
        Some(relay) => match create_host_allocation(relay, max_players).await {
            Ok((allocation, join_code)) => {
                info!("Hosting via relay with join code: {}", join_code);
                return HostBootstrap {
                    mode: ConnectionMode::Relay(allocation),
                    join_code,
                };
            }
            Err(e) => {
                warn!("Relay failed ({}). Falling back to direct ({})", e, direct_addr);
                Some(e)
            }
        },
        None => None,
    };

    let join_code = join_code::generate(rng);
    info!("Direct mode ({}) - join code: {}", direct_addr, join_code);
    HostBootstrap {
        mode: ConnectionMode::Direct {
            addr: direct_addr,
            fallback_reason,
        },
        join_code,
    }
}

/// Resolves where a client should connect for `join_code`
///
/// A malformed code is the user's mistake and is reported without trying
/// anything. A relay failure falls back once to `direct_addr`.
pub async fn bootstrap_client<R: RelayService>(
    relay: Option<&R>,
    join_code: &str,
    direct_addr: SocketAddr,
) -> Result<ConnectionMode, BootstrapError> {
    if !join_code::is_valid_format(join_code) {
        error!("Rejected join code {:?} before connecting", join_code);
        return Err(BootstrapError::InvalidJoinCode(join_code.to_string()));
    }

    let Some(relay) = relay else {
        return Ok(ConnectionMode::Direct {
            addr: direct_addr,
            fallback_reason: None,
        });
    };

    match join_allocation(relay, join_code).await {
        Ok(allocation) => Ok(ConnectionMode::Relay(allocation)),
        Err(e) => {
            warn!("Relay join failed ({}). Falling back to direct ({})", e, direct_addr);
            Ok(ConnectionMode::Direct {
                addr: direct_addr,
                fallback_reason: Some(e),
            })
        }
    }
}

/// In-process relay registry
///
/// Hands out allocations that all point at one endpoint and resolves codes
/// case-insensitively. Used when the game runs without an external relay.
#[derive(Debug)]
pub struct LocalRelay {
    endpoint: SocketAddr,
    next_allocation: AtomicU64,
    allocations: Mutex<HashMap<String, Allocation>>,
}

impl LocalRelay {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            next_allocation: AtomicU64::new(1),
            allocations: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Allocation>>, RelayError> {
        self.allocations
            .lock()
            .map_err(|_| RelayError::Unavailable("allocation table poisoned".to_string()))
    }
}

impl RelayService for LocalRelay {
    async fn create_allocation(&self, max_connections: usize) -> Result<(Allocation, String), RelayError> {
        let allocation = Allocation {
            allocation_id: self.next_allocation.fetch_add(1, Ordering::Relaxed),
            endpoint: self.endpoint,
            max_connections,
        };

        let mut allocations = self.lock()?;
        let mut rng = rand::thread_rng();
        let mut code = join_code::generate(&mut rng);
        while allocations.contains_key(&code) {
            code = join_code::generate(&mut rng);
        }
        allocations.insert(code.clone(), allocation.clone());
        Ok((allocation, code))
    }

    async fn join_allocation(&self, join_code: &str) -> Result<Allocation, RelayError> {
        let allocations = self.lock()?;
        allocations
            .get(&join_code.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| RelayError::UnknownJoinCode(join_code.to_string()))
    }
}
