//! Client connection management and request queuing for the authority
//!
//! This module handles the server-side bookkeeping of remote clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Request buffering, ordered by sequence within each client
//! - Duplicate and stale request filtering
//! - Client capacity management and address tracking
//!
//! The host is client `HOST_CLIENT_ID` and lives in-process, so it never
//! appears here; remote ids start right after it.

use log::{debug, info};
use shared::{ClientId, Request, HOST_CLIENT_ID};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A request waiting for the next tick
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub sequence: u32,
    pub request: Request,
    /// Position in the server-wide arrival order
    arrival: u64,
}

/// A connected remote client
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest request sequence already handed to the session
    pub last_processed_request: u32,
    /// Buffered requests, sorted by sequence
    pub pending_requests: Vec<PendingRequest>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_request: 0,
            pending_requests: Vec::new(),
        }
    }

    /// Buffers a request unless its sequence was already seen
    ///
    /// Out-of-order packets are slotted back into sequence order.
    pub fn add_request(&mut self, sequence: u32, request: Request, arrival: u64) -> bool {
        self.last_seen = Instant::now();

        if sequence <= self.last_processed_request
            || self.pending_requests.iter().any(|p| p.sequence == sequence)
        {
            debug!(
                "Client {}: dropping stale or duplicate request #{}",
                self.id, sequence
            );
            return false;
        }

        self.pending_requests.push(PendingRequest {
            sequence,
            request,
            arrival,
        });
        self.pending_requests.sort_by_key(|p| p.sequence);
        true
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks every connected remote client
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    next_client_id: ClientId,
    max_clients: usize,
    next_arrival: u64,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: HOST_CLIENT_ID + 1,
            max_clients,
            next_arrival: 0,
        }
    }

    /// Returns Some(client_id) if added, None if the server is at capacity
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Buffers a request for `client_id`; false for unknown clients and repeats
    pub fn add_request(&mut self, client_id: ClientId, sequence: u32, request: Request) -> bool {
        let arrival = self.next_arrival;
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                let accepted = client.add_request(sequence, request, arrival);
                if accepted {
                    self.next_arrival += 1;
                }
                accepted
            }
            None => false,
        }
    }

    /// Records liveness for heartbeats and other non-request packets
    pub fn touch(&mut self, client_id: ClientId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    /// Drains every buffered request in arrival order
    ///
    /// Each client's requests come out in sequence order: a client's arrival
    /// slots are reassigned to its requests sorted by sequence, so a reordered
    /// pair swaps places without jumping ahead of other clients.
    pub fn take_pending_requests(&mut self) -> Vec<(ClientId, Request)> {
        let mut all_requests: Vec<(u64, ClientId, Request)> = Vec::new();

        for (client_id, client) in &mut self.clients {
            let mut arrivals: Vec<u64> = client.pending_requests.iter().map(|p| p.arrival).collect();
            arrivals.sort_unstable();

            for (pending, arrival) in client.pending_requests.drain(..).zip(arrivals) {
                client.last_processed_request = client.last_processed_request.max(pending.sequence);
                all_requests.push((arrival, *client_id, pending.request));
            }
        }

        all_requests.sort_by_key(|(arrival, _, _)| *arrival);
        all_requests
            .into_iter()
            .map(|(_, client_id, request)| (client_id, request))
            .collect()
    }

    /// Removes and returns clients silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ClientId> {
        let timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ItemType;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.last_processed_request, 0);
        assert!(client.pending_requests.is_empty());
    }

    #[test]
    fn test_client_reorders_by_sequence() {
        let mut client = Client::new(1, test_addr());

        assert!(client.add_request(2, Request::StartGame, 0));
        assert!(client.add_request(1, Request::ToggleReady, 1));

        assert_eq!(client.pending_requests.len(), 2);
        assert_eq!(client.pending_requests[0].sequence, 1);
        assert_eq!(client.pending_requests[1].sequence, 2);
    }

    #[test]
    fn test_client_drops_duplicate_sequence() {
        let mut client = Client::new(1, test_addr());
        assert!(client.add_request(1, Request::ToggleReady, 0));
        assert!(!client.add_request(1, Request::ToggleReady, 1));
        assert_eq!(client.pending_requests.len(), 1);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_remote_ids_start_after_host() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert_eq!(client_id, HOST_CLIENT_ID + 1);
        assert_eq!(manager.len(), 1);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_add_request_to_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.add_request(999, 1, Request::ToggleReady));
    }

    #[test]
    fn test_take_pending_in_arrival_order() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();

        manager.add_request(a, 1, Request::ToggleReady);
        manager.add_request(b, 1, Request::Damage { amount: 1 });
        manager.add_request(a, 2, Request::SceneReady);

        let requests = manager.take_pending_requests();
        assert_eq!(
            requests,
            vec![
                (a, Request::ToggleReady),
                (b, Request::Damage { amount: 1 }),
                (a, Request::SceneReady),
            ]
        );
        assert!(manager.take_pending_requests().is_empty());
    }

    #[test]
    fn test_reordered_requests_keep_client_sequence() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();

        manager.add_request(a, 2, Request::UseItem { item: ItemType::Mushroom });
        manager.add_request(b, 1, Request::ToggleReady);
        manager.add_request(a, 1, Request::Equip { item: ItemType::Mushroom });

        let requests = manager.take_pending_requests();
        assert_eq!(
            requests,
            vec![
                (a, Request::Equip { item: ItemType::Mushroom }),
                (b, Request::ToggleReady),
                (a, Request::UseItem { item: ItemType::Mushroom }),
            ]
        );
    }

    #[test]
    fn test_processed_sequences_are_stale() {
        let mut manager = ClientManager::new(1);
        let a = manager.add_client(test_addr()).unwrap();

        manager.add_request(a, 5, Request::ToggleReady);
        manager.take_pending_requests();

        assert!(!manager.add_request(a, 5, Request::ToggleReady));
        assert!(!manager.add_request(a, 3, Request::ToggleReady));
        assert!(manager.add_request(a, 6, Request::ToggleReady));
    }

    #[test]
    fn test_check_timeouts_uses_given_timeout() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).unwrap();
        manager.clients.get_mut(&id).unwrap().last_seen = Instant::now() - Duration::from_secs(10);

        assert!(manager.check_timeouts(Duration::from_secs(60)).is_empty());
        assert_eq!(manager.check_timeouts(Duration::from_secs(5)), vec![id]);
        assert!(manager.is_empty());
    }
}
