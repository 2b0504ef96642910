//! Integration tests for the kart battle authority
//!
//! These tests drive the session, relay, mirror and UDP transport together
//! the way a running host and its clients would.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use client::mirror::ClientMirror;
use server::config::ServerConfig;
use server::projectile::ContactTarget;
use server::session::{Contact, Phase, Session};
use shared::{ItemType, Packet, Request, HOST_CLIENT_ID, PROTOCOL_VERSION};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

const TICK: Duration = Duration::from_millis(33);

fn test_config() -> ServerConfig {
    ServerConfig {
        seed: Some(42),
        item_box_count: 2,
        ..ServerConfig::default()
    }
}

fn new_session() -> (Session, mpsc::UnboundedReceiver<Packet>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Session::new(test_config(), Some("RACE42".to_string()), tx), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Packet>) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Ok(packet) = rx.try_recv() {
        packets.push(packet);
    }
    packets
}

/// Host and client 1 ready, started, and both karts on the track
fn start_match(session: &mut Session) {
    session.client_connected(1);
    session.queue_request(HOST_CLIENT_ID, Request::ToggleReady);
    session.queue_request(1, Request::ToggleReady);
    session.queue_request(HOST_CLIENT_ID, Request::StartGame);
    session.queue_request(1, Request::SceneReady);
    session.tick(TICK);
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that client intents survive the wire unchanged
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
                join_code: "RACE42".to_string(),
            },
            Packet::Request {
                sequence: 42,
                request: Request::UseItem {
                    item: ItemType::GreenShell,
                },
            },
            Packet::Disconnected {
                reason: "Test".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(packet, deserialized);
        }
    }

    /// Tests real UDP socket communication
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let test_packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            join_code: "RACE42".to_string(),
        };
        let serialized = serialize(&test_packet).unwrap();

        client_socket.send_to(&serialized, server_addr).unwrap();

        let mut buf = [0; 1024];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        match received_packet {
            Packet::Connect { join_code, .. } => assert_eq!(join_code, "RACE42"),
            _ => panic!("Wrong packet type received"),
        }
    }
}

/// SESSION FLOW TESTS
mod session_tests {
    use super::*;

    /// Tests lobby, start and scene-ready leading to two spawned karts
    #[test]
    fn lobby_to_race() {
        let (mut session, mut rx) = new_session();
        start_match(&mut session);

        assert_eq!(session.phase(), Phase::InGame);
        assert!(session.has_kart(HOST_CLIENT_ID));
        assert!(session.has_kart(1));
        assert_eq!(session.game().active_players(), &[HOST_CLIENT_ID, 1]);

        let packets = drain(&mut rx);
        assert!(packets.contains(&Packet::GameStarted));
        let spawned = packets
            .iter()
            .filter(|packet| matches!(packet, Packet::KartSpawned { lives: 3, .. }))
            .count();
        assert_eq!(spawned, 2);
    }

    /// Tests that a client cannot start the game for the host
    #[test]
    fn only_host_starts() {
        let (mut session, _rx) = new_session();
        session.client_connected(1);
        session.queue_request(HOST_CLIENT_ID, Request::ToggleReady);
        session.queue_request(1, Request::ToggleReady);
        session.queue_request(1, Request::StartGame);
        session.tick(TICK);

        assert_eq!(session.phase(), Phase::Lobby);
    }

    /// Tests crash damage through elimination to a declared winner
    #[test]
    fn elimination_declares_winner() {
        let (mut session, mut rx) = new_session();
        start_match(&mut session);
        drain(&mut rx);

        session.queue_request(1, Request::Damage { amount: 1 });
        session.tick(TICK);
        assert_eq!(session.lives(1), Some(2));
        assert!(!session.game().is_game_over());

        session.queue_request(1, Request::Damage { amount: 5 });
        session.tick(TICK);
        assert_eq!(session.lives(1), Some(0));
        assert!(session.game().is_game_over());
        assert_eq!(session.game().winner(), Some(HOST_CLIENT_ID));

        let packets = drain(&mut rx);
        let winner_at = packets
            .iter()
            .position(|packet| *packet == Packet::WinnerChanged { winner: Some(HOST_CLIENT_ID) })
            .unwrap();
        let over_at = packets
            .iter()
            .position(|packet| *packet == Packet::GameOverChanged { is_game_over: true })
            .unwrap();
        assert!(winner_at < over_at);
    }

    /// Tests that an over-cap damage request is dropped without effect
    #[test]
    fn oversized_damage_is_ignored() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);

        session.queue_request(1, Request::Damage { amount: 1_000 });
        session.queue_request(1, Request::Damage { amount: -1 });
        session.tick(TICK);

        assert_eq!(session.lives(1), Some(3));
    }

    /// Tests that two karts touching the same box in one tick yield one item
    #[test]
    fn item_box_single_winner() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);

        session.queue_contact(Contact::ItemBox {
            box_id: 0,
            kart: HOST_CLIENT_ID,
        });
        session.queue_contact(Contact::ItemBox { box_id: 0, kart: 1 });
        session.tick(TICK);

        assert_ne!(session.held_item(HOST_CLIENT_ID), Some(ItemType::None));
        assert_eq!(session.held_item(1), Some(ItemType::None));
        assert_eq!(session.box_active(0), Some(false));

        // Still claimed just before the deadline, so kart 1 gets nothing
        let delay = test_config().item_respawn_delay;
        session.tick(delay - Duration::from_millis(1));
        session.queue_contact(Contact::ItemBox { box_id: 0, kart: 1 });
        session.tick(Duration::ZERO);
        assert_eq!(session.held_item(1), Some(ItemType::None));
        assert_eq!(session.box_active(0), Some(false));

        // Respawns once the delay has elapsed
        session.tick(Duration::from_millis(1));
        assert_eq!(session.box_active(0), Some(true));
    }

    /// Tests that a stalled tick longer than the respawn delay keeps the box claimed
    #[test]
    fn item_box_survives_long_tick() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);
        let delay = test_config().item_respawn_delay;

        session.queue_contact(Contact::ItemBox { box_id: 1, kart: 1 });
        session.tick(delay * 2);

        assert_ne!(session.held_item(1), Some(ItemType::None));
        assert_eq!(session.box_active(1), Some(false));
    }

    /// Tests that using a mushroom announces the configured boost
    #[test]
    fn mushroom_boost() {
        let (mut session, mut rx) = new_session();
        start_match(&mut session);
        session.queue_request(1, Request::Equip { item: ItemType::Mushroom });
        session.tick(TICK);
        session.queue_request(1, Request::UseItem { item: ItemType::Mushroom });
        session.tick(TICK);

        let boost = drain(&mut rx).into_iter().find_map(|packet| match packet {
            Packet::BoostActivated {
                client_id,
                multiplier,
                duration_ms,
            } => Some((client_id, multiplier, duration_ms)),
            _ => None,
        });
        let (client_id, multiplier, duration_ms) = boost.expect("No boost announced");

        assert_eq!(client_id, 1);
        assert_approx_eq!(multiplier, test_config().boost_multiplier);
        assert_eq!(duration_ms, test_config().boost_duration.as_millis() as u64);
        assert_eq!(session.held_item(1), Some(ItemType::None));
    }

    /// Tests that a shell damages at most once even with repeated contacts
    #[test]
    fn projectile_hits_once() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);

        session.queue_request(
            HOST_CLIENT_ID,
            Request::Equip {
                item: ItemType::GreenShell,
            },
        );
        session.tick(TICK);
        session.queue_request(
            HOST_CLIENT_ID,
            Request::UseItem {
                item: ItemType::GreenShell,
            },
        );
        session.tick(TICK);

        let in_flight = session.projectiles_in_flight();
        assert_eq!(in_flight.len(), 1);
        let id = in_flight[0];
        assert_eq!(session.projectile_owner(id), Some(HOST_CLIENT_ID));

        // Touching its owner does nothing
        session.queue_contact(Contact::Projectile {
            id,
            target: ContactTarget::Kart(HOST_CLIENT_ID),
        });
        session.queue_contact(Contact::Projectile {
            id,
            target: ContactTarget::Kart(1),
        });
        session.queue_contact(Contact::Projectile {
            id,
            target: ContactTarget::Kart(1),
        });
        session.tick(TICK);

        assert_eq!(session.lives(HOST_CLIENT_ID), Some(3));
        assert_eq!(session.lives(1), Some(2));
        assert!(session.projectiles_in_flight().is_empty());
    }

    /// Tests that restart resets the round and karts return on scene-ready
    #[test]
    fn host_restart_resets_round() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);
        session.queue_request(1, Request::Damage { amount: 3 });
        session.tick(TICK);
        assert!(session.game().is_game_over());

        session.queue_request(1, Request::Restart);
        session.tick(TICK);
        assert!(session.game().is_game_over());

        session.queue_request(HOST_CLIENT_ID, Request::Restart);
        session.tick(TICK);
        assert!(!session.game().is_game_over());
        assert_eq!(session.game().winner(), None);
        assert!(!session.has_kart(1));

        session.queue_request(1, Request::SceneReady);
        session.tick(TICK);
        assert_eq!(session.lives(1), Some(3));
        assert_eq!(session.game().active_players(), &[HOST_CLIENT_ID, 1]);
    }

    /// Tests that leaving mid-race hands the win to the remaining player
    #[test]
    fn disconnect_during_race() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);

        session.client_disconnected(1);

        assert!(!session.has_kart(1));
        assert!(!session.lobby().contains(1));
        assert_eq!(session.game().winner(), Some(HOST_CLIENT_ID));
    }
}

/// CLIENT MIRROR TESTS
mod mirror_tests {
    use super::*;

    /// Tests that a mirror fed every notification matches the authority
    #[test]
    fn mirror_tracks_authority() {
        let (mut session, mut rx) = new_session();
        session.client_connected(1);
        drain(&mut rx);

        let mut mirror = ClientMirror::new();
        mirror.apply(&Packet::Connected {
            client_id: 1,
            snapshot: session.snapshot(),
        });
        assert_eq!(mirror.join_code(), "RACE42");
        assert_eq!(mirror.roster().len(), 2);

        session.queue_request(HOST_CLIENT_ID, Request::ToggleReady);
        session.queue_request(1, Request::ToggleReady);
        session.queue_request(HOST_CLIENT_ID, Request::StartGame);
        session.queue_request(1, Request::SceneReady);
        session.tick(TICK);
        session.queue_contact(Contact::ItemBox { box_id: 1, kart: 1 });
        session.queue_request(HOST_CLIENT_ID, Request::Damage { amount: 2 });
        session.tick(TICK);

        for packet in drain(&mut rx) {
            mirror.apply(&packet);
        }

        assert!(mirror.in_game());
        assert!(mirror.kart(1).is_some());
        assert_eq!(mirror.lives(HOST_CLIENT_ID), session.lives(HOST_CLIENT_ID));
        assert_eq!(mirror.lives(1), session.lives(1));
        assert_eq!(Some(mirror.item(1)), session.held_item(1));
        assert_eq!(mirror.box_active(1), Some(false));
        assert!(mirror.own_entry().unwrap().is_ready);
    }

    /// Tests that a late joiner catches up from the snapshot alone
    #[test]
    fn late_joiner_snapshot() {
        let (mut session, _rx) = new_session();
        start_match(&mut session);
        session.queue_request(
            HOST_CLIENT_ID,
            Request::Equip {
                item: ItemType::GreenShell,
            },
        );
        session.tick(TICK);
        session.queue_request(
            HOST_CLIENT_ID,
            Request::UseItem {
                item: ItemType::GreenShell,
            },
        );
        session.tick(TICK);

        session.client_connected(2);
        let mut mirror = ClientMirror::new();
        mirror.apply(&Packet::Connected {
            client_id: 2,
            snapshot: session.snapshot(),
        });

        assert!(mirror.in_game());
        assert!(mirror.kart(HOST_CLIENT_ID).is_some());
        assert_eq!(mirror.lives(1), Some(3));
        assert_eq!(mirror.projectiles().count(), 1);
    }
}

/// RELAY BOOTSTRAP TESTS
mod relay_tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use server::relay::{
        bootstrap_client, bootstrap_host, Allocation, ConnectionMode, LocalRelay, RelayError,
        RelayService,
    };
    use std::net::SocketAddr;

    struct OfflineRelay;

    impl RelayService for OfflineRelay {
        async fn create_allocation(&self, _max_connections: usize) -> Result<(Allocation, String), RelayError> {
            Err(RelayError::Unavailable("offline".to_string()))
        }

        async fn join_allocation(&self, _join_code: &str) -> Result<Allocation, RelayError> {
            Err(RelayError::Unavailable("offline".to_string()))
        }
    }

    fn direct_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    /// Tests a host and a client meeting through the in-process relay
    #[tokio::test]
    async fn host_and_client_share_allocation() {
        let relay = LocalRelay::new(direct_addr());
        let mut rng = StdRng::seed_from_u64(1);

        let host = bootstrap_host(Some(&relay), 4, direct_addr(), &mut rng).await;
        let host_allocation = match &host.mode {
            ConnectionMode::Relay(allocation) => allocation.clone(),
            other => panic!("Expected relay mode, got {:?}", other),
        };
        assert_eq!(host_allocation.max_connections, 3);

        let client = bootstrap_client(Some(&relay), &host.join_code.to_lowercase(), direct_addr())
            .await
            .unwrap();
        assert_eq!(client, ConnectionMode::Relay(host_allocation));
    }

    /// Tests that a failed relay falls back to direct mode with a usable code
    #[tokio::test]
    async fn offline_relay_falls_back_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let host = bootstrap_host(Some(&OfflineRelay), 4, direct_addr(), &mut rng).await;

        assert!(host.mode.is_fallback());
        assert_eq!(host.join_code.len(), shared::JOIN_CODE_LENGTH);

        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(test_config(), Some(host.join_code.clone()), tx);
        assert!(session.validate_join_code(&host.join_code.to_lowercase()));
    }

    /// Tests that a malformed code is refused before any relay call
    #[tokio::test]
    async fn malformed_code_is_refused() {
        let result = bootstrap_client(Some(&OfflineRelay), "AB", direct_addr()).await;
        assert!(result.is_err());
    }
}

/// END TO END TESTS
mod end_to_end_tests {
    use super::*;
    use server::network::Server;
    use tokio::net::UdpSocket as AsyncUdpSocket;
    use tokio::time::timeout;

    async fn recv_until<P>(socket: &AsyncUdpSocket, mut predicate: P) -> Option<Packet>
    where
        P: FnMut(&Packet) -> bool,
    {
        let mut buf = [0u8; 2048];
        loop {
            let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
                .await
                .ok()?
                .ok()?;
            let packet: Packet = deserialize(&buf[..len]).ok()?;
            if predicate(&packet) {
                return Some(packet);
            }
        }
    }

    /// Tests connect, ready-up and a wrong code against a running server
    #[tokio::test]
    async fn client_joins_running_server() {
        let mut server = Server::new("127.0.0.1:0", test_config(), Some("RACE42".to_string()))
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let handle = server.handle();

        let clients = async move {
            let socket = AsyncUdpSocket::bind("127.0.0.1:0").await.unwrap();
            let connect = Packet::Connect {
                client_version: PROTOCOL_VERSION,
                join_code: "race42".to_string(),
            };
            socket.send_to(&serialize(&connect).unwrap(), server_addr).await.unwrap();

            let connected = recv_until(&socket, |packet| matches!(packet, Packet::Connected { .. })).await;

            let ready = Packet::Request {
                sequence: 1,
                request: Request::ToggleReady,
            };
            socket.send_to(&serialize(&ready).unwrap(), server_addr).await.unwrap();
            let roster = recv_until(&socket, |packet| match packet {
                Packet::RosterChanged { roster } => roster.iter().any(|entry| entry.client_id == 1 && entry.is_ready),
                _ => false,
            })
            .await;

            let intruder = AsyncUdpSocket::bind("127.0.0.1:0").await.unwrap();
            let wrong = Packet::Connect {
                client_version: PROTOCOL_VERSION,
                join_code: "WRONG1".to_string(),
            };
            intruder.send_to(&serialize(&wrong).unwrap(), server_addr).await.unwrap();
            let refused = recv_until(&intruder, |_| true).await;

            handle.shutdown();
            (connected, roster, refused)
        };

        let (result, (connected, roster, refused)) = tokio::join!(server.run(), clients);
        assert!(result.is_ok());

        match connected {
            Some(Packet::Connected { client_id, snapshot }) => {
                assert_eq!(client_id, 1);
                assert_eq!(snapshot.join_code, "RACE42");
                assert!(!snapshot.in_game);
            }
            other => panic!("Expected Connected, got {:?}", other),
        }
        assert!(roster.is_some());
        assert_eq!(
            refused,
            Some(Packet::Disconnected {
                reason: "Invalid join code".to_string()
            })
        );
    }
}
