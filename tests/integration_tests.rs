//! Integration tests for the chat relay
//!
//! These tests run a real server on an ephemeral port and talk to it through
//! the client library over both frame encodings.

use chat_client::network::ChatClient;
use chat_server::network::Server;
use chat_server::profanity::WordListFilter;
use chat_shared::{Coordinates, ServerPacket, WireFormat, ADMIN_NAME, WELCOME_TEXT};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> String {
    let server = Server::bind("127.0.0.1:0", Box::new(WordListFilter::new()))
        .await
        .expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{}", addr)
}

async fn connect(url: &str, format: WireFormat) -> ChatClient {
    ChatClient::connect(url, format)
        .await
        .expect("Failed to connect")
}

/// Joins and returns the packets delivered before the acknowledgment
async fn join(client: &mut ChatClient, username: &str, room: &str) -> Vec<ServerPacket> {
    let ack = client.join(username, room).await.unwrap();
    let (outcome, packets) = timeout(WAIT, client.wait_for_ack(ack))
        .await
        .expect("Timed out waiting for join ack")
        .unwrap();
    assert_eq!(outcome, Ok(()), "join of {} failed", username);
    packets
}

async fn recv(client: &mut ChatClient) -> ServerPacket {
    timeout(WAIT, client.next_packet())
        .await
        .expect("Timed out waiting for packet")
        .unwrap()
        .expect("Connection closed unexpectedly")
}

fn expect_message(packet: &ServerPacket, sender: &str, text: &str) {
    match packet {
        ServerPacket::Message(m) => {
            assert_eq!(m.sender, sender);
            assert_eq!(m.text, text);
        }
        other => panic!("Expected message from {}, got {:?}", sender, other),
    }
}

fn expect_roster(packet: &ServerPacket, room: &str, users: &[&str]) {
    match packet {
        ServerPacket::RoomData(data) => {
            assert_eq!(data.room, room);
            assert_eq!(data.usernames(), users);
        }
        other => panic!("Expected roster for {}, got {:?}", room, other),
    }
}

/// END-TO-END ROOM FLOW
mod room_flow_tests {
    use super::*;

    /// Tests the join / message / location / leave sequence across encodings
    #[tokio::test]
    async fn two_users_chat_and_leave() {
        let url = start_server().await;

        let mut a = connect(&url, WireFormat::Json).await;
        let packets = join(&mut a, "A", "r1").await;
        assert_eq!(packets.len(), 2);
        expect_message(&packets[0], ADMIN_NAME, WELCOME_TEXT);
        expect_roster(&packets[1], "r1", &["A"]);

        let mut b = connect(&url, WireFormat::Bincode).await;
        let packets = join(&mut b, "B", "r1").await;
        assert_eq!(packets.len(), 2);
        expect_message(&packets[0], ADMIN_NAME, WELCOME_TEXT);
        expect_roster(&packets[1], "r1", &["A", "B"]);

        expect_message(&recv(&mut a).await, ADMIN_NAME, "B has joined!");
        expect_roster(&recv(&mut a).await, "r1", &["A", "B"]);

        let ack = b.send_message("hello").await.unwrap();
        let (outcome, packets) = b.wait_for_ack(ack).await.unwrap();
        assert_eq!(outcome, Ok(()));
        assert_eq!(packets.len(), 1);
        expect_message(&packets[0], "B", "hello");
        expect_message(&recv(&mut a).await, "B", "hello");

        let coords = Coordinates {
            latitude: 1.5,
            longitude: -2.25,
        };
        let ack = a.send_location(coords).await.unwrap();
        let (outcome, _) = a.wait_for_ack(ack).await.unwrap();
        assert_eq!(outcome, Ok(()));
        match recv(&mut b).await {
            ServerPacket::LocationMessage(m) => {
                assert_eq!(m.sender, "A");
                assert_eq!(m.url, "https://google.com/maps?q=1.5,-2.25");
            }
            other => panic!("Expected location message, got {:?}", other),
        }

        b.close().await.unwrap();
        expect_message(&recv(&mut a).await, ADMIN_NAME, "B has left");
        expect_roster(&recv(&mut a).await, "r1", &["A"]);
    }

    /// Tests that a dropped socket without a disconnect event still leaves the room
    #[tokio::test]
    async fn dropped_connection_leaves_room() {
        let url = start_server().await;

        let mut a = connect(&url, WireFormat::Json).await;
        join(&mut a, "A", "lobby").await;

        let mut b = connect(&url, WireFormat::Json).await;
        join(&mut b, "B", "lobby").await;
        recv(&mut a).await;
        recv(&mut a).await;

        drop(b);

        expect_message(&recv(&mut a).await, ADMIN_NAME, "B has left");
        expect_roster(&recv(&mut a).await, "lobby", &["A"]);
    }

    /// Tests that rooms do not see each other's traffic
    #[tokio::test]
    async fn rooms_are_isolated() {
        let url = start_server().await;

        let mut a = connect(&url, WireFormat::Json).await;
        join(&mut a, "A", "one").await;
        let mut c = connect(&url, WireFormat::Json).await;
        join(&mut c, "C", "two").await;

        let ack = c.send_message("only two").await.unwrap();
        let (outcome, _) = c.wait_for_ack(ack).await.unwrap();
        assert_eq!(outcome, Ok(()));

        let ack = a.send_message("only one").await.unwrap();
        let (_, packets) = a.wait_for_ack(ack).await.unwrap();
        assert_eq!(packets.len(), 1);
        expect_message(&packets[0], "A", "only one");
    }
}

/// ERROR ACKNOWLEDGMENT TESTS
mod error_tests {
    use super::*;

    async fn ack_error(client: &mut ChatClient, ack: u32) -> String {
        let (outcome, _) = timeout(WAIT, client.wait_for_ack(ack))
            .await
            .expect("Timed out waiting for ack")
            .unwrap();
        outcome.expect_err("Expected the request to be rejected")
    }

    /// Tests rejected joins and that the connection can retry afterwards
    #[tokio::test]
    async fn join_rejections() {
        let url = start_server().await;

        let mut a = connect(&url, WireFormat::Json).await;
        join(&mut a, "Bob", "general").await;

        let mut b = connect(&url, WireFormat::Bincode).await;
        let ack = b.join(" bob ", "General").await.unwrap();
        assert_eq!(ack_error(&mut b, ack).await, "Username is in use!");

        let ack = b.join("", "general").await.unwrap();
        assert_eq!(ack_error(&mut b, ack).await, "Username and room are required!");

        let ack = b.join("robert", "   ").await.unwrap();
        assert_eq!(ack_error(&mut b, ack).await, "Username and room are required!");

        join(&mut b, "Robert", "general").await;

        let ack = b.join("Robert", "random").await.unwrap();
        assert_eq!(ack_error(&mut b, ack).await, "Already joined a room");
    }

    /// Tests that profanity is reported to the sender only
    #[tokio::test]
    async fn profanity_not_broadcast() {
        let url = start_server().await;

        let mut a = connect(&url, WireFormat::Json).await;
        join(&mut a, "A", "r1").await;
        let mut b = connect(&url, WireFormat::Json).await;
        join(&mut b, "B", "r1").await;
        recv(&mut a).await;
        recv(&mut a).await;

        let ack = b.send_message("what the shit").await.unwrap();
        let (outcome, packets) = b.wait_for_ack(ack).await.unwrap();
        assert_eq!(outcome, Err("Profanity is not allowed!".to_string()));
        assert!(packets.is_empty());

        let ack = b.send_message("sorry").await.unwrap();
        let (outcome, _) = b.wait_for_ack(ack).await.unwrap();
        assert_eq!(outcome, Ok(()));

        // The first thing A sees after the roster is the clean message
        expect_message(&recv(&mut a).await, "B", "sorry");
    }

    /// Tests messages sent before joining
    #[tokio::test]
    async fn message_before_join() {
        let url = start_server().await;

        let mut a = connect(&url, WireFormat::Json).await;
        let ack = a.send_message("anyone?").await.unwrap();
        assert_eq!(ack_error(&mut a, ack).await, "Join a room first");
    }
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;
    use tokio::sync::oneshot;

    /// Tests that stopping the server drops every session
    #[tokio::test]
    async fn shutdown_clears_registry() {
        let server = Server::bind("127.0.0.1:0", Box::new(WordListFilter::new()))
            .await
            .unwrap();
        let url = format!("ws://{}", server.local_addr().unwrap());
        let registry = server.registry();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stop_rx.await;
        }));

        let mut a = connect(&url, WireFormat::Json).await;
        join(&mut a, "A", "r1").await;
        assert_eq!(registry.read().await.len(), 1);

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(registry.read().await.is_empty());
    }

    /// Reads until the server closes the socket
    async fn assert_closed(client: &mut ChatClient) {
        let closed = timeout(WAIT, async {
            loop {
                match client.next_packet().await {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(_) => break,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "Connection stayed open after shutdown");
    }

    /// Tests that stopping the server closes live sockets and nothing rejoins
    #[tokio::test]
    async fn shutdown_closes_live_connections() {
        let server = Server::bind("127.0.0.1:0", Box::new(WordListFilter::new()))
            .await
            .unwrap();
        let url = format!("ws://{}", server.local_addr().unwrap());
        let registry = server.registry();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stop_rx.await;
        }));

        let mut a = connect(&url, WireFormat::Json).await;
        join(&mut a, "A", "r1").await;
        let mut b = connect(&url, WireFormat::Bincode).await;

        stop_tx.send(()).unwrap();
        timeout(WAIT, handle)
            .await
            .expect("Server did not stop")
            .unwrap()
            .unwrap();
        assert!(registry.read().await.is_empty());

        assert_closed(&mut a).await;
        assert_closed(&mut b).await;

        // Nothing is left to accept a late join
        let _ = b.join("B", "r1").await;
        let _ = a.send_message("hi").await;
        assert!(registry.read().await.is_empty());
        assert!(ChatClient::connect(&url, WireFormat::Json).await.is_err());
    }

    /// Tests many clients joining the same room at once
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_produce_complete_roster() {
        let url = start_server().await;
        let count = 20;

        let handles: Vec<_> = (0..count)
            .map(|i| {
                let url = url.clone();
                tokio::spawn(async move {
                    let mut client = connect(&url, WireFormat::Json).await;
                    join(&mut client, &format!("user{}", i), "crowd").await;
                    client
                })
            })
            .collect();

        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.unwrap());
        }

        // A late observer sees every earlier member exactly once
        let mut observer = connect(&url, WireFormat::Json).await;
        let packets = join(&mut observer, "observer", "crowd").await;
        match &packets[1] {
            ServerPacket::RoomData(data) => {
                let mut names = data.usernames();
                assert_eq!(names.len(), count + 1);
                names.sort();
                names.dedup();
                assert_eq!(names.len(), count + 1);
            }
            other => panic!("Expected roster, got {:?}", other),
        }
    }
}
