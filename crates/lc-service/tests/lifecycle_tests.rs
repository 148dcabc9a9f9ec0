//! Room lifecycle integration tests.
//!
//! Empty rooms are reclaimed after the grace period; a room that regains a
//! member in time keeps its state. Shutdown drains every connection.

use lc_protocol::RoomId;
use lc_test_utils::{
    assert_eventually, chat, instructor, recv_until, recv_within, room_id, student, TestLcServer,
};
use std::time::Duration;

async fn room_exists(server: &TestLcServer, room: &str) -> bool {
    matches!(
        server.controller().get_room(RoomId::from(room)).await,
        Ok(Some(_))
    )
}

/// A room left empty past the grace period is removed.
#[tokio::test]
async fn test_empty_room_is_reclaimed() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn_with(&[("LC_ROOM_GRACE_PERIOD_SECONDS", "1")]).await?;
    let room = room_id("class");
    let (mut teacher, mut events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut events.roster).await;
    assert!(room_exists(&server, &room).await);

    teacher.disconnect().await;

    let (server_ref, room_ref) = (&server, room.as_str());
    assert_eventually(Duration::from_secs(5), || async move {
        !room_exists(server_ref, room_ref).await
    })
    .await;
    assert_eventually(Duration::from_secs(5), || async move {
        server_ref
            .controller()
            .get_status()
            .await
            .is_ok_and(|status| status.room_count == 0)
    })
    .await;

    Ok(())
}

/// A member returning within the grace period finds the room as it was.
#[tokio::test]
async fn test_rejoin_within_grace_keeps_room() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn_with(&[("LC_ROOM_GRACE_PERIOD_SECONDS", "30")]).await?;
    let room = room_id("class");
    let profile = instructor("i-1");

    let (mut first, mut first_events) = server.connect().await?;
    first.join_room(room.as_str(), profile.clone()).await?;
    recv_within(&mut first_events.roster).await;
    first.send_message(room.as_str(), chat(&profile, "one")).await?;
    assert_eq!(recv_within(&mut first_events.chat).await.id, 1);
    first.disconnect().await;

    let (second, mut second_events) = server.connect().await?;
    second.join_room(room.as_str(), profile.clone()).await?;
    assert_eq!(
        recv_within(&mut second_events.roster).await.user_ids(),
        vec!["i-1"]
    );
    second.send_message(room.as_str(), chat(&profile, "two")).await?;
    assert_eq!(recv_within(&mut second_events.chat).await.id, 2);

    Ok(())
}

/// A reclaimed room comes back fresh on the next join.
#[tokio::test]
async fn test_room_recreated_after_reclamation_starts_fresh() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn_with(&[("LC_ROOM_GRACE_PERIOD_SECONDS", "1")]).await?;
    let room = room_id("class");
    let profile = student("s-1");

    let (mut first, mut first_events) = server.connect().await?;
    first.join_room(room.as_str(), profile.clone()).await?;
    recv_within(&mut first_events.roster).await;
    first.send_message(room.as_str(), chat(&profile, "one")).await?;
    recv_within(&mut first_events.chat).await;
    first.disconnect().await;

    let (server_ref, room_ref) = (&server, room.as_str());
    assert_eventually(Duration::from_secs(5), || async move {
        !room_exists(server_ref, room_ref).await
    })
    .await;

    let (second, mut second_events) = server.connect().await?;
    second.join_room(room.as_str(), profile.clone()).await?;
    recv_within(&mut second_events.roster).await;
    second.send_message(room.as_str(), chat(&profile, "again")).await?;
    assert_eq!(recv_within(&mut second_events.chat).await.id, 1);

    Ok(())
}

/// Status reflects live rooms and registered connections.
#[tokio::test]
async fn test_status_counts_rooms_and_connections() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let (teacher, mut teacher_events) = server.connect().await?;
    let (alice, mut alice_events) = server.connect().await?;

    teacher
        .join_room(room_id("class").as_str(), instructor("i-1"))
        .await?;
    recv_within(&mut teacher_events.roster).await;
    alice
        .join_room(room_id("class").as_str(), student("s-1"))
        .await?;
    recv_within(&mut alice_events.roster).await;

    let status = server.controller().get_status().await?;
    assert_eq!(status.room_count, 2);
    assert!(!status.is_draining);
    assert_eq!(server.state().hub.registry().len().await, 2);

    Ok(())
}

/// Shutdown refuses new rooms and closes every open connection.
#[tokio::test]
async fn test_shutdown_closes_connections() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut events.roster).await;

    server.controller().shutdown(Duration::from_secs(5)).await?;

    // Drain whatever was in flight; the channel then closes.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while events.roster.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
    assert!(!teacher.is_connected());
    assert!(server.controller().is_cancelled());

    Ok(())
}

/// Several classes run side by side without crosstalk.
#[tokio::test]
async fn test_rooms_are_isolated() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let (first, second) = (room_id("class"), room_id("class"));
    let (alice, mut alice_events) = server.connect().await?;
    let (bob, mut bob_events) = server.connect().await?;

    alice.join_room(first.as_str(), student("s-1")).await?;
    recv_within(&mut alice_events.roster).await;
    bob.join_room(second.as_str(), student("s-2")).await?;
    let bob_roster = recv_within(&mut bob_events.roster).await;
    assert_eq!(bob_roster.user_ids(), vec!["s-2"]);

    alice.raise_hand(first.as_str(), "s-1", true).await?;
    recv_until(&mut alice_events.hands, |h| h.raised).await;
    lc_test_utils::assert_quiet(&mut bob_events.hands).await;

    Ok(())
}
