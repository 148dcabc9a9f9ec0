//! Presence integration tests.
//!
//! Joins, leaves, disconnects and reconnects over real WebSockets using the
//! `TestLcServer` harness, observed through `participants-updated`.

use lc_protocol::RoomId;
use lc_test_utils::{
    assert_quiet, instructor, recv_until, recv_within, room_id, student, TestLcServer,
};

/// The first member receives a roster containing only themselves.
#[tokio::test]
async fn test_first_join_receives_own_roster() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;

    let roster = recv_within(&mut teacher_events.roster).await;
    assert_eq!(roster.user_ids(), vec!["i-1"]);
    assert_eq!(roster.participants.len(), 1);

    Ok(())
}

/// Every member receives the roster in join order when someone joins.
#[tokio::test]
async fn test_join_order_is_preserved_for_all_members() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;
    let (alice, mut alice_events) = server.connect().await?;
    let (bob, mut bob_events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut teacher_events.roster).await;

    alice.join_room(room.as_str(), student("s-1")).await?;
    assert_eq!(
        recv_within(&mut teacher_events.roster).await.user_ids(),
        vec!["i-1", "s-1"]
    );
    assert_eq!(
        recv_within(&mut alice_events.roster).await.user_ids(),
        vec!["i-1", "s-1"]
    );

    bob.join_room(room.as_str(), student("s-2")).await?;
    for events in [&mut teacher_events, &mut alice_events, &mut bob_events] {
        assert_eq!(
            recv_within(&mut events.roster).await.user_ids(),
            vec!["i-1", "s-1", "s-2"]
        );
    }

    Ok(())
}

/// A dropped connection counts as a leave.
#[tokio::test]
async fn test_disconnect_removes_participant() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (mut teacher, mut teacher_events) = server.connect().await?;
    let (alice, mut alice_events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    alice.join_room(room.as_str(), student("s-1")).await?;
    recv_within(&mut alice_events.roster).await;

    teacher.disconnect().await;

    let roster = recv_within(&mut alice_events.roster).await;
    assert_eq!(roster.user_ids(), vec!["s-1"]);

    Ok(())
}

/// An explicit leave updates the remaining members.
#[tokio::test]
async fn test_leave_room_updates_remaining_members() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;
    let (alice, mut alice_events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    alice.join_room(room.as_str(), student("s-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    recv_within(&mut alice_events.roster).await;

    alice.leave_room(room.as_str(), "s-1").await?;

    assert_eq!(
        recv_within(&mut teacher_events.roster).await.user_ids(),
        vec!["i-1"]
    );
    assert_quiet(&mut alice_events.roster).await;

    Ok(())
}

/// Rejoining from a new connection rebinds the same participant.
#[tokio::test]
async fn test_reconnect_keeps_single_entry() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;
    let (old_tab, mut old_events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    old_tab.join_room(room.as_str(), student("s-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    recv_within(&mut old_events.roster).await;

    let (new_tab, mut new_events) = server.connect().await?;
    new_tab.join_room(room.as_str(), student("s-1")).await?;

    assert_eq!(
        recv_within(&mut teacher_events.roster).await.user_ids(),
        vec!["i-1", "s-1"]
    );
    assert_eq!(
        recv_within(&mut new_events.roster).await.user_ids(),
        vec!["i-1", "s-1"]
    );

    // The old tab no longer receives room traffic, and closing it does not
    // evict the live session.
    drop(old_tab);
    assert_quiet(&mut teacher_events.roster).await;
    assert_quiet(&mut old_events.roster).await;

    let state = server
        .controller()
        .get_room(RoomId::from(room.as_str()))
        .await?
        .ok_or_else(|| anyhow::anyhow!("room should exist"))?
        .get_state()
        .await?;
    assert_eq!(state.participants.len(), 2);

    Ok(())
}

/// A leave sent from a superseded connection is ignored.
#[tokio::test]
async fn test_stale_leave_is_ignored() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;
    let (old_tab, _old_events) = server.connect().await?;
    let (new_tab, mut new_events) = server.connect().await?;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    old_tab.join_room(room.as_str(), student("s-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    new_tab.join_room(room.as_str(), student("s-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    recv_within(&mut new_events.roster).await;

    old_tab.leave_room(room.as_str(), "s-1").await?;

    assert_quiet(&mut teacher_events.roster).await;

    Ok(())
}

/// Joining another room leaves the first one.
#[tokio::test]
async fn test_switching_rooms_leaves_previous_room() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let first = room_id("class");
    let second = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;
    let (alice, mut alice_events) = server.connect().await?;

    teacher.join_room(first.as_str(), instructor("i-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    alice.join_room(first.as_str(), student("s-1")).await?;
    recv_within(&mut teacher_events.roster).await;
    recv_within(&mut alice_events.roster).await;

    alice.join_room(second.as_str(), student("s-1")).await?;

    assert_eq!(
        recv_within(&mut teacher_events.roster).await.user_ids(),
        vec!["i-1"]
    );
    assert_eq!(
        recv_within(&mut alice_events.roster).await.user_ids(),
        vec!["s-1"]
    );

    Ok(())
}

/// The roster after a burst of joins and leaves is the set of users whose
/// last action was a join.
#[tokio::test]
async fn test_roster_settles_to_last_action() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (observer, mut observer_events) = server.connect().await?;
    observer.join_room(room.as_str(), instructor("i-1")).await?;
    recv_within(&mut observer_events.roster).await;

    let mut clients = Vec::new();
    for i in 0..6 {
        let (client, events) = server.connect().await?;
        client
            .join_room(room.as_str(), student(&format!("s-{i}")))
            .await?;
        clients.push((client, events));
    }
    for (i, (_, events)) in clients.iter_mut().enumerate() {
        let me = format!("s-{i}");
        recv_until(&mut events.roster, |roster| {
            roster.user_ids().contains(&me.as_str())
        })
        .await;
    }

    // Odd students leave again.
    for (i, (client, _)) in clients.iter().enumerate() {
        if i % 2 == 1 {
            client.leave_room(room.as_str(), format!("s-{i}")).await?;
        }
    }

    let settled = recv_until(&mut observer_events.roster, |roster| {
        roster.participants.len() == 4
    })
    .await;
    let mut ids = settled.user_ids();
    ids.sort_unstable();
    assert_eq!(ids, vec!["i-1", "s-0", "s-2", "s-4"]);
    assert_eq!(settled.user_ids().first(), Some(&"i-1"));

    let state = server
        .controller()
        .get_room(RoomId::from(room.as_str()))
        .await?
        .ok_or_else(|| anyhow::anyhow!("room should exist"))?
        .get_state()
        .await?;
    assert_eq!(state.participants.len(), 4);

    Ok(())
}

/// Hand state is reflected in the next roster.
#[tokio::test]
async fn test_hand_state_appears_in_roster() -> Result<(), anyhow::Error> {
    let server = TestLcServer::spawn().await?;
    let room = room_id("class");
    let (teacher, mut teacher_events) = server.connect().await?;
    let (alice, mut alice_events) = server.connect().await?;

    alice.join_room(room.as_str(), student("s-1")).await?;
    recv_within(&mut alice_events.roster).await;
    alice.raise_hand(room.as_str(), "s-1", true).await?;
    recv_within(&mut alice_events.hands).await;

    teacher.join_room(room.as_str(), instructor("i-1")).await?;
    let roster = recv_within(&mut teacher_events.roster).await;
    let alice_view = roster
        .participants
        .iter()
        .find(|p| p.user_id.as_str() == "s-1")
        .ok_or_else(|| anyhow::anyhow!("s-1 missing from roster"))?;
    assert!(alice_view.hand_raised);

    Ok(())
}
