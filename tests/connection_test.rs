mod common;

use std::time::Duration;

use tokio::time::{timeout, Instant};

use chessbot::client::{
    ClientError, InviteOutcome, InviteReply, SessionEvent, WaitOutcome,
};
use chessbot::types::ConnectionState;

use common::{config, connect, logged_in, HANDSHAKE};

#[tokio::test]
async fn handshake_then_login_scenario() {
    let (engine, _events, mut server) = connect(config("Bot1")).await;
    assert_eq!(engine.state(), ConnectionState::HandshakeWait);

    server.send(HANDSHAKE).await;
    assert_eq!(server.recv().await, "40");
    assert_eq!(server.recv().await, r#"42["setPlayerName","Bot1"]"#);
    assert_eq!(
        engine.wait_for_connection(Duration::from_secs(2)).await,
        WaitOutcome::Reached
    );

    let snapshot = engine.connection().await;
    assert_eq!(snapshot.session_id.as_deref(), Some("abc"));
    assert_eq!(snapshot.ping_interval_ms, 25000);
    assert_eq!(snapshot.ping_timeout_ms, 20000);

    server
        .send(r#"42["playerNameSet",{"name":"Bot1"}]"#)
        .await;
    assert!(engine
        .wait_for_login(Duration::from_secs(2))
        .await
        .is_reached());
    assert_eq!(engine.state(), ConnectionState::LoggedIn);
    assert_eq!(engine.login_state().await.name_mismatch(), None);
}

#[tokio::test]
async fn server_assigned_name_still_logs_in() {
    let (engine, _events, mut server) = connect(config("Bot1")).await;
    server.send(HANDSHAKE).await;
    server.recv().await;
    server.recv().await;

    server
        .send(r#"42["playerNameSet",{"name":"Bot1 (2)","socketId":"s1"}]"#)
        .await;
    assert!(engine
        .wait_for_login(Duration::from_secs(2))
        .await
        .is_reached());
    let login = engine.login_state().await;
    assert_eq!(login.username, "Bot1");
    assert_eq!(login.name_mismatch(), Some("Bot1 (2)"));
}

#[tokio::test]
async fn name_confirmed_before_handshake_is_ignored() {
    let (engine, _events, mut server) = connect(config("Bot1")).await;
    server
        .send(r#"42["playerNameSet",{"name":"Bot1"}]"#)
        .await;
    server.send("2").await;
    assert_eq!(server.recv().await, "3");

    assert_eq!(engine.state(), ConnectionState::HandshakeWait);
    assert!(!engine.login_state().await.is_logged_in());

    server.send(HANDSHAKE).await;
    server.recv().await;
    server.recv().await;
    assert!(!engine.login_state().await.is_logged_in());
    server
        .send(r#"42["playerNameSet",{"name":"Bot1"}]"#)
        .await;
    assert!(engine
        .wait_for_login(Duration::from_secs(2))
        .await
        .is_reached());
    assert!(engine.login_state().await.is_logged_in());
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (_engine, _events, mut server) = logged_in("Bot1").await;
    server.send("2").await;
    assert_eq!(server.recv().await, "3");
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_discarded() {
    let (engine, _events, mut server) = logged_in("Bot1").await;
    server.send("9zz").await;
    server.send(r#"42{"not":"an array"}"#).await;
    server.send(r#"42["somethingNew",{"x":1}]"#).await;
    server.send("2").await;

    // Still alive and answering.
    assert_eq!(server.recv().await, "3");
    assert_eq!(engine.state(), ConnectionState::LoggedIn);
}

#[tokio::test]
async fn waits_time_out_without_error() {
    let (engine, _events, _server) = connect(config("Bot1")).await;
    let started = Instant::now();
    assert_eq!(
        engine.wait_for_login(Duration::from_millis(50)).await,
        WaitOutcome::TimedOut
    );
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn invite_requires_login() {
    let (engine, _events, _server) = connect(config("Bot1")).await;
    let result = engine.invite_opponent("Foe", Duration::from_millis(50)).await;
    assert!(matches!(
        result,
        Err(ClientError::NotLoggedIn {
            state: ConnectionState::HandshakeWait
        })
    ));
}

#[tokio::test]
async fn invite_round_trip() {
    let (engine, _events, mut server) = logged_in("Bot1").await;

    let invite = tokio::spawn({
        let engine = engine.clone();
        async move { engine.invite_opponent("Foe", Duration::from_secs(2)).await }
    });
    assert_eq!(
        server.recv().await,
        r#"42["invitePlayer",{"invitee":"Foe"}]"#
    );
    server
        .send(r#"42["invitationSent",{"roomId":"room1","invitee":"Foe"}]"#)
        .await;

    let outcome = invite.await.unwrap().unwrap();
    match outcome {
        InviteOutcome::Reply(reply) => {
            assert!(reply.is_sent());
            assert_eq!(reply.room_id(), Some("room1"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn invite_rejection_is_reported() {
    let (engine, _events, mut server) = logged_in("Bot1").await;

    let invite = tokio::spawn({
        let engine = engine.clone();
        async move { engine.invite_opponent("ghost", Duration::from_secs(2)).await }
    });
    server.recv().await;
    server
        .send(r#"42["invitationError","Player not found"]"#)
        .await;

    assert_eq!(
        invite.await.unwrap().unwrap(),
        InviteOutcome::Reply(InviteReply::Rejected {
            message: "Player not found".to_string()
        })
    );
}

#[tokio::test]
async fn invite_timeout_leaves_slot_reusable() {
    let (engine, _events, mut server) = logged_in("Bot1").await;

    let started = Instant::now();
    let outcome = engine
        .invite_opponent("ghost", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(outcome, InviteOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(1));
    server.recv().await;

    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.invite_opponent("Foe", Duration::from_secs(2)).await }
    });
    server.recv().await;
    server
        .send(r#"42["invitationSent",{"roomId":"room2"}]"#)
        .await;
    let outcome = second.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        InviteOutcome::Reply(InviteReply::Sent {
            room_id: Some("room2".to_string()),
            invitee: None,
            message: None,
        })
    );
}

#[tokio::test]
async fn stale_invite_reply_is_not_cross_delivered() {
    let (engine, _events, mut server) = logged_in("Bot1").await;

    let first = engine
        .invite_opponent("slow", Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(first, InviteOutcome::TimedOut);
    assert_eq!(
        server.recv().await,
        r#"42["invitePlayer",{"invitee":"slow"}]"#
    );

    // The reply to the first invite shows up late, before the second is sent.
    server
        .send(r#"42["invitationSent",{"roomId":"stale"}]"#)
        .await;
    server.send("2").await;
    assert_eq!(server.recv().await, "3");

    let second = engine
        .invite_opponent("Foe", Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(second, InviteOutcome::TimedOut);
}

#[tokio::test]
async fn accept_invitation_sends_room_id() {
    let (engine, _events, mut server) = logged_in("Bot1").await;
    engine.accept_invitation("room7").await.unwrap();
    assert_eq!(
        server.recv().await,
        r#"42["acceptInvitation",{"roomId":"room7"}]"#
    );
    engine.start_game("room7").await.unwrap();
    assert_eq!(server.recv().await, r#"42["startGame","room7"]"#);
}

#[tokio::test]
async fn game_events_are_forwarded() {
    let (_engine, mut events, mut server) = logged_in("Bot1").await;
    server
        .send(r#"42["invitation",{"from":"Foe","roomId":"room3"}]"#)
        .await;
    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        SessionEvent::InvitationReceived {
            inviter: "Foe".to_string(),
            room_id: "room3".to_string(),
        }
    );

    server
        .send(r#"42["gameStarted",{"id":"room3","white":"Foe","black":"Bot1","gameFen":"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"}]"#)
        .await;
    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        SessionEvent::GameStarted(start) => {
            assert_eq!(start.id, "room3");
            assert_eq!(start.black, "Bot1");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn server_disconnect_closes_and_resolves_waits() {
    let (engine, mut events, mut server) = connect(config("Bot1")).await;
    let waiting = tokio::spawn({
        let engine = engine.clone();
        async move { engine.wait_for_login(Duration::from_secs(5)).await }
    });

    server.send(HANDSHAKE).await;
    server.recv().await;
    server.recv().await;
    server.send("41").await;

    assert_eq!(
        timeout(Duration::from_secs(2), waiting).await.unwrap().unwrap(),
        WaitOutcome::Closed
    );
    timeout(Duration::from_secs(2), engine.closed()).await.unwrap();
    assert_eq!(engine.state(), ConnectionState::Closed);
    assert_eq!(
        timeout(Duration::from_secs(2), events.recv()).await.unwrap(),
        Some(SessionEvent::Closed)
    );
    assert!(server.client_closed().await);

    assert!(matches!(
        engine.send("2").await,
        Err(ClientError::NotConnected {
            state: ConnectionState::Closed
        })
    ));
}

#[tokio::test]
async fn stream_end_closes_pending_invite() {
    let (engine, _events, server) = logged_in("Bot1").await;
    let invite = tokio::spawn({
        let engine = engine.clone();
        async move { engine.invite_opponent("Foe", Duration::from_secs(5)).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.hang_up().await;

    let outcome = timeout(Duration::from_secs(2), invite)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome, InviteOutcome::Closed);
    timeout(Duration::from_secs(2), engine.closed()).await.unwrap();
}

#[tokio::test]
async fn handshake_without_sid_aborts() {
    let (engine, mut events, mut server) = connect(config("Bot1")).await;
    server.send(r#"0{"pingInterval":25000}"#).await;

    assert_eq!(
        timeout(Duration::from_secs(2), events.recv()).await.unwrap(),
        Some(SessionEvent::Closed)
    );
    assert_eq!(engine.state(), ConnectionState::Closed);
    assert!(server.client_closed().await);
}

#[tokio::test]
async fn client_disconnect_is_idempotent() {
    let (engine, mut events, mut server) = logged_in("Bot1").await;
    engine.disconnect().await;
    engine.disconnect().await;
    assert_eq!(engine.state(), ConnectionState::Closed);
    assert_eq!(events.recv().await, Some(SessionEvent::Closed));
    assert!(server.client_closed().await);
}

#[tokio::test]
async fn observed_states_follow_the_state_machine() {
    use ConnectionState::*;
    const ORDER: [ConnectionState; 7] = [
        Disconnected,
        Connecting,
        HandshakeWait,
        Open,
        LoggedIn,
        Closing,
        Closed,
    ];

    let (engine, _events, server) = logged_in("Bot1").await;
    let mut states = engine.subscribe_state();
    let mut seen = vec![*states.borrow_and_update()];
    let collector = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            seen.push(state);
            if state == Closed {
                break;
            }
        }
        seen
    });

    server.hang_up().await;
    let seen = timeout(Duration::from_secs(2), collector)
        .await
        .unwrap()
        .unwrap();

    let ranks: Vec<usize> = seen
        .iter()
        .map(|s| ORDER.iter().position(|o| o == s).unwrap())
        .collect();
    assert!(ranks.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    assert_eq!(seen.first(), Some(&LoggedIn));
    assert_eq!(seen.last(), Some(&Closed));
}
