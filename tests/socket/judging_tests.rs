//! Tests for judge submissions over the channel
//!
//! - Accepted scores reach every viewer of the competition
//! - Validation, role and version failures publish nothing
//! - Disqualifications sort last and can be cleared
//! - Session expiry mid-connection closes the socket

use scoreboard_engine::socket_server::protocol::{ClientMessage, ServerMessage};
use scoreboard_engine::{
    AuthFailure, ChannelEvent, Delivery, RawMarks, RoundId, ScoreInput, ScoreStore, ScoringError,
    TieBreakDetail, ViewerStatus,
};

use crate::common::*;

fn submit(id: u64, participation_id: u64, round: RoundId, score: ScoreInput) -> ClientMessage {
    ClientMessage::SubmitScore {
        id: Some(id),
        participation_id,
        round,
        score,
        expected_version: None,
    }
}

fn generic(total: f64) -> ScoreInput {
    ScoreInput::Marks(RawMarks::new().with("puntaje_total_ronda", total))
}

fn accepted(reply: ServerMessage) -> scoreboard_engine::SubmissionReceipt {
    match reply {
        ServerMessage::Accepted { receipt, .. } => receipt,
        other => panic!("Expected accepted reply, got {:?}", other),
    }
}

// ============================================================================
// SUBMISSION TESTS
// ============================================================================

#[tokio::test]
async fn test_judge_submission_reaches_viewers() {
    let server = TestServer::start().await;
    let mut viewer = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let reply = request(&mut judge, submit(1, ANA, RoundId::Final, generic(95.5))).await;
    assert_eq!(reply.request_id(), Some(1));
    let receipt = accepted(reply);
    assert_eq!(receipt.version, 1);
    assert_eq!(receipt.computed.total, 95.5);
    assert_eq!(receipt.delivery, Delivery::Published { sequence: 1 });

    let event = next_score(&mut viewer).await;
    assert_eq!(event.participation_id, ANA);
    assert_eq!(event.display_name, "Ana Torrez");
    assert_eq!(event.total, 95.5);
    assert_eq!(event.sequence, 1);
    assert_eq!(viewer.standings().len(), 1);
    assert!(viewer.standings().render().contains("95.5"));

    let stored = server.store.get(ANA, RoundId::Final).await.unwrap().unwrap();
    assert_eq!(stored.recorded_by.as_deref(), Some("judge"));
}

#[tokio::test]
async fn test_resubmission_replaces_previous_score() {
    let server = TestServer::start().await;
    let mut viewer = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    accepted(request(&mut judge, submit(1, ANA, RoundId::Final, generic(90.0))).await);
    let receipt = accepted(request(&mut judge, submit(2, ANA, RoundId::Final, generic(92.0))).await);
    assert_eq!(receipt.version, 2);

    next_score(&mut viewer).await;
    let latest = next_score(&mut viewer).await;
    assert_eq!(latest.total, 92.0);
    assert_eq!(viewer.standings().len(), 1);
    assert_eq!(viewer.standings().get(ANA).map(|e| e.total), Some(92.0));
}

#[tokio::test]
async fn test_fbi_without_first_time_is_rejected_and_not_published() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let marks = RawMarks::new().with("impactos_5", 8).with("impactos_4", 2);
    let reply = request(&mut judge, submit(7, DIEGO, RoundId::Round(1), ScoreInput::Marks(marks))).await;
    match &reply {
        ServerMessage::Error { id, code, field, .. } => {
            assert_eq!(*id, Some(7));
            assert_eq!(code, "validation_error");
            assert_eq!(field.as_deref(), Some("tiempo_r1"));
        }
        other => panic!("Expected error reply, got {:?}", other),
    }

    let (events, sequence) = server.ctx.registry.get(OPEN_COMPETITION).unwrap().snapshot();
    assert!(events.is_empty());
    assert_eq!(sequence, 0);
    assert!(server.store.get(DIEGO, RoundId::Round(1)).await.unwrap().is_none());
    assert!(server.store.is_empty());
}

#[tokio::test]
async fn test_fbi_with_time_is_ranked_with_detail() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let marks = RawMarks::new()
        .with("impactos_5", 8)
        .with("impactos_4", 2)
        .with("tiempo_r1", "4.25");
    let receipt =
        accepted(request(&mut judge, submit(1, DIEGO, RoundId::Round(1), ScoreInput::Marks(marks))).await);
    assert_eq!(receipt.computed.total, 48.0);
    assert_eq!(
        receipt.computed.detail,
        TieBreakDetail::HitsAndTime { hits: 8, time: 4.25 }
    );
}

#[tokio::test]
async fn test_unknown_field_is_rejected() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let marks = RawMarks::new().with("puntaje_total_ronda", 90).with("bonus", 5);
    let reply = request(&mut judge, submit(1, ANA, RoundId::Final, ScoreInput::Marks(marks))).await;
    assert_eq!(error_code(&reply), "validation_error");
}

#[tokio::test]
async fn test_viewer_role_cannot_submit() {
    let server = TestServer::start().await;
    let mut viewer = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;

    let reply = request(&mut viewer, submit(3, ANA, RoundId::Final, generic(99.0))).await;
    assert_eq!(error_code(&reply), "authorization_error");

    // Connection stays open for viewing
    client_ping(&mut viewer).await;
    assert!(viewer.is_connected());
    assert!(server.store.is_empty());
}

async fn client_ping(client: &mut scoreboard_engine::ViewerClient) {
    client.send(&ClientMessage::Ping).await.unwrap();
    loop {
        if let ServerMessage::Pong = next_message(client).await {
            return;
        }
    }
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    accepted(request(&mut judge, submit(1, BRUNO, RoundId::Round(2), generic(70.0))).await);

    let reply = request(
        &mut judge,
        ClientMessage::SubmitScore {
            id: Some(2),
            participation_id: BRUNO,
            round: RoundId::Round(2),
            score: generic(71.0),
            expected_version: Some(0),
        },
    )
    .await;
    assert_eq!(error_code(&reply), "stale_version");

    let receipt = accepted(
        request(
            &mut judge,
            ClientMessage::SubmitScore {
                id: Some(3),
                participation_id: BRUNO,
                round: RoundId::Round(2),
                score: generic(71.0),
                expected_version: Some(1),
            },
        )
        .await,
    );
    assert_eq!(receipt.version, 2);
}

#[tokio::test]
async fn test_closed_competition_rejects_scores() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, CLOSED_COMPETITION).await;

    let reply = request(&mut judge, submit(1, GABI, RoundId::Final, generic(80.0))).await;
    match &reply {
        ServerMessage::Error { code, field, .. } => {
            assert_eq!(code, "validation_error");
            assert_eq!(field.as_deref(), Some("competition"));
        }
        other => panic!("Expected error reply, got {:?}", other),
    }
}

#[tokio::test]
async fn test_participation_from_other_competition_is_rejected() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let reply = request(&mut judge, submit(1, GABI, RoundId::Final, generic(80.0))).await;
    assert_eq!(error_code(&reply), "not_found");
}

// ============================================================================
// DISQUALIFICATION TESTS
// ============================================================================

#[tokio::test]
async fn test_disqualification_sorts_last_and_can_be_cleared() {
    let server = TestServer::start().await;
    let mut viewer = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    accepted(request(&mut judge, submit(1, ANA, RoundId::Final, generic(95.0))).await);
    let dq = accepted(
        request(
            &mut judge,
            submit(2, BRUNO, RoundId::Final, ScoreInput::disqualified("unsafe handling")),
        )
        .await,
    );
    assert!(dq.computed.disqualified);
    accepted(request(&mut judge, submit(3, CARLA, RoundId::Final, generic(80.0))).await);

    for _ in 0..3 {
        next_score(&mut viewer).await;
    }
    let order: Vec<u64> = viewer
        .standings()
        .ranked()
        .iter()
        .map(|e| e.participation_id)
        .collect();
    assert_eq!(order, vec![ANA, CARLA, BRUNO]);
    assert!(viewer.standings().render().contains("DQ"));

    // Marks are refused while the disqualification stands
    let reply = request(&mut judge, submit(4, BRUNO, RoundId::Final, generic(99.0))).await;
    assert_eq!(error_code(&reply), "validation_error");

    let reply = request(
        &mut judge,
        ClientMessage::ClearDisqualification {
            id: Some(5),
            participation_id: BRUNO,
            round: RoundId::Final,
        },
    )
    .await;
    assert!(matches!(
        reply,
        ServerMessage::Cleared {
            delivery: Delivery::Published { .. },
            ..
        }
    ));

    match next_update(&mut viewer).await {
        ChannelEvent::Retracted { participation_id, .. } => assert_eq!(participation_id, BRUNO),
        other => panic!("Expected retraction, got {:?}", other),
    }
    assert_eq!(viewer.standings().ranked().len(), 2);

    // Marks are accepted again
    accepted(request(&mut judge, submit(6, BRUNO, RoundId::Final, generic(99.0))).await);
    let event = next_score(&mut viewer).await;
    assert_eq!(event.participation_id, BRUNO);
    assert_eq!(viewer.standings().ranked()[0].participation_id, BRUNO);
}

#[tokio::test]
async fn test_disqualification_requires_reason() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    // Rejected while parsing the payload, before any judge check
    let reply = request(&mut judge, submit(1, ANA, RoundId::Final, ScoreInput::disqualified("  "))).await;
    assert_eq!(reply.request_id(), Some(1));
    assert_eq!(error_code(&reply), "invalid_message");
    assert!(server.store.is_empty());
}

// ============================================================================
// SESSION TESTS
// ============================================================================

#[tokio::test]
async fn test_logout_mid_connection_closes_on_next_action() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    assert!(server.sessions.logout(JUDGE_TOKEN));

    let err = tokio::time::timeout(WAIT, judge.request(submit(1, ANA, RoundId::Final, generic(90.0))))
        .await
        .expect("Timed out")
        .unwrap_err();
    assert!(matches!(
        err,
        ScoringError::Authorization {
            reason: AuthFailure::UnknownSession
        }
    ));
    assert!(matches!(judge.status(), ViewerStatus::NotAuthenticated { .. }));
    assert!(server.store.is_empty());
}
