//! Tests for clay squad rotations driven over the channel
//!
//! The judge fixes the firing order, records hit/miss outcomes shooter by
//! shooter and saves the grids, which then flow through normal submission.

use scoreboard_engine::socket_server::protocol::{ClientMessage, ServerMessage};
use scoreboard_engine::{RotationStep, RoundId, ViewerClient};

use crate::common::*;

fn start(round: RoundId, category_id: u64) -> ClientMessage {
    ClientMessage::StartRotation {
        id: Some(1),
        round,
        category_id,
        squad_group: 1,
    }
}

async fn record(judge: &mut ViewerClient, hit: bool) -> RotationStep {
    match request(judge, ClientMessage::RecordOutcome { id: Some(2), hit }).await {
        ServerMessage::Rotation { step, .. } => step,
        other => panic!("Expected rotation reply, got {:?}", other),
    }
}

fn shooter_up(step: &RotationStep) -> (u64, usize) {
    match step {
        RotationStep::Next {
            participation_id,
            attempt,
            ..
        } => (*participation_id, *attempt),
        RotationStep::RoundComplete => panic!("Round already complete"),
    }
}

// ============================================================================
// ROTATION FLOW TESTS
// ============================================================================

#[tokio::test]
async fn test_full_rotation_saves_and_updates_standings() {
    let server = TestServer::start().await;
    let mut viewer = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let step = match request(&mut judge, start(RoundId::Final, CLAY_CATEGORY)).await {
        ServerMessage::Rotation { step, .. } => step,
        other => panic!("Expected rotation reply, got {:?}", other),
    };
    assert_eq!(shooter_up(&step), (ELENA, 1));

    // Final: 5 targets each, alternating lanes; Elena breaks all, Fabio 3
    let mut step = step;
    for attempt in 1..=5 {
        assert_eq!(shooter_up(&step), (ELENA, attempt));
        step = record(&mut judge, true).await;
        assert_eq!(shooter_up(&step), (FABIO, attempt));
        step = record(&mut judge, attempt <= 3).await;
    }
    assert_eq!(step, RotationStep::RoundComplete);

    let receipts = match request(&mut judge, ClientMessage::SaveRound { id: Some(3), confirm: false }).await {
        ServerMessage::RoundSaved { receipts, .. } => receipts,
        other => panic!("Expected round_saved reply, got {:?}", other),
    };
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[0].participation_id, ELENA);
    assert_eq!(receipts[0].computed.total, 5.0);
    assert_eq!(receipts[1].participation_id, FABIO);
    assert_eq!(receipts[1].computed.total, 3.0);

    next_score(&mut viewer).await;
    next_score(&mut viewer).await;
    let order: Vec<u64> = viewer
        .standings()
        .ranked()
        .iter()
        .map(|e| e.participation_id)
        .collect();
    assert_eq!(order, vec![ELENA, FABIO]);
}

#[tokio::test]
async fn test_undo_rewinds_to_previous_shooter() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    request(&mut judge, start(RoundId::Round(1), CLAY_CATEGORY)).await;
    let step = record(&mut judge, true).await;
    assert_eq!(shooter_up(&step), (FABIO, 1));

    let step = match request(&mut judge, ClientMessage::UndoOutcome { id: Some(4) }).await {
        ServerMessage::Rotation { step, .. } => step,
        other => panic!("Expected rotation reply, got {:?}", other),
    };
    assert_eq!(shooter_up(&step), (ELENA, 1));

    // Nothing left to undo
    let reply = request(&mut judge, ClientMessage::UndoOutcome { id: Some(5) }).await;
    assert_eq!(error_code(&reply), "rotation_state_error");
}

#[tokio::test]
async fn test_partial_round_requires_confirmation() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    request(&mut judge, start(RoundId::Semifinal, CLAY_CATEGORY)).await;
    record(&mut judge, true).await;
    record(&mut judge, false).await;
    record(&mut judge, true).await;

    let reply = request(&mut judge, ClientMessage::SaveRound { id: Some(6), confirm: false }).await;
    assert_eq!(error_code(&reply), "rotation_state_error");
    assert!(server.store.is_empty());

    let receipts = match request(&mut judge, ClientMessage::SaveRound { id: Some(7), confirm: true }).await {
        ServerMessage::RoundSaved { receipts, .. } => receipts,
        other => panic!("Expected round_saved reply, got {:?}", other),
    };
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[0].computed.total, 2.0);
    assert_eq!(receipts[1].computed.total, 0.0);
    assert_eq!(server.store.len(), 2);
}

// ============================================================================
// ROTATION ERROR TESTS
// ============================================================================

#[tokio::test]
async fn test_rotation_rejects_round_scored_disciplines() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let reply = request(&mut judge, start(RoundId::Final, GENERIC_CATEGORY)).await;
    assert_eq!(error_code(&reply), "rotation_state_error");
}

#[tokio::test]
async fn test_empty_squad_is_rejected() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let reply = request(
        &mut judge,
        ClientMessage::StartRotation {
            id: Some(1),
            round: RoundId::Final,
            category_id: CLAY_CATEGORY,
            squad_group: 9,
        },
    )
    .await;
    assert_eq!(error_code(&reply), "rotation_state_error");
}

#[tokio::test]
async fn test_outcome_without_rotation_is_rejected() {
    let server = TestServer::start().await;
    let mut judge = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let reply = request(&mut judge, ClientMessage::RecordOutcome { id: Some(1), hit: true }).await;
    assert_eq!(error_code(&reply), "rotation_state_error");
}

#[tokio::test]
async fn test_viewer_cannot_run_rotation() {
    let server = TestServer::start().await;
    let mut viewer = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;

    let reply = request(&mut viewer, start(RoundId::Final, CLAY_CATEGORY)).await;
    assert_eq!(error_code(&reply), "authorization_error");
}
