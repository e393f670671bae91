//! Tests for the viewer channel
//!
//! - Handshake gate: session cookie, unknown competition, unroutable paths
//! - Snapshot on connect, seeded from persisted scores
//! - Channel lifecycle when viewers come and go

use tokio_tungstenite::connect_async;

use scoreboard_engine::socket_server::protocol::ServerMessage;
use scoreboard_engine::submission::SubmitRequest;
use scoreboard_engine::socket_server::ClientMessage;
use scoreboard_engine::{
    AuthFailure, Delivery, RawMarks, RoundId, ScoreInput, ScoringError, ViewerClient,
    ViewerStatus,
};

use crate::common::*;

fn generic(total: f64) -> ScoreInput {
    ScoreInput::Marks(RawMarks::new().with("puntaje_total_ronda", total))
}

// ============================================================================
// HANDSHAKE GATE TESTS
// ============================================================================

#[tokio::test]
async fn test_connect_sends_connected_then_snapshot() {
    let server = TestServer::start().await;
    let mut client = server.client(VIEWER_TOKEN);

    let info = client.select_competition(OPEN_COMPETITION).await.unwrap();
    assert_eq!(info.competition.name, "Copa Apertura");
    assert_eq!(info.username, "fan");
    assert!(info.client_id.starts_with("cli_"));
    assert_eq!(client.status(), &ViewerStatus::Connected);

    match next_message(&mut client).await {
        ServerMessage::Snapshot {
            competition_id,
            events,
            ..
        } => {
            assert_eq!(competition_id, OPEN_COMPETITION);
            assert!(events.is_empty());
        }
        other => panic!("Expected snapshot, got {:?}", other),
    }
    assert!(client.standings().render().contains("Waiting for data"));
}

#[tokio::test]
async fn test_missing_session_closes_unauthorized() {
    let server = TestServer::start().await;
    let mut client = ViewerClient::new(server.url());

    let err = client.select_competition(OPEN_COMPETITION).await.unwrap_err();
    assert!(matches!(
        err,
        ScoringError::Authorization {
            reason: AuthFailure::MissingSession
        }
    ));
    assert!(matches!(client.status(), ViewerStatus::NotAuthenticated { .. }));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_expired_session_closes_unauthorized() {
    let server = TestServer::start().await;
    let mut client = server.client(EXPIRED_TOKEN);

    let err = client.select_competition(OPEN_COMPETITION).await.unwrap_err();
    assert!(matches!(
        err,
        ScoringError::Authorization {
            reason: AuthFailure::SessionExpired
        }
    ));
    assert_eq!(
        client.status(),
        &ViewerStatus::NotAuthenticated {
            reason: "session expired".to_string()
        }
    );
}

#[tokio::test]
async fn test_unknown_session_closes_unauthorized() {
    let server = TestServer::start().await;
    let mut client = server.client("forged-token");

    let err = client.select_competition(OPEN_COMPETITION).await.unwrap_err();
    assert!(matches!(
        err,
        ScoringError::Authorization {
            reason: AuthFailure::UnknownSession
        }
    ));
}

#[tokio::test]
async fn test_unknown_competition_closes_not_found() {
    let server = TestServer::start().await;
    let mut client = server.client(VIEWER_TOKEN);

    let err = client.select_competition(UNKNOWN_COMPETITION).await.unwrap_err();
    assert!(matches!(err, ScoringError::NotFound { .. }));
    assert_eq!(client.status(), &ViewerStatus::UnknownCompetition);
    assert!(server.ctx.registry.get(UNKNOWN_COMPETITION).is_none());
}

#[tokio::test]
async fn test_unroutable_path_is_rejected() {
    let server = TestServer::start().await;
    let result = connect_async(format!("{}/ws/other/1/", server.url())).await;
    assert!(result.is_err());
}

// ============================================================================
// SNAPSHOT TESTS
// ============================================================================

#[tokio::test]
async fn test_snapshot_is_seeded_from_store() {
    let server = TestServer::start().await;

    // No viewer yet: persisted but not published
    let receipt = server
        .ctx
        .service
        .submit(SubmitRequest::new(ANA, RoundId::Final, generic(93.0)))
        .await
        .unwrap();
    assert_eq!(receipt.delivery, Delivery::Unwatched);
    assert!(server.ctx.registry.get(OPEN_COMPETITION).is_none());

    let mut client = server.client(VIEWER_TOKEN);
    client.select_competition(OPEN_COMPETITION).await.unwrap();
    match next_message(&mut client).await {
        ServerMessage::Snapshot { sequence, events, .. } => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].participation_id, ANA);
            assert_eq!(events[0].total, 93.0);
            assert_eq!(events[0].sequence, 1);
            assert_eq!(sequence, 1);
        }
        other => panic!("Expected snapshot, got {:?}", other),
    }
    assert_eq!(client.standings().len(), 1);
}

#[tokio::test]
async fn test_score_accepted_while_channel_loads_reaches_viewers() {
    let server = TestServer::start().await;

    // First viewer registered the channel and is rebuilding from the store
    let (channel, created) = server.ctx.registry.attach(OPEN_COMPETITION);
    assert!(created);
    let rebuilt = server.ctx.service.rebuild_standings(OPEN_COMPETITION).await.unwrap();
    assert!(rebuilt.is_empty());

    let receipt = server
        .ctx
        .service
        .submit(SubmitRequest::new(ANA, RoundId::Final, generic(95.0)))
        .await
        .unwrap();
    assert_eq!(receipt.delivery, Delivery::Queued);

    channel.seed(rebuilt);
    let (events, _) = channel.snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].total, 95.0);

    // A later viewer joins the loaded channel and sees the score
    let mut client = server.client(VIEWER_TOKEN);
    client.select_competition(OPEN_COMPETITION).await.unwrap();
    match next_message(&mut client).await {
        ServerMessage::Snapshot { events, .. } => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].participation_id, ANA);
        }
        other => panic!("Expected snapshot, got {:?}", other),
    }
    server.ctx.registry.detach(&channel);
}

#[tokio::test]
async fn test_closed_competition_is_still_viewable() {
    let server = TestServer::start().await;
    let mut client = server.client(VIEWER_TOKEN);
    let info = client.select_competition(CLOSED_COMPETITION).await.unwrap();
    assert_eq!(info.competition.name, "Copa Cierre");
}

// ============================================================================
// CHANNEL LIFECYCLE TESTS
// ============================================================================

#[tokio::test]
async fn test_last_viewer_leaving_evicts_channel() {
    let server = TestServer::start().await;
    let mut first = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;
    let mut second = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    let stats = server.ctx.registry.stats();
    assert_eq!(stats.channel_count, 1);
    assert_eq!(stats.total_clients, 2);

    first.disconnect().await;
    assert!(server.ctx.registry.get(OPEN_COMPETITION).is_some());

    second.disconnect().await;
    assert!(server.wait_for_eviction(OPEN_COMPETITION).await);
}

#[tokio::test]
async fn test_switching_competition_leaves_previous_channel() {
    let server = TestServer::start().await;
    let mut client = server.connected(VIEWER_TOKEN, OPEN_COMPETITION).await;

    client.select_competition(CLOSED_COMPETITION).await.unwrap();
    assert_eq!(client.competition_id(), Some(CLOSED_COMPETITION));
    assert!(server.wait_for_eviction(OPEN_COMPETITION).await);
    assert!(server.ctx.registry.get(CLOSED_COMPETITION).is_some());
}

#[tokio::test]
async fn test_resync_returns_current_snapshot() {
    let server = TestServer::start().await;
    let mut client = server.connected(JUDGE_TOKEN, OPEN_COMPETITION).await;

    server
        .ctx
        .service
        .submit(SubmitRequest::new(BRUNO, RoundId::Round(1), generic(88.0)))
        .await
        .unwrap();
    next_score(&mut client).await;

    client
        .send(&ClientMessage::Resync)
        .await
        .unwrap();
    loop {
        if let ServerMessage::Snapshot { events, sequence, .. } = next_message(&mut client).await {
            assert_eq!(events.len(), 1);
            assert_eq!(sequence, 1);
            break;
        }
    }
}
