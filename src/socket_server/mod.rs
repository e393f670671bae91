//! Scoreboard Socket Server
//!
//! A standalone daemon that fans live scores out to every scoreboard watching a
//! competition and accepts judge actions on the same connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  SCOREBOARD SOCKET SERVER (scoreboard-daemon)           │
//! │                 Single daemon, multi-competition, multi-client          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Handshake ──► ViewerSessionGate (session cookie, close 4401 / 4404)    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              CompetitionRegistry (Arc<RwLock>)                   │   │
//! │  │                                                                  │   │
//! │  │  competition_1 ──► CompetitionChannel {                         │   │
//! │  │                      snapshot cache, next_sequence,             │   │
//! │  │                      event_tx, client_count                     │   │
//! │  │                    }                                            │   │
//! │  │  competition_2 ──► CompetitionChannel { ... }                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                     ▲                                                   │
//! │                     │ publish                                           │
//! │  ScoreSubmissionService ◄── judge actions ◄── ConnectionState           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol
//!
//! Clients connect to `/ws/competencia/<id>/` with the session cookie. All
//! messages are JSON over WebSocket:
//!
//! ```json
//! // Server -> Client, on connect
//! {"type": "connected", "client_id": "cli_1a2b3c4d", "competition": {...}, ...}
//! {"type": "snapshot", "competition_id": 5, "sequence": 12, "events": [...]}
//!
//! // Server -> Client, live
//! {"type": "update", "event": "score", "participation_id": 7, "total": 95.5, ...}
//!
//! // Client -> Server (judges)
//! {"type": "submit_score", "id": 1, "participation_id": 7, "round": "Final",
//!  "score": {"puntaje_total_ronda": 95.5}}
//! {"type": "start_rotation", "id": 2, "round": "Ronda 1", "category_id": 3, "squad_group": 1}
//! {"type": "record_outcome", "id": 3, "hit": true}
//! ```

pub mod competition_registry;
pub mod connection;
pub mod context;
pub mod gate;
pub mod protocol;

pub use competition_registry::{CompetitionChannel, CompetitionRegistry, RegistryStats};
pub use connection::handle_connection;
pub use context::ServerContext;
pub use gate::{Admission, ViewerSessionGate};
pub use protocol::{ClientMessage, ConnectionInfo, ServerMessage};
