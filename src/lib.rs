//! Scoreboard Engine: live scoring for shooting competitions
//!
//! Judges submit raw marks per participation and round. Each discipline's
//! ruleset reduces them to a rankable score, the result is persisted and
//! pushed to every scoreboard watching the competition.
//!
//! # Disciplines
//!
//! - Precision pistol, by series
//! - FBI combat course
//! - Metallic silhouette
//! - Running target
//! - Practical (IPSC)
//! - Clay target, shot by shot in a squad rotation
//! - Generic total score
//!
//! # Example
//!
//! ```
//! use scoreboard_engine::{ComputedScore, Discipline, RawMarks, RoundId, ScoreInput};
//!
//! let marks = RawMarks::new().with("puntaje_total_ronda", 95.5).with("xs", 3);
//! let score = ComputedScore::compute(
//!     Discipline::Generic,
//!     &RoundId::Final,
//!     &ScoreInput::Marks(marks),
//! )
//! .unwrap();
//! assert_eq!(score.total, 95.5);
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod discipline;
pub mod error;
pub mod records;
pub mod roster;
pub mod rotation;
pub mod round;
pub mod schema;
pub mod session;
pub mod socket_server;
pub mod standings;
pub mod store;
pub mod submission;
pub mod viewer;

// Re-export commonly used types
pub use cli::{Cli, OutputFormat};
pub use config::EngineConfig;
pub use discipline::{Discipline, FieldKind, FieldSpec, RawMarks, Reduction, TieBreakDetail};
pub use error::{AuthFailure, Result, ScoringError};
pub use records::{RecordBook, RecordEntry};
pub use roster::{MemoryRoster, RosterProvider};
pub use rotation::{RotationStep, SquadRotation};
pub use round::RoundId;
pub use schema::{
    CategoryInfo, ChannelEvent, CompetitionId, CompetitionInfo, CompetitionStatus, ComputedScore,
    Participation, ParticipationId, RawScore, ScoreEvent, ScoreInput,
};
pub use session::{CurrentUser, Role, SessionRegistry, UserSession};
pub use standings::StandingsSnapshot;
pub use store::{FileScoreStore, MemoryScoreStore, ScoreStore};
pub use submission::{Delivery, ScorePublisher, ScoreSubmissionService, SubmissionReceipt, SubmitRequest};
pub use viewer::{ViewerClient, ViewerStatus};
