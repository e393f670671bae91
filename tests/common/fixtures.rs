//! Roster and session fixtures
//!
//! Competition 1 is open with a generic, an FBI and a clay category.
//! Competition 2 is closed.

use chrono::{Duration, Utc};

use scoreboard_engine::session::{CurrentUser, Role, SessionRegistry, UserSession};
use scoreboard_engine::{
    CategoryInfo, CompetitionInfo, CompetitionStatus, Discipline, MemoryRoster, Participation,
};

pub const OPEN_COMPETITION: u64 = 1;
pub const CLOSED_COMPETITION: u64 = 2;
pub const UNKNOWN_COMPETITION: u64 = 99;

pub const GENERIC_CATEGORY: u64 = 10;
pub const FBI_CATEGORY: u64 = 11;
pub const CLAY_CATEGORY: u64 = 12;

pub const ANA: u64 = 101;
pub const BRUNO: u64 = 102;
pub const CARLA: u64 = 103;
pub const DIEGO: u64 = 201;
pub const ELENA: u64 = 301;
pub const FABIO: u64 = 302;
pub const GABI: u64 = 401;

pub const JUDGE_TOKEN: &str = "judge-token";
pub const VIEWER_TOKEN: &str = "viewer-token";
pub const EXPIRED_TOKEN: &str = "expired-token";

fn entry(
    participation_id: u64,
    competition_id: u64,
    discipline: Discipline,
    category_id: u64,
    lane: u32,
    display_name: &str,
) -> Participation {
    Participation {
        participation_id,
        competition_id,
        discipline,
        category_id,
        lane,
        squad_group: 1,
        display_name: display_name.to_string(),
        equipment_label: String::new(),
    }
}

/// Roster with every fixture competition and participation
pub fn roster() -> MemoryRoster {
    let roster = MemoryRoster::new();
    roster.add_competition(CompetitionInfo {
        id: OPEN_COMPETITION,
        name: "Copa Apertura".to_string(),
        status: CompetitionStatus::Open,
    });
    roster.add_competition(CompetitionInfo {
        id: CLOSED_COMPETITION,
        name: "Copa Cierre".to_string(),
        status: CompetitionStatus::Closed,
    });

    for (category_id, discipline) in [
        (GENERIC_CATEGORY, Discipline::Generic),
        (FBI_CATEGORY, Discipline::Fbi),
        (CLAY_CATEGORY, Discipline::Clay),
    ] {
        roster
            .add_category(
                OPEN_COMPETITION,
                CategoryInfo {
                    category_id,
                    discipline,
                    cost_info: None,
                },
            )
            .unwrap();
    }
    roster
        .add_category(
            CLOSED_COMPETITION,
            CategoryInfo {
                category_id: GENERIC_CATEGORY,
                discipline: Discipline::Generic,
                cost_info: None,
            },
        )
        .unwrap();

    let open = OPEN_COMPETITION;
    for p in [
        entry(ANA, open, Discipline::Generic, GENERIC_CATEGORY, 1, "Ana Torrez"),
        entry(BRUNO, open, Discipline::Generic, GENERIC_CATEGORY, 2, "Bruno Paz"),
        entry(CARLA, open, Discipline::Generic, GENERIC_CATEGORY, 3, "Carla Ruiz"),
        entry(DIEGO, open, Discipline::Fbi, FBI_CATEGORY, 1, "Diego Sosa"),
        entry(ELENA, open, Discipline::Clay, CLAY_CATEGORY, 1, "Elena Vega"),
        entry(FABIO, open, Discipline::Clay, CLAY_CATEGORY, 2, "Fabio Lima"),
        entry(GABI, CLOSED_COMPETITION, Discipline::Generic, GENERIC_CATEGORY, 1, "Gabi Rios"),
    ] {
        roster.add_participation(p).unwrap();
    }
    roster
}

fn session(token: &str, id: u64, username: &str, roles: Vec<Role>, ttl: Duration) -> UserSession {
    UserSession {
        token: token.to_string(),
        user: CurrentUser {
            id,
            username: username.to_string(),
            roles,
        },
        expires_at: Utc::now() + ttl,
    }
}

/// Registry with a judge, a viewer and an already-expired session
pub fn sessions() -> SessionRegistry {
    let registry = SessionRegistry::new(Duration::minutes(60));
    registry.insert(session(JUDGE_TOKEN, 1, "judge", vec![Role::Judge], Duration::minutes(60)));
    registry.insert(session(VIEWER_TOKEN, 2, "fan", vec![Role::Viewer], Duration::minutes(60)));
    registry.insert(session(EXPIRED_TOKEN, 3, "late", vec![Role::Judge], Duration::minutes(-5)));
    registry
}
