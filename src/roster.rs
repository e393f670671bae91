//! Competition master data and approved roster
//!
//! Registration, approval and category setup live in the administrative
//! application. Scoring only reads them through [`RosterProvider`]. The
//! in-memory implementation is filled from a JSON export for the daemon and
//! directly in tests.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};
use crate::schema::{
    CategoryInfo, CompetitionId, CompetitionInfo, CompetitionStatus, Participation,
    ParticipationId,
};

/// Read-only view of competitions, categories and approved participations
pub trait RosterProvider: Send + Sync {
    /// Competitions that are not closed
    fn list_active_competitions(&self) -> Vec<CompetitionInfo>;

    fn competition(&self, id: CompetitionId) -> Option<CompetitionInfo>;

    fn competition_categories(&self, id: CompetitionId) -> Vec<CategoryInfo>;

    fn list_approved_participations(&self, id: CompetitionId) -> Vec<Participation>;

    fn participation(&self, id: ParticipationId) -> Option<Participation>;
}

/// One competition in a roster export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionRoster {
    #[serde(flatten)]
    pub info: CompetitionInfo,
    #[serde(default)]
    pub categories: Vec<CategoryInfo>,
    #[serde(default)]
    pub participations: Vec<Participation>,
}

/// Roster export file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub competitions: Vec<CompetitionRoster>,
}

/// In-memory roster
#[derive(Default)]
pub struct MemoryRoster {
    competitions: RwLock<BTreeMap<CompetitionId, CompetitionRoster>>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: RosterFile) -> Self {
        let roster = Self::new();
        {
            let mut competitions = roster.competitions.write();
            for mut competition in file.competitions {
                let id = competition.info.id;
                for p in &mut competition.participations {
                    p.competition_id = id;
                }
                competitions.insert(id, competition);
            }
        }
        roster
    }

    /// Load a JSON roster export
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: RosterFile = serde_json::from_str(&content).map_err(|e| ScoringError::Config {
            message: format!("Failed to parse roster {}: {}", path.display(), e),
        })?;
        let roster = Self::from_file(file);
        tracing::info!(
            path = %path.display(),
            competitions = roster.competitions.read().len(),
            "Loaded roster"
        );
        Ok(roster)
    }

    pub fn add_competition(&self, info: CompetitionInfo) {
        self.competitions.write().insert(
            info.id,
            CompetitionRoster {
                info,
                categories: Vec::new(),
                participations: Vec::new(),
            },
        );
    }

    pub fn add_category(&self, competition_id: CompetitionId, category: CategoryInfo) -> Result<()> {
        let mut competitions = self.competitions.write();
        let competition = competitions
            .get_mut(&competition_id)
            .ok_or_else(|| not_found(competition_id))?;
        competition.categories.retain(|c| c.category_id != category.category_id);
        competition.categories.push(category);
        Ok(())
    }

    /// Add an approved participation (registration confirmed upstream)
    pub fn add_participation(&self, participation: Participation) -> Result<()> {
        let mut competitions = self.competitions.write();
        let competition = competitions
            .get_mut(&participation.competition_id)
            .ok_or_else(|| not_found(participation.competition_id))?;
        competition
            .participations
            .retain(|p| p.participation_id != participation.participation_id);
        competition.participations.push(participation);
        Ok(())
    }

    pub fn set_status(&self, competition_id: CompetitionId, status: CompetitionStatus) -> Result<()> {
        let mut competitions = self.competitions.write();
        let competition = competitions
            .get_mut(&competition_id)
            .ok_or_else(|| not_found(competition_id))?;
        competition.info.status = status;
        tracing::info!(competition = competition_id, ?status, "Competition status changed");
        Ok(())
    }
}

fn not_found(competition_id: CompetitionId) -> ScoringError {
    ScoringError::NotFound {
        what: format!("competition {}", competition_id),
    }
}

impl RosterProvider for MemoryRoster {
    fn list_active_competitions(&self) -> Vec<CompetitionInfo> {
        self.competitions
            .read()
            .values()
            .filter(|c| c.info.status.accepts_scores())
            .map(|c| c.info.clone())
            .collect()
    }

    fn competition(&self, id: CompetitionId) -> Option<CompetitionInfo> {
        self.competitions.read().get(&id).map(|c| c.info.clone())
    }

    fn competition_categories(&self, id: CompetitionId) -> Vec<CategoryInfo> {
        self.competitions
            .read()
            .get(&id)
            .map(|c| c.categories.clone())
            .unwrap_or_default()
    }

    fn list_approved_participations(&self, id: CompetitionId) -> Vec<Participation> {
        self.competitions
            .read()
            .get(&id)
            .map(|c| c.participations.clone())
            .unwrap_or_default()
    }

    fn participation(&self, id: ParticipationId) -> Option<Participation> {
        self.competitions
            .read()
            .values()
            .flat_map(|c| c.participations.iter())
            .find(|p| p.participation_id == id)
            .cloned()
    }
}
