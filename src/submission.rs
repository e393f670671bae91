//! Score submission service
//!
//! Validates a judge's raw marks (or a disqualification) against the
//! participation's discipline and round, persists the raw record, computes the
//! rankable score and publishes it on the competition channel.
//!
//! Failures before persistence leave nothing behind. A publish failure after
//! persistence is reported in the receipt but never rolls the write back; the
//! next publish or a viewer resync brings standings up to date.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};
use crate::records::RecordBook;
use crate::roster::RosterProvider;
use crate::rotation::SquadRotation;
use crate::round::RoundId;
use crate::schema::{
    ChannelEvent, CompetitionId, ComputedScore, Participation, ParticipationId, RawScore,
    ScoreEvent, ScoreInput,
};
use crate::store::ScoreStore;

/// Default bound on a single persistence call
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Publish side of the live broadcast channel
pub trait ScorePublisher: Send + Sync {
    /// Publish to the competition's channel
    fn publish(&self, event: ChannelEvent) -> Result<Delivery>;
}

/// One judge submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub participation_id: ParticipationId,
    pub round: RoundId,
    pub input: ScoreInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<String>,
    /// Version last read by the judge; a mismatch rejects the write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl SubmitRequest {
    pub fn new(participation_id: ParticipationId, round: RoundId, input: ScoreInput) -> Self {
        Self {
            participation_id,
            round,
            input,
            judge: None,
            expected_version: None,
        }
    }

    pub fn judge(mut self, judge: impl Into<String>) -> Self {
        self.judge = Some(judge.into());
        self
    }

    pub fn expected_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Outcome of publishing an accepted score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Published { sequence: u64 },
    /// Held back by a channel still loading persisted scores; applied once it
    /// goes live
    Queued,
    /// Nobody watches the competition; the next viewer loads it from the store
    Unwatched,
    /// Persisted but not broadcast
    Failed { message: String },
}

impl Delivery {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// What the judge gets back for an accepted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub participation_id: ParticipationId,
    pub round: RoundId,
    pub computed: ComputedScore,
    /// Stored version of the raw record
    pub version: u64,
    pub new_record: bool,
    pub delivery: Delivery,
}

/// A submission that passed every check and is ready to write
struct PreparedScore {
    raw: RawScore,
    participation: Participation,
    computed: ComputedScore,
    expected_version: Option<u64>,
}

pub struct ScoreSubmissionService {
    store: Arc<dyn ScoreStore>,
    roster: Arc<dyn RosterProvider>,
    publisher: Arc<dyn ScorePublisher>,
    records: Arc<RecordBook>,
    persist_timeout: Duration,
}

impl ScoreSubmissionService {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        roster: Arc<dyn RosterProvider>,
        publisher: Arc<dyn ScorePublisher>,
    ) -> Self {
        Self {
            store,
            roster,
            publisher,
            records: Arc::new(RecordBook::new()),
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
        }
    }

    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    pub fn with_records(mut self, records: Arc<RecordBook>) -> Self {
        self.records = records;
        self
    }

    pub fn records(&self) -> &RecordBook {
        &self.records
    }

    pub fn roster(&self) -> &dyn RosterProvider {
        self.roster.as_ref()
    }

    /// Validate, persist, compute and publish one score
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmissionReceipt> {
        let prepared = self.prepare(request).await?;
        self.commit(prepared).await
    }

    /// Every check that can reject a submission, without writing anything
    async fn prepare(&self, request: SubmitRequest) -> Result<PreparedScore> {
        let SubmitRequest {
            participation_id,
            round,
            input,
            judge,
            expected_version,
        } = request;

        let participation = self.admissible_participation(participation_id, &round)?;
        if let ScoreInput::Disqualified { reason } = &input {
            if reason.trim().is_empty() {
                return Err(ScoringError::validation(
                    "reason",
                    "a disqualification requires a reason",
                ));
            }
        }
        let computed = ComputedScore::compute(participation.discipline, &round, &input)?;

        // Marks never overwrite a disqualification; pinning the version read
        // here keeps one that lands before the write from being replaced.
        let mut expected_version = expected_version;
        if !input.is_disqualification() {
            let existing = self
                .persist("read", self.store.get(participation_id, round))
                .await?;
            if existing.as_ref().is_some_and(RawScore::is_disqualified) {
                return Err(ScoringError::validation(
                    "disqualified",
                    format!("{} is disqualified; clear the disqualification first", round),
                ));
            }
            expected_version.get_or_insert(existing.map_or(0, |s| s.version));
        }

        Ok(PreparedScore {
            raw: RawScore::new(participation_id, round, input).recorded_by(judge),
            participation,
            computed,
            expected_version,
        })
    }

    /// Persist, record and publish a prepared score
    async fn commit(&self, prepared: PreparedScore) -> Result<SubmissionReceipt> {
        let PreparedScore {
            raw,
            participation,
            computed,
            expected_version,
        } = prepared;
        let participation_id = raw.participation_id;
        let round = raw.round;

        let stored = self
            .persist("write", self.store.upsert(raw, expected_version))
            .await?;

        let new_record = self.records.consider(&participation, round, &computed);
        let mut event = ScoreEvent::new(&participation, round, &computed);
        event.new_record = new_record;
        let delivery = self.deliver(ChannelEvent::Score(event));

        tracing::info!(
            participation = participation_id,
            round = %round,
            total = computed.total,
            disqualified = computed.disqualified,
            version = stored.version,
            judge = stored.recorded_by.as_deref().unwrap_or("-"),
            "Score accepted"
        );

        Ok(SubmissionReceipt {
            participation_id,
            round,
            computed,
            version: stored.version,
            new_record,
            delivery,
        })
    }

    /// Remove a disqualification record and retract it from standings
    pub async fn clear_disqualification(
        &self,
        participation_id: ParticipationId,
        round: RoundId,
    ) -> Result<Delivery> {
        let participation = self.admissible_participation(participation_id, &round)?;
        let existing = self
            .persist("read", self.store.get(participation_id, round))
            .await?;
        if !existing.is_some_and(|s| s.is_disqualified()) {
            return Err(ScoringError::validation(
                "disqualified",
                format!("no disqualification recorded for {}", round),
            ));
        }

        self.persist("delete", self.store.remove(participation_id, round))
            .await?;
        tracing::info!(participation = participation_id, round = %round, "Disqualification cleared");

        Ok(self.deliver(ChannelEvent::Retracted {
            competition_id: participation.competition_id,
            participation_id,
            round,
            sequence: 0,
        }))
    }

    /// Submit every grid of a rotation
    ///
    /// Nothing is written unless every grid passes validation, and the
    /// rotation only counts as saved once every write succeeded.
    pub async fn save_squad_round(
        &self,
        rotation: &mut SquadRotation,
        confirm: bool,
        judge: Option<String>,
    ) -> Result<Vec<SubmissionReceipt>> {
        let round = rotation.round();
        let payloads = rotation.save_round(confirm)?;

        // Validate the whole squad before the first write
        let mut prepared = Vec::with_capacity(payloads.len());
        for (participation, marks) in payloads {
            let mut request =
                SubmitRequest::new(participation.participation_id, round, ScoreInput::Marks(marks));
            request.judge = judge.clone();
            prepared.push(self.prepare(request).await?);
        }

        let mut receipts = Vec::with_capacity(prepared.len());
        for score in prepared {
            receipts.push(self.commit(score).await?);
        }
        rotation.mark_saved();
        Ok(receipts)
    }

    /// Recompute every stored score of a competition
    ///
    /// Events come back unsequenced, oldest first. Records are refreshed on
    /// the way.
    pub async fn rebuild_standings(&self, competition_id: CompetitionId) -> Result<Vec<ScoreEvent>> {
        let participations = self.roster.list_approved_participations(competition_id);
        let ids: Vec<ParticipationId> = participations.iter().map(|p| p.participation_id).collect();
        let mut scores = self.persist("read", self.store.scores_for(ids)).await?;
        scores.sort_by_key(|s| (s.recorded_at, s.participation_id, s.round));

        let mut events = Vec::with_capacity(scores.len());
        for score in scores {
            let Some(participation) = participations
                .iter()
                .find(|p| p.participation_id == score.participation_id)
            else {
                continue;
            };
            match ComputedScore::compute(participation.discipline, &score.round, &score.input) {
                Ok(computed) => {
                    self.records.consider(participation, score.round, &computed);
                    events.push(ScoreEvent::new(participation, score.round, &computed));
                }
                Err(e) => {
                    tracing::warn!(
                        participation = score.participation_id,
                        round = %score.round,
                        "Skipping stored score that no longer reduces: {}",
                        e
                    );
                }
            }
        }

        tracing::debug!(competition = competition_id, events = events.len(), "Rebuilt standings");
        Ok(events)
    }

    /// Participation whose competition, category and round admit a score
    fn admissible_participation(
        &self,
        participation_id: ParticipationId,
        round: &RoundId,
    ) -> Result<Participation> {
        let participation = self
            .roster
            .participation(participation_id)
            .ok_or_else(|| ScoringError::NotFound {
                what: format!("participation {}", participation_id),
            })?;

        let competition = self
            .roster
            .competition(participation.competition_id)
            .ok_or_else(|| ScoringError::NotFound {
                what: format!("competition {}", participation.competition_id),
            })?;
        if !competition.status.accepts_scores() {
            return Err(ScoringError::validation(
                "competition",
                format!("{} is closed", competition.name),
            ));
        }

        let category = self
            .roster
            .competition_categories(competition.id)
            .into_iter()
            .find(|c| c.category_id == participation.category_id)
            .ok_or_else(|| {
                ScoringError::validation(
                    "category",
                    format!(
                        "category {} is not offered in {}",
                        participation.category_id, competition.name
                    ),
                )
            })?;
        if category.discipline != participation.discipline {
            return Err(ScoringError::validation(
                "discipline",
                format!(
                    "category {} is {}, not {}",
                    category.category_id,
                    category.discipline.label(),
                    participation.discipline.label()
                ),
            ));
        }

        if !participation.discipline.accepts_round(round) {
            return Err(ScoringError::validation(
                "round",
                format!("{} is not a round of {}", round, participation.discipline.label()),
            ));
        }

        Ok(participation)
    }

    /// Run a store call under the persistence timeout
    async fn persist<T>(&self, op: &str, call: BoxFuture<'_, Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.persist_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ (ScoringError::Io(_) | ScoringError::Json(_)))) => {
                tracing::error!("Score store {} failed: {}", op, e);
                Err(ScoringError::connectivity(format!("score store {} failed: {}", op, e)))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::error!("Score store {} timed out after {:?}", op, self.persist_timeout);
                Err(ScoringError::connectivity(format!(
                    "score store {} timed out after {} ms",
                    op,
                    self.persist_timeout.as_millis()
                )))
            }
        }
    }

    fn deliver(&self, event: ChannelEvent) -> Delivery {
        match self.publisher.publish(event) {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::warn!("Score persisted but not published: {}", e);
                Delivery::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}
