//! Shared state handed to every connection

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::roster::RosterProvider;
use crate::session::SessionRegistry;
use crate::socket_server::competition_registry::CompetitionRegistry;
use crate::socket_server::gate::ViewerSessionGate;
use crate::store::ScoreStore;
use crate::submission::ScoreSubmissionService;

pub struct ServerContext {
    pub registry: Arc<CompetitionRegistry>,
    pub service: Arc<ScoreSubmissionService>,
    pub sessions: Arc<SessionRegistry>,
    pub gate: ViewerSessionGate,
}

impl ServerContext {
    /// Wire the channel registry in as the submission service's publisher
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn ScoreStore>,
        roster: Arc<dyn RosterProvider>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let registry = Arc::new(CompetitionRegistry::new(config.server.channel_capacity));
        let service = ScoreSubmissionService::new(store, roster, registry.clone())
            .with_persist_timeout(config.submission.persist_timeout());
        let gate = ViewerSessionGate::new(sessions.clone(), config.auth.cookie_name.clone());

        Self {
            registry,
            service: Arc::new(service),
            sessions,
            gate,
        }
    }

    pub fn roster(&self) -> &dyn RosterProvider {
        self.service.roster()
    }
}
