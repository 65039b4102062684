//! # Dashboard Session
//!
//! Per-user session context: authentication state, the organisation
//! directory and the current organisation selection. UI callbacks go through
//! this type; it forwards queries to the [`QueryOrchestrator`].
//!
//! While unauthenticated the organisation selection resolves to no ids, so
//! every query is served from the placeholder dataset.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{HeatmapTable, ResultRow};
use crate::config::DashboardConfig;
use crate::dispatch::TaskDispatcher;
use crate::error::{DashboardError, DashboardResult};
use crate::orchestration::QueryOrchestrator;
use crate::platform::{Authenticator, DirectorySummary, ExecutionPlatform, OrganisationDirectory};

#[derive(Debug, Default)]
struct SessionState {
    username: Option<String>,
    directory: Option<OrganisationDirectory>,
    authenticated_at: Option<DateTime<Utc>>,
    selected_names: Vec<String>,
    selected_ids: Vec<i64>,
}

impl SessionState {
    fn refresh_selection(&mut self) {
        self.selected_ids = match &self.directory {
            Some(directory) => directory.ids_for_names(&self.selected_names),
            None => Vec::new(),
        };
    }
}

#[derive(Debug)]
pub struct DashboardSession {
    id: Uuid,
    orchestrator: QueryOrchestrator,
    authenticator: Arc<dyn Authenticator>,
    state: RwLock<SessionState>,
}

impl DashboardSession {
    pub fn new(
        config: &DashboardConfig,
        platform: Arc<dyn ExecutionPlatform>,
        authenticator: Arc<dyn Authenticator>,
    ) -> DashboardResult<Self> {
        config.validate()?;
        let dispatcher = TaskDispatcher::new(platform, config);
        Ok(Self::with_orchestrator(
            QueryOrchestrator::new(config, dispatcher),
            authenticator,
        ))
    }

    pub fn with_orchestrator(
        orchestrator: QueryOrchestrator,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            orchestrator,
            authenticator,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Authenticate and load the organisation directory
    ///
    /// A failed login leaves the session unauthenticated.
    pub async fn login(&self, username: &str, password: &str) -> DashboardResult<DirectorySummary> {
        match self.authenticator.login(username, password).await {
            Ok(directory) => {
                let summary = directory.summary();
                let mut state = self.state.write();
                state.username = Some(username.to_string());
                state.directory = Some(directory);
                state.authenticated_at = Some(Utc::now());
                state.refresh_selection();
                info!(
                    session_id = %self.id,
                    username = %username,
                    institutions = summary.institutions,
                    countries = summary.countries,
                    "Session authenticated"
                );
                Ok(summary)
            }
            Err(error) => {
                let mut state = self.state.write();
                state.username = None;
                state.directory = None;
                state.authenticated_at = None;
                state.refresh_selection();
                warn!(session_id = %self.id, username = %username, error = %error, "Login failed");
                Err(DashboardError::from(error))
            }
        }
    }

    pub fn logout(&self) {
        let mut state = self.state.write();
        state.username = None;
        state.directory = None;
        state.authenticated_at = None;
        state.refresh_selection();
        info!(session_id = %self.id, "Session logged out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().directory.is_some()
    }

    pub fn username(&self) -> Option<String> {
        self.state.read().username.clone()
    }

    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().authenticated_at
    }

    /// Record the organisations picked in the UI
    ///
    /// Names are translated to ids only while authenticated; the selection is
    /// kept and re-applied on the next login.
    pub fn select_organisations<S: AsRef<str>>(&self, names: &[S]) -> Vec<i64> {
        let mut state = self.state.write();
        state.selected_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        state.refresh_selection();
        state.selected_ids.clone()
    }

    pub fn organisation_ids(&self) -> Vec<i64> {
        self.state.read().selected_ids.clone()
    }

    /// Names offered for selection, empty before login
    pub fn organisation_names(&self) -> Vec<String> {
        self.state
            .read()
            .directory
            .as_ref()
            .map(|d| d.organisations().iter().map(|o| o.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn directory_summary(&self) -> Option<DirectorySummary> {
        self.state.read().directory.as_ref().map(|d| d.summary())
    }

    /// Category counts of `variable` for the current selection
    pub async fn counts(&self, variable: &str) -> DashboardResult<Vec<ResultRow>> {
        let organisation_ids = self.organisation_ids();
        self.orchestrator
            .resolve_variable(variable, &organisation_ids)
            .await
    }

    /// Correlation heatmap of `region` for the current selection
    pub async fn heatmap(&self, region: &str) -> DashboardResult<HeatmapTable> {
        let organisation_ids = self.organisation_ids();
        self.orchestrator
            .resolve_heatmap(region, &organisation_ids)
            .await
    }

    pub fn orchestrator(&self) -> &QueryOrchestrator {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedPlatform, StaticAuthenticator};

    fn session() -> DashboardSession {
        DashboardSession::new(
            &DashboardConfig::default(),
            Arc::new(ScriptedPlatform::new()),
            Arc::new(StaticAuthenticator::with_default_directory("analyst", "secret")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_selection_is_empty_until_login() {
        let session = session();
        assert!(session.select_organisations(&["Montreal", "Toronto"]).is_empty());
        assert!(session.directory_summary().is_none());

        session.login("analyst", "secret").await.unwrap();
        assert!(session.is_authenticated());
        assert!(session.authenticated_at().is_some());
        assert_eq!(session.organisation_ids().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_session_unauthenticated() {
        let session = session();
        let error = session.login("analyst", "wrong").await.unwrap_err();

        assert!(matches!(error, DashboardError::Authentication(_)));
        assert!(!session.is_authenticated());
        assert!(session.organisation_names().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_ids_but_keeps_selection() {
        let session = session();
        session.login("analyst", "secret").await.unwrap();
        session.select_organisations(&["HN1_Maastro"]);
        assert_eq!(session.organisation_ids().len(), 1);

        session.logout();
        assert!(session.organisation_ids().is_empty());

        session.login("analyst", "secret").await.unwrap();
        assert_eq!(session.organisation_ids().len(), 1);
    }
}
