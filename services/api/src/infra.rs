use metrics_exporter_prometheus::PrometheusHandle;
use placement::companies::{
    AuthMode, AuthorizationGate, CompanyWorkflowService, SqliteCompanyRepository,
};
use placement::config::AppConfig;
use placement::error::AppError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

pub(crate) type CompanyService = CompanyWorkflowService<SqliteCompanyRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Opens the configured store and wires it behind the role gate.
pub(crate) fn build_company_service(config: &AppConfig) -> Result<Arc<CompanyService>, AppError> {
    let repository = SqliteCompanyRepository::open(&config.database.path)?;

    if config.auth.mode == AuthMode::Disabled {
        warn!("authorization disabled: company mutations are not token checked");
    }
    let gate = AuthorizationGate::new(config.auth.mode.clone(), config.auth.policy.clone());

    Ok(Arc::new(CompanyWorkflowService::new(
        Arc::new(repository),
        gate,
    )))
}
