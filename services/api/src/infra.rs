use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use renay::compliance::{
    Clock, ComplianceService, MemoryBlobStore, MemoryComplianceRepository, SystemClock, UrlSigner,
};
use renay::config::{ComplianceConfig, StorageConfig};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type MemoryComplianceService =
    ComplianceService<MemoryComplianceRepository, MemoryBlobStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) blobs: Arc<MemoryBlobStore>,
}

/// In-memory repository and blob store wired into a service sharing one clock.
pub(crate) struct InMemoryStack {
    pub(crate) service: Arc<MemoryComplianceService>,
    pub(crate) repository: Arc<MemoryComplianceRepository>,
    pub(crate) blobs: Arc<MemoryBlobStore>,
}

impl InMemoryStack {
    pub(crate) fn new(compliance: ComplianceConfig, storage: &StorageConfig) -> Self {
        Self::with_clock(compliance, storage, Arc::new(SystemClock))
    }

    pub(crate) fn with_clock(
        compliance: ComplianceConfig,
        storage: &StorageConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let signer = UrlSigner::new(storage.base_url.clone(), &storage.signing_secret);
        let blobs = Arc::new(MemoryBlobStore::with_clock(signer, clock.clone()));
        let repository = Arc::new(MemoryComplianceRepository::default());
        let service = Arc::new(ComplianceService::with_clock(
            repository.clone(),
            blobs.clone(),
            compliance,
            storage,
            clock,
        ));

        Self {
            service,
            repository,
            blobs,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
