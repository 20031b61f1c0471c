//! Wiring of capture, assembly and persistence around a unit of work.

use crate::assembler::{AuditRecordAssembler, RecordContext};
use crate::outbox::Outbox;
use crate::Result;
use auditlog_capture::{CaptureOutcome, ChangeCaptureEngine, EntityWrite, UnitOfWork};
use auditlog_common_config::{AuditLogConfig, ConfigLoader, ConfigStore};
use auditlog_common_log::spans::{flush_span, record_error, unit_of_work_span};
use auditlog_metadata::{MetadataCatalog, TypeGraphResolver};
use auditlog_store::{open_store, AuditRecordStore};
use auditlog_strategy::StrategyResolver;
use auditlog_types::{AuditActor, AuditRecord};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Version written into every record.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Write-interception hooks a persistence layer calls.
pub trait LifecycleHooks: Send + Sync {
    /// Called for every create, update and delete before the host commits.
    fn before_commit(&self, uow: &UnitOfWork, write: EntityWrite) -> Option<CaptureOutcome>;

    /// Called once the host transaction has finished.
    fn after_commit(&self, uow: &UnitOfWork, success: bool) -> FlushReport;
}

/// Result of flushing one unit of work.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Record trees written, with ids assigned.
    pub saved: Vec<AuditRecord>,
    /// Trees queued in the outbox after a failed write. The trees of one
    /// unit of work are written together, so this is either zero or all
    /// of them.
    pub deferred: usize,
}

impl FlushReport {
    /// Number of records written across all trees.
    pub fn records_saved(&self) -> usize {
        self.saved.iter().map(AuditRecord::tree_size).sum()
    }
}

/// The audit engine.
#[derive(Clone)]
pub struct AuditEngine {
    capture: ChangeCaptureEngine,
    assembler: AuditRecordAssembler,
    store: Arc<dyn AuditRecordStore>,
    outbox: Arc<Outbox>,
}

impl AuditEngine {
    /// Create an engine over an existing strategy resolver and store.
    pub fn new(
        strategy: StrategyResolver,
        store: Arc<dyn AuditRecordStore>,
        config: &AuditLogConfig,
    ) -> Self {
        Self {
            capture: ChangeCaptureEngine::new(strategy.clone(), &config.capture),
            assembler: AuditRecordAssembler::new(strategy),
            store,
            outbox: Arc::new(Outbox::new(config.store.outbox_capacity)),
        }
    }

    /// Build every component from configuration.
    pub fn from_config(
        config: &AuditLogConfig,
        config_store: Arc<dyn ConfigStore>,
        catalog: Arc<dyn MetadataCatalog>,
    ) -> Result<Self> {
        let types = Arc::new(TypeGraphResolver::new(catalog));
        let strategy = StrategyResolver::new(config_store, types, config.keys.clone());
        let store = open_store(&config.store)?;
        info!(backend = ?config.store.backend, "audit engine ready");
        Ok(Self::new(strategy, store, config))
    }

    /// Load `.auditlog/config.yaml` under `project_dir` and build the engine.
    pub fn from_project_dir(
        project_dir: impl AsRef<Path>,
        config_store: Arc<dyn ConfigStore>,
        catalog: Arc<dyn MetadataCatalog>,
    ) -> Result<Self> {
        let config = ConfigLoader::new(project_dir).load()?;
        Self::from_config(&config, config_store, catalog)
    }

    pub fn strategy(&self) -> &StrategyResolver {
        self.capture.strategy()
    }

    pub fn store(&self) -> &Arc<dyn AuditRecordStore> {
        &self.store
    }

    /// Number of record trees awaiting a retry.
    pub fn pending(&self) -> usize {
        self.outbox.trees()
    }

    /// Open a unit of work for `actor`.
    pub fn begin(&self, actor: AuditActor) -> UnitOfWork {
        let uow = UnitOfWork::new(actor);
        debug!(unit_of_work = %uow.id(), actor = %uow.actor().identifier(), "unit of work started");
        uow
    }

    /// Run `work` inside a unit of work and flush when it returns `Ok`.
    ///
    /// An `Err` from `work` discards everything it staged.
    pub fn run<T, E>(
        &self,
        actor: AuditActor,
        work: impl FnOnce(&UnitOfWork) -> std::result::Result<T, E>,
    ) -> std::result::Result<(T, FlushReport), E> {
        let uow = self.begin(actor);
        match work(&uow) {
            Ok(value) => Ok((value, self.after_commit(&uow, true))),
            Err(e) => {
                self.after_commit(&uow, false);
                Err(e)
            }
        }
    }

    /// Write queued batches again. Returns how many trees were stored.
    pub fn retry_pending(&self) -> usize {
        let queued = self.outbox.take_all();
        if queued.is_empty() {
            return 0;
        }
        let total: usize = queued.iter().map(Vec::len).sum();
        let stored: usize = queued
            .into_iter()
            .filter_map(|batch| self.persist(batch))
            .map(|saved| saved.len())
            .sum();
        info!(stored, requeued = total - stored, "audit outbox retried");
        stored
    }

    /// Write every tree of `batch` in one store call, queueing the whole
    /// batch on failure.
    fn persist(&self, batch: Vec<AuditRecord>) -> Option<Vec<AuditRecord>> {
        let records = batch.iter().map(AuditRecord::tree_size).sum();
        let span = flush_span(batch.len(), records);
        let _entered = span.enter();
        match self.store.save_all(batch.clone()) {
            Ok(saved) => Some(saved),
            Err(e) => {
                record_error(&e);
                error!(
                    trees = batch.len(),
                    error = %e,
                    "failed to persist audit records; queued for retry"
                );
                self.outbox.push(batch);
                None
            }
        }
    }
}

impl LifecycleHooks for AuditEngine {
    fn before_commit(&self, uow: &UnitOfWork, write: EntityWrite) -> Option<CaptureOutcome> {
        self.capture.before_commit(uow, write)
    }

    fn after_commit(&self, uow: &UnitOfWork, success: bool) -> FlushReport {
        let span = unit_of_work_span(&uow.id().to_string(), &uow.actor().identifier());
        let _entered = span.enter();

        let staged = uow.drain();
        if !success {
            debug!(discarded = staged.candidates.len(), "host transaction failed; audit changes discarded");
            return FlushReport::default();
        }

        let context = RecordContext {
            actor: uow.actor().clone(),
            timestamp: uow.started_at(),
            tool_version: TOOL_VERSION.to_string(),
        };
        let roots = self.assembler.assemble(staged, &context);
        if roots.is_empty() {
            return FlushReport::default();
        }

        let trees = roots.len();
        let report = match self.persist(roots) {
            Some(saved) => FlushReport { saved, deferred: 0 },
            None => FlushReport {
                saved: Vec::new(),
                deferred: trees,
            },
        };
        if !report.saved.is_empty() {
            debug!(records = report.records_saved(), "audit records flushed");
        }
        report
    }
}
