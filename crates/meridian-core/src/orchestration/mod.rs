//! Investigation orchestration.
//!
//! An [`Orchestrator`] runs discovery, then the scheduled specialist batches,
//! then synthesis, and streams [`InvestigationEvent`]s as it goes. The run
//! lives on its own tokio task: dropping the stream does not cancel it.

pub mod error;
pub mod events;
pub mod phase;

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use meridian_state::DataStore;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

pub use error::{OrchestratorError, PhaseError};
pub use events::{AgentSummary, InvestigationEvent};
pub use phase::OrchestrationPhase;

use crate::config::{MeridianConfig, ScheduleConfig};
use crate::domain::{Finding, Investigation, RiskLevel, TaskStatus};
use crate::metrics::METRICS;
use crate::obs;
use crate::reasoning::ReasoningEngine;
use crate::tasks::{
    conclude, names, resolved_entity_id, DiscoveryTask, SynthesisTask, Task, TaskContext,
    TaskEnv, TaskError, TaskRegistry,
};

/// Lazily produced events of one investigation, ending with `stream_end`.
pub type InvestigationStream = ReceiverStream<InvestigationEvent>;

/// Reject schedules that name unknown tasks, repeat a task, or hold an
/// empty batch.
pub fn validate_schedule(
    schedule: &ScheduleConfig,
    registry: &TaskRegistry,
) -> Result<(), OrchestratorError> {
    if schedule.batches.is_empty() {
        return Err(OrchestratorError::InvalidSchedule(
            "schedule has no batches".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for (i, batch) in schedule.batches.iter().enumerate() {
        if batch.is_empty() {
            return Err(OrchestratorError::InvalidSchedule(format!(
                "batch {} is empty",
                i + 1
            )));
        }
        for name in batch {
            if !registry.contains(name) {
                let known: Vec<&str> = registry.names().collect();
                return Err(OrchestratorError::InvalidSchedule(format!(
                    "unknown task '{name}' in batch {} (registered: {})",
                    i + 1,
                    known.join(", ")
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(OrchestratorError::InvalidSchedule(format!(
                    "task '{name}' is scheduled more than once"
                )));
            }
        }
    }
    Ok(())
}

/// Runs investigations against a data store and a reasoning engine.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<MeridianConfig>,
    store: Arc<dyn DataStore>,
    discovery: Arc<dyn Task>,
    registry: TaskRegistry,
    synthesis: Arc<SynthesisTask>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Orchestrator {
    /// Build an orchestrator over `registry`, validating config and schedule.
    pub fn new(
        config: MeridianConfig,
        store: Arc<dyn DataStore>,
        reasoner: Arc<dyn ReasoningEngine>,
        registry: TaskRegistry,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        validate_schedule(&config.schedule, &registry)?;

        let env = TaskEnv::new(Arc::clone(&store), reasoner, &config);
        let synthesis = SynthesisTask::new(
            env.clone(),
            config.weights.clone(),
            config.divergence_threshold,
        );
        Ok(Self {
            discovery: Arc::new(DiscoveryTask::new(env)),
            synthesis: Arc::new(synthesis),
            config: Arc::new(config),
            store,
            registry,
            in_flight: Arc::default(),
        })
    }

    /// Orchestrator with the five built-in specialists.
    pub fn standard(
        config: MeridianConfig,
        store: Arc<dyn DataStore>,
        reasoner: Arc<dyn ReasoningEngine>,
    ) -> Result<Self, OrchestratorError> {
        let env = TaskEnv::new(Arc::clone(&store), Arc::clone(&reasoner), &config);
        let registry = TaskRegistry::standard(&env);
        Self::new(config, store, reasoner, registry)
    }

    /// Replace the discovery step.
    pub fn with_discovery(mut self, discovery: Arc<dyn Task>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn config(&self) -> &MeridianConfig {
        &self.config
    }

    /// Start (or replay) an investigation of `target`.
    ///
    /// A completed `investigation_id` replays its persisted verdict without
    /// running any task. An id with a live run in this orchestrator is
    /// refused. Nothing has been streamed when `Err` is returned.
    pub async fn investigate(
        &self,
        target: &str,
        investigation_id: Option<String>,
    ) -> Result<InvestigationStream, OrchestratorError> {
        let investigation_id = investigation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let claim = self.claim(&investigation_id)?;
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));

        if let Some(existing) = self.load(&investigation_id).await {
            if existing.is_complete() {
                info!(investigation_id = %investigation_id, "replaying completed investigation");
                tokio::spawn(replay(existing, tx));
                return Ok(ReceiverStream::new(rx));
            }
            warn!(
                investigation_id = %investigation_id,
                "investigation was left running; starting it again"
            );
        }

        let record = Investigation::start(&investigation_id, target);
        self.store
            .put(
                &self.config.collections.investigations,
                &investigation_id,
                serde_json::to_value(&record)?,
            )
            .await
            .map_err(OrchestratorError::InitialPersist)?;

        let run = Run {
            orchestrator: self.clone(),
            _claim: claim,
            tx,
        };
        tokio::spawn(run.execute(record).instrument(obs::span(&investigation_id)));
        Ok(ReceiverStream::new(rx))
    }

    fn claim(&self, investigation_id: &str) -> Result<Claim, OrchestratorError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(investigation_id.to_string()) {
            return Err(OrchestratorError::AlreadyRunning(investigation_id.to_string()));
        }
        Ok(Claim {
            investigation_id: investigation_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    async fn load(&self, investigation_id: &str) -> Option<Investigation> {
        let collection = &self.config.collections.investigations;
        match self.store.get(collection, investigation_id).await {
            Ok(Some(doc)) => match serde_json::from_value(doc) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(investigation_id = %investigation_id, error = %err, "ignoring unreadable investigation record");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(investigation_id = %investigation_id, error = %err, "could not look up investigation");
                None
            }
        }
    }
}

async fn replay(record: Investigation, tx: mpsc::Sender<InvestigationEvent>) {
    for event in [
        InvestigationEvent::started(&record),
        InvestigationEvent::completed(&record),
        InvestigationEvent::StreamEnd,
    ] {
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Exclusive hold on an investigation id, released on drop.
struct Claim {
    investigation_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.investigation_id);
    }
}

/// One in-flight investigation. Owns the record until it is finalized.
struct Run {
    orchestrator: Orchestrator,
    /// Declared before `tx` so the id is free once the stream closes.
    _claim: Claim,
    tx: mpsc::Sender<InvestigationEvent>,
}

impl Run {
    async fn emit(&self, event: InvestigationEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("event consumer gone; run continues");
        }
    }

    fn advance(phase: &mut OrchestrationPhase, next: OrchestrationPhase) {
        if let Err(err) = phase.advance(next) {
            warn!(error = %err, "phase transition rejected");
        }
        debug!(phase = %phase, "phase");
    }

    async fn execute(self, mut record: Investigation) {
        use OrchestrationPhase::*;

        let started = tokio::time::Instant::now();
        let config = Arc::clone(&self.orchestrator.config);
        let mut phase = Initialized;

        METRICS.inc_investigations_started();
        obs::emit_investigation_started(&record.investigation_id, &record.target_name);
        self.emit(InvestigationEvent::started(&record)).await;

        Self::advance(&mut phase, DiscoveryRunning);
        let discovery = Arc::clone(&self.orchestrator.discovery);
        let mut found = self
            .run_batch(&record, &[discovery], &TaskContext::default())
            .await;
        let context = TaskContext::for_entity(
            found.first().map(resolved_entity_id).unwrap_or_default(),
        );
        record.target_entity_id = context.entity_id.clone();
        record.findings.append(&mut found);
        Self::advance(&mut phase, DiscoveryDone);

        Self::advance(&mut phase, SpecialistsRunning);
        for (i, batch) in config.schedule.batches.iter().enumerate() {
            if i > 0 {
                debug!(cooldown_ms = config.schedule.cooldown.as_millis() as u64, "batch cooldown");
                tokio::time::sleep(config.schedule.cooldown).await;
            }
            let tasks: Vec<Arc<dyn Task>> = batch
                .iter()
                .filter_map(|name| self.orchestrator.registry.get(name))
                .collect();
            let mut found = self.run_batch(&record, &tasks, &context).await;
            record.findings.append(&mut found);
        }
        Self::advance(&mut phase, SpecialistsDone);

        Self::advance(&mut phase, SynthesisRunning);
        self.emit(InvestigationEvent::agent_started(names::RISK_SYNTHESIS))
            .await;
        let synthesis_task = Arc::clone(&self.orchestrator.synthesis);
        let synthesis = AssertUnwindSafe(
            synthesis_task.synthesize(&record.target_name, &record.findings),
        )
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            synthesis_task.abandon(
                &record.target_name,
                &record.findings,
                TaskError::TaskInternal(panic_message(payload)),
            )
        });
        self.finished(&record.investigation_id, &synthesis.finding)
            .await;
        if let Some(stated) = synthesis.stated_level {
            if stated != synthesis.verdict.risk_level {
                obs::emit_band_mismatch(&record.investigation_id, stated, synthesis.verdict.risk_level);
            }
        }
        if let Err(err) = record.finalize(synthesis.verdict, synthesis.finding) {
            warn!(error = %err, "investigation already finalized");
        }
        Self::advance(&mut phase, Complete);

        self.persist(&record).await;
        let errors = record
            .findings
            .iter()
            .filter(|f| f.status() == TaskStatus::Error)
            .count() as u64;
        obs::emit_investigation_finished(
            &record.investigation_id,
            started.elapsed().as_millis() as u64,
            record.overall_risk_score.unwrap_or_default(),
            record.risk_level.unwrap_or(RiskLevel::Low),
            errors,
        );
        METRICS.flush();

        self.emit(InvestigationEvent::completed(&record)).await;
        self.emit(InvestigationEvent::StreamEnd).await;
    }

    /// Run `tasks` concurrently; findings come back in `tasks` order.
    async fn run_batch(
        &self,
        record: &Investigation,
        tasks: &[Arc<dyn Task>],
        context: &TaskContext,
    ) -> Vec<Finding> {
        for task in tasks {
            self.emit(InvestigationEvent::agent_started(task.name())).await;
        }

        let target = record.target_name.as_str();
        let mut pending: FuturesUnordered<_> = tasks
            .iter()
            .enumerate()
            .map(|(slot, task)| {
                let task = Arc::clone(task);
                async move {
                    let outcome = AssertUnwindSafe(task.execute(target, context))
                        .catch_unwind()
                        .await;
                    let finding = outcome.unwrap_or_else(|payload| {
                        conclude(
                            task.name(),
                            Value::Null,
                            Err(TaskError::TaskInternal(panic_message(payload))),
                        )
                    });
                    (slot, finding)
                }
            })
            .collect();

        let mut slots: Vec<Option<Finding>> = vec![None; tasks.len()];
        while let Some((slot, finding)) = pending.next().await {
            self.finished(&record.investigation_id, &finding).await;
            slots[slot] = Some(finding);
        }
        slots.into_iter().flatten().collect()
    }

    async fn finished(&self, investigation_id: &str, finding: &Finding) {
        if finding.status() == TaskStatus::Error {
            METRICS.inc_task_errors();
        }
        obs::emit_task_finished(
            investigation_id,
            finding.task_name(),
            finding.status(),
            finding.risk_contribution(),
        );
        self.emit(InvestigationEvent::agent_complete(finding)).await;
    }

    async fn persist(&self, record: &Investigation) {
        let document = match serde_json::to_value(record) {
            Ok(document) => document,
            Err(err) => {
                obs::emit_persist_error(&record.investigation_id, &err);
                return;
            }
        };
        if let Err(err) = self
            .orchestrator
            .store
            .put(
                &self.orchestrator.config.collections.investigations,
                &record.investigation_id,
                document,
            )
            .await
        {
            obs::emit_persist_error(&record.investigation_id, &err);
        }
    }
}
