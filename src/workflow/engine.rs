use super::machine::{Machine, SessionState, Transition};
use crate::config::Config;
use crate::constraint::{cross_domain_constraints, session_constraints, Constraint, ConstraintSet};
use crate::domain::Domain;
use crate::error::{ErrorSeverity, StoreError, WorkflowError};
use crate::memory::{
    semantic_all, DurableStore, JsonlStore, MemoryRecord, SnapshotCache, StoredRecord,
};
use crate::plan::{MergeStrategy, UnifiedPlan};
use crate::proposal::ProposalValidator;
use crate::reasoning::{build_adapters, ReasoningAdapter};
use crate::resolver::Resolver;
use crate::runner::retry::retry_with_backoff;
use crate::runner::FanOut;
use crate::safety::{CheckOutcome, SafetyValidator};
use crate::state::{SharedState, UserData};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Notified once per domain after a plan is committed
pub trait PlanObserver: Send + Sync {
    fn on_plan_committed(&self, domain: Domain, record: &MemoryRecord);
}

/// What `get_result` reports for a submitted session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionResult {
    Pending,
    Committed(UnifiedPlan),
    FailedSafe { plan: UnifiedPlan, reason: String },
}

/// Terminal result of one session run
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub state: SessionState,
    pub plan: UnifiedPlan,
    pub reason: Option<String>,
    pub safety: Vec<CheckOutcome>,
    pub trail: Vec<Transition>,
}

impl SessionOutcome {
    pub fn result(&self) -> SessionResult {
        match (&self.state, &self.reason) {
            (SessionState::Committed, _) => SessionResult::Committed(self.plan.clone()),
            (_, reason) => SessionResult::FailedSafe {
                plan: self.plan.clone(),
                reason: reason.clone().unwrap_or_default(),
            },
        }
    }
}

/// Drives planning sessions from user data to a committed or fail-safe plan
pub struct Engine {
    config: Config,
    fanout: FanOut,
    validator: ProposalValidator,
    resolver: Resolver,
    safety: SafetyValidator,
    store: Arc<dyn DurableStore>,
    cache: SnapshotCache,
    standing: ConstraintSet,
    observers: Vec<Arc<dyn PlanObserver>>,
    results: Mutex<HashMap<Uuid, SessionResult>>,
}

impl Engine {
    pub fn new(
        config: Config,
        adapters: BTreeMap<Domain, Arc<ReasoningAdapter>>,
        resolver: Resolver,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            fanout: FanOut::new(&config, adapters),
            validator: ProposalValidator::new(config.fallback_confidence),
            safety: SafetyValidator::new(&config.safety),
            resolver,
            store,
            cache: SnapshotCache::new(),
            standing: ConstraintSet::new(),
            observers: Vec::new(),
            results: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Providers, resolver and store all taken from config
    pub fn from_config(config: Config) -> Self {
        let adapters = build_adapters(&config);
        let resolver = Resolver::from_config(&config);
        let store = Arc::new(JsonlStore::new(config.store.dir.clone()));
        Self::new(config, adapters, resolver, store)
    }

    /// Standing constraint applied to every later session
    #[allow(dead_code)]
    pub fn register(&mut self, constraint: Constraint) {
        self.standing.register(constraint);
    }

    #[allow(dead_code)]
    pub fn observe(&mut self, observer: Arc<dyn PlanObserver>) {
        self.observers.push(observer);
    }

    /// Start a session in the background and hand back its id
    #[allow(dead_code)]
    pub fn submit(self: &Arc<Self>, data: UserData) -> Uuid {
        let session_id = Uuid::new_v4();
        self.set_result(session_id, SessionResult::Pending);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_session(session_id, data).await;
        });
        session_id
    }

    /// Pending while a submitted session runs. A finished result is handed
    /// out of memory once; later reads rebuild it from the durable store.
    #[allow(dead_code)]
    pub async fn get_result(&self, session_id: Uuid) -> Result<SessionResult, WorkflowError> {
        {
            let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
            match results.remove(&session_id) {
                Some(SessionResult::Pending) => {
                    results.insert(session_id, SessionResult::Pending);
                    return Ok(SessionResult::Pending);
                }
                Some(done) => return Ok(done),
                None => {}
            }
        }

        let records = self.store.read_session(session_id).await?;
        stored_result(&records)
            .ok_or_else(|| WorkflowError::UnknownSession(session_id.to_string()))
    }

    /// Latest snapshot of a session: working cache first, durable store on a miss
    #[allow(dead_code)]
    pub async fn snapshot(&self, session_id: Uuid) -> Result<Option<SharedState>, StoreError> {
        if let Some(cached) = self.cache.get(session_id) {
            return Ok(Some((*cached).clone()));
        }
        let records = self.store.read_session(session_id).await?;
        Ok(records.into_iter().rev().find_map(|r| match r {
            StoredRecord::Snapshot(s) => Some(s),
            _ => None,
        }))
    }

    /// Run one session to a terminal state. Never returns a partial plan.
    pub async fn run_session(&self, session_id: Uuid, data: UserData) -> SessionOutcome {
        let mut machine = Machine::new(session_id);

        let outcome = match self.drive(&mut machine, session_id, data).await {
            Ok((plan, safety)) => SessionOutcome {
                session_id,
                state: machine.state(),
                plan,
                reason: None,
                safety,
                trail: machine.trail().to_vec(),
            },
            Err(e) => {
                error!(
                    "Session {} cannot be personalized ({}): {}",
                    session_id,
                    e.severity(),
                    e
                );
                let reason = e.to_string();
                let plan = UnifiedPlan::fail_safe(session_id, reason.clone());
                self.fail_safe(&mut machine, &plan, &reason).await;

                SessionOutcome {
                    session_id,
                    state: machine.state(),
                    plan,
                    reason: Some(reason),
                    safety: Vec::new(),
                    trail: machine.trail().to_vec(),
                }
            }
        };

        info!(
            "Session {} finished in {} ({})",
            session_id,
            outcome.state,
            outcome.plan.short_fingerprint()
        );
        self.cache.evict(session_id);
        self.complete(session_id, outcome.result());
        outcome
    }

    async fn drive(
        &self,
        machine: &mut Machine,
        session_id: Uuid,
        data: UserData,
    ) -> Result<(UnifiedPlan, Vec<CheckOutcome>), WorkflowError> {
        let mut constraints =
            session_constraints(&data.user_profile, &data.recent_data, &self.config.safety);
        constraints.extend(self.standing.iter().cloned());

        let history = match semantic_all(&*self.store).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Learning history unavailable, proposing without it: {}", e);
                BTreeMap::new()
            }
        };
        let snapshot = SharedState::open(session_id, data, constraints).with_history(history);
        self.record_snapshot(&snapshot).await?;

        let mut report = self.fanout.run(&snapshot).await;
        self.advance(
            machine,
            SessionState::FannedOut,
            format!(
                "all four slots filled in {:?} ({} cancelled at deadline)",
                report.duration,
                report.cancelled.len()
            ),
        )
        .await?;

        let proposals = self.validator.admit_all(|d| report.take(d));
        let substituted = proposals.substituted_domains();
        self.advance(
            machine,
            SessionState::Validated,
            if substituted.is_empty() {
                "every proposal admitted".to_string()
            } else {
                format!("fallback substituted for {:?}", substituted)
            },
        )
        .await?;

        let snapshot = snapshot.with_constraints(cross_domain_constraints(&proposals));
        self.record_snapshot(&snapshot).await?;

        let plan = self
            .resolver
            .resolve(session_id, &proposals, &snapshot.constraints)
            .await?;
        self.advance(
            machine,
            SessionState::Resolved,
            format!(
                "{} merge with {} trade-offs",
                plan.strategy,
                plan.trade_offs.len()
            ),
        )
        .await?;

        let checked = self.safety.validate(&plan, &snapshot.constraints)?;
        self.advance(
            machine,
            SessionState::SafetyChecked,
            format!("{} safety corrections applied", checked.corrections()),
        )
        .await?;

        let plan = checked.plan;
        let records: Vec<MemoryRecord> = Domain::ALL
            .iter()
            .map(|&d| MemoryRecord::from_plan(&plan, &proposals, d))
            .collect();

        // Plan and memory are durable before the session counts as committed
        self.persist(session_id, StoredRecord::Plan(plan.clone()))
            .await?;
        for record in &records {
            self.persist(session_id, StoredRecord::Memory(record.clone()))
                .await?;
        }

        self.advance(
            machine,
            SessionState::Committed,
            format!(
                "plan {} committed at confidence {:.2}",
                plan.short_fingerprint(),
                plan.confidence
            ),
        )
        .await?;

        for record in &records {
            for observer in &self.observers {
                observer.on_plan_committed(record.domain, record);
            }
        }

        Ok((plan, checked.outcomes))
    }

    /// Emit the static plan; store failures here can only be logged
    async fn fail_safe(&self, machine: &mut Machine, plan: &UnifiedPlan, reason: &str) {
        match machine.advance(SessionState::FailedSafe, reason) {
            Ok(transition) => {
                if let Err(e) = self
                    .persist(transition.session_id, StoredRecord::Transition(transition))
                    .await
                {
                    error!("Could not record FAILED_SAFE transition: {}", e);
                }
            }
            Err(e) => error!("{}", e),
        }

        if let Err(e) = self
            .persist(plan.session_id, StoredRecord::Plan(plan.clone()))
            .await
        {
            error!("Could not record fail-safe plan: {}", e);
        }
    }

    async fn advance(
        &self,
        machine: &mut Machine,
        to: SessionState,
        trigger: String,
    ) -> Result<(), WorkflowError> {
        let transition = machine.advance(to, trigger)?;
        let session_id = transition.session_id;
        match self
            .persist(session_id, StoredRecord::Transition(transition))
            .await
        {
            Ok(()) => Ok(()),
            // The plan is already durable once the session reaches COMMITTED
            Err(e) if to == SessionState::Committed => {
                warn!("Could not record COMMITTED transition: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record_snapshot(&self, snapshot: &SharedState) -> Result<(), WorkflowError> {
        self.persist(snapshot.session_id, StoredRecord::Snapshot(snapshot.clone()))
            .await?;
        self.cache.put(snapshot);
        Ok(())
    }

    async fn persist(&self, session_id: Uuid, record: StoredRecord) -> Result<(), StoreError> {
        retry_with_backoff(&self.config.retry, is_transient, || {
            self.store.append(session_id, &record)
        })
        .await
    }

    fn set_result(&self, session_id: Uuid, result: SessionResult) {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id, result);
    }

    /// Only sessions started through `submit` are tracked in memory
    fn complete(&self, session_id: Uuid, result: SessionResult) {
        let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = results.get_mut(&session_id) {
            *slot = result;
        }
    }
}

/// Terminal result of a finished session as recorded in the store
fn stored_result(records: &[StoredRecord]) -> Option<SessionResult> {
    let plan = records.iter().rev().find_map(|r| match r {
        StoredRecord::Plan(p) => Some(p.clone()),
        _ => None,
    })?;
    let failed = records.iter().rev().find_map(|r| match r {
        StoredRecord::Transition(t) if t.to == SessionState::FailedSafe => Some(t.trigger.clone()),
        _ => None,
    });

    match failed {
        Some(reason) => Some(SessionResult::FailedSafe { plan, reason }),
        None if plan.strategy == MergeStrategy::FailSafe => Some(SessionResult::FailedSafe {
            reason: plan.explanation.clone().unwrap_or_default(),
            plan,
        }),
        None => Some(SessionResult::Committed(plan)),
    }
}

fn is_transient(e: &StoreError) -> bool {
    e.severity() == ErrorSeverity::Recoverable
}
