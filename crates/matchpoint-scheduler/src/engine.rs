//! The polling execution engine.
//!
//! A single cooperative loop: every `poll_interval` it scans for pending
//! instances whose execute time has arrived, claims each one with the
//! store's conditional `pending → processing` UPDATE, and runs the
//! submission workflow under a small semaphore so a burst of due instances
//! cannot exhaust portal sessions. Outcomes are reconciled back into the
//! store with the retry policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use matchpoint_core::config::EngineConfig;
use matchpoint_store::{BookingInstance, BookingStore, BookingTemplate};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::retry::RetryPolicy;

/// Terminal result of one submission attempt, as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Portal accepted the reservation.
    Confirmed { confirmation_id: String },
    /// Retrying cannot help (bad credentials, slot conflict with no
    /// substitute). The instance fails immediately.
    Permanent { detail: String },
    /// Worth another attempt with a fresh session and token.
    Transient { detail: String },
}

/// The seam between scheduling and the portal protocol.
///
/// Production wires in the portal client; tests use in-process fakes. One
/// call corresponds to one complete, self-contained portal session — the
/// implementation must not share login state across calls.
#[async_trait]
pub trait SubmissionExecutor: Send + Sync {
    async fn execute(
        &self,
        template: Option<&BookingTemplate>,
        instance: &BookingInstance,
    ) -> SubmissionOutcome;
}

/// Core engine: claims due instances and drives submissions to a terminal
/// state. Multiple engine processes over one database are safe; the claim
/// is the only guard.
pub struct ExecutionEngine<E> {
    store: Arc<BookingStore>,
    executor: Arc<E>,
    policy: RetryPolicy,
    poll_interval: Duration,
    workers: Arc<Semaphore>,
}

impl<E: SubmissionExecutor + 'static> ExecutionEngine<E> {
    pub fn new(store: Arc<BookingStore>, executor: Arc<E>, cfg: &EngineConfig) -> Self {
        Self {
            store,
            executor,
            policy: RetryPolicy::from_config(cfg),
            poll_interval: Duration::from_secs(cfg.poll_interval_secs.max(1)),
            workers: Arc::new(Semaphore::new(cfg.worker_width.max(1))),
        }
    }

    /// Main loop. Polls until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.poll_interval.as_secs(), "execution engine started");

        // A previous run may have died mid-submission; those rows would
        // otherwise stay `processing` forever.
        match self.store.sweep_stuck_processing() {
            Ok(0) => {}
            Ok(n) => warn!(count = n, "recovered instances from prior run"),
            Err(e) => error!("startup sweep failed: {e}"),
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("engine tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("execution engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One scan: claim and process everything currently due. Returns how
    /// many instances this tick actually claimed.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.store.due_instances(now)?;
        if due.is_empty() {
            return Ok(0);
        }
        info!(count = due.len(), "due instances found");

        let mut handles = Vec::new();
        let mut claimed = 0usize;
        for instance in due {
            // Claim before spawning: a competing engine (or a user cancel)
            // may have taken the row since the SELECT.
            if !self.store.claim_instance(&instance.id)? {
                continue;
            }
            claimed += 1;

            let store = Arc::clone(&self.store);
            let executor = Arc::clone(&self.executor);
            let workers = Arc::clone(&self.workers);
            let policy = self.policy;
            handles.push(tokio::spawn(async move {
                // Semaphore is never closed while the engine lives.
                let Ok(_permit) = workers.acquire().await else {
                    return;
                };
                process_one(&store, executor.as_ref(), policy, instance).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("submission task panicked: {e}");
            }
        }
        Ok(claimed)
    }
}

/// Run one claimed instance through the executor and settle the result.
async fn process_one<E: SubmissionExecutor + ?Sized>(
    store: &BookingStore,
    executor: &E,
    policy: RetryPolicy,
    instance: BookingInstance,
) {
    let template = match &instance.template_id {
        Some(id) => match store.get_template(id) {
            Ok(t) => t,
            Err(e) => {
                error!(instance_id = %instance.id, "template lookup failed: {e}");
                None
            }
        },
        None => None,
    };

    let outcome = executor.execute(template.as_ref(), &instance).await;
    if let Err(e) = reconcile(store, policy, &instance, outcome) {
        error!(instance_id = %instance.id, "reconcile failed: {e}");
    }
}

/// Apply one submission outcome to the store under the retry policy.
pub fn reconcile(
    store: &BookingStore,
    policy: RetryPolicy,
    instance: &BookingInstance,
    outcome: SubmissionOutcome,
) -> Result<()> {
    match outcome {
        SubmissionOutcome::Confirmed { confirmation_id } => {
            store.mark_confirmed(&instance.id, &confirmation_id)?;
        }
        SubmissionOutcome::Permanent { detail } => {
            store.mark_failed(&instance.id, &detail)?;
        }
        SubmissionOutcome::Transient { detail } => {
            let attempt = instance.retry_count + 1;
            if policy.should_retry(attempt) {
                let next = Utc::now() + policy.backoff(attempt);
                info!(instance_id = %instance.id, attempt, next = %next, "transient failure, rescheduling");
                store.reschedule_retry(&instance.id, next, &detail)?;
            } else {
                let detail = format!("{detail} (gave up after {attempt} attempts)");
                store.mark_failed(&instance.id, &detail)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use matchpoint_store::InstanceStatus;
    use rusqlite::Connection;
    use uuid::Uuid;

    struct AlwaysConfirm;

    #[async_trait]
    impl SubmissionExecutor for AlwaysConfirm {
        async fn execute(
            &self,
            _template: Option<&BookingTemplate>,
            _instance: &BookingInstance,
        ) -> SubmissionOutcome {
            SubmissionOutcome::Confirmed {
                confirmation_id: "278886".to_string(),
            }
        }
    }

    struct AlwaysTransient;

    #[async_trait]
    impl SubmissionExecutor for AlwaysTransient {
        async fn execute(
            &self,
            _template: Option<&BookingTemplate>,
            _instance: &BookingInstance,
        ) -> SubmissionOutcome {
            SubmissionOutcome::Transient {
                detail: "portal redirected to error page".to_string(),
            }
        }
    }

    struct AlwaysPermanent;

    #[async_trait]
    impl SubmissionExecutor for AlwaysPermanent {
        async fn execute(
            &self,
            _template: Option<&BookingTemplate>,
            _instance: &BookingInstance,
        ) -> SubmissionOutcome {
            SubmissionOutcome::Permanent {
                detail: "authentication rejected".to_string(),
            }
        }
    }

    fn mem_store() -> Arc<BookingStore> {
        Arc::new(BookingStore::new(Connection::open_in_memory().unwrap()).unwrap())
    }

    fn due_instance(store: &BookingStore) -> BookingInstance {
        let now = Utc::now();
        let instance = BookingInstance {
            id: Uuid::new_v4().to_string(),
            template_id: None,
            date: (now + ChronoDuration::days(3)).date_naive(),
            scheduled_execute_time: now - ChronoDuration::minutes(1),
            status: InstanceStatus::Pending,
            retry_count: 0,
            confirmation_id: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_instance(&instance).unwrap();
        instance
    }

    fn engine<E: SubmissionExecutor + 'static>(
        store: Arc<BookingStore>,
        executor: E,
    ) -> ExecutionEngine<E> {
        ExecutionEngine::new(store, Arc::new(executor), &EngineConfig::default())
    }

    #[tokio::test]
    async fn confirmed_submission_stores_confirmation_id() {
        let store = mem_store();
        let instance = due_instance(&store);

        let engine = engine(Arc::clone(&store), AlwaysConfirm);
        assert_eq!(engine.tick().await.unwrap(), 1);

        let loaded = store.get_instance(&instance.id).unwrap().unwrap();
        assert_eq!(loaded.status, InstanceStatus::Confirmed);
        assert_eq!(loaded.confirmation_id.as_deref(), Some("278886"));
    }

    #[tokio::test]
    async fn transient_failure_reschedules_until_cap() {
        let store = mem_store();
        let instance = due_instance(&store);
        let engine = engine(Arc::clone(&store), AlwaysTransient);

        // Attempt 1 through the engine: back to pending with backoff applied.
        assert_eq!(engine.tick().await.unwrap(), 1);
        let after1 = store.get_instance(&instance.id).unwrap().unwrap();
        assert_eq!(after1.status, InstanceStatus::Pending);
        assert_eq!(after1.retry_count, 1);
        assert!(after1.scheduled_execute_time > Utc::now());
        assert!(after1.error_detail.is_some());

        // The backoff pushes the row outside the tick window, so drive the
        // remaining attempts through the reconciler directly.
        let policy = RetryPolicy::default();
        let transient = || SubmissionOutcome::Transient {
            detail: "portal redirected to error page".to_string(),
        };

        assert!(store.claim_instance(&instance.id).unwrap());
        reconcile(&store, policy, &after1, transient()).unwrap();
        let after2 = store.get_instance(&instance.id).unwrap().unwrap();
        assert_eq!(after2.status, InstanceStatus::Pending);
        assert_eq!(after2.retry_count, 2);

        // Attempt 3 exhausts the policy.
        assert!(store.claim_instance(&instance.id).unwrap());
        reconcile(&store, policy, &after2, transient()).unwrap();
        let after3 = store.get_instance(&instance.id).unwrap().unwrap();
        assert_eq!(after3.status, InstanceStatus::Failed);
        assert_eq!(after3.retry_count, 3);
        assert!(after3.error_detail.unwrap().contains("gave up"));
    }

    #[tokio::test]
    async fn permanent_failure_skips_retries() {
        let store = mem_store();
        let instance = due_instance(&store);
        let engine = engine(Arc::clone(&store), AlwaysPermanent);

        assert_eq!(engine.tick().await.unwrap(), 1);
        let loaded = store.get_instance(&instance.id).unwrap().unwrap();
        assert_eq!(loaded.status, InstanceStatus::Failed);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(
            loaded.error_detail.as_deref(),
            Some("authentication rejected")
        );
    }

    #[tokio::test]
    async fn tick_ignores_instances_not_yet_due() {
        let store = mem_store();
        let now = Utc::now();
        let mut instance = due_instance(&store);
        instance.id = Uuid::new_v4().to_string();
        instance.scheduled_execute_time = now + ChronoDuration::hours(2);
        store.insert_instance(&instance).unwrap();

        let engine = engine(Arc::clone(&store), AlwaysConfirm);
        // Only the due one is claimed.
        assert_eq!(engine.tick().await.unwrap(), 1);
        assert_eq!(
            store.get_instance(&instance.id).unwrap().unwrap().status,
            InstanceStatus::Pending
        );
    }

    #[tokio::test]
    async fn cancelled_row_is_not_claimed() {
        let store = mem_store();
        let instance = due_instance(&store);
        store.cancel_instance(&instance.id).unwrap();

        let engine = engine(Arc::clone(&store), AlwaysConfirm);
        assert_eq!(engine.tick().await.unwrap(), 0);
        assert_eq!(
            store.get_instance(&instance.id).unwrap().unwrap().status,
            InstanceStatus::Cancelled
        );
    }
}
