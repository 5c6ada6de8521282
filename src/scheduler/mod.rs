//! In-memory scheduler of recurring reminder jobs.
//!
//! Every job is identified by a [`JobKey`]; there is at most one job per key. A job keeps firing
//! once a day until it's cancelled explicitly. Jobs live in memory only, so they must be
//! restored from the store after a restart.

mod clock;
mod trigger;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::types::UserId;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

pub use clock::*;
pub use trigger::*;
use crate::domain::{AnnouncementId, JobKey, RecipientId};

const JOBS_POISONED_MSG: &str = "the job table was poisoned";
const WORKER_POISONED_MSG: &str = "the worker handle was poisoned";

/// Everything the reminder callback needs to re-derive the rest at fire time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReminderPayload {
    pub announcement_id: AnnouncementId,
    pub recipient_id: RecipientId,
    pub uid: UserId,
}

impl ReminderPayload {
    pub fn job_key(&self) -> JobKey {
        JobKey::new(self.announcement_id, self.recipient_id)
    }
}

#[async_trait]
pub trait ReminderHandler: Send + Sync {
    async fn fire_reminder(&self, payload: ReminderPayload) -> anyhow::Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SchedulerError {
    #[display("the scheduler has been started already")]
    AlreadyStarted,
    #[display("the scheduler is stopped")]
    Stopped,
}

struct Job {
    trigger: DailyTrigger,
    payload: ReminderPayload,
    next_fire: DateTime<Utc>,
}

struct Inner {
    jobs: Mutex<HashMap<JobKey, Job>>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    handler: OnceLock<Arc<dyn ReminderHandler>>,
    wakeup: Notify,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

impl ReminderScheduler {
    /// `poll_interval` caps the time the loop sleeps between two checks of the job table.
    pub fn new(clock: Arc<dyn Clock>, poll_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        let inner = Inner {
            jobs: Mutex::default(),
            clock,
            poll_interval,
            handler: OnceLock::new(),
            wakeup: Notify::new(),
            shutdown,
            worker: Mutex::default(),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Installs the job for `key`, replacing the previous one if there is any.
    pub fn schedule(&self, key: JobKey, trigger: DailyTrigger, payload: ReminderPayload) -> Result<(), SchedulerError> {
        if *self.inner.shutdown.borrow() {
            return Err(SchedulerError::Stopped)
        }
        let next_fire = trigger.next_after(self.inner.clock.now());
        let job = Job { trigger, payload, next_fire };
        let replaced = self.inner.jobs.lock().expect(JOBS_POISONED_MSG)
            .insert(key, job)
            .is_some();
        if replaced {
            log::debug!("{key} was replaced, the next reminder is at {next_fire}");
        } else {
            log::debug!("{key} was scheduled {trigger}, the next reminder is at {next_fire}");
        }
        self.inner.wakeup.notify_one();
        Ok(())
    }

    /// Removes the job if it exists. Cancelling an absent job is a no-op.
    pub fn cancel(&self, key: &JobKey) -> bool {
        let removed = self.inner.jobs.lock().expect(JOBS_POISONED_MSG)
            .remove(key)
            .is_some();
        if removed {
            log::debug!("{key} was cancelled");
        } else {
            log::debug!("{key} is absent, nothing to cancel");
        }
        removed
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.inner.jobs.lock().expect(JOBS_POISONED_MSG).contains_key(key)
    }

    pub fn next_fire_at(&self, key: &JobKey) -> Option<DateTime<Utc>> {
        self.inner.jobs.lock().expect(JOBS_POISONED_MSG)
            .get(key)
            .map(|job| job.next_fire)
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.lock().expect(JOBS_POISONED_MSG).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the callback of the jobs without starting the loop.
    pub fn bind(&self, handler: Arc<dyn ReminderHandler>) -> Result<(), SchedulerError> {
        self.inner.handler.set(handler)
            .map_err(|_| SchedulerError::AlreadyStarted)
    }

    /// Spawns a task per due job. Due jobs stay registered and are moved to their next occurrence.
    pub fn fire_due_jobs(&self) -> Vec<JoinHandle<()>> {
        let Some(handler) = self.inner.handler.get().cloned() else {
            log::warn!("no reminder handler is bound, the due jobs are left untouched");
            return vec![]
        };

        let now = self.inner.clock.now();
        let due: Vec<ReminderPayload> = self.inner.jobs.lock().expect(JOBS_POISONED_MSG)
            .values_mut()
            .filter(|job| job.next_fire <= now)
            .map(|job| {
                job.next_fire = job.trigger.next_after(now);
                job.payload
            })
            .collect();

        due.into_iter()
            .map(|payload| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let key = payload.job_key();
                    log::debug!("firing {key}");
                    if let Err(err) = handler.fire_reminder(payload).await {
                        log::error!("the reminder {key} for {} has failed: {err:#}", payload.uid);
                    }
                })
            })
            .collect()
    }

    fn time_until_next_fire(&self) -> Duration {
        let now = self.inner.clock.now();
        self.inner.jobs.lock().expect(JOBS_POISONED_MSG)
            .values()
            .map(|job| job.next_fire)
            .min()
            .map(|next_fire| (next_fire - now).to_std().unwrap_or(Duration::ZERO))
            .map(|delay| delay.min(self.inner.poll_interval))
            .unwrap_or(self.inner.poll_interval)
    }

    /// Binds the handler and spawns the trigger-evaluation loop.
    pub fn start(&self, handler: Arc<dyn ReminderHandler>) -> Result<(), SchedulerError> {
        if *self.inner.shutdown.borrow() {
            return Err(SchedulerError::Stopped)
        }
        self.bind(handler)?;

        let scheduler = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        let worker = tokio::spawn(async move {
            log::info!("the reminder scheduler has started with {} jobs", scheduler.len());
            while !*shutdown.borrow() {
                scheduler.fire_due_jobs();
                let delay = scheduler.time_until_next_fire();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = scheduler.inner.wakeup.notified() => {}
                    _ = shutdown.changed() => {}
                }
            }
            log::info!("the reminder scheduler has stopped");
        });
        self.inner.worker.lock().expect(WORKER_POISONED_MSG).replace(worker);
        Ok(())
    }

    /// Stops the loop and waits for it. Reminders that are being sent at the moment are not interrupted.
    pub async fn stop(&self) {
        self.inner.shutdown.send_replace(true);
        let maybe_worker = self.inner.worker.lock().expect(WORKER_POISONED_MSG).take();
        if let Some(worker) = maybe_worker {
            if let Err(err) = worker.await {
                log::error!("the reminder scheduler has crashed: {err}");
            }
        }
    }
}
