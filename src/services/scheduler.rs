//! Background job runner: reminder checks and pending-push dispatch every
//! minute, weekly reports once a week.
//!
//! Each task family has its own `TaskGuard`, so a slow run of one task never
//! delays the others and a tick that finds its task still running is dropped
//! rather than queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::services::notifications::NotificationService;
use crate::services::reminders::ReminderService;
use crate::services::schedule::{next_occurrence, parse_reminder_time, parse_timezone, parse_weekday};
use crate::services::weekly_report::WeeklyReportService;

/// How a single guarded run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Failed,
    TimedOut,
    Panicked,
    /// The previous run was still in progress.
    Skipped,
}

/// Overlap and timeout protection for one task family.
pub struct TaskGuard {
    name: &'static str,
    busy: AtomicBool,
    timeout: Duration,
}

struct BusyRelease<'a>(&'a AtomicBool);

impl Drop for BusyRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TaskGuard {
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
            timeout,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run `work` unless a previous run is still in progress.
    ///
    /// `work` is only called once the guard is held. The resulting future is
    /// spawned on `tracker` and raced against the guard's timeout; on timeout
    /// the guard is released and the run is left to finish on its own, up to
    /// twice the timeout, after which it is dropped.
    pub async fn run<F, Fut>(&self, tracker: &TaskTracker, work: F) -> TickOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(task = self.name, "Previous run still in progress, skipping tick");
            return TickOutcome::Skipped;
        }
        let _release = BusyRelease(&self.busy);

        let name = self.name;
        let ceiling = self.timeout * 2;
        let fut = work();
        let mut handle = tracker.spawn(async move {
            match tokio::time::timeout(ceiling, fut).await {
                Ok(result) => Some(result),
                Err(_) => {
                    tracing::error!(
                        task = name,
                        ceiling_secs = ceiling.as_secs(),
                        "Abandoned run dropped at hard ceiling"
                    );
                    None
                }
            }
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Some(Ok(())))) => TickOutcome::Completed,
            Ok(Ok(Some(Err(e)))) => {
                tracing::error!(task = name, error = ?e, "Scheduled task failed");
                TickOutcome::Failed
            }
            Ok(Ok(None)) => TickOutcome::TimedOut,
            Ok(Err(e)) => {
                tracing::error!(
                    task = name,
                    panicked = e.is_panic(),
                    "Scheduled task aborted: {}",
                    e
                );
                TickOutcome::Panicked
            }
            Err(_) => {
                tracing::error!(
                    task = name,
                    timeout_secs = self.timeout.as_secs(),
                    "Scheduled task timed out, abandoning this run"
                );
                TickOutcome::TimedOut
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WeeklySchedule {
    day: Weekday,
    time: NaiveTime,
    tz: Tz,
}

struct Running {
    cancel: CancellationToken,
    loops: Vec<JoinHandle<()>>,
}

fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute = u64::from(now.second()) * 1000 + u64::from(now.nanosecond() / 1_000_000).min(999);
    Duration::from_millis(60_000 - into_minute.min(59_999))
}

pub struct NotificationScheduler {
    reminders: ReminderService,
    notifications: NotificationService,
    weekly: WeeklyReportService,
    config: SchedulerConfig,
    reminder_guard: TaskGuard,
    push_guard: TaskGuard,
    weekly_guard: TaskGuard,
    tracker: TaskTracker,
    running: Mutex<Option<Running>>,
}

impl NotificationScheduler {
    pub fn new(
        reminders: ReminderService,
        notifications: NotificationService,
        weekly: WeeklyReportService,
        config: SchedulerConfig,
    ) -> Self {
        let minute_timeout = Duration::from_secs(config.minute_task_timeout_seconds);
        let weekly_timeout = Duration::from_secs(config.weekly_task_timeout_seconds);

        Self {
            reminders,
            notifications,
            weekly,
            config,
            reminder_guard: TaskGuard::new("reminder-check", minute_timeout),
            push_guard: TaskGuard::new("pending-push-dispatch", minute_timeout),
            weekly_guard: TaskGuard::new("weekly-report", weekly_timeout),
            tracker: TaskTracker::new(),
            running: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    fn weekly_schedule(&self) -> AppResult<WeeklySchedule> {
        let day = parse_weekday(&self.config.weekly_report_day).ok_or_else(|| {
            AppError::Config(format!(
                "WEEKLY_REPORT_DAY must be a weekday name, got {:?}",
                self.config.weekly_report_day
            ))
        })?;
        let time = parse_reminder_time(&self.config.weekly_report_time).map_err(|_| {
            AppError::Config(format!(
                "WEEKLY_REPORT_TIME must be HH:MM, got {:?}",
                self.config.weekly_report_time
            ))
        })?;
        let tz = parse_timezone(&self.config.timezone).map_err(|_| {
            AppError::Config(format!(
                "SCHEDULER_TIMEZONE is not a known timezone: {:?}",
                self.config.timezone
            ))
        })?;
        Ok(WeeklySchedule { day, time, tz })
    }

    /// Start the three task loops. Calling it while running is a no-op.
    pub async fn start(self: &Arc<Self>) -> AppResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::info!("Notification scheduler already running");
            return Ok(());
        }

        let weekly = self.weekly_schedule()?;
        let cancel = CancellationToken::new();
        self.tracker.reopen();

        let loops = vec![
            self.spawn_minute_loop("reminder-check", cancel.clone(), |s| async move {
                s.run_reminder_check().await
            }),
            self.spawn_minute_loop("pending-push-dispatch", cancel.clone(), |s| async move {
                s.run_pending_dispatch().await
            }),
            self.spawn_weekly_loop(weekly, cancel.clone()),
        ];

        *running = Some(Running { cancel, loops });
        tracing::info!(
            "Notification scheduler started (weekly report {} {} {})",
            self.config.weekly_report_day,
            self.config.weekly_report_time,
            self.config.timezone
        );
        Ok(())
    }

    /// Cancel future ticks. Runs already in flight are left alone.
    pub async fn stop(&self) {
        let Some(state) = self.running.lock().await.take() else {
            tracing::debug!("Notification scheduler not running");
            return;
        };

        state.cancel.cancel();
        for handle in state.loops {
            if let Err(e) = handle.await {
                tracing::warn!("Scheduler loop ended abnormally: {}", e);
            }
        }
        tracing::info!("Notification scheduler stopped");
    }

    /// `stop`, then wait up to `grace` for in-flight runs.
    pub async fn shutdown(&self, grace: Duration) {
        self.stop().await;
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                "{} scheduler run(s) still in flight after {}s grace period",
                self.tracker.len(),
                grace.as_secs()
            );
        }
    }

    pub async fn run_reminder_check(&self) -> TickOutcome {
        let reminders = self.reminders.clone();
        self.reminder_guard
            .run(&self.tracker, move || async move {
                reminders.check_study_reminders(Utc::now()).await.map(|_| ())
            })
            .await
    }

    pub async fn run_pending_dispatch(&self) -> TickOutcome {
        let notifications = self.notifications.clone();
        let limit = self.config.push_dispatch_batch_size;
        self.push_guard
            .run(&self.tracker, move || async move {
                let sweep = notifications.dispatch_pending_pushes(Utc::now(), limit).await?;
                if sweep.examined > 0 {
                    tracing::info!(
                        "Pending pushes: examined={} delivered={} suppressed={} deferred={} failed={}",
                        sweep.examined,
                        sweep.delivered,
                        sweep.suppressed,
                        sweep.deferred,
                        sweep.failed
                    );
                }
                Ok(())
            })
            .await
    }

    pub async fn run_weekly_report(&self) -> TickOutcome {
        let weekly = self.weekly.clone();
        self.weekly_guard
            .run(&self.tracker, move || async move {
                weekly.send_weekly_reports(Utc::now()).await.map(|_| ())
            })
            .await
    }

    fn spawn_minute_loop<F, Fut>(
        self: &Arc<Self>,
        name: &'static str,
        cancel: CancellationToken,
        tick: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(until_next_minute(Utc::now())) => {}
            }

            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(task = name, "Scheduler loop exiting");
                        break;
                    }
                    _ = interval.tick() => {
                        this.tracker.spawn(tick(this.clone()));
                    }
                }
            }
        })
    }

    fn spawn_weekly_loop(self: &Arc<Self>, weekly: WeeklySchedule, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut after = Utc::now();
            loop {
                let next = next_occurrence(weekly.time, &[weekly.day], weekly.tz, after);
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tracing::info!("Next weekly report run at {}", next);

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(task = "weekly-report", "Scheduler loop exiting");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        let s = this.clone();
                        this.tracker.spawn(async move { s.run_weekly_report().await });
                    }
                }

                after = next.max(Utc::now());
            }
        })
    }
}
