//! Publish scheduler: the recurring control loop
//!
//! A single active loop per process. Each tick runs three independent
//! checks: the due-schedule scan, the daily fallback publish (06:00 local by
//! default) and the daily retention sweep (03:00 local by default). A
//! failure in one check is logged and never aborts the remaining checks or
//! the loop itself.
//!
//! The wait between ticks is a cancellable ticker: shutdown interrupts a
//! pending tick and triggers a final persistence flush. Running two
//! scheduler instances would double-publish due posts; the design assumes
//! at most one active loop and provides no distributed locking.

use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::service::ModcastService;

pub struct Scheduler {
    service: ModcastService,
    config: SchedulerConfig,
    last_fallback: Option<NaiveDate>,
    last_sweep: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(service: ModcastService, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            last_fallback: None,
            last_sweep: None,
        }
    }

    /// Run until the token is cancelled, then flush once.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            poll_interval = self.config.poll_interval,
            retention_days = self.config.retention_days,
            "scheduler starting"
        );
        self.prime(Local::now());

        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.tick(Local::now()).await,
            }
        }

        if let Err(e) = self.service.flush().await {
            error!(error = %e, "final flush failed");
        }
        info!("scheduler stopped");
    }

    /// A daily mark that already passed before startup is skipped for today,
    /// so restarting at noon does not rerun the morning's work.
    fn prime(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        if now.hour() >= self.config.fallback_hour {
            self.last_fallback = Some(today);
        }
        if now.hour() >= self.config.sweep_hour {
            self.last_sweep = Some(today);
        }
    }

    /// One scheduler pass. Public so tests can drive it with synthetic
    /// clocks instead of waiting out the poll interval.
    pub async fn tick(&mut self, now: DateTime<Local>) {
        self.scan_due(now.with_timezone(&Utc)).await;
        self.daily_fallback(now).await;
        self.retention_sweep(now).await;
    }

    /// Publish every approved post whose schedule has elapsed, in ascending
    /// id order. Publish failures leave the post approved for the next tick.
    async fn scan_due(&self, now: DateTime<Utc>) {
        let due = self.service.due_posts(now).await;
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "posts due for publishing");
        for id in due {
            if let Err(e) = self.service.publish_post(id).await {
                error!(post_id = id, error = %e, "scheduled publish failed");
            }
        }
    }

    /// Once per day after the fallback mark: publish the earliest approved
    /// post bound to the current feed if it carries no explicit schedule,
    /// guaranteeing forward progress for approved-but-unscheduled posts.
    async fn daily_fallback(&mut self, now: DateTime<Local>) {
        if !self.mark_due(now, self.config.fallback_hour, self.last_fallback) {
            return;
        }
        self.last_fallback = Some(now.date_naive());

        let Some(id) = self.service.fallback_candidate().await else {
            return;
        };
        info!(post_id = id, "daily fallback publish");
        if let Err(e) = self.service.publish_post(id).await {
            error!(post_id = id, error = %e, "fallback publish failed");
        }
    }

    /// Once per day after the sweep mark: drop posts past the retention
    /// window, persist, and tell the operator how many went.
    async fn retention_sweep(&mut self, now: DateTime<Local>) {
        if !self.mark_due(now, self.config.sweep_hour, self.last_sweep) {
            return;
        }
        self.last_sweep = Some(now.date_naive());

        match self
            .service
            .sweep_older_than(self.config.retention_days, now.with_timezone(&Utc))
            .await
        {
            Ok(removed) => {
                self.service
                    .notify_operator(&format!(
                        "Retention sweep removed {} record(s) older than {} days",
                        removed, self.config.retention_days
                    ))
                    .await;
            }
            Err(e) => error!(error = %e, "retention sweep failed"),
        }
    }

    /// Whether a daily mark should fire: we are at or past the mark's hour
    /// and have not fired today. The first tick at or after the mark fires,
    /// so a poll interval longer than a minute cannot skip a day.
    fn mark_due(&self, now: DateTime<Local>, hour: u32, last_run: Option<NaiveDate>) -> bool {
        now.hour() >= hour && last_run != Some(now.date_naive())
    }
}
