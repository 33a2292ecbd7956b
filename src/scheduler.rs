//! Recurring jobs driven by cron expressions.
//!
//! Jobs are plain trait objects registered at startup, so tests and the CLI can
//! run them directly without waiting on the wall clock.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::db::AlertStore;
use crate::error::{Error, Result};
use crate::processor::{AlertEngine, Clock};

/// Consecutive failures after which a job's failures are logged as errors.
const FAILURE_ESCALATION: u32 = 3;

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

pub struct GenerateJob<S, C>(pub Arc<AlertEngine<S, C>>);

#[async_trait]
impl<S: AlertStore + 'static, C: Clock + 'static> Job for GenerateJob<S, C> {
    fn name(&self) -> &'static str {
        "generate_alerts"
    }

    async fn run(&self) -> Result<()> {
        self.0.generate_alerts().await.map(|_| ())
    }
}

pub struct CleanupJob<S, C>(pub Arc<AlertEngine<S, C>>);

#[async_trait]
impl<S: AlertStore + 'static, C: Clock + 'static> Job for CleanupJob<S, C> {
    fn name(&self) -> &'static str {
        "cleanup_invalid_alerts"
    }

    async fn run(&self) -> Result<()> {
        self.0.cleanup_invalid_alerts().await.map(|_| ())
    }
}

/// Expand 5 and 6 field cron expressions to the 7 fields (`sec min hour dom month dow year`)
/// the `cron` crate expects.
pub fn normalize_cron_expr(expr: &str) -> Result<String> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    match parts.len() {
        5 => Ok(format!("0 {} *", parts.join(" "))),
        6 => Ok(format!("{} *", parts.join(" "))),
        7 => Ok(parts.join(" ")),
        _ => Err(Error::Schedule {
            expr: expr.to_string(),
            message: "cron expr must have 5, 6, or 7 fields".to_string(),
        }),
    }
}

struct Entry {
    job: Arc<dyn Job>,
    expr: String,
    schedule: Schedule,
}

pub struct Scheduler {
    tz: Tz,
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, expr: &str, job: Arc<dyn Job>) -> Result<()> {
        let normalized = normalize_cron_expr(expr)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| Error::Schedule {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;
        info!(job = job.name(), schedule = expr, tz = self.tz.name(), "Registered job");
        self.entries.push(Entry {
            job,
            expr: expr.to_string(),
            schedule,
        });
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.job.name()).collect()
    }

    /// Next time `name` fires strictly after `after`, in UTC.
    pub fn next_fire(&self, name: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let entry = self.entries.iter().find(|e| e.job.name() == name)?;
        next_after(&entry.schedule, self.tz, after)
    }

    /// Run a registered job immediately.
    pub async fn trigger(&self, name: &str) -> Option<Result<()>> {
        let entry = self.entries.iter().find(|e| e.job.name() == name)?;
        Some(entry.job.run().await)
    }

    /// Drive every job on its own task until the process stops.
    pub async fn run(self) {
        let tz = self.tz;
        let handles: Vec<_> = self
            .entries
            .into_iter()
            .map(|entry| tokio::spawn(drive(entry, tz)))
            .collect();

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
    }
}

fn next_after(schedule: &Schedule, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|at| at.with_timezone(&Utc))
}

async fn drive(entry: Entry, tz: Tz) {
    let name = entry.job.name();
    let mut consecutive_failures: u32 = 0;

    loop {
        let now = Utc::now();
        let Some(next) = next_after(&entry.schedule, tz, now) else {
            warn!(job = name, schedule = %entry.expr, "Schedule has no future runs, stopping");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(job = name, next_run = %next, "Waiting for next run");
        tokio::time::sleep(wait).await;

        match entry.job.run().await {
            Ok(()) => consecutive_failures = 0,
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures >= FAILURE_ESCALATION {
                    error!(
                        job = name,
                        consecutive_failures,
                        "Job keeps failing: {}", e
                    );
                } else {
                    warn!(
                        job = name,
                        consecutive_failures,
                        "Job failed, retrying at next run: {}", e
                    );
                }
            }
        }
    }
}
