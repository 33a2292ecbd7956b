//! Document expiry alert lifecycle.
//!
//! [`AlertEngine`] owns the two passes run by the scheduler, generation and
//! cleanup, plus the small operations the surrounding API needs (listing,
//! acknowledging, dashboard counts). All of them judge dates through
//! [`expiry::bucket_for`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::AlertStore;
use crate::error::{Error, Result};
use crate::models::{AlertRow, AlertView, DocumentKind};

pub mod cleaner;
pub mod expiry;
pub mod generator;

use expiry::{bucket_for, Bucket, DocumentStatus};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct AlertEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    tz: Tz,
}

impl<S: AlertStore, C: Clock> AlertEngine<S, C> {
    pub fn new(store: S, clock: C, tz: Tz) -> Self {
        Self { store, clock, tz }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Calendar day of `now` in the configured zone; bucket math counts from its midnight.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.tz).date_naive()
    }

    pub async fn active_alerts(&self) -> Result<Vec<AlertView>> {
        let alerts = self.store.active_alerts().await?;
        let urgent = alerts.iter().filter(|a| a.is_urgent()).count();
        info!(total = alerts.len(), urgent, "Active alerts");
        Ok(alerts)
    }

    /// Mark an alert as sent. Acknowledged alerts are never touched by either pass again.
    pub async fn acknowledge(&self, alert_id: i64) -> Result<AlertRow> {
        let row = self
            .store
            .acknowledge(alert_id, self.clock.now())
            .await?
            .ok_or(Error::AlertNotFound(alert_id))?;
        info!(alert_id, alert_type = %row.alert_type, "Alert acknowledged");
        Ok(row)
    }

    /// Per-bucket and per-status counts over every document with an expiry value.
    pub async fn summarize(&self) -> Result<ExpirySummary> {
        let today = self.today();
        let mut summary = ExpirySummary::default();

        for kind in DocumentKind::ALL {
            for doc in self.store.documents_with_expiry(kind).await? {
                summary.total_documents += 1;
                match bucket_for(&doc.expiry_date, today, self.tz) {
                    Ok(bucket) => {
                        if let Some(bucket) = bucket {
                            *summary.by_bucket.entry(bucket).or_default() += 1;
                        }
                        match DocumentStatus::from(bucket) {
                            DocumentStatus::Valid => summary.valid += 1,
                            DocumentStatus::Warning => summary.warning += 1,
                            DocumentStatus::Expired => summary.expired += 1,
                        }
                    }
                    Err(err) => {
                        warn!(%kind, document_id = doc.id, error = %err, "Unusable expiry date");
                        summary.invalid_dates += 1;
                    }
                }
            }
        }

        Ok(summary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySummary {
    pub total_documents: u64,
    pub by_bucket: BTreeMap<Bucket, u64>,
    pub valid: u64,
    pub warning: u64,
    pub expired: u64,
    pub invalid_dates: u64,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    use super::Clock;

    /// Clock that only moves when told to.
    pub struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub fn at(y: i32, m: u32, d: u32) -> Self {
            Self(Mutex::new(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()))
        }

        pub fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }

        pub fn advance_days(&self, days: i64) {
            self.advance(Duration::days(days));
        }

        pub fn today(&self) -> NaiveDate {
            self.0.lock().unwrap().date_naive()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    pub fn in_days(clock: &ManualClock, days: i64) -> String {
        (clock.today() + Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }
}
