use std::fmt;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::expiry::{days_until_expiry, normalize_expiry, Bucket, DateRejection};
use super::{AlertEngine, Clock};
use crate::db::AlertStore;
use crate::error::Result;
use crate::models::PendingAlert;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Alerts deleted in this pass.
    pub removed: u64,
    /// Stale alerts whose delete failed and will be retried next pass.
    pub failed: u64,
}

/// Why a pending alert no longer reflects its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    MissingDate,
    InvalidDate(DateRejection),
    BucketMismatch {
        stored: String,
        expected: Option<Bucket>,
        days_until_expiry: i64,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::MissingDate => f.write_str("document has no expiry date"),
            StaleReason::InvalidDate(rejection) => write!(f, "expiry date {rejection}"),
            StaleReason::BucketMismatch {
                stored,
                expected: Some(expected),
                days_until_expiry,
            } => write!(
                f,
                "alert type '{stored}' but {days_until_expiry} days until expiry calls for '{expected}'"
            ),
            StaleReason::BucketMismatch {
                stored,
                expected: None,
                days_until_expiry,
            } => write!(
                f,
                "alert type '{stored}' but {days_until_expiry} days until expiry needs no alert"
            ),
        }
    }
}

/// Re-derive the bucket for `alert` and say why it is stale, if it is.
pub fn stale_reason(alert: &PendingAlert, today: NaiveDate, tz: Tz) -> Option<StaleReason> {
    let Some(raw) = alert.expiry_date.as_deref() else {
        return Some(StaleReason::MissingDate);
    };

    let check = normalize_expiry(raw, today, tz);
    if let Some(rejection) = check.rejection() {
        return Some(StaleReason::InvalidDate(rejection));
    }
    let expiry = check.into_valid(raw).ok()?;

    let days = days_until_expiry(expiry, today);
    let expected = Bucket::for_days(days);
    if expected.is_some() && alert.bucket() == expected {
        return None;
    }
    Some(StaleReason::BucketMismatch {
        stored: alert.alert_type.clone(),
        expected,
        days_until_expiry: days,
    })
}

impl<S: AlertStore, C: Clock> AlertEngine<S, C> {
    /// Delete every pending alert that is grounded in a bad date or sits in the wrong bucket.
    ///
    /// Runs independently of [`AlertEngine::generate_alerts`] and repairs alerts that
    /// predate bounds checking or were written by other paths.
    pub async fn cleanup_invalid_alerts(&self) -> Result<CleanupReport> {
        let run_id = Uuid::new_v4();
        async move {
            let today = self.today();
            let mut report = CleanupReport::default();

            let pending = self.store.pending_alerts().await?;
            debug!(count = pending.len(), "Loaded pending alerts");

            for alert in pending {
                let Some(reason) = stale_reason(&alert, today, self.tz) else {
                    continue;
                };

                match self.store.delete_pending_alert(&alert).await {
                    Ok(true) => {
                        info!(
                            alert_id = alert.alert_id,
                            expiry_date = alert.expiry_date.as_deref().unwrap_or(""),
                            %reason,
                            "Removed alert"
                        );
                        report.removed += 1;
                    }
                    Ok(false) => {
                        debug!(alert_id = alert.alert_id, "Alert changed since it was read");
                    }
                    Err(err) if err.is_store_unavailable() => return Err(err),
                    Err(err) => {
                        warn!(alert_id = alert.alert_id, error = %err, "Failed to remove alert");
                        report.failed += 1;
                    }
                }
            }

            info!(
                removed = report.removed,
                failed = report.failed,
                "Alert cleanup finished"
            );
            Ok(report)
        }
        .instrument(info_span!("cleanup_invalid_alerts", %run_id))
        .await
    }
}
