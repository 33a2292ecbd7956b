use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::expiry::bucket_for;
use super::{AlertEngine, Clock};
use crate::db::AlertStore;
use crate::error::Result;
use crate::models::{AlertOwner, DocumentKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
    /// Alerts inserted in this pass.
    pub created: u64,
    /// Pending alerts replaced because their document moved to another bucket.
    pub superseded: u64,
    /// Documents whose expiry value failed normalization.
    pub skipped_invalid: u64,
    /// Documents whose write failed and will be retried next pass.
    pub failed: u64,
}

impl<S: AlertStore, C: Clock> AlertEngine<S, C> {
    /// Bring the pending alert of every dated document in line with its current bucket.
    ///
    /// Safe to re-run: a document already holding the right alert causes no write.
    /// Only a store outage aborts the pass; bad dates and row failures are skipped.
    pub async fn generate_alerts(&self) -> Result<GenerateReport> {
        let run_id = Uuid::new_v4();
        async move {
            let today = self.today();
            let now = self.clock.now();
            let mut report = GenerateReport::default();

            for kind in DocumentKind::ALL {
                let documents = self.store.documents_with_expiry(kind).await?;
                debug!(%kind, count = documents.len(), "Loaded documents with expiry");

                for doc in documents {
                    let owner = AlertOwner::new(kind, doc.id);
                    let bucket = match bucket_for(&doc.expiry_date, today, self.tz) {
                        Ok(Some(bucket)) => bucket,
                        Ok(None) => continue,
                        Err(err) => {
                            warn!(%owner, error = %err, "Skipping document");
                            report.skipped_invalid += 1;
                            continue;
                        }
                    };

                    match self.store.supersede_and_insert(owner, bucket, now).await {
                        Ok(outcome) => {
                            report.superseded += outcome.superseded;
                            if outcome.created {
                                report.created += 1;
                                info!(%owner, %bucket, superseded = outcome.superseded, "Created alert");
                            }
                        }
                        Err(err) if err.is_store_unavailable() => return Err(err),
                        Err(err) => {
                            warn!(%owner, %bucket, error = %err, "Failed to sync alert");
                            report.failed += 1;
                        }
                    }
                }
            }

            info!(
                created = report.created,
                superseded = report.superseded,
                skipped_invalid = report.skipped_invalid,
                failed = report.failed,
                "Alert generation finished"
            );
            Ok(report)
        }
        .instrument(info_span!("generate_alerts", %run_id))
        .await
    }
}
