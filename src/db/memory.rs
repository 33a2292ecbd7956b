//! In-memory `AlertStore` used by the processor and scheduler tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AlertStore, SyncOutcome};
use crate::error::{Error, Result};
use crate::models::alert::sort_for_listing;
use crate::models::{AlertOwner, AlertRow, AlertView, DocumentExpiry, DocumentKind, PendingAlert};
use crate::processor::expiry::Bucket;

#[derive(Default)]
struct State {
    documents: BTreeMap<(DocumentKind, i64), Option<String>>,
    alerts: Vec<AlertRow>,
    next_id: i64,
    unavailable: bool,
    failing_owners: HashSet<AlertOwner>,
}

impl State {
    fn push_alert(&mut self, owner: AlertOwner, alert_type: &str, at: DateTime<Utc>) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let (document_id, driver_document_id) = match owner.kind {
            DocumentKind::Vehicle => (Some(owner.document_id), None),
            DocumentKind::Driver => (None, Some(owner.document_id)),
        };
        self.alerts.push(AlertRow {
            id,
            document_id,
            driver_document_id,
            alert_type: alert_type.to_string(),
            alert_date: at,
            is_sent: false,
            sent_at: None,
        });
        id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_expiry(&self, kind: DocumentKind, id: i64, expiry: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.documents.insert((kind, id), expiry.map(str::to_string));
    }

    /// Insert a pending alert directly, bypassing the generator.
    pub fn insert_alert(&self, owner: AlertOwner, alert_type: &str, at: DateTime<Utc>) -> i64 {
        self.state.lock().unwrap().push_alert(owner, alert_type, at)
    }

    /// Insert a pending alert row that references no document at all.
    pub fn insert_orphan_alert(&self, alert_type: &str, at: DateTime<Utc>) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.alerts.push(AlertRow {
            id,
            document_id: None,
            driver_document_id: None,
            alert_type: alert_type.to_string(),
            alert_date: at,
            is_sent: false,
            sent_at: None,
        });
        id
    }

    pub fn alerts(&self) -> Vec<AlertRow> {
        self.state.lock().unwrap().alerts.clone()
    }

    /// Pending alert labels for one document.
    pub fn pending_for(&self, owner: AlertOwner) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .alerts
            .iter()
            .filter(|a| !a.is_sent && owner_of(a) == Some(owner))
            .map(|a| a.alert_type.clone())
            .collect()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Make every write for `owner` fail with a row-level error.
    pub fn fail_writes_for(&self, owner: AlertOwner) {
        self.state.lock().unwrap().failing_owners.insert(owner);
    }

    fn check_available(state: &State) -> Result<()> {
        if state.unavailable {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(())
    }
}

fn owner_of(row: &AlertRow) -> Option<AlertOwner> {
    AlertOwner::from_columns(row.document_id, row.driver_document_id)
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn documents_with_expiry(&self, kind: DocumentKind) -> Result<Vec<DocumentExpiry>> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .documents
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .filter_map(|((_, id), expiry)| {
                expiry.as_ref().map(|expiry_date| DocumentExpiry {
                    id: *id,
                    expiry_date: expiry_date.clone(),
                })
            })
            .collect())
    }

    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .alerts
            .iter()
            .filter(|a| !a.is_sent)
            .map(|a| {
                let owner = owner_of(a);
                let expiry_date = owner.and_then(|o| {
                    state
                        .documents
                        .get(&(o.kind, o.document_id))
                        .cloned()
                        .flatten()
                });
                PendingAlert {
                    alert_id: a.id,
                    owner,
                    alert_type: a.alert_type.clone(),
                    expiry_date,
                }
            })
            .collect())
    }

    async fn supersede_and_insert(
        &self,
        owner: AlertOwner,
        bucket: Bucket,
        at: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        if state.failing_owners.contains(&owner) {
            return Err(sqlx::Error::RowNotFound.into());
        }

        let before = state.alerts.len();
        state.alerts.retain(|a| {
            a.is_sent || owner_of(a) != Some(owner) || a.alert_type == bucket.as_str()
        });
        let superseded = (before - state.alerts.len()) as u64;

        let exists = state
            .alerts
            .iter()
            .any(|a| !a.is_sent && owner_of(a) == Some(owner) && a.alert_type == bucket.as_str());
        // Insert under the same lock as the delete.
        if !exists {
            state.push_alert(owner, bucket.as_str(), at);
        }
        Ok(SyncOutcome {
            superseded,
            created: !exists,
        })
    }

    async fn delete_pending_alert(&self, alert: &PendingAlert) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        if alert.owner.is_some_and(|o| state.failing_owners.contains(&o)) {
            return Err(sqlx::Error::RowNotFound.into());
        }
        let before = state.alerts.len();
        state.alerts.retain(|a| {
            !(a.id == alert.alert_id && !a.is_sent && a.alert_type == alert.alert_type)
        });
        Ok(state.alerts.len() < before)
    }

    async fn active_alerts(&self) -> Result<Vec<AlertView>> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        let mut views: Vec<AlertView> = state
            .alerts
            .iter()
            .filter(|a| !a.is_sent)
            .filter_map(|a| {
                let owner = owner_of(a)?;
                let expiry_date = state
                    .documents
                    .get(&(owner.kind, owner.document_id))
                    .cloned()
                    .flatten();
                Some(AlertView {
                    id: a.id,
                    document_id: a.document_id,
                    driver_document_id: a.driver_document_id,
                    alert_type: a.alert_type.clone(),
                    alert_date: a.alert_date,
                    source_type: owner.kind.to_string(),
                    doc_code: None,
                    doc_name: None,
                    doc_type: None,
                    expiry_date,
                    license_plate: None,
                    model: None,
                    department: None,
                    driver_name: None,
                })
            })
            .collect();
        sort_for_listing(&mut views);
        Ok(views)
    }

    async fn acknowledge(&self, alert_id: i64, at: DateTime<Utc>) -> Result<Option<AlertRow>> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && !a.is_sent)
            .map(|a| {
                a.is_sent = true;
                a.sent_at = Some(at);
                a.clone()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_store_reports_store_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.pending_alerts().await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
