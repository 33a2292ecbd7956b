use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::document::AlertOwner;
use crate::processor::expiry::Bucket;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub document_id: Option<i64>,
    pub driver_document_id: Option<i64>,
    pub alert_type: String, // Enum labels stored as text
    pub alert_date: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Un-acknowledged alert joined to its owner's current expiry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlert {
    pub alert_id: i64,
    /// `None` when the row points at neither or both document tables.
    pub owner: Option<AlertOwner>,
    /// Raw stored label; labels outside the known buckets are always stale.
    pub alert_type: String,
    pub expiry_date: Option<String>,
}

impl PendingAlert {
    pub fn bucket(&self) -> Option<Bucket> {
        self.alert_type.parse().ok()
    }
}

#[derive(Debug, FromRow)]
pub struct PendingAlertRow {
    pub alert_id: i64,
    pub document_id: Option<i64>,
    pub driver_document_id: Option<i64>,
    pub alert_type: String,
    pub expiry_date: Option<String>,
}

impl PendingAlertRow {
    pub fn into_pending(self) -> PendingAlert {
        PendingAlert {
            alert_id: self.alert_id,
            owner: AlertOwner::from_columns(self.document_id, self.driver_document_id),
            alert_type: self.alert_type,
            expiry_date: self.expiry_date,
        }
    }
}

/// An active alert with the display fields of its document, vehicle or driver.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AlertView {
    pub id: i64,
    pub document_id: Option<i64>,
    pub driver_document_id: Option<i64>,
    pub alert_type: String,
    pub alert_date: DateTime<Utc>,
    pub source_type: String,
    pub doc_code: Option<String>,
    pub doc_name: Option<String>,
    pub doc_type: Option<String>,
    pub expiry_date: Option<String>,
    pub license_plate: Option<String>,
    pub model: Option<String>,
    pub department: Option<String>,
    pub driver_name: Option<String>,
}

impl AlertView {
    pub fn is_urgent(&self) -> bool {
        self.alert_type
            .parse::<Bucket>()
            .map(|b| b.is_urgent())
            .unwrap_or(false)
    }
}

/// Listing order: oldest first, ties broken by alert type label descending.
pub fn sort_for_listing(alerts: &mut [AlertView]) {
    alerts.sort_by(|a, b| {
        a.alert_date
            .cmp(&b.alert_date)
            .then_with(|| b.alert_type.cmp(&a.alert_type))
    });
}
