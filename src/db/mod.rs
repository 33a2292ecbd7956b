use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::error::Result;
use crate::models::alert::sort_for_listing;
use crate::models::{
    AlertOwner, AlertRow, AlertView, DocumentExpiry, DocumentKind, PendingAlert, PendingAlertRow,
};
use crate::processor::expiry::Bucket;

#[cfg(test)]
pub mod memory;
pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// What a single document sync changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Pending alerts with a different bucket that were removed.
    pub superseded: u64,
    pub created: bool,
}

/// Persistence consumed by the alert engine.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Documents of `kind` whose expiry value is not null.
    async fn documents_with_expiry(&self, kind: DocumentKind) -> Result<Vec<DocumentExpiry>>;

    /// Every un-acknowledged alert with its owner's current expiry value.
    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>>;

    /// Atomically delete the owner's pending alerts of any other bucket and insert
    /// one for `bucket` unless it already exists.
    async fn supersede_and_insert(
        &self,
        owner: AlertOwner,
        bucket: Bucket,
        at: DateTime<Utc>,
    ) -> Result<SyncOutcome>;

    /// Delete `alert` if it is still pending with the same label. Returns whether a row went.
    async fn delete_pending_alert(&self, alert: &PendingAlert) -> Result<bool>;

    /// Active alerts with display fields, in listing order.
    async fn active_alerts(&self) -> Result<Vec<AlertView>>;

    /// Mark a pending alert as sent. `None` when no pending alert has this id.
    async fn acknowledge(&self, alert_id: i64, at: DateTime<Utc>) -> Result<Option<AlertRow>>;
}

#[derive(Clone)]
pub struct PgAlertStore {
    pool: DbPool,
}

impl PgAlertStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn documents_with_expiry(&self, kind: DocumentKind) -> Result<Vec<DocumentExpiry>> {
        let sql = match kind {
            DocumentKind::Vehicle => queries::SELECT_VEHICLE_DOCUMENTS_WITH_EXPIRY,
            DocumentKind::Driver => queries::SELECT_DRIVER_DOCUMENTS_WITH_EXPIRY,
        };
        let rows = sqlx::query_as::<_, DocumentExpiry>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>> {
        let rows = sqlx::query_as::<_, PendingAlertRow>(queries::SELECT_PENDING_ALERTS_WITH_EXPIRY)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PendingAlertRow::into_pending).collect())
    }

    async fn supersede_and_insert(
        &self,
        owner: AlertOwner,
        bucket: Bucket,
        at: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let (delete_sql, exists_sql, insert_sql) = match owner.kind {
            DocumentKind::Vehicle => (
                queries::DELETE_SUPERSEDED_VEHICLE_ALERTS,
                queries::EXISTS_VEHICLE_ALERT,
                queries::INSERT_VEHICLE_ALERT,
            ),
            DocumentKind::Driver => (
                queries::DELETE_SUPERSEDED_DRIVER_ALERTS,
                queries::EXISTS_DRIVER_ALERT,
                queries::INSERT_DRIVER_ALERT,
            ),
        };

        let mut tx = self.pool.begin().await?;

        // Serializes overlapping generator and cleaner passes on this document.
        sqlx::query(queries::LOCK_DOCUMENT_ALERTS)
            .bind(owner.lock_key())
            .execute(&mut *tx)
            .await?;

        let superseded = sqlx::query(delete_sql)
            .bind(owner.document_id)
            .bind(bucket.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let exists: bool = sqlx::query_scalar(exists_sql)
            .bind(owner.document_id)
            .bind(bucket.as_str())
            .fetch_one(&mut *tx)
            .await?;

        if !exists {
            sqlx::query(insert_sql)
                .bind(owner.document_id)
                .bind(bucket.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(SyncOutcome {
            superseded,
            created: !exists,
        })
    }

    async fn delete_pending_alert(&self, alert: &PendingAlert) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if let Some(owner) = alert.owner {
            sqlx::query(queries::LOCK_DOCUMENT_ALERTS)
                .bind(owner.lock_key())
                .execute(&mut *tx)
                .await?;
        }

        let deleted = sqlx::query(queries::DELETE_PENDING_ALERT)
            .bind(alert.alert_id)
            .bind(&alert.alert_type)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn active_alerts(&self) -> Result<Vec<AlertView>> {
        let mut alerts = sqlx::query_as::<_, AlertView>(queries::SELECT_ACTIVE_VEHICLE_ALERTS)
            .fetch_all(&self.pool)
            .await?;
        let driver_alerts = sqlx::query_as::<_, AlertView>(queries::SELECT_ACTIVE_DRIVER_ALERTS)
            .fetch_all(&self.pool)
            .await?;
        debug!(
            vehicle = alerts.len(),
            driver = driver_alerts.len(),
            "Loaded active alerts"
        );

        alerts.extend(driver_alerts);
        sort_for_listing(&mut alerts);
        Ok(alerts)
    }

    async fn acknowledge(&self, alert_id: i64, at: DateTime<Utc>) -> Result<Option<AlertRow>> {
        let row = sqlx::query_as::<_, AlertRow>(queries::ACKNOWLEDGE_ALERT)
            .bind(alert_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
