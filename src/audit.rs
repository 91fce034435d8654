use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect,
    TransactionTrait, sea_query::OnConflict,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    entity::{
        ActivityLogs, AuditOutbox, activity_logs,
        audit_outbox::{self, Column as OutboxCol},
    },
    error::AppResult,
};

const RELAY_BATCH: u64 = 100;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<Uuid>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
}

impl AuditEntry {
    pub fn new(user_id: Option<Uuid>, action: impl Into<String>, table_name: &str) -> Self {
        Self {
            user_id,
            action: action.into(),
            table_name: Some(table_name.to_string()),
            record_id: None,
            old_values: None,
            new_values: None,
        }
    }

    pub fn record(mut self, id: Uuid) -> Self {
        self.record_id = Some(id);
        self
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

/// Queue an entry on the caller's connection, normally an open transaction, so
/// the entry exists only if the change commits.
pub async fn enqueue<C>(conn: &C, entry: AuditEntry) -> AppResult<Uuid>
where
    C: ConnectionTrait,
{
    let id = Uuid::new_v4();
    let row = audit_outbox::ActiveModel {
        id: Set(id),
        user_id: Set(entry.user_id),
        action: Set(entry.action),
        table_name: Set(entry.table_name),
        record_id: Set(entry.record_id),
        old_values: Set(entry.old_values),
        new_values: Set(entry.new_values),
        created_at: Set(Utc::now().into()),
    };
    AuditOutbox::insert(row).exec_without_returning(conn).await?;
    Ok(id)
}

/// Move pending outbox rows into `activity_logs`. Returns how many were delivered.
///
/// A row that already reached `activity_logs` (a previous pass died between
/// insert and delete) is skipped by id and only removed from the outbox.
pub async fn relay_pending(orm: &DatabaseConnection) -> AppResult<usize> {
    let pending = AuditOutbox::find()
        .order_by_asc(OutboxCol::CreatedAt)
        .limit(RELAY_BATCH)
        .all(orm)
        .await?;

    let mut delivered = 0;
    for row in pending {
        let txn = orm.begin().await?;
        let log = activity_logs::ActiveModel {
            id: Set(row.id),
            user_id: Set(row.user_id),
            action: Set(row.action),
            table_name: Set(row.table_name),
            record_id: Set(row.record_id),
            old_values: Set(row.old_values),
            new_values: Set(row.new_values),
            created_at: Set(row.created_at),
        };
        ActivityLogs::insert(log)
            .on_conflict(
                OnConflict::column(activity_logs::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
        AuditOutbox::delete_by_id(row.id).exec(&txn).await?;
        txn.commit().await?;
        delivered += 1;
    }

    Ok(delivered)
}

/// Relay right after a commit. Failures are left for the background task.
pub async fn deliver_best_effort(orm: &DatabaseConnection) {
    if let Err(err) = relay_pending(orm).await {
        tracing::warn!(error = %err, "audit log failed");
    }
}

pub fn spawn_relay(orm: DatabaseConnection, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match relay_pending(&orm).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "relayed audit entries"),
                Err(err) => tracing::warn!(error = %err, "audit relay pass failed"),
            }
        }
    })
}
