//! Administrative audit sink.
//!
//! Records who changed whose permissions. Recording is fire-and-forget: a
//! sink failure is logged and must never abort the administrative action
//! that triggered it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use service_core::error::AppError;

/// One administrative event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub target_user_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        action: &str,
        target_user_id: Option<Uuid>,
        actor_id: Uuid,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action: action.to_string(),
            target_user_id,
            actor_id,
            details,
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError>;
}

/// Record an event without blocking or failing the caller.
pub fn record_detached(sink: Arc<dyn AuditSink>, event: AuditEvent) {
    tokio::spawn(async move {
        if let Err(e) = sink.record(event).await {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    });
}

/// Sink that writes structured log lines only.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        tracing::info!(
            action = %event.action,
            target_user_id = ?event.target_user_id,
            actor_id = %event.actor_id,
            details = %event.details,
            "Audit event"
        );
        Ok(())
    }
}

/// Sink backed by the `authz_audit_events` table.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO authz_audit_events \
             (action, target_user_id, actor_id, details, recorded_utc) \
             VALUES ($1, $2, $3, $4, NOW())",
        )
        .bind(&event.action)
        .bind(event.target_user_id)
        .bind(event.actor_id)
        .bind(&event.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Collecting sink for tests.
#[derive(Default)]
pub struct MockAuditSink {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl MockAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for MockAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        self.events
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mutex poisoned: {}", e)))?
            .push(event);
        Ok(())
    }
}
