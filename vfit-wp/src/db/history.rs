//! Completed workout history
//!
//! Keeps the most recent completions (100 by default), newest first.

use crate::error::Result;
use crate::playback::CompletionReporter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};
use vfit_common::events::{CompletionSummary, EquipmentEntry};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub workout_name: String,
    pub completed_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub exercise_count: usize,
    pub exercises_with_equipment: Vec<EquipmentEntry>,
}

type HistoryRow = (i64, String, DateTime<Utc>, i64, i64, Json<Vec<EquipmentEntry>>);

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        let (id, workout_name, completed_at, elapsed, count, Json(equipment)) = row;
        Self {
            id,
            workout_name,
            completed_at,
            elapsed_seconds: u64::try_from(elapsed).unwrap_or(0),
            exercise_count: usize::try_from(count).unwrap_or(0),
            exercises_with_equipment: equipment,
        }
    }
}

pub struct HistoryStore {
    db: Pool<Sqlite>,
    limit: usize,
}

impl HistoryStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self {
            db,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` entries (at least one)
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Store a completion and drop entries beyond the limit
    pub async fn insert(&self, summary: &CompletionSummary) -> Result<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO workout_history
                (workout_name, completed_at, elapsed_seconds, exercise_count, equipment)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.workout_name)
        .bind(Utc::now())
        .bind(i64::try_from(summary.elapsed_seconds).unwrap_or(i64::MAX))
        .bind(i64::try_from(summary.exercise_count).unwrap_or(i64::MAX))
        .bind(Json(&summary.exercises_with_equipment))
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        let trimmed = sqlx::query(
            r#"
            DELETE FROM workout_history
            WHERE id NOT IN (
                SELECT id FROM workout_history ORDER BY id DESC LIMIT ?
            )
            "#,
        )
        .bind(i64::try_from(self.limit).unwrap_or(i64::MAX))
        .execute(&self.db)
        .await?
        .rows_affected();

        if trimmed > 0 {
            debug!("Trimmed {} old history entries", trimmed);
        }
        Ok(id)
    }

    /// Newest first
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT id, workout_name, completed_at, elapsed_seconds, exercise_count, equipment
            FROM workout_history
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM workout_history")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CompletionReporter for HistoryStore {
    async fn record(&self, summary: &CompletionSummary) -> Result<()> {
        let id = self.insert(summary).await?;
        info!(
            "Recorded workout '{}' in history (#{}, {} exercises)",
            summary.workout_name, id, summary.exercise_count
        );
        Ok(())
    }
}
