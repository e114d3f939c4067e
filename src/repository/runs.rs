//! Run persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::AsyncSqlitePool;
use super::records::{NewRun, RunRecord};
use super::{parse_datetime, parse_datetime_opt, parse_json_opt, to_json_opt, Result};
use crate::events::{RunEndEvent, RunStartEvent};
use crate::models::{Run, RunStatus};
use crate::schema::runs;

impl From<RunRecord> for Run {
    fn from(record: RunRecord) -> Self {
        Run {
            id: record.id,
            pipeline_name: record.pipeline_name,
            status: RunStatus::from_str(&record.status).unwrap_or(RunStatus::Running),
            started_at: parse_datetime(&record.started_at),
            ended_at: parse_datetime_opt(record.ended_at),
            input_summary: parse_json_opt(record.input_summary),
            output_summary: parse_json_opt(record.output_summary),
            metadata: parse_json_opt(record.metadata),
            request_id: record.request_id,
            user_id: record.user_id,
            environment: record.environment,
            error_message: record.error_message,
        }
    }
}

/// Diesel-based run repository.
#[derive(Clone)]
pub struct RunRepository {
    pool: AsyncSqlitePool,
}

impl RunRepository {
    /// Create a new run repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new run row and return it.
    ///
    /// A duplicate id fails with a unique-violation database error; the
    /// server never upserts over an existing run.
    pub async fn create(&self, event: &RunStartEvent) -> Result<Run> {
        let mut conn = self.pool.get().await?;

        let id = event.id.to_string();
        let started_at = event.started_at.to_rfc3339();
        let input_summary = to_json_opt(event.input_summary.as_ref())?;
        let metadata = to_json_opt(event.metadata.as_ref())?;

        let new_run = NewRun {
            id: &id,
            pipeline_name: &event.pipeline_name,
            status: event.status.as_str(),
            started_at: &started_at,
            input_summary: input_summary.as_deref(),
            metadata: metadata.as_deref(),
            request_id: event.request_id.as_deref(),
            user_id: event.user_id.as_deref(),
            environment: event.environment.as_deref(),
        };

        diesel::insert_into(runs::table)
            .values(&new_run)
            .execute(&mut conn)
            .await?;

        let record = runs::table.find(&id).first::<RunRecord>(&mut conn).await?;
        Ok(Run::from(record))
    }

    /// Update a run with completion data. Returns None when no row exists.
    pub async fn end(&self, event: &RunEndEvent) -> Result<Option<Run>> {
        let mut conn = self.pool.get().await?;

        let id = event.id.to_string();
        let ended_at = event.ended_at.to_rfc3339();
        let output_summary = to_json_opt(event.output_summary.as_ref())?;

        let rows = diesel::update(runs::table.find(&id))
            .set((
                runs::status.eq(event.status.as_str()),
                runs::ended_at.eq(Some(ended_at.as_str())),
                runs::output_summary.eq(output_summary.as_deref()),
                runs::error_message.eq(event.error_message.as_deref()),
            ))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Ok(None);
        }

        let record = runs::table.find(&id).first::<RunRecord>(&mut conn).await?;
        Ok(Some(Run::from(record)))
    }

    /// Get a run by id.
    pub async fn get(&self, id: &str) -> Result<Option<Run>> {
        let mut conn = self.pool.get().await?;

        let record = runs::table
            .find(id)
            .first::<RunRecord>(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Run::from))
    }

    /// Delete a run; steps and payloads cascade.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::delete(runs::table.find(id))
            .execute(&mut conn)
            .await?;
        Ok(rows > 0)
    }
}
