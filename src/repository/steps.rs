//! Step persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::AsyncSqlitePool;
use super::records::{NewStep, StepRecord};
use super::{parse_datetime, parse_datetime_opt, parse_json_opt, to_json_opt, Result};
use crate::events::{StepEndEvent, StepStartEvent};
use crate::models::{Step, StepStatus, StepType};
use crate::schema::steps;

impl From<StepRecord> for Step {
    fn from(record: StepRecord) -> Self {
        Step {
            id: record.id,
            run_id: record.run_id,
            step_name: record.step_name,
            step_type: StepType::from_str(&record.step_type).unwrap_or(StepType::Other),
            index: record.step_index,
            started_at: parse_datetime(&record.started_at),
            ended_at: parse_datetime_opt(record.ended_at),
            duration_ms: record.duration_ms,
            status: StepStatus::from_str(&record.status).unwrap_or(StepStatus::Running),
            input_summary: parse_json_opt(record.input_summary),
            output_summary: parse_json_opt(record.output_summary),
            input_count: record.input_count,
            output_count: record.output_count,
            reasoning: parse_json_opt(record.reasoning),
            metadata: parse_json_opt(record.metadata),
            error_message: record.error_message,
        }
    }
}

/// Diesel-based step repository.
#[derive(Clone)]
pub struct StepRepository {
    pool: AsyncSqlitePool,
}

impl StepRepository {
    /// Create a new step repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new step row and return it.
    ///
    /// The parent run must already exist; SQLite rejects orphans through
    /// the foreign key.
    pub async fn create(&self, event: &StepStartEvent) -> Result<Step> {
        let mut conn = self.pool.get().await?;

        let id = event.id.to_string();
        let run_id = event.run_id.to_string();
        let started_at = event.started_at.to_rfc3339();
        let input_summary = to_json_opt(event.input_summary.as_ref())?;
        let metadata = to_json_opt(event.metadata.as_ref())?;

        let new_step = NewStep {
            id: &id,
            run_id: &run_id,
            step_name: &event.step_name,
            step_type: event.step_type.as_str(),
            step_index: event.index,
            started_at: &started_at,
            status: StepStatus::Running.as_str(),
            input_summary: input_summary.as_deref(),
            input_count: event.input_count,
            metadata: metadata.as_deref(),
        };

        diesel::insert_into(steps::table)
            .values(&new_step)
            .execute(&mut conn)
            .await?;

        let record = steps::table.find(&id).first::<StepRecord>(&mut conn).await?;
        Ok(Step::from(record))
    }

    /// Update a step with completion data. Returns None when no row exists.
    ///
    /// The returned step carries the authoritative `run_id` from the
    /// database, which callers must prefer over the client-supplied one.
    pub async fn end(&self, event: &StepEndEvent) -> Result<Option<Step>> {
        let mut conn = self.pool.get().await?;

        let id = event.id.to_string();
        let ended_at = event.ended_at.to_rfc3339();
        let output_summary = to_json_opt(event.output_summary.as_ref())?;
        let reasoning = to_json_opt(event.reasoning.as_ref())?;

        let rows = diesel::update(steps::table.find(&id))
            .set((
                steps::status.eq(event.status.as_str()),
                steps::ended_at.eq(Some(ended_at.as_str())),
                steps::duration_ms.eq(event.duration_ms),
                steps::output_summary.eq(output_summary.as_deref()),
                steps::output_count.eq(event.output_count),
                steps::reasoning.eq(reasoning.as_deref()),
                steps::error_message.eq(event.error_message.as_deref()),
            ))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Ok(None);
        }

        let record = steps::table.find(&id).first::<StepRecord>(&mut conn).await?;
        Ok(Some(Step::from(record)))
    }

    /// Get a step by id.
    pub async fn get(&self, id: &str) -> Result<Option<Step>> {
        let mut conn = self.pool.get().await?;

        let record = steps::table
            .find(id)
            .first::<StepRecord>(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Step::from))
    }

    /// All steps of a run, ordered by index.
    pub async fn for_run(&self, run_id: &str) -> Result<Vec<Step>> {
        let mut conn = self.pool.get().await?;

        let records = steps::table
            .filter(steps::run_id.eq(run_id))
            .order(steps::step_index.asc())
            .load::<StepRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(Step::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;
    use uuid::Uuid;

    use crate::events::RunStartEvent;
    use crate::models::RunStatus;
    use crate::repository::{run_migrations, RunRepository};

    async fn setup_test_pool() -> (AsyncSqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db_url = db_path.display().to_string();
        run_migrations(&db_url).await.unwrap();
        (AsyncSqlitePool::new(&db_url), dir)
    }

    async fn create_run(pool: &AsyncSqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        RunRepository::new(pool.clone())
            .create(&RunStartEvent {
                id,
                pipeline_name: "pipeline".to_string(),
                status: RunStatus::Running,
                started_at: Utc::now(),
                input_summary: None,
                metadata: None,
                request_id: None,
                user_id: None,
                environment: None,
                payloads: None,
            })
            .await
            .unwrap();
        id
    }

    fn step_start(id: Uuid, run_id: Uuid, index: i32) -> StepStartEvent {
        StepStartEvent {
            id,
            run_id,
            step_name: format!("step-{index}"),
            step_type: StepType::Filter,
            index,
            started_at: Utc::now(),
            input_summary: Some(json!({"_type": "list", "_count": 3})),
            input_count: Some(3),
            metadata: None,
            payloads: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_end_step() {
        let (pool, _dir) = setup_test_pool().await;
        let run_id = create_run(&pool).await;
        let repo = StepRepository::new(pool);

        let step_id = Uuid::new_v4();
        let created = repo.create(&step_start(step_id, run_id, 0)).await.unwrap();
        assert_eq!(created.status, StepStatus::Running);
        assert_eq!(created.input_count, Some(3));

        let ended = repo
            .end(&StepEndEvent {
                id: step_id,
                run_id,
                status: StepStatus::Success,
                ended_at: Utc::now(),
                duration_ms: Some(42),
                output_summary: Some(json!({"_type": "list", "_count": 2})),
                output_count: Some(2),
                reasoning: Some(json!({"explanation": "kept items in stock"})),
                error_message: None,
                payloads: None,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ended.status, StepStatus::Success);
        assert_eq!(ended.duration_ms, Some(42));
        assert_eq!(ended.run_id, run_id.to_string());
        assert_eq!(
            ended.reasoning,
            Some(json!({"explanation": "kept items in stock"}))
        );
    }

    #[tokio::test]
    async fn test_orphan_step_rejected_by_foreign_key() {
        let (pool, _dir) = setup_test_pool().await;
        let repo = StepRepository::new(pool);

        let result = repo
            .create(&step_start(Uuid::new_v4(), Uuid::new_v4(), 0))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_end_unknown_step_returns_none() {
        let (pool, _dir) = setup_test_pool().await;
        let repo = StepRepository::new(pool);

        let result = repo
            .end(&StepEndEvent {
                id: Uuid::new_v4(),
                run_id: Uuid::new_v4(),
                status: StepStatus::Success,
                ended_at: Utc::now(),
                duration_ms: None,
                output_summary: None,
                output_count: None,
                reasoning: None,
                error_message: None,
                payloads: None,
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_steps_ordered_by_index_with_gaps() {
        let (pool, _dir) = setup_test_pool().await;
        let run_id = create_run(&pool).await;
        let repo = StepRepository::new(pool);

        // Out-of-order arrival with an index gap must be tolerated.
        repo.create(&step_start(Uuid::new_v4(), run_id, 7)).await.unwrap();
        repo.create(&step_start(Uuid::new_v4(), run_id, 0)).await.unwrap();

        let steps = repo.for_run(&run_id.to_string()).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].index, 0);
        assert_eq!(steps[1].index, 7);
    }
}
