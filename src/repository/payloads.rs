//! Externalized payload persistence.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::{Map, Value};

use super::pool::AsyncSqlitePool;
use super::records::{NewPayload, PayloadRecord};
use super::{parse_datetime, Result};
use crate::models::{Payload, Phase};
use crate::schema::payloads;

impl From<PayloadRecord> for Payload {
    fn from(record: PayloadRecord) -> Self {
        Payload {
            id: record.id,
            run_id: record.run_id,
            step_id: record.step_id,
            phase: Phase::from_str(&record.phase).unwrap_or(Phase::Input),
            ref_id: record.ref_id,
            body: serde_json::from_str(&record.body).unwrap_or(Value::Null),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// Diesel-based payload repository.
#[derive(Clone)]
pub struct PayloadRepository {
    pool: AsyncSqlitePool,
}

impl PayloadRepository {
    /// Create a new payload repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one row per `ref_id -> body` entry.
    ///
    /// Rows are never mutated afterwards; they disappear with the owning
    /// run through the cascade.
    pub async fn create_payloads(
        &self,
        run_id: &str,
        step_id: Option<&str>,
        phase: Phase,
        entries: &Map<String, Value>,
    ) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get().await?;
        let created_at = Utc::now().to_rfc3339();

        let mut bodies = Vec::with_capacity(entries.len());
        for (ref_id, body) in entries {
            bodies.push((ref_id.as_str(), serde_json::to_string(body)?));
        }

        let rows: Vec<NewPayload<'_>> = bodies
            .iter()
            .map(|(ref_id, body)| NewPayload {
                run_id,
                step_id,
                phase: phase.as_str(),
                ref_id: *ref_id,
                body: body.as_str(),
                created_at: &created_at,
            })
            .collect();

        let mut inserted = 0;
        for row in &rows {
            inserted += diesel::insert_into(payloads::table)
                .values(row)
                .execute(&mut conn)
                .await?;
        }
        Ok(inserted)
    }

    /// All payloads stored for a run.
    pub async fn for_run(&self, run_id: &str) -> Result<Vec<Payload>> {
        let mut conn = self.pool.get().await?;

        let records = payloads::table
            .filter(payloads::run_id.eq(run_id))
            .order(payloads::id.asc())
            .load::<PayloadRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(Payload::from).collect())
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

    async fn setup() -> (AsyncSqlitePool, RunRepository, Uuid, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db_url = db_path.display().to_string();
        run_migrations(&db_url).await.unwrap();
        let pool = AsyncSqlitePool::new(&db_url);

        let runs = RunRepository::new(pool.clone());
        let run_id = Uuid::new_v4();
        runs.create(&RunStartEvent {
            id: run_id,
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

        (pool, runs, run_id, dir)
    }

    #[tokio::test]
    async fn test_create_and_list_payloads() {
        let (pool, _runs, run_id, _dir) = setup().await;
        let repo = PayloadRepository::new(pool);

        let mut entries = Map::new();
        entries.insert("p-001".to_string(), json!({"rows": [1, 2, 3]}));
        entries.insert("p-002".to_string(), json!("raw text"));

        let inserted = repo
            .create_payloads(&run_id.to_string(), None, Phase::Input, &entries)
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let stored = repo.for_run(&run_id.to_string()).await.unwrap();
        assert_eq!(stored.len(), 2);
        let ref_ids: Vec<&str> = stored.iter().map(|p| p.ref_id.as_str()).collect();
        assert!(ref_ids.contains(&"p-001"));
        assert!(ref_ids.contains(&"p-002"));
        assert!(stored.iter().all(|p| p.phase == Phase::Input));
        assert!(stored.iter().all(|p| p.step_id.is_none()));
    }

    #[tokio::test]
    async fn test_empty_map_inserts_nothing() {
        let (pool, _runs, run_id, _dir) = setup().await;
        let repo = PayloadRepository::new(pool);

        let inserted = repo
            .create_payloads(&run_id.to_string(), None, Phase::Output, &Map::new())
            .await
            .unwrap();
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn test_orphan_payload_rejected_by_foreign_key() {
        let (pool, _runs, _run_id, _dir) = setup().await;
        let repo = PayloadRepository::new(pool);

        let mut entries = Map::new();
        entries.insert("p-001".to_string(), json!(1));
        let result = repo
            .create_payloads(&Uuid::new_v4().to_string(), None, Phase::Input, &entries)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_run_cascades_to_payloads() {
        let (pool, runs, run_id, _dir) = setup().await;
        let repo = PayloadRepository::new(pool);

        let mut entries = Map::new();
        entries.insert("p-001".to_string(), json!({"kept": true}));
        repo.create_payloads(&run_id.to_string(), None, Phase::Input, &entries)
            .await
            .unwrap();

        assert!(runs.delete(&run_id.to_string()).await.unwrap());
        assert!(repo.for_run(&run_id.to_string()).await.unwrap().is_empty());
    }
}
