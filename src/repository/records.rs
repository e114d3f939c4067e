//! Diesel ORM records for the event tables.
//!
//! These are the raw row shapes with TEXT timestamps and JSON columns;
//! repositories convert them to the domain models in `crate::models`.

use diesel::prelude::*;

use crate::schema;

/// Run row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunRecord {
    pub id: String,
    pub pipeline_name: String,
    pub status: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub metadata: Option<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub environment: Option<String>,
    pub error_message: Option<String>,
}

/// New run for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::runs)]
pub struct NewRun<'a> {
    pub id: &'a str,
    pub pipeline_name: &'a str,
    pub status: &'a str,
    pub started_at: &'a str,
    pub input_summary: Option<&'a str>,
    pub metadata: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub environment: Option<&'a str>,
}

/// Step row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::steps)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StepRecord {
    pub id: String,
    pub run_id: String,
    pub step_name: String,
    pub step_type: String,
    pub step_index: i32,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub input_count: Option<i64>,
    pub output_count: Option<i64>,
    pub reasoning: Option<String>,
    pub metadata: Option<String>,
    pub error_message: Option<String>,
}

/// New step for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::steps)]
pub struct NewStep<'a> {
    pub id: &'a str,
    pub run_id: &'a str,
    pub step_name: &'a str,
    pub step_type: &'a str,
    pub step_index: i32,
    pub started_at: &'a str,
    pub status: &'a str,
    pub input_summary: Option<&'a str>,
    pub input_count: Option<i64>,
    pub metadata: Option<&'a str>,
}

/// Payload row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::payloads)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PayloadRecord {
    pub id: i32,
    pub run_id: String,
    pub step_id: Option<String>,
    pub phase: String,
    pub ref_id: String,
    pub body: String,
    pub created_at: String,
}

/// New payload for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::payloads)]
pub struct NewPayload<'a> {
    pub run_id: &'a str,
    pub step_id: Option<&'a str>,
    pub phase: &'a str,
    pub ref_id: &'a str,
    pub body: &'a str,
    pub created_at: &'a str,
}
