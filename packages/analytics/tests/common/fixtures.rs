//! Row builders for the Postgres tests.
//!
//! Every case is created under the harness workflow so tests can restrict
//! their tables to their own rows.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as Json;
use uuid::Uuid;

use super::TestHarness;

impl TestHarness {
    pub async fn create_document(&self, form: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO documents (id, form_id) VALUES ($1, $2)")
            .bind(id)
            .bind(form)
            .execute(&self.db_pool)
            .await?;
        Ok(id)
    }

    pub async fn answer(&self, document: Uuid, question: &str, value: Json) -> Result<()> {
        sqlx::query("INSERT INTO answers (id, document_id, question_id, value) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(document)
            .bind(question)
            .bind(value)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn answer_date(&self, document: Uuid, question: &str, date: NaiveDate) -> Result<()> {
        sqlx::query("INSERT INTO answers (id, document_id, question_id, date) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(document)
            .bind(question)
            .bind(date)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn create_case(
        &self,
        created_at: DateTime<Utc>,
        meta: Json,
        document: Option<Uuid>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO cases (id, created_at, status, workflow_id, meta, document_id) \
             VALUES ($1, $2, 'running', $3, $4, $5)",
        )
        .bind(id)
        .bind(created_at)
        .bind(&self.workflow)
        .bind(meta)
        .bind(document)
        .execute(&self.db_pool)
        .await?;
        Ok(id)
    }

    pub async fn create_work_item(
        &self,
        case: Uuid,
        task: &str,
        created_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO work_items (id, created_at, closed_at, status, task_id, name, case_id) \
             VALUES ($1, $2, $3, 'ready', $4, $4, $5)",
        )
        .bind(id)
        .bind(created_at)
        .bind(closed_at)
        .bind(task)
        .bind(case)
        .execute(&self.db_pool)
        .await?;
        Ok(id)
    }

    pub async fn attach_document(&self, work_item: Uuid, document: Uuid) -> Result<()> {
        sqlx::query("UPDATE work_items SET document_id = $2 WHERE id = $1")
            .bind(work_item)
            .bind(document)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|dt| dt.and_utc())
        .expect("valid date")
}
