//! Testing utilities including a mock executor and a schema fixture.
//!
//! These are useful for testing applications that compile analytics tables
//! without a database.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::error::{AnalyticsError, Result};
use crate::ir::render::SqlStatement;
use crate::traits::executor::Executor;
use crate::types::schema::{Form, Question, QuestionType, Schema, Task};
use crate::types::value::{Record, Value};

/// A mock executor for testing.
///
/// Returns the configured rows for every statement and records what it
/// was asked to run.
#[derive(Clone, Default)]
pub struct MockExecutor {
    rows: Arc<RwLock<Vec<Record>>>,

    /// Error message returned instead of rows
    failure: Option<String>,

    /// Statements received, in call order
    statements: Arc<RwLock<Vec<SqlStatement>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor whose every call fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        *self.rows.write().unwrap() = rows;
        self
    }

    pub fn statements(&self) -> Vec<SqlStatement> {
        self.statements.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.statements.read().unwrap().len()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn fetch_all(&self, statement: &SqlStatement) -> Result<Vec<Record>> {
        self.statements.write().unwrap().push(statement.clone());
        match &self.failure {
            Some(message) => Err(AnalyticsError::Execution(message.clone().into())),
            None => Ok(self.rows.read().unwrap().clone()),
        }
    }
}

/// Build a raw row from `(column, value)` pairs.
pub fn record<const N: usize>(cells: [(&str, Value); N]) -> Record {
    cells
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

/// A small but complete schema.
///
/// - `main` (Main): `amount` float, `region` choice, `due` date, `notes`
///   text, `address` sub-form, `attachments` files
/// - `address-form` (Address): `city` text
/// - `review-form` (Review): `decision` choice, `score` integer
/// - tasks `review` (form `review-form`) and `submit` (no form)
/// - meta keys `region` and `priority`
pub fn sample_schema() -> Schema {
    Schema::new()
        .with_form(Form::new("main", "Main").with_questions([
            "amount",
            "region",
            "due",
            "notes",
            "address",
            "attachments",
        ]))
        .with_form(Form::new("address-form", "Address").with_questions(["city"]))
        .with_form(Form::new("review-form", "Review").with_questions(["decision", "score"]))
        .with_question(Question::new("amount", "Amount", QuestionType::Float))
        .with_question(Question::new("region", "Region", QuestionType::Choice))
        .with_question(Question::new("due", "Due date", QuestionType::Date))
        .with_question(Question::new("notes", "Notes", QuestionType::Textarea))
        .with_question(Question::sub_form("address", "Address", "address-form"))
        .with_question(Question::new("attachments", "Attachments", QuestionType::Files))
        .with_question(Question::new("city", "City", QuestionType::Text))
        .with_question(Question::new("decision", "Decision", QuestionType::Choice))
        .with_question(Question::new("score", "Score", QuestionType::Integer))
        .with_task(Task::new("review", "Review").with_form("review-form"))
        .with_task(Task::new("submit", "Submit"))
        .with_meta_fields(["region", "priority"])
}
