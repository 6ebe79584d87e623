//! Loads the live form/task schema from Postgres.

use sqlx::postgres::PgPool;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::postgres::executor::execution;
use crate::types::config::AnalyticsConfig;
use crate::types::schema::{Form, Question, QuestionType, Schema, Task};

/// Read forms, questions and tasks into a fresh snapshot.
///
/// Question order within a form follows `form_questions.sort`. Questions
/// with a type this crate does not know are skipped.
#[instrument(skip(pool, config))]
pub async fn load_schema(pool: &PgPool, config: &AnalyticsConfig) -> Result<Schema> {
    let mut schema = Schema::new().with_meta_fields(config.meta_fields.iter().cloned());

    let forms: Vec<(String, String)> = sqlx::query_as("SELECT slug, name FROM forms ORDER BY slug")
        .fetch_all(pool)
        .await
        .map_err(execution)?;
    for (slug, name) in forms {
        schema = schema.with_form(Form::new(slug, name));
    }

    let questions: Vec<(String, String, String, Option<String>)> =
        sqlx::query_as("SELECT slug, label, type, sub_form_id FROM questions ORDER BY slug")
            .fetch_all(pool)
            .await
            .map_err(execution)?;
    for (slug, label, raw_type, sub_form) in questions {
        let Some(question_type) = QuestionType::parse(&raw_type) else {
            warn!(question = %slug, question_type = %raw_type, "Skipping question of unknown type");
            continue;
        };
        let mut question = Question::new(slug, label, question_type);
        question.sub_form = sub_form;
        schema = schema.with_question(question);
    }

    let links: Vec<(String, String)> = sqlx::query_as(
        "SELECT form_id, question_id FROM form_questions ORDER BY form_id, sort, question_id",
    )
    .fetch_all(pool)
    .await
    .map_err(execution)?;
    for (form, question) in links {
        if let Some(form) = schema.forms.get_mut(&form) {
            form.questions.push(question);
        }
    }

    let tasks: Vec<(String, String, Option<String>)> =
        sqlx::query_as("SELECT slug, name, form_id FROM tasks ORDER BY slug")
            .fetch_all(pool)
            .await
            .map_err(execution)?;
    for (slug, name, form) in tasks {
        let mut task = Task::new(slug, name);
        task.form = form;
        schema = schema.with_task(task);
    }

    info!(
        forms = schema.forms.len(),
        questions = schema.questions.len(),
        tasks = schema.tasks.len(),
        "Loaded schema"
    );
    Ok(schema)
}
