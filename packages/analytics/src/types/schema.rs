//! Live schema snapshot: forms, questions, tasks and allowed meta keys.
//!
//! Field resolution always runs against a snapshot loaded for the current
//! request, so schema edits are visible on the next compile.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Question types as stored in the `questions.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Textarea,
    Integer,
    Float,
    CalculatedFloat,
    Date,
    Choice,
    DynamicChoice,
    MultipleChoice,
    DynamicMultipleChoice,
    Form,
    Table,
    Files,
    Static,
    ActionButton,
}

impl QuestionType {
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase())).ok()
    }

    /// Whether answers to this type can be extracted at all.
    pub fn is_supported(&self) -> bool {
        !matches!(
            self,
            QuestionType::Table
                | QuestionType::Files
                | QuestionType::Static
                | QuestionType::ActionButton
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            QuestionType::Integer | QuestionType::Float | QuestionType::CalculatedFloat
        )
    }

    /// Types whose values are ordered (MIN/MAX make sense).
    pub fn is_comparable(&self) -> bool {
        matches!(
            self,
            QuestionType::Text
                | QuestionType::Textarea
                | QuestionType::Date
                | QuestionType::Choice
                | QuestionType::DynamicChoice
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub slug: String,
    pub label: String,
    pub question_type: QuestionType,
    /// Target form of a `form` question.
    pub sub_form: Option<String>,
}

impl Question {
    pub fn new(slug: impl Into<String>, label: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
            question_type,
            sub_form: None,
        }
    }

    pub fn sub_form(slug: impl Into<String>, label: impl Into<String>, form: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
            question_type: QuestionType::Form,
            sub_form: Some(form.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub slug: String,
    pub name: String,
    /// Question slugs in display order.
    pub questions: Vec<String>,
}

impl Form {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            questions: vec![],
        }
    }

    pub fn with_questions(mut self, slugs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.questions.extend(slugs.into_iter().map(|s| s.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub slug: String,
    pub name: String,
    /// Form of the documents attached to this task's work items.
    pub form: Option<String>,
}

impl Task {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            form: None,
        }
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }
}

/// Everything field resolution needs to know about the live schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub forms: IndexMap<String, Form>,
    pub questions: IndexMap<String, Question>,
    pub tasks: IndexMap<String, Task>,
    /// Allowed `meta` keys.
    pub meta_fields: Vec<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.forms.insert(form.slug.clone(), form);
        self
    }

    pub fn with_question(mut self, question: Question) -> Self {
        self.questions.insert(question.slug.clone(), question);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.insert(task.slug.clone(), task);
        self
    }

    pub fn with_meta_fields(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.meta_fields = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    pub fn form(&self, slug: &str) -> Option<&Form> {
        self.forms.get(slug)
    }

    pub fn task(&self, slug: &str) -> Option<&Task> {
        self.tasks.get(slug)
    }

    /// Supported questions of a form, in form order.
    pub fn form_questions(&self, form: &str) -> Vec<&Question> {
        self.forms
            .get(form)
            .map(|f| {
                f.questions
                    .iter()
                    .filter_map(|slug| self.questions.get(slug))
                    .filter(|q| q.question_type.is_supported())
                    .collect()
            })
            .unwrap_or_default()
    }
}
