//! Field node variants and their static capabilities.

use serde::Serialize;

use crate::ir::query::DatePart;
use crate::types::config::Function;
use crate::types::schema::QuestionType;
use crate::types::value::ValueRule;

/// Index of a node in a [`crate::fields::FieldModel`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Uuid,
    Text,
    Timestamp,
}

/// Which work item of a task represents a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkItemPolicy {
    First,
    Last,
    FirstClosed,
    LastClosed,
}

impl WorkItemPolicy {
    pub const ALL: [WorkItemPolicy; 4] = [
        WorkItemPolicy::First,
        WorkItemPolicy::Last,
        WorkItemPolicy::FirstClosed,
        WorkItemPolicy::LastClosed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemPolicy::First => "first",
            WorkItemPolicy::Last => "last",
            WorkItemPolicy::FirstClosed => "firstclosed",
            WorkItemPolicy::LastClosed => "lastclosed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkItemPolicy::First => "first",
            WorkItemPolicy::Last => "last",
            WorkItemPolicy::FirstClosed => "first closed",
            WorkItemPolicy::LastClosed => "last closed",
        }
    }

    /// Only closed work items qualify.
    pub fn requires_closed(&self) -> bool {
        matches!(self, WorkItemPolicy::FirstClosed | WorkItemPolicy::LastClosed)
    }

    /// Column the candidates are ordered by.
    pub fn order_column(&self) -> &'static str {
        if self.requires_closed() {
            "closed_at"
        } else {
            "created_at"
        }
    }

    pub fn descending(&self) -> bool {
        matches!(self, WorkItemPolicy::Last | WorkItemPolicy::LastClosed)
    }
}

/// Closed set of field variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// A literal column of the current relation.
    Attribute {
        column: &'static str,
        attr_type: AttributeType,
    },
    /// The `meta` JSON bag; a value once a key is selected.
    Meta { key: Option<String> },
    /// One work item of a task per case, chosen by policy.
    WorkItem { task: String, policy: WorkItemPolicy },
    /// Owning case of a work item.
    Case,
    /// Document of a form reached through a `document_id` column. Nested
    /// sub-form documents (`subform_depth > 0`) share their parent's row.
    FormDocument { form: String, subform_depth: u32 },
    /// The root row is itself the document.
    DirectDocument { form: String },
    FormAnswer {
        question: String,
        question_type: QuestionType,
    },
    DateExtractor { part: DatePart },
}

const IDENTITY: &[Function] = &[Function::Value, Function::Group, Function::Count];
const ORDERED: &[Function] = &[
    Function::Value,
    Function::Group,
    Function::Min,
    Function::Max,
    Function::Count,
];

impl FieldKind {
    /// Whether the node yields a scalar.
    pub fn is_value(&self) -> bool {
        match self {
            FieldKind::Attribute { .. } => true,
            FieldKind::Meta { key } => key.is_some(),
            FieldKind::FormAnswer { .. } => true,
            FieldKind::DateExtractor { .. } => true,
            FieldKind::WorkItem { .. }
            | FieldKind::Case
            | FieldKind::FormDocument { .. }
            | FieldKind::DirectDocument { .. } => false,
        }
    }

    /// Whether the node can have children.
    pub fn is_leaf(&self) -> bool {
        match self {
            FieldKind::Attribute { attr_type, .. } => *attr_type != AttributeType::Timestamp,
            FieldKind::Meta { key } => key.is_some(),
            FieldKind::FormAnswer { question_type, .. } => *question_type != QuestionType::Date,
            FieldKind::DateExtractor { .. } => true,
            FieldKind::WorkItem { .. }
            | FieldKind::Case
            | FieldKind::FormDocument { .. }
            | FieldKind::DirectDocument { .. } => false,
        }
    }

    pub fn supported_functions(&self) -> &'static [Function] {
        match self {
            FieldKind::Attribute { attr_type, .. } => match attr_type {
                AttributeType::Uuid => IDENTITY,
                AttributeType::Text | AttributeType::Timestamp => ORDERED,
            },
            FieldKind::Meta { key: Some(_) } | FieldKind::DateExtractor { .. } => &Function::ALL,
            FieldKind::FormAnswer { question_type, .. } => {
                if question_type.is_numeric() {
                    &Function::ALL
                } else if question_type.is_comparable() {
                    ORDERED
                } else {
                    IDENTITY
                }
            }
            FieldKind::Meta { key: None }
            | FieldKind::WorkItem { .. }
            | FieldKind::Case
            | FieldKind::FormDocument { .. }
            | FieldKind::DirectDocument { .. } => &[],
        }
    }

    pub fn value_rule(&self) -> ValueRule {
        match self {
            FieldKind::Attribute {
                attr_type: AttributeType::Timestamp,
                ..
            } => ValueRule::Timestamp,
            FieldKind::FormAnswer { question_type, .. } => {
                if *question_type == QuestionType::Date {
                    ValueRule::Date
                } else if question_type.is_numeric() {
                    ValueRule::Numeric
                } else {
                    ValueRule::Passthrough
                }
            }
            FieldKind::DateExtractor { .. } => ValueRule::Integer,
            _ => ValueRule::Passthrough,
        }
    }
}

/// A resolved path node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNode {
    /// Canonical segment, e.g. `workitem[review,last]`.
    pub identifier: String,
    pub label: String,
    pub kind: FieldKind,
    pub parent: Option<FieldId>,
}

impl FieldNode {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
            kind,
            parent: None,
        }
    }

    pub fn is_value(&self) -> bool {
        self.kind.is_value()
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn supports(&self, function: Function) -> bool {
        self.kind.supported_functions().contains(&function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_attributes_are_not_ordered() {
        let id = FieldKind::Attribute {
            column: "id",
            attr_type: AttributeType::Uuid,
        };
        assert!(id.supported_functions().contains(&Function::Count));
        assert!(!id.supported_functions().contains(&Function::Max));
    }

    #[test]
    fn test_answer_functions_by_type() {
        let answer = |question_type| FieldKind::FormAnswer {
            question: "q".into(),
            question_type,
        };
        assert!(answer(QuestionType::Float)
            .supported_functions()
            .contains(&Function::Sum));
        assert!(!answer(QuestionType::Text)
            .supported_functions()
            .contains(&Function::Avg));
        assert!(answer(QuestionType::Date)
            .supported_functions()
            .contains(&Function::Min));
        assert_eq!(
            answer(QuestionType::MultipleChoice).supported_functions(),
            IDENTITY
        );
    }

    #[test]
    fn test_meta_needs_key() {
        assert!(!FieldKind::Meta { key: None }.is_value());
        assert!(FieldKind::Meta {
            key: Some("region".into())
        }
        .is_leaf());
    }

    #[test]
    fn test_containers_have_no_functions() {
        let doc = FieldKind::FormDocument {
            form: "main".into(),
            subform_depth: 0,
        };
        assert!(!doc.is_value());
        assert!(doc.supported_functions().is_empty());
    }

    #[test]
    fn test_policy_parse_and_order() {
        assert_eq!(WorkItemPolicy::parse("LastClosed"), Some(WorkItemPolicy::LastClosed));
        assert_eq!(WorkItemPolicy::parse("middle"), None);
        assert_eq!(WorkItemPolicy::FirstClosed.order_column(), "closed_at");
        assert!(WorkItemPolicy::Last.descending());
    }
}
