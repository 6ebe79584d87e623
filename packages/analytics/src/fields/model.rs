//! Field resolution against a live schema snapshot.
//!
//! The model is an arena of [`FieldNode`]s built lazily while paths are
//! resolved or listed. A node is created at most once per canonical path,
//! so two fields sharing a prefix share the same ancestor nodes.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::{AnalyticsError, Result};
use crate::fields::node::{AttributeType, FieldId, FieldKind, FieldNode, WorkItemPolicy};
use crate::fields::path::{parse_path, Segment};
use crate::ir::field::{IrField, JoinSpec};
use crate::ir::params::param_name;
use crate::ir::query::{DatePart, Expr, OrderBy, Predicate, Query, SqlType};
use crate::traits::visibility::VisibilitySource;
use crate::types::config::StartingObject;
use crate::types::schema::{QuestionType, Schema};

type AttributeDef = (&'static str, &'static str, &'static str, AttributeType);

const CASE_ATTRIBUTES: &[AttributeDef] = &[
    ("id", "ID", "id", AttributeType::Uuid),
    ("created_at", "Created at", "created_at", AttributeType::Timestamp),
    ("modified_at", "Modified at", "modified_at", AttributeType::Timestamp),
    ("closed_at", "Closed at", "closed_at", AttributeType::Timestamp),
    ("status", "Status", "status", AttributeType::Text),
    ("workflow", "Workflow", "workflow_id", AttributeType::Text),
];

const WORK_ITEM_ATTRIBUTES: &[AttributeDef] = &[
    ("id", "ID", "id", AttributeType::Uuid),
    ("created_at", "Created at", "created_at", AttributeType::Timestamp),
    ("modified_at", "Modified at", "modified_at", AttributeType::Timestamp),
    ("closed_at", "Closed at", "closed_at", AttributeType::Timestamp),
    ("status", "Status", "status", AttributeType::Text),
    ("task", "Task", "task_id", AttributeType::Text),
    ("name", "Name", "name", AttributeType::Text),
];

const DOCUMENT_ATTRIBUTES: &[AttributeDef] = &[
    ("id", "ID", "id", AttributeType::Uuid),
    ("created_at", "Created at", "created_at", AttributeType::Timestamp),
    ("modified_at", "Modified at", "modified_at", AttributeType::Timestamp),
    ("form", "Form", "form_id", AttributeType::Text),
];

fn attributes(defs: &[AttributeDef]) -> impl Iterator<Item = FieldNode> + '_ {
    defs.iter().map(|(identifier, label, column, attr_type)| {
        FieldNode::new(
            *identifier,
            *label,
            FieldKind::Attribute {
                column: *column,
                attr_type: *attr_type,
            },
        )
    })
}

fn meta() -> FieldNode {
    FieldNode::new("meta", "Meta", FieldKind::Meta { key: None })
}

fn date_parts() -> Vec<FieldNode> {
    DatePart::ALL
        .iter()
        .map(|part| FieldNode::new(part.identifier(), part.label(), FieldKind::DateExtractor { part: *part }))
        .collect()
}

/// Segment identifier with the work item policy spelled canonically.
fn canonical_identifier(mut segment: Segment) -> String {
    if segment.name == "workitem" {
        if let Some(policy) = segment.args.get_mut(1) {
            if let Some(parsed) = WorkItemPolicy::parse(policy) {
                *policy = parsed.as_str().to_string();
            }
        }
    }
    segment.identifier()
}

/// Expression of an answer's value inside the answers relation.
fn answer_expr(question_type: QuestionType) -> Expr {
    let text = Expr::JsonText {
        column: "value".into(),
        key: None,
    };
    if question_type == QuestionType::Date {
        Expr::column("date")
    } else if question_type.is_numeric() {
        text.cast(SqlType::Numeric)
    } else {
        text
    }
}

pub struct FieldModel<'a> {
    schema: &'a Schema,
    starting_object: StartingObject,
    nodes: Vec<FieldNode>,
    paths: Vec<String>,
    by_path: HashMap<String, FieldId>,
}

impl<'a> FieldModel<'a> {
    /// Model for a root selector; unknown roots fail here.
    pub fn new(schema: &'a Schema, starting_object: &str) -> Result<Self> {
        Ok(Self::for_root(schema, Self::resolve_root(starting_object)?))
    }

    pub fn for_root(schema: &'a Schema, starting_object: StartingObject) -> Self {
        Self {
            schema,
            starting_object,
            nodes: vec![],
            paths: vec![],
            by_path: HashMap::new(),
        }
    }

    pub fn resolve_root(identifier: &str) -> Result<StartingObject> {
        identifier.parse()
    }

    pub fn starting_object(&self) -> StartingObject {
        self.starting_object
    }

    pub fn node(&self, id: FieldId) -> &FieldNode {
        &self.nodes[id.0]
    }

    /// Canonical dotted path of a node.
    pub fn source_path(&self, id: FieldId) -> &str {
        &self.paths[id.0]
    }

    /// Ancestors and the node itself, root side first.
    pub fn lineage(&self, id: FieldId) -> Vec<FieldId> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Number of segments in the node's path.
    pub fn depth(&self, id: FieldId) -> usize {
        self.lineage(id).len()
    }

    pub fn full_label(&self, id: FieldId) -> String {
        self.lineage(id)
            .into_iter()
            .map(|n| self.node(n).label.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }

    /// Resolve a dotted path, creating nodes as needed.
    pub fn get_field(&mut self, path: &str) -> Result<FieldId> {
        let mut current = None;
        for segment in parse_path(path)? {
            let identifier = canonical_identifier(segment);
            let found = self
                .child(current, &identifier)
                .ok_or_else(|| AnalyticsError::FieldNotFound {
                    path: path.to_string(),
                    segment: identifier.clone(),
                })?;
            current = Some(found);
        }
        current.ok_or_else(|| AnalyticsError::InvalidSegment(path.to_string()))
    }

    /// Breadth-first listing of `depth` levels below `prefix` (or the root).
    pub fn list_fields(&mut self, prefix: Option<&str>, depth: usize) -> Result<IndexMap<String, FieldId>> {
        let start = match prefix {
            Some(p) if !p.is_empty() => Some(self.get_field(p)?),
            _ => None,
        };

        let mut fields = IndexMap::new();
        let mut frontier = vec![start];
        for _ in 0..depth {
            let mut next = vec![];
            for parent in frontier {
                for id in self.children(parent) {
                    fields.insert(self.source_path(id).to_string(), id);
                    next.push(Some(id));
                }
            }
            frontier = next;
        }
        Ok(fields)
    }

    /// Attached child nodes of `parent` (the root when `None`).
    pub fn children(&mut self, parent: Option<FieldId>) -> Vec<FieldId> {
        self.available_children(parent)
            .into_iter()
            .map(|node| {
                let path = self.child_path(parent, &node.identifier);
                self.attach(path, node)
            })
            .collect()
    }

    fn child(&mut self, parent: Option<FieldId>, identifier: &str) -> Option<FieldId> {
        let path = self.child_path(parent, identifier);
        if let Some(&id) = self.by_path.get(&path) {
            return Some(id);
        }
        let node = self
            .available_children(parent)
            .into_iter()
            .find(|n| n.identifier == identifier)?;
        Some(self.attach(path, node))
    }

    fn child_path(&self, parent: Option<FieldId>, identifier: &str) -> String {
        match parent {
            Some(p) => format!("{}.{}", self.source_path(p), identifier),
            None => identifier.to_string(),
        }
    }

    fn attach(&mut self, path: String, node: FieldNode) -> FieldId {
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        let id = FieldId(self.nodes.len());
        self.nodes.push(node);
        self.paths.push(path.clone());
        self.by_path.insert(path, id);
        id
    }

    /// Candidate children of a node against the current schema. The
    /// returned nodes are not yet part of the arena.
    pub fn available_children(&self, parent: Option<FieldId>) -> Vec<FieldNode> {
        let Some(parent_id) = parent else {
            return self.root_children();
        };

        let mut children: Vec<FieldNode> = match &self.node(parent_id).kind {
            FieldKind::Attribute { attr_type, .. } => {
                if *attr_type == AttributeType::Timestamp {
                    date_parts()
                } else {
                    vec![]
                }
            }
            FieldKind::Meta { key: None } => self.meta_keys(),
            FieldKind::Meta { key: Some(_) } => vec![],
            FieldKind::WorkItem { task, .. } => {
                let mut nodes: Vec<_> = attributes(WORK_ITEM_ATTRIBUTES).collect();
                nodes.push(meta());
                if let Some(form) = self.schema.task(task).and_then(|t| t.form.as_deref()) {
                    nodes.extend(self.documents(Some(form)));
                }
                nodes
            }
            FieldKind::Case => {
                let mut nodes: Vec<_> = attributes(CASE_ATTRIBUTES).collect();
                nodes.push(meta());
                nodes.extend(self.documents(None));
                nodes
            }
            FieldKind::FormDocument { form, subform_depth } => self.questions(form, *subform_depth),
            FieldKind::DirectDocument { form } => self.questions(form, 0),
            FieldKind::FormAnswer { question_type, .. } => {
                if *question_type == QuestionType::Date {
                    date_parts()
                } else {
                    vec![]
                }
            }
            FieldKind::DateExtractor { .. } => vec![],
        };

        for child in &mut children {
            child.parent = parent;
        }
        children
    }

    fn root_children(&self) -> Vec<FieldNode> {
        match self.starting_object {
            StartingObject::Cases => {
                let mut nodes: Vec<_> = attributes(CASE_ATTRIBUTES).collect();
                nodes.push(meta());
                nodes.extend(self.documents(None));
                for task in self.schema.tasks.values() {
                    for policy in WorkItemPolicy::ALL {
                        nodes.push(FieldNode::new(
                            format!("workitem[{},{}]", task.slug, policy.as_str()),
                            format!("{} ({})", task.name, policy.label()),
                            FieldKind::WorkItem {
                                task: task.slug.clone(),
                                policy,
                            },
                        ));
                    }
                }
                nodes
            }
            StartingObject::WorkItems => {
                let mut nodes: Vec<_> = attributes(WORK_ITEM_ATTRIBUTES).collect();
                nodes.push(meta());
                nodes.push(FieldNode::new("case", "Case", FieldKind::Case));
                nodes.extend(self.documents(None));
                nodes
            }
            StartingObject::Documents => {
                let mut nodes: Vec<_> = attributes(DOCUMENT_ATTRIBUTES).collect();
                nodes.push(meta());
                nodes.extend(self.schema.forms.values().map(|form| {
                    FieldNode::new(
                        format!("document[{}]", form.slug),
                        form.name.clone(),
                        FieldKind::DirectDocument {
                            form: form.slug.clone(),
                        },
                    )
                }));
                nodes
            }
        }
    }

    fn meta_keys(&self) -> Vec<FieldNode> {
        self.schema
            .meta_fields
            .iter()
            .map(|key| FieldNode::new(key.clone(), key.clone(), FieldKind::Meta { key: Some(key.clone()) }))
            .collect()
    }

    /// `document[f]` nodes for one form, or every form when `None`.
    fn documents(&self, only: Option<&str>) -> Vec<FieldNode> {
        self.schema
            .forms
            .values()
            .filter(|form| only.map_or(true, |slug| slug == form.slug))
            .map(|form| {
                FieldNode::new(
                    format!("document[{}]", form.slug),
                    form.name.clone(),
                    FieldKind::FormDocument {
                        form: form.slug.clone(),
                        subform_depth: 0,
                    },
                )
            })
            .collect()
    }

    fn questions(&self, form: &str, subform_depth: u32) -> Vec<FieldNode> {
        self.schema
            .form_questions(form)
            .into_iter()
            .filter_map(|question| {
                let kind = match (&question.question_type, &question.sub_form) {
                    (QuestionType::Form, Some(sub_form)) => FieldKind::FormDocument {
                        form: sub_form.clone(),
                        subform_depth: subform_depth + 1,
                    },
                    (QuestionType::Form, None) => return None,
                    (question_type, _) => FieldKind::FormAnswer {
                        question: question.slug.clone(),
                        question_type: *question_type,
                    },
                };
                Some(FieldNode::new(question.slug.clone(), question.label.clone(), kind))
            })
            .collect()
    }

    /// Fresh base query of the root family.
    pub fn root_query(&self, visibility: &dyn VisibilitySource) -> Query {
        match self.starting_object {
            StartingObject::Cases => visibility.cases(),
            StartingObject::WorkItems => visibility.work_items(),
            StartingObject::Documents => visibility.documents(),
        }
    }

    /// Compile one node into its IR contribution.
    pub fn query_field(&self, id: FieldId, visibility: &dyn VisibilitySource) -> Result<IrField> {
        let node = self.node(id);
        let path = self.source_path(id).to_string();

        let field = match &node.kind {
            FieldKind::Attribute { column, .. } => IrField::value(path, Expr::column(*column)),
            FieldKind::Meta { key: None } => IrField::no_op(path),
            FieldKind::Meta { key: Some(key) } => {
                let param = param_name("meta_key", key);
                let expr = Expr::JsonText {
                    column: "meta".into(),
                    key: Some(param.clone()),
                };
                IrField::value(path, expr).with_param(param, key.clone())
            }
            FieldKind::WorkItem { task, policy } => {
                IrField::join(path, work_item_join(visibility, task, *policy), None)
            }
            FieldKind::Case => IrField::join(
                path,
                JoinSpec {
                    query: visibility.cases(),
                    outer: "case_id".into(),
                    inner: "id".into(),
                },
                None,
            ),
            FieldKind::FormDocument {
                form,
                subform_depth: 0,
            } => {
                let mut query = visibility.documents();
                let param = query.add_param("form", form);
                query.filters.push(Predicate::Eq {
                    expr: Expr::column("form_id"),
                    param,
                });
                IrField::join(
                    path,
                    JoinSpec {
                        query,
                        outer: "document_id".into(),
                        inner: "id".into(),
                    },
                    None,
                )
            }
            // sub-form answers live on the enclosing document
            FieldKind::FormDocument { .. } | FieldKind::DirectDocument { .. } => IrField::no_op(path),
            FieldKind::FormAnswer {
                question,
                question_type,
            } => {
                let mut query = visibility.answers();
                let param = query.add_param("question", question);
                query.filters.push(Predicate::Eq {
                    expr: Expr::column("question_id"),
                    param,
                });
                query.distinct_on.push(Expr::column("document_id"));
                query.order_by.push(OrderBy::asc(Expr::column("document_id")));
                query.order_by.push(OrderBy::asc(Expr::column("id")));
                IrField::join(
                    path,
                    JoinSpec {
                        query,
                        outer: "id".into(),
                        inner: "document_id".into(),
                    },
                    Some(answer_expr(*question_type)),
                )
            }
            FieldKind::DateExtractor { part } => {
                let source = node
                    .parent
                    .and_then(|p| self.date_source(p))
                    .ok_or_else(|| AnalyticsError::NotAValue(path.clone()))?;
                IrField::value(path, source.date_part(*part))
            }
        };
        Ok(field)
    }

    /// Expression a date extractor reads, in its parent's query scope.
    fn date_source(&self, parent: FieldId) -> Option<Expr> {
        match &self.node(parent).kind {
            FieldKind::Attribute { column, .. } => Some(Expr::column(*column)),
            FieldKind::FormAnswer { question_type, .. } => Some(answer_expr(*question_type)),
            _ => None,
        }
    }
}

/// One work item per case: filtered to the task, ordered so that `DISTINCT
/// ON (case_id)` keeps the policy's pick. `id` breaks timestamp ties.
fn work_item_join(visibility: &dyn VisibilitySource, task: &str, policy: WorkItemPolicy) -> JoinSpec {
    let mut query = visibility.work_items();
    let param = query.add_param("task", task);
    query.filters.push(Predicate::Eq {
        expr: Expr::column("task_id"),
        param,
    });
    if policy.requires_closed() {
        query.filters.push(Predicate::NotNull(Expr::column("closed_at")));
    }

    let direction = |expr: Expr| {
        if policy.descending() {
            OrderBy::desc(expr)
        } else {
            OrderBy::asc(expr)
        }
    };
    query.distinct_on.push(Expr::column("case_id"));
    query.order_by = vec![
        OrderBy::asc(Expr::column("case_id")),
        direction(Expr::column(policy.order_column())),
        direction(Expr::column("id")),
    ];

    JoinSpec {
        query,
        outer: "id".into(),
        inner: "case_id".into(),
    }
}
