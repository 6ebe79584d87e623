//! The annotate pass: folds compiled fields into one query tree.
//!
//! Queries are kept in an arena while fields are annotated so a join child
//! can stay "current" for its descendants without borrowing its parent. The
//! join cache maps the textual path of a join field to the child it
//! produced; it lives exactly as long as one compile.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::ir::field::{IrField, IrKind, JoinSpec};
use crate::ir::query::{Expr, Join, Query};

/// Handle of a query inside a [`QueryPlanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(usize);

struct Link {
    parent: QueryId,
    path: String,
    outer: String,
    inner: String,
}

struct PlannedJoin {
    query: Query,
    link: Link,
}

pub struct QueryPlanner {
    root: Query,
    /// `QueryId(n)` for n >= 1 lives at `children[n - 1]`.
    children: Vec<PlannedJoin>,
    joins: HashMap<String, QueryId>,
}

impl QueryPlanner {
    /// Start planning on top of a base query the planner owns.
    pub fn new(base: Query) -> Self {
        Self {
            root: base,
            children: vec![],
            joins: HashMap::new(),
        }
    }

    pub fn root(&self) -> QueryId {
        QueryId(0)
    }

    /// Number of distinct joins built so far.
    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    /// Apply one field to `current`, returning the query its descendants
    /// must be annotated against.
    pub fn annotate(&mut self, field: &IrField, current: QueryId) -> Result<QueryId> {
        match &field.kind {
            IrKind::NoOp => Ok(current),
            IrKind::Value(expr) => {
                if field.required {
                    self.project(current, field, expr.clone())?;
                }
                Ok(current)
            }
            IrKind::Join { join, value } => {
                let child = match self.joins.get(&field.path) {
                    Some(&id) => {
                        debug!(path = %field.path, "Reusing join");
                        id
                    }
                    None => {
                        let id = self.push_join(current, &field.path, join.clone());
                        self.joins.insert(field.path.clone(), id);
                        id
                    }
                };
                if field.required {
                    if let Some(expr) = value {
                        self.project(child, field, expr.clone())?;
                    }
                }
                Ok(child)
            }
        }
    }

    fn query_mut(&mut self, id: QueryId) -> &mut Query {
        match id.0 {
            0 => &mut self.root,
            n => &mut self.children[n - 1].query,
        }
    }

    fn project(&mut self, target: QueryId, field: &IrField, expr: Expr) -> Result<()> {
        let alias = field
            .alias
            .clone()
            .ok_or_else(|| AnalyticsError::UncompiledAlias(field.path.clone()))?;
        let query = self.query_mut(target);
        query
            .params
            .extend(field.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        query.project(expr, alias);
        Ok(())
    }

    fn push_join(&mut self, parent: QueryId, path: &str, join: JoinSpec) -> QueryId {
        self.children.push(PlannedJoin {
            query: join.query,
            link: Link {
                parent,
                path: path.to_string(),
                outer: join.outer,
                inner: join.inner,
            },
        });
        QueryId(self.children.len())
    }

    /// Assemble the arena into a nested query tree.
    ///
    /// Children always sit after their parent in the arena, so attaching in
    /// reverse order completes every subtree before it is moved. Joins are
    /// collected back to front and flipped once complete.
    pub fn finish(self) -> Query {
        let mut root = self.root;
        let mut slots: Vec<Option<PlannedJoin>> = self.children.into_iter().map(Some).collect();

        for index in (0..slots.len()).rev() {
            let Some(mut node) = slots[index].take() else {
                continue;
            };
            node.query.joins.reverse();
            let join = Join {
                path: node.link.path,
                outer: node.link.outer,
                inner: node.link.inner,
                query: node.query,
            };
            match node.link.parent.0 {
                0 => root.joins.push(join),
                n => {
                    if let Some(parent) = slots[n - 1].as_mut() {
                        parent.query.joins.push(join);
                    }
                }
            }
        }

        root.joins.reverse();
        root
    }
}
