//! Compiled contribution of one field node to a query.

use std::collections::BTreeMap;

use crate::ir::query::{Expr, Query};

/// Join target of a join field.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    /// Fully built child query (source relation, filters, tie-break).
    pub query: Query,
    /// Column of the parent's `FROM` relation.
    pub outer: String,
    /// Column of the child's `FROM` relation.
    pub inner: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrKind {
    /// Virtual path segment without SQL cost.
    NoOp,
    /// Projection on the current query.
    Value(Expr),
    /// New joined sub-query; `value` is projected inside it when required.
    Join { join: JoinSpec, value: Option<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrField {
    /// Textual path from the query root; the join cache key.
    pub path: String,
    pub kind: IrKind,
    pub alias: Option<String>,
    pub required: bool,
    /// Literals referenced by a `Value` expression.
    pub params: BTreeMap<String, String>,
}

impl IrField {
    pub fn new(path: impl Into<String>, kind: IrKind) -> Self {
        Self {
            path: path.into(),
            kind,
            alias: None,
            required: false,
            params: BTreeMap::new(),
        }
    }

    pub fn no_op(path: impl Into<String>) -> Self {
        Self::new(path, IrKind::NoOp)
    }

    pub fn value(path: impl Into<String>, expr: Expr) -> Self {
        Self::new(path, IrKind::Value(expr))
    }

    pub fn join(path: impl Into<String>, join: JoinSpec, value: Option<Expr>) -> Self {
        Self::new(path, IrKind::Join { join, value })
    }

    pub fn with_param(mut self, name: String, value: String) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, IrKind::Join { .. })
    }
}
