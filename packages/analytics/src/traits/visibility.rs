//! Access-control seam.
//!
//! A visibility source hands out the base relation for each entity family,
//! already restricted to what the current user may see. Relations are
//! opaque queries, typically a CTE plus a `SELECT` over it; the compiler
//! only adds projections, joins and predicates on top.

use crate::ir::query::{Predicate, Query};

/// Supplies pre-filtered base relations.
///
/// Every call must return a fresh query; compiles mutate what they get.
pub trait VisibilitySource: Send + Sync {
    fn cases(&self) -> Query;
    fn work_items(&self) -> Query;
    fn documents(&self) -> Query;
    fn answers(&self) -> Query;
}

/// Base relation reading `table` through a `visible_<table>` CTE.
///
/// `restrictions` end up inside the CTE body, so every use of the relation
/// within a statement shares them.
pub fn visible_relation(table: &str, restrictions: Vec<Predicate>) -> Query {
    let name = format!("visible_{}", table);
    let mut body = Query::plain_cte(table);
    body.filters = restrictions;
    Query::from_table(name.clone()).with_cte(name, body)
}

/// No access control: every row of every relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl VisibilitySource for Unrestricted {
    fn cases(&self) -> Query {
        visible_relation("cases", vec![])
    }

    fn work_items(&self) -> Query {
        visible_relation("work_items", vec![])
    }

    fn documents(&self) -> Query {
        visible_relation("documents", vec![])
    }

    fn answers(&self) -> Query {
        visible_relation("answers", vec![])
    }
}
