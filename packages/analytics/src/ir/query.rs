//! In-memory representation of a (possibly nested) SQL query.
//!
//! Expressions never carry rendered aliases: a column is addressed relative
//! to the query it appears in, and joined sub-queries are addressed by the
//! field path that produced them. The renderer turns both into hashed SQL
//! aliases.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ir::params::param_name;
use crate::types::config::Function;

/// Column name a joined sub-query exposes its join key under.
pub const JOIN_KEY: &str = "__key";

/// Part of a date or timestamp, always extracted as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Month,
    Weekday,
    Quarter,
}

impl DatePart {
    pub const ALL: [DatePart; 4] = [
        DatePart::Year,
        DatePart::Month,
        DatePart::Weekday,
        DatePart::Quarter,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Weekday => "weekday",
            DatePart::Quarter => "quarter",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatePart::Year => "Year",
            DatePart::Month => "Month",
            DatePart::Weekday => "Weekday",
            DatePart::Quarter => "Quarter",
        }
    }

    /// `EXTRACT` field name. Weekday is ISO (Monday = 1).
    pub fn sql_field(&self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Month => "MONTH",
            DatePart::Weekday => "ISODOW",
            DatePart::Quarter => "QUARTER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    Numeric,
    Integer,
    Text,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Numeric => "NUMERIC",
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
        }
    }
}

/// A scalar expression, scoped to the query it is used in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Column of this query's own `FROM` relation.
    Column(String),
    /// Output column of a direct join child, addressed by its field path.
    Joined { join: String, column: String },
    /// Text extraction from a JSON column; `key` is a parameter name, `None`
    /// extracts the scalar itself.
    JsonText { column: String, key: Option<String> },
    DatePart { part: DatePart, expr: Box<Expr> },
    Cast { expr: Box<Expr>, sql_type: SqlType },
    Aggregate { function: Function, expr: Box<Expr> },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn cast(self, sql_type: SqlType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            sql_type,
        }
    }

    pub fn date_part(self, part: DatePart) -> Self {
        Expr::DatePart {
            part,
            expr: Box::new(self),
        }
    }

    pub fn aggregate(self, function: Function) -> Self {
        Expr::Aggregate {
            function,
            expr: Box::new(self),
        }
    }
}

/// Row predicate. Parameter references are names in the owning query's
/// parameter map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Predicate {
    Eq { expr: Expr, param: String },
    NotNull(Expr),
    /// Text comparison against an allow-list.
    In { expr: Expr, params: Vec<String> },
    /// Opaque SQL from a visibility provider; may reference `%(name)s`.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub expr: Expr,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub expr: Expr,
    pub alias: String,
}

/// `LEFT JOIN (query) ON (outer.<outer> = query.<inner>)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    /// Field path that produced this join; also how expressions address it.
    pub path: String,
    /// Column of the parent's `FROM` relation.
    pub outer: String,
    /// Column of the child's `FROM` relation.
    pub inner: String,
    pub query: Query,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QuerySource {
    Table(String),
    Query(Box<Query>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub from: QuerySource,
    pub select: Vec<Projection>,
    pub joins: Vec<Join>,
    pub filters: Vec<Predicate>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    pub distinct_on: Vec<Expr>,
    pub params: BTreeMap<String, String>,
    pub ctes: IndexMap<String, Query>,
    /// Render as `SELECT * FROM <table> [WHERE ...]`, unaliased.
    pub plain_cte: bool,
    /// Do not re-expose join children's columns.
    pub select_direct_only: bool,
}

impl Query {
    fn with_source(from: QuerySource) -> Self {
        Self {
            from,
            select: vec![],
            joins: vec![],
            filters: vec![],
            group_by: vec![],
            order_by: vec![],
            distinct_on: vec![],
            params: BTreeMap::new(),
            ctes: IndexMap::new(),
            plain_cte: false,
            select_direct_only: false,
        }
    }

    pub fn from_table(table: impl Into<String>) -> Self {
        Self::with_source(QuerySource::Table(table.into()))
    }

    /// Wrap a query as the `FROM` of a new one.
    pub fn wrap(inner: Query) -> Self {
        Self::with_source(QuerySource::Query(Box::new(inner)))
    }

    /// A CTE body reading a table, optionally restricted by filters.
    pub fn plain_cte(table: impl Into<String>) -> Self {
        Self {
            plain_cte: true,
            ..Self::from_table(table)
        }
    }

    pub fn with_cte(mut self, name: impl Into<String>, body: Query) -> Self {
        self.ctes.insert(name.into(), body);
        self
    }

    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Register a literal and return its parameter name.
    pub fn add_param(&mut self, kind: &str, value: &str) -> String {
        let name = param_name(kind, value);
        self.params.insert(name.clone(), value.to_string());
        name
    }

    /// Project `expr AS alias`, ignoring a repeated alias.
    pub fn project(&mut self, expr: Expr, alias: impl Into<String>) {
        let alias = alias.into();
        if !self.select.iter().any(|p| p.alias == alias) {
            self.select.push(Projection { expr, alias });
        }
    }

    /// Restrict `expr` (compared as text) to the given literals.
    pub fn filter_in(&mut self, expr: Expr, values: &[String]) {
        let params = values.iter().map(|v| self.add_param("filter", v)).collect();
        self.filters.push(Predicate::In { expr, params });
    }

    /// Column names this query exposes to its parent.
    pub fn output_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.select.iter().map(|p| p.alias.clone()).collect();
        if !self.select_direct_only {
            for join in &self.joins {
                aliases.extend(join.query.output_aliases());
            }
        }
        aliases
    }

    /// Expression, valid in this query's scope, that yields output `alias`.
    pub fn output_expr(&self, alias: &str) -> Option<Expr> {
        if let Some(p) = self.select.iter().find(|p| p.alias == alias) {
            return Some(p.expr.clone());
        }
        self.joins
            .iter()
            .find(|j| j.query.output_aliases().iter().any(|a| a == alias))
            .map(|j| Expr::Joined {
                join: j.path.clone(),
                column: alias.to_string(),
            })
    }

    /// Number of joins in this query tree.
    pub fn join_count(&self) -> usize {
        self.joins
            .iter()
            .map(|j| 1 + j.query.join_count())
            .sum()
    }

    pub fn find_join(&self, path: &str) -> Option<&Join> {
        self.joins.iter().find_map(|j| {
            if j.path == path {
                Some(j)
            } else {
                j.query.find_join(path)
            }
        })
    }
}
