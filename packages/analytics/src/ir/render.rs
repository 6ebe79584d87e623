//! Renders a query tree to parameterized SQL.
//!
//! Every query is rendered under an alias that names its `FROM` relation.
//! Join children reuse their alias for the sub-query in the parent's scope,
//! so `"<child>"."x"` in the parent refers to the child's output column
//! `x`. Aliases are hashes of query shape (see [`crate::ir::params`]).
//!
//! The outermost query is always wrapped one more level so row filters can
//! address projected aliases:
//!
//! ```text
//! WITH "visible_cases" AS (SELECT * FROM "cases")
//! SELECT * FROM (SELECT ... FROM "visible_cases" AS "q_..." LEFT JOIN (...) ...) AS "x"
//! WHERE CAST("x"."status" AS TEXT) IN (%(filter_...)s)
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{AnalyticsError, Result};
use crate::ir::params::shape_alias;
use crate::ir::query::{Expr, Join, OrderBy, Predicate, Query, QuerySource, JOIN_KEY};

/// Alias of the outermost wrapper.
pub const OUTER_ALIAS: &str = "x";

/// Parameterized SQL handed to the execution layer.
///
/// Placeholders are `%(name)s`; values are always bound, never inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: BTreeMap<String, String>,
}

impl SqlStatement {
    /// Rewrite named placeholders to `$n`, returning values in bind order.
    ///
    /// A name used several times binds once. Text inside quoted identifiers
    /// and string literals is copied as is, so an alias may contain `%(`.
    pub fn to_positional(&self) -> Result<(String, Vec<String>)> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut order: Vec<&str> = vec![];
        let mut quoted: Option<char> = None;
        let mut rest = self.sql.as_str();

        while let Some(c) = rest.chars().next() {
            match quoted {
                // a doubled quote inside quotes toggles out and straight back in
                Some(q) if c == q => quoted = None,
                Some(_) => {}
                None if c == '"' || c == '\'' => quoted = Some(c),
                None if rest.starts_with("%(") => {
                    let after = &rest[2..];
                    let end = after
                        .find(")s")
                        .ok_or_else(|| AnalyticsError::MissingParam(after.to_string()))?;
                    let name = &after[..end];
                    let index = match order.iter().position(|n| *n == name) {
                        Some(i) => i + 1,
                        None => {
                            order.push(name);
                            order.len()
                        }
                    };
                    sql.push('$');
                    sql.push_str(&index.to_string());
                    rest = &after[end + 2..];
                    continue;
                }
                None => {}
            }
            sql.push(c);
            rest = &rest[c.len_utf8()..];
        }

        let values = order
            .iter()
            .map(|name| {
                self.params
                    .get(*name)
                    .cloned()
                    .ok_or_else(|| AnalyticsError::MissingParam(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((sql, values))
    }
}

/// Row filter on the outer wrapper, by projected alias.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFilter {
    pub alias: String,
    pub values: Vec<String>,
}

#[derive(Serialize)]
struct Shape<'a> {
    parent: &'a str,
    path: Option<&'a str>,
    source: &'a QuerySource,
    outer: Option<&'a str>,
    inner: Option<&'a str>,
    distinct_on: &'a [Expr],
    order_by: &'a [OrderBy],
    filters: &'a [Predicate],
    params: &'a BTreeMap<String, String>,
}

fn alias_for(parent: &str, query: &Query, join: Option<&Join>) -> Result<String> {
    let shape = Shape {
        parent,
        path: join.map(|j| j.path.as_str()),
        source: &query.from,
        outer: join.map(|j| j.outer.as_str()),
        inner: join.map(|j| j.inner.as_str()),
        distinct_on: &query.distinct_on,
        order_by: &query.order_by,
        filters: &query.filters,
        params: &query.params,
    };
    Ok(shape_alias(&serde_json::to_vec(&shape)?))
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

/// Name resolution inside one query.
struct Scope<'a> {
    alias: &'a str,
    /// Join path → rendered child alias.
    joins: &'a [(String, String)],
}

#[derive(Default)]
pub struct SqlRenderer {
    ctes: IndexMap<String, String>,
    pending: HashSet<String>,
    params: BTreeMap<String, String>,
}

impl SqlRenderer {
    /// Render `query` wrapped in the outer `SELECT * ... AS "x"`.
    ///
    /// Filters may only reference aliases the query actually outputs.
    pub fn render(query: &Query, filters: &[OutputFilter]) -> Result<SqlStatement> {
        let outputs = query.output_aliases();
        let mut wrapper = Query::wrap(query.clone());
        for filter in filters {
            if !outputs.iter().any(|a| *a == filter.alias) {
                return Err(AnalyticsError::UncompiledAlias(filter.alias.clone()));
            }
            if !filter.values.is_empty() {
                wrapper.filter_in(Expr::Column(filter.alias.clone()), &filter.values);
            }
        }

        let mut renderer = Self::default();
        let body = renderer.render_query(&wrapper, OUTER_ALIAS, None)?;

        let sql = if renderer.ctes.is_empty() {
            body
        } else {
            let ctes: Vec<String> = renderer
                .ctes
                .iter()
                .map(|(name, cte)| format!("{} AS ({})", quote(name), cte))
                .collect();
            format!("WITH {} {}", ctes.join(", "), body)
        };

        Ok(SqlStatement {
            sql,
            params: renderer.params,
        })
    }

    /// Register a query's CTEs and parameters with the statement.
    fn collect(&mut self, query: &Query) -> Result<()> {
        for (name, value) in &query.params {
            match self.params.get(name) {
                Some(existing) if existing != value => {
                    return Err(AnalyticsError::ParamConflict(name.clone()));
                }
                Some(_) => {}
                None => {
                    self.params.insert(name.clone(), value.clone());
                }
            }
        }

        for (name, body) in &query.ctes {
            if self.ctes.contains_key(name) || self.pending.contains(name) {
                continue;
            }
            self.pending.insert(name.clone());
            // dependencies register themselves while the body renders
            let rendered = if body.plain_cte {
                self.render_plain(body)?
            } else {
                let alias = alias_for(&format!("cte:{}", name), body, None)?;
                self.render_query(body, &alias, None)?
            };
            self.pending.remove(name);
            self.ctes.insert(name.clone(), rendered);
        }
        Ok(())
    }

    fn render_plain(&mut self, query: &Query) -> Result<String> {
        self.collect(query)?;
        let (from, alias) = match &query.from {
            QuerySource::Table(table) => (quote(table), table.clone()),
            QuerySource::Query(sub) => {
                let alias = alias_for("plain", sub, None)?;
                let sql = self.render_query(sub, &alias, None)?;
                (format!("({}) AS {}", sql, quote(&alias)), alias)
            }
        };
        let scope = Scope {
            alias: &alias,
            joins: &[],
        };
        let mut sql = format!("SELECT * FROM {}", from);
        self.push_where(&mut sql, query, &scope)?;
        Ok(sql)
    }

    fn render_query(&mut self, query: &Query, alias: &str, join_inner: Option<&str>) -> Result<String> {
        if query.plain_cte {
            return self.render_plain(query);
        }
        self.collect(query)?;

        let child_aliases = query
            .joins
            .iter()
            .map(|j| Ok((j.path.clone(), alias_for(alias, &j.query, Some(j))?)))
            .collect::<Result<Vec<_>>>()?;
        let scope = Scope {
            alias,
            joins: &child_aliases,
        };

        let mut items = vec![];
        if let Some(inner) = join_inner {
            items.push(format!("{} AS {}", qualified(alias, inner), quote(JOIN_KEY)));
        }
        for projection in &query.select {
            items.push(format!(
                "{} AS {}",
                self.render_expr(&projection.expr, &scope)?,
                quote(&projection.alias)
            ));
        }
        if !query.select_direct_only {
            for (join, (_, child)) in query.joins.iter().zip(&child_aliases) {
                for output in join.query.output_aliases() {
                    items.push(format!("{} AS {}", qualified(child, &output), quote(&output)));
                }
            }
        }

        let mut sql = String::from("SELECT ");
        if !query.distinct_on.is_empty() {
            let exprs = self.render_exprs(&query.distinct_on, &scope)?;
            sql.push_str(&format!("DISTINCT ON ({}) ", exprs));
        }
        if items.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&items.join(", "));
        }

        sql.push_str(" FROM ");
        match &query.from {
            QuerySource::Table(table) => sql.push_str(&quote(table)),
            QuerySource::Query(sub) => {
                let sub_alias = alias_for(alias, sub, None)?;
                let rendered = self.render_query(sub, &sub_alias, None)?;
                sql.push_str(&format!("({})", rendered));
            }
        }
        sql.push_str(&format!(" AS {}", quote(alias)));

        for (join, (_, child)) in query.joins.iter().zip(&child_aliases) {
            let rendered = self.render_query(&join.query, child, Some(&join.inner))?;
            sql.push_str(&format!(
                " LEFT JOIN ({}) AS {} ON ({} = {})",
                rendered,
                quote(child),
                qualified(alias, &join.outer),
                qualified(child, JOIN_KEY)
            ));
        }

        self.push_where(&mut sql, query, &scope)?;

        if !query.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.render_exprs(&query.group_by, &scope)?));
        }
        if !query.order_by.is_empty() {
            let order = query
                .order_by
                .iter()
                .map(|o| {
                    let direction = if o.descending { "DESC" } else { "ASC" };
                    Ok(format!("{} {}", self.render_expr(&o.expr, &scope)?, direction))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        Ok(sql)
    }

    fn push_where(&self, sql: &mut String, query: &Query, scope: &Scope<'_>) -> Result<()> {
        if query.filters.is_empty() {
            return Ok(());
        }
        let predicates = query
            .filters
            .iter()
            .map(|p| self.render_predicate(p, scope))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(&format!(" WHERE {}", predicates.join(" AND ")));
        Ok(())
    }

    fn placeholder(&self, name: &str) -> Result<String> {
        if self.params.contains_key(name) {
            Ok(format!("%({})s", name))
        } else {
            Err(AnalyticsError::MissingParam(name.to_string()))
        }
    }

    fn render_exprs(&self, exprs: &[Expr], scope: &Scope<'_>) -> Result<String> {
        let rendered = exprs
            .iter()
            .map(|e| self.render_expr(e, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }

    fn render_expr(&self, expr: &Expr, scope: &Scope<'_>) -> Result<String> {
        Ok(match expr {
            Expr::Column(column) => qualified(scope.alias, column),
            Expr::Joined { join, column } => {
                let child = scope
                    .joins
                    .iter()
                    .find(|(path, _)| path == join)
                    .map(|(_, alias)| alias)
                    .ok_or_else(|| AnalyticsError::UncompiledAlias(format!("{}.{}", join, column)))?;
                qualified(child, column)
            }
            Expr::JsonText { column, key } => match key {
                Some(param) => format!(
                    "({} ->> {})",
                    qualified(scope.alias, column),
                    self.placeholder(param)?
                ),
                None => format!("({} #>> '{{}}')", qualified(scope.alias, column)),
            },
            Expr::DatePart { part, expr } => format!(
                "CAST(EXTRACT({} FROM {}) AS INTEGER)",
                part.sql_field(),
                self.render_expr(expr, scope)?
            ),
            Expr::Cast { expr, sql_type } => format!(
                "CAST({} AS {})",
                self.render_expr(expr, scope)?,
                sql_type.as_sql()
            ),
            Expr::Aggregate { function, expr } => {
                let inner = self.render_expr(expr, scope)?;
                match function.sql_name() {
                    Some(name) => format!("{}({})", name, inner),
                    None => inner,
                }
            }
        })
    }

    fn render_predicate(&self, predicate: &Predicate, scope: &Scope<'_>) -> Result<String> {
        Ok(match predicate {
            Predicate::Eq { expr, param } => {
                format!("{} = {}", self.render_expr(expr, scope)?, self.placeholder(param)?)
            }
            Predicate::NotNull(expr) => format!("{} IS NOT NULL", self.render_expr(expr, scope)?),
            Predicate::In { expr, params } => {
                if params.is_empty() {
                    return Ok("TRUE".to_string());
                }
                let placeholders = params
                    .iter()
                    .map(|p| self.placeholder(p))
                    .collect::<Result<Vec<_>>>()?;
                format!(
                    "CAST({} AS TEXT) IN ({})",
                    self.render_expr(expr, scope)?,
                    placeholders.join(", ")
                )
            }
            Predicate::Raw(sql) => format!("({})", sql),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(table: &str) -> Query {
        let cte = format!("visible_{}", table);
        Query::from_table(cte.clone()).with_cte(cte, Query::plain_cte(table))
    }

    fn case_with_answer() -> Query {
        let mut answers = visible("answers");
        let param = answers.add_param("question", "amount");
        answers.filters.push(Predicate::Eq {
            expr: Expr::column("question_id"),
            param,
        });
        answers.distinct_on.push(Expr::column("document_id"));
        answers.order_by.push(OrderBy::asc(Expr::column("document_id")));
        answers.project(Expr::column("value"), "amount");

        let mut root = visible("cases");
        root.project(Expr::column("status"), "status");
        root.joins.push(Join {
            path: "amount".into(),
            outer: "id".into(),
            inner: "document_id".into(),
            query: answers,
        });
        root
    }

    #[test]
    fn test_outer_wrapper_and_ctes() {
        let stmt = SqlRenderer::render(&case_with_answer(), &[]).unwrap();

        assert!(stmt.sql.starts_with(
            "WITH \"visible_cases\" AS (SELECT * FROM \"cases\"), \"visible_answers\" AS (SELECT * FROM \"answers\") SELECT * FROM ("
        ));
        assert!(stmt.sql.ends_with(") AS \"x\""));
        assert!(stmt.sql.contains("LEFT JOIN (SELECT DISTINCT ON ("));
        assert!(stmt.sql.contains("AS \"__key\""));
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = SqlRenderer::render(&case_with_answer(), &[]).unwrap();
        let b = SqlRenderer::render(&case_with_answer(), &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_child_columns_reexposed_unless_direct_only() {
        let stmt = SqlRenderer::render(&case_with_answer(), &[]).unwrap();
        assert!(stmt.sql.contains(".\"amount\" AS \"amount\" FROM \"visible_cases\""));

        let mut direct = case_with_answer();
        direct.select_direct_only = true;
        let stmt = SqlRenderer::render(&direct, &[]).unwrap();
        assert!(!stmt.sql.contains(".\"amount\" AS \"amount\" FROM \"visible_cases\""));
    }

    #[test]
    fn test_output_filters_on_wrapper() {
        let filter = OutputFilter {
            alias: "status".into(),
            values: vec!["running".into(), "completed".into()],
        };
        let stmt = SqlRenderer::render(&case_with_answer(), &[filter]).unwrap();
        assert!(stmt.sql.contains("WHERE CAST(\"x\".\"status\" AS TEXT) IN (%(filter_"));
        assert!(stmt.params.values().any(|v| v == "running"));
        assert!(!stmt.sql.contains("'running'"));
    }

    #[test]
    fn test_empty_filter_list_does_not_restrict() {
        let filter = OutputFilter {
            alias: "status".into(),
            values: vec![],
        };
        let stmt = SqlRenderer::render(&case_with_answer(), &[filter]).unwrap();
        assert!(stmt.sql.ends_with(") AS \"x\""));
    }

    #[test]
    fn test_filter_on_unknown_alias_fails() {
        let filter = OutputFilter {
            alias: "nope".into(),
            values: vec!["a".into()],
        };
        assert!(matches!(
            SqlRenderer::render(&case_with_answer(), &[filter]),
            Err(AnalyticsError::UncompiledAlias(_))
        ));
    }

    #[test]
    fn test_joined_expr_without_join_fails() {
        let mut root = visible("cases");
        root.project(
            Expr::Joined {
                join: "ghost".into(),
                column: "x".into(),
            },
            "x",
        );
        assert!(matches!(
            SqlRenderer::render(&root, &[]),
            Err(AnalyticsError::UncompiledAlias(_))
        ));
    }

    #[test]
    fn test_param_conflict_detected() {
        let mut root = visible("cases").with_param("p", "one");
        let mut child = visible("documents").with_param("p", "two");
        child.project(Expr::column("id"), "doc");
        root.joins.push(Join {
            path: "document".into(),
            outer: "document_id".into(),
            inner: "id".into(),
            query: child,
        });
        assert!(matches!(
            SqlRenderer::render(&root, &[]),
            Err(AnalyticsError::ParamConflict(_))
        ));
    }

    #[test]
    fn test_to_positional_reuses_indexes() {
        let stmt = SqlStatement {
            sql: "SELECT %(a)s, %(b)s, %(a)s".into(),
            params: BTreeMap::from([("a".into(), "1".into()), ("b".into(), "2".into())]),
        };
        let (sql, values) = stmt.to_positional().unwrap();
        assert_eq!(sql, "SELECT $1, $2, $1");
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn test_to_positional_skips_quoted_text() {
        let stmt = SqlStatement {
            sql: r#"SELECT "a%(b)s", 'it''s %(c)s', "q""%(d)s" FROM t WHERE v = %(a)s"#.into(),
            params: BTreeMap::from([("a".into(), "1".into())]),
        };
        let (sql, values) = stmt.to_positional().unwrap();
        assert_eq!(
            sql,
            r#"SELECT "a%(b)s", 'it''s %(c)s', "q""%(d)s" FROM t WHERE v = $1"#
        );
        assert_eq!(values, vec!["1"]);
    }

    #[test]
    fn test_alias_with_placeholder_syntax_renders() {
        let mut root = visible("cases");
        root.project(Expr::column("status"), "a%(b)s");
        let filter = OutputFilter {
            alias: "a%(b)s".into(),
            values: vec!["running".into()],
        };
        let stmt = SqlRenderer::render(&root, &[filter]).unwrap();
        let (sql, values) = stmt.to_positional().unwrap();
        assert!(sql.contains(r#"AS "a%(b)s""#));
        assert!(sql.contains(r#"CAST("x"."a%(b)s" AS TEXT) IN ($1)"#));
        assert_eq!(values, vec!["running"]);
    }

    #[test]
    fn test_to_positional_missing_param() {
        let stmt = SqlStatement {
            sql: "SELECT %(a)s".into(),
            params: BTreeMap::new(),
        };
        assert!(matches!(
            stmt.to_positional(),
            Err(AnalyticsError::MissingParam(_))
        ));
    }
}
