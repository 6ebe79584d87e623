//! Pivot tables: group and aggregate the rows of a compiled extraction
//! table in a single statement.
//!
//! The base table's root query is reused as is: its joins stay, its
//! projections are replaced by the pivot's grouped and aggregated
//! expressions, and its filters move inside the query so they restrict
//! rows before grouping.

use tracing::{debug, info, instrument};

use crate::error::{AnalyticsError, Result};
use crate::ir::query::{Query, SqlType};
use crate::ir::render::{OutputFilter, SqlRenderer, SqlStatement};
use crate::pipeline::extract::{check_alias, CompiledTable};
use crate::pipeline::parse::{parse_rows, OutputColumn};
use crate::traits::executor::Executor;
use crate::types::config::{active_filters, Function, PivotSpec};
use crate::types::value::{Record, ValueRule};

#[derive(Debug, Clone, PartialEq)]
pub struct PivotField {
    pub alias: String,
    /// Alias in the base table.
    pub source: String,
    pub function: Function,
    pub rule: ValueRule,
    pub show_output: bool,
    pub filters: Option<Vec<String>>,
}

impl PivotField {
    pub fn active_filters(&self) -> Option<&[String]> {
        active_filters(self.filters.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPivot {
    pub slug: String,
    pub base: String,
    pub query: Query,
    pub fields: Vec<PivotField>,
}

impl CompiledPivot {
    pub fn output_filters(&self) -> Vec<OutputFilter> {
        self.fields
            .iter()
            .filter_map(|f| {
                f.active_filters().map(|values| OutputFilter {
                    alias: f.alias.clone(),
                    values: values.to_vec(),
                })
            })
            .collect()
    }

    pub fn statement(&self) -> Result<SqlStatement> {
        SqlRenderer::render(&self.query, &self.output_filters())
    }

    pub fn parse_rows(&self, rows: Vec<Record>) -> Vec<Record> {
        let columns: Vec<_> = self
            .fields
            .iter()
            .filter(|f| f.show_output)
            .map(|f| OutputColumn {
                alias: &f.alias,
                rule: f.rule,
            })
            .collect();
        parse_rows(&columns, rows)
    }

    #[instrument(skip(self, executor), fields(pivot = %self.slug, base = %self.base))]
    pub async fn execute<E>(&self, executor: &E) -> Result<Vec<Record>>
    where
        E: Executor + ?Sized,
    {
        if self.fields.is_empty() {
            return Ok(vec![]);
        }
        let statement = self.statement()?;
        debug!(sql = %statement.sql, params = statement.params.len(), "Executing pivot");

        let rows = executor.fetch_all(&statement).await?;
        info!(rows = rows.len(), "Pivot executed");
        Ok(self.parse_rows(rows))
    }
}

/// Rewrites compiled extraction tables into grouped queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PivotEngine;

impl PivotEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, base, pivot), fields(pivot = %pivot.slug, base = %base.slug))]
    pub fn compile(&self, base: &CompiledTable, pivot: &PivotSpec) -> Result<CompiledPivot> {
        let mut query = base.query.clone();
        query.select.clear();
        query.group_by.clear();
        query.select_direct_only = true;

        for field in &base.fields {
            if let Some(values) = field.active_filters() {
                let expr = base
                    .query
                    .output_expr(&field.alias)
                    .ok_or_else(|| AnalyticsError::UncompiledAlias(field.alias.clone()))?;
                query.filter_in(expr, values);
            }
        }

        let mut fields = Vec::with_capacity(pivot.fields.len());
        for spec in &pivot.fields {
            check_alias(&spec.alias)?;
            let source = base
                .field(&spec.data_source)
                .ok_or_else(|| AnalyticsError::UncompiledAlias(spec.data_source.clone()))?;
            if !source.supported_functions.contains(&spec.function) {
                return Err(AnalyticsError::UnsupportedFunction {
                    path: source.path.clone(),
                    function: spec.function.to_string(),
                });
            }
            let expr = base
                .query
                .output_expr(&source.alias)
                .ok_or_else(|| AnalyticsError::UncompiledAlias(source.alias.clone()))?;

            let (projected, rule) = match spec.function {
                Function::Value | Function::Group => {
                    query.group_by.push(expr.clone());
                    (expr, source.rule)
                }
                Function::Sum | Function::Avg => (
                    expr.cast(SqlType::Numeric).aggregate(spec.function),
                    ValueRule::Numeric,
                ),
                Function::Min | Function::Max => (expr.aggregate(spec.function), source.rule),
                Function::Count => (expr.aggregate(Function::Count), ValueRule::Integer),
            };
            query.project(projected, spec.alias.clone());

            fields.push(PivotField {
                alias: spec.alias.clone(),
                source: source.alias.clone(),
                function: spec.function,
                rule,
                show_output: spec.show_output,
                filters: spec.active_filters().map(<[String]>::to_vec),
            });
        }

        Ok(CompiledPivot {
            slug: pivot.slug.clone(),
            base: base.slug.clone(),
            query,
            fields,
        })
    }
}
