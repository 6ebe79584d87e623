//! Extraction tables: field specs → one SQL statement → flat records.
//!
//! # Example
//!
//! ```rust,ignore
//! use analytics::{ExtractionEngine, FieldSpec, TableSpec, Unrestricted};
//!
//! let engine = ExtractionEngine::new(schema, Unrestricted);
//! let table = TableSpec::new("by-quarter", "cases")
//!     .with_field(FieldSpec::new("created_at.quarter", "quarter"))
//!     .with_field(FieldSpec::new("document[main].amount", "amount"));
//!
//! let records = engine.execute(&table, &executor).await?;
//! ```

use tracing::{debug, info, instrument};

use crate::error::{AnalyticsError, Result};
use crate::fields::{FieldId, FieldModel};
use crate::ir::planner::QueryPlanner;
use crate::ir::query::{Query, JOIN_KEY};
use crate::ir::render::{OutputFilter, SqlRenderer, SqlStatement};
use crate::pipeline::parse::{parse_rows, OutputColumn};
use crate::traits::executor::Executor;
use crate::traits::visibility::{Unrestricted, VisibilitySource};
use crate::types::config::{active_filters, FieldSpec, Function, StartingObject, TableSpec};
use crate::types::schema::Schema;
use crate::types::value::{Record, ValueRule};

/// A field spec bound to its resolved node.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    pub alias: String,
    /// Canonical source path.
    pub path: String,
    pub label: String,
    pub rule: ValueRule,
    pub supported_functions: &'static [Function],
    pub show_output: bool,
    pub filters: Option<Vec<String>>,
}

impl CompiledField {
    pub fn active_filters(&self) -> Option<&[String]> {
        active_filters(self.filters.as_deref())
    }
}

/// Aliases are projected next to the join key of every sub-query, so they
/// must not reuse its name.
pub(crate) fn check_alias(alias: &str) -> Result<()> {
    if alias == JOIN_KEY {
        return Err(AnalyticsError::ReservedAlias(alias.to_string()));
    }
    Ok(())
}

/// Result of compiling a [`TableSpec`]: the root query (before the outer
/// wrapper) plus per-field output metadata in declaration order.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    pub slug: String,
    pub starting_object: StartingObject,
    pub query: Query,
    pub fields: Vec<CompiledField>,
}

impl CompiledTable {
    pub fn field(&self, alias: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    /// Filters applied on the outer wrapper.
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

    #[instrument(skip(self, executor), fields(table = %self.slug))]
    pub async fn execute<E>(&self, executor: &E) -> Result<Vec<Record>>
    where
        E: Executor + ?Sized,
    {
        if self.fields.is_empty() {
            return Ok(vec![]);
        }
        let statement = self.statement()?;
        debug!(sql = %statement.sql, params = statement.params.len(), "Executing table");

        let rows = executor.fetch_all(&statement).await?;
        info!(rows = rows.len(), "Table executed");
        Ok(self.parse_rows(rows))
    }
}

/// Compiles and runs extraction tables against one schema snapshot.
pub struct ExtractionEngine<V: VisibilitySource> {
    schema: Schema,
    visibility: V,
}

impl<V: VisibilitySource> ExtractionEngine<V> {
    pub fn new(schema: Schema, visibility: V) -> Self {
        Self { schema, visibility }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Field model over this engine's schema.
    pub fn field_model(&self, starting_object: &str) -> Result<FieldModel<'_>> {
        FieldModel::new(&self.schema, starting_object)
    }

    /// Resolve and plan every field of `table`.
    ///
    /// Fields are annotated shallowest first; each walks its lineage from
    /// the root so shared prefixes reuse the same joins.
    #[instrument(skip(self, table), fields(table = %table.slug, fields = table.fields.len()))]
    pub fn compile(&self, table: &TableSpec) -> Result<CompiledTable> {
        let mut model = FieldModel::new(&self.schema, &table.starting_object)?;
        let visibility: &dyn VisibilitySource = if table.disable_visibilities {
            &Unrestricted
        } else {
            &self.visibility
        };

        let mut resolved = Vec::with_capacity(table.fields.len());
        for spec in &table.fields {
            check_alias(&spec.alias)?;
            let id = model.get_field(&spec.data_source)?;
            if !model.node(id).is_value() {
                return Err(AnalyticsError::NotAValue(spec.data_source.clone()));
            }
            resolved.push((spec, id));
        }

        let mut order: Vec<_> = resolved.iter().collect();
        order.sort_by_key(|(_, id)| model.depth(*id));

        let mut planner = QueryPlanner::new(model.root_query(visibility));
        for (spec, id) in order {
            let mut current = planner.root();
            for ancestor in model.lineage(*id) {
                let mut field = model.query_field(ancestor, visibility)?;
                if ancestor == *id {
                    field.required = true;
                    field.alias = Some(spec.alias.clone());
                }
                current = planner.annotate(&field, current)?;
            }
        }
        debug!(joins = planner.join_count(), "Planned table");

        let fields = resolved
            .iter()
            .map(|(spec, id)| compiled_field(&model, spec, *id))
            .collect();

        Ok(CompiledTable {
            slug: table.slug.clone(),
            starting_object: model.starting_object(),
            query: planner.finish(),
            fields,
        })
    }

    /// Compile only: the statement that [`Self::execute`] would run.
    pub fn sql(&self, table: &TableSpec) -> Result<SqlStatement> {
        self.compile(table)?.statement()
    }

    pub async fn execute<E>(&self, table: &TableSpec, executor: &E) -> Result<Vec<Record>>
    where
        E: Executor + ?Sized,
    {
        if table.fields.is_empty() {
            return Ok(vec![]);
        }
        self.compile(table)?.execute(executor).await
    }
}

fn compiled_field(model: &FieldModel<'_>, spec: &FieldSpec, id: FieldId) -> CompiledField {
    let node = model.node(id);
    CompiledField {
        alias: spec.alias.clone(),
        path: model.source_path(id).to_string(),
        label: model.full_label(id),
        rule: node.kind.value_rule(),
        supported_functions: node.kind.supported_functions(),
        show_output: spec.show_output,
        filters: spec.active_filters().map(<[String]>::to_vec),
    }
}
