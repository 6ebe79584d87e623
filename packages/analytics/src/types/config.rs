//! Configuration types: library settings and table definitions.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::{AnalyticsError, Result};

/// Library-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Meta keys operators may select (`meta.<key>`).
    ///
    /// Keys not listed here do not exist as fields.
    #[serde(default)]
    pub meta_fields: Vec<String>,

    /// Connection URL, only needed by the Postgres adapters.
    pub database_url: Option<String>,
}

impl AnalyticsConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `DATABASE_URL` and `ANALYTICS_META_FIELDS` (comma separated).
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let meta_fields = match env::var("ANALYTICS_META_FIELDS") {
            Ok(raw) => parse_list(&raw),
            Err(env::VarError::NotPresent) => vec![],
            Err(e) => {
                return Err(AnalyticsError::Config(format!(
                    "ANALYTICS_META_FIELDS: {}",
                    e
                )))
            }
        };

        Ok(Self {
            meta_fields,
            database_url: env::var("DATABASE_URL").ok(),
        })
    }

    /// Set the allowed meta keys.
    pub fn with_meta_fields(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.meta_fields = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Root entity family a table starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartingObject {
    Cases,
    WorkItems,
    Documents,
}

impl StartingObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartingObject::Cases => "cases",
            StartingObject::WorkItems => "work_items",
            StartingObject::Documents => "documents",
        }
    }
}

impl fmt::Display for StartingObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartingObject {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cases" => Ok(StartingObject::Cases),
            "work_items" => Ok(StartingObject::WorkItems),
            "documents" => Ok(StartingObject::Documents),
            other => Err(AnalyticsError::UnknownRootObject(other.to_string())),
        }
    }
}

/// Output function applied to a field.
///
/// Extraction tables only use `Value`; pivot tables group or aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Function {
    #[default]
    Value,
    Group,
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl Function {
    pub const ALL: [Function; 7] = [
        Function::Value,
        Function::Group,
        Function::Sum,
        Function::Avg,
        Function::Min,
        Function::Max,
        Function::Count,
    ];

    /// SQL aggregate name, `None` for the non-aggregating functions.
    pub fn sql_name(&self) -> Option<&'static str> {
        match self {
            Function::Value | Function::Group => None,
            Function::Sum => Some("SUM"),
            Function::Avg => Some("AVG"),
            Function::Min => Some("MIN"),
            Function::Max => Some("MAX"),
            Function::Count => Some("COUNT"),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.sql_name().is_some()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::Value => "VALUE",
            Function::Group => "GROUP",
            Function::Sum => "SUM",
            Function::Avg => "AVG",
            Function::Min => "MIN",
            Function::Max => "MAX",
            Function::Count => "COUNT",
        };
        f.write_str(name)
    }
}

/// One output column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Dotted path into the schema, e.g. `document[main].amount`.
    pub data_source: String,

    /// Output column name (unique per table).
    pub alias: String,

    #[serde(default)]
    pub function: Function,

    /// Literal allow-list. Absent and empty both mean "no restriction".
    #[serde(default)]
    pub filters: Option<Vec<String>>,

    #[serde(default = "default_show_output")]
    pub show_output: bool,
}

fn default_show_output() -> bool {
    true
}

impl FieldSpec {
    pub fn new(data_source: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            alias: alias.into(),
            function: Function::Value,
            filters: None,
            show_output: true,
        }
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.function = function;
        self
    }

    pub fn with_filters(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filters = Some(values.into_iter().map(|v| v.into()).collect());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show_output = false;
        self
    }

    /// Filter values that actually restrict rows.
    pub fn active_filters(&self) -> Option<&[String]> {
        active_filters(self.filters.as_deref())
    }
}

/// Filter values that actually restrict rows.
///
/// `None` and `Some([])` are treated the same: no restriction. Every table
/// and pivot filter goes through here.
pub fn active_filters(filters: Option<&[String]>) -> Option<&[String]> {
    filters.filter(|values| !values.is_empty())
}

/// An extraction table: one row per visible root entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub slug: String,

    /// Root selector; resolved at compile time so unknown roots fail there.
    pub starting_object: String,

    /// Skip the access-control provider and read unrestricted relations.
    #[serde(default)]
    pub disable_visibilities: bool,

    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn new(slug: impl Into<String>, starting_object: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            starting_object: starting_object.into(),
            disable_visibilities: false,
            fields: vec![],
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn without_visibilities(mut self) -> Self {
        self.disable_visibilities = true;
        self
    }
}

/// A pivot table over an extraction table.
///
/// Each field's `data_source` names an alias of the base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSpec {
    pub slug: String,

    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl PivotSpec {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            fields: vec![],
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}
