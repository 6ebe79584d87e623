//! Compile-only tests: resolution, planning and rendering without a database.

use analytics::ir::query::{Predicate, Query};
use analytics::testing::sample_schema;
use analytics::traits::visible_relation;
use analytics::{AnalyticsError, ExtractionEngine, FieldSpec, TableSpec, Unrestricted, VisibilitySource};

/// Restricts every relation to rows of one tenant.
struct TenantVisibility;

impl TenantVisibility {
    fn relation(&self, table: &str) -> Query {
        visible_relation(table, vec![Predicate::Raw("\"tenant\" = 'acme'".into())])
    }
}

impl VisibilitySource for TenantVisibility {
    fn cases(&self) -> Query {
        self.relation("cases")
    }

    fn work_items(&self) -> Query {
        self.relation("work_items")
    }

    fn documents(&self) -> Query {
        self.relation("documents")
    }

    fn answers(&self) -> Query {
        self.relation("answers")
    }
}

fn engine() -> ExtractionEngine<Unrestricted> {
    ExtractionEngine::new(sample_schema(), Unrestricted)
}

fn answers_table() -> TableSpec {
    TableSpec::new("answers", "cases")
        .with_field(FieldSpec::new("document[main].amount", "amount"))
        .with_field(FieldSpec::new("document[main].region", "region"))
        .with_field(FieldSpec::new("created_at.quarter", "quarter"))
}

#[test]
fn test_compile_is_deterministic() {
    let first = engine().sql(&answers_table()).unwrap();
    let second = engine().sql(&answers_table()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_shared_prefix_joins_once() {
    let compiled = engine().compile(&answers_table()).unwrap();

    // one documents join with two answer joins beneath it
    assert_eq!(compiled.query.joins.len(), 1);
    assert_eq!(compiled.query.join_count(), 3);
    let document = compiled.query.find_join("document[main]").unwrap();
    assert_eq!(document.query.joins.len(), 2);

    let sql = compiled.statement().unwrap().sql;
    assert_eq!(sql.matches("FROM \"visible_documents\"").count(), 1);
}

#[test]
fn test_ctes_are_hoisted_once() {
    let statement = engine().sql(&answers_table()).unwrap();
    assert!(statement.sql.starts_with("WITH "));
    assert_eq!(statement.sql.matches("WITH ").count(), 1);
    assert_eq!(statement.sql.matches("\"visible_answers\" AS (").count(), 1);
}

#[test]
fn test_no_filters_means_no_outer_where() {
    let absent = TableSpec::new("t", "cases").with_field(FieldSpec::new("status", "status"));
    let empty = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("status", "status").with_filters(Vec::<String>::new()));

    let absent_sql = engine().sql(&absent).unwrap();
    let empty_sql = engine().sql(&empty).unwrap();
    assert_eq!(absent_sql, empty_sql);
    assert!(absent_sql.sql.ends_with("AS \"x\""));
}

#[test]
fn test_filters_are_bound_not_inlined() {
    let table = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("status", "status").with_filters(["running", "o'brien"]));
    let statement = engine().sql(&table).unwrap();

    assert!(!statement.sql.contains("o'brien"));
    assert!(statement.params.values().any(|v| v == "o'brien"));
    let (positional, values) = statement.to_positional().unwrap();
    assert!(positional.contains("IN ($1, $2)") || positional.contains("IN ($2, $1)"));
    assert_eq!(values.len(), 2);
}

#[test]
fn test_unknown_root_fails() {
    let table = TableSpec::new("t", "not_a_real_object").with_field(FieldSpec::new("id", "id"));
    assert!(matches!(
        engine().compile(&table),
        Err(AnalyticsError::UnknownRootObject(_))
    ));
}

#[test]
fn test_missing_field_aborts_compile() {
    let table = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("status", "status"))
        .with_field(FieldSpec::new("document[ghost].amount", "amount"));
    assert!(matches!(
        engine().compile(&table),
        Err(AnalyticsError::FieldNotFound { ref segment, .. }) if segment == "document[ghost]"
    ));
}

#[test]
fn test_visibility_restrictions_and_opt_out() {
    let table = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("status", "status"))
        .with_field(FieldSpec::new("document[main].amount", "amount"));
    let restricted = ExtractionEngine::new(sample_schema(), TenantVisibility);

    let sql = restricted.sql(&table).unwrap().sql;
    assert!(sql.contains("SELECT * FROM \"cases\" WHERE (\"tenant\" = 'acme')"));
    assert!(sql.contains("SELECT * FROM \"answers\" WHERE (\"tenant\" = 'acme')"));

    let sql = restricted.sql(&table.clone().without_visibilities()).unwrap().sql;
    assert!(!sql.contains("tenant"));
}

#[test]
fn test_work_item_path_compiles() {
    let table = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("workitem[review,last].document[review-form].score", "score"))
        .with_field(FieldSpec::new("workitem[review,last].closed_at", "closed"));
    let compiled = engine().compile(&table).unwrap();

    assert_eq!(compiled.query.joins.len(), 1);
    let sql = compiled.statement().unwrap().sql;
    assert!(sql.contains("DISTINCT ON ("));
    assert!(sql.contains("DESC"));
    assert_eq!(compiled.query.output_aliases(), vec!["closed", "score"]);
}

#[test]
fn test_meta_and_date_parts() {
    let table = TableSpec::new("t", "work_items")
        .with_field(FieldSpec::new("meta.priority", "priority"))
        .with_field(FieldSpec::new("case.created_at.weekday", "weekday"));
    let statement = engine().sql(&table).unwrap();

    assert!(statement.sql.contains("->> %(meta_key_"));
    assert!(statement.sql.contains("CAST(EXTRACT(ISODOW FROM "));
    assert!(statement.params.values().any(|v| v == "priority"));
}

#[test]
fn test_documents_root_reads_answers_directly() {
    let table = TableSpec::new("t", "documents")
        .with_field(FieldSpec::new("document[main].address.city", "city"));
    let compiled = engine().compile(&table).unwrap();

    assert_eq!(compiled.query.join_count(), 1);
    assert_eq!(compiled.query.joins[0].outer, "id");
    assert_eq!(compiled.query.joins[0].inner, "document_id");
}

#[test]
fn test_alias_with_placeholder_syntax_binds_cleanly() {
    let table = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("status", "a%(b)s").with_filters(["running"]));
    let statement = engine().sql(&table).unwrap();

    let (positional, values) = statement.to_positional().unwrap();
    assert!(positional.contains("AS \"a%(b)s\""));
    assert_eq!(values, vec!["running"]);
}

#[test]
fn test_join_key_alias_rejected_before_planning() {
    let table = TableSpec::new("t", "cases")
        .with_field(FieldSpec::new("document[main].amount", "__key"));
    assert!(matches!(
        engine().compile(&table),
        Err(AnalyticsError::ReservedAlias(_))
    ));
}
