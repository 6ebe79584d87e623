//! Pivot compilation and execution against the mock executor.

use analytics::testing::{record, sample_schema, MockExecutor};
use analytics::{
    AnalyticsError, CompiledTable, ExtractionEngine, FieldSpec, Function, PivotEngine, PivotSpec,
    TableSpec, Unrestricted, Value,
};
use rust_decimal::Decimal;

fn base_table() -> CompiledTable {
    let table = TableSpec::new("amounts", "cases")
        .with_field(FieldSpec::new("document[main].region", "region"))
        .with_field(FieldSpec::new("document[main].amount", "amount"))
        .with_field(FieldSpec::new("created_at", "created"))
        .with_field(
            FieldSpec::new("workflow", "workflow")
                .with_filters(["intake"])
                .hidden(),
        );
    ExtractionEngine::new(sample_schema(), Unrestricted)
        .compile(&table)
        .unwrap()
}

fn sums() -> PivotSpec {
    PivotSpec::new("by-region")
        .with_field(FieldSpec::new("region", "region").with_function(Function::Group))
        .with_field(FieldSpec::new("amount", "total").with_function(Function::Sum))
}

#[test]
fn test_pivot_reuses_base_joins() {
    let base = base_table();
    let pivot = PivotEngine::new().compile(&base, &sums()).unwrap();

    assert_eq!(pivot.query.join_count(), base.query.join_count());
    assert_eq!(pivot.query.output_aliases(), vec!["region", "total"]);
}

#[test]
fn test_pivot_sql_shape() {
    let statement = PivotEngine::new()
        .compile(&base_table(), &sums())
        .unwrap()
        .statement()
        .unwrap();

    assert!(statement.sql.contains("SUM(CAST("));
    assert!(statement.sql.contains(" GROUP BY "));
    // base filter restricts rows before grouping
    assert!(statement.sql.contains(" WHERE CAST("));
    assert!(statement.params.values().any(|v| v == "intake"));
    assert!(statement.sql.ends_with("AS \"x\""));
}

#[test]
fn test_pivot_is_deterministic() {
    let a = PivotEngine::new().compile(&base_table(), &sums()).unwrap();
    let b = PivotEngine::new().compile(&base_table(), &sums()).unwrap();
    assert_eq!(a.statement().unwrap(), b.statement().unwrap());
}

#[test]
fn test_timestamp_min_max_but_not_sum() {
    let ok = PivotSpec::new("range")
        .with_field(FieldSpec::new("created", "first").with_function(Function::Min))
        .with_field(FieldSpec::new("created", "last").with_function(Function::Max));
    assert!(PivotEngine::new().compile(&base_table(), &ok).is_ok());

    let bad = PivotSpec::new("bad")
        .with_field(FieldSpec::new("created", "sum").with_function(Function::Sum));
    assert!(matches!(
        PivotEngine::new().compile(&base_table(), &bad),
        Err(AnalyticsError::UnsupportedFunction { ref function, .. }) if function == "SUM"
    ));
}

#[tokio::test]
async fn test_pivot_rows_are_normalized() {
    let executor = MockExecutor::new().with_rows(vec![
        record([
            ("region", Value::from("a")),
            ("total", Value::Decimal(Decimal::new(3000, 2))),
            ("n", Value::Integer(2)),
        ]),
        record([
            ("region", Value::from("b")),
            ("total", Value::Decimal(Decimal::new(55, 1))),
            ("n", Value::Integer(1)),
        ]),
    ]);
    let pivot = sums().with_field(FieldSpec::new("amount", "n").with_function(Function::Count));
    let compiled = PivotEngine::new().compile(&base_table(), &pivot).unwrap();

    let rows = compiled.execute(&executor).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["total"], Value::Integer(30));
    assert_eq!(rows[1]["total"], Value::Float(5.5));
    assert_eq!(rows[1]["n"], Value::Integer(1));
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn test_empty_pivot_skips_executor() {
    let executor = MockExecutor::new();
    let compiled = PivotEngine::new()
        .compile(&base_table(), &PivotSpec::new("empty"))
        .unwrap();
    assert!(compiled.execute(&executor).await.unwrap().is_empty());
    assert_eq!(executor.call_count(), 0);
}
