//! Property: compiling the same table twice yields byte-identical SQL, and
//! every selected alias is exposed exactly once.

use analytics::testing::sample_schema;
use analytics::{ExtractionEngine, FieldSpec, TableSpec, Unrestricted};
use proptest::prelude::*;
use proptest::sample::subsequence;

const PATHS: &[&str] = &[
    "id",
    "status",
    "created_at.year",
    "closed_at.quarter",
    "meta.region",
    "document[main].amount",
    "document[main].region",
    "document[main].due.month",
    "document[main].address.city",
    "workitem[review,first].status",
    "workitem[review,last].document[review-form].score",
    "workitem[submit,lastclosed].closed_at",
];

fn table(paths: &[&str], filtered: Option<usize>) -> TableSpec {
    let mut table = TableSpec::new("prop", "cases");
    for (i, path) in paths.iter().enumerate() {
        let mut field = FieldSpec::new(*path, format!("f{}", i));
        if filtered == Some(i) {
            field = field.with_filters(["x", "y"]);
        }
        table = table.with_field(field);
    }
    table
}

proptest! {
    #[test]
    fn compile_twice_is_identical(
        paths in subsequence(PATHS.to_vec(), 1..PATHS.len()).prop_shuffle(),
        filtered in proptest::option::of(0usize..4),
    ) {
        let spec = table(&paths, filtered);
        let engine = ExtractionEngine::new(sample_schema(), Unrestricted);

        let first = engine.sql(&spec).unwrap();
        let second = ExtractionEngine::new(sample_schema(), Unrestricted).sql(&spec).unwrap();
        prop_assert_eq!(&first, &second);

        let compiled = engine.compile(&spec).unwrap();
        let mut aliases = compiled.query.output_aliases();
        aliases.sort();
        let mut expected: Vec<String> = (0..paths.len()).map(|i| format!("f{}", i)).collect();
        expected.sort();
        prop_assert_eq!(aliases, expected);
    }
}
