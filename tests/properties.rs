mod common;

use common::{categories, column_f64, floats, integers, table};
use data_wrangler::{
    dedupe::deduplicate,
    impute::{ImputeConfig, ImputeStrategy, impute},
    scale::{ScaleMethod, scale},
    stage::StageOutcome,
};
use proptest::prelude::*;

fn small_rows() -> impl Strategy<Value = Vec<(Option<i64>, Option<u8>)>> {
    prop::collection::vec((prop::option::of(0i64..4), prop::option::of(0u8..3)), 0..24)
}

proptest! {
    #[test]
    fn dedupe_is_idempotent(rows in small_rows()) {
        let ids: Vec<Option<i64>> = rows.iter().map(|r| r.0).collect();
        let labels: Vec<Option<String>> = rows
            .iter()
            .map(|r| r.1.map(|c| format!("c{c}")))
            .collect();
        let label_refs: Vec<Option<&str>> = labels.iter().map(|l| l.as_deref()).collect();
        let input = table(vec![integers("id", &ids), categories("label", &label_refs)]);

        let once = deduplicate(&input).into_table_or(input.clone());
        let twice = deduplicate(&once);
        prop_assert!(!twice.is_applied());
        prop_assert_eq!(twice.into_table_or(once.clone()), once);
    }

    #[test]
    fn minmax_output_stays_in_unit_interval(
        values in prop::collection::vec(prop::option::of(-1.0e6f64..1.0e6), 1..40)
    ) {
        prop_assume!(values.iter().any(Option::is_some));
        let input = table(vec![floats("x", &values)]);
        let outcome = scale(&input, &[], ScaleMethod::MinMax).unwrap();
        let scaled = column_f64(outcome.table().unwrap(), "x");
        for (before, after) in values.iter().zip(&scaled) {
            prop_assert_eq!(before.is_some(), after.is_some());
            if let Some(v) = after {
                prop_assert!((0.0..=1.0).contains(v), "{} outside [0, 1]", v);
            }
        }
    }

    #[test]
    fn mean_impute_leaves_complete_columns_alone(
        values in prop::collection::vec(-1000i64..1000, 1..30)
    ) {
        let present: Vec<Option<i64>> = values.into_iter().map(Some).collect();
        let input = table(vec![integers("x", &present)]);
        let outcome = impute(&input, &[], &ImputeConfig::new(ImputeStrategy::Mean)).unwrap();
        prop_assert!(matches!(outcome, StageOutcome::Skipped(_)));
        prop_assert_eq!(outcome.into_table_or(input.clone()), input);
    }
}
