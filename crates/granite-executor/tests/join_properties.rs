mod common;

use std::collections::HashMap;

use common::{int_pairs, int_table, int_values};
use granite_executor::{HashJoin, JoinMode, PredicateCondition, SortMergeJoin};
use proptest::prelude::*;

fn chunked(values: &[Option<i32>]) -> Vec<Vec<Option<i32>>> {
    values.chunks(7).map(|chunk| chunk.to_vec()).collect()
}

fn hash_join_pairs(
    left: &[Option<i32>],
    right: &[Option<i32>],
    mode: JoinMode,
) -> Vec<(Option<i32>, Option<i32>)> {
    let join = HashJoin::new(
        int_table("a", chunked(left)),
        int_table("b", chunked(right)),
        mode,
        (0, 0),
        PredicateCondition::Equals,
        None,
        vec![],
    )
    .unwrap();
    int_pairs(&join.execute(None).unwrap())
}

fn key_counts(values: &[Option<i32>]) -> HashMap<i32, usize> {
    let mut counts = HashMap::new();
    for value in values.iter().flatten() {
        *counts.entry(*value).or_insert(0) += 1;
    }
    counts
}

fn nullable_column() -> impl Strategy<Value = Vec<Option<i32>>> {
    prop::collection::vec(prop::option::weighted(0.9, 0i32..40), 0..60)
}

proptest! {
    /// |inner join| = sum over keys of count_left * count_right
    #[test]
    fn prop_inner_join_multiplicity(left in nullable_column(), right in nullable_column()) {
        let pairs = hash_join_pairs(&left, &right, JoinMode::Inner);

        let left_counts = key_counts(&left);
        let right_counts = key_counts(&right);
        let expected: usize = left_counts
            .iter()
            .map(|(key, count)| count * right_counts.get(key).copied().unwrap_or(0))
            .sum();
        prop_assert_eq!(pairs.len(), expected);
    }

    /// Hash join and sort-merge join agree on every equality join
    #[test]
    fn prop_hash_and_sort_merge_agree(left in nullable_column(), right in nullable_column()) {
        for mode in [JoinMode::Inner, JoinMode::Left, JoinMode::Right] {
            let hash = hash_join_pairs(&left, &right, mode);

            let merge = SortMergeJoin::new(
                int_table("a", chunked(&left)),
                int_table("b", chunked(&right)),
                mode,
                (0, 0),
                PredicateCondition::Equals,
            )
            .unwrap();
            let merge_pairs = int_pairs(&merge.execute(None).unwrap());
            prop_assert_eq!(&merge_pairs, &hash, "mode {}", mode);
        }
    }

    /// Semi and anti partition the left rows: every left row lands in
    /// exactly one of the two outputs.
    #[test]
    fn prop_semi_anti_partition_left(left in nullable_column(), right in nullable_column()) {
        let semi = HashJoin::new(
            int_table("a", chunked(&left)),
            int_table("b", chunked(&right)),
            JoinMode::Semi,
            (0, 0),
            PredicateCondition::Equals,
            None,
            vec![],
        )
        .unwrap();
        let anti = HashJoin::new(
            int_table("a", chunked(&left)),
            int_table("b", chunked(&right)),
            JoinMode::Anti,
            (0, 0),
            PredicateCondition::Equals,
            None,
            vec![],
        )
        .unwrap();

        let semi_rows = int_values(&semi.execute(None).unwrap());
        let anti_rows = int_values(&anti.execute(None).unwrap());
        prop_assert_eq!(semi_rows.len() + anti_rows.len(), left.len());

        let mut union: Vec<Option<i32>> = semi_rows;
        union.extend(anti_rows);
        union.sort();
        let mut expected = left.clone();
        expected.sort();
        prop_assert_eq!(union, expected);
    }

    /// Swapping the inputs of an inner equality join mirrors the output
    #[test]
    fn prop_inner_join_column_symmetry(left in nullable_column(), right in nullable_column()) {
        let forward = hash_join_pairs(&left, &right, JoinMode::Inner);
        let mut backward: Vec<_> = hash_join_pairs(&right, &left, JoinMode::Inner)
            .into_iter()
            .map(|(r, l)| (l, r))
            .collect();
        backward.sort();
        prop_assert_eq!(forward, backward);
    }

    /// LEFT outer emits every left row at least once, unmatched ones
    /// exactly once with NULL on the right.
    #[test]
    fn prop_left_outer_preserves_left_rows(left in nullable_column(), right in nullable_column()) {
        let pairs = hash_join_pairs(&left, &right, JoinMode::Left);

        let right_counts = key_counts(&right);
        let mut expected = 0usize;
        for value in &left {
            match value {
                Some(value) => expected += right_counts.get(value).copied().unwrap_or(1).max(1),
                None => expected += 1,
            }
        }
        prop_assert_eq!(pairs.len(), expected);

        // Unmatched rows carry NULL on the right.
        let unmatched = pairs.iter().filter(|(_, r)| r.is_none()).count();
        let expected_unmatched = left
            .iter()
            .filter(|value| {
                value.map_or(true, |v| !right_counts.contains_key(&v))
            })
            .count();
        prop_assert_eq!(unmatched, expected_unmatched);
    }
}
