use std::collections::HashMap;

use granite_storage::{PosList, RowId, Table, NULL_ROW_ID};

use crate::join::key::JoinKey;
use crate::join::materialize::MaterializedValue;
use crate::join::JoinPredicate;

/// One partition's hash table: hashed key to the list of build-side entries
/// carrying the raw key and its row id.
///
/// Distinct raw values may share a hashed key (string hashes, float bit
/// patterns); probing re-checks the raw value. Duplicate build keys are
/// preserved in insertion order.
pub(crate) struct HashTable<T: JoinKey> {
    map: HashMap<T::Hashed, Vec<(T, RowId)>>,
}

impl<T: JoinKey> HashTable<T> {
    pub fn build(elements: &[MaterializedValue<T>]) -> HashTable<T> {
        let mut map: HashMap<T::Hashed, Vec<(T, RowId)>> = HashMap::with_capacity(elements.len());
        for element in elements {
            map.entry(element.value.hashed())
                .or_default()
                .push((element.value.clone(), element.row_id));
        }
        HashTable { map }
    }

    /// Build-side entries whose hashed key matches; callers re-check the
    /// raw value.
    pub fn candidates(&self, value: &T) -> &[(T, RowId)] {
        self.map.get(&value.hashed()).map_or(&[], |entries| entries.as_slice())
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.map.values().map(|entries| entries.len()).sum()
    }
}

/// Probe-time context for the additional AND-ed equality predicates.
///
/// Predicates are stored in (build column, probe column) orientation; the
/// operator flips them when the inputs were swapped. Values are read back
/// from the source tables, so NULL operands fail the predicate.
pub(crate) struct ProbeContext<'a> {
    pub build_table: &'a Table,
    pub probe_table: &'a Table,
    pub predicates: &'a [JoinPredicate],
}

impl ProbeContext<'_> {
    fn satisfies_predicates(&self, build_row: RowId, probe_row: RowId) -> bool {
        self.predicates.iter().all(|predicate| {
            let build_value = self.build_table.value_at(build_row, predicate.column_ids.0);
            let probe_value = self.probe_table.value_at(probe_row, predicate.column_ids.1);
            build_value.sql_eq(&probe_value)
        })
    }
}

/// Probe one partition for inner and outer modes.
///
/// Emits `(build_row, probe_row)` for every qualifying pair. With
/// `emit_unmatched` (LEFT/RIGHT outer), probe rows without a single
/// qualifying match emit `(NULL_ROW_ID, probe_row)`.
pub(crate) fn probe_partition<T: JoinKey>(
    elements: &[MaterializedValue<T>],
    hash_table: Option<&HashTable<T>>,
    emit_unmatched: bool,
    context: &ProbeContext<'_>,
) -> (PosList, PosList) {
    let mut build_side = PosList::with_capacity(elements.len());
    let mut probe_side = PosList::with_capacity(elements.len());

    for element in elements {
        let mut matched = false;
        if let Some(hash_table) = hash_table {
            for (build_value, build_row) in hash_table.candidates(&element.value) {
                if *build_value == element.value
                    && context.satisfies_predicates(*build_row, element.row_id)
                {
                    build_side.push(*build_row);
                    probe_side.push(element.row_id);
                    matched = true;
                }
            }
        }
        if !matched && emit_unmatched {
            build_side.push(NULL_ROW_ID);
            probe_side.push(element.row_id);
        }
    }

    (build_side, probe_side)
}

/// Probe one partition for semi and anti modes: at most one emission per
/// probe row, into the probe-side pos list only.
pub(crate) fn probe_partition_semi_anti<T: JoinKey>(
    elements: &[MaterializedValue<T>],
    hash_table: Option<&HashTable<T>>,
    anti: bool,
    context: &ProbeContext<'_>,
) -> PosList {
    let mut probe_side = PosList::new();

    for element in elements {
        let has_match = hash_table.is_some_and(|hash_table| {
            hash_table.candidates(&element.value).iter().any(|(build_value, build_row)| {
                *build_value == element.value
                    && context.satisfies_predicates(*build_row, element.row_id)
            })
        });
        if has_match != anti {
            probe_side.push(element.row_id);
        }
    }

    probe_side
}
