use super::*;

use crate::testing::{assert_canonical, ModuloState};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::HashMap;

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "0u16..512")] u16, u32),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "0u16..512")] u16),
    #[proptest(weight = 2)]
    Get(#[proptest(strategy = "0u16..512")] u16),
    /// Keep the current version and continue from a builder.
    Snapshot,
}

#[derive(Clone, Debug, Arbitrary)]
enum SeqOp {
    First(#[proptest(strategy = "0u8..32")] u8),
    #[proptest(weight = 2)]
    Last(#[proptest(strategy = "0u8..32")] u8),
    #[proptest(weight = 2)]
    Put(#[proptest(strategy = "0u8..32")] u8),
    Remove(#[proptest(strategy = "0u8..32")] u8),
    RemoveFirst,
    RemoveLast,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=1500)
}

fn check_against_model<S: std::hash::BuildHasher + Clone>(
    ops: Vec<Op>,
    empty: ChampMap<u16, u32, S>,
) -> std::result::Result<(), TestCaseError> {
    let mut map = empty;
    let mut model: HashMap<u16, u32> = HashMap::new();
    let mut snapshots = Vec::new();

    for op in ops {
        match op {
            Op::Insert(key, value) => {
                map = map.with(key, value);
                model.insert(key, value);
            }
            Op::Remove(key) => {
                map = map.without(&key);
                model.remove(&key);
            }
            Op::Get(key) => {
                prop_assert_eq!(map.get(&key), model.get(&key));
            }
            Op::Snapshot => {
                snapshots.push((map.clone(), model.clone()));
                let mut builder = map.to_builder();
                builder.insert(u16::MAX, 0).map_err(|e| TestCaseError::fail(e.to_string()))?;
                builder.remove(&u16::MAX).map_err(|e| TestCaseError::fail(e.to_string()))?;
                map = builder.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
        }
        prop_assert_eq!(map.len(), model.len());
    }

    assert_canonical(&map);
    let mut got: Vec<(u16, u32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    let mut expected: Vec<(u16, u32)> = model.into_iter().collect();
    got.sort_unstable();
    expected.sort_unstable();
    prop_assert_eq!(got, expected);

    for (old, old_model) in snapshots {
        assert_canonical(&old);
        prop_assert_eq!(old.len(), old_model.len());
        for (k, v) in &old_model {
            prop_assert_eq!(old.get(k), Some(v));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_random_hash(ops in ops_strategy()) {
        check_against_model(ops, ChampMap::new())?;
    }

    #[test]
    fn prop_equivalence_colliding_hash(ops in ops_strategy()) {
        // 64 buckets for 512 keys: every bucket is a deep collision node.
        check_against_model(ops, ChampMap::with_hasher(ModuloState { buckets: 64 }))?;
    }

    #[test]
    fn prop_builder_equals_persistent(
        pairs in prop::collection::vec((0u16..300, any::<u32>()), 0..600)
    ) {
        let mut builder = ChampBuilder::new();
        let mut persistent = ChampMap::new();
        for &(k, v) in &pairs {
            builder.insert(k, v).map_err(|e| TestCaseError::fail(e.to_string()))?;
            persistent = persistent.with(k, v);
        }
        let built = builder.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let collected: ChampMap<u16, u32> = pairs.into_iter().collect();
        assert_canonical(&built);
        prop_assert_eq!(&built, &persistent);
        prop_assert_eq!(&built, &collected);
    }

    #[test]
    fn prop_split_partitions(n in 0u32..3000, splits in 0usize..64) {
        let map: ChampMap<u32, u32> = (0..n).map(|i| (i, i)).collect();
        let mut parts = vec![map.traversal()];
        for i in 0..splits {
            let idx = i % parts.len();
            if let Some(other) = parts[idx].split() {
                parts.push(other);
            }
        }
        let mut keys: Vec<u32> = parts.into_iter().flatten().map(|(k, _)| k).collect();
        keys.sort_unstable();
        prop_assert_eq!(keys, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn prop_sequenced_order(ops in prop::collection::vec(any::<SeqOp>(), 0..400)) {
        let mut map: SequencedMap<u8, usize, ModuloState> =
            SequencedMap::with_hasher(ModuloState { buckets: 8 });
        let mut model: Vec<(u8, usize)> = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
            let position =
                |model: &Vec<(u8, usize)>, key: u8| model.iter().position(|&(k, _)| k == key);
            match op {
                SeqOp::First(key) => {
                    map = map.with_first(key, step);
                    if let Some(i) = position(&model, key) {
                        model.remove(i);
                    }
                    model.insert(0, (key, step));
                }
                SeqOp::Last(key) => {
                    map = map.with_last(key, step);
                    if let Some(i) = position(&model, key) {
                        model.remove(i);
                    }
                    model.push((key, step));
                }
                SeqOp::Put(key) => {
                    map = map.with(key, step);
                    match position(&model, key) {
                        Some(i) => model[i].1 = step,
                        None => model.push((key, step)),
                    }
                }
                SeqOp::Remove(key) => {
                    map = map.without(&key);
                    if let Some(i) = position(&model, key) {
                        model.remove(i);
                    }
                }
                SeqOp::RemoveFirst => {
                    map = map.without_first();
                    if !model.is_empty() {
                        model.remove(0);
                    }
                }
                SeqOp::RemoveLast => {
                    map = map.without_last();
                    model.pop();
                }
            }
            let got: Vec<(u8, usize)> = map.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(&got, &model);
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    // Two buckets: keys collide in pairs and triples.
    let keys: Vec<u32> = vec![1, 2, 3, 4, 5, 6];
    let mut reference: Option<ChampMap<u32, u32, ModuloState>> = None;

    for_each_permutation(&keys, |perm| {
        let mut map = ChampMap::with_hasher(ModuloState { buckets: 2 });
        for k in perm {
            map = map.with(k, k * 10);
        }
        assert_canonical(&map);
        match &reference {
            Some(first) => assert_eq!(&map, first),
            None => reference = Some(map),
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u32> = vec![1, 2, 3, 4, 5, 6];
    let base: ChampMap<u32, u32, ModuloState> = keys.iter().map(|&k| (k, k)).collect();

    for_each_permutation(&keys, |perm| {
        let mut map = base.clone();
        for k in perm {
            assert_eq!(map.get(&k), Some(&k));
            map = map.without(&k);
            assert_canonical(&map);
        }
        assert!(map.is_empty());
        assert_eq!(map.root().arity(), 0);
    });
}
