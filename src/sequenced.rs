//! Ordered persistent collections.
//!
//! Each value is stored together with a sequence number in the ordinary
//! trie. Iteration scans the trie and sorts by sequence number, so no
//! secondary index has to be kept in sync.
//!
//! Sequence numbers live strictly between the counters `first` and `last`:
//! `with_first` takes `first` and decrements it, appends take `last` and
//! increment it. Numbers of removed entries are not handed out again. When a
//! counter would leave the `i64` range, all entries are renumbered densely in
//! their current order.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};

use crate::config::{Config, Nullable, OrderPolicy};
use crate::error::Result;
use crate::map::{content_digest, replace_if_changed, replace_value, ChampMap};
use crate::node::Owner;

const FIRST_SEQ: i64 = -1;
const LAST_SEQ: i64 = 0;

/// A value tagged with its position in the order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Sequenced<V> {
    pub(crate) value: V,
    pub(crate) seq: i64,
}

impl<V: Nullable> Nullable for Sequenced<V> {
    #[inline]
    fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Where a write puts its key.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Place {
    /// Present keys keep their position; new keys are appended.
    Keep,
    First,
    Last,
}

/// A persistent map that iterates in insertion or access order.
///
/// ```rust
/// use champ_rs::SequencedMap;
///
/// let m = SequencedMap::new()
///     .with_last("x", 1)
///     .with_last("y", 2)
///     .with_first("z", 3);
/// let keys: Vec<_> = m.keys().copied().collect();
/// assert_eq!(keys, ["z", "x", "y"]);
/// assert_eq!(m.first_entry(), Some((&"z", &3)));
/// ```
pub struct SequencedMap<K, V, S = RandomState> {
    map: ChampMap<K, Sequenced<V>, S>,
    first: i64,
    last: i64,
    policy: OrderPolicy,
}

impl<K, V> SequencedMap<K, V, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_policy(policy: OrderPolicy) -> Self {
        Self::empty(ChampMap::new(), policy)
    }
}

impl<K, V, S> SequencedMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::empty(ChampMap::with_hasher(hasher), OrderPolicy::default())
    }

    pub fn with_options(hasher: S, config: Config, policy: OrderPolicy) -> Self
    where
        K: Nullable,
        V: Nullable,
    {
        Self::empty(ChampMap::with_hasher_and_config(hasher, config), policy)
    }

    fn empty(map: ChampMap<K, Sequenced<V>, S>, policy: OrderPolicy) -> Self {
        SequencedMap {
            map,
            first: FIRST_SEQ,
            last: LAST_SEQ,
            policy,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    pub fn config(&self) -> Config {
        self.map.config()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }

    /// Entries in sequence order. Scans and sorts the whole trie.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut items: Vec<(i64, &K, &V)> =
            self.map.iter().map(|(k, s)| (s.seq, k, &s.value)).collect();
        items.sort_unstable_by_key(|&(seq, _, _)| seq);
        Iter {
            inner: items.into_iter(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn first_entry(&self) -> Option<(&K, &V)> {
        self.map
            .iter()
            .min_by_key(|(_, s)| s.seq)
            .map(|(k, s)| (k, &s.value))
    }

    pub fn last_entry(&self) -> Option<(&K, &V)> {
        self.map
            .iter()
            .max_by_key(|(_, s)| s.seq)
            .map(|(k, s)| (k, &s.value))
    }
}

impl<K, V, S> SequencedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|s| &s.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Like [`get`](Self::get), but rejects a null key the configuration forbids.
    pub fn try_get<Q>(&self, key: &Q) -> Result<Option<&V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.map.config().check_key(key)?;
        Ok(self.get(key))
    }
}

impl<K, V, S> SequencedMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
    S: BuildHasher + Clone,
{
    fn take_first(&mut self, owner: Option<Owner>) -> i64 {
        if self.first == i64::MIN {
            self.renumber(owner);
        }
        let seq = self.first;
        self.first -= 1;
        seq
    }

    fn take_last(&mut self, owner: Option<Owner>) -> i64 {
        if self.last == i64::MAX {
            self.renumber(owner);
        }
        let seq = self.last;
        self.last += 1;
        seq
    }

    /// Renumbers every entry to `0..len` in current order.
    fn renumber(&mut self, owner: Option<Owner>) {
        let mut order: Vec<(i64, K, V)> = self
            .map
            .iter()
            .map(|(k, s)| (s.seq, k.clone(), s.value.clone()))
            .collect();
        order.sort_unstable_by_key(|&(seq, _, _)| seq);
        log::debug!("renumbering {} sequenced entries", order.len());

        let owner = owner.or_else(|| Some(Owner::new()));
        let len = order.len() as i64;
        for (seq, (_, key, value)) in (0..).zip(order) {
            // Stored entries already passed the null policy.
            let _ = self.map.update_in(owner, key, Sequenced { value, seq }, &replace_value);
        }
        self.first = FIRST_SEQ;
        self.last = len;
    }

    /// Writes `key`, returning whether anything changed. A pair the null
    /// policy rejects changes nothing.
    fn put(&mut self, owner: Option<Owner>, key: K, value: V, place: Place) -> bool {
        let current = self.map.get(&key).map(|s| s.seq);
        let seq = match (place, current) {
            (Place::Keep, Some(seq)) => seq,
            (Place::Last, Some(seq)) if seq == self.last - 1 => seq,
            (Place::First, Some(seq)) if seq == self.first + 1 => seq,
            (Place::First, _) => self.take_first(owner),
            _ => self.take_last(owner),
        };
        let change = self.map.update_in(owner, key, Sequenced { value, seq }, &replace_if_changed);
        matches!(change, Ok(change) if change.modified)
    }

    fn put_persistent(&self, key: K, value: V, place: Place) -> Self {
        let mut next = self.clone();
        if next.put(None, key, value, place) {
            next
        } else {
            self.clone()
        }
    }

    fn with_map(&self, map: ChampMap<K, Sequenced<V>, S>) -> Self {
        if map.is_empty() {
            return SequencedMap {
                map,
                first: FIRST_SEQ,
                last: LAST_SEQ,
                policy: self.policy,
            };
        }
        SequencedMap {
            map,
            first: self.first,
            last: self.last,
            policy: self.policy,
        }
    }

    /// Binds `key` to `value`.
    ///
    /// New keys are appended. A present key keeps its position under
    /// [`OrderPolicy::Insertion`] and moves last under
    /// [`OrderPolicy::Access`]. A pair the null policy rejects leaves the map
    /// unchanged; [`try_with`](Self::try_with) reports it instead.
    #[must_use]
    pub fn with(&self, key: K, value: V) -> Self {
        let place = match self.policy {
            OrderPolicy::Insertion => Place::Keep,
            OrderPolicy::Access => Place::Last,
        };
        self.put_persistent(key, value, place)
    }

    /// Binds `key` to `value` and moves it to the front.
    #[must_use]
    pub fn with_first(&self, key: K, value: V) -> Self {
        self.put_persistent(key, value, Place::First)
    }

    /// Binds `key` to `value` and moves it to the back.
    #[must_use]
    pub fn with_last(&self, key: K, value: V) -> Self {
        self.put_persistent(key, value, Place::Last)
    }

    pub fn try_with(&self, key: K, value: V) -> Result<Self>
    where
        K: Nullable,
        V: Nullable,
    {
        self.map.config().check_key(&key)?;
        self.map.config().check_value(&value)?;
        Ok(self.with(key, value))
    }

    /// Records an access to `key`: under [`OrderPolicy::Access`] it moves
    /// last, otherwise nothing happens.
    #[must_use]
    pub fn touch<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.policy != OrderPolicy::Access {
            return self.clone();
        }
        match self.map.get_key_value(key) {
            Some((k, s)) => self.put_persistent(k.clone(), s.value.clone(), Place::Last),
            None => self.clone(),
        }
    }

    #[must_use]
    pub fn without<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let map = self.map.without(key);
        if map.ptr_eq(&self.map) {
            return self.clone();
        }
        self.with_map(map)
    }

    /// Like [`without`](Self::without), but enforces the null policy.
    pub fn try_without<Q>(&self, key: &Q) -> Result<Self>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.map.config().check_key(key)?;
        Ok(self.without(key))
    }

    #[must_use]
    pub fn without_first(&self) -> Self {
        match self.first_entry() {
            Some((key, _)) => self.without(key),
            None => self.clone(),
        }
    }

    #[must_use]
    pub fn without_last(&self) -> Self {
        match self.last_entry() {
            Some((key, _)) => self.without(key),
            None => self.clone(),
        }
    }

    #[must_use]
    pub fn clear(&self) -> Self {
        self.with_map(self.map.clear())
    }
}

impl<K, V, S: Clone> Clone for SequencedMap<K, V, S> {
    fn clone(&self) -> Self {
        SequencedMap {
            map: self.map.clone(),
            first: self.first,
            last: self.last,
            policy: self.policy,
        }
    }
}

impl<K, V, S: Default> Default for SequencedMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> PartialEq for SequencedMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.map.iter().all(|(k, s)| other.get(k) == Some(&s.value))
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher> Eq for SequencedMap<K, V, S> {}

impl<K: Hash, V: Hash, S> Hash for SequencedMap<K, V, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        state.write_u64(content_digest(self.map.iter().map(|(k, s)| (k, &s.value))));
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for SequencedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for SequencedMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let owner = Some(Owner::new());
        let mut map = Self::default();
        for (key, value) in iter {
            map.put(owner, key, value, Place::Keep);
        }
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a SequencedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, K, V> {
    inner: std::vec::IntoIter<(i64, &'a K, &'a V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, k, v)| (k, v))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

// =============================================================================
// Sequenced set
// =============================================================================

/// A persistent set that iterates in insertion or access order.
pub struct SequencedSet<K, S = RandomState> {
    map: SequencedMap<K, (), S>,
}

impl<K> SequencedSet<K, RandomState> {
    pub fn new() -> Self {
        SequencedSet {
            map: SequencedMap::new(),
        }
    }

    pub fn with_policy(policy: OrderPolicy) -> Self {
        SequencedSet {
            map: SequencedMap::with_policy(policy),
        }
    }
}

impl<K, S> SequencedSet<K, S> {
    pub fn with_options(hasher: S, config: Config, policy: OrderPolicy) -> Self
    where
        K: Nullable,
    {
        SequencedSet {
            map: SequencedMap::with_options(hasher, config, policy),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn policy(&self) -> OrderPolicy {
        self.map.policy()
    }

    pub fn config(&self) -> Config {
        self.map.config()
    }

    pub fn first(&self) -> Option<&K> {
        self.map.first_entry().map(|(k, _)| k)
    }

    pub fn last(&self) -> Option<&K> {
        self.map.last_entry().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.map.keys()
    }
}

impl<K, S> SequencedSet<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    #[must_use]
    pub fn insert(&self, key: K) -> Self {
        SequencedSet {
            map: self.map.with(key, ()),
        }
    }

    #[must_use]
    pub fn insert_first(&self, key: K) -> Self {
        SequencedSet {
            map: self.map.with_first(key, ()),
        }
    }

    #[must_use]
    pub fn insert_last(&self, key: K) -> Self {
        SequencedSet {
            map: self.map.with_last(key, ()),
        }
    }

    #[must_use]
    pub fn touch<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        SequencedSet {
            map: self.map.touch(key),
        }
    }

    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        SequencedSet {
            map: self.map.without(key),
        }
    }

    /// Like [`contains`](Self::contains), but enforces the null policy.
    pub fn try_contains<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.map.try_get(key).map(|found| found.is_some())
    }

    /// Like [`insert`](Self::insert), but enforces the null policy.
    pub fn try_insert(&self, key: K) -> Result<Self>
    where
        K: Nullable,
    {
        self.map.try_with(key, ()).map(|map| SequencedSet { map })
    }

    /// Like [`remove`](Self::remove), but enforces the null policy.
    pub fn try_remove<Q>(&self, key: &Q) -> Result<Self>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.map.try_without(key).map(|map| SequencedSet { map })
    }
}

impl<K, S: Clone> Clone for SequencedSet<K, S> {
    fn clone(&self) -> Self {
        SequencedSet {
            map: self.map.clone(),
        }
    }
}

impl<K, S: Default> Default for SequencedSet<K, S> {
    fn default() -> Self {
        SequencedSet {
            map: SequencedMap::default(),
        }
    }
}

impl<K: Hash + Eq, S: BuildHasher> PartialEq for SequencedSet<K, S> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K: Hash + Eq, S: BuildHasher> Eq for SequencedSet<K, S> {}

impl<K: Hash, S> Hash for SequencedSet<K, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state);
    }
}

impl<K: fmt::Debug, S> fmt::Debug for SequencedSet<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S> FromIterator<K> for SequencedSet<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        SequencedSet {
            map: iter.into_iter().map(|k| (k, ())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{assert_canonical, ModuloState};

    fn keys<K: Clone, V, S>(m: &SequencedMap<K, V, S>) -> Vec<K> {
        m.keys().cloned().collect()
    }

    #[test]
    fn test_first_last_scenario() {
        let m = SequencedMap::new().with_last("x", 1).with_last("y", 2).with_first("z", 3);
        assert_eq!(keys(&m), ["z", "x", "y"]);
        assert_eq!(m.first_entry(), Some((&"z", &3)));
        assert_eq!(m.last_entry(), Some((&"y", &2)));

        let rev: Vec<&str> = m.keys().rev().copied().collect();
        assert_eq!(rev, ["y", "x", "z"]);
    }

    #[test]
    fn test_insertion_policy_keeps_position() {
        let m = SequencedMap::new().with("a", 1).with("b", 2).with("c", 3);
        let m2 = m.with("a", 10);
        assert_eq!(keys(&m2), ["a", "b", "c"]);
        assert_eq!(m2.get("a"), Some(&10));
        // Unchanged insert shares the root.
        assert!(m2.with("b", 2).ptr_eq(&m2));
        // Touch is a no-op under insertion order.
        assert!(m2.touch("a").ptr_eq(&m2));
    }

    #[test]
    fn test_access_policy_moves_last() {
        let m = SequencedMap::with_policy(OrderPolicy::Access)
            .with("a", 1)
            .with("b", 2)
            .with("c", 3);
        let m2 = m.with("a", 10);
        assert_eq!(keys(&m2), ["b", "c", "a"]);

        let m3 = m2.touch("b");
        assert_eq!(keys(&m3), ["c", "a", "b"]);
        assert!(m3.touch("b").ptr_eq(&m3));
        assert!(m3.touch("missing").ptr_eq(&m3));
        // Older versions keep their order.
        assert_eq!(keys(&m), ["a", "b", "c"]);
    }

    #[test]
    fn test_move_to_ends() {
        let m: SequencedMap<u32, u32> = (0..5).map(|i| (i, i)).collect();
        let m = m.with_first(3, 3).with_last(0, 0);
        assert_eq!(keys(&m), [3, 1, 2, 4, 0]);
        assert!(m.with_first(3, 3).ptr_eq(&m));
        assert!(m.with_last(0, 0).ptr_eq(&m));
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn test_without_ends() {
        let m: SequencedMap<u32, u32> = (0..5).map(|i| (i, i)).collect();
        let m = m.without_first().without_last();
        assert_eq!(keys(&m), [1, 2, 3]);
        let m = m.without(&2);
        assert_eq!(keys(&m), [1, 3]);
        assert!(m.without(&2).ptr_eq(&m));
    }

    #[test]
    fn test_numbers_not_reused() {
        let m = SequencedMap::new().with("a", 1).with("b", 2);
        let m = m.without_last().with("c", 3);
        assert_eq!(m.map.get("c").map(|s| s.seq), Some(2));

        let m = m.without_first().with_first("d", 4);
        assert_eq!(m.map.get("d").map(|s| s.seq), Some(-1));
        assert_eq!(keys(&m), ["d", "c"]);
    }

    #[test]
    fn test_emptying_resets_counters() {
        let m = SequencedMap::new().with("a", 1).with_first("b", 2);
        let empty = m.without("a").without("b");
        assert!(empty.is_empty());
        assert_eq!((empty.first, empty.last), (FIRST_SEQ, LAST_SEQ));
        assert!(empty.without_first().is_empty());

        let cleared = m.clear();
        assert_eq!((cleared.first, cleared.last), (FIRST_SEQ, LAST_SEQ));
        assert_eq!(cleared.policy(), m.policy());
    }

    #[test]
    fn test_renumber_at_upper_bound() {
        let mut m: SequencedMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
        m = m.with_first(100, 100);
        m.last = i64::MAX - 1;
        m = m.with_last(10, 10);
        assert_eq!(m.map.get(&10).map(|s| s.seq), Some(i64::MAX - 1));

        // The next append would reach the end of the range.
        m = m.with_last(11, 11);
        let order = keys(&m);
        let mut expect = vec![100];
        expect.extend(0..12);
        assert_eq!(order, expect);
        assert_eq!(m.first, FIRST_SEQ);
        assert_eq!(m.last, 13);
        let seqs: Vec<i64> = order.iter().map(|k| m.map.get(k).map(|s| s.seq).unwrap()).collect();
        assert_eq!(seqs, (0..13).collect::<Vec<_>>());
        assert_canonical(&m.map);
    }

    #[test]
    fn test_renumber_at_lower_bound() {
        let mut m: SequencedMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
        m.first = i64::MIN;
        m = m.with_first(7, 7);
        assert_eq!(keys(&m), [7, 0, 1, 2, 3]);
        assert_eq!(m.map.get(&7).map(|s| s.seq), Some(-1));
        assert_eq!(m.first, -2);
        assert_eq!(m.last, 4);
    }

    #[test]
    fn test_randomized_order_model() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(5);
        let hasher = ModuloState { buckets: 16 };
        let mut m: SequencedMap<u8, u32, ModuloState> =
            SequencedMap::with_options(hasher, Config::default(), OrderPolicy::Access);
        let mut model: Vec<(u8, u32)> = Vec::new();

        for step in 0..3000u32 {
            let key: u8 = rng.gen_range(0..40);
            let pos = model.iter().position(|&(k, _)| k == key);
            match rng.gen_range(0..5) {
                0 => {
                    m = m.with_first(key, step);
                    if let Some(i) = pos {
                        model.remove(i);
                    }
                    model.insert(0, (key, step));
                }
                1 | 2 => {
                    m = m.with(key, step);
                    if let Some(i) = pos {
                        model.remove(i);
                    }
                    model.push((key, step));
                }
                3 => {
                    m = m.without(&key);
                    if let Some(i) = pos {
                        model.remove(i);
                    }
                }
                _ => {
                    m = m.touch(&key);
                    if let Some(i) = pos {
                        let entry = model.remove(i);
                        model.push(entry);
                    }
                }
            }
            if step % 997 == 0 {
                // Force a renumbering on the next append.
                m.last = i64::MAX;
            }
            let got: Vec<(u8, u32)> = m.iter().map(|(k, v)| (*k, *v)).collect();
            assert_eq!(got, model);
        }
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = SequencedMap::new().with(1, "a").with(2, "b");
        let b = SequencedMap::new().with(2, "b").with(1, "a");
        assert_eq!(a, b);
        assert_ne!(a, a.with(1, "z"));
        assert_eq!(format!("{:?}", b), r#"{2: "b", 1: "a"}"#);
    }

    #[test]
    fn test_null_policy() {
        let m: SequencedMap<Option<u8>, u8> =
            SequencedMap::with_options(RandomState::new(), Config::STRICT, OrderPolicy::Insertion);
        assert!(m.try_with(None, 1).is_err());
        assert_eq!(m.try_with(Some(1), 1).unwrap().len(), 1);
        assert!(matches!(m.try_get(&None::<u8>), Err(Error::InvalidArgument { .. })));
        assert!(matches!(m.try_without(&None::<u8>), Err(Error::InvalidArgument { .. })));
        assert_eq!(m.with(Some(2), 2).try_get(&Some(2u8)), Ok(Some(&2)));
    }

    #[test]
    fn test_strict_map_never_stores_null() {
        let m: SequencedMap<Option<u8>, Option<u8>> =
            SequencedMap::with_options(RandomState::new(), Config::STRICT, OrderPolicy::Access)
                .with(Some(1), Some(1))
                .with(Some(2), Some(2));

        assert!(m.with(None, Some(3)).ptr_eq(&m));
        assert!(m.with_first(None, Some(3)).ptr_eq(&m));
        assert!(m.with_last(Some(3), None).ptr_eq(&m));
        // A rejected move of a present key keeps its place too.
        assert!(m.with(Some(1), None).ptr_eq(&m));
        assert_eq!(keys(&m), [Some(1), Some(2)]);
        assert_eq!(m.with_last(Some(3), Some(3)).last_entry(), Some((&Some(3), &Some(3))));
        assert!(m.clear().with(None, Some(1)).is_empty());
    }

    #[test]
    fn test_sequenced_set_null_policy() {
        let s: SequencedSet<Option<u8>> =
            SequencedSet::with_options(RandomState::new(), Config::STRICT, OrderPolicy::Insertion);
        assert_eq!(s.config(), Config::STRICT);
        assert!(s.insert(None).is_empty());
        assert!(s.insert_first(None).is_empty());
        assert!(matches!(s.try_insert(None), Err(Error::InvalidArgument { .. })));
        assert!(matches!(s.try_contains(&None::<u8>), Err(Error::InvalidArgument { .. })));
        assert!(matches!(s.try_remove(&None::<u8>), Err(Error::InvalidArgument { .. })));

        let s = s.try_insert(Some(1)).unwrap();
        assert_eq!(s.try_contains(&Some(1u8)), Ok(true));
        assert!(s.try_remove(&Some(1u8)).unwrap().is_empty());
    }

    #[test]
    fn test_sequenced_set() {
        let s = SequencedSet::new().insert("b").insert("c").insert_first("a");
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(s.first(), Some(&"a"));
        assert_eq!(s.last(), Some(&"c"));
        assert!(s.contains("b"));

        let s = s.insert_last("a").remove("b");
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), ["c", "a"]);
        assert!(s.insert("c").iter().eq(s.iter()));

        let lru = SequencedSet::with_policy(OrderPolicy::Access).insert(1).insert(2).touch(&1);
        assert_eq!(lru.iter().copied().collect::<Vec<_>>(), [2, 1]);

        let collected: SequencedSet<u8> = [3, 1, 2, 1].into_iter().collect();
        assert_eq!(collected.iter().copied().collect::<Vec<_>>(), [3, 1, 2]);
    }
}
