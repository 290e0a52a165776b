//! Persistent hash map on top of the CHAMP trie.

use std::borrow::Borrow;
use std::collections::hash_map::{DefaultHasher, RandomState};
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FusedIterator;
use std::sync::Arc;

use crate::builder::ChampBuilder;
use crate::config::{Config, NullGuard, Nullable};
use crate::cursor::{Cursor, Traversal};
use crate::error::Result;
use crate::node::{Change, Entry, EntryIter, Node, Owner};

/// Merge function that always takes the new value.
pub(crate) fn replace_value<V>(_: &V, new: V) -> Option<V> {
    Some(new)
}

/// Merge function that keeps the stored value when the new one is equal.
pub(crate) fn replace_if_changed<V: PartialEq>(old: &V, new: V) -> Option<V> {
    (*old != new).then_some(new)
}

/// Order-independent digest of a collection's content.
///
/// Each item is hashed with a fixed-key hasher and the digests are summed,
/// so equal collections agree no matter their layout or `BuildHasher`.
pub(crate) fn content_digest<T: Hash>(items: impl Iterator<Item = T>) -> u64 {
    items.fold(0u64, |sum, item| {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        sum.wrapping_add(hasher.finish())
    })
}

/// A persistent hash map.
///
/// Every "mutating" operation returns a new map and leaves the receiver
/// untouched; unchanged subtrees are shared between the two versions.
/// Cloning is `O(1)`.
///
/// ```rust
/// use champ_rs::ChampMap;
///
/// let a: ChampMap<&str, i32> = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
/// let b = a.without("b");
///
/// assert_eq!(a.len(), 3);
/// assert_eq!(b.len(), 2);
/// assert_eq!(b.get("b"), None);
/// assert_eq!(b.get("c"), Some(&3));
/// ```
pub struct ChampMap<K, V, S = RandomState> {
    root: Arc<Node<K, V>>,
    len: usize,
    hasher: S,
    config: Config,
    guard: NullGuard<K, V>,
}

impl<K, V> ChampMap<K, V, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_config(config: Config) -> Self
    where
        K: Nullable,
        V: Nullable,
    {
        Self::with_hasher_and_config(RandomState::new(), config)
    }
}

impl<K, V, S> ChampMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(hasher, Config::default(), NullGuard::permissive())
    }

    /// An empty map whose every version rejects the nulls `config` forbids.
    pub fn with_hasher_and_config(hasher: S, config: Config) -> Self
    where
        K: Nullable,
        V: Nullable,
    {
        Self::from_parts(hasher, config, NullGuard::new(config))
    }

    fn from_parts(hasher: S, config: Config, guard: NullGuard<K, V>) -> Self {
        ChampMap {
            root: Arc::new(Node::empty()),
            len: 0,
            hasher,
            config,
            guard,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Whether both maps share the same root, i.e. one is an unchanged
    /// version of the other.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: EntryIter::new(&self.root),
            remaining: self.len,
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// A read-only cursor over this snapshot.
    pub fn cursor(&self) -> Cursor<K, V> {
        Cursor::snapshot(Arc::clone(&self.root), self.len)
    }

    pub(crate) fn root(&self) -> &Arc<Node<K, V>> {
        &self.root
    }

    pub(crate) fn traversal(&self) -> Traversal<K, V> {
        Traversal::new(Arc::clone(&self.root), self.len)
    }
}

impl<K, V, S> ChampMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    pub(crate) fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root
            .find(key, self.hash_of(key))
            .map(|e| (&e.key, &e.value))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }

    /// Like [`get`](Self::get), but rejects a null key the configuration forbids.
    pub fn try_get<Q>(&self, key: &Q) -> Result<Option<&V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.config.check_key(key)?;
        Ok(self.get(key))
    }
}

impl<K, V, S> ChampMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Inserts into this map's own root, editing nodes owned by `owner` in place.
    ///
    /// Fails with [`Error::InvalidArgument`](crate::Error::InvalidArgument),
    /// leaving the map untouched, when the null policy rejects the pair.
    pub(crate) fn update_in<F>(
        &mut self,
        owner: Option<Owner>,
        key: K,
        value: V,
        merge: &F,
    ) -> Result<Change<V>>
    where
        F: Fn(&V, V) -> Option<V>,
    {
        self.guard.check(&key, &value)?;
        let hash = self.hash_of(&key);
        let mut change = Change::new();
        Node::update(&mut self.root, owner, Entry { hash, key, value }, 0, merge, &mut change);
        if change.added() {
            self.len += 1;
        }
        Ok(change)
    }

    pub(crate) fn remove_in<Q>(&mut self, owner: Option<Owner>, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        let mut change = Change::new();
        Node::remove(&mut self.root, owner, key, hash, 0, &mut change);
        if change.modified {
            self.len -= 1;
        }
        change.old
    }

    /// A map with `key` bound to `value`.
    ///
    /// Returns a map sharing this map's root (see [`ptr_eq`](Self::ptr_eq))
    /// when `key` is already bound to an equal value, or when the null policy
    /// rejects the pair. [`try_with`](Self::try_with) reports the rejection.
    #[must_use]
    pub fn with(&self, key: K, value: V) -> Self
    where
        V: PartialEq,
    {
        let mut next = self.clone();
        match next.update_in(None, key, value, &replace_if_changed) {
            Ok(change) if change.modified => next,
            _ => self.clone(),
        }
    }

    /// A map without `key`; shares this map's root when `key` is absent.
    #[must_use]
    pub fn without<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut next = self.clone();
        match next.remove_in(None, key) {
            Some(_) => next,
            None => self.clone(),
        }
    }

    /// Inserts every pair in order (last writer wins) through a single
    /// transient owner, so each touched node is copied at most once.
    ///
    /// Pairs the null policy rejects are skipped.
    #[must_use]
    pub fn with_all<I>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        let owner = Some(Owner::new());
        let mut next = self.clone();
        let mut rejected = 0usize;
        for (key, value) in pairs {
            if next.update_in(owner, key, value, &replace_if_changed).is_err() {
                rejected += 1;
            }
        }
        if rejected > 0 {
            log::debug!("with_all skipped {rejected} pairs rejected by the null policy");
        }
        next
    }

    /// Removes every key in `keys` through a single transient owner.
    #[must_use]
    pub fn without_all<'a, Q, I>(&self, keys: I) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let owner = Some(Owner::new());
        let mut next = self.clone();
        for key in keys {
            next.remove_in(owner, key);
        }
        next
    }

    /// The empty map with this map's hasher and configuration.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::from_parts(self.hasher.clone(), self.config, self.guard)
    }

    /// A builder that starts from this map without copying it.
    pub fn to_builder(&self) -> ChampBuilder<K, V, S> {
        ChampBuilder::from_map(self.clone())
    }

    /// Like [`with`](Self::with), but enforces the null policy.
    pub fn try_with(&self, key: K, value: V) -> Result<Self>
    where
        K: Nullable,
        V: PartialEq + Nullable,
    {
        self.config.check_key(&key)?;
        self.config.check_value(&value)?;
        Ok(self.with(key, value))
    }

    /// Like [`without`](Self::without), but enforces the null policy.
    pub fn try_without<Q>(&self, key: &Q) -> Result<Self>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.config.check_key(key)?;
        Ok(self.without(key))
    }
}

impl<K, V, S: Clone> Clone for ChampMap<K, V, S> {
    fn clone(&self) -> Self {
        ChampMap {
            root: Arc::clone(&self.root),
            len: self.len,
            hasher: self.hasher.clone(),
            config: self.config,
            guard: self.guard,
        }
    }
}

impl<K, V, S: Default> Default for ChampMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> PartialEq for ChampMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        Arc::ptr_eq(&self.root, &other.root) || self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher> Eq for ChampMap<K, V, S> {}

impl<K: Hash, V: Hash, S> Hash for ChampMap<K, V, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);
        state.write_u64(content_digest(self.iter()));
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for ChampMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for ChampMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let owner = Some(Owner::new());
        let mut map = Self::default();
        for (key, value) in iter {
            // A default map is permissive and accepts every pair.
            let _ = map.update_in(owner, key, value, &replace_value);
        }
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChampMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone, V: Clone, S> IntoIterator for ChampMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = Traversal<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.traversal()
    }
}

// =============================================================================
// Iterators
// =============================================================================

pub struct Iter<'a, K, V> {
    inner: EntryIter<'a, K, V>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        self.remaining -= 1;
        Some((&entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}
