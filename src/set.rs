//! Persistent hash set: a [`ChampMap`] with `()` values.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FusedIterator;

use crate::builder::SetBuilder;
use crate::config::{Config, Nullable};
use crate::cursor::{Cursor, Traversal};
use crate::error::Result;
use crate::map::{self, content_digest, ChampMap};

/// A persistent hash set.
///
/// ```rust
/// use champ_rs::ChampSet;
///
/// let odd: ChampSet<u32> = (0..10).filter(|i| i % 2 == 1).collect();
/// let low: ChampSet<u32> = (0..5).collect();
///
/// assert_eq!(odd.intersection(&low).len(), 2);
/// assert_eq!(odd.union(&low).len(), 7);
/// assert!(odd.without(&1).is_subset(&odd));
/// ```
pub struct ChampSet<K, S = RandomState> {
    map: ChampMap<K, (), S>,
}

impl<K> ChampSet<K, RandomState> {
    pub fn new() -> Self {
        Self::from_map(ChampMap::new())
    }

    pub fn with_config(config: Config) -> Self
    where
        K: Nullable,
    {
        Self::from_map(ChampMap::with_config(config))
    }
}

impl<K, S> ChampSet<K, S> {
    pub(crate) fn from_map(map: ChampMap<K, (), S>) -> Self {
        ChampSet { map }
    }

    pub fn with_hasher(hasher: S) -> Self {
        Self::from_map(ChampMap::with_hasher(hasher))
    }

    pub fn with_hasher_and_config(hasher: S, config: Config) -> Self
    where
        K: Nullable,
    {
        Self::from_map(ChampMap::with_hasher_and_config(hasher, config))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn config(&self) -> Config {
        self.map.config()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }

    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            inner: self.map.keys(),
        }
    }

    /// A read-only cursor; the values it reports are `()`.
    pub fn cursor(&self) -> Cursor<K, ()> {
        self.map.cursor()
    }

    #[cfg(any(test, feature = "rayon"))]
    pub(crate) fn as_map(&self) -> &ChampMap<K, (), S> {
        &self.map
    }
}

impl<K, S> ChampSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_key_value(key).map(|(k, _)| k)
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|k| other.contains(k))
    }
}

impl<K, S> ChampSet<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// A set that also contains `key`; shares this set's root when it is present.
    #[must_use]
    pub fn with(&self, key: K) -> Self {
        Self::from_map(self.map.with(key, ()))
    }

    /// A set without `key`; shares this set's root when it is absent.
    #[must_use]
    pub fn without<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Self::from_map(self.map.without(key))
    }

    pub fn try_with(&self, key: K) -> Result<Self>
    where
        K: Nullable,
    {
        self.map.try_with(key, ()).map(Self::from_map)
    }

    pub fn try_without<Q>(&self, key: &Q) -> Result<Self>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Nullable + ?Sized,
    {
        self.map.try_without(key).map(Self::from_map)
    }

    #[must_use]
    pub fn clear(&self) -> Self {
        Self::from_map(self.map.clear())
    }

    pub fn to_builder(&self) -> SetBuilder<K, S> {
        SetBuilder::from_builder(self.map.to_builder())
    }

    /// Elements of either set. Starts from the larger one.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (big, small) = if self.len() >= other.len() { (self, other) } else { (other, self) };
        Self::from_map(big.map.with_all(small.iter().map(|k| (k.clone(), ()))))
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let (big, small) = if self.len() >= other.len() { (self, other) } else { (other, self) };
        Self::from_map(small.map.without_all(small.iter().filter(|k| !big.contains(*k))))
    }

    /// Elements of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        if self.len() <= other.len() {
            Self::from_map(self.map.without_all(self.iter().filter(|k| other.contains(*k))))
        } else {
            Self::from_map(self.map.without_all(other.iter()))
        }
    }
}

impl<K, S: Clone> Clone for ChampSet<K, S> {
    fn clone(&self) -> Self {
        ChampSet {
            map: self.map.clone(),
        }
    }
}

impl<K, S: Default> Default for ChampSet<K, S> {
    fn default() -> Self {
        Self::from_map(ChampMap::default())
    }
}

impl<K: Hash + Eq, S: BuildHasher> PartialEq for ChampSet<K, S> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K: Hash + Eq, S: BuildHasher> Eq for ChampSet<K, S> {}

impl<K: Hash, S> Hash for ChampSet<K, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        state.write_u64(content_digest(self.iter()));
    }
}

impl<K: fmt::Debug, S> fmt::Debug for ChampSet<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S> FromIterator<K> for ChampSet<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|k| (k, ())).collect())
    }
}

impl<'a, K, S> IntoIterator for &'a ChampSet<K, S> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone, S> IntoIterator for ChampSet<K, S> {
    type Item = K;
    type IntoIter = IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.map.into_iter(),
        }
    }
}

pub struct Iter<'a, K> {
    inner: map::Keys<'a, K, ()>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}

impl<K> FusedIterator for Iter<'_, K> {}

pub struct IntoIter<K> {
    inner: Traversal<K, ()>,
}

impl<K: Clone> Iterator for IntoIter<K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, ())| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
