//! Transient builders: in-place trie construction sealed into persistent
//! collections.
//!
//! A builder owns a fresh [`Owner`] token. Nodes it creates carry that token
//! and are edited in place on later touches; nodes inherited from a shared
//! snapshot are copied once and then owned. [`ChampBuilder::build`] drops the
//! token, after which the trie is only ever copied on write again.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{Config, Nullable};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::map::{replace_value, ChampMap};
use crate::node::Owner;
use crate::set::ChampSet;

/// Mutable builder for [`ChampMap`].
///
/// ```rust
/// use champ_rs::ChampBuilder;
///
/// let mut builder = ChampBuilder::new();
/// for i in 0..100u32 {
///     builder.insert(i, i * 2).unwrap();
/// }
/// let map = builder.build().unwrap();
/// assert_eq!(map.get(&21), Some(&42));
/// assert!(builder.insert(0, 0).is_err());
/// ```
pub struct ChampBuilder<K, V, S = RandomState> {
    map: ChampMap<K, V, S>,
    /// `None` once sealed.
    owner: Option<Owner>,
    /// Bumped on every added or removed key; watched by cursors.
    mod_count: Arc<AtomicU64>,
}

impl<K, V> ChampBuilder<K, V, RandomState> {
    pub fn new() -> Self {
        Self::from_map(ChampMap::new())
    }
}

impl<K, V, S> ChampBuilder<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_map(ChampMap::with_hasher(hasher))
    }

    pub fn with_hasher_and_config(hasher: S, config: Config) -> Self
    where
        K: Nullable,
        V: Nullable,
    {
        Self::from_map(ChampMap::with_hasher_and_config(hasher, config))
    }

    pub(crate) fn from_map(map: ChampMap<K, V, S>) -> Self {
        ChampBuilder {
            map,
            owner: Some(Owner::new()),
            mod_count: Arc::new(AtomicU64::new(0)),
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

    pub fn is_sealed(&self) -> bool {
        self.owner.is_none()
    }

    pub fn config(&self) -> Config {
        self.map.config()
    }

    /// A cursor over the current content that fails fast once this builder
    /// adds or removes a key behind its back.
    pub fn cursor(&self) -> Cursor<K, V> {
        Cursor::tracking(Arc::clone(self.map.root()), self.map.len(), Arc::clone(&self.mod_count))
    }

    pub(crate) fn mod_count(&self) -> &Arc<AtomicU64> {
        &self.mod_count
    }

    fn live_owner(&self) -> Result<Owner> {
        self.owner.ok_or_else(Error::sealed)
    }

    fn bump(&self) {
        self.mod_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl<K, V, S> ChampBuilder<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }
}

impl<K, V, S> ChampBuilder<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Binds `key` to `value`, returning the previous value.
    ///
    /// Fails with [`Error::InvalidArgument`] when the null policy rejects the
    /// pair, and with [`Error::IllegalState`] once sealed.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let owner = self.live_owner()?;
        let change = self.map.update_in(Some(owner), key, value, &replace_value)?;
        if change.added() {
            self.bump();
        }
        Ok(change.old)
    }

    /// Like [`insert`](Self::insert), but enforces the null policy.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>>
    where
        K: Nullable,
        V: Nullable,
    {
        self.map.config().check_key(&key)?;
        self.map.config().check_value(&value)?;
        self.insert(key, value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let owner = self.live_owner()?;
        let old = self.map.remove_in(Some(owner), key);
        if old.is_some() {
            self.bump();
        }
        Ok(old)
    }

    /// Inserts every pair in order; last writer wins.
    pub fn insert_all<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Seals the builder and returns the persistent map.
    ///
    /// Every later mutation (and a second `build`) fails with
    /// [`Error::IllegalState`].
    pub fn build(&mut self) -> Result<ChampMap<K, V, S>> {
        self.live_owner()?;
        self.owner = None;
        log::trace!("sealed map builder with {} entries", self.map.len());
        Ok(self.map.clone())
    }
}

impl<K, V, S: Default> Default for ChampBuilder<K, V, S> {
    fn default() -> Self {
        Self::from_map(ChampMap::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for ChampBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChampBuilder")
            .field("sealed", &self.is_sealed())
            .field("entries", &self.map)
            .finish()
    }
}

// =============================================================================
// Set builder
// =============================================================================

/// Mutable builder for [`ChampSet`].
pub struct SetBuilder<K, S = RandomState> {
    inner: ChampBuilder<K, (), S>,
}

impl<K> SetBuilder<K, RandomState> {
    pub fn new() -> Self {
        SetBuilder {
            inner: ChampBuilder::new(),
        }
    }
}

impl<K, S> SetBuilder<K, S> {
    pub fn with_hasher(hasher: S) -> Self {
        SetBuilder {
            inner: ChampBuilder::with_hasher(hasher),
        }
    }

    pub(crate) fn from_builder(inner: ChampBuilder<K, (), S>) -> Self {
        SetBuilder { inner }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.is_sealed()
    }

    pub fn cursor(&self) -> Cursor<K, ()> {
        self.inner.cursor()
    }

    /// The underlying map builder; cursors from [`cursor`](Self::cursor)
    /// remove through it.
    pub fn as_map_builder(&mut self) -> &mut ChampBuilder<K, (), S> {
        &mut self.inner
    }
}

impl<K, S> SetBuilder<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(key)
    }

    /// Adds `key`; returns whether it was absent.
    pub fn insert(&mut self, key: K) -> Result<bool> {
        let before = self.inner.len();
        self.inner.insert(key, ())?;
        Ok(self.inner.len() > before)
    }

    /// Removes `key`; returns whether it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.inner.remove(key)?.is_some())
    }

    pub fn build(&mut self) -> Result<ChampSet<K, S>> {
        self.inner.build().map(ChampSet::from_map)
    }
}

impl<K, S: Default> Default for SetBuilder<K, S> {
    fn default() -> Self {
        SetBuilder {
            inner: ChampBuilder::default(),
        }
    }
}
