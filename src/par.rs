//! Parallel iteration on top of [`Traversal::split`].

use rayon::iter::plumbing::{bridge_unindexed, Folder, UnindexedConsumer, UnindexedProducer};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::cursor::Traversal;
use crate::map::ChampMap;
use crate::set::ChampSet;

/// Parallel iterator over cloned `(key, value)` pairs of a snapshot.
pub struct ParIter<K, V> {
    traversal: Traversal<K, V>,
}

struct TraversalProducer<K, V>(Traversal<K, V>);

impl<K, V> UnindexedProducer for TraversalProducer<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    type Item = (K, V);

    fn split(mut self) -> (Self, Option<Self>) {
        let other = self.0.split().map(TraversalProducer);
        (self, other)
    }

    fn fold_with<F>(self, folder: F) -> F
    where
        F: Folder<Self::Item>,
    {
        folder.consume_iter(self.0)
    }
}

impl<K, V> ParallelIterator for ParIter<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    type Item = (K, V);

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: UnindexedConsumer<Self::Item>,
    {
        bridge_unindexed(TraversalProducer(self.traversal), consumer)
    }
}

impl<K, V, S> ChampMap<K, V, S>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn par_iter(&self) -> ParIter<K, V> {
        ParIter {
            traversal: self.traversal(),
        }
    }
}

impl<K, V, S> IntoParallelIterator for ChampMap<K, V, S>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    type Iter = ParIter<K, V>;
    type Item = (K, V);

    fn into_par_iter(self) -> Self::Iter {
        self.par_iter()
    }
}

impl<K, S> ChampSet<K, S>
where
    K: Clone + Send + Sync,
{
    pub fn par_iter(&self) -> impl ParallelIterator<Item = K> {
        self.as_map().par_iter().map(|(k, ())| k)
    }
}
