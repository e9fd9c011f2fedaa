//! Parallel iteration with rayon.
//!
//! Work is divided with [`Iter::split`], so no entries are copied before
//! they reach the consumer.

use crate::{
    bitmap::{Branch32, Branching},
    iter::Iter,
    key::Key,
    map::Map,
};
use rayon::iter::{
    plumbing::{bridge_unindexed, Folder, UnindexedConsumer, UnindexedProducer},
    FromParallelIterator, IntoParallelIterator, ParallelIterator,
};

/// Parallel iterator over the entries of a [`Map`].
pub struct ParIter<'a, K, V, B: Branching = Branch32> {
    iter: Iter<'a, K, V, B>,
}

impl<'a, K: Send + Sync, V: Send + Sync, B: Branching> ParallelIterator for ParIter<'a, K, V, B> {
    type Item = (&'a K, &'a V);

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: UnindexedConsumer<Self::Item>,
    {
        bridge_unindexed(Producer(self.iter), consumer)
    }
}

struct Producer<'a, K, V, B: Branching>(Iter<'a, K, V, B>);

impl<'a, K: Send + Sync, V: Send + Sync, B: Branching> UnindexedProducer
    for Producer<'a, K, V, B>
{
    type Item = (&'a K, &'a V);

    fn split(self) -> (Self, Option<Self>) {
        let (left, right) = self.0.split();

        (Self(left), right.map(Self))
    }

    fn fold_with<F>(self, folder: F) -> F
    where
        F: Folder<Self::Item>,
    {
        folder.consume_iter(self.0)
    }
}

impl<K: Send + Sync, V: Send + Sync, B: Branching> Map<K, V, B> {
    /// Returns a parallel iterator over the entries.
    ///
    /// The order in which entries reach the consumer is unspecified.
    pub fn par_iter(&self) -> ParIter<'_, K, V, B> {
        ParIter { iter: self.iter() }
    }
}

impl<'a, K: Send + Sync, V: Send + Sync, B: Branching> IntoParallelIterator for &'a Map<K, V, B> {
    type Iter = ParIter<'a, K, V, B>;
    type Item = (&'a K, &'a V);

    fn into_par_iter(self) -> Self::Iter {
        self.par_iter()
    }
}

impl<K, V, B> IntoParallelIterator for Map<K, V, B>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
    B: Branching,
{
    type Iter = rayon::vec::IntoIter<(K, V)>;
    type Item = (K, V);

    fn into_par_iter(self) -> Self::Iter {
        self.into_iter().collect::<Vec<_>>().into_par_iter()
    }
}

impl<K, V, B> FromParallelIterator<(K, V)> for Map<K, V, B>
where
    K: Key + Clone + Send,
    V: Clone + Send,
    B: Branching,
{
    /// Collects entries through a [`Builder`](crate::Builder).
    ///
    /// If keys repeat, which of their values is kept is unspecified.
    fn from_par_iter<I>(entries: I) -> Self
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        entries
            .into_par_iter()
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}
