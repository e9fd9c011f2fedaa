//! Collision groups.
//!
//! Every entry whose complete 64-bit hash is identical lands in one collision
//! group. A map binds one resolver for its whole lineage, chosen by probing
//! its first key (see [`Key`]).

use crate::{
    error::{Error, Result},
    key::Key,
};
use std::{borrow::Borrow, convert::Infallible};

/// Representation of the collision groups of a map.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Strategy {
    /// Insertion-ordered list searched linearly.
    List,
    /// Balanced search tree ordered by [`Key::compare`].
    Tree,
}

/// Operations over the terminal structure holding colliding entries.
///
/// Updating operations return `None` when the group stays unchanged so that
/// callers can keep sharing it.
pub trait CollisionResolver: Send + Sync + 'static {
    type Group<K, V>: Clone;

    const STRATEGY: Strategy;

    fn empty<K, V>() -> Self::Group<K, V>;

    fn single<K, V>(key: K, value: V) -> Self::Group<K, V>;

    fn dual<K: Key + Clone, V: Clone>(
        key: K,
        value: V,
        other_key: K,
        other_value: V,
    ) -> Result<Self::Group<K, V>> {
        let group = Self::single(key, value);

        Ok(
            match Self::upsert(&group, other_key, |_| Some(other_value))? {
                Some((group, _)) => group,
                None => group,
            },
        )
    }

    fn size<K, V>(group: &Self::Group<K, V>) -> usize;

    /// Checks if a key can be stored in groups of this resolver.
    fn admit<Q: Key + ?Sized>(key: &Q) -> Result<()>;

    fn find_entry<'a, K: Borrow<Q>, V, Q: Key + ?Sized>(
        group: &'a Self::Group<K, V>,
        key: &Q,
    ) -> Result<Option<(&'a K, &'a V)>>;

    fn find_value<'a, K: Borrow<Q> + 'a, V: 'a, Q: Key + ?Sized>(
        group: &'a Self::Group<K, V>,
        key: &Q,
    ) -> Result<Option<&'a V>> {
        Ok(Self::find_entry(group, key)?.map(|(_, value)| value))
    }

    /// Inserts or replaces the value of `key` with the one computed from its
    /// current value. `f` returning `None` leaves the group unchanged.
    ///
    /// The flag in the result is true if the key was not present before.
    fn upsert<K: Key + Clone, V: Clone, F>(
        group: &Self::Group<K, V>,
        key: K,
        f: F,
    ) -> Result<Option<(Self::Group<K, V>, bool)>>
    where
        F: FnOnce(Option<&V>) -> Option<V>;

    fn update<K: Key + Clone, V: Clone + PartialEq>(
        group: &Self::Group<K, V>,
        key: K,
        value: V,
    ) -> Result<Option<(Self::Group<K, V>, bool)>> {
        Self::upsert(group, key, |old| {
            if old == Some(&value) {
                None
            } else {
                Some(value)
            }
        })
    }

    fn delete<K: Clone + Borrow<Q>, V: Clone, Q: Key + ?Sized>(
        group: &Self::Group<K, V>,
        key: &Q,
    ) -> Result<Option<Self::Group<K, V>>>;

    /// Folds entries in group order, stopping at the first error.
    fn try_fold<K, V, A, E, F>(
        group: &Self::Group<K, V>,
        init: A,
        f: F,
    ) -> std::result::Result<A, E>
    where
        F: FnMut(A, &K, &V) -> std::result::Result<A, E>;

    fn fold<K, V, A, F>(group: &Self::Group<K, V>, init: A, mut f: F) -> A
    where
        F: FnMut(A, &K, &V) -> A,
    {
        match Self::try_fold(group, init, |acc, key, value| {
            Ok::<_, Infallible>(f(acc, key, value))
        }) {
            Ok(acc) => acc,
            Err(never) => match never {},
        }
    }

    fn try_for_each<K, V, E, F>(group: &Self::Group<K, V>, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&K, &V) -> std::result::Result<(), E>,
    {
        Self::try_fold(group, (), |(), key, value| f(key, value))
    }

    fn for_each<K, V, F>(group: &Self::Group<K, V>, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        Self::fold(group, (), |(), key, value| f(key, value))
    }

    /// Returns the entry at `position` in group order.
    ///
    /// Iterators walk a range of positions with it, which lets them split
    /// a group between two halves.
    fn entry_at<K, V>(group: &Self::Group<K, V>, position: usize) -> Option<(&K, &V)>;

    /// Checks if two groups are the same allocation.
    fn same<K, V>(one: &Self::Group<K, V>, other: &Self::Group<K, V>) -> bool;

    /// Validates the internal structure of a group.
    fn check<K: Key, V>(group: &Self::Group<K, V>) -> Result<()>;
}

pub(crate) fn admit_ordered<Q: Key + ?Sized>(key: &Q) -> Result<()> {
    if key.is_ordered() {
        Ok(())
    } else {
        Err(Error::Unordered)
    }
}
