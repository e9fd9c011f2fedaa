use crate::{
    bitmap::{Branch32, Branching},
    bucket::ListResolver,
    builder::Builder,
    error::{invariant, or_panic, Result},
    hamt::Node,
    iter::Iter,
    key::Key,
    resolver::{CollisionResolver, Strategy},
    tree::TreeResolver,
    utilities::hash_key,
};
use std::{borrow::Borrow, convert::Infallible, fmt};

/// Root of a trie tagged with the collision strategy of its lineage.
///
/// A root stays unbound until its first key arrives and is then bound for
/// good. Emptied roots keep their binding.
pub(crate) enum Root<K, V, B: Branching> {
    Unbound,
    List(Node<K, V, B, ListResolver>),
    Tree(Node<K, V, B, TreeResolver>),
}

impl<K, V, B: Branching> Clone for Root<K, V, B> {
    fn clone(&self) -> Self {
        match self {
            Self::Unbound => Self::Unbound,
            Self::List(node) => Self::List(node.clone()),
            Self::Tree(node) => Self::Tree(node.clone()),
        }
    }
}

impl<K, V, B: Branching> Root<K, V, B> {
    fn bind(key: &K) -> Self
    where
        K: Key,
    {
        if key.is_ordered() {
            Self::Tree(Node::Empty)
        } else {
            Self::List(Node::Empty)
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Self::Unbound => None,
            Self::List(_) => Some(ListResolver::STRATEGY),
            Self::Tree(_) => Some(TreeResolver::STRATEGY),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Unbound => 0,
            Self::List(node) => node.size(),
            Self::Tree(node) => node.size(),
        }
    }

    /// Returns an empty root bound to the same strategy.
    pub fn cleared(&self) -> Self {
        match self {
            Self::Unbound => Self::Unbound,
            Self::List(_) => Self::List(Node::Empty),
            Self::Tree(_) => Self::Tree(Node::Empty),
        }
    }

    pub fn get_entry<Q: Key + ?Sized>(&self, hash: u64, key: &Q) -> Result<Option<(&K, &V)>>
    where
        K: Borrow<Q>,
    {
        match self {
            Self::Unbound => Ok(None),
            Self::List(node) => node.get_entry(hash, key),
            Self::Tree(node) => node.get_entry(hash, key),
        }
    }

    pub fn upsert<F>(&self, hash: u64, key: K, f: F) -> Result<Option<(Self, bool)>>
    where
        K: Key + Clone,
        V: Clone,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        Ok(match self {
            Self::Unbound => return Self::bind(&key).upsert(hash, key, f),
            Self::List(node) => node
                .upsert(hash, key, f)?
                .map(|(node, added)| (Self::List(node), added)),
            Self::Tree(node) => node
                .upsert(hash, key, f)?
                .map(|(node, added)| (Self::Tree(node), added)),
        })
    }

    pub fn delete<Q: Key + ?Sized>(&self, hash: u64, key: &Q) -> Result<Option<Self>>
    where
        K: Clone + Borrow<Q>,
        V: Clone,
    {
        Ok(match self {
            Self::Unbound => None,
            Self::List(node) => node.delete(hash, key)?.map(Self::List),
            Self::Tree(node) => node.delete(hash, key)?.map(Self::Tree),
        })
    }

    pub fn insert_mut(&mut self, hash: u64, key: K, value: V) -> Result<bool>
    where
        K: Key + Clone,
        V: Clone,
    {
        if let Self::Unbound = self {
            *self = Self::bind(&key);
        }

        match self {
            Self::Unbound => Ok(false),
            Self::List(node) => node.insert_mut(hash, key, value),
            Self::Tree(node) => node.insert_mut(hash, key, value),
        }
    }

    pub fn try_fold<A, E, F>(&self, init: A, mut f: F) -> std::result::Result<A, E>
    where
        F: FnMut(A, &K, &V) -> std::result::Result<A, E>,
    {
        match self {
            Self::Unbound => Ok(init),
            Self::List(node) => node.try_fold(init, &mut f),
            Self::Tree(node) => node.try_fold(init, &mut f),
        }
    }

    pub fn check(&self) -> Result<()>
    where
        K: Key,
    {
        let hasher = |key: &K| hash_key(key);

        match self {
            Self::Unbound => Ok(()),
            Self::List(node) => node.check(&hasher),
            Self::Tree(node) => node.check(&hasher),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unbound, Self::Unbound) => true,
            (Self::List(one), Self::List(other)) => one.ptr_eq(other),
            (Self::Tree(one), Self::Tree(other)) => one.ptr_eq(other),
            _ => false,
        }
    }
}

/// Persistent hash map.
///
/// Every update returns a new map sharing all untouched nodes with the
/// original one, so cloning and versioning are cheap. The collision groups
/// of a map are bound when its first key is inserted: keys with a total order
/// (see [`Key`]) get balanced trees and the others get linear lists. Maps
/// derived from it keep the same binding.
///
/// The type parameter `B` chooses the branching factor of the trie nodes.
pub struct Map<K, V, B: Branching = Branch32> {
    root: Root<K, V, B>,
    size: usize,
}

impl<K, V> Map<K, V> {
    /// Creates an empty map with 32-way branching.
    pub const fn new() -> Self {
        Self::with_branching()
    }
}

impl<K, V, B: Branching> Map<K, V, B> {
    /// Creates an empty map with the branching factor `B`.
    pub const fn with_branching() -> Self {
        Self {
            root: Root::Unbound,
            size: 0,
        }
    }

    pub(crate) fn from_root(root: Root<K, V, B>) -> Self {
        Self {
            size: root.size(),
            root,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the collision strategy bound to the map, or `None` if no key
    /// has been inserted into its lineage yet.
    pub fn strategy(&self) -> Option<Strategy> {
        self.root.strategy()
    }

    /// Checks if two maps share the same root node.
    ///
    /// Updates that change nothing return a map for which this holds.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.size == other.size && self.root.ptr_eq(&other.root)
    }

    /// Returns the canonical empty map.
    #[must_use]
    pub fn delete_all(&self) -> Self {
        Self::with_branching()
    }

    pub fn iter(&self) -> Iter<'_, K, V, B> {
        Iter::new(&self.root)
    }

    pub fn try_for_each<E>(
        &self,
        mut f: impl FnMut(&K, &V) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        self.root.try_fold((), |(), key, value| f(key, value))
    }

    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        self.reduce((), |(), key, value| f(key, value))
    }

    /// Folds entries into an accumulator, stopping at the first error.
    pub fn try_reduce<A, E>(
        &self,
        init: A,
        f: impl FnMut(A, &K, &V) -> std::result::Result<A, E>,
    ) -> std::result::Result<A, E> {
        self.root.try_fold(init, f)
    }

    pub fn reduce<A>(&self, init: A, mut f: impl FnMut(A, &K, &V) -> A) -> A {
        match self.try_reduce(init, |acc, key, value| {
            Ok::<_, Infallible>(f(acc, key, value))
        }) {
            Ok(acc) => acc,
            Err(never) => match never {},
        }
    }
}

impl<K: Key, V, B: Branching> Map<K, V, B> {
    /// Finds the stored key and value equal to `key`.
    ///
    /// The key may be any borrowed form of the key type, as in
    /// [`HashMap::get`](std::collections::HashMap::get).
    ///
    /// # Errors
    ///
    /// [`Error::Unordered`](crate::Error::Unordered) if the map keeps ordered
    /// collision groups and `key` has no total order.
    pub fn try_find_entry<Q: Key + ?Sized>(&self, key: &Q) -> Result<Option<(&K, &V)>>
    where
        K: Borrow<Q>,
    {
        self.root.get_entry(hash_key(key), key)
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_find_entry`] fails.
    pub fn find_entry<Q: Key + ?Sized>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
    {
        or_panic(self.try_find_entry(key))
    }

    /// Finds the value of `key`.
    ///
    /// # Errors
    ///
    /// Fails as [`Map::try_find_entry`] does.
    pub fn try_find<Q: Key + ?Sized>(&self, key: &Q) -> Result<Option<&V>>
    where
        K: Borrow<Q>,
    {
        Ok(self.try_find_entry(key)?.map(|(_, value)| value))
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_find_entry`] fails.
    pub fn find<Q: Key + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        or_panic(self.try_find(key))
    }

    /// Returns the value of `key`, or `default` if it is absent.
    ///
    /// # Panics
    ///
    /// Panics where [`Map::try_find_entry`] fails.
    pub fn get_or<'a, Q: Key + ?Sized>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
    {
        self.find(key).unwrap_or(default)
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_find_entry`] fails.
    pub fn contains_key<Q: Key + ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.find_entry(key).is_some()
    }

    /// Validates every structural invariant of the map.
    ///
    /// It walks the whole trie and is meant for tests and diagnostics.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`](crate::Error::Invariant) describing the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<()> {
        self.root.check()?;

        let count = self.reduce(0, |count, _, _| count + 1);

        if count != self.size || self.root.size() != self.size {
            return invariant(format!(
                "map size {} but root size {} and {} entries",
                self.size,
                self.root.size(),
                count
            ));
        }

        Ok(())
    }
}

impl<K: Key + Clone, V: Clone, B: Branching> Map<K, V, B> {
    fn with_root(&self, root: Option<(Root<K, V, B>, bool)>) -> Self {
        match root {
            Some((root, added)) => Self {
                root,
                size: self.size + usize::from(added),
            },
            None => self.clone(),
        }
    }

    /// Binds `key` to `value`.
    ///
    /// The map itself is returned if `key` is already bound to an equal
    /// value.
    ///
    /// # Errors
    ///
    /// [`Error::Unordered`](crate::Error::Unordered) if the map keeps ordered
    /// collision groups and `key` has no total order.
    pub fn try_assign(&self, key: K, value: V) -> Result<Self>
    where
        V: PartialEq,
    {
        let hash = hash_key(&key);
        let root = self.root.upsert(hash, key, |old| {
            if old == Some(&value) {
                None
            } else {
                Some(value)
            }
        })?;

        Ok(self.with_root(root))
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_assign`] fails.
    #[must_use]
    pub fn assign(&self, key: K, value: V) -> Self
    where
        V: PartialEq,
    {
        or_panic(self.try_assign(key, value))
    }

    /// Binds `key` to the value computed from its current one.
    ///
    /// The map itself is returned if `f` returns `None`.
    ///
    /// # Errors
    ///
    /// Fails as [`Map::try_assign`] does.
    pub fn try_update(&self, key: K, f: impl FnOnce(Option<&V>) -> Option<V>) -> Result<Self> {
        let hash = hash_key(&key);
        let root = self.root.upsert(hash, key, f)?;

        Ok(self.with_root(root))
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_update`] fails.
    #[must_use]
    pub fn update(&self, key: K, f: impl FnOnce(Option<&V>) -> Option<V>) -> Self {
        or_panic(self.try_update(key, f))
    }

    /// Removes `key`.
    ///
    /// The map itself is returned if `key` is absent.
    ///
    /// # Errors
    ///
    /// Fails as [`Map::try_find_entry`] does.
    pub fn try_delete<Q: Key + ?Sized>(&self, key: &Q) -> Result<Self>
    where
        K: Borrow<Q>,
    {
        Ok(match self.root.delete(hash_key(key), key)? {
            Some(root) => Self {
                root,
                size: self.size - 1,
            },
            None => self.clone(),
        })
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_delete`] fails.
    #[must_use]
    pub fn delete<Q: Key + ?Sized>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
    {
        or_panic(self.try_delete(key))
    }

    /// Binds every key of `entries` in order.
    ///
    /// # Errors
    ///
    /// Fails at the first key [`Map::try_assign`] rejects.
    pub fn try_assign_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        V: PartialEq,
    {
        entries
            .into_iter()
            .try_fold(self.clone(), |map, (key, value)| map.try_assign(key, value))
    }

    /// # Panics
    ///
    /// Panics where [`Map::try_assign_all`] fails.
    #[must_use]
    pub fn assign_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        V: PartialEq,
    {
        or_panic(self.try_assign_all(entries))
    }

    /// Returns a builder seeded with the entries of the map.
    pub fn to_builder(&self) -> Builder<K, V, B> {
        Builder::from_root(self.root.clone())
    }
}

impl<K, V, B: Branching> Clone for Map<K, V, B> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            size: self.size,
        }
    }
}

impl<K, V, B: Branching> Default for Map<K, V, B> {
    fn default() -> Self {
        Self::with_branching()
    }
}

impl<K: Key, V: PartialEq, B: Branching> PartialEq for Map<K, V, B> {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && (self.ptr_eq(other)
                || self.iter().all(|(key, value)| {
                    matches!(other.try_find(key), Ok(Some(other)) if other == value)
                }))
    }
}

impl<K: Key, V: Eq, B: Branching> Eq for Map<K, V, B> {}

impl<K: fmt::Debug, V: fmt::Debug, B: Branching> fmt::Debug for Map<K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Key + Clone, V: Clone, B: Branching> FromIterator<(K, V)> for Map<K, V, B> {
    /// # Panics
    ///
    /// Panics if keys mix ordered and unordered ones after an ordered first
    /// key.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        let mut builder = Builder::with_branching();

        builder.add_all(entries);
        builder.build()
    }
}

impl<'a, K, V, B: Branching> IntoIterator for &'a Map<K, V, B> {
    type IntoIter = Iter<'a, K, V, B>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone, V: Clone, B: Branching> IntoIterator for Map<K, V, B> {
    type IntoIter = std::vec::IntoIter<(K, V)>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }
}
