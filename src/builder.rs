use crate::{
    bitmap::{Branch32, Branching},
    error::{or_panic, Error, Result},
    key::Key,
    map::{Map, Root},
    resolver::Strategy,
    utilities::hash_key,
};
use std::fmt;

/// Mutable builder of a [`Map`].
///
/// It inserts entries in place, copying only the nodes it shares with maps
/// built before, which makes bulk construction cheaper than repeated
/// [`Map::assign`] calls.
pub struct Builder<K, V, B: Branching = Branch32> {
    root: Root<K, V, B>,
}

impl<K, V> Builder<K, V> {
    pub fn new() -> Self {
        Self::with_branching()
    }
}

impl<K, V, B: Branching> Builder<K, V, B> {
    pub fn with_branching() -> Self {
        Self {
            root: Root::Unbound,
        }
    }

    pub(crate) fn from_root(root: Root<K, V, B>) -> Self {
        Self { root }
    }

    pub fn len(&self) -> usize {
        self.root.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the collision strategy the builder is bound to, if any.
    pub fn strategy(&self) -> Option<Strategy> {
        self.root.strategy()
    }

    /// Removes every entry. The collision strategy stays bound.
    pub fn clear(&mut self) -> &mut Self {
        self.root = self.root.cleared();
        self
    }

    /// Returns a map of the entries added so far.
    ///
    /// The builder remains usable. Later additions do not affect maps
    /// already built.
    pub fn build(&self) -> Map<K, V, B> {
        Map::from_root(self.root.clone())
    }
}

impl<K: Key + Clone, V: Clone, B: Branching> Builder<K, V, B> {
    /// Adds an entry, replacing the value of an equal key added before.
    ///
    /// # Errors
    ///
    /// [`Error::Unordered`] if the builder keeps ordered collision groups and
    /// `key` has no total order.
    pub fn try_add(&mut self, key: K, value: V) -> Result<&mut Self> {
        let hash = hash_key(&key);

        self.root.insert_mut(hash, key, value)?;

        Ok(self)
    }

    /// # Panics
    ///
    /// Panics where [`Builder::try_add`] fails.
    pub fn add(&mut self, key: K, value: V) -> &mut Self {
        or_panic(self.try_add(key, value))
    }

    /// # Errors
    ///
    /// Fails at the first entry [`Builder::try_add`] rejects. Entries before
    /// it stay added.
    pub fn try_add_all(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> Result<&mut Self> {
        for (key, value) in entries {
            self.try_add(key, value)?;
        }

        Ok(self)
    }

    /// # Panics
    ///
    /// Panics where [`Builder::try_add_all`] fails.
    pub fn add_all(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> &mut Self {
        or_panic(self.try_add_all(entries))
    }

    /// Adds the entries of `entries[offset..limit]`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if the range does not lie within `entries`, in
    /// which case nothing is added.
    pub fn try_add_range(
        &mut self,
        entries: &[(K, V)],
        offset: usize,
        limit: usize,
    ) -> Result<&mut Self> {
        let Some(range) = entries.get(offset..limit) else {
            return Err(Error::OutOfBounds {
                offset,
                limit,
                len: entries.len(),
            });
        };

        self.try_add_all(range.iter().cloned())
    }

    /// # Panics
    ///
    /// Panics where [`Builder::try_add_range`] fails.
    pub fn add_range(&mut self, entries: &[(K, V)], offset: usize, limit: usize) -> &mut Self {
        or_panic(self.try_add_range(entries, offset, limit))
    }
}

impl<K, V, B: Branching> Default for Builder<K, V, B> {
    fn default() -> Self {
        Self::with_branching()
    }
}

impl<K, V, B: Branching> Clone for Builder<K, V, B> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, B: Branching> fmt::Debug for Builder<K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("strategy", &self.strategy())
            .field("entries", &self.build())
            .finish()
    }
}

impl<K: Key + Clone, V: Clone, B: Branching> Extend<(K, V)> for Builder<K, V, B> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, entries: I) {
        self.add_all(entries);
    }
}
