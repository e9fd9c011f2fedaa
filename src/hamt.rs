use crate::{
    bitmap::{self, Bitmap, Branching},
    error::{invariant, Result},
    key::Key,
    resolver::CollisionResolver,
};
use std::{borrow::Borrow, sync::Arc};

/// Collision group stored with the complete hash its keys share.
#[derive(Clone, Debug)]
pub(crate) struct Leaf<G> {
    pub hash: u64,
    pub group: G,
}

impl<G> Leaf<G> {
    pub fn new(hash: u64, group: G) -> Self {
        Self { hash, group }
    }
}

/// Branching node of a path-compressed trie.
///
/// A node sits at the digit starting at `shift` and holds entries whose
/// hashes all share `prefix` below it. Digits matched by exactly one leaf
/// keep it inline; digits where hashes keep diverging point to a child at
/// a deeper shift. Leaves come before children in iteration order.
pub(crate) struct Interior<K, V, B: Branching, R: CollisionResolver> {
    shift: u32,
    prefix: u64,
    size: usize,
    leaf_map: B::Bitmap,
    child_map: B::Bitmap,
    leaves: Vec<Leaf<R::Group<K, V>>>,
    children: Vec<Arc<Interior<K, V, B, R>>>,
}

pub(crate) enum Node<K, V, B: Branching, R: CollisionResolver> {
    Empty,
    Leaf(Leaf<R::Group<K, V>>),
    Interior(Arc<Interior<K, V, B, R>>),
}

impl<K, V, B: Branching, R: CollisionResolver> Clone for Interior<K, V, B, R> {
    fn clone(&self) -> Self {
        Self {
            shift: self.shift,
            prefix: self.prefix,
            size: self.size,
            leaf_map: self.leaf_map,
            child_map: self.child_map,
            leaves: self.leaves.clone(),
            children: self.children.clone(),
        }
    }
}

impl<K, V, B: Branching, R: CollisionResolver> Clone for Node<K, V, B, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Leaf(leaf) => Self::Leaf(leaf.clone()),
            Self::Interior(node) => Self::Interior(node.clone()),
        }
    }
}

impl<K, V, B: Branching, R: CollisionResolver> Interior<K, V, B, R> {
    // Joins two leaves with different hashes.
    fn pair(one: Leaf<R::Group<K, V>>, other: Leaf<R::Group<K, V>>) -> Self {
        let shift = B::divergence(one.hash, other.hash);
        let size = R::size(&one.group) + R::size(&other.group);
        let leaf_map = B::bit(one.hash, shift).with(B::bit(other.hash, shift));
        let prefix = bitmap::prefix(one.hash, shift);
        let leaves = if B::digit(one.hash, shift) < B::digit(other.hash, shift) {
            vec![one, other]
        } else {
            vec![other, one]
        };

        Self {
            shift,
            prefix,
            size,
            leaf_map,
            child_map: Default::default(),
            leaves,
            children: vec![],
        }
    }

    // Joins a leaf with a node whose prefix it does not share.
    fn fork(leaf: Leaf<R::Group<K, V>>, child: Arc<Self>) -> Self {
        let shift = B::divergence(leaf.hash, child.prefix);

        debug_assert!(shift < child.shift);

        Self {
            shift,
            prefix: bitmap::prefix(leaf.hash, shift),
            size: R::size(&leaf.group) + child.size,
            leaf_map: B::bit(leaf.hash, shift),
            child_map: B::bit(child.prefix, shift),
            leaves: vec![leaf],
            children: vec![child],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.leaves.len() + self.children.len()
    }

    /// Returns the leaf or child at a position in iteration order.
    pub fn slot(&self, position: usize) -> Slot<'_, K, V, B, R> {
        match self.leaves.get(position) {
            Some(leaf) => Slot::Leaf(&leaf.group),
            None => Slot::Child(self.children[position - self.leaves.len()].as_ref()),
        }
    }

    pub fn slot_size(&self, position: usize) -> usize {
        match self.slot(position) {
            Slot::Leaf(group) => R::size(group),
            Slot::Child(child) => child.size,
        }
    }

    fn covers(&self, hash: u64) -> bool {
        bitmap::prefix(hash, self.shift) == self.prefix
    }

    fn get_entry<'a, Q: Key + ?Sized>(
        &'a self,
        hash: u64,
        key: &Q,
    ) -> Result<Option<(&'a K, &'a V)>>
    where
        K: Borrow<Q>,
    {
        let mut node = self;

        loop {
            if !node.covers(hash) {
                return Ok(None);
            }

            let bit = B::bit(hash, node.shift);

            if node.leaf_map.contains(bit) {
                let leaf = &node.leaves[node.leaf_map.index(bit)];

                return if leaf.hash == hash {
                    R::find_entry(&leaf.group, key)
                } else {
                    Ok(None)
                };
            } else if node.child_map.contains(bit) {
                node = node.children[node.child_map.index(bit)].as_ref();
            } else {
                return Ok(None);
            }
        }
    }

    fn upsert<F>(this: &Arc<Self>, hash: u64, key: K, f: F) -> Result<Option<(Arc<Self>, bool)>>
    where
        K: Key + Clone,
        V: Clone,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        if !this.covers(hash) {
            let Some(value) = f(None) else {
                return Ok(None);
            };

            let leaf = Leaf::new(hash, R::single(key, value));

            return Ok(Some((Arc::new(Self::fork(leaf, this.clone())), true)));
        }

        let bit = B::bit(hash, this.shift);

        if this.leaf_map.contains(bit) {
            let index = this.leaf_map.index(bit);
            let leaf = &this.leaves[index];

            if leaf.hash == hash {
                let Some((group, added)) = R::upsert(&leaf.group, key, f)? else {
                    return Ok(None);
                };

                let mut node = (**this).clone();
                node.leaves[index].group = group;
                node.size += usize::from(added);

                return Ok(Some((node.into(), added)));
            }

            let Some(value) = f(None) else {
                return Ok(None);
            };

            let child = Self::pair(leaf.clone(), Leaf::new(hash, R::single(key, value)));
            let mut node = (**this).clone();

            node.leaves.remove(index);
            node.leaf_map = node.leaf_map.without(bit);
            node.child_map = node.child_map.with(bit);
            node.children
                .insert(node.child_map.index(bit), Arc::new(child));
            node.size += 1;

            Ok(Some((node.into(), true)))
        } else if this.child_map.contains(bit) {
            let index = this.child_map.index(bit);

            let Some((child, added)) = Self::upsert(&this.children[index], hash, key, f)? else {
                return Ok(None);
            };

            let mut node = (**this).clone();
            node.children[index] = child;
            node.size += usize::from(added);

            Ok(Some((node.into(), added)))
        } else {
            let Some(value) = f(None) else {
                return Ok(None);
            };

            let mut node = (**this).clone();

            node.leaf_map = node.leaf_map.with(bit);
            node.leaves.insert(
                node.leaf_map.index(bit),
                Leaf::new(hash, R::single(key, value)),
            );
            node.size += 1;

            Ok(Some((node.into(), true)))
        }
    }

    fn delete<Q: Key + ?Sized>(
        this: &Arc<Self>,
        hash: u64,
        key: &Q,
    ) -> Result<Option<Node<K, V, B, R>>>
    where
        K: Clone + Borrow<Q>,
        V: Clone,
    {
        if !this.covers(hash) {
            return Ok(None);
        }

        let bit = B::bit(hash, this.shift);

        if this.leaf_map.contains(bit) {
            let index = this.leaf_map.index(bit);
            let leaf = &this.leaves[index];

            if leaf.hash != hash {
                return Ok(None);
            }

            let Some(group) = R::delete(&leaf.group, key)? else {
                return Ok(None);
            };

            let mut node = (**this).clone();
            node.size -= 1;

            if R::size(&group) > 0 {
                node.leaves[index].group = group;

                return Ok(Some(Node::Interior(node.into())));
            }

            node.leaves.remove(index);
            node.leaf_map = node.leaf_map.without(bit);

            Ok(Some(node.collapse()))
        } else if this.child_map.contains(bit) {
            let index = this.child_map.index(bit);

            let Some(child) = Self::delete(&this.children[index], hash, key)? else {
                return Ok(None);
            };

            let mut node = (**this).clone();
            node.size -= 1;

            match child {
                Node::Interior(child) => node.children[index] = child,
                Node::Leaf(leaf) => {
                    node.children.remove(index);
                    node.child_map = node.child_map.without(bit);
                    node.leaf_map = node.leaf_map.with(bit);
                    node.leaves.insert(node.leaf_map.index(bit), leaf);
                }
                Node::Empty => {
                    node.children.remove(index);
                    node.child_map = node.child_map.without(bit);
                }
            }

            Ok(Some(node.collapse()))
        } else {
            Ok(None)
        }
    }

    // Replaces a node left with fewer than two slots by its only content.
    fn collapse(mut self) -> Node<K, V, B, R> {
        match (self.leaves.len(), self.children.len()) {
            (0, 0) => Node::Empty,
            (1, 0) => self.leaves.pop().map_or(Node::Empty, Node::Leaf),
            (0, 1) => self.children.pop().map_or(Node::Empty, Node::Interior),
            _ => Node::Interior(self.into()),
        }
    }

    fn insert_mut(this: &mut Arc<Self>, hash: u64, key: K, value: V) -> Result<bool>
    where
        K: Key + Clone,
        V: Clone,
    {
        if !this.covers(hash) {
            let leaf = Leaf::new(hash, R::single(key, value));
            *this = Arc::new(Self::fork(leaf, this.clone()));

            return Ok(true);
        }

        let bit = B::bit(hash, this.shift);

        if this.leaf_map.contains(bit) {
            let index = this.leaf_map.index(bit);

            if this.leaves[index].hash == hash {
                let Some((group, added)) =
                    R::upsert(&this.leaves[index].group, key, |_| Some(value))?
                else {
                    return Ok(false);
                };

                let node = Arc::make_mut(this);
                node.leaves[index].group = group;
                node.size += usize::from(added);

                return Ok(added);
            }

            let node = Arc::make_mut(this);
            let leaf = node.leaves.remove(index);
            let child = Self::pair(leaf, Leaf::new(hash, R::single(key, value)));

            node.leaf_map = node.leaf_map.without(bit);
            node.child_map = node.child_map.with(bit);
            node.children
                .insert(node.child_map.index(bit), Arc::new(child));
            node.size += 1;

            Ok(true)
        } else if this.child_map.contains(bit) {
            let index = this.child_map.index(bit);
            let node = Arc::make_mut(this);
            let added = Self::insert_mut(&mut node.children[index], hash, key, value)?;

            node.size += usize::from(added);

            Ok(added)
        } else {
            let node = Arc::make_mut(this);

            node.leaf_map = node.leaf_map.with(bit);
            node.leaves.insert(
                node.leaf_map.index(bit),
                Leaf::new(hash, R::single(key, value)),
            );
            node.size += 1;

            Ok(true)
        }
    }

    fn try_fold<A, E, F>(&self, init: A, f: &mut F) -> std::result::Result<A, E>
    where
        F: FnMut(A, &K, &V) -> std::result::Result<A, E>,
    {
        let mut acc = init;

        for leaf in &self.leaves {
            acc = R::try_fold(&leaf.group, acc, &mut *f)?;
        }

        for child in &self.children {
            acc = child.try_fold(acc, f)?;
        }

        Ok(acc)
    }

    fn check(&self, hasher: &impl Fn(&K) -> u64) -> Result<()>
    where
        K: Key,
    {
        if self.shift % B::BITS != 0 || self.shift > B::MAX_SHIFT {
            return invariant(format!("shift {} is not a digit boundary", self.shift));
        } else if bitmap::prefix(self.prefix, self.shift) != self.prefix {
            return invariant(format!(
                "prefix {:#x} has bits above shift {}",
                self.prefix, self.shift
            ));
        } else if !self.leaf_map.is_disjoint(self.child_map) {
            return invariant("leaf and child bitmaps overlap");
        } else if self.leaf_map.len() != self.leaves.len()
            || self.child_map.len() != self.children.len()
        {
            return invariant("bitmap population differs from array length");
        } else if self.slot_count() < 2 {
            return invariant(format!("interior with {} slots", self.slot_count()));
        }

        let mut size = 0;

        for (digit, leaf) in self.leaf_map.digits().zip(&self.leaves) {
            if !self.covers(leaf.hash) || B::digit(leaf.hash, self.shift) != digit {
                return invariant(format!("leaf {:#x} misplaced", leaf.hash));
            }

            size += check_leaf::<K, V, R>(leaf, hasher)?;
        }

        for (digit, child) in self.child_map.digits().zip(&self.children) {
            if child.shift <= self.shift
                || !self.covers(child.prefix)
                || B::digit(child.prefix, self.shift) != digit
            {
                return invariant(format!("child {:#x} misplaced", child.prefix));
            }

            child.check(hasher)?;
            size += child.size;
        }

        if size != self.size {
            return invariant(format!("interior size {} but {} entries", self.size, size));
        }

        Ok(())
    }
}

/// Entry position of an interior node.
pub(crate) enum Slot<'a, K, V, B: Branching, R: CollisionResolver> {
    Leaf(&'a R::Group<K, V>),
    Child(&'a Interior<K, V, B, R>),
}

fn check_leaf<K: Key, V, R: CollisionResolver>(
    leaf: &Leaf<R::Group<K, V>>,
    hasher: &impl Fn(&K) -> u64,
) -> Result<usize> {
    let size = R::size(&leaf.group);

    if size == 0 {
        return invariant(format!("empty collision group {:#x}", leaf.hash));
    }

    R::check(&leaf.group)?;
    R::try_for_each(&leaf.group, |key, _| {
        if hasher(key) == leaf.hash {
            Ok(())
        } else {
            invariant(format!("key hash differs from group hash {:#x}", leaf.hash))
        }
    })?;

    Ok(size)
}

impl<K, V, B: Branching, R: CollisionResolver> Node<K, V, B, R> {
    pub fn size(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Leaf(leaf) => R::size(&leaf.group),
            Self::Interior(node) => node.size,
        }
    }

    pub fn get_entry<'a, Q: Key + ?Sized>(
        &'a self,
        hash: u64,
        key: &Q,
    ) -> Result<Option<(&'a K, &'a V)>>
    where
        K: Borrow<Q>,
    {
        R::admit(key)?;

        match self {
            Self::Empty => Ok(None),
            Self::Leaf(leaf) if leaf.hash == hash => R::find_entry(&leaf.group, key),
            Self::Leaf(_) => Ok(None),
            Self::Interior(node) => node.get_entry(hash, key),
        }
    }

    /// Inserts or replaces the value of `key`, or returns `None` if nothing
    /// changes. The flag is true if the key is new.
    pub fn upsert<F>(&self, hash: u64, key: K, f: F) -> Result<Option<(Self, bool)>>
    where
        K: Key + Clone,
        V: Clone,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        R::admit(&key)?;

        Ok(match self {
            Self::Empty => f(None).map(|value| (Self::Leaf(Leaf::new(hash, R::single(key, value))), true)),
            Self::Leaf(leaf) if leaf.hash == hash => R::upsert(&leaf.group, key, f)?
                .map(|(group, added)| (Self::Leaf(Leaf::new(hash, group)), added)),
            Self::Leaf(leaf) => f(None).map(|value| {
                let other = Leaf::new(hash, R::single(key, value));

                (
                    Self::Interior(Interior::pair(leaf.clone(), other).into()),
                    true,
                )
            }),
            Self::Interior(node) => {
                Interior::upsert(node, hash, key, f)?.map(|(node, added)| (Self::Interior(node), added))
            }
        })
    }

    /// Removes `key`, or returns `None` if it is absent.
    pub fn delete<Q: Key + ?Sized>(&self, hash: u64, key: &Q) -> Result<Option<Self>>
    where
        K: Clone + Borrow<Q>,
        V: Clone,
    {
        R::admit(key)?;

        match self {
            Self::Empty => Ok(None),
            Self::Leaf(leaf) if leaf.hash == hash => {
                Ok(R::delete(&leaf.group, key)?.map(|group| {
                    if R::size(&group) == 0 {
                        Self::Empty
                    } else {
                        Self::Leaf(Leaf::new(hash, group))
                    }
                }))
            }
            Self::Leaf(_) => Ok(None),
            Self::Interior(node) => Interior::delete(node, hash, key),
        }
    }

    /// Inserts in place, copying only nodes shared with other tries.
    pub fn insert_mut(&mut self, hash: u64, key: K, value: V) -> Result<bool>
    where
        K: Key + Clone,
        V: Clone,
    {
        R::admit(&key)?;

        match self {
            Self::Empty => {
                *self = Self::Leaf(Leaf::new(hash, R::single(key, value)));

                Ok(true)
            }
            Self::Leaf(leaf) if leaf.hash == hash => {
                let Some((group, added)) = R::upsert(&leaf.group, key, |_| Some(value))? else {
                    return Ok(false);
                };

                leaf.group = group;

                Ok(added)
            }
            Self::Leaf(leaf) => {
                let node = Interior::pair(leaf.clone(), Leaf::new(hash, R::single(key, value)));
                *self = Self::Interior(node.into());

                Ok(true)
            }
            Self::Interior(node) => Interior::insert_mut(node, hash, key, value),
        }
    }

    pub fn try_fold<A, E, F>(&self, init: A, f: &mut F) -> std::result::Result<A, E>
    where
        F: FnMut(A, &K, &V) -> std::result::Result<A, E>,
    {
        match self {
            Self::Empty => Ok(init),
            Self::Leaf(leaf) => R::try_fold(&leaf.group, init, f),
            Self::Interior(node) => node.try_fold(init, f),
        }
    }

    /// Checks if two nodes are the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Leaf(one), Self::Leaf(other)) => {
                one.hash == other.hash && R::same(&one.group, &other.group)
            }
            (Self::Interior(one), Self::Interior(other)) => Arc::ptr_eq(one, other),
            _ => false,
        }
    }

    pub fn check(&self, hasher: &impl Fn(&K) -> u64) -> Result<()>
    where
        K: Key,
    {
        match self {
            Self::Empty => Ok(()),
            Self::Leaf(leaf) => check_leaf::<K, V, R>(leaf, hasher).map(|_| ()),
            Self::Interior(node) => node.check(hasher),
        }
    }
}
