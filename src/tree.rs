//! Ordered collision groups.
//!
//! A group is a persistent AVL tree. Updates copy the path from the root to
//! the changed node and share everything else with the previous version.
//! Nodes cache their subtree size so that entries can be addressed by rank.

use crate::{
    error::{invariant, Error, Result},
    key::Key,
    resolver::{admit_ordered, CollisionResolver, Strategy},
};
use std::{borrow::Borrow, cmp::Ordering, fmt, sync::Arc};

type Link<K, V> = Option<Arc<TreeNode<K, V>>>;

struct TreeNode<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    height: u8,
    size: usize,
}

/// Collision group kept as a balanced tree ordered by [`Key::compare`].
pub struct TreeGroup<K, V> {
    root: Link<K, V>,
}

impl<K, V> TreeGroup<K, V> {
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl<K, V> Clone for TreeGroup<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TreeGroup<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();

        TreeResolver::for_each(self, |key, value| {
            map.entry(key, value);
        });

        map.finish()
    }
}

fn height<K, V>(link: &Link<K, V>) -> u8 {
    link.as_ref().map_or(0, |node| node.height)
}

fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn compare<Q: Key + ?Sized>(key: &Q, other: &Q) -> Result<Ordering> {
    key.compare(other).ok_or(Error::Unordered)
}

fn node<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<TreeNode<K, V>> {
    let height = height(&left).max(height(&right)) + 1;
    let size = size(&left) + size(&right) + 1;

    Arc::new(TreeNode {
        key,
        value,
        left,
        right,
        height,
        size,
    })
}

// Rebuilds a node whose subtrees differ in height by at most two.
fn balance<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<TreeNode<K, V>> {
    let (left_height, right_height) = (height(&left), height(&right));

    if left_height > right_height + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                return node(
                    l.key.clone(),
                    l.value.clone(),
                    l.left.clone(),
                    Some(node(key, value, l.right.clone(), right)),
                );
            } else if let Some(lr) = &l.right {
                return node(
                    lr.key.clone(),
                    lr.value.clone(),
                    Some(node(
                        l.key.clone(),
                        l.value.clone(),
                        l.left.clone(),
                        lr.left.clone(),
                    )),
                    Some(node(key, value, lr.right.clone(), right)),
                );
            }
        }
    } else if right_height > left_height + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                return node(
                    r.key.clone(),
                    r.value.clone(),
                    Some(node(key, value, left, r.left.clone())),
                    r.right.clone(),
                );
            } else if let Some(rl) = &r.left {
                return node(
                    rl.key.clone(),
                    rl.value.clone(),
                    Some(node(key, value, left, rl.left.clone())),
                    Some(node(
                        r.key.clone(),
                        r.value.clone(),
                        rl.right.clone(),
                        r.right.clone(),
                    )),
                );
            }
        }
    }

    node(key, value, left, right)
}

fn find<'a, K: Borrow<Q>, V, Q: Key + ?Sized>(
    mut link: &'a Link<K, V>,
    key: &Q,
) -> Result<Option<&'a TreeNode<K, V>>> {
    while let Some(node) = link {
        link = match compare(key, node.key.borrow())? {
            Ordering::Equal => return Ok(Some(&**node)),
            Ordering::Less => &node.left,
            Ordering::Greater => &node.right,
        };
    }

    Ok(None)
}

fn upsert<K: Key + Clone, V: Clone, F>(
    link: &Link<K, V>,
    key: K,
    f: F,
) -> Result<Option<(Arc<TreeNode<K, V>>, bool)>>
where
    F: FnOnce(Option<&V>) -> Option<V>,
{
    let Some(current) = link else {
        return Ok(f(None).map(|value| (node(key, value, None, None), true)));
    };

    Ok(match compare(&key, &current.key)? {
        Ordering::Equal => f(Some(&current.value)).map(|value| {
            (
                Arc::new(TreeNode {
                    key,
                    value,
                    left: current.left.clone(),
                    right: current.right.clone(),
                    height: current.height,
                    size: current.size,
                }),
                false,
            )
        }),
        Ordering::Less => upsert(&current.left, key, f)?.map(|(left, added)| {
            (
                balance(
                    current.key.clone(),
                    current.value.clone(),
                    Some(left),
                    current.right.clone(),
                ),
                added,
            )
        }),
        Ordering::Greater => upsert(&current.right, key, f)?.map(|(right, added)| {
            (
                balance(
                    current.key.clone(),
                    current.value.clone(),
                    current.left.clone(),
                    Some(right),
                ),
                added,
            )
        }),
    })
}

fn delete<K: Clone + Borrow<Q>, V: Clone, Q: Key + ?Sized>(
    link: &Link<K, V>,
    key: &Q,
) -> Result<Option<Link<K, V>>> {
    let Some(current) = link else {
        return Ok(None);
    };

    Ok(match compare(key, current.key.borrow())? {
        Ordering::Equal => Some(join(&current.left, &current.right)),
        Ordering::Less => delete(&current.left, key)?.map(|left| {
            Some(balance(
                current.key.clone(),
                current.value.clone(),
                left,
                current.right.clone(),
            ))
        }),
        Ordering::Greater => delete(&current.right, key)?.map(|right| {
            Some(balance(
                current.key.clone(),
                current.value.clone(),
                current.left.clone(),
                right,
            ))
        }),
    })
}

fn join<K: Clone, V: Clone>(left: &Link<K, V>, right: &Link<K, V>) -> Link<K, V> {
    match (left, right) {
        (None, _) => right.clone(),
        (_, None) => left.clone(),
        (Some(_), Some(right)) => {
            let (key, value, rest) = pop_first(right);

            Some(balance(key, value, left.clone(), rest))
        }
    }
}

fn pop_first<K: Clone, V: Clone>(current: &TreeNode<K, V>) -> (K, V, Link<K, V>) {
    match &current.left {
        None => (
            current.key.clone(),
            current.value.clone(),
            current.right.clone(),
        ),
        Some(left) => {
            let (key, value, rest) = pop_first(left);

            (
                key,
                value,
                Some(balance(
                    current.key.clone(),
                    current.value.clone(),
                    rest,
                    current.right.clone(),
                )),
            )
        }
    }
}

fn try_fold<K, V, A, E, F>(link: &Link<K, V>, init: A, f: &mut F) -> std::result::Result<A, E>
where
    F: FnMut(A, &K, &V) -> std::result::Result<A, E>,
{
    let Some(current) = link else {
        return Ok(init);
    };

    let acc = try_fold(&current.left, init, f)?;
    let acc = f(acc, &current.key, &current.value)?;

    try_fold(&current.right, acc, f)
}

fn select<K, V>(mut link: &Link<K, V>, mut rank: usize) -> Option<&TreeNode<K, V>> {
    while let Some(current) = link {
        let left = size(&current.left);

        link = match rank.cmp(&left) {
            Ordering::Less => &current.left,
            Ordering::Equal => return Some(&**current),
            Ordering::Greater => {
                rank -= left + 1;
                &current.right
            }
        };
    }

    None
}

// Returns the subtree height after validating it.
fn check<K: Key, V>(
    link: &Link<K, V>,
    lower: Option<&K>,
    upper: Option<&K>,
) -> Result<u8> {
    let Some(current) = link else {
        return Ok(0);
    };

    if let Some(lower) = lower {
        if compare(lower, &current.key)? != Ordering::Less {
            return invariant("tree keys out of order");
        }
    }

    if let Some(upper) = upper {
        if compare(&current.key, upper)? != Ordering::Less {
            return invariant("tree keys out of order");
        }
    }

    let left = check(&current.left, lower, Some(&current.key))?;
    let right = check(&current.right, Some(&current.key), upper)?;

    if left.abs_diff(right) > 1 {
        return invariant("tree unbalanced");
    } else if current.height != left.max(right) + 1 {
        return invariant("tree height mismatch");
    } else if current.size != size(&current.left) + size(&current.right) + 1 {
        return invariant("tree size mismatch");
    }

    Ok(current.height)
}

/// Resolver keeping collision groups in [`TreeGroup`]s.
///
/// Lookups are logarithmic in the group size. Every key must have a total
/// order.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeResolver;

impl CollisionResolver for TreeResolver {
    type Group<K, V> = TreeGroup<K, V>;

    const STRATEGY: Strategy = Strategy::Tree;

    fn empty<K, V>() -> TreeGroup<K, V> {
        TreeGroup { root: None }
    }

    fn single<K, V>(key: K, value: V) -> TreeGroup<K, V> {
        TreeGroup {
            root: Some(node(key, value, None, None)),
        }
    }

    fn size<K, V>(group: &TreeGroup<K, V>) -> usize {
        group.len()
    }

    fn admit<Q: Key + ?Sized>(key: &Q) -> Result<()> {
        admit_ordered(key)
    }

    fn find_entry<'a, K: Borrow<Q>, V, Q: Key + ?Sized>(
        group: &'a TreeGroup<K, V>,
        key: &Q,
    ) -> Result<Option<(&'a K, &'a V)>> {
        Ok(find(&group.root, key)?.map(|node| (&node.key, &node.value)))
    }

    fn upsert<K: Key + Clone, V: Clone, F>(
        group: &TreeGroup<K, V>,
        key: K,
        f: F,
    ) -> Result<Option<(TreeGroup<K, V>, bool)>>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        Ok(upsert(&group.root, key, f)?
            .map(|(root, added)| (TreeGroup { root: Some(root) }, added)))
    }

    fn delete<K: Clone + Borrow<Q>, V: Clone, Q: Key + ?Sized>(
        group: &TreeGroup<K, V>,
        key: &Q,
    ) -> Result<Option<TreeGroup<K, V>>> {
        Ok(delete(&group.root, key)?.map(|root| TreeGroup { root }))
    }

    fn try_fold<K, V, A, E, F>(
        group: &TreeGroup<K, V>,
        init: A,
        mut f: F,
    ) -> std::result::Result<A, E>
    where
        F: FnMut(A, &K, &V) -> std::result::Result<A, E>,
    {
        try_fold(&group.root, init, &mut f)
    }

    fn entry_at<K, V>(group: &TreeGroup<K, V>, position: usize) -> Option<(&K, &V)> {
        select(&group.root, position).map(|node| (&node.key, &node.value))
    }

    fn same<K, V>(one: &TreeGroup<K, V>, other: &TreeGroup<K, V>) -> bool {
        match (&one.root, &other.root) {
            (Some(one), Some(other)) => Arc::ptr_eq(one, other),
            (None, None) => true,
            _ => false,
        }
    }

    fn check<K: Key, V>(group: &TreeGroup<K, V>) -> Result<()> {
        check(&group.root, None, None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rng, seq::SliceRandom};

    type R = TreeResolver;

    #[derive(Clone, Debug, Hash, PartialEq, Eq)]
    enum Mixed {
        Number(i64),
        Opaque(u64),
    }

    impl Key for Mixed {
        fn compare(&self, other: &Self) -> Option<Ordering> {
            match (self, other) {
                (Mixed::Number(one), Mixed::Number(other)) => Some(one.cmp(other)),
                _ => None,
            }
        }
    }

    fn keys<K: Clone, V>(group: &TreeGroup<K, V>) -> Vec<K> {
        R::fold(group, vec![], |mut keys, key, _| {
            keys.push(key.clone());
            keys
        })
    }

    #[test]
    fn new() {
        assert_eq!(R::size(&R::empty::<u8, u8>()), 0);
        assert_eq!(R::size(&R::single(1, 1)), 1);
        assert_eq!(keys(&R::dual(2, 0, 1, 0).unwrap()), vec![1, 2]);
        assert_eq!(R::size(&R::dual(2, 0, 2, 1).unwrap()), 1);
    }

    #[test]
    fn insert_many_in_order() {
        let mut group = R::empty();

        for key in 0..1000 {
            let (other, added) = R::update(&group, key, key * 2).unwrap().unwrap();

            assert!(added);
            group = other;
        }

        R::check(&group).unwrap();
        assert_eq!(R::size(&group), 1000);
        assert_eq!(keys(&group), (0..1000).collect::<Vec<_>>());
        assert!(height(&group.root) <= 15);

        for key in 0..1000 {
            assert_eq!(R::find_value(&group, &key).unwrap(), Some(&(key * 2)));
        }

        assert_eq!(R::find_value(&group, &1000).unwrap(), None);
    }

    #[test]
    fn insert_remove_shuffled() {
        let mut inserted = (0..512).collect::<Vec<u32>>();
        let mut removed = inserted.clone();

        inserted.shuffle(&mut rng());
        removed.shuffle(&mut rng());

        let mut group = R::empty();

        for key in &inserted {
            group = R::update(&group, *key, ()).unwrap().unwrap().0;
            R::check(&group).unwrap();
        }

        for (index, key) in removed.iter().enumerate() {
            group = R::delete(&group, key).unwrap().unwrap();
            R::check(&group).unwrap();
            assert_eq!(R::size(&group), removed.len() - index - 1);
            assert_eq!(R::find_value(&group, key).unwrap(), None);
        }

        assert!(group.is_empty());
    }

    #[test]
    fn update_existing() {
        let group = R::dual(1, "a", 2, "b").unwrap();

        assert!(R::update(&group, 1, "a").unwrap().is_none());

        let (other, added) = R::update(&group, 1, "c").unwrap().unwrap();

        assert!(!added);
        assert_eq!(R::find_value(&other, &1).unwrap(), Some(&"c"));
        assert_eq!(R::find_value(&group, &1).unwrap(), Some(&"a"));
    }

    #[test]
    fn delete_absent() {
        let group = R::dual(1, 1, 3, 3).unwrap();

        assert!(R::delete(&group, &2).unwrap().is_none());
        assert!(R::delete(&R::empty::<i32, i32>(), &2).unwrap().is_none());
    }

    #[test]
    fn entry_at() {
        let mut group = R::empty();

        for key in [5, 3, 9, 1, 7] {
            group = R::update(&group, key, key).unwrap().unwrap().0;
        }

        let entries = (0..6)
            .map(|position| R::entry_at(&group, position).map(|(key, _)| *key))
            .collect::<Vec<_>>();

        assert_eq!(
            entries,
            vec![Some(1), Some(3), Some(5), Some(7), Some(9), None]
        );
    }

    #[test]
    fn structural_sharing() {
        let group = R::dual(1, 1, 2, 2).unwrap();
        let other = R::update(&group, 3, 3).unwrap().unwrap().0;

        assert!(R::same(&group, &group.clone()));
        assert!(!R::same(&group, &other));
        assert_eq!(keys(&group), vec![1, 2]);
        assert_eq!(keys(&other), vec![1, 2, 3]);
    }

    #[test]
    fn unordered_key() {
        let group = R::single(Mixed::Number(1), ());

        assert_eq!(
            R::update(&group, Mixed::Opaque(1), ()).unwrap_err(),
            Error::Unordered
        );
        assert_eq!(
            R::find_value(&group, &Mixed::Opaque(1)).unwrap_err(),
            Error::Unordered
        );
        assert_eq!(R::admit(&Mixed::Opaque(1)), Err(Error::Unordered));
        assert_eq!(R::admit(&Mixed::Number(1)), Ok(()));
    }
}
