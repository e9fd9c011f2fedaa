//! Splittable iteration.
//!
//! A cursor keeps an explicit stack of pending position ranges, one per
//! node being walked. Splitting hands the range that would be visited last
//! over to a new cursor, so the output of the left half followed by the
//! right half equals the output of the original cursor.

use crate::{
    bitmap::{Branch32, Branching},
    bucket::ListResolver,
    hamt::{Interior, Node, Slot},
    map::Root,
    resolver::CollisionResolver,
    tree::TreeResolver,
};
use std::{fmt, iter::FusedIterator};

enum Frame<'a, K, V, B: Branching, R: CollisionResolver> {
    Slots {
        node: &'a Interior<K, V, B, R>,
        offset: usize,
        limit: usize,
    },
    Group {
        group: &'a R::Group<K, V>,
        offset: usize,
        limit: usize,
    },
}

impl<'a, K, V, B: Branching, R: CollisionResolver> Frame<'a, K, V, B, R> {
    fn new(slot: Slot<'a, K, V, B, R>) -> Self {
        match slot {
            Slot::Leaf(group) => Self::Group {
                group,
                offset: 0,
                limit: R::size(group),
            },
            Slot::Child(node) => Self::Slots {
                node,
                offset: 0,
                limit: node.slot_count(),
            },
        }
    }

    fn range(&self) -> (usize, usize) {
        match self {
            Self::Slots { offset, limit, .. } | Self::Group { offset, limit, .. } => {
                (*offset, *limit)
            }
        }
    }

    fn len(&self) -> usize {
        let (offset, limit) = self.range();

        limit - offset
    }

    // Number of entries under the pending range.
    fn size(&self) -> usize {
        match self {
            Self::Slots {
                node,
                offset,
                limit,
            } => (*offset..*limit).map(|position| node.slot_size(position)).sum(),
            Self::Group { offset, limit, .. } => limit - offset,
        }
    }

    // Moves the positions from `at` on into a new frame.
    fn split_off(&mut self, at: usize) -> Self {
        match self {
            Self::Slots { node, limit, .. } => {
                let other = Self::Slots {
                    node: *node,
                    offset: at,
                    limit: *limit,
                };
                *limit = at;
                other
            }
            Self::Group { group, limit, .. } => {
                let other = Self::Group {
                    group: *group,
                    offset: at,
                    limit: *limit,
                };
                *limit = at;
                other
            }
        }
    }
}

impl<K, V, B: Branching, R: CollisionResolver> Clone for Frame<'_, K, V, B, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Slots {
                node,
                offset,
                limit,
            } => Self::Slots {
                node: *node,
                offset: *offset,
                limit: *limit,
            },
            Self::Group {
                group,
                offset,
                limit,
            } => Self::Group {
                group: *group,
                offset: *offset,
                limit: *limit,
            },
        }
    }
}

pub(crate) struct Cursor<'a, K, V, B: Branching, R: CollisionResolver> {
    stack: Vec<Frame<'a, K, V, B, R>>,
    remaining: usize,
}

impl<'a, K, V, B: Branching, R: CollisionResolver> Cursor<'a, K, V, B, R> {
    pub fn new(node: &'a Node<K, V, B, R>) -> Self {
        let stack = match node {
            Node::Empty => vec![],
            Node::Leaf(leaf) => vec![Frame::new(Slot::Leaf(&leaf.group))],
            Node::Interior(node) => vec![Frame::new(Slot::Child(node.as_ref()))],
        };

        Self {
            stack,
            remaining: node.size(),
        }
    }

    fn empty() -> Self {
        Self {
            stack: vec![],
            remaining: 0,
        }
    }

    fn detach(mut self, frame: Frame<'a, K, V, B, R>) -> (Self, Option<Self>) {
        let size = frame.size();

        self.remaining -= size;

        (
            self,
            Some(Self {
                stack: vec![frame],
                remaining: size,
            }),
        )
    }

    pub fn split(mut self) -> (Self, Option<Self>) {
        loop {
            let depth = self.stack.len().saturating_sub(1);

            // Ranges deeper in the stack are visited after the ones above.
            if let Some(index) = self.stack[..depth]
                .iter()
                .position(|frame| frame.len() > 0)
            {
                let (offset, _) = self.stack[index].range();
                let frame = self.stack[index].split_off(offset);

                return self.detach(frame);
            }

            let Some(frame) = self.stack.last_mut() else {
                return (self, None);
            };

            match (frame.len(), &mut *frame) {
                (0, _) => {
                    self.stack.pop();
                }
                (1, Frame::Group { .. }) => return (self, None),
                (1, Frame::Slots { node, offset, .. }) => {
                    let node: &'a Interior<K, V, B, R> = *node;
                    let slot = node.slot(*offset);
                    *offset += 1;
                    self.stack.push(Frame::new(slot));
                }
                (len, _) => {
                    let (offset, _) = frame.range();
                    let frame = frame.split_off(offset + len / 2);

                    return self.detach(frame);
                }
            }
        }
    }
}

impl<'a, K, V, B: Branching, R: CollisionResolver> Iterator for Cursor<'a, K, V, B, R> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = match self.stack.last_mut()? {
                Frame::Group {
                    group,
                    offset,
                    limit,
                } => {
                    if offset < limit {
                        let position = *offset;
                        *offset += 1;
                        self.remaining -= 1;

                        return R::entry_at(*group, position);
                    }

                    None
                }
                Frame::Slots {
                    node,
                    offset,
                    limit,
                } => {
                    if offset < limit {
                        let node: &'a Interior<K, V, B, R> = *node;
                        let slot = node.slot(*offset);
                        *offset += 1;

                        Some(Frame::new(slot))
                    } else {
                        None
                    }
                }
            };

            match frame {
                Some(frame) => self.stack.push(frame),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

impl<K, V, B: Branching, R: CollisionResolver> Clone for Cursor<'_, K, V, B, R> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            remaining: self.remaining,
        }
    }
}

enum Inner<'a, K, V, B: Branching> {
    List(Cursor<'a, K, V, B, ListResolver>),
    Tree(Cursor<'a, K, V, B, TreeResolver>),
}

/// Iterator over the entries of a [`Map`](crate::Map).
///
/// Entries come out in trie order, which depends on key hashes and is
/// unrelated to insertion order.
pub struct Iter<'a, K, V, B: Branching = Branch32>(Inner<'a, K, V, B>);

impl<'a, K, V, B: Branching> Iter<'a, K, V, B> {
    pub(crate) fn new(root: &'a Root<K, V, B>) -> Self {
        Self(match root {
            Root::Unbound => Inner::List(Cursor::empty()),
            Root::List(node) => Inner::List(Cursor::new(node)),
            Root::Tree(node) => Inner::Tree(Cursor::new(node)),
        })
    }

    /// Divides the remaining entries into two iterators.
    ///
    /// The first half yields entries that come before any entry of the
    /// second one. `None` is returned for the second half when at most one
    /// entry is left.
    pub fn split(self) -> (Self, Option<Self>) {
        match self.0 {
            Inner::List(cursor) => {
                let (left, right) = cursor.split();
                (Self(Inner::List(left)), right.map(|right| Self(Inner::List(right))))
            }
            Inner::Tree(cursor) => {
                let (left, right) = cursor.split();
                (Self(Inner::Tree(left)), right.map(|right| Self(Inner::Tree(right))))
            }
        }
    }
}

impl<'a, K, V, B: Branching> Iterator for Iter<'a, K, V, B> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            Inner::List(cursor) => cursor.next(),
            Inner::Tree(cursor) => cursor.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.0 {
            Inner::List(cursor) => cursor.remaining,
            Inner::Tree(cursor) => cursor.remaining,
        };

        (remaining, Some(remaining))
    }
}

impl<K, V, B: Branching> ExactSizeIterator for Iter<'_, K, V, B> {}

impl<K, V, B: Branching> FusedIterator for Iter<'_, K, V, B> {}

impl<K, V, B: Branching> Clone for Iter<'_, K, V, B> {
    fn clone(&self) -> Self {
        Self(match &self.0 {
            Inner::List(cursor) => Inner::List(cursor.clone()),
            Inner::Tree(cursor) => Inner::Tree(cursor.clone()),
        })
    }
}

impl<K, V, B: Branching> fmt::Debug for Iter<'_, K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("remaining", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{bitmap::Branch64, Key, Map};
    use proptest::prelude::*;
    use std::{collections::HashSet, hash::Hasher};

    fn map(count: u64) -> Map<u64, u64> {
        (0..count).map(|key| (key, key * 2)).collect()
    }

    fn split_all<'a, K, V, B: crate::bitmap::Branching>(
        iter: crate::Iter<'a, K, V, B>,
    ) -> Vec<crate::Iter<'a, K, V, B>> {
        let (left, right) = iter.split();

        match right {
            Some(right) if left.len() > 0 => {
                let mut parts = split_all(left);
                parts.extend(split_all(right));
                parts
            }
            Some(right) => split_all(right),
            None => vec![left],
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Colliding(u32);

    impl std::hash::Hash for Colliding {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u8(0);
        }
    }

    impl Key for Colliding {}

    #[test]
    fn empty() {
        let map = Map::<u64, u64>::new();
        let (left, right) = map.iter().split();

        assert_eq!(left.len(), 0);
        assert!(right.is_none());
        assert_eq!(map.iter().next(), None);
    }

    #[test]
    fn iterate() {
        let map = map(1000);
        let mut keys = map
            .iter()
            .map(|(key, value)| {
                assert_eq!(*value, key * 2);
                *key
            })
            .collect::<Vec<_>>();

        keys.sort();

        assert_eq!(keys, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn exact_size() {
        let map = map(100);
        let mut iter = map.iter();

        for remaining in (0..100).rev() {
            assert!(iter.next().is_some());
            assert_eq!(iter.len(), remaining);
        }

        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn split_once() {
        let map = map(1000);
        let (left, right) = map.iter().split();
        let right = right.unwrap();

        assert!(left.len() > 0);
        assert!(right.len() > 0);
        assert_eq!(left.len() + right.len(), 1000);

        let whole = map.iter().collect::<Vec<_>>();
        let halves = left.chain(right).collect::<Vec<_>>();

        assert_eq!(halves, whole);
    }

    #[test]
    fn split_after_advance() {
        let map = map(300);
        let mut iter = map.iter();

        for _ in 0..17 {
            iter.next();
        }

        let rest = iter.clone().collect::<Vec<_>>();
        let (left, right) = iter.split();
        let halves = left.chain(right.into_iter().flatten()).collect::<Vec<_>>();

        assert_eq!(halves, rest);
    }

    #[test]
    fn split_to_single_entries() {
        let map = map(500);
        let parts = split_all(map.iter());

        assert!(parts.iter().all(|part| part.len() <= 1));
        assert_eq!(
            parts.into_iter().flatten().collect::<Vec<_>>(),
            map.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn split_collision_group() {
        let map = (0..8)
            .map(|index| (Colliding(index), index))
            .collect::<Map<_, _>>();
        let parts = split_all(map.iter());

        assert_eq!(parts.len(), 8);
        assert_eq!(
            parts.into_iter().flatten().collect::<Vec<_>>(),
            map.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn split_wide_branching() {
        let map = (0..2000u64)
            .map(|key| (key, ()))
            .collect::<Map<_, _, Branch64>>();
        let parts = split_all(map.iter());
        let keys = parts
            .into_iter()
            .flatten()
            .map(|(key, _)| *key)
            .collect::<HashSet<_>>();

        assert_eq!(keys.len(), 2000);
    }

    proptest! {
        #[test]
        fn split_preserves_order(keys in prop::collection::hash_set(any::<u32>(), 0..300), skip in 0usize..50) {
            let map = keys.iter().map(|key| (*key, ())).collect::<Map<_, _>>();
            let mut iter = map.iter();

            for _ in 0..skip {
                iter.next();
            }

            let rest = iter.clone().collect::<Vec<_>>();
            let (left, right) = iter.split();

            prop_assert_eq!(left.len() + right.as_ref().map_or(0, |right| right.len()), rest.len());
            prop_assert_eq!(left.chain(right.into_iter().flatten()).collect::<Vec<_>>(), rest);
        }
    }
}
