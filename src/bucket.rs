use crate::{
    error::{invariant, Result},
    key::Key,
    resolver::{CollisionResolver, Strategy},
};
use std::{borrow::Borrow, fmt, sync::Arc};

/// Collision group kept as a list in insertion order.
pub struct Bucket<K, V>(Arc<Vec<(K, V)>>);

impl<K, V> Bucket<K, V> {
    fn new(entries: Vec<(K, V)>) -> Self {
        Bucket(Arc::new(entries))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> Bucket<K, V> {
    fn find_index<Q: Eq + ?Sized>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
    {
        self.0.iter().position(|(other, _)| other.borrow() == key)
    }
}

impl<K, V> Clone for Bucket<K, V> {
    fn clone(&self) -> Self {
        Bucket(self.0.clone())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Bucket<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(key, value)| (key, value)))
            .finish()
    }
}

/// Resolver keeping collision groups in [`Bucket`]s.
///
/// Lookups are linear, so it suits keys without a total order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListResolver;

impl CollisionResolver for ListResolver {
    type Group<K, V> = Bucket<K, V>;

    const STRATEGY: Strategy = Strategy::List;

    fn empty<K, V>() -> Bucket<K, V> {
        Bucket::new(vec![])
    }

    fn single<K, V>(key: K, value: V) -> Bucket<K, V> {
        Bucket::new(vec![(key, value)])
    }

    fn size<K, V>(group: &Bucket<K, V>) -> usize {
        group.len()
    }

    fn admit<Q: Key + ?Sized>(_: &Q) -> Result<()> {
        Ok(())
    }

    fn find_entry<'a, K: Borrow<Q>, V, Q: Key + ?Sized>(
        group: &'a Bucket<K, V>,
        key: &Q,
    ) -> Result<Option<(&'a K, &'a V)>> {
        Ok(group
            .find_index(key)
            .map(|index| (&group.0[index].0, &group.0[index].1)))
    }

    fn upsert<K: Key + Clone, V: Clone, F>(
        group: &Bucket<K, V>,
        key: K,
        f: F,
    ) -> Result<Option<(Bucket<K, V>, bool)>>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        Ok(match group.find_index(&key) {
            Some(index) => f(Some(&group.0[index].1)).map(|value| {
                let mut entries = (*group.0).clone();
                entries[index] = (key, value);
                (Bucket::new(entries), false)
            }),
            None => f(None).map(|value| {
                let mut entries = Vec::with_capacity(group.len() + 1);
                entries.extend(group.0.iter().cloned());
                entries.push((key, value));
                (Bucket::new(entries), true)
            }),
        })
    }

    fn delete<K: Clone + Borrow<Q>, V: Clone, Q: Key + ?Sized>(
        group: &Bucket<K, V>,
        key: &Q,
    ) -> Result<Option<Bucket<K, V>>> {
        Ok(group.find_index(key).map(|index| {
            let mut entries = (*group.0).clone();
            entries.remove(index);
            Bucket::new(entries)
        }))
    }

    fn try_fold<K, V, A, E, F>(group: &Bucket<K, V>, init: A, mut f: F) -> std::result::Result<A, E>
    where
        F: FnMut(A, &K, &V) -> std::result::Result<A, E>,
    {
        group
            .0
            .iter()
            .try_fold(init, |acc, (key, value)| f(acc, key, value))
    }

    fn entry_at<K, V>(group: &Bucket<K, V>, position: usize) -> Option<(&K, &V)> {
        group.0.get(position).map(|(key, value)| (key, value))
    }

    fn same<K, V>(one: &Bucket<K, V>, other: &Bucket<K, V>) -> bool {
        Arc::ptr_eq(&one.0, &other.0)
    }

    fn check<K: Key, V>(group: &Bucket<K, V>) -> Result<()> {
        for (index, (key, _)) in group.0.iter().enumerate() {
            if group.0[..index].iter().any(|(other, _)| other == key) {
                return invariant(format!("duplicate key at bucket position {}", index));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type R = ListResolver;

    #[test]
    fn new() {
        assert_eq!(R::size(&R::empty::<usize, usize>()), 0);
        assert_eq!(R::size(&R::single(42, 0)), 1);
        assert_eq!(R::size(&R::dual(42, 0, 0, 0).unwrap()), 2);
        assert_eq!(R::size(&R::dual(42, 0, 42, 1).unwrap()), 1);
    }

    #[test]
    fn insert() {
        let b = R::single(42, 0);

        let (bb, new) = R::update(&b, 0, 0).unwrap().unwrap();

        assert!(new);
        assert_eq!(R::size(&b), 1);
        assert_eq!(R::size(&bb), 2);

        let (bbb, new) = R::update(&bb, 42, 1).unwrap().unwrap();

        assert!(!new);
        assert_eq!(R::size(&bbb), 2);
        assert_eq!(R::find_value(&bbb, &42).unwrap(), Some(&1));
        assert_eq!(R::find_value(&bb, &42).unwrap(), Some(&0));
    }

    #[test]
    fn update_same_value() {
        let b = R::single(42, "a");

        assert!(R::update(&b, 42, "a").unwrap().is_none());
        assert!(R::upsert(&b, 0, |_| None).unwrap().is_none());
    }

    #[test]
    fn upsert_with_previous_value() {
        let b = R::single("k", 1);
        let (b, new) = R::upsert(&b, "k", |old| old.map(|value| value + 41))
            .unwrap()
            .unwrap();

        assert!(!new);
        assert_eq!(R::find_value(&b, &"k").unwrap(), Some(&42));
    }

    #[test]
    fn delete() {
        let b = R::single(42, 0);

        assert_eq!(R::size(&R::delete(&b, &42).unwrap().unwrap()), 0);
        assert!(R::delete(&b, &0).unwrap().is_none());

        let bb = R::dual(42, 0, 0, 0).unwrap();
        let rest = R::delete(&bb, &42).unwrap().unwrap();

        assert_eq!(R::size(&rest), 1);
        assert_eq!(R::entry_at(&rest, 0), Some((&0, &0)));
    }

    #[test]
    fn find() {
        let b = R::single(42, 0);

        assert_eq!(R::find_value(&b, &42).unwrap(), Some(&0));
        assert_eq!(R::find_value(&b, &0).unwrap(), None);
        assert_eq!(R::find_entry(&b, &42).unwrap(), Some((&42, &0)));
    }

    #[test]
    fn insertion_order() {
        let b = R::dual(3, "c", 1, "a").unwrap();
        let (b, _) = R::update(&b, 2, "b").unwrap().unwrap();

        assert_eq!(
            R::fold(&b, vec![], |mut keys, key, _| {
                keys.push(*key);
                keys
            }),
            vec![3, 1, 2]
        );
        assert_eq!(R::entry_at(&b, 2), Some((&2, &"b")));
        assert_eq!(R::entry_at(&b, 3), None);
    }

    #[test]
    fn try_for_each_stops() {
        let b = R::dual(1, 1, 2, 2).unwrap();
        let mut seen = 0;

        assert_eq!(
            R::try_for_each(&b, |key, _| {
                seen += 1;
                if *key == 1 {
                    Err(*key)
                } else {
                    Ok(())
                }
            }),
            Err(1)
        );
        assert_eq!(seen, 1);
    }

    #[test]
    fn same() {
        let b = R::single(1, 1);

        assert!(R::same(&b, &b.clone()));
        assert!(!R::same(&b, &R::single(1, 1)));
    }

    #[test]
    fn check() {
        assert!(R::check(&R::dual(1, 1, 2, 2).unwrap()).is_ok());
        assert!(R::check(&Bucket::new(vec![(1, 1), (1, 2)])).is_err());
    }
}
