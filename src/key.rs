use std::{cmp::Ordering, hash::Hash, rc::Rc, sync::Arc};

/// Key of a map.
///
/// Besides hashing and equality, a key may expose a total order through
/// [`Key::compare`]. The first key inserted into an empty map is probed once:
/// ordered keys bind the map to ordered collision groups, the others to
/// linear ones. Every later key of the same map lineage must answer the probe
/// the same way.
///
/// Ordered types implement the trait with [`ordered_key!`](crate::ordered_key);
/// unordered ones with an empty `impl Key for T {}`.
pub trait Key: Hash + Eq {
    /// Compares two keys, or returns `None` if the key has no total order.
    fn compare(&self, _other: &Self) -> Option<Ordering> {
        None
    }

    fn is_ordered(&self) -> bool {
        self.compare(self).is_some()
    }
}

/// Implements [`Key`] with the total order of [`Ord`] for each given type.
#[macro_export]
macro_rules! ordered_key {
    ($($type:ty),* $(,)?) => {
        $(
            impl $crate::Key for $type {
                fn compare(&self, other: &Self) -> Option<::core::cmp::Ordering> {
                    Some(::core::cmp::Ord::cmp(self, other))
                }
            }
        )*
    };
}

ordered_key!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
    str,
    &str,
);

impl<T: Key + Ord> Key for Vec<T> {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Key + Ord> Key for [T] {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Key + Ord> Key for Option<T> {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: Key + Ord, B: Key + Ord> Key for (A, B) {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: Key + Ord, B: Key + Ord, C: Key + Ord> Key for (A, B, C) {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Key + ?Sized> Key for Box<T> {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        (**self).compare(other)
    }
}

impl<T: Key + ?Sized> Key for Rc<T> {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        (**self).compare(other)
    }
}

impl<T: Key + ?Sized> Key for Arc<T> {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        (**self).compare(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Hash, PartialEq, Eq)]
    struct Opaque(u8);

    impl Key for Opaque {}

    #[test]
    fn ordered() {
        assert_eq!(1u32.compare(&2), Some(Ordering::Less));
        assert_eq!("b".compare(&"a"), Some(Ordering::Greater));
        assert_eq!(
            String::from("x").compare(&String::from("x")),
            Some(Ordering::Equal)
        );
        assert_eq!((1, "a").compare(&(1, "b")), Some(Ordering::Less));
        assert_eq!(vec![1, 2].compare(&vec![1]), Some(Ordering::Greater));
        assert_eq!("a".compare("b"), Some(Ordering::Less));
        assert_eq!([1u8, 2][..].compare(&[1, 3][..]), Some(Ordering::Less));
        assert_eq!(Box::new(3i64).compare(&Box::new(3)), Some(Ordering::Equal));
        assert_eq!(Arc::new(9u8).compare(&Arc::new(1)), Some(Ordering::Greater));
        assert!(42usize.is_ordered());
        assert!(Some(1u8).is_ordered());
    }

    #[test]
    fn unordered() {
        assert_eq!(Opaque(1).compare(&Opaque(2)), None);
        assert!(!Opaque(0).is_ordered());
        assert!(!Box::new(Opaque(0)).is_ordered());
    }
}
