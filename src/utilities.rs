use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

pub fn hash_key(key: &(impl Hash + ?Sized)) -> u64 {
    let mut hasher = DefaultHasher::new();

    key.hash(&mut hasher);

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash_key(&42u64), hash_key(&42u64));
        assert_eq!(hash_key("foo"), hash_key(&String::from("foo")));
        assert_ne!(hash_key(&1u64), hash_key(&2u64));
    }
}
