//! u64 fingerprint combinators for state deduplication.

use std::hash::{DefaultHasher, Hash, Hasher};

////////////////////////////////////////////////////////////////////////////////

pub type HashType = u64;

////////////////////////////////////////////////////////////////////////////////

/// Order-free combination, for fingerprinting sets.
pub fn hash_set(elems: impl Iterator<Item = HashType>) -> HashType {
    elems.fold(0, |acc, e| acc ^ e)
}

////////////////////////////////////////////////////////////////////////////////

/// Order-aware combination, for fingerprinting sequences.
pub fn hash_list(elems: impl Iterator<Item = HashType>) -> HashType {
    let mut hasher = DefaultHasher::new();
    for e in elems {
        e.hash(&mut hasher);
    }
    hasher.finish()
}

////////////////////////////////////////////////////////////////////////////////

pub(crate) fn hash_value<T: Hash + ?Sized>(value: &T) -> HashType {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{hash_list, hash_set, hash_value};

    ////////////////////////////////////////////////////////////////////////////////

    #[test]
    fn set_ignores_order() {
        let a = hash_set([hash_value("x"), hash_value("y"), hash_value("z")].into_iter());
        let b = hash_set([hash_value("z"), hash_value("x"), hash_value("y")].into_iter());
        assert_eq!(a, b);
        assert_ne!(a, hash_set([hash_value("x"), hash_value("y")].into_iter()));
    }

    ////////////////////////////////////////////////////////////////////////////////

    #[test]
    fn list_respects_order() {
        assert_ne!(
            hash_list([1, 2, 3].into_iter()),
            hash_list([3, 2, 1].into_iter())
        );
        assert_eq!(hash_list(0..4), hash_list(0..4));
    }

    ////////////////////////////////////////////////////////////////////////////////

    #[test]
    fn value_is_stable_per_input() {
        assert_eq!(hash_value("tick"), hash_value("tick"));
        assert_ne!(hash_value("tick"), hash_value("tock"));
    }
}
