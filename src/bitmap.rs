//! Hash digit and bitmap arithmetic.
//!
//! A 64-bit hash code is read as a string of fixed-width digits, least
//! significant digit first. Each trie level consumes one digit, and a node
//! records which digit values it occupies in a bitmap whose set bits index a
//! densely packed array.

use std::fmt::Debug;

/// Bitmap of occupied digit values at one node.
pub trait Bitmap: Copy + Default + Debug + Eq + Send + Sync + 'static {
    /// Returns a bitmap whose only set bit is `digit`.
    fn bit(digit: u32) -> Self;

    /// Returns true if every bit of `bit` is set.
    fn contains(self, bit: Self) -> bool;

    fn with(self, bit: Self) -> Self;

    fn without(self, bit: Self) -> Self;

    /// Returns the packed array offset of `bit`, that is the number of set
    /// bits below it.
    fn index(self, bit: Self) -> usize;

    /// Returns the number of set bits.
    fn len(self) -> usize;

    fn is_empty(self) -> bool {
        self.len() == 0
    }

    fn is_disjoint(self, other: Self) -> bool;

    /// Returns the lowest set digit, if any.
    fn first(self) -> Option<u32>;

    /// Iterates over set digits in ascending order.
    fn digits(self) -> Digits<Self> {
        Digits(self)
    }
}

macro_rules! bitmap {
    ($type:ty) => {
        impl Bitmap for $type {
            fn bit(digit: u32) -> Self {
                debug_assert!(digit < <$type>::BITS);
                1 << digit
            }

            fn contains(self, bit: Self) -> bool {
                self & bit == bit
            }

            fn with(self, bit: Self) -> Self {
                self | bit
            }

            fn without(self, bit: Self) -> Self {
                self & !bit
            }

            fn index(self, bit: Self) -> usize {
                (self & bit.wrapping_sub(1)).count_ones() as usize
            }

            fn len(self) -> usize {
                self.count_ones() as usize
            }

            fn is_disjoint(self, other: Self) -> bool {
                self & other == 0
            }

            fn first(self) -> Option<u32> {
                (self != 0).then(|| self.trailing_zeros())
            }
        }
    };
}

bitmap!(u32);
bitmap!(u64);

/// Iterator over the set digits of a bitmap.
#[derive(Clone, Debug)]
pub struct Digits<M>(M);

impl<M: Bitmap> Iterator for Digits<M> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let digit = self.0.first()?;
        self.0 = self.0.without(M::bit(digit));
        Some(digit)
    }
}

/// Branching factor of a trie.
pub trait Branching: Send + Sync + 'static {
    type Bitmap: Bitmap;

    /// Digit width in bits.
    const BITS: u32;

    /// Largest shift at which a digit starts.
    const MAX_SHIFT: u32 = (u64::BITS - 1) / Self::BITS * Self::BITS;

    fn digit(hash: u64, shift: u32) -> u32 {
        ((hash >> shift) & ((1 << Self::BITS) - 1)) as u32
    }

    fn bit(hash: u64, shift: u32) -> Self::Bitmap {
        Self::Bitmap::bit(Self::digit(hash, shift))
    }

    /// Returns the shift of the first digit at which two distinct hashes
    /// differ.
    fn divergence(one: u64, other: u64) -> u32 {
        debug_assert_ne!(one, other);
        (one ^ other).trailing_zeros() / Self::BITS * Self::BITS
    }
}

/// 32-way branching with 5-bit digits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Branch32;

impl Branching for Branch32 {
    type Bitmap = u32;

    const BITS: u32 = 5;
}

/// 64-way branching with 6-bit digits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Branch64;

impl Branching for Branch64 {
    type Bitmap = u64;

    const BITS: u32 = 6;
}

/// Returns the bits of `hash` below `shift`.
pub fn prefix(hash: u64, shift: u32) -> u64 {
    debug_assert!(shift < u64::BITS);
    hash & ((1 << shift) - 1)
}
