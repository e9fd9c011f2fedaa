//! Persistent hash map whose sub-trees can be shared over threads.
//!
//! Hash-Array Mapped Trie (HAMT) is a data structure popular as a map (a.k.a.
//! associative array or dictionary) or set. Its immutable variant is adopted
//! widely by functional programming languages like Scala and Clojure to
//! implement immutable and memory-efficient associative arrays and sets.
//!
//! This implementation compresses paths, so interior nodes only exist where
//! hash codes actually diverge, and stores entries with identical hash codes
//! in collision groups. A map keeps its groups as balanced trees when its
//! keys have a total order and as lists otherwise.
//!
//! ```
//! use hamt_persistent::Map;
//!
//! let map = Map::new().assign("foo", 1);
//! let other = map.assign("bar", 2).delete(&"foo");
//!
//! assert_eq!(map.find(&"foo"), Some(&1));
//! assert_eq!(other.find(&"foo"), None);
//! assert_eq!(other.len(), 1);
//! ```

pub mod bitmap;
mod bucket;
mod builder;
mod error;
mod hamt;
mod iter;
mod key;
mod map;
#[cfg(feature = "rayon")]
mod parallel;
mod resolver;
mod tree;
mod utilities;

pub use bucket::{Bucket, ListResolver};
pub use builder::Builder;
pub use error::{Error, Result};
pub use iter::Iter;
pub use key::Key;
pub use map::Map;
#[cfg(feature = "rayon")]
pub use parallel::ParIter;
pub use resolver::{CollisionResolver, Strategy};
pub use tree::{TreeGroup, TreeResolver};
