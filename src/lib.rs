//! # champ-rs
//!
//! Persistent hash maps and sets built on a Compressed Hash-Array Mapped
//! Prefix-tree (CHAMP).
//!
//! Based on "Optimizing Hash-Array Mapped Tries for Fast and Lean Immutable
//! JVM Collections" (OOPSLA 2015, Steindorfer and Vinju)
//!
//! Every update returns a new version that shares all untouched subtrees
//! with the old one. Bulk work goes through a [`ChampBuilder`], which edits
//! the nodes it created in place until it is sealed.
//!
//! ## Example
//!
//! ```rust
//! use champ_rs::{ChampMap, SequencedMap};
//!
//! let v1: ChampMap<&str, u32> = ChampMap::new().with("hello", 1);
//! let v2 = v1.with("world", 2);
//!
//! assert_eq!(v1.get("world"), None);
//! assert_eq!(v2.get("hello"), Some(&1));
//! assert_eq!(v2.get("world"), Some(&2));
//!
//! let ordered = SequencedMap::new().with("b", 1).with("a", 2);
//! assert_eq!(ordered.keys().copied().collect::<Vec<_>>(), ["b", "a"]);
//! ```
//!
//! ## Features
//!
//! - `rayon`: `par_iter` on [`ChampMap`] and [`ChampSet`].

#![forbid(unsafe_code)]

mod builder;
mod config;
mod cursor;
mod error;
mod map;
mod node;
#[cfg(feature = "rayon")]
mod par;
mod sequenced;
mod set;

pub use builder::{ChampBuilder, SetBuilder};
pub use config::{Config, Nullable, OrderPolicy};
pub use cursor::{Cursor, CursorState, Traversal};
pub use error::{Error, Result};
pub use map::{ChampMap, Iter, Keys, Values};
#[cfg(feature = "rayon")]
pub use par::ParIter;
pub use sequenced::{SequencedMap, SequencedSet};
pub use set::ChampSet;

/// Iterators of [`ChampSet`].
pub mod set_iter {
    pub use crate::set::{IntoIter, Iter};
}

/// Iterators of [`SequencedMap`].
pub mod sequenced_iter {
    pub use crate::sequenced::Iter;
}

#[cfg(test)]
mod testing;

#[cfg(test)]
mod proptests;
