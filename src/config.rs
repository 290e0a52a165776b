//! Per-instance collection configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Null policy of a collection instance.
///
/// The policy is fixed when the empty collection is created and is inherited
/// by every version derived from it (including builders and sets), so an
/// instance accepts or rejects nulls consistently for its whole lifetime.
///
/// Constructors taking a `Config` require the payload types to implement
/// [`Nullable`]. Every write then goes through the policy: the checked entry
/// points (`try_with`, `try_insert`, ...) report a rejected null as
/// [`Error::InvalidArgument`], and the unchecked persistent ones (`with`,
/// `with_all`) return the receiver unchanged. Collections created without a
/// `Config` are permissive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// Whether keys for which [`Nullable::is_null`] holds are accepted.
    pub null_keys: bool,
    /// Whether values for which [`Nullable::is_null`] holds are accepted.
    pub null_values: bool,
}

impl Config {
    /// Accepts null keys and values.
    pub const PERMISSIVE: Config = Config {
        null_keys: true,
        null_values: true,
    };

    /// Rejects null keys and values.
    pub const STRICT: Config = Config {
        null_keys: false,
        null_values: false,
    };

    pub(crate) fn check_key<K: Nullable + ?Sized>(&self, key: &K) -> Result<()> {
        if !self.null_keys && key.is_null() {
            return Err(Error::null_key());
        }
        Ok(())
    }

    pub(crate) fn check_value<V: Nullable + ?Sized>(&self, value: &V) -> Result<()> {
        if !self.null_values && value.is_null() {
            return Err(Error::null_value());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::PERMISSIVE
    }
}

/// The null checks of a [`Config`], captured when a collection is created so
/// that writes without a `Nullable` bound can still enforce them.
pub(crate) struct NullGuard<K, V> {
    key: fn(&K) -> bool,
    value: fn(&V) -> bool,
}

fn not_null<T>(_: &T) -> bool {
    false
}

impl<K, V> NullGuard<K, V> {
    pub(crate) fn permissive() -> Self {
        NullGuard {
            key: not_null,
            value: not_null,
        }
    }

    pub(crate) fn check(&self, key: &K, value: &V) -> Result<()> {
        if (self.key)(key) {
            return Err(Error::null_key());
        }
        if (self.value)(value) {
            return Err(Error::null_value());
        }
        Ok(())
    }
}

impl<K: Nullable, V: Nullable> NullGuard<K, V> {
    pub(crate) fn new(config: Config) -> Self {
        let key: fn(&K) -> bool = if config.null_keys { not_null } else { K::is_null };
        let value: fn(&V) -> bool = if config.null_values { not_null } else { V::is_null };
        NullGuard { key, value }
    }
}

impl<K, V> Clone for NullGuard<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NullGuard<K, V> {}

/// Types that have a distinguished "null" inhabitant.
///
/// `Option<T>` is null when it is `None`. Every other implementation below
/// is never null.
pub trait Nullable {
    fn is_null(&self) -> bool;
}

impl<T> Nullable for Option<T> {
    #[inline]
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

impl<T: Nullable + ?Sized> Nullable for &T {
    #[inline]
    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

macro_rules! never_null {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Nullable for $ty {
                #[inline]
                fn is_null(&self) -> bool {
                    false
                }
            }
        )*
    };
}

never_null!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    str, String,
);

macro_rules! never_null_generic {
    ($($ty:ident),* $(,)?) => {
        $(
            impl<T: ?Sized> Nullable for $ty<T> {
                #[inline]
                fn is_null(&self) -> bool {
                    false
                }
            }
        )*
    };
}

never_null_generic!(Box, Rc, Arc);

impl<T> Nullable for [T] {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl<T> Nullable for Vec<T> {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl<T> Nullable for VecDeque<T> {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl<T, S> Nullable for HashSet<T, S> {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl<K, V, S> Nullable for HashMap<K, V, S> {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl<T> Nullable for BTreeSet<T> {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

impl<K, V> Nullable for BTreeMap<K, V> {
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

/// Iteration order maintained by the sequenced collections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OrderPolicy {
    /// Order of first insertion; replacing a value keeps the entry's position.
    #[default]
    Insertion,
    /// Most recent access last; replacing a value or touching a key moves it
    /// to the end.
    Access,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_nullability() {
        assert!(None::<u32>.is_null());
        assert!(!Some(1u32).is_null());
        assert!(!"abc".is_null());
        assert!(!String::new().is_null());
        assert!(!Arc::new(5).is_null());
    }

    #[test]
    fn test_strict_rejects_null() {
        let strict = Config::STRICT;
        assert_eq!(strict.check_key(&None::<u8>), Err(Error::null_key()));
        assert_eq!(strict.check_value(&None::<u8>), Err(Error::null_value()));
        assert_eq!(strict.check_key(&Some(1u8)), Ok(()));

        let permissive = Config::default();
        assert_eq!(permissive.check_key(&None::<u8>), Ok(()));
        assert_eq!(permissive.check_value(&None::<u8>), Ok(()));
    }

    #[test]
    fn test_null_guard() {
        let strict: NullGuard<Option<u8>, Option<u8>> = NullGuard::new(Config::STRICT);
        assert_eq!(strict.check(&None, &Some(1)), Err(Error::null_key()));
        assert_eq!(strict.check(&Some(1), &None), Err(Error::null_value()));
        assert_eq!(strict.check(&Some(1), &Some(1)), Ok(()));

        let values_only = Config {
            null_keys: true,
            null_values: false,
        };
        let guard: NullGuard<Option<u8>, Option<u8>> = NullGuard::new(values_only);
        assert_eq!(guard.check(&None, &Some(1)), Ok(()));
        assert_eq!(guard.check(&None, &None), Err(Error::null_value()));

        let permissive: NullGuard<Option<u8>, Option<u8>> = NullGuard::permissive();
        assert_eq!(permissive.check(&None, &None), Ok(()));
    }
}
