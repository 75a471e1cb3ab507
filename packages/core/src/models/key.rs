//! Identifier types accepted as tree primary keys
//!
//! Tree tables may be keyed by integers, strings or UUIDs. Everything the
//! engine needs from a key is captured by [`TreeKey`]: a codec form (its
//! `Display` output and [`TreeKey::from_token`]) and an order projection used
//! as the final, always-distinct tie-break of the ordering key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// Order-preserving projection of a key into a padded key component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyProjection {
    /// Integer-like keys; left-padded with zeros.
    Numeric(u128),
    /// String-like keys; right-padded with spaces.
    Text(String),
}

impl KeyProjection {
    /// Unpadded length of the rendered component
    pub fn len(&self) -> usize {
        match self {
            KeyProjection::Numeric(value) => value.to_string().len(),
            KeyProjection::Text(text) => text.len(),
        }
    }

    /// Whether the rendered component is empty (only possible for empty strings)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the component padded to exactly `width` characters.
    ///
    /// `width` must be at least [`KeyProjection::len`]; the ordering builder
    /// computes it as the maximum over the whole snapshot.
    pub fn render(&self, width: usize) -> String {
        match self {
            KeyProjection::Numeric(value) => format!("{:0>width$}", value, width = width),
            KeyProjection::Text(text) => format!("{:<width$}", text, width = width),
        }
    }
}

/// Primary key of a tree-indexed entity.
///
/// The `Display` output is what gets written into the `*_pks` columns, and
/// [`TreeKey::from_token`] must parse it back.
pub trait TreeKey:
    Clone + Eq + Ord + Hash + Debug + Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Parse a codec token back into a key
    fn from_token(token: &str) -> Option<Self>;

    /// Order-preserving projection used by the ordering key builder
    fn projection(&self) -> KeyProjection;
}

macro_rules! impl_unsigned_tree_key {
    ($($ty:ty),*) => {
        $(
            impl TreeKey for $ty {
                fn from_token(token: &str) -> Option<Self> {
                    token.parse().ok()
                }

                fn projection(&self) -> KeyProjection {
                    KeyProjection::Numeric(u128::from(*self))
                }
            }
        )*
    };
}

macro_rules! impl_signed_tree_key {
    ($($ty:ty),*) => {
        $(
            impl TreeKey for $ty {
                fn from_token(token: &str) -> Option<Self> {
                    token.parse().ok()
                }

                // Offset by the type minimum so negative keys sort before positive ones
                fn projection(&self) -> KeyProjection {
                    let offset = i128::from(*self) - i128::from(<$ty>::MIN);
                    KeyProjection::Numeric(offset.unsigned_abs())
                }
            }
        )*
    };
}

impl_unsigned_tree_key!(u32, u64);
impl_signed_tree_key!(i32, i64);

impl TreeKey for String {
    fn from_token(token: &str) -> Option<Self> {
        Some(token.to_string())
    }

    fn projection(&self) -> KeyProjection {
        let hex: String = self.bytes().map(|b| format!("{:02X}", b)).collect();
        KeyProjection::Text(hex)
    }
}

impl TreeKey for Uuid {
    fn from_token(token: &str) -> Option<Self> {
        Uuid::parse_str(token).ok()
    }

    fn projection(&self) -> KeyProjection {
        KeyProjection::Numeric(self.as_u128())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_projection_preserves_order() {
        let width = 20;
        let small = 7u64.projection().render(width);
        let large = 1200u64.projection().render(width);
        assert_eq!(small.len(), width);
        assert!(small < large);
    }

    #[test]
    fn test_signed_projection_orders_negatives_first() {
        let width = 20;
        let negative = (-5i64).projection().render(width);
        let zero = 0i64.projection().render(width);
        let positive = 5i64.projection().render(width);
        assert!(negative < zero);
        assert!(zero < positive);
    }

    #[test]
    fn test_text_projection_is_distinct_and_ordered() {
        let width = 8;
        let a = "a".to_string().projection().render(width);
        let a_upper = "A".to_string().projection().render(width);
        let ab = "ab".to_string().projection().render(width);
        assert_ne!(a, a_upper);
        assert!(a < ab);
        assert_eq!(a.len(), width);
    }

    #[test]
    fn test_tokens_round_trip() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_token(&id.to_string()), Some(id));
        assert_eq!(i64::from_token("-12"), Some(-12));
        assert_eq!(u64::from_token("x"), None);
        assert_eq!(String::from_token("abc"), Some("abc".to_string()));
    }
}
