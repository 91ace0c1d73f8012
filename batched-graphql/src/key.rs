//! Keys identifying units of data to fetch.
//!
//! Loaders deduplicate and group requests by key, so two keys which identify the same entity must
//! compare equal. Every key is therefore [normalized](FetchKey::normalize) into a canonical form
//! before it is used for caching or batching, and keys which cannot identify anything are rejected
//! with [`InvalidKey`] at load time instead of being silently coerced.

use async_graphql::Enum;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// A key presented to a loader could not be normalized.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(display("invalid key {key}: {reason}"))]
pub struct InvalidKey {
    /// The key as it was presented.
    pub key: String,
    /// Why the key was rejected.
    pub reason: String,
}

impl InvalidKey {
    /// Reject `key` for `reason`.
    pub fn new(key: impl Display, reason: impl Display) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A value identifying one unit of data to retrieve.
pub trait FetchKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Convert this key into its canonical form.
    ///
    /// Normalization must be idempotent, and keys identifying the same entity must normalize to
    /// equal values.
    fn normalize(self) -> Result<Self, InvalidKey>;
}

macro_rules! identity_key {
    ($($t:ty),*) => {
        $(
            impl FetchKey for $t {
                fn normalize(self) -> Result<Self, InvalidKey> {
                    Ok(self)
                }
            }
        )*
    };
}

identity_key!(String, i32, i64, u32, u64);

/// Composite keys are normalized component-wise.
impl<A: FetchKey, B: FetchKey> FetchKey for (A, B) {
    fn normalize(self) -> Result<Self, InvalidKey> {
        Ok((self.0.normalize()?, self.1.normalize()?))
    }
}

/// The identifier of a user, profile or post.
///
/// Identifiers are UUIDs. The canonical form is the lowercase, hyphenated text of the UUID; any
/// other textual form of the same UUID (upper case, simple, braced or URN) normalizes to it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// A fresh, random identifier.
    pub fn random() -> Self {
        Uuid::new_v4().into()
    }

    /// Parse and normalize an identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidKey> {
        Self::from_raw(raw).normalize()
    }

    /// Wrap raw text without validating it.
    ///
    /// The text is validated and normalized when the identifier is presented to a loader.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FetchKey for EntityId {
    fn normalize(self) -> Result<Self, InvalidKey> {
        match Uuid::parse_str(self.0.trim()) {
            Ok(id) => Ok(id.into()),
            Err(err) => Err(InvalidKey::new(format!("{:?}", self.0), err)),
        }
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id.hyphenated().to_string())
    }
}

impl TryFrom<String> for EntityId {
    type Error = InvalidKey;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl FromStr for EntityId {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for EntityId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// The identifier of a member type (a subscription tier).
#[derive(
    Clone,
    Copy,
    Debug,
    derive_more::Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Enum,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MemberTypeId {
    #[display(fmt = "basic")]
    Basic,
    #[display(fmt = "business")]
    Business,
}

impl MemberTypeId {
    /// Every member type, in tier order.
    pub const ALL: [Self; 2] = [Self::Basic, Self::Business];

    /// Parse a member type from text, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        Self::ALL
            .into_iter()
            .find(|id| raw.trim().eq_ignore_ascii_case(&id.to_string()))
            .ok_or_else(|| InvalidKey::new(format!("{raw:?}"), "expected basic or business"))
    }
}

impl FromStr for MemberTypeId {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FetchKey for MemberTypeId {
    fn normalize(self) -> Result<Self, InvalidKey> {
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ID: &str = "b4a53f7c-2d1e-4f5a-9c3b-8e6d7f0a1b2c";

    #[test]
    fn test_entity_id_normal_forms() {
        let canonical = EntityId::parse(ID).unwrap();
        assert_eq!(canonical.as_str(), ID);

        for raw in [
            ID.to_uppercase(),
            ID.replace('-', ""),
            format!("{{{ID}}}"),
            format!("urn:uuid:{ID}"),
            format!("  {ID}\n"),
        ] {
            assert_eq!(EntityId::from_raw(raw).normalize().unwrap(), canonical);
        }

        // Normalization is idempotent.
        assert_eq!(canonical.clone().normalize().unwrap(), canonical);
    }

    #[test]
    fn test_entity_id_invalid() {
        for raw in ["", "42", "not-a-uuid", "b4a53f7c-2d1e-4f5a-9c3b"] {
            let err = EntityId::from_raw(raw).normalize().unwrap_err();
            assert_eq!(err.key, format!("{raw:?}"));
        }
    }

    #[test]
    fn test_entity_id_serde() {
        let id: EntityId = serde_json::from_str(&format!("\"{}\"", ID.to_uppercase())).unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{ID}\""));
        assert!(serde_json::from_str::<EntityId>("\"nope\"").is_err());
    }

    #[test]
    fn test_member_type_id_parse() {
        assert_eq!(MemberTypeId::parse("basic").unwrap(), MemberTypeId::Basic);
        assert_eq!(MemberTypeId::parse(" BUSINESS ").unwrap(), MemberTypeId::Business);
        assert!(MemberTypeId::parse("premium").is_err());
        assert_eq!(MemberTypeId::Business.to_string(), "business");
    }

    #[test]
    fn test_composite_key() {
        let key = (EntityId::from_raw(ID.to_uppercase()), MemberTypeId::Basic);
        assert_eq!(
            key.normalize().unwrap(),
            (EntityId::parse(ID).unwrap(), MemberTypeId::Basic)
        );

        let key = (EntityId::parse(ID).unwrap(), EntityId::from_raw("bogus"));
        assert!(key.normalize().is_err());
    }
}
