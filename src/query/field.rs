//! Field catalogs for entities.
//!
//! Each entity exposes a field enum implementing [`Field`]. The enum is the
//! only way callers can name a column in filters, orderings and aggregates,
//! and it carries the logical kind used to coerce JSON values.

use std::fmt;
use std::hash::Hash;

use sea_orm::EntityTrait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Logical type of a field for value coercion and operator validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Uuid,
    Decimal,
    Integer,
    Bool,
    DateTime,
    /// String column restricted to the listed values
    Enum(&'static [&'static str]),
    Json,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Decimal | FieldKind::Integer)
    }

    /// Kinds accepted by `min`/`max` aggregates.
    pub fn is_comparable(self) -> bool {
        self.is_numeric() || self == FieldKind::DateTime
    }

    pub fn is_textual(self) -> bool {
        self == FieldKind::String
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "String"),
            FieldKind::Uuid => write!(f, "Uuid"),
            FieldKind::Decimal => write!(f, "Decimal"),
            FieldKind::Integer => write!(f, "Integer"),
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::DateTime => write!(f, "DateTime"),
            FieldKind::Enum(values) => write!(f, "Enum({})", values.join("|")),
            FieldKind::Json => write!(f, "Json"),
        }
    }
}

/// A queryable field of one entity.
pub trait Field:
    Copy + Eq + Hash + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Entity the field belongs to.
    type Entity: EntityTrait;

    /// All fields exposed for this entity.
    const FIELDS: &'static [Self];

    /// API-visible, snake_case name.
    fn name(&self) -> &'static str;

    fn kind(&self) -> FieldKind;

    /// Backing column.
    fn column(&self) -> <Self::Entity as EntityTrait>::Column;

    /// Resolve a field by its API name.
    fn from_name(name: &str) -> Option<Self> {
        Self::FIELDS.iter().copied().find(|f| f.name() == name)
    }
}

/// Declares a field enum for an entity and implements [`Field`] and serde for it.
///
/// ```ignore
/// entity_fields! {
///     pub enum CustomerField for customer::Entity {
///         Name => ("name", customer::Column::Name, FieldKind::String),
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity_fields {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident for $entity:path {
            $($variant:ident => ($api:literal, $column:path, $kind:expr)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::query::Field for $name {
            type Entity = $entity;

            const FIELDS: &'static [Self] = &[$($name::$variant),+];

            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $api),+
                }
            }

            fn kind(&self) -> $crate::query::FieldKind {
                match self {
                    $($name::$variant => $kind),+
                }
            }

            fn column(&self) -> <$entity as ::sea_orm::EntityTrait>::Column {
                match self {
                    $($name::$variant => $column),+
                }
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str($crate::query::Field::name(self))
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                <$name as $crate::query::Field>::from_name(&raw).ok_or_else(|| {
                    ::serde::de::Error::custom(format!("unknown field `{}`", raw))
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer;

    entity_fields! {
        enum TestField for customer::Entity {
            Name => ("name", customer::Column::Name, FieldKind::String),
            Id => ("id", customer::Column::Id, FieldKind::Uuid),
        }
    }

    #[test]
    fn resolves_fields_by_api_name() {
        assert_eq!(TestField::from_name("name"), Some(TestField::Name));
        assert_eq!(TestField::from_name("Name"), None);
        assert_eq!(TestField::FIELDS.len(), 2);
        assert_eq!(TestField::Id.kind(), FieldKind::Uuid);
    }

    #[test]
    fn serde_uses_api_names() {
        assert_eq!(serde_json::to_value(TestField::Name).unwrap(), "name");
        let parsed: TestField = serde_json::from_str("\"id\"").unwrap();
        assert_eq!(parsed, TestField::Id);

        let err = serde_json::from_str::<TestField>("\"password\"").unwrap_err();
        assert!(err.to_string().contains("unknown field `password`"));
    }

    #[test]
    fn kind_capabilities() {
        assert!(FieldKind::Decimal.is_numeric());
        assert!(FieldKind::DateTime.is_comparable());
        assert!(!FieldKind::Enum(&["A"]).is_comparable());
        assert!(!FieldKind::Json.is_textual());
    }
}
