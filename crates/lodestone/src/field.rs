//! Three-state field presence for partial payloads.
//!
//! Gateway payloads are partial: a key may be missing (leave the cached value
//! alone), explicitly `null` (clear it), or carry a value (replace it).
//! `Option<T>` cannot tell the first two apart, so raw payload structs use
//! [`Field`] for every member together with `#[serde(default)]`.

use serde::{Deserialize, Deserializer};

/// A payload member that may be absent, null, or present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    /// Key missing from the payload.
    #[default]
    Absent,
    /// Key present with a `null` value.
    Null,
    /// Key present with a value.
    Value(T),
}

impl<T> Field<T> {
    /// True when the key was missing.
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    /// Borrow the value, if one was sent.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Take the value, if one was sent.
    pub fn into_value(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Overwrite a non-nullable slot. `null` is ignored for such slots.
    pub fn merge_into(self, slot: &mut T) {
        if let Field::Value(v) = self {
            *slot = v;
        }
    }

    /// Overwrite a nullable slot; `null` clears it.
    pub fn merge_nullable(self, slot: &mut Option<T>) {
        match self {
            Field::Absent => {}
            Field::Null => *slot = None,
            Field::Value(v) => *slot = Some(v),
        }
    }
}

impl<T: Clone> Field<T> {
    /// Clone the value out, if one was sent.
    pub fn cloned(&self) -> Option<T> {
        self.value().cloned()
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Field::Value(v),
            None => Field::Null,
        })
    }
}

/// Apply a raw payload to an entity, one line per field.
///
/// `set` targets are non-nullable (a `null` leaves them untouched), `opt`
/// targets are `Option`s (a `null` clears them).
///
/// ```ignore
/// merge_fields!(raw => self {
///     set name <- name,
///     opt topic <- topic,
/// });
/// ```
macro_rules! merge_fields {
    ($raw:ident => $entity:ident { $( $mode:ident $target:ident <- $source:ident ),* $(,)? }) => {
        $( merge_fields!(@ $mode $entity.$target, $raw.$source); )*
    };
    (@ set $slot:expr, $field:expr) => {
        $field.merge_into(&mut $slot)
    };
    (@ opt $slot:expr, $field:expr) => {
        $field.merge_nullable(&mut $slot)
    };
}

pub(crate) use merge_fields;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Raw {
        name: Field<String>,
        topic: Field<String>,
        is_public: Field<bool>,
    }

    #[test]
    fn test_absent_null_and_value_are_distinct() {
        let raw: Raw = serde_json::from_str(r#"{"name": "general", "topic": null}"#).unwrap();
        assert_eq!(raw.name, Field::Value("general".to_string()));
        assert_eq!(raw.topic, Field::Null);
        assert!(raw.is_public.is_absent());
    }

    #[test]
    fn test_merge_into_ignores_null() {
        let mut slot = "keep".to_string();
        Field::<String>::Null.merge_into(&mut slot);
        assert_eq!(slot, "keep");
        Field::Value("new".to_string()).merge_into(&mut slot);
        assert_eq!(slot, "new");
    }

    #[test]
    fn test_merge_nullable_clears_on_null() {
        let mut slot = Some(3);
        Field::<i32>::Absent.merge_nullable(&mut slot);
        assert_eq!(slot, Some(3));
        Field::<i32>::Null.merge_nullable(&mut slot);
        assert_eq!(slot, None);
    }

    #[test]
    fn test_merge_fields_macro() {
        struct Target {
            name: String,
            topic: Option<String>,
            is_public: bool,
        }

        let mut target = Target {
            name: "old".to_string(),
            topic: Some("t".to_string()),
            is_public: true,
        };
        let raw: Raw = serde_json::from_str(r#"{"name": "new", "topic": null}"#).unwrap();
        merge_fields!(raw => target {
            set name <- name,
            opt topic <- topic,
            set is_public <- is_public,
        });

        assert_eq!(target.name, "new");
        assert_eq!(target.topic, None);
        assert!(target.is_public);
    }
}
