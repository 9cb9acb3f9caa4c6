//! PATCH body helpers

use serde::{Deserialize, Deserializer};

/// Keeps an explicit `null` apart from an absent field.
///
/// Put it on an `Option<Option<T>>` together with `#[serde(default)]`:
/// an absent field stays `None`, `null` becomes `Some(None)` and a value
/// becomes `Some(Some(v))`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Whether a nullable PATCH field was sent at all, and the value to store
pub fn split<T: Clone>(field: &Option<Option<T>>) -> (bool, Option<T>) {
    (field.is_some(), field.clone().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "nullable")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_stay_distinct() {
        let absent: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);
        assert_eq!(split(&absent.notes), (false, None));

        let cleared: Body = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(cleared.notes, Some(None));
        assert_eq!(split(&cleared.notes), (true, None));

        let set: Body = serde_json::from_str(r#"{"notes": "call back"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("call back".to_string())));
        assert_eq!(split(&set.notes), (true, Some("call back".to_string())));
    }
}
