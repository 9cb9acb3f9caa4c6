use serde::{Deserialize, Serialize};

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub iss: String,

    #[serde(default)]
    pub iat: Option<i64>,

    pub exp: i64,

    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// Free-form profile data; `full_name` or `name` seeds the user record
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

impl Claims {
    pub fn full_name(&self) -> Option<String> {
        let meta = self.user_metadata.as_ref()?;
        ["full_name", "name"]
            .iter()
            .find_map(|k| meta.get(*k).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_prefers_full_name_key() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "9b2f0b8e-54a4-4c4f-9a9a-1d4f1f0e7c11",
            "iss": "https://auth.hvac.test",
            "exp": 2_000_000_000i64,
            "user_metadata": { "name": "Dana", "full_name": " Dana Ruiz " }
        }))
        .unwrap();
        assert_eq!(claims.full_name().as_deref(), Some("Dana Ruiz"));
    }

    #[test]
    fn missing_metadata_has_no_name() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "x", "iss": "i", "exp": 1, "user_metadata": { "name": "  " }
        }))
        .unwrap();
        assert_eq!(claims.full_name(), None);
    }
}
