//! Bearer token verification
//!
//! Two modes: RS256 against keys fetched from a JWKS endpoint (cached by
//! `kid`), or HS256 against a shared secret for self-hosted deployments.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;
use crate::config::TokenVerification;

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    cached_at: Instant,
}

struct KeySet {
    keys: HashMap<String, CachedKey>,
    last_fetch: Option<Instant>,
}

#[derive(Clone)]
enum Mode {
    Jwks {
        url: String,
        ttl: Duration,
        inner: Arc<RwLock<KeySet>>,
        http: reqwest::Client,
    },
    Secret(DecodingKey),
}

#[derive(Clone)]
pub struct TokenVerifier {
    mode: Mode,
    issuer: String,
    audience: String,
}

impl TokenVerifier {
    pub fn new(source: &TokenVerification, issuer: &str, audience: &str) -> Result<Self> {
        let mode = match source {
            TokenVerification::Jwks {
                url,
                cache_ttl_seconds,
            } => Mode::Jwks {
                url: url.clone(),
                ttl: Duration::from_secs(*cache_ttl_seconds),
                inner: Arc::new(RwLock::new(KeySet {
                    keys: HashMap::new(),
                    last_fetch: None,
                })),
                http: reqwest::Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .context("Failed to create HTTP client")?,
            },
            TokenVerification::Secret(secret) => {
                Mode::Secret(DecodingKey::from_secret(secret.as_bytes()))
            }
        };

        Ok(Self {
            mode,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        })
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation
    }

    /// Verify a token and return its claims
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let (key, algorithm) = match &self.mode {
            Mode::Secret(key) => (key.clone(), Algorithm::HS256),
            Mode::Jwks { .. } => {
                let header = decode_header(token).context("Invalid JWT header")?;
                let kid = header.kid.context("JWT missing kid header")?;
                (self.get_or_fetch_key(&kid).await?, Algorithm::RS256)
            }
        };

        let data = decode::<Claims>(token, &key, &self.validation(algorithm))
            .context("JWT validation failed")?;
        Ok(data.claims)
    }

    async fn get_or_fetch_key(&self, kid: &str) -> Result<DecodingKey> {
        let Mode::Jwks { inner, ttl, .. } = &self.mode else {
            anyhow::bail!("Key lookup requires JWKS mode");
        };

        {
            let set = inner.read();
            if let Some(cached) = set.keys.get(kid) {
                if cached.cached_at.elapsed() < *ttl {
                    return Ok(cached.key.clone());
                }
            }
        }

        self.refresh_keys().await?;

        let set = inner.read();
        set.keys
            .get(kid)
            .map(|c| c.key.clone())
            .context("Key not found in JWKS")
    }

    async fn refresh_keys(&self) -> Result<()> {
        let Mode::Jwks {
            url, inner, http, ..
        } = &self.mode
        else {
            return Ok(());
        };

        {
            let set = inner.read();
            if let Some(last) = set.last_fetch {
                // at most one fetch per second
                if last.elapsed() < Duration::from_secs(1) {
                    return Ok(());
                }
            }
        }

        tracing::debug!(url = %url, "Fetching JWKS");

        let response = http.get(url).send().await.context("Failed to fetch JWKS")?;
        if !response.status().is_success() {
            anyhow::bail!("JWKS fetch failed with status: {}", response.status());
        }
        let jwks: JwksResponse = response.json().await.context("Failed to parse JWKS")?;

        let mut set = inner.write();
        set.last_fetch = Some(Instant::now());

        for jwk in jwks.keys {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    set.keys.insert(
                        jwk.kid.clone(),
                        CachedKey {
                            key,
                            cached_at: Instant::now(),
                        },
                    );
                }
                Err(e) => tracing::warn!(kid = %jwk.kid, error = %e, "Skipping unusable JWK"),
            }
        }

        tracing::info!(keys = set.keys.len(), "JWKS cache refreshed");
        Ok(())
    }

    /// Fetch signing keys ahead of the first request
    pub async fn warm(&self) -> Result<()> {
        self.refresh_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "bidboard-test-secret";

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(
            &TokenVerification::Secret(SECRET.into()),
            "https://auth.hvac.test",
            "authenticated",
        )
        .unwrap()
    }

    fn sign(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn accepts_valid_secret_token() {
        let token = sign(json!({
            "sub": "9b2f0b8e-54a4-4c4f-9a9a-1d4f1f0e7c11",
            "iss": "https://auth.hvac.test",
            "aud": "authenticated",
            "exp": future(),
            "email": "dana@hvac.test"
        }));
        let claims = verifier().verify_token(&token).await.unwrap();
        assert_eq!(claims.email.as_deref(), Some("dana@hvac.test"));
    }

    #[tokio::test]
    async fn rejects_wrong_issuer_and_expired() {
        let wrong_issuer = sign(json!({
            "sub": "x", "iss": "https://elsewhere.test", "aud": "authenticated", "exp": future()
        }));
        assert!(verifier().verify_token(&wrong_issuer).await.is_err());

        let expired = sign(json!({
            "sub": "x", "iss": "https://auth.hvac.test", "aud": "authenticated",
            "exp": chrono::Utc::now().timestamp() - 3600
        }));
        assert!(verifier().verify_token(&expired).await.is_err());
    }

    #[tokio::test]
    async fn rejects_other_secret() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": "x", "iss": "https://auth.hvac.test", "aud": "authenticated", "exp": future()
            }),
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();
        assert!(verifier().verify_token(&token).await.is_err());
    }
}
