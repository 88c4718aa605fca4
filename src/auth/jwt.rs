use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, Principal};
use crate::{config::JwtConfig, state::AppState};

/// Every verification failure (bad signature, expiry, garbage input) collapses here.
#[derive(Debug, Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Signing and verification keys derived once from the process-wide secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64).saturating_mul(60)),
        }
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = i64::try_from(self.ttl.as_secs()).context("token lifetime out of range")?;
        let exp = now
            .checked_add(TimeDuration::seconds(ttl))
            .context("token expiry out of range")?;
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Principal, InvalidToken> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            InvalidToken
        })?;
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims.into())
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            ttl_minutes: 60 * 24,
        })
    }

    fn encode_raw(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode")
    }

    #[test]
    fn issue_and_verify_token() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, "alice").expect("issue");
        let principal = keys.verify(&token).expect("verify");
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.username, "alice");
    }

    #[test]
    fn token_lives_for_a_day() {
        let keys = make_keys("dev-secret");
        let token = keys.issue(Uuid::new_v4(), "alice").expect("issue");
        let data = decode::<Claims>(&token, &keys.decoding, &Validation::default()).expect("decode");
        assert_eq!(data.claims.exp - data.claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn payload_carries_only_identity_and_timestamps() {
        let keys = make_keys("dev-secret");
        let token = keys.issue(Uuid::new_v4(), "alice").expect("issue");
        let data = decode::<serde_json::Map<String, serde_json::Value>>(
            &token,
            &keys.decoding,
            &Validation::default(),
        )
        .expect("decode");
        let mut fields: Vec<_> = data.claims.keys().cloned().collect();
        fields.sort();
        assert_eq!(fields, vec!["exp", "iat", "userId", "username"]);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = make_keys("other").issue(Uuid::new_v4(), "bob").expect("issue");
        assert!(make_keys("dev-secret").verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let token = encode_raw(
            "dev-secret",
            &Claims {
                user_id: Uuid::new_v4(),
                username: "carol".into(),
                iat: now - 2 * 86_400,
                exp: now - 86_400,
            },
        );
        assert!(make_keys("dev-secret").verify(&token).is_err());
    }

    #[test]
    fn oversized_lifetime_is_an_error_not_a_panic() {
        let keys = JwtKeys::new(&JwtConfig {
            secret: "dev-secret".into(),
            ttl_minutes: 1_000_000_000_000,
        });
        let err = keys.issue(Uuid::new_v4(), "alice").unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let keys = JwtKeys::new(&JwtConfig {
            secret: "dev-secret".into(),
            ttl_minutes: i64::MAX,
        });
        assert!(keys.issue(Uuid::new_v4(), "alice").is_err());
    }

    #[test]
    fn rejects_garbage() {
        let keys = make_keys("dev-secret");
        assert!(keys.verify("").is_err());
        assert!(keys.verify("not.a.jwt").is_err());
    }
}
