use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::claims::{Claims, Identity, TokenKind},
    config::{JwtConfig, MAX_TTL_MINUTES},
    state::AppState,
};

/// Signing and verification keys for both token kinds.
///
/// Access and refresh tokens use different secrets, so a leaked access secret
/// cannot mint refresh tokens and a token of one kind never verifies as the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

fn ttl_from_minutes(minutes: i64) -> Duration {
    Duration::from_secs(minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60)
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: ttl_from_minutes(cfg.ttl_minutes),
            refresh_ttl: ttl_from_minutes(cfg.refresh_ttl_minutes),
        }
    }

    fn sign_with_kind(&self, identity: &Identity, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let (ttl, key) = match kind {
            TokenKind::Access => (self.access_ttl, &self.access_encoding),
            TokenKind::Refresh => (self.refresh_ttl, &self.refresh_encoding),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %identity.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, identity: &Identity) -> anyhow::Result<String> {
        self.sign_with_kind(identity, TokenKind::Access)
    }

    pub fn sign_refresh(&self, identity: &Identity) -> anyhow::Result<String> {
        self.sign_with_kind(identity, TokenKind::Refresh)
    }

    /// Mint a new access and refresh token for `identity`.
    pub fn issue_pair(&self, identity: &Identity) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign_access(identity)?,
            refresh: self.sign_refresh(identity)?,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    fn verify_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let data = decode::<Claims>(token, key, &self.validation())?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {:?} token, got {:?}", kind, data.claims.kind);
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_kind(token, TokenKind::Refresh)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::users::repo_types::Role;

    pub(crate) fn test_jwt_config() -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        }
    }

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&test_jwt_config())
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "learner@example.com".into(),
            role: Role::User,
        }
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let who = identity();
        let token = keys.sign_access(&who).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.identity(), who);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let who = Identity {
            role: Role::Admin,
            ..identity()
        };
        let token = keys.sign_refresh(&who).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.identity(), who);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn tokens_do_not_cross_verify() {
        let keys = make_keys();
        let pair = keys.issue_pair(&identity()).expect("issue pair");
        assert!(keys.verify_refresh(&pair.access).is_err());
        assert!(keys.verify_access(&pair.refresh).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys();
        let who = identity();
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: who.id,
            email: who.email.clone(),
            role: who.role,
            jti: Uuid::new_v4(),
            iat: (past - TimeDuration::minutes(5)).unix_timestamp() as usize,
            exp: past.unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &claims, &keys.access_encoding).unwrap();
        assert!(keys.verify_access(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys();
        let bad_keys = JwtKeys::from_config(&JwtConfig {
            issuer: "bad-iss".into(),
            audience: "bad-aud".into(),
            ..test_jwt_config()
        });
        let token = good_keys.sign_access(&identity()).expect("sign access");
        assert!(bad_keys.verify_access(&token).is_err());
    }

    #[test]
    fn issued_pairs_are_always_distinct() {
        let keys = make_keys();
        let who = identity();
        let first = keys.issue_pair(&who).unwrap();
        let second = keys.issue_pair(&who).unwrap();
        assert_ne!(first.access, second.access);
        assert_ne!(first.refresh, second.refresh);
    }

    #[test]
    fn oversized_ttl_is_capped_and_tokens_stay_valid() {
        let keys = JwtKeys::from_config(&JwtConfig {
            ttl_minutes: i64::MAX / 30,
            ..test_jwt_config()
        });
        assert_eq!(keys.access_ttl, Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));
        let token = keys.sign_access(&identity()).expect("sign access");
        assert!(keys.verify_access(&token).is_ok());
    }
}
