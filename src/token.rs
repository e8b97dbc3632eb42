//! Device entitlement token issuing and verification.
//!
//! A compact HS256 token (JWT wire shape) binding a device to a license so
//! periodic validation does not re-transmit the license code. The token is
//! deliberately long-lived and is **not** the source of truth for
//! entitlement: the validation engine re-checks live license and activation
//! state on every call, which is how revocation takes effect before token
//! expiry.
//!
//! Verification is pure: signature and expiry only, no store access.

use crate::clock::Clock;
use crate::SeatwardenError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Token kind expected in the `typ` claim.
const DEVICE_TOKEN_TYPE: &str = "device";

/// Fixed JOSE header for every minted token.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by a device token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceClaims {
    /// Device id the token was minted for.
    pub sub: String,

    /// License the device is bound to.
    pub license_id: Uuid,

    /// Token kind discriminator; always `"device"` for tokens minted here.
    pub typ: String,

    /// Issued-at, unix seconds.
    pub iat: i64,

    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Mints and verifies device tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("TokenIssuer").field("ttl", &self.ttl).finish()
    }
}

impl TokenIssuer {
    /// Create an issuer from raw secret bytes and a token lifetime.
    pub fn new(secret: Vec<u8>, ttl: std::time::Duration) -> Result<Self, SeatwardenError> {
        if secret.is_empty() {
            return Err(SeatwardenError::ConfigError(
                "token signing secret cannot be empty".to_string(),
            ));
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| {
            SeatwardenError::ConfigError("token_ttl out of range".to_string())
        })?;
        Ok(Self { secret, ttl })
    }

    fn mac(&self) -> Result<HmacSha256, SeatwardenError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SeatwardenError::ConfigError(format!("invalid HMAC key: {}", e)))
    }

    /// Mint a token binding `device_id` to `license_id`.
    pub fn mint(
        &self,
        device_id: &str,
        license_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<String, SeatwardenError> {
        let now = clock.now_utc();
        let claims = DeviceClaims {
            sub: device_id.to_string(),
            license_id,
            typ: DEVICE_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let header = URL_SAFE_NO_PAD.encode(HEADER);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims)
                .map_err(|e| SeatwardenError::ConfigError(format!("claims encode: {}", e)))?,
        );
        let signing_input = format!("{}.{}", header, payload);

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verify signature, expiry, and token kind; return the claims.
    ///
    /// Does not consult the store: revocation and license state are the
    /// validation engine's job.
    pub fn verify(&self, token: &str, clock: &dyn Clock) -> Result<DeviceClaims, SeatwardenError> {
        let mut segments = token.split('.');
        let (header, payload, signature) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() => (h, p, s),
            _ => {
                return Err(SeatwardenError::AuthenticationFailed(
                    "malformed token".to_string(),
                ))
            }
        };

        let signature_bytes = URL_SAFE_NO_PAD.decode(signature).map_err(|_| {
            SeatwardenError::AuthenticationFailed("malformed token signature".to_string())
        })?;

        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature_bytes).map_err(|_| {
            SeatwardenError::AuthenticationFailed("signature mismatch".to_string())
        })?;

        let claims_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| {
            SeatwardenError::AuthenticationFailed("malformed token payload".to_string())
        })?;
        let claims: DeviceClaims = serde_json::from_slice(&claims_bytes).map_err(|_| {
            SeatwardenError::AuthenticationFailed("unparseable token claims".to_string())
        })?;

        if claims.typ != DEVICE_TOKEN_TYPE {
            return Err(SeatwardenError::AuthenticationFailed(format!(
                "not a device token: {}",
                claims.typ
            )));
        }

        if claims.exp <= clock.now_utc().timestamp() {
            return Err(SeatwardenError::AuthenticationFailed(
                "token expired".to_string(),
            ));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::time::Duration;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(vec![7u8; 32], Duration::from_secs(90 * 24 * 60 * 60)).unwrap()
    }

    fn clock() -> MockClock {
        MockClock::from_rfc3339("2025-06-01T00:00:00Z")
    }

    #[test]
    fn test_mint_and_verify_roundtrip() {
        let issuer = issuer();
        let clock = clock();
        let license_id = Uuid::new_v4();

        let token = issuer.mint("dev-1", license_id, &clock).unwrap();
        let claims = issuer.verify(&token, &clock).unwrap();

        assert_eq!(claims.sub, "dev-1");
        assert_eq!(claims.license_id, license_id);
        assert_eq!(claims.typ, "device");
        assert_eq!(claims.exp - claims.iat, 90 * 24 * 60 * 60);
    }

    #[test]
    fn test_rejects_empty_secret() {
        let result = TokenIssuer::new(vec![], Duration::from_secs(60));
        assert!(matches!(result, Err(SeatwardenError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_expired_token() {
        let issuer = issuer();
        let clock = clock();
        let token = issuer.mint("dev-1", Uuid::new_v4(), &clock).unwrap();

        clock.advance(chrono::Duration::days(91));
        let result = issuer.verify(&token, &clock);
        assert!(matches!(
            result,
            Err(SeatwardenError::AuthenticationFailed(reason)) if reason.contains("expired")
        ));
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let issuer = issuer();
        let clock = clock();
        let token = issuer.mint("dev-1", Uuid::new_v4(), &clock).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "dev-2",
                "license_id": Uuid::new_v4(),
                "typ": "device",
                "iat": 0,
                "exp": i64::MAX
            })
            .to_string(),
        );
        parts[1] = &forged;
        let tampered = parts.join(".");

        let result = issuer.verify(&tampered, &clock);
        assert!(matches!(
            result,
            Err(SeatwardenError::AuthenticationFailed(reason)) if reason.contains("signature")
        ));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let clock = clock();
        let token = issuer().mint("dev-1", Uuid::new_v4(), &clock).unwrap();

        let other = TokenIssuer::new(vec![9u8; 32], Duration::from_secs(60)).unwrap();
        assert!(other.verify(&token, &clock).is_err());
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        let issuer = issuer();
        let clock = clock();
        for garbage in ["", "a.b", "a.b.c.d", "not a token", "..."] {
            assert!(issuer.verify(garbage, &clock).is_err(), "accepted {:?}", garbage);
        }
    }

    #[test]
    fn test_rejects_non_device_token_type() {
        let issuer = issuer();
        let clock = clock();

        // Mint a structurally valid token with the wrong kind by signing
        // forged claims with the real secret.
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "dev-1",
                "license_id": Uuid::new_v4(),
                "typ": "admin",
                "iat": 0,
                "exp": 4102444800i64
            })
            .to_string(),
        );
        let signing_input = format!("{}.{}", header, payload);
        let mut mac = HmacSha256::new_from_slice(&[7u8; 32]).unwrap();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        let token = format!("{}.{}", signing_input, signature);

        let result = issuer.verify(&token, &clock);
        assert!(matches!(
            result,
            Err(SeatwardenError::AuthenticationFailed(reason)) if reason.contains("not a device token")
        ));
    }
}
