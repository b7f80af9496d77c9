use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT Claims structure.
///
/// Tokens are issued by the external identity provider with the shared
/// secret; this module only needs `sign` for tests and tooling.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (email)
    pub uid: i32,     // User ID
    pub role: String, // "student" or "admin"
    pub exp: usize,   // Expiration timestamp
}

/// Sign a new JWT token for a user.
pub fn sign(secret: &str, user_id: i32, subject: &str, role: &str) -> Result<String> {
    let expiration = (Utc::now() + Duration::days(7)).timestamp();

    let claims = Claims {
        sub: subject.to_owned(),
        uid: user_id,
        role: role.to_owned(),
        exp: expiration as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a JWT token.
pub fn verify(secret: &str, token: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let token = sign("test-secret", 7, "aina@example.com", "student").unwrap();
        let claims = verify("test-secret", &token).unwrap();
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.sub, "aina@example.com");
        assert_eq!(claims.role, "student");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign("secret-a", 1, "x@y.z", "admin").unwrap();
        assert!(verify("secret-b", &token).is_err());
    }
}
