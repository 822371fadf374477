use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed role enumeration carried in the `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    ClinicManager,
    Doctor,
    Nurse,
    Receptionist,
    Accountant,
    Pharmacist,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::ClinicManager,
        Role::Doctor,
        Role::Nurse,
        Role::Receptionist,
        Role::Accountant,
        Role::Pharmacist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::ClinicManager => "ClinicManager",
            Role::Doctor => "Doctor",
            Role::Nurse => "Nurse",
            Role::Receptionist => "Receptionist",
            Role::Accountant => "Accountant",
            Role::Pharmacist => "Pharmacist",
        }
    }

    /// The top administrative role, allowed to act without a membership row.
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl FromStr for Role {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| JwtError::UnknownRole(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest credential lifetime accepted from configuration (366 days).
pub const MAX_EXPIRY_HOURS: u64 = 24 * 366;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, tenant_id: Option<Uuid>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let hours = expiry_hours.min(MAX_EXPIRY_HOURS) as i64;
        let exp = (now + Duration::hours(hours)).timestamp();

        Self {
            sub: user_id,
            role: role.as_str().to_string(),
            tenant_id,
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Verified identity extracted from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    /// Explicit clinic the credential asks to act within.
    pub tenant_claim: Option<Uuid>,
}

impl TryFrom<Claims> for Identity {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.sub,
            role: claims.role.parse()?,
            tenant_claim: claims.tenant_id,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("JWT expiry must be between 1 and {max} hours, got {0}", max = MAX_EXPIRY_HOURS)]
    InvalidExpiry(u64),
}

/// HMAC keys for issuing and verifying credentials.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: u64,
}

impl TokenKeys {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }
        if !(1..=MAX_EXPIRY_HOURS).contains(&expiry_hours) {
            return Err(JwtError::InvalidExpiry(expiry_hours));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        })
    }

    pub fn issue(&self, user_id: Uuid, role: Role, tenant_id: Option<Uuid>) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, role, tenant_id, self.expiry_hours);
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        Identity::try_from(token_data.claims)
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("expiry_hours", &self.expiry_hours)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let keys = TokenKeys::new("secret", 1).unwrap();
        let user = Uuid::new_v4();
        let tenant = Uuid::new_v4();

        let token = keys.issue(user, Role::Doctor, Some(tenant)).unwrap();
        let identity = keys.verify(&token).unwrap();

        assert_eq!(identity.user_id, user);
        assert_eq!(identity.role, Role::Doctor);
        assert_eq!(identity.tenant_claim, Some(tenant));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = TokenKeys::new("one", 1).unwrap();
        let verifier = TokenKeys::new("two", 1).unwrap();
        let token = issuer.issue(Uuid::new_v4(), Role::Nurse, None).unwrap();

        assert!(matches!(verifier.verify(&token), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenKeys::new("", 1), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn out_of_range_expiry_is_refused() {
        assert!(matches!(TokenKeys::new("secret", 0), Err(JwtError::InvalidExpiry(0))));
        assert!(matches!(
            TokenKeys::new("secret", u64::MAX),
            Err(JwtError::InvalidExpiry(u64::MAX))
        ));
        assert!(TokenKeys::new("secret", MAX_EXPIRY_HOURS).is_ok());
    }

    #[test]
    fn claims_clamp_huge_lifetimes() {
        let claims = Claims::new(Uuid::new_v4(), Role::Doctor, None, u64::MAX);
        let max_seconds = (MAX_EXPIRY_HOURS * 3600) as i64;
        assert!(claims.exp - claims.iat <= max_seconds);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("superadmin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("Pharmacist".parse::<Role>().unwrap(), Role::Pharmacist);
        assert!("Janitor".parse::<Role>().is_err());
    }
}
