use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    access_ttl_minutes: u64,
}

impl AuthService {
    pub fn new(db: Db, access_key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            db,
            access_key,
            access_ttl_minutes,
        }
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<User> {
        let password_hash = hash_password(&password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING id, username, email, about_me, last_seen, created_at",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .fetch_one(self.db.pool())
        .await?;

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            about_me: row.get("about_me"),
            last_seen: row.get("last_seen"),
            created_at: row.get("created_at"),
        })
    }

    /// The identifier matches either username or email. Unknown user and
    /// wrong password are indistinguishable to the caller.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query(
            "SELECT id, password_hash FROM users WHERE username = ? OR email = ?",
        )
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: i64 = row.get("id");
        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        let token = self.issue_access_token(user_id)?;
        Ok(Some(token))
    }

    /// Revokes the presented token by digest. Returns false when the token
    /// does not decrypt; revoking an already-revoked token is a no-op
    /// returning true.
    pub async fn logout(&self, token: &str) -> Result<bool> {
        if self.decrypt_claims(token)?.is_none() {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO revoked_tokens (token_hash, revoked_at) \
             VALUES (?, ?) \
             ON CONFLICT DO NOTHING",
        )
        .bind(hash_token(token))
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(self.db.pool())
        .await?;

        Ok(true)
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }

        let revoked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token_hash = ?)",
        )
        .bind(hash_token(token))
        .fetch_one(self.db.pool())
        .await?;
        if revoked {
            return Ok(None);
        }

        let user_id = claim_user_id(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    pub async fn get_current_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, about_me, last_seen, created_at \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            about_me: row.get("about_me"),
            last_seen: row.get("last_seen"),
            created_at: row.get("created_at"),
        });

        Ok(user)
    }

    fn issue_access_token(&self, user_id: i64) -> Result<AccessToken> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("murmur")?;
        claims.audience("murmur")?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);

        Ok(AccessToken { token, expires_at })
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with("murmur");
        rules.validate_audience_with("murmur");

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn claim_user_id(claims: &Claims, name: &str) -> Result<i64> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(value.parse::<i64>()?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
