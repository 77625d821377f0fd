use crate::api_error::ApiError;
use crate::config::Config;
use crate::db;
use crate::schema::profiles;
use argon2::Config as ArgonConfig;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use derive_more::Display;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display(fmt = "student")]
    Student,
    #[display(fmt = "teacher")]
    Teacher,
    #[display(fmt = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(ApiError::bad_request(format!("Unknown role {:?}", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "profiles"]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: NaiveDateTime,
}

pub struct ProfileMessage {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    sub: Uuid,
    email: String,
    name: String,
    role: Role,
    exp: usize,
}

/// The authenticated caller, decoded from the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            id: claims.sub,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            warn!("{} {} tried to reach a {} route", self.role, self.id, role);
            Err(ApiError::forbidden())
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt: [u8; 32] = rand::thread_rng().gen();
    let config = ArgonConfig::default();

    argon2::hash_encoded(password.as_bytes(), &salt, &config)
        .map_err(|e| ApiError::new(500, format!("Failed to hash password: {}", e)))
}

impl Profile {
    pub fn find(id: Uuid) -> Result<Self, ApiError> {
        let conn = db::connection()?;

        let profile = profiles::table.filter(profiles::id.eq(id)).first(&conn)?;

        Ok(profile)
    }

    pub fn find_by_email(email: &str) -> Result<Option<Self>, ApiError> {
        let conn = db::connection()?;

        let profile = profiles::table
            .filter(profiles::email.eq(email.trim().to_lowercase()))
            .first(&conn)
            .optional()?;

        Ok(profile)
    }

    pub fn email_exists(conn: &PgConnection, email: &str) -> Result<bool, ApiError> {
        let count: i64 = profiles::table
            .filter(profiles::email.eq(email))
            .count()
            .get_result(conn)?;

        Ok(count > 0)
    }

    pub fn find_recent(limit: i64) -> Result<Vec<Self>, ApiError> {
        let conn = db::connection()?;

        let profiles = profiles::table
            .order(profiles::created_at.desc())
            .limit(limit)
            .load::<Profile>(&conn)?;

        Ok(profiles)
    }

    /// Inserts on the given connection so callers can group it with the role row.
    pub fn insert(conn: &PgConnection, message: ProfileMessage) -> Result<Self, ApiError> {
        let profile = Profile::from(message).with_hashed_password()?;

        let profile = diesel::insert_into(profiles::table)
            .values(profile)
            .get_result(conn)
            .map_err(|e| ApiError::from_diesel_or_duplicate(e, "A user with this email already exists."))?;

        Ok(profile)
    }

    pub fn role(&self) -> Result<Role, ApiError> {
        self.role.parse()
    }

    fn with_hashed_password(mut self) -> Result<Self, ApiError> {
        self.password = hash_password(&self.password)?;
        Ok(self)
    }

    pub fn verify_password(&self, password: &[u8]) -> Result<bool, ApiError> {
        argon2::verify_encoded(&self.password, password)
            .map_err(|e| ApiError::new(500, format!("Failed to verify password: {}", e)))
    }

    pub fn generate_token(&self, config: &Config) -> Result<String, ApiError> {
        let date: DateTime<Utc> = Utc::now() + Duration::hours(config.token_ttl_hours);
        let claims = Claims {
            sub: self.id,
            email: self.email.clone(),
            name: self.full_name.clone(),
            role: self.role()?,
            exp: date.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret_token.as_bytes()),
        )
        .map_err(|e| ApiError::new(500, format!("Failed to sign token: {}", e)))
    }

    pub fn decode_token(token: &str, config: &Config) -> Result<AuthUser, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.secret_token.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims.into())
        .map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::new(401, "Invalid or expired session".to_string())
        })
    }

    /// Creates the configured admin account unless its email is already taken.
    pub fn ensure_bootstrap_admin(config: &Config) -> Result<(), ApiError> {
        let admin = match &config.bootstrap_admin {
            Some(admin) => admin,
            None => return Ok(()),
        };

        let conn = db::connection()?;
        if Profile::email_exists(&conn, &admin.email)? {
            debug!("Bootstrap admin {} already exists", admin.email);
            return Ok(());
        }

        Profile::insert(
            &conn,
            ProfileMessage {
                email: admin.email.clone(),
                full_name: admin.full_name.clone(),
                role: Role::Admin,
                password: admin.password.clone(),
            },
        )?;
        info!("Created bootstrap admin {}", admin.email);

        Ok(())
    }
}

impl From<ProfileMessage> for Profile {
    fn from(profile: ProfileMessage) -> Self {
        Profile {
            id: Uuid::new_v4(),
            email: profile.email.trim().to_lowercase(),
            full_name: profile.full_name,
            role: profile.role.as_str().to_string(),
            password: profile.password,
            created_at: Utc::now().naive_utc(),
        }
    }
}
