use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    migrate::Migrator, postgres::PgPoolOptions, query, query_as, Error as SqlxError, FromRow,
    PgPool,
};

use crate::{
    AdminProfileData, Database, DatabaseError, DatabaseResult, DietaryPreference, GuestData,
    IntoDatabaseError, NewSession, NewUser, PrimaryKey, Result, RsvpData, RsvpFields,
    SessionData, UpsertOutcome, UserData,
};

static MIGRATOR: Migrator = sqlx::migrate!();

/// First key of the advisory locks taken while upserting an RSVP
const RSVP_LOCK_SPACE: i32 = 1;
/// First key of the advisory locks taken while creating an admin profile
const ADMIN_PROFILE_LOCK_SPACE: i32 = 2;

/// A postgres database implementation for the RSVP service
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    email: Option<String>,
    password: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RsvpRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    name: String,
    email: String,
    dietary_preferences: Vec<String>,
    other_dietary_preference: Option<String>,
    has_plus_one: bool,
    plus_one_name: Option<String>,
    plus_one_email: Option<String>,
    plus_one_dietary_preferences: Option<Vec<String>>,
    plus_one_other_dietary_preference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT id, email, password, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(UserRow::into_data)
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT id, email, password, created_at FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map(UserRow::into_data)
            .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        if let Some(email) = &new_user.email {
            self.user_by_email(email)
                .await
                .conflict_or_ok("user", "email", email)?;
        }

        query_as::<_, UserRow>(
            "INSERT INTO users (email, password) VALUES ($1, $2)
            RETURNING id, email, password, created_at",
        )
        .bind(new_user.email)
        .bind(new_user.password)
        .fetch_one(&self.pool)
        .await
        .map(UserRow::into_data)
        .map_err(|e| e.any())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = query_as(
            "SELECT
                sessions.id,
                sessions.token,
                sessions.expires_at,
                sessions.user_id,
                users.email,
                users.password,
                users.created_at
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                email: row.email,
                password: row.password,
                created_at: row.created_at,
            },
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn rsvp_by_user(&self, user_id: PrimaryKey) -> Result<RsvpData> {
        let row: RsvpRow = query_as("SELECT * FROM rsvps WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("rsvp", "user_id"))?;

        row.try_into_data()
    }

    async fn list_rsvps(&self) -> Result<Vec<RsvpData>> {
        let rows: Vec<RsvpRow> = query_as("SELECT * FROM rsvps ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.into_iter().map(RsvpRow::try_into_data).collect()
    }

    async fn upsert_rsvp(
        &self,
        user_id: PrimaryKey,
        fields: RsvpFields,
    ) -> Result<(RsvpData, UpsertOutcome)> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        // Serializes upserts for the same user, even before a row exists to lock
        query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(RSVP_LOCK_SPACE)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let existing: Option<(PrimaryKey,)> =
            query_as("SELECT id FROM rsvps WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| e.any())?;

        let columns = RsvpColumns::from(fields);

        let (row, outcome): (RsvpRow, _) = match existing {
            Some((id,)) => {
                let row: RsvpRow = query_as(
                    "UPDATE rsvps SET
                        name = $1,
                        email = $2,
                        dietary_preferences = $3,
                        other_dietary_preference = $4,
                        has_plus_one = $5,
                        plus_one_name = $6,
                        plus_one_email = $7,
                        plus_one_dietary_preferences = $8,
                        plus_one_other_dietary_preference = $9,
                        updated_at = now()
                    WHERE id = $10
                    RETURNING *",
                )
                .bind(columns.name)
                .bind(columns.email)
                .bind(columns.dietary_preferences)
                .bind(columns.other_dietary_preference)
                .bind(columns.has_plus_one)
                .bind(columns.plus_one_name)
                .bind(columns.plus_one_email)
                .bind(columns.plus_one_dietary_preferences)
                .bind(columns.plus_one_other_dietary_preference)
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.any())?;

                (row, UpsertOutcome::Updated)
            }
            None => {
                let row: RsvpRow = query_as(
                    "INSERT INTO rsvps (
                        user_id,
                        name,
                        email,
                        dietary_preferences,
                        other_dietary_preference,
                        has_plus_one,
                        plus_one_name,
                        plus_one_email,
                        plus_one_dietary_preferences,
                        plus_one_other_dietary_preference
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    RETURNING *",
                )
                .bind(user_id)
                .bind(columns.name)
                .bind(columns.email)
                .bind(columns.dietary_preferences)
                .bind(columns.other_dietary_preference)
                .bind(columns.has_plus_one)
                .bind(columns.plus_one_name)
                .bind(columns.plus_one_email)
                .bind(columns.plus_one_dietary_preferences)
                .bind(columns.plus_one_other_dietary_preference)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.not_found_or("user", "id"))?;

                (row, UpsertOutcome::Created)
            }
        };

        tx.commit().await.map_err(|e| e.any())?;

        Ok((row.try_into_data()?, outcome))
    }

    async fn admin_profile_by_user(&self, user_id: PrimaryKey) -> Result<AdminProfileData> {
        query_as::<_, AdminProfileRow>(
            "SELECT id, user_id, admin, created_at FROM admin_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map(AdminProfileRow::into_data)
        .map_err(|e| e.not_found_or("admin profile", "user_id"))
    }

    async fn create_admin_profile_once(&self, user_id: PrimaryKey) -> Result<AdminProfileData> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(ADMIN_PROFILE_LOCK_SPACE)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let existing: Option<AdminProfileRow> = query_as(
            "SELECT id, user_id, admin, created_at FROM admin_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let profile = match existing {
            Some(profile) => profile,
            None => query_as(
                "INSERT INTO admin_profiles (user_id, admin) VALUES ($1, true)
                RETURNING id, user_id, admin, created_at",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.any())?,
        };

        tx.commit().await.map_err(|e| e.any())?;

        Ok(profile.into_data())
    }
}

#[derive(FromRow)]
struct UserRow {
    id: PrimaryKey,
    email: Option<String>,
    password: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_data(self) -> UserData {
        UserData {
            id: self.id,
            email: self.email,
            password: self.password,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AdminProfileRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    admin: bool,
    created_at: DateTime<Utc>,
}

impl AdminProfileRow {
    fn into_data(self) -> AdminProfileData {
        AdminProfileData {
            id: self.id,
            user_id: self.user_id,
            admin: self.admin,
            created_at: self.created_at,
        }
    }
}

/// The flattened column values of [RsvpFields]
struct RsvpColumns {
    name: String,
    email: String,
    dietary_preferences: Vec<String>,
    other_dietary_preference: Option<String>,
    has_plus_one: bool,
    plus_one_name: Option<String>,
    plus_one_email: Option<String>,
    plus_one_dietary_preferences: Option<Vec<String>>,
    plus_one_other_dietary_preference: Option<String>,
}

impl From<RsvpFields> for RsvpColumns {
    fn from(fields: RsvpFields) -> Self {
        let guest = fields.guest;
        let plus_one = fields.plus_one;

        Self {
            name: guest.name,
            email: guest.email,
            dietary_preferences: preferences_to_column(&guest.dietary_preferences),
            other_dietary_preference: guest.other_dietary_preference,
            has_plus_one: plus_one.is_some(),
            plus_one_name: plus_one.as_ref().map(|p| p.name.clone()),
            plus_one_email: plus_one.as_ref().map(|p| p.email.clone()),
            plus_one_dietary_preferences: plus_one
                .as_ref()
                .map(|p| preferences_to_column(&p.dietary_preferences)),
            plus_one_other_dietary_preference: plus_one.and_then(|p| p.other_dietary_preference),
        }
    }
}

impl RsvpRow {
    fn try_into_data(self) -> Result<RsvpData> {
        let guest = GuestData {
            name: self.name,
            email: self.email,
            dietary_preferences: preferences_from_column(self.dietary_preferences)?,
            other_dietary_preference: self.other_dietary_preference,
        };

        let plus_one = match (self.has_plus_one, self.plus_one_name, self.plus_one_email) {
            (true, Some(name), Some(email)) => Some(GuestData {
                name,
                email,
                dietary_preferences: preferences_from_column(
                    self.plus_one_dietary_preferences.unwrap_or_default(),
                )?,
                other_dietary_preference: self.plus_one_other_dietary_preference,
            }),
            _ => None,
        };

        Ok(RsvpData {
            id: self.id,
            user_id: self.user_id,
            guest,
            plus_one,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn preferences_to_column(preferences: &BTreeSet<DietaryPreference>) -> Vec<String> {
    preferences.iter().map(|p| p.as_str().to_string()).collect()
}

fn preferences_from_column(column: Vec<String>) -> Result<BTreeSet<DietaryPreference>> {
    column
        .iter()
        .map(|p| {
            p.parse::<DietaryPreference>()
                .map_err(|e| DatabaseError::Internal(Box::new(e)))
        })
        .collect()
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            // A foreign key violation means the referenced row is gone
            SqlxError::Database(e) if e.is_foreign_key_violation() => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
