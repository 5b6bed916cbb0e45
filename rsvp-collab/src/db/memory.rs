use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    AdminProfileData, Database, DatabaseError, DatabaseResult, NewSession, NewUser, PrimaryKey,
    Result, RsvpData, RsvpFields, SessionData, UpsertOutcome, UserData,
};

/// An in-memory database, used when no postgres url is configured and in tests.
///
/// Every table lives behind a single lock, so a lookup followed by a write
/// is atomic as long as the lock is held for both.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    last_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<StoredSession>,
    rsvps: Vec<RsvpData>,
    admin_profiles: Vec<AdminProfileData>,
}

struct StoredSession {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: chrono::DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<&UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn session(&self, token: &str) -> Result<SessionData> {
        let session = self
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })?;

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: self.user(session.user_id)?.clone(),
        })
    }

    fn rsvp_index(&self, user_id: PrimaryKey) -> Option<usize> {
        self.rsvps.iter().position(|r| r.user_id == user_id)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.tables.lock().user(user_id).cloned()
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.tables
            .lock()
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "email",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut tables = self.tables.lock();

        if let Some(email) = &new_user.email {
            let existing = tables
                .users
                .iter()
                .find(|u| u.email.as_ref() == Some(email))
                .ok_or(DatabaseError::NotFound {
                    resource: "user",
                    identifier: "email",
                });

            existing.conflict_or_ok("user", "email", email)?;
        }

        let user = UserData {
            id: tables.next_id(),
            email: new_user.email,
            password: new_user.password,
            created_at: Utc::now(),
        };

        tables.users.push(user.clone());
        Ok(user)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.tables.lock().session(token)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut tables = self.tables.lock();

        tables
            .session(&new_session.token)
            .conflict_or_ok("session", "token", &new_session.token)?;
        tables.user(new_session.user_id)?;

        let id = tables.next_id();
        tables.sessions.push(StoredSession {
            id,
            token: new_session.token.clone(),
            user_id: new_session.user_id,
            expires_at: new_session.expires_at,
        });

        tables.session(&new_session.token)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut tables = self.tables.lock();

        // Ensure session exists
        let _ = tables.session(token)?;

        tables.sessions.retain(|s| s.token != token);
        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();

        self.tables.lock().sessions.retain(|s| s.expires_at > now);
        Ok(())
    }

    async fn rsvp_by_user(&self, user_id: PrimaryKey) -> Result<RsvpData> {
        let tables = self.tables.lock();

        tables
            .rsvp_index(user_id)
            .map(|i| tables.rsvps[i].clone())
            .ok_or(DatabaseError::NotFound {
                resource: "rsvp",
                identifier: "user_id",
            })
    }

    async fn list_rsvps(&self) -> Result<Vec<RsvpData>> {
        // Ids are handed out in increasing order, so insertion order is id order
        Ok(self.tables.lock().rsvps.clone())
    }

    async fn upsert_rsvp(
        &self,
        user_id: PrimaryKey,
        fields: RsvpFields,
    ) -> Result<(RsvpData, UpsertOutcome)> {
        let mut tables = self.tables.lock();
        tables.user(user_id)?;

        let now = Utc::now();

        if let Some(index) = tables.rsvp_index(user_id) {
            let existing = &mut tables.rsvps[index];

            existing.guest = fields.guest;
            existing.plus_one = fields.plus_one;
            existing.updated_at = now;

            return Ok((existing.clone(), UpsertOutcome::Updated));
        }

        let rsvp = RsvpData {
            id: tables.next_id(),
            user_id,
            guest: fields.guest,
            plus_one: fields.plus_one,
            created_at: now,
            updated_at: now,
        };

        tables.rsvps.push(rsvp.clone());
        Ok((rsvp, UpsertOutcome::Created))
    }

    async fn admin_profile_by_user(&self, user_id: PrimaryKey) -> Result<AdminProfileData> {
        self.tables
            .lock()
            .admin_profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "admin profile",
                identifier: "user_id",
            })
    }

    async fn create_admin_profile_once(&self, user_id: PrimaryKey) -> Result<AdminProfileData> {
        let mut tables = self.tables.lock();
        tables.user(user_id)?;

        if let Some(existing) = tables.admin_profiles.iter().find(|p| p.user_id == user_id) {
            return Ok(existing.clone());
        }

        let profile = AdminProfileData {
            id: tables.next_id(),
            user_id,
            admin: true,
            created_at: Utc::now(),
        };

        tables.admin_profiles.push(profile.clone());
        Ok(profile)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::*;
    use crate::GuestData;

    fn guest(name: &str) -> GuestData {
        GuestData {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            dietary_preferences: BTreeSet::new(),
            other_dietary_preference: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_user() {
        let db = MemoryDatabase::new();
        let user = db
            .create_user(NewUser {
                email: None,
                password: None,
            })
            .await
            .unwrap();

        let (first, outcome) = db
            .upsert_rsvp(
                user.id,
                RsvpFields {
                    guest: guest("Ada"),
                    plus_one: Some(guest("Grace")),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let (second, outcome) = db
            .upsert_rsvp(
                user.id,
                RsvpFields {
                    guest: guest("Alan"),
                    plus_one: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);

        let all = db.list_rsvps().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].guest.name, "Alan");
        assert!(all[0].plus_one.is_none());
    }

    #[tokio::test]
    async fn test_upsert_for_missing_user_fails() {
        let db = MemoryDatabase::new();

        let result = db
            .upsert_rsvp(
                42,
                RsvpFields {
                    guest: guest("Ada"),
                    plus_one: None,
                },
            )
            .await;

        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let db = MemoryDatabase::new();
        let new_user = || NewUser {
            email: Some("ada@example.com".to_string()),
            password: None,
        };

        db.create_user(new_user()).await.unwrap();
        let result = db.create_user(new_user()).await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_expired_sessions_are_cleared() {
        let db = MemoryDatabase::new();
        let user = db
            .create_user(NewUser {
                email: None,
                password: None,
            })
            .await
            .unwrap();

        db.create_session(NewSession {
            token: "old".to_string(),
            user_id: user.id,
            expires_at: Utc::now() - chrono::Duration::days(1),
        })
        .await
        .unwrap();
        db.create_session(NewSession {
            token: "fresh".to_string(),
            user_id: user.id,
            expires_at: Utc::now() + chrono::Duration::days(1),
        })
        .await
        .unwrap();

        db.clear_expired_sessions().await.unwrap();

        assert!(db.session_by_token("old").await.is_err());
        assert_eq!(db.session_by_token("fresh").await.unwrap().user, user);
    }
}
