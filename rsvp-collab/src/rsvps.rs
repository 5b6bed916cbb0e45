use std::{collections::BTreeSet, sync::Arc};

use log::info;
use thiserror::Error;

use crate::{
    util::non_blank, Database, DatabaseError, DietaryPreference, GuestData, OptionalResult,
    PrimaryKey, RsvpData, RsvpFields, UpsertOutcome, UserData,
};

/// Stores and retrieves RSVPs, one per user
pub struct RsvpManager {
    db: Arc<dyn Database>,
}

#[derive(Debug, Error)]
pub enum RsvpError {
    #[error("User not authenticated")]
    NotAuthenticated,
    #[error("Plus one details are required when bringing a guest")]
    MissingPlusOne,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// A guest as submitted on the form, before normalization
#[derive(Debug, Clone)]
pub struct GuestSubmission {
    pub name: String,
    pub email: String,
    pub dietary_preferences: Vec<DietaryPreference>,
    pub other_dietary_preference: Option<String>,
}

/// An RSVP as submitted on the form
#[derive(Debug, Clone)]
pub struct RsvpSubmission {
    pub guest: GuestSubmission,
    pub has_plus_one: bool,
    /// Ignored unless `has_plus_one` is set
    pub plus_one: Option<GuestSubmission>,
}

impl GuestSubmission {
    fn into_guest(self) -> GuestData {
        let dietary_preferences: BTreeSet<_> = self.dietary_preferences.into_iter().collect();

        let other_dietary_preference = if dietary_preferences.contains(&DietaryPreference::Other) {
            non_blank(self.other_dietary_preference).map(|s| s.trim().to_string())
        } else {
            None
        };

        GuestData {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            dietary_preferences,
            other_dietary_preference,
        }
    }
}

impl RsvpSubmission {
    /// Applies the field population rules, producing what gets stored:
    /// the plus one only exists if `has_plus_one` is set, and "other" notes only
    /// exist if "other" is selected.
    pub fn into_fields(self) -> Result<RsvpFields, RsvpError> {
        let plus_one = match (self.has_plus_one, self.plus_one) {
            (true, Some(plus_one)) => Some(plus_one.into_guest()),
            (true, None) => return Err(RsvpError::MissingPlusOne),
            (false, _) => None,
        };

        Ok(RsvpFields {
            guest: self.guest.into_guest(),
            plus_one,
        })
    }
}

impl RsvpManager {
    pub fn new(db: &Arc<dyn Database>) -> Self {
        Self { db: db.clone() }
    }

    /// Creates the user's RSVP, or replaces every field of the existing one.
    /// Returns the id of the RSVP either way.
    pub async fn submit(
        &self,
        user: Option<&UserData>,
        submission: RsvpSubmission,
    ) -> Result<PrimaryKey, RsvpError> {
        let user = user.ok_or(RsvpError::NotAuthenticated)?;
        let fields = submission.into_fields()?;

        let (rsvp, outcome) = self.db.upsert_rsvp(user.id, fields).await?;

        match outcome {
            UpsertOutcome::Created => info!("User {} submitted RSVP {}", user.id, rsvp.id),
            UpsertOutcome::Updated => info!("User {} updated RSVP {}", user.id, rsvp.id),
        }

        Ok(rsvp.id)
    }

    /// Returns the user's RSVP, if they are logged in and have one
    pub async fn my_rsvp(&self, user: Option<&UserData>) -> Result<Option<RsvpData>, RsvpError> {
        let Some(user) = user else {
            return Ok(None);
        };

        Ok(self.db.rsvp_by_user(user.id).await.optional()?)
    }

    /// Returns every RSVP
    pub async fn list_all(&self) -> Result<Vec<RsvpData>, RsvpError> {
        Ok(self.db.list_rsvps().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryDatabase, NewUser};

    async fn setup() -> (RsvpManager, UserData) {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
        let user = db
            .create_user(NewUser {
                email: None,
                password: None,
            })
            .await
            .unwrap();

        (RsvpManager::new(&db), user)
    }

    fn guest(name: &str, email: &str) -> GuestSubmission {
        GuestSubmission {
            name: name.to_string(),
            email: email.to_string(),
            dietary_preferences: vec![],
            other_dietary_preference: None,
        }
    }

    fn submission(has_plus_one: bool) -> RsvpSubmission {
        RsvpSubmission {
            guest: guest("Ada", "ada@example.com"),
            has_plus_one,
            plus_one: Some(guest("Grace", "grace@example.com")),
        }
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let (rsvps, _) = setup().await;

        let result = rsvps.submit(None, submission(false)).await;

        assert!(matches!(result, Err(RsvpError::NotAuthenticated)));
        assert!(rsvps.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_submission_replaces_first() {
        let (rsvps, user) = setup().await;

        let first = rsvps.submit(Some(&user), submission(true)).await.unwrap();

        let mut changed = submission(false);
        changed.guest = guest("Alan", "alan@example.com");
        let second = rsvps.submit(Some(&user), changed).await.unwrap();

        assert_eq!(first, second);

        let all = rsvps.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].guest.name, "Alan");
        assert_eq!(all[0].guest.email, "alan@example.com");
        assert!(!all[0].has_plus_one());
    }

    #[tokio::test]
    async fn test_plus_one_follows_latest_flag() {
        let (rsvps, user) = setup().await;

        rsvps.submit(Some(&user), submission(false)).await.unwrap();
        let stored = rsvps.my_rsvp(Some(&user)).await.unwrap().unwrap();
        assert!(stored.plus_one.is_none());

        rsvps.submit(Some(&user), submission(true)).await.unwrap();
        let stored = rsvps.my_rsvp(Some(&user)).await.unwrap().unwrap();
        assert_eq!(stored.plus_one.unwrap().name, "Grace");

        rsvps.submit(Some(&user), submission(false)).await.unwrap();
        let stored = rsvps.my_rsvp(Some(&user)).await.unwrap().unwrap();
        assert!(stored.plus_one.is_none());
    }

    #[tokio::test]
    async fn test_identical_submission_is_idempotent() {
        let (rsvps, user) = setup().await;

        rsvps.submit(Some(&user), submission(true)).await.unwrap();
        let before = rsvps.my_rsvp(Some(&user)).await.unwrap().unwrap();

        rsvps.submit(Some(&user), submission(true)).await.unwrap();
        let after = rsvps.my_rsvp(Some(&user)).await.unwrap().unwrap();

        assert_eq!(before.id, after.id);
        assert_eq!(before.guest, after.guest);
        assert_eq!(before.plus_one, after.plus_one);
    }

    #[tokio::test]
    async fn test_missing_plus_one_is_rejected() {
        let (rsvps, user) = setup().await;

        let mut missing = submission(true);
        missing.plus_one = None;

        let result = rsvps.submit(Some(&user), missing).await;
        assert!(matches!(result, Err(RsvpError::MissingPlusOne)));
    }

    #[tokio::test]
    async fn test_my_rsvp_without_user_or_record() {
        let (rsvps, user) = setup().await;

        assert!(rsvps.my_rsvp(None).await.unwrap().is_none());
        assert!(rsvps.my_rsvp(Some(&user)).await.unwrap().is_none());
    }

    #[test]
    fn test_other_note_requires_other_preference() {
        let mut without_other = guest("Ada", "ada@example.com");
        without_other.dietary_preferences = vec![DietaryPreference::Meat];
        without_other.other_dietary_preference = Some("no nuts".to_string());
        assert_eq!(without_other.into_guest().other_dietary_preference, None);

        let mut with_other = guest("Ada", "ada@example.com");
        with_other.dietary_preferences = vec![DietaryPreference::Other, DietaryPreference::Other];
        with_other.other_dietary_preference = Some(" no nuts ".to_string());

        let stored = with_other.into_guest();
        assert_eq!(stored.dietary_preferences.len(), 1);
        assert_eq!(stored.other_dietary_preference.as_deref(), Some("no nuts"));
    }
}
