use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// An account that can submit an RSVP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub id: PrimaryKey,
    /// Anonymous users have no email
    pub email: Option<String>,
    /// The argon2 hash of the password, if the user has one
    pub password: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserData {
    pub fn is_anonymous(&self) -> bool {
        self.email.is_none()
    }
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A dietary requirement a guest can tick on the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DietaryPreference {
    Meat,
    Dairy,
    Seafood,
    GreenStuff,
    Gluten,
    /// Described by the free-text note next to it
    Other,
}

impl DietaryPreference {
    pub const ALL: [DietaryPreference; 6] = [
        Self::Meat,
        Self::Dairy,
        Self::Seafood,
        Self::GreenStuff,
        Self::Gluten,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meat => "meat",
            Self::Dairy => "dairy",
            Self::Seafood => "seafood",
            Self::GreenStuff => "greenStuff",
            Self::Gluten => "gluten",
            Self::Other => "other",
        }
    }
}

impl Display for DietaryPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown dietary preference: {0}")]
pub struct UnknownDietaryPreference(pub String);

impl FromStr for DietaryPreference {
    type Err = UnknownDietaryPreference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownDietaryPreference(s.to_string()))
    }
}

/// A person attending, either the primary guest or their plus one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestData {
    pub name: String,
    pub email: String,
    pub dietary_preferences: BTreeSet<DietaryPreference>,
    /// Only present when [DietaryPreference::Other] is selected
    pub other_dietary_preference: Option<String>,
}

/// The mutable part of an RSVP, replaced wholesale on every submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpFields {
    pub guest: GuestData,
    pub plus_one: Option<GuestData>,
}

/// A stored response to the invitation.
/// Note: there is at most one per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpData {
    pub id: PrimaryKey,
    /// The user that owns this RSVP
    pub user_id: PrimaryKey,
    pub guest: GuestData,
    /// The companion, if the guest is bringing one
    pub plus_one: Option<GuestData>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RsvpData {
    pub fn has_plus_one(&self) -> bool {
        self.plus_one.is_some()
    }
}

/// Whether an upsert inserted a new row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Marks a user as privileged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminProfileData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
}
