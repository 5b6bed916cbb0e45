//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use rsvp_collab::{
    BroadcastReceipt, DeadLetter as CollabDeadLetter, DietaryPreference, RsvpData, SessionData,
    UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i32,
    email: Option<String>,
    is_anonymous: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    id: i32,
    user_id: i32,
    name: String,
    email: String,
    #[schema(value_type = Vec<String>)]
    dietary_preferences: Vec<DietaryPreference>,
    other_dietary_preference: Option<String>,
    has_plus_one: bool,
    plus_one_name: Option<String>,
    plus_one_email: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    plus_one_dietary_preferences: Option<Vec<DietaryPreference>>,
    plus_one_other_dietary_preference: Option<String>,
    /// RFC 3339 timestamp
    created_at: String,
    /// RFC 3339 timestamp
    updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RsvpId {
    pub id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResult {
    success: bool,
    /// How many addresses the email is going to
    recipients: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    job_id: u64,
    subject: String,
    recipients: usize,
    attempts: u32,
    error: String,
    /// RFC 3339 timestamp
    failed_at: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            is_anonymous: self.is_anonymous(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Rsvp> for RsvpData {
    fn to_serialized(&self) -> Rsvp {
        let plus_one = self.plus_one.as_ref();

        Rsvp {
            id: self.id,
            user_id: self.user_id,
            name: self.guest.name.clone(),
            email: self.guest.email.clone(),
            dietary_preferences: self.guest.dietary_preferences.iter().copied().collect(),
            other_dietary_preference: self.guest.other_dietary_preference.clone(),
            has_plus_one: self.has_plus_one(),
            plus_one_name: plus_one.map(|p| p.name.clone()),
            plus_one_email: plus_one.map(|p| p.email.clone()),
            plus_one_dietary_preferences: plus_one
                .map(|p| p.dietary_preferences.iter().copied().collect()),
            plus_one_other_dietary_preference: plus_one
                .and_then(|p| p.other_dietary_preference.clone()),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<BroadcastResult> for BroadcastReceipt {
    fn to_serialized(&self) -> BroadcastResult {
        BroadcastResult {
            success: self.success,
            recipients: self.recipients,
        }
    }
}

impl ToSerialized<DeadLetter> for CollabDeadLetter {
    fn to_serialized(&self) -> DeadLetter {
        DeadLetter {
            job_id: self.job.id,
            subject: self.job.message.subject.clone(),
            recipients: self.job.message.to.len(),
            attempts: self.job.attempts,
            error: self.error.clone(),
            failed_at: self.failed_at.to_rfc3339(),
        }
    }
}
