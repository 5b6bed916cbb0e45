use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use rsvp_collab::{Broadcast, DietaryPreference, GuestSubmission, RsvpSubmission};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 254))]
    pub email: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(email, length(max = 254))]
    pub email: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_plus_one"))]
pub struct RsvpSchema {
    #[validate(length(max = 128), custom(function = "validate_name"))]
    pub name: String,
    #[validate(email(message = "Email must be valid"), length(max = 254))]
    pub email: String,
    #[schema(value_type = Vec<String>)]
    pub dietary_preferences: Vec<DietaryPreference>,
    #[validate(length(max = 512))]
    pub other_dietary_preference: Option<String>,
    pub has_plus_one: bool,
    #[validate(length(max = 128))]
    pub plus_one_name: Option<String>,
    #[validate(length(max = 254))]
    pub plus_one_email: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub plus_one_dietary_preferences: Option<Vec<DietaryPreference>>,
    #[validate(length(max = 512))]
    pub plus_one_other_dietary_preference: Option<String>,
}

/// Names are stored trimmed, so the trimmed name is what must be long enough
fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() >= 2 {
        return Ok(());
    }

    let mut error = ValidationError::new("name");
    error.message = Some("Name must be at least 2 characters".into());
    Err(error)
}

/// Plus one name (min 2 chars) and email are required when bringing a guest
fn validate_plus_one(schema: &RsvpSchema) -> Result<(), ValidationError> {
    if !schema.has_plus_one {
        return Ok(());
    }

    let name_ok = schema
        .plus_one_name
        .as_deref()
        .is_some_and(|n| n.trim().chars().count() >= 2);
    let email_ok = schema
        .plus_one_email
        .as_deref()
        .is_some_and(|e| e.validate_email());

    if name_ok && email_ok {
        Ok(())
    } else {
        let mut error = ValidationError::new("plus_one");
        error.message =
            Some("Plus one name (min 2 chars) and email are required if bringing a guest.".into());
        Err(error)
    }
}

impl RsvpSchema {
    pub fn into_submission(self) -> RsvpSubmission {
        let plus_one = match (self.plus_one_name, self.plus_one_email) {
            (Some(name), Some(email)) if self.has_plus_one => Some(GuestSubmission {
                name,
                email,
                dietary_preferences: self.plus_one_dietary_preferences.unwrap_or_default(),
                other_dietary_preference: self.plus_one_other_dietary_preference,
            }),
            _ => None,
        };

        RsvpSubmission {
            guest: GuestSubmission {
                name: self.name,
                email: self.email,
                dietary_preferences: self.dietary_preferences,
                other_dietary_preference: self.other_dietary_preference,
            },
            has_plus_one: self.has_plus_one,
            plus_one,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BroadcastSchema {
    #[validate(length(min = 1, max = 998))]
    pub subject: String,
    /// The HTML body of the email
    #[validate(length(min = 1))]
    pub body: String,
    /// Sends only to this address, if present and not blank
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email(message = "Test email must be valid"))]
    pub test_email: Option<String>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

impl From<BroadcastSchema> for Broadcast {
    fn from(value: BroadcastSchema) -> Self {
        Self {
            subject: value.subject,
            html_body: value.body,
            test_email: value.test_email,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminPasswordSchema {
    #[validate(length(max = 256))]
    pub admin_password: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| ServerError::BadRequest("JSON parse failed".to_string()))?;

        extracted_json
            .0
            .validate()
            .map_err(|e| ServerError::BadRequest(describe_errors(&e)))?;

        Ok(Self(extracted_json.0))
    }
}

/// Turns validation errors into one readable sentence, preferring the messages set on the rules
fn describe_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<_> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| match &error.message {
                Some(message) => message.to_string(),
                None if field == "__all__" => "Request body is invalid".to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();

    messages.sort();
    messages.dedup();

    if messages.is_empty() {
        return "Request body is invalid".to_string();
    }

    messages.join(". ")
}

#[cfg(test)]
mod test {
    use super::*;

    fn rsvp(has_plus_one: bool) -> RsvpSchema {
        RsvpSchema {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            dietary_preferences: vec![DietaryPreference::GreenStuff],
            other_dietary_preference: None,
            has_plus_one,
            plus_one_name: Some("Grace".to_string()),
            plus_one_email: Some("grace@example.com".to_string()),
            plus_one_dietary_preferences: None,
            plus_one_other_dietary_preference: None,
        }
    }

    #[test]
    fn test_parses_camel_case_payload() {
        let schema: RsvpSchema = serde_json::from_value(serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "dietaryPreferences": ["greenStuff", "other"],
            "otherDietaryPreference": "no nuts",
            "hasPlusOne": false,
        }))
        .unwrap();

        assert!(schema.validate().is_ok());
        assert_eq!(
            schema.dietary_preferences,
            vec![DietaryPreference::GreenStuff, DietaryPreference::Other]
        );
    }

    #[test]
    fn test_unknown_dietary_preference_is_rejected() {
        let result = serde_json::from_value::<RsvpSchema>(serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "dietaryPreferences": ["chocolate"],
            "hasPlusOne": false,
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_plus_one_details_required_when_flagged() {
        assert!(rsvp(true).validate().is_ok());

        let mut missing_email = rsvp(true);
        missing_email.plus_one_email = None;
        assert!(missing_email.validate().is_err());

        let mut short_name = rsvp(true);
        short_name.plus_one_name = Some("G".to_string());
        assert!(short_name.validate().is_err());

        let mut not_flagged = rsvp(false);
        not_flagged.plus_one_email = Some("".to_string());
        assert!(not_flagged.validate().is_ok());
    }

    #[test]
    fn test_submission_drops_plus_one_unless_flagged() {
        assert!(rsvp(false).into_submission().plus_one.is_none());

        let submission = rsvp(true).into_submission();
        assert!(submission.has_plus_one);
        assert_eq!(submission.plus_one.unwrap().name, "Grace");
    }

    #[test]
    fn test_padded_short_name_is_rejected() {
        let mut padded = rsvp(false);
        padded.name = "  A  ".to_string();

        let errors = padded.validate().unwrap_err();
        assert_eq!(describe_errors(&errors), "Name must be at least 2 characters");

        padded.name = " Al ".to_string();
        assert!(padded.validate().is_ok());
    }

    #[test]
    fn test_errors_are_described_without_values() {
        let mut invalid = rsvp(false);
        invalid.email = "not an email".to_string();
        invalid.other_dietary_preference = Some("x".repeat(600));

        let message = describe_errors(&invalid.validate().unwrap_err());
        assert_eq!(
            message,
            "Email must be valid. other_dietary_preference is invalid"
        );
    }

    #[test]
    fn test_blank_test_email_counts_as_absent() {
        let broadcast: BroadcastSchema = serde_json::from_value(serde_json::json!({
            "subject": "Hi",
            "body": "<p>Hi</p>",
            "testEmail": "  ",
        }))
        .unwrap();

        assert!(broadcast.test_email.is_none());
        assert!(broadcast.validate().is_ok());

        let missing: BroadcastSchema = serde_json::from_value(serde_json::json!({
            "subject": "Hi",
            "body": "<p>Hi</p>",
        }))
        .unwrap();
        assert!(missing.test_email.is_none());
    }

    #[test]
    fn test_broadcast_test_email_must_be_valid() {
        let broadcast = BroadcastSchema {
            subject: "Hi".to_string(),
            body: "<p>Hi</p>".to_string(),
            test_email: Some("not an email".to_string()),
        };

        assert!(broadcast.validate().is_err());
    }
}
