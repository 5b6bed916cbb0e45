use std::collections::HashSet;

use thiserror::Error;

use crate::{util::non_blank, RsvpData};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipientError {
    #[error("No recipients found")]
    NoRecipients,
}

/// Turns the stored RSVPs into the list of addresses a broadcast goes to.
///
/// If `override_email` is given, it is the only recipient and the RSVPs aren't
/// looked at. Otherwise every guest's email is included, along with their plus
/// one's, without duplicates and in order of first appearance.
pub fn resolve_recipients(
    rsvps: &[RsvpData],
    override_email: Option<&str>,
) -> Result<Vec<String>, RecipientError> {
    if let Some(email) = non_blank(override_email.map(str::to_string)) {
        return Ok(vec![email]);
    }

    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    let emails = rsvps.iter().flat_map(|rsvp| {
        let plus_one = rsvp.plus_one.as_ref().map(|p| p.email.as_str());
        [Some(rsvp.guest.email.as_str()), plus_one]
    });

    for email in emails.flatten().filter(|e| !e.is_empty()) {
        if seen.insert(email) {
            recipients.push(email.to_string());
        }
    }

    if recipients.is_empty() {
        return Err(RecipientError::NoRecipients);
    }

    Ok(recipients)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::GuestData;

    fn guest(email: &str) -> GuestData {
        GuestData {
            name: "Guest".to_string(),
            email: email.to_string(),
            dietary_preferences: BTreeSet::new(),
            other_dietary_preference: None,
        }
    }

    fn rsvp(id: i32, email: &str, plus_one: Option<&str>) -> RsvpData {
        RsvpData {
            id,
            user_id: id,
            guest: guest(email),
            plus_one: plus_one.map(guest),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_collects_guests_and_plus_ones() {
        let rsvps = vec![
            rsvp(1, "a@example.com", Some("b@example.com")),
            rsvp(2, "c@example.com", None),
        ];

        assert_eq!(
            resolve_recipients(&rsvps, None).unwrap(),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn test_deduplicates_in_first_occurrence_order() {
        let rsvps = vec![
            rsvp(1, "a@example.com", Some("a@example.com")),
            rsvp(2, "b@example.com", Some("a@example.com")),
            rsvp(3, "c@example.com", Some("b@example.com")),
        ];

        let recipients = resolve_recipients(&rsvps, None).unwrap();
        assert_eq!(
            recipients,
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert!(recipients.len() <= rsvps.len() * 2);
    }

    #[test]
    fn test_order_of_rsvps_does_not_change_the_set() {
        let mut rsvps = vec![
            rsvp(1, "a@example.com", Some("b@example.com")),
            rsvp(2, "b@example.com", None),
            rsvp(3, "c@example.com", Some("d@example.com")),
        ];

        let forward: HashSet<_> = resolve_recipients(&rsvps, None)
            .unwrap()
            .into_iter()
            .collect();

        rsvps.reverse();
        let backward: HashSet<_> = resolve_recipients(&rsvps, None)
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 4);
    }

    #[test]
    fn test_override_replaces_everything() {
        let rsvps = vec![rsvp(1, "a@example.com", Some("b@example.com"))];

        assert_eq!(
            resolve_recipients(&rsvps, Some("test@example.com")).unwrap(),
            vec!["test@example.com"]
        );
        assert_eq!(
            resolve_recipients(&[], Some("test@example.com")).unwrap(),
            vec!["test@example.com"]
        );
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let rsvps = vec![rsvp(1, "a@example.com", None)];

        assert_eq!(
            resolve_recipients(&rsvps, Some("  ")).unwrap(),
            vec!["a@example.com"]
        );
    }

    #[test]
    fn test_no_recipients() {
        assert_eq!(
            resolve_recipients(&[], None),
            Err(RecipientError::NoRecipients)
        );
        assert_eq!(
            resolve_recipients(&[rsvp(1, "", None)], None),
            Err(RecipientError::NoRecipients)
        );
    }
}
