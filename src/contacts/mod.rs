/// Contacts: request/response shapes, persistence and birthday lookups
use crate::db::contact::Contact;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod birthdays;
pub mod store;

pub use store::ContactStore;

pub const MIN_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Validated field set written by create and update
#[derive(Debug, Clone, PartialEq)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
    pub additional_data: String,
    pub completed: bool,
}

/// Create body; `completed` defaults to false
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactInput {
    #[validate(length(min = 1, max = 25))]
    pub first_name: String,
    #[validate(length(min = 1, max = 25))]
    pub last_name: String,
    #[validate(length(min = 1, max = 50))]
    pub email: String,
    #[validate(length(min = 1, max = 50))]
    pub phone: String,
    pub birthday: NaiveDate,
    #[validate(length(min = 1, max = 50))]
    pub additional_data: String,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl From<ContactInput> for ContactFields {
    fn from(input: ContactInput) -> Self {
        Self {
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            birthday: input.birthday,
            additional_data: input.additional_data,
            completed: input.completed.unwrap_or(false),
        }
    }
}

/// Full-replacement update body; `completed` is required
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactUpdate {
    #[validate(length(min = 1, max = 25))]
    pub first_name: String,
    #[validate(length(min = 1, max = 25))]
    pub last_name: String,
    #[validate(length(min = 1, max = 50))]
    pub email: String,
    #[validate(length(min = 1, max = 50))]
    pub phone: String,
    pub birthday: NaiveDate,
    #[validate(length(min = 1, max = 50))]
    pub additional_data: String,
    pub completed: bool,
}

impl From<ContactUpdate> for ContactFields {
    fn from(update: ContactUpdate) -> Self {
        Self {
            first_name: update.first_name,
            last_name: update.last_name,
            email: update.email,
            phone: update.phone,
            birthday: update.birthday,
            additional_data: update.additional_data,
            completed: update.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
    pub additional_data: String,
    pub completed: bool,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            first_name: contact.first_name,
            last_name: contact.last_name,
            email: contact.email,
            phone: contact.phone,
            birthday: contact.birthday,
            additional_data: contact.additional_data,
            completed: contact.completed,
        }
    }
}

/// Pagination query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    /// (limit, offset) clamped to the accepted ranges
    pub fn clamped(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(MIN_PAGE_SIZE)
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_clamp() {
        assert_eq!(ListParams::default().clamped(), (10, 0));
        assert_eq!(
            ListParams {
                limit: Some(3),
                offset: Some(-5)
            }
            .clamped(),
            (10, 0)
        );
        assert_eq!(
            ListParams {
                limit: Some(10_000),
                offset: Some(20)
            }
            .clamped(),
            (500, 20)
        );
    }

    #[test]
    fn test_completed_defaults_to_false() {
        let input: ContactInput = serde_json::from_value(serde_json::json!({
            "first_name": "Peter",
            "last_name": "Parker",
            "email": "peter@example.com",
            "phone": "555-0100",
            "birthday": "2001-08-10",
            "additional_data": "friendly neighbour"
        }))
        .unwrap();

        assert!(input.validate().is_ok());
        assert!(!ContactFields::from(input).completed);
    }

    #[test]
    fn test_update_requires_completed() {
        let result = serde_json::from_value::<ContactUpdate>(serde_json::json!({
            "first_name": "Peter",
            "last_name": "Parker",
            "email": "peter@example.com",
            "phone": "555-0100",
            "birthday": "2001-08-10",
            "additional_data": "friendly neighbour"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_first_name_rejected() {
        let input = ContactInput {
            first_name: String::new(),
            last_name: "Parker".to_string(),
            email: "peter@example.com".to_string(),
            phone: "555-0100".to_string(),
            birthday: NaiveDate::from_ymd_opt(2001, 8, 10).unwrap(),
            additional_data: "note".to_string(),
            completed: None,
        };
        assert!(input.validate().is_err());
    }
}
