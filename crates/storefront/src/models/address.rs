//! Shipping address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use instabasket_core::{AddressId, Email, UserId};

/// A stored shipping address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

/// A validated address ready to insert. Every field is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

/// Errors in a submitted address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressInputError {
    #[error("Please fill all address fields")]
    MissingField(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,
}

/// Address fields as submitted by the shopper.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "zipcode")]
    pub zip_code: String,
    pub country: String,
}

impl AddressInput {
    /// Trim every field, require all of them and normalize the email.
    ///
    /// # Errors
    ///
    /// Returns `AddressInputError::MissingField` naming the first blank field,
    /// or `AddressInputError::InvalidEmail`.
    pub fn validate(self) -> Result<NewAddress, AddressInputError> {
        fn required(value: String, field: &'static str) -> Result<String, AddressInputError> {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(AddressInputError::MissingField(field))
            } else {
                Ok(value)
            }
        }

        let email = required(self.email, "email")?;
        let email = Email::parse(&email).map_err(|_| AddressInputError::InvalidEmail)?;

        Ok(NewAddress {
            first_name: required(self.first_name, "firstName")?,
            last_name: required(self.last_name, "lastName")?,
            email: email.into_inner(),
            phone: required(self.phone, "phone")?,
            street: required(self.street, "street")?,
            city: required(self.city, "city")?,
            state: required(self.state, "state")?,
            zipcode: required(self.zip_code, "zipCode")?,
            country: required(self.country, "country")?,
        })
    }
}
