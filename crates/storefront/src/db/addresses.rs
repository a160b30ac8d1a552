//! Address repository.

use sqlx::PgPool;

use instabasket_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, NewAddress};

const ADDRESS_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, street, city, \
     state, zipcode, country, created_at";

/// Repository for shopper addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store an address for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.address \
                 (user_id, first_name, last_name, email, phone, street, city, state, zipcode, country) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ADDRESS_COLUMNS}"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .bind(&address.first_name)
            .bind(&address.last_name)
            .bind(&address.email)
            .bind(&address.phone)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.zipcode)
            .bind(&address.country)
            .fetch_one(self.pool)
            .await?;
        Ok(address)
    }

    /// All addresses of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE user_id = $1 ORDER BY id"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(addresses)
    }

    /// Get an address only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_owned(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(address)
    }

    /// Get addresses by id, regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[AddressId]) -> Result<Vec<Address>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(AddressId::as_i32).collect();
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = ANY($1)");
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(raw)
            .fetch_all(self.pool)
            .await?;
        Ok(addresses)
    }
}
