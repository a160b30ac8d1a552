//! Order repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use instabasket_core::{AddressId, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::{AddressRepository, RepositoryError, count_from_db, count_to_db};
use crate::models::{NewOrder, Order, OrderItem, OrderLine, OrderView, ProductSummary};

const ORDER_COLUMNS: &str = "id, user_id, address_id, amount, payment_method, is_paid, status, \
     stripe_session_id, created_at, updated_at";

/// Orders a shopper or seller should see: cash on delivery, or paid online.
const VISIBLE: &str = "(payment_method = 'cod' OR is_paid)";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    address_id: AddressId,
    amount: Decimal,
    payment_method: PaymentMethod,
    is_paid: bool,
    status: OrderStatus,
    stripe_session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            address_id: self.address_id,
            items,
            amount: self.amount,
            payment_method: self.payment_method,
            is_paid: self.is_paid,
            status: self.status,
            stripe_session_id: self.stripe_session_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    product_id: ProductId,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            quantity: count_from_db(row.quantity, "quantity")?,
            unit_price: row.unit_price,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemWithProductRow {
    order_id: OrderId,
    quantity: i32,
    unit_price: Decimal,
    #[sqlx(flatten)]
    product: ProductSummary,
}

/// What the payment webhook needs after marking an order paid.
#[derive(Debug, Clone)]
pub struct PaidOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is
    /// stored in that case.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO storefront.customer_order \
                 (user_id, address_id, amount, payment_method, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.user_id)
            .bind(order.address_id)
            .bind(order.amount)
            .bind(order.payment_method)
            .bind(order.status)
            .fetch_one(&mut *tx)
            .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO storefront.order_item (order_id, product_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(count_to_db(item.quantity, "quantity")?)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into_order(order.items.clone()))
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        let items = load_items(&mut *conn, id).await?;
        Ok(Some(row.into_order(items)))
    }

    /// Record the Stripe checkout session created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order no longer exists.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn attach_checkout_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.customer_order SET stripe_session_id = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(session_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete an order if it has not been paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_unpaid(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        delete_unpaid(&mut *conn, id).await
    }

    /// Move an order from `from` to `to`, only if it is still in `from`.
    ///
    /// Returns `false` if the order changed concurrently or does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.customer_order SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// A shopper's visible orders, newest first, with products and address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderView>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order \
             WHERE user_id = $1 AND {VISIBLE} ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        self.populate(rows).await
    }

    /// Every visible order, newest first, with products and address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<OrderView>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order \
             WHERE {VISIBLE} ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(self.pool)
            .await?;
        self.populate(rows).await
    }

    async fn populate(&self, rows: Vec<OrderRow>) -> Result<Vec<OrderView>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, ItemWithProductRow>(
            "SELECT oi.order_id, oi.quantity, oi.unit_price, \
                    p.id, p.name, p.category, p.images, p.offer_price \
             FROM storefront.order_item oi \
             JOIN storefront.product p ON p.id = oi.product_id \
             WHERE oi.order_id = ANY($1) \
             ORDER BY oi.order_id, p.id",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in item_rows {
            lines.entry(row.order_id).or_default().push(OrderLine {
                quantity: count_from_db(row.quantity, "quantity")?,
                unit_price: row.unit_price,
                product: row.product,
            });
        }

        let mut address_ids: Vec<AddressId> = rows.iter().map(|r| r.address_id).collect();
        address_ids.sort_unstable();
        address_ids.dedup();
        let addresses: HashMap<AddressId, _> = AddressRepository::new(self.pool)
            .get_many(&address_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        rows.into_iter()
            .map(|row| {
                let address = addresses.get(&row.address_id).cloned().ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "order {} references missing address {}",
                        row.id, row.address_id
                    ))
                })?;

                Ok(OrderView {
                    items: lines.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    user_id: row.user_id,
                    amount: row.amount,
                    address,
                    payment_method: row.payment_method,
                    is_paid: row.is_paid,
                    status: row.status,
                    status_label: row.status.label(),
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect()
    }
}

async fn load_items(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT product_id, quantity, unit_price FROM storefront.order_item \
         WHERE order_id = $1 ORDER BY product_id",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(OrderItem::try_from).collect()
}

/// Mark an unpaid order paid and `placed`.
///
/// Returns `None` if the order does not exist or was already paid, so a
/// redelivered payment event changes nothing.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<PaidOrder>, RepositoryError> {
    let user_id: Option<UserId> = sqlx::query_scalar(
        "UPDATE storefront.customer_order SET is_paid = TRUE, status = $2 \
         WHERE id = $1 AND is_paid = FALSE RETURNING user_id",
    )
    .bind(id)
    .bind(OrderStatus::Placed)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let items = load_items(conn, id).await?;
    Ok(Some(PaidOrder { user_id, items }))
}

/// Delete an order if it has not been paid. Its lines cascade.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete_unpaid(conn: &mut PgConnection, id: OrderId) -> Result<bool, RepositoryError> {
    let result =
        sqlx::query("DELETE FROM storefront.customer_order WHERE id = $1 AND is_paid = FALSE")
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}
