//! Stripe webhook processing.
//!
//! Every event is applied inside one transaction together with its row in
//! `processed_webhook_event`. A redelivered event finds its id already
//! recorded and changes nothing; a failed one rolls back and is retried by
//! Stripe.

use sqlx::PgPool;
use thiserror::Error;

use instabasket_core::OrderId;

use crate::db::{RepositoryError, orders, products, users, webhook_events};
use crate::services::stripe::{CheckoutSession, Event, PaymentIntent, StripeClient, StripeError};

/// Payment completed for a checkout session.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Checkout session expired without payment.
pub const CHECKOUT_SESSION_EXPIRED: &str = "checkout.session.expired";

/// Payment attempt failed.
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// Errors that can occur while applying a webhook event.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The event object does not have the expected shape.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// Looking up the order through the Stripe API failed.
    #[error("payment provider error: {0}")]
    Stripe(#[from] StripeError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for WebhookError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// What happened to a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// First delivery; the event was applied.
    Processed,
    /// The event id was seen before; nothing changed.
    Duplicate,
}

/// The state change an event asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    MarkPaid(OrderId),
    DiscardUnpaid(OrderId),
    Ignore,
}

/// Applies verified webhook events.
pub struct WebhookService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
}

impl<'a> WebhookService<'a> {
    /// Create a new webhook service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient) -> Self {
        Self { pool, stripe }
    }

    /// Apply an event exactly once.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Malformed` if the event object cannot be read.
    /// Returns `WebhookError::Stripe` if the order lookup through Stripe
    /// fails, and `WebhookError::Repository` if a query fails. Nothing is
    /// recorded in either case.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle(&self, event: &Event) -> Result<WebhookOutcome, WebhookError> {
        let action = self.action_for(event).await?;

        let mut tx = self.pool.begin().await?;

        if !webhook_events::record(&mut *tx, &event.id, &event.event_type).await? {
            tracing::info!("Duplicate webhook event ignored");
            return Ok(WebhookOutcome::Duplicate);
        }

        match action {
            Action::MarkPaid(order_id) => {
                let Some(paid) = orders::mark_paid(&mut *tx, order_id).await? else {
                    tracing::info!(order_id = %order_id, "Order already paid or missing");
                    tx.commit().await?;
                    return Ok(WebhookOutcome::Processed);
                };

                for item in &paid.items {
                    let taken =
                        products::decrement_stock(&mut *tx, item.product_id, item.quantity).await?;
                    if !taken {
                        tracing::warn!(
                            order_id = %order_id,
                            product_id = %item.product_id,
                            quantity = item.quantity,
                            "Insufficient stock for paid order line"
                        );
                    }
                }

                users::clear_cart(&mut *tx, paid.user_id).await?;
                tracing::info!(order_id = %order_id, user_id = %paid.user_id, "Order paid");
            }
            Action::DiscardUnpaid(order_id) => {
                if orders::delete_unpaid(&mut *tx, order_id).await? {
                    tracing::info!(order_id = %order_id, "Unpaid order removed");
                }
            }
            Action::Ignore => {}
        }

        tx.commit().await?;
        Ok(WebhookOutcome::Processed)
    }

    async fn action_for(&self, event: &Event) -> Result<Action, WebhookError> {
        match event.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_EXPIRED => {
                let session: CheckoutSession = event.object().map_err(malformed)?;
                let Some(order_id) = session.order_id() else {
                    tracing::warn!(session_id = %session.id, "Checkout session without order id");
                    return Ok(Action::Ignore);
                };

                if event.event_type == CHECKOUT_SESSION_COMPLETED {
                    Ok(Action::MarkPaid(order_id))
                } else {
                    Ok(Action::DiscardUnpaid(order_id))
                }
            }
            PAYMENT_INTENT_FAILED => {
                let intent: PaymentIntent = event.object().map_err(malformed)?;
                let order_id = match intent.order_id() {
                    Some(id) => Some(id),
                    None => self
                        .stripe
                        .find_session_by_payment_intent(&intent.id)
                        .await?
                        .and_then(|session| session.order_id()),
                };

                Ok(order_id.map_or_else(
                    || {
                        tracing::warn!(payment_intent = %intent.id, "Failed payment without order id");
                        Action::Ignore
                    },
                    Action::DiscardUnpaid,
                ))
            }
            other => {
                tracing::warn!(event_type = %other, "Unhandled webhook event type");
                Ok(Action::Ignore)
            }
        }
    }
}

fn malformed(err: StripeError) -> WebhookError {
    WebhookError::Malformed(err.to_string())
}
