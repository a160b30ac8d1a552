//! Domain models for the storefront.
//!
//! These types represent validated domain objects, separate from the
//! database row types in [`crate::db`] and the request payloads in
//! [`crate::routes`]. Types that are returned to the SPA serialize with
//! camelCase field names.

pub mod address;
pub mod order;
pub mod product;
pub mod user;

pub use address::{Address, AddressInput, AddressInputError, NewAddress};
pub use order::{NewOrder, Order, OrderItem, OrderLine, OrderView};
pub use product::{NewProduct, Product, ProductInput, ProductInputError, ProductSummary, ProductView};
pub use user::{PendingUser, User};
