//! Club store: carts and checkout.

pub mod cart;
pub mod checkout;

pub use cart::{add_to_cart, get_cart, update_cart_item};
pub use checkout::{create_order, list_orders};

use crate::points;

/// Most units of one product a cart line may hold
pub const MAX_CART_QUANTITY: i64 = 99;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("product not found: {0}")]
    ProductNotFound(String),
    #[error("quantity must be at least {min}, got {got}")]
    InvalidQuantity { min: i64, got: i64 },
    #[error("quantity cannot exceed {max}, cart would hold {got}")]
    QuantityLimit { max: i64, got: i64 },
    #[error("cart total is too large")]
    TotalOverflow,
    #[error("cart is empty")]
    EmptyCart,
    #[error("insufficient points: {available} available, {requested} required")]
    InsufficientPoints { available: i64, requested: i64 },
    #[error("not enough stock for {name}")]
    StockUnavailable { product_id: String, name: String },
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<points::Error> for Error {
    fn from(err: points::Error) -> Self {
        match err {
            points::Error::InsufficientPoints {
                available,
                requested,
            } => Error::InsufficientPoints {
                available,
                requested,
            },
            points::Error::UserNotFound(id) => Error::UserNotFound(id),
            points::Error::Database(e) => Error::Database(e),
            // Checkout never debits a non-positive amount
            points::Error::InvalidAmount(amount) => Error::InsufficientPoints {
                available: 0,
                requested: amount,
            },
        }
    }
}
