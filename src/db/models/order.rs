//! Cart and order models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Cart row joined with the product it refers to
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub current_price: i64,
    pub points_required: i64,
    pub points_discount: i64,
    pub stock: i64,
}

impl CartLine {
    /// Price of the line in minor units, `None` if it does not fit in an i64
    pub fn line_total(&self) -> Option<i64> {
        self.current_price.checked_mul(self.quantity)
    }

    pub fn line_points_required(&self) -> Option<i64> {
        self.points_required.checked_mul(self.quantity)
    }

    pub fn line_points_discount(&self) -> Option<i64> {
        self.points_discount.checked_mul(self.quantity)
    }
}

/// Cart lines with the totals a checkout would use
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: i64,
    pub total_points_required: i64,
    pub total_points_discount: i64,
}

impl Cart {
    /// Build a cart and its totals. Returns `None` when a total overflows.
    pub fn from_lines(items: Vec<CartLine>) -> Option<Self> {
        let mut item_count = 0i64;
        let mut subtotal = 0i64;
        let mut total_points_required = 0i64;
        let mut total_points_discount = 0i64;
        for line in &items {
            item_count = item_count.checked_add(line.quantity)?;
            subtotal = subtotal.checked_add(line.line_total()?)?;
            total_points_required = total_points_required.checked_add(line.line_points_required()?)?;
            total_points_discount = total_points_discount.checked_add(line.line_points_discount()?)?;
        }
        Some(Self {
            items,
            item_count,
            subtotal,
            total_points_required,
            total_points_discount,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub subtotal: i64,
    pub total_amount: i64,
    pub points_used: i64,
    /// Discount in minor units bought with points
    pub points_discount_applied: i64,
    pub shipping_address: String,
    pub payment_method: String,
    pub created_at: String,
}

/// Snapshot of a product at the time it was ordered
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub points_used: i64,
    pub points_discount: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    pub payment_method: String,
    #[serde(default)]
    pub use_points: bool,
}
