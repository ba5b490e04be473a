//! Checkout: turning a cart into an order.
//!
//! The whole conversion runs in one transaction. Stock is decremented with a
//! guarded update and points are debited through the ledger, so a failure at
//! any step leaves carts, stock and balances as they were.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::{cart::load_lines, Error};
use crate::db::{
    now_timestamp, Cart, CreateOrderRequest, Order, OrderItem, OrderStatus, OrderWithItems,
};
use crate::points;

/// Amounts charged for a cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub points_used: i64,
    /// Discount in minor units, never larger than the subtotal
    pub discount: i64,
    pub total_amount: i64,
}

impl OrderTotals {
    /// A discount too large to represent is capped at the subtotal like any other.
    pub fn for_cart(cart: &Cart, use_points: bool, points_discount_unit: i64) -> Self {
        if !use_points {
            return Self {
                subtotal: cart.subtotal,
                points_used: 0,
                discount: 0,
                total_amount: cart.subtotal,
            };
        }

        let discount = cart
            .total_points_discount
            .checked_mul(points_discount_unit)
            .map_or(cart.subtotal, |d| d.min(cart.subtotal));
        Self {
            subtotal: cart.subtotal,
            points_used: cart.total_points_required,
            discount,
            total_amount: cart.subtotal - discount,
        }
    }
}

/// Place an order for everything in the member's cart
pub async fn create_order(
    db: &SqlitePool,
    user_id: &str,
    req: &CreateOrderRequest,
    points_discount_unit: i64,
) -> Result<OrderWithItems, Error> {
    let mut tx = db.begin().await?;
    let now = now_timestamp();

    // Touching the cart takes the write lock and tells us whether it is empty
    let touched = sqlx::query("UPDATE cart_items SET updated_at = ? WHERE user_id = ?")
        .bind(&now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::EmptyCart);
    }

    let lines = load_lines(&mut tx, user_id).await?;
    let cart = Cart::from_lines(lines).ok_or(Error::TotalOverflow)?;
    if cart.is_empty() {
        return Err(Error::EmptyCart);
    }

    let totals = OrderTotals::for_cart(&cart, req.use_points, points_discount_unit);
    if totals.points_used > 0 {
        let available = points::get_balance(&mut tx, user_id).await?;
        if available < totals.points_used {
            return Err(Error::InsufficientPoints {
                available,
                requested: totals.points_used,
            });
        }
    }

    let order_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, status, subtotal, total_amount, points_used,
                            points_discount_applied, shipping_address, payment_method, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&order_id)
    .bind(user_id)
    .bind(OrderStatus::Pending.as_str())
    .bind(totals.subtotal)
    .bind(totals.total_amount)
    .bind(totals.points_used)
    .bind(totals.discount)
    .bind(req.shipping_address.trim())
    .bind(req.payment_method.trim())
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for line in &cart.items {
        // Line amounts are bounded by the cart totals computed above
        let (line_points, line_discount) = if req.use_points {
            (
                line.line_points_required().unwrap_or_default(),
                line.line_points_discount().unwrap_or_default(),
            )
        } else {
            (0, 0)
        };

        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, product_name, quantity,
                                     unit_price, points_used, points_discount)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&order_id)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.current_price)
        .bind(line_points)
        .bind(line_discount)
        .execute(&mut *tx)
        .await?;

        let decremented = sqlx::query(
            "UPDATE products SET stock = stock - ?, updated_at = ? WHERE id = ? AND stock >= ?",
        )
        .bind(line.quantity)
        .bind(&now)
        .bind(&line.product_id)
        .bind(line.quantity)
        .execute(&mut *tx)
        .await?;
        if decremented.rows_affected() == 0 {
            return Err(Error::StockUnavailable {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
            });
        }
    }

    if totals.points_used > 0 {
        points::spend_points(
            &mut tx,
            user_id,
            totals.points_used,
            &format!("Store order {}", order_id),
            Some(&order_id),
        )
        .await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let order = load_order(&mut tx, &order_id).await?;
    tx.commit().await?;

    info!(
        order_id = %order_id,
        user_id = %user_id,
        total_amount = totals.total_amount,
        points_used = totals.points_used,
        "Order placed"
    );

    Ok(order)
}

/// A member's orders with their items, newest first
pub async fn list_orders(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<OrderWithItems>, Error> {
    let orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC, id ASC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        let items = load_items(&mut *conn, &order.id).await?;
        result.push(OrderWithItems { order, items });
    }
    Ok(result)
}

async fn load_order(conn: &mut SqliteConnection, order_id: &str) -> Result<OrderWithItems, Error> {
    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await?;
    let items = load_items(conn, order_id).await?;
    Ok(OrderWithItems { order, items })
}

async fn load_items(conn: &mut SqliteConnection, order_id: &str) -> Result<Vec<OrderItem>, Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = ? ORDER BY rowid")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}
