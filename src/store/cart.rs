//! Per-member shopping carts.

use sqlx::SqliteConnection;

use super::{Error, MAX_CART_QUANTITY};
use crate::db::{now_timestamp, Cart, CartLine};

async fn ensure_product(conn: &mut SqliteConnection, product_id: &str) -> Result<(), Error> {
    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    match active {
        Some(true) => Ok(()),
        _ => Err(Error::ProductNotFound(product_id.to_string())),
    }
}

/// Add `quantity` units of a product, on top of what is already in the cart
pub async fn add_to_cart(
    conn: &mut SqliteConnection,
    user_id: &str,
    product_id: &str,
    quantity: i64,
) -> Result<Cart, Error> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity {
            min: 1,
            got: quantity,
        });
    }
    if quantity > MAX_CART_QUANTITY {
        return Err(Error::QuantityLimit {
            max: MAX_CART_QUANTITY,
            got: quantity,
        });
    }
    ensure_product(&mut *conn, product_id).await?;

    let now = now_timestamp();
    let result = sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, product_id) DO UPDATE SET
            quantity = cart_items.quantity + excluded.quantity,
            updated_at = excluded.updated_at
        WHERE cart_items.quantity + excluded.quantity <= ?
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(&now)
    .bind(&now)
    .bind(MAX_CART_QUANTITY)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let existing: i64 = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = ? AND product_id = ?",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or_default();
        return Err(Error::QuantityLimit {
            max: MAX_CART_QUANTITY,
            got: existing.saturating_add(quantity),
        });
    }

    get_cart(conn, user_id).await
}

/// Set the quantity of a cart line. Zero removes it.
pub async fn update_cart_item(
    conn: &mut SqliteConnection,
    user_id: &str,
    product_id: &str,
    quantity: i64,
) -> Result<Cart, Error> {
    if quantity < 0 {
        return Err(Error::InvalidQuantity {
            min: 0,
            got: quantity,
        });
    }

    if quantity > MAX_CART_QUANTITY {
        return Err(Error::QuantityLimit {
            max: MAX_CART_QUANTITY,
            got: quantity,
        });
    }

    if quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ?")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        return get_cart(conn, user_id).await;
    }

    ensure_product(&mut *conn, product_id).await?;

    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, product_id) DO UPDATE SET
            quantity = excluded.quantity,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    get_cart(conn, user_id).await
}

pub async fn get_cart(conn: &mut SqliteConnection, user_id: &str) -> Result<Cart, Error> {
    let lines = load_lines(conn, user_id).await?;
    Cart::from_lines(lines).ok_or(Error::TotalOverflow)
}

/// Cart lines whose product is still listed. Rows for withdrawn products
/// stay in the table but are neither shown nor sold.
pub(super) async fn load_lines(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<CartLine>, Error> {
    let lines = sqlx::query_as(
        r#"
        SELECT c.product_id, p.name, c.quantity, p.current_price, p.points_required,
               p.points_discount, p.stock
        FROM cart_items c
        JOIN products p ON p.id = c.product_id
        WHERE c.user_id = ? AND p.is_active = 1
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;
    use crate::store::test_support::{insert_product, insert_user};

    #[tokio::test]
    async fn test_add_accumulates_quantity() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1", 0).await;
        let bottle = insert_product(&db, "Bottle", 1_500, 50, 2, 10).await;
        let mut conn = db.acquire().await.unwrap();

        add_to_cart(&mut conn, "u1", &bottle.id, 1).await.unwrap();
        let cart = add_to_cart(&mut conn, "u1", &bottle.id, 2).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.subtotal, 4_500);
        assert_eq!(cart.total_points_required, 150);
        assert_eq!(cart.total_points_discount, 6);
    }

    #[tokio::test]
    async fn test_update_sets_and_removes() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1", 0).await;
        let bottle = insert_product(&db, "Bottle", 1_500, 0, 0, 10).await;
        let cap = insert_product(&db, "Cap", 2_000, 0, 0, 10).await;
        let mut conn = db.acquire().await.unwrap();

        add_to_cart(&mut conn, "u1", &bottle.id, 4).await.unwrap();
        add_to_cart(&mut conn, "u1", &cap.id, 1).await.unwrap();

        let cart = update_cart_item(&mut conn, "u1", &bottle.id, 2).await.unwrap();
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, 5_000);

        let cart = update_cart_item(&mut conn, "u1", &bottle.id, 0).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, cap.id);
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1", 0).await;
        let bottle = insert_product(&db, "Bottle", 1_500, 0, 0, 10).await;
        let mut conn = db.acquire().await.unwrap();

        assert!(matches!(
            add_to_cart(&mut conn, "u1", &bottle.id, 0).await,
            Err(Error::InvalidQuantity { min: 1, got: 0 })
        ));
        assert!(matches!(
            update_cart_item(&mut conn, "u1", &bottle.id, -1).await,
            Err(Error::InvalidQuantity { min: 0, got: -1 })
        ));
        assert!(matches!(
            add_to_cart(&mut conn, "u1", "missing", 1).await,
            Err(Error::ProductNotFound(_))
        ));

        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(&bottle.id)
            .execute(&mut *conn)
            .await
            .unwrap();
        assert!(matches!(
            add_to_cart(&mut conn, "u1", &bottle.id, 1).await,
            Err(Error::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_adds_stop_at_line_limit() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1", 0).await;
        let gel = insert_product(&db, "Energy gel", 250, 0, 0, 1_000).await;
        let mut conn = db.acquire().await.unwrap();

        let cart = add_to_cart(&mut conn, "u1", &gel.id, MAX_CART_QUANTITY)
            .await
            .unwrap();
        assert_eq!(cart.items[0].quantity, MAX_CART_QUANTITY);

        for _ in 0..4 {
            let err = add_to_cart(&mut conn, "u1", &gel.id, MAX_CART_QUANTITY)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::QuantityLimit { max: MAX_CART_QUANTITY, got } if got == 2 * MAX_CART_QUANTITY
            ));
        }
        assert!(matches!(
            add_to_cart(&mut conn, "u1", &gel.id, 1).await,
            Err(Error::QuantityLimit { got: 100, .. })
        ));
        assert!(matches!(
            update_cart_item(&mut conn, "u1", &gel.id, MAX_CART_QUANTITY + 1).await,
            Err(Error::QuantityLimit { .. })
        ));

        let cart = get_cart(&mut conn, "u1").await.unwrap();
        assert_eq!(cart.items[0].quantity, MAX_CART_QUANTITY);
        assert_eq!(cart.subtotal, 250 * MAX_CART_QUANTITY);
    }

    #[tokio::test]
    async fn test_oversized_total_is_an_error() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1", 0).await;
        let bike = insert_product(&db, "Gold bike", i64::MAX / 2 + 1, 0, 0, 10).await;
        let mut conn = db.acquire().await.unwrap();

        let cart = add_to_cart(&mut conn, "u1", &bike.id, 1).await.unwrap();
        assert_eq!(cart.subtotal, i64::MAX / 2 + 1);
        assert!(matches!(
            add_to_cart(&mut conn, "u1", &bike.id, 1).await,
            Err(Error::TotalOverflow)
        ));
        assert!(matches!(
            get_cart(&mut conn, "u1").await,
            Err(Error::TotalOverflow)
        ));
    }

    #[tokio::test]
    async fn test_withdrawn_products_leave_the_cart() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1", 0).await;
        let bottle = insert_product(&db, "Bottle", 1_500, 0, 0, 10).await;
        let cap = insert_product(&db, "Cap", 2_000, 0, 0, 10).await;
        let mut conn = db.acquire().await.unwrap();

        add_to_cart(&mut conn, "u1", &bottle.id, 2).await.unwrap();
        add_to_cart(&mut conn, "u1", &cap.id, 1).await.unwrap();
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(&bottle.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let cart = get_cart(&mut conn, "u1").await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, cap.id);
        assert_eq!(cart.subtotal, 2_000);
    }
}
