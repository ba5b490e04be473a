//! Product models for the club store and member marketplace.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCondition {
    New,
    LikeNew,
    Good,
    Fair,
}

impl ProductCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCondition::New => "NEW",
            ProductCondition::LikeNew => "LIKE_NEW",
            ProductCondition::Good => "GOOD",
            ProductCondition::Fair => "FAIR",
        }
    }
}

impl std::fmt::Display for ProductCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product row. Prices are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    /// `None` for items sold by the club itself
    pub seller_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub condition: String,
    pub current_price: i64,
    /// Points debited per unit when paying with points
    pub points_required: i64,
    /// Discount points credited per unit when paying with points
    pub points_discount: i64,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Points,
}

impl ProductSort {
    fn order_by(&self) -> &'static str {
        match self {
            ProductSort::Newest => " ORDER BY created_at DESC, id ASC",
            ProductSort::PriceAsc => " ORDER BY current_price ASC, id ASC",
            ProductSort::PriceDesc => " ORDER BY current_price DESC, id ASC",
            ProductSort::Points => " ORDER BY points_required ASC, id ASC",
        }
    }
}

/// Marketplace listing filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub condition: Option<ProductCondition>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    #[serde(default)]
    pub sort_by: ProductSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub condition: Option<ProductCondition>,
    pub current_price: i64,
    #[serde(default)]
    pub points_required: i64,
    #[serde(default)]
    pub points_discount: i64,
    #[serde(default = "default_stock")]
    pub stock: i64,
}

fn default_stock() -> i64 {
    1
}

impl Product {
    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert a product listed by `seller_id` (or the club when `None`)
    pub async fn create(
        db: &SqlitePool,
        seller_id: Option<&str>,
        req: &CreateProductRequest,
    ) -> Result<Product, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = super::now_timestamp();
        let condition = req.condition.unwrap_or(ProductCondition::New);

        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, category, condition,
                                  current_price, points_required, points_discount, stock,
                                  is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(seller_id)
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.category.trim())
        .bind(condition.as_str())
        .bind(req.current_price)
        .bind(req.points_required)
        .bind(req.points_discount)
        .bind(req.stock)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(&id)
            .fetch_one(db)
            .await
    }

    /// List active products matching the query filters
    pub async fn search(db: &SqlitePool, query: &ProductQuery) -> Result<ProductPage, sqlx::Error> {
        let limit = super::clamp_limit(query.limit);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut count_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM products WHERE is_active = 1");
        push_filters(&mut count_builder, query);
        let total: i64 = count_builder.build_query_scalar().fetch_one(db).await?;

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM products WHERE is_active = 1");
        push_filters(&mut builder, query);
        builder.push(query.sort_by.order_by());
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        let items = builder.build_query_as::<Product>().fetch_all(db).await?;

        Ok(ProductPage {
            items,
            total,
            limit,
            offset,
        })
    }
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &'a ProductQuery) {
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(condition) = query.condition {
        builder.push(" AND condition = ").push_bind(condition.as_str());
    }
    if let Some(min) = query.min_price {
        builder.push(" AND current_price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND current_price <= ").push_bind(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    fn listing(name: &str, category: &str, price: i64) -> CreateProductRequest {
        CreateProductRequest {
            name: name.to_string(),
            description: Some(format!("{} in great shape", name)),
            category: category.to_string(),
            condition: None,
            current_price: price,
            points_required: 0,
            points_discount: 0,
            stock: 3,
        }
    }

    #[tokio::test]
    async fn test_search_filters_and_sorts() {
        let db = init_in_memory().await.unwrap();
        Product::create(&db, None, &listing("Wetsuit", "swim", 25_000)).await.unwrap();
        Product::create(&db, None, &listing("Goggles", "swim", 2_500)).await.unwrap();
        Product::create(&db, None, &listing("Aero helmet", "bike", 18_000)).await.unwrap();

        let page = Product::search(
            &db,
            &ProductQuery {
                category: Some("swim".to_string()),
                sort_by: ProductSort::PriceAsc,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Goggles");
        assert_eq!(page.items[1].name, "Wetsuit");

        let page = Product::search(
            &db,
            &ProductQuery {
                search: Some("helmet".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].category, "bike");

        let page = Product::search(
            &db,
            &ProductQuery {
                min_price: Some(3_000),
                max_price: Some(20_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Aero helmet");
    }

    #[tokio::test]
    async fn test_search_paginates_and_hides_inactive() {
        let db = init_in_memory().await.unwrap();
        for i in 0..5 {
            Product::create(&db, None, &listing(&format!("Bottle {}", i), "gear", 1_000 + i))
                .await
                .unwrap();
        }
        let hidden = Product::create(&db, None, &listing("Old bottle", "gear", 10))
            .await
            .unwrap();
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(&hidden.id)
            .execute(&db)
            .await
            .unwrap();

        let page = Product::search(
            &db,
            &ProductQuery {
                sort_by: ProductSort::PriceDesc,
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].current_price, 1_003);
        assert_eq!(page.items[1].current_price, 1_002);
    }
}
