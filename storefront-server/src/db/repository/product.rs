//! Product Repository
//!
//! product_id UNIQUE 索引保证唯一，重复创建在存储层失败。

use super::{BaseRepository, RepoError, RepoResult};
use shared::models::Product;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, product: Product) -> RepoResult<Product> {
        let product_id = product.product_id.clone();
        let result: Result<Vec<Product>, surrealdb::Error> = async {
            let created = self
                .base
                .db()
                .query("CREATE product CONTENT $product RETURN AFTER")
                .bind(("product", product))
                .await?
                .check()?
                .take(0)?;
            Ok(created)
        }
        .await;

        match result {
            Ok(mut rows) => rows
                .pop()
                .ok_or_else(|| RepoError::Database("Create returned no row".into())),
            Err(e) => {
                let msg = e.to_string();
                if RepoError::is_duplicate_violation(&msg) {
                    Err(RepoError::Duplicate(format!("Product {product_id}")))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    pub async fn find_by_product_id(&self, product_id: &str) -> RepoResult<Option<Product>> {
        let mut rows: Vec<Product> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE product_id = $product_id LIMIT 1")
            .bind(("product_id", product_id.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    pub async fn find_all(&self) -> RepoResult<Vec<Product>> {
        let rows: Vec<Product> = self
            .base
            .db()
            .query("SELECT * FROM product ORDER BY created_at DESC")
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows)
    }

    /// 启用/停用商品，返回更新后的记录 (不存在时 None)
    pub async fn set_active(
        &self,
        product_id: &str,
        is_active: bool,
        now: i64,
    ) -> RepoResult<Option<Product>> {
        let mut rows: Vec<Product> = self
            .base
            .db()
            .query(
                "UPDATE product SET is_active = $is_active, updated_at = $now \
                 WHERE product_id = $product_id RETURN AFTER",
            )
            .bind(("product_id", product_id.to_string()))
            .bind(("is_active", is_active))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }
}
