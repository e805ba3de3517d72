use async_trait::async_trait;
use domains::{Category, CategoryRepo, Result};
use sqlx::sqlite::SqliteRow;

use super::{col, db_err, SqliteStore};

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: col(row, "id")?,
        name: col(row, "name")?,
        slug: col(row, "slug")?,
        description: col(row, "description")?,
        created_at: col(row, "created_at")?,
    })
}

#[async_trait]
impl CategoryRepo for SqliteStore {
    async fn insert_category(&self, category: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, slug, description, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(category.id)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(category.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(category_from_row)
            .collect()
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        sqlx::query("SELECT * FROM categories WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(category_from_row)
            .transpose()
    }

    async fn category_slug_taken(&self, slug: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE slug = ?)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}
