use std::sync::Arc;

use domains::{AppError, Category, CategoryRepo, Clock, Result};
use tracing::info;
use uuid::Uuid;

use crate::slugs::unique_slug;

pub struct CategoryService {
    categories: Arc<dyn CategoryRepo>,
    clock: Arc<dyn Clock>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { categories, clock }
    }

    /// Names are unique as typed; slugs stay unique when names transliterate
    /// to the same ASCII ("şeker" / "seker").
    pub async fn create_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("category name cannot be empty"));
        }

        let categories = &self.categories;
        let slug = unique_slug(name, |candidate| async move {
            categories.category_slug_taken(&candidate).await
        })
        .await?;

        let category = Category {
            id: Uuid::now_v7(),
            name: name.to_string(),
            slug,
            description: description.map(str::to_string),
            created_at: self.clock.now(),
        };
        self.categories.insert_category(&category).await?;
        info!(category = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        self.categories.list_categories().await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.categories.find_category_by_slug(slug).await
    }
}
