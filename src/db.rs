//! # Persistence Module
//!
//! Collaborator traits for the catalog, cocktails and recipe lines, and their
//! Postgres implementation over a `sqlx` pool.
//!
//! Ingredient names are unique: `create_ingredient` checks for an existing
//! entry first and the `UNIQUE(name)` constraint catches concurrent inserts
//! that slip past the check.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cocktail_model::{CatalogIngredient, CocktailRecipe, IngredientCategory, RecipeLine};

/// Persistence failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("ingredient \"{name}\" is already registered")]
    DuplicateName { name: String },
    #[error("ingredient name must not be blank")]
    BlankName,
    #[error("cocktail \"{name}\" is already registered")]
    DuplicateCocktail { name: String },
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Database(err.to_string())
    }
}

/// Authoritative ingredient catalog
#[async_trait]
pub trait IngredientCatalog: Send + Sync {
    /// Exact, case-sensitive lookup by primary name
    async fn find_ingredient_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CatalogIngredient>, DbError>;

    /// Create a non-searchable entry; fails with `DuplicateName` if the
    /// trimmed name is taken
    async fn create_ingredient(
        &self,
        name: &str,
        name_alt: Option<&str>,
        category: Option<IngredientCategory>,
    ) -> Result<CatalogIngredient, DbError>;

    /// Full catalog snapshot, ordered by name
    async fn list_ingredients(&self) -> Result<Vec<CatalogIngredient>, DbError>;
}

/// Recipe lines of a cocktail
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Replace every line of `cocktail_id` with `lines`
    async fn save_recipe_lines(
        &self,
        cocktail_id: &str,
        lines: &[RecipeLine],
    ) -> Result<(), DbError>;
}

/// Cocktail removed by `delete_cocktail`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedCocktail {
    pub id: String,
    pub slug: String,
    /// Public URL of the stored image, for the caller to remove
    pub image_url: Option<String>,
}

/// Cocktail records
#[async_trait]
pub trait CocktailStore: Send + Sync {
    async fn cocktail_name_exists(&self, name: &str) -> Result<bool, DbError>;

    /// Insert a cocktail built from an imported recipe; returns its id
    async fn insert_cocktail(
        &self,
        recipe: &CocktailRecipe,
        image_url: Option<&str>,
    ) -> Result<String, DbError>;

    /// Insert a cocktail together with its recipe lines; either both are
    /// stored or neither is
    async fn insert_cocktail_with_lines(
        &self,
        recipe: &CocktailRecipe,
        image_url: Option<&str>,
        lines: &[RecipeLine],
    ) -> Result<String, DbError>;

    /// Delete a cocktail and, by cascade, its recipe lines
    async fn delete_cocktail(&self, id: &str) -> Result<Option<DeletedCocktail>, DbError>;
}

/// Trim and validate the fields of a new catalog entry
pub fn prepare_new_ingredient(
    name: &str,
    name_alt: Option<&str>,
    category: Option<IngredientCategory>,
) -> Result<CatalogIngredient, DbError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DbError::BlankName);
    }

    let name_alt = name_alt.map(str::trim).filter(|alt| !alt.is_empty());
    Ok(CatalogIngredient::new(name, name_alt, category))
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ingredients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            name_en TEXT,
            category TEXT,
            is_searchable BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create ingredients table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS cocktails (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            name_en TEXT,
            name_alias TEXT,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            cocktail_word TEXT,
            base TEXT NOT NULL,
            technique TEXT NOT NULL,
            glass TEXT NOT NULL,
            alcohol_percentage SMALLINT NOT NULL CHECK (alcohol_percentage BETWEEN 0 AND 100),
            temperature TEXT NOT NULL,
            carbonation TEXT NOT NULL,
            color TEXT,
            variation_text TEXT,
            image_url TEXT,
            view_count INTEGER NOT NULL DEFAULT 0,
            bookmark_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create cocktails table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS recipe_items (
            id TEXT PRIMARY KEY,
            cocktail_id TEXT NOT NULL REFERENCES cocktails(id) ON DELETE CASCADE,
            ingredient_id TEXT NOT NULL REFERENCES ingredients(id),
            amount TEXT,
            sort_order INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create recipe_items table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS recipe_items_cocktail_idx
         ON recipe_items (cocktail_id, sort_order)",
    )
    .execute(pool)
    .await
    .context("Failed to create recipe_items index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn ingredient_from_row(row: &PgRow) -> Result<CatalogIngredient, sqlx::Error> {
    let category: Option<String> = row.try_get("category")?;
    let category = category.and_then(|raw| {
        let parsed = IngredientCategory::from_wire(&raw);
        if parsed.is_none() {
            warn!(category = %raw, "Ignoring unknown stored ingredient category");
        }
        parsed
    });

    Ok(CatalogIngredient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        name_alt: row.try_get("name_en")?,
        category,
        is_searchable: row.try_get("is_searchable")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

const INGREDIENT_COLUMNS: &str =
    "id, name, name_en, category, is_searchable, created_at, updated_at";

/// Insert one cocktail row under `id` on `conn`
async fn insert_cocktail_row(
    conn: &mut PgConnection,
    id: &str,
    recipe: &CocktailRecipe,
    image_url: Option<&str>,
) -> Result<(), DbError> {
    let inserted = sqlx::query(
        "INSERT INTO cocktails (
            id, name, name_en, name_alias, slug, description, cocktail_word, base, technique,
            glass, alcohol_percentage, temperature, carbonation, color, variation_text, image_url
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(id)
    .bind(&recipe.name)
    .bind(&recipe.name_en)
    .bind(&recipe.name_alias)
    .bind(&recipe.slug)
    .bind(&recipe.description)
    .bind(&recipe.cocktail_word)
    .bind(recipe.base.as_str())
    .bind(recipe.technique.as_str())
    .bind(recipe.glass.as_str())
    .bind(i16::from(recipe.alcohol_percentage))
    .bind(recipe.temperature.as_str())
    .bind(recipe.carbonation.as_str())
    .bind(recipe.color.map(|c| c.as_str()))
    .bind(&recipe.variation_text)
    .bind(image_url)
    .execute(conn)
    .await;

    match inserted {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(DbError::DuplicateCocktail {
                name: recipe.name.clone(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the recipe lines of `cocktail_id` on `conn`
async fn replace_recipe_lines(
    conn: &mut PgConnection,
    cocktail_id: &str,
    lines: &[RecipeLine],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM recipe_items WHERE cocktail_id = $1")
        .bind(cocktail_id)
        .execute(&mut *conn)
        .await?;

    for line in lines {
        sqlx::query(
            "INSERT INTO recipe_items (id, cocktail_id, ingredient_id, amount, sort_order)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(cocktail_id)
        .bind(&line.ingredient_id)
        .bind(&line.amount)
        .bind(line.sort_order)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Postgres-backed catalog, cocktail and recipe store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Expose (or hide) an ingredient in the end-user search filters
    pub async fn set_ingredient_searchable(
        &self,
        id: &str,
        searchable: bool,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE ingredients SET is_searchable = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(searchable)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Recipe lines of a cocktail in display order
    pub async fn read_recipe_lines(&self, cocktail_id: &str) -> Result<Vec<RecipeLine>, DbError> {
        let rows = sqlx::query(
            "SELECT ingredient_id, amount, sort_order FROM recipe_items
             WHERE cocktail_id = $1 ORDER BY sort_order",
        )
        .bind(cocktail_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RecipeLine {
                    ingredient_id: row.try_get("ingredient_id")?,
                    amount: row.try_get("amount")?,
                    sort_order: row.try_get("sort_order")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DbError::from)
    }
}

#[async_trait]
impl IngredientCatalog for PgStore {
    async fn find_ingredient_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CatalogIngredient>, DbError> {
        let query = format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE name = $1");
        let row = sqlx::query(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(ingredient_from_row).transpose()?)
    }

    async fn create_ingredient(
        &self,
        name: &str,
        name_alt: Option<&str>,
        category: Option<IngredientCategory>,
    ) -> Result<CatalogIngredient, DbError> {
        let ingredient = prepare_new_ingredient(name, name_alt, category)?;

        if self.find_ingredient_by_name(&ingredient.name).await?.is_some() {
            return Err(DbError::DuplicateName { name: ingredient.name });
        }

        let inserted = sqlx::query(
            "INSERT INTO ingredients
                (id, name, name_en, category, is_searchable, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&ingredient.id)
        .bind(&ingredient.name)
        .bind(&ingredient.name_alt)
        .bind(ingredient.category.map(|c| c.as_str()))
        .bind(ingredient.is_searchable)
        .bind(ingredient.created_at)
        .bind(ingredient.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!(id = %ingredient.id, name = %ingredient.name, "Ingredient created");
                Ok(ingredient)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                warn!(name = %ingredient.name, "Concurrent insert of the same ingredient name");
                Err(DbError::DuplicateName { name: ingredient.name })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_ingredients(&self) -> Result<Vec<CatalogIngredient>, DbError> {
        let query = format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients ORDER BY name");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let ingredients = rows
            .iter()
            .map(ingredient_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = ingredients.len(), "Loaded ingredient catalog");
        Ok(ingredients)
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn save_recipe_lines(
        &self,
        cocktail_id: &str,
        lines: &[RecipeLine],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        replace_recipe_lines(&mut tx, cocktail_id, lines).await?;
        tx.commit().await?;

        info!(cocktail_id, lines = lines.len(), "Recipe lines saved");
        Ok(())
    }
}

#[async_trait]
impl CocktailStore for PgStore {
    async fn cocktail_name_exists(&self, name: &str) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT id FROM cocktails WHERE name = $1")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn insert_cocktail(
        &self,
        recipe: &CocktailRecipe,
        image_url: Option<&str>,
    ) -> Result<String, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut conn = self.pool.acquire().await?;
        insert_cocktail_row(&mut conn, &id, recipe, image_url).await?;

        info!(%id, name = %recipe.name, slug = %recipe.slug, "Cocktail created");
        Ok(id)
    }

    async fn insert_cocktail_with_lines(
        &self,
        recipe: &CocktailRecipe,
        image_url: Option<&str>,
        lines: &[RecipeLine],
    ) -> Result<String, DbError> {
        let id = uuid::Uuid::new_v4().to_string();

        // Dropping the transaction on an error rolls back the cocktail row
        let mut tx = self.pool.begin().await?;
        insert_cocktail_row(&mut tx, &id, recipe, image_url).await?;
        replace_recipe_lines(&mut tx, &id, lines).await?;
        tx.commit().await?;

        info!(
            %id,
            name = %recipe.name,
            slug = %recipe.slug,
            lines = lines.len(),
            "Cocktail created with recipe lines"
        );
        Ok(id)
    }

    async fn delete_cocktail(&self, id: &str) -> Result<Option<DeletedCocktail>, DbError> {
        let row =
            sqlx::query("DELETE FROM cocktails WHERE id = $1 RETURNING id, slug, image_url")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            info!(id, "No cocktail found to delete");
            return Ok(None);
        };

        let deleted = DeletedCocktail {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            image_url: row.try_get("image_url")?,
        };
        info!(id, slug = %deleted.slug, "Cocktail deleted");
        Ok(Some(deleted))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory catalog/cocktail/recipe store recording every create call
    #[derive(Default)]
    pub struct MemoryCatalog {
        ingredients: Mutex<Vec<CatalogIngredient>>,
        create_calls: Mutex<Vec<String>>,
        cocktails: Mutex<Vec<(String, CocktailRecipe, Option<String>)>>,
        pub recipe_lines: Mutex<Vec<(String, Vec<RecipeLine>)>>,
        /// Makes every recipe line write fail while set
        pub fail_line_writes: AtomicBool,
    }

    impl MemoryCatalog {
        pub fn with_names(names: &[&str]) -> Self {
            let catalog = Self::default();
            {
                let mut ingredients = catalog.ingredients.lock().unwrap();
                for name in names {
                    ingredients.push(CatalogIngredient::new(name, None, None));
                }
            }
            catalog
        }

        pub fn with_ingredients(ingredients: Vec<CatalogIngredient>) -> Self {
            let catalog = Self::default();
            *catalog.ingredients.lock().unwrap() = ingredients;
            catalog
        }

        pub fn id_of(&self, name: &str) -> Option<String> {
            self.ingredients
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.name == name)
                .map(|i| i.id.clone())
        }

        pub fn get(&self, id: &str) -> Option<CatalogIngredient> {
            self.ingredients.lock().unwrap().iter().find(|i| i.id == id).cloned()
        }

        pub fn is_empty(&self) -> bool {
            self.ingredients.lock().unwrap().is_empty()
        }

        pub fn create_calls(&self) -> Vec<String> {
            self.create_calls.lock().unwrap().clone()
        }

        pub fn add_cocktail(&self, name: &str, recipe: CocktailRecipe) {
            self.cocktails
                .lock()
                .unwrap()
                .push((name.to_string(), recipe, None));
        }

        pub fn cocktail_count(&self) -> usize {
            self.cocktails.lock().unwrap().len()
        }

        fn check_line_writes(&self) -> Result<(), DbError> {
            if self.fail_line_writes.load(Ordering::SeqCst) {
                return Err(DbError::Database("recipe_items insert failed".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IngredientCatalog for MemoryCatalog {
        async fn find_ingredient_by_name(
            &self,
            name: &str,
        ) -> Result<Option<CatalogIngredient>, DbError> {
            Ok(self.ingredients.lock().unwrap().iter().find(|i| i.name == name).cloned())
        }

        async fn create_ingredient(
            &self,
            name: &str,
            name_alt: Option<&str>,
            category: Option<IngredientCategory>,
        ) -> Result<CatalogIngredient, DbError> {
            self.create_calls.lock().unwrap().push(name.to_string());
            let ingredient = prepare_new_ingredient(name, name_alt, category)?;
            if self.find_ingredient_by_name(&ingredient.name).await?.is_some() {
                return Err(DbError::DuplicateName { name: ingredient.name });
            }
            self.ingredients.lock().unwrap().push(ingredient.clone());
            Ok(ingredient)
        }

        async fn list_ingredients(&self) -> Result<Vec<CatalogIngredient>, DbError> {
            Ok(self.ingredients.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl RecipeStore for MemoryCatalog {
        async fn save_recipe_lines(
            &self,
            cocktail_id: &str,
            lines: &[RecipeLine],
        ) -> Result<(), DbError> {
            self.check_line_writes()?;
            let mut stored = self.recipe_lines.lock().unwrap();
            stored.retain(|(id, _)| id != cocktail_id);
            stored.push((cocktail_id.to_string(), lines.to_vec()));
            Ok(())
        }
    }

    #[async_trait]
    impl CocktailStore for MemoryCatalog {
        async fn cocktail_name_exists(&self, name: &str) -> Result<bool, DbError> {
            Ok(self
                .cocktails
                .lock()
                .unwrap()
                .iter()
                .any(|(_, recipe, _)| recipe.name == name.trim()))
        }

        async fn insert_cocktail(
            &self,
            recipe: &CocktailRecipe,
            image_url: Option<&str>,
        ) -> Result<String, DbError> {
            if self.cocktail_name_exists(&recipe.name).await? {
                return Err(DbError::DuplicateCocktail {
                    name: recipe.name.clone(),
                });
            }
            let id = uuid::Uuid::new_v4().to_string();
            self.cocktails
                .lock()
                .unwrap()
                .push((id.clone(), recipe.clone(), image_url.map(str::to_string)));
            Ok(id)
        }

        async fn insert_cocktail_with_lines(
            &self,
            recipe: &CocktailRecipe,
            image_url: Option<&str>,
            lines: &[RecipeLine],
        ) -> Result<String, DbError> {
            if self.cocktail_name_exists(&recipe.name).await? {
                return Err(DbError::DuplicateCocktail {
                    name: recipe.name.clone(),
                });
            }
            self.check_line_writes()?;
            let id = self.insert_cocktail(recipe, image_url).await?;
            self.recipe_lines
                .lock()
                .unwrap()
                .push((id.clone(), lines.to_vec()));
            Ok(id)
        }

        async fn delete_cocktail(&self, id: &str) -> Result<Option<DeletedCocktail>, DbError> {
            let mut cocktails = self.cocktails.lock().unwrap();
            let Some(pos) = cocktails.iter().position(|(cid, _, _)| cid == id) else {
                return Ok(None);
            };
            let (id, recipe, image_url) = cocktails.remove(pos);
            self.recipe_lines.lock().unwrap().retain(|(cid, _)| *cid != id);
            Ok(Some(DeletedCocktail {
                id,
                slug: recipe.slug,
                image_url,
            }))
        }
    }
}
