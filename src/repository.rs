use crate::{
    error::{CategoryError, Result},
    models::{CategoryNode, NewCategory, User},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence collaborator of the category service. Handlers and `CategoryManager`
/// only see this contract, so the Postgres store and the in-memory store are interchangeable.
///
/// A lookup miss is `Ok(None)` / an empty `Vec`; only storage failures are errors.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Category Lookup ---
    // Resolves the (name, parent, level) key used by tree creation.
    async fn find_category(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        level: i32,
    ) -> Result<Option<CategoryNode>>;
    async fn find_categories_by_name(&self, name: &str) -> Result<Vec<CategoryNode>>;
    async fn get_category(&self, id: Uuid) -> Result<Option<CategoryNode>>;
    // Every category, ordered by path.
    async fn list_categories(&self) -> Result<Vec<CategoryNode>>;
    // Direct children only, ordered by path.
    async fn children(&self, id: Uuid) -> Result<Vec<CategoryNode>>;
    async fn has_children(&self, id: Uuid) -> Result<bool>;

    // --- Category Writes ---
    async fn insert_category(&self, new: NewCategory) -> Result<CategoryNode>;
    // Persists name, parent, path, level, owner and updater; refreshes `updated`.
    async fn save_category(&self, node: &CategoryNode) -> Result<CategoryNode>;
    // Returns false when no row was removed.
    async fn delete_category(&self, id: Uuid) -> Result<bool>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn create_user(&self, user: User) -> Result<User>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const CATEGORY_COLUMNS: &str =
    "id, name, parent_id, path, level, owner_id, creator_id, updater_id, created, updated";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Logs a storage failure with the calling operation's name, then maps it.
fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> CategoryError {
    move |e| {
        tracing::error!("{} error: {:?}", operation, e);
        CategoryError::from(e)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_category
    ///
    /// `IS NOT DISTINCT FROM` lets a `None` parent match root rows.
    async fn find_category(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        level: i32,
    ) -> Result<Option<CategoryNode>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE name = $1 AND parent_id IS NOT DISTINCT FROM $2 AND level = $3"
        );
        sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(name)
            .bind(parent_id)
            .bind(level)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find_category"))
    }

    async fn find_categories_by_name(&self, name: &str) -> Result<Vec<CategoryNode>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1 ORDER BY path");
        sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find_categories_by_name"))
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<CategoryNode>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_category"))
    }

    async fn list_categories(&self) -> Result<Vec<CategoryNode>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY path");
        sqlx::query_as::<_, CategoryNode>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_categories"))
    }

    async fn children(&self, id: Uuid) -> Result<Vec<CategoryNode>> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE parent_id = $1 ORDER BY path");
        sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("children"))
    }

    async fn has_children(&self, id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM categories WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("has_children"))
    }

    /// insert_category
    ///
    /// A concurrent insert of the same (name, parent, level) key hits the unique constraint
    /// and surfaces as `CategoryError::Conflict`.
    async fn insert_category(&self, new: NewCategory) -> Result<CategoryNode> {
        let sql = format!(
            "INSERT INTO categories \
             (id, name, parent_id, path, level, owner_id, creator_id, updater_id, created, updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(new.parent_id)
            .bind(&new.path)
            .bind(new.level)
            .bind(new.owner_id)
            .bind(new.creator_id)
            .bind(new.updater_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert_category"))
    }

    async fn save_category(&self, node: &CategoryNode) -> Result<CategoryNode> {
        let sql = format!(
            "UPDATE categories \
             SET name = $2, parent_id = $3, path = $4, level = $5, owner_id = $6, \
                 updater_id = $7, updated = NOW() \
             WHERE id = $1 \
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(node.id)
            .bind(&node.name)
            .bind(node.parent_id)
            .bind(&node.path)
            .bind(node.level)
            .bind(node.owner_id)
            .bind(node.updater_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("save_category"))?
            .ok_or(CategoryError::NotFound(node.id))
    }

    /// delete_category
    ///
    /// A child attached since the caller's `has_children` check trips the `ON DELETE
    /// RESTRICT` foreign key and surfaces as `CategoryError::HasChildren`.
    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    tracing::warn!(%id, "category gained children before delete");
                    CategoryError::HasChildren(id)
                }
                _ => db_error("delete_category")(e),
            })
    }

    /// get_user
    ///
    /// Used by the auth extractor; a storage failure reads as "no such user".
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM profiles ORDER BY email")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_users"))
    }

    async fn create_user(&self, user: User) -> Result<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO profiles (id, email, role) VALUES ($1, $2, $3) RETURNING id, email, role",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_user"))
    }
}

/// InMemoryRepository
///
/// `Repository` kept in process memory. Backs the test suites and local runs without a
/// database. It enforces the same key uniqueness and delete restriction as the Postgres schema.
#[derive(Default)]
pub struct InMemoryRepository {
    categories: RwLock<HashMap<Uuid, CategoryNode>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored categories.
    pub async fn category_count(&self) -> usize {
        self.categories.read().await.len()
    }

    /// Writes a row as-is, bypassing key checks. Lets tests build trees the manager
    /// would never produce (cycles, dangling parents).
    pub async fn put_raw(&self, node: CategoryNode) {
        self.categories.write().await.insert(node.id, node);
    }
}

fn sorted_by_path(mut nodes: Vec<CategoryNode>) -> Vec<CategoryNode> {
    nodes.sort_by(|a, b| a.path.cmp(&b.path));
    nodes
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_category(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        level: i32,
    ) -> Result<Option<CategoryNode>> {
        let categories = self.categories.read().await;
        Ok(categories
            .values()
            .find(|c| c.name == name && c.parent_id == parent_id && c.level == level)
            .cloned())
    }

    async fn find_categories_by_name(&self, name: &str) -> Result<Vec<CategoryNode>> {
        let categories = self.categories.read().await;
        Ok(sorted_by_path(
            categories.values().filter(|c| c.name == name).cloned().collect(),
        ))
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<CategoryNode>> {
        Ok(self.categories.read().await.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryNode>> {
        let categories = self.categories.read().await;
        Ok(sorted_by_path(categories.values().cloned().collect()))
    }

    async fn children(&self, id: Uuid) -> Result<Vec<CategoryNode>> {
        let categories = self.categories.read().await;
        Ok(sorted_by_path(
            categories
                .values()
                .filter(|c| c.parent_id == Some(id))
                .cloned()
                .collect(),
        ))
    }

    async fn has_children(&self, id: Uuid) -> Result<bool> {
        let categories = self.categories.read().await;
        Ok(categories.values().any(|c| c.parent_id == Some(id)))
    }

    async fn insert_category(&self, new: NewCategory) -> Result<CategoryNode> {
        let mut categories = self.categories.write().await;
        let duplicate = categories.values().any(|c| {
            c.name == new.name && c.parent_id == new.parent_id && c.level == new.level
        });
        if duplicate {
            return Err(CategoryError::Conflict(new.path));
        }

        let now = Utc::now();
        let node = CategoryNode {
            id: Uuid::new_v4(),
            name: new.name,
            parent_id: new.parent_id,
            path: new.path,
            level: new.level,
            owner_id: new.owner_id,
            creator_id: new.creator_id,
            updater_id: new.updater_id,
            created: now,
            updated: now,
        };
        categories.insert(node.id, node.clone());
        Ok(node)
    }

    async fn save_category(&self, node: &CategoryNode) -> Result<CategoryNode> {
        let mut categories = self.categories.write().await;
        let duplicate = categories.values().any(|c| {
            c.id != node.id
                && c.name == node.name
                && c.parent_id == node.parent_id
                && c.level == node.level
        });
        if duplicate {
            return Err(CategoryError::Conflict(node.path.clone()));
        }

        let stored = categories
            .get_mut(&node.id)
            .ok_or(CategoryError::NotFound(node.id))?;
        stored.name = node.name.clone();
        stored.parent_id = node.parent_id;
        stored.path = node.path.clone();
        stored.level = node.level;
        stored.owner_id = node.owner_id;
        stored.updater_id = node.updater_id;
        stored.updated = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut categories = self.categories.write().await;
        if categories.values().any(|c| c.parent_id == Some(id)) {
            return Err(CategoryError::HasChildren(id));
        }
        Ok(categories.remove(&id).is_some())
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn create_user(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(CategoryError::Conflict(user.email));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }
}
