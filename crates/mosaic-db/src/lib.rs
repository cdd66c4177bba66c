//! # mosaic-db
//!
//! PostgreSQL store for the mosaic search engine.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgStackIndex`], the PostgreSQL implementation of the store traits
//! - Parameterized WHERE-clause generation for filter predicates
//! - Color predicates over either the `stack_color` side table or the
//!   `stack.colors` JSONB column
//!
//! ## Example
//!
//! ```rust,ignore
//! use mosaic_db::Database;
//! use mosaic_core::StackFilterRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/mosaic").await?;
//!     let ids = db.stacks.all_stack_ids(dataset_id).await?;
//!     println!("{} stacks", ids.len());
//!     Ok(())
//! }
//! ```
pub mod filter_query;
pub mod pool;
pub mod stack_index;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use mosaic_core::*;

pub use filter_query::{ColorStorage, PredicateQueryBuilder, QueryParam};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use stack_index::PgStackIndex;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Search store over stacks, tags, authors, and colors.
    pub stacks: PgStackIndex,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            stacks: PgStackIndex::new(pool.clone()),
            pool,
        }
    }

    /// Use the given color storage for color predicates.
    pub fn with_color_storage(mut self, storage: ColorStorage) -> Self {
        self.stacks = self.stacks.with_color_storage(storage);
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
    }
}
