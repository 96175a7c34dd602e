//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the billing system
//! using SQLx: the connection pool, the schema migrations, and the
//! [`PgSettlementStore`] adapter behind the settlement engines' storage
//! port.
//!
//! # Architecture
//!
//! The domain crates never see SQL. The engines talk to the
//! `SettlementStore` port; this crate implements it with one database
//! transaction per engine operation, mapping PostgreSQL constraint
//! violations onto the port's conflict taxonomy (a duplicate external
//! payment reference surfaces as "already processed", a lost version
//! race as a retryable conflict).
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PgSettlementStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/billing")).await?;
//! infra_db::run_migrations(&pool).await?;
//! let store = PgSettlementStore::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;
pub mod rows;

pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::PgSettlementStore;
