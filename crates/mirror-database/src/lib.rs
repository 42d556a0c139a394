//! SQLite history of mirrored trust lines and purchases.
//!
//! All access goes through [`AsyncDatabase`], which runs SQLite on one
//! dedicated thread:
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let recent = db.call(|conn| queries::list_trust_lines(conn, 20)).await?;
//! ```
//!
//! Only SQL belongs inside `db.call()`.

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use migrations::run_migrations;
pub use models::*;
