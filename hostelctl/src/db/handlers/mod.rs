//! Repository implementations for database access.
//!
//! This module provides repository structs for each entity in the system.
//! Repositories follow a consistent pattern and most implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//! - Uses the connection's transaction for ACID guarantees
//!
//! # Available Repositories
//!
//! - [`Permissions`], [`Roles`], [`Users`]: Identity and access
//! - [`Rooms`], [`Beds`], [`Members`]: Facility and residents
//! - [`BedAssignments`]: Assignment lifecycle, including the shared release step
//! - [`FoodItems`], [`FoodOrders`]: Mess catalog and orders
//! - [`Bills`]: Bill numbering and total derivation
//! - [`Attendance`], [`Visitors`]: Daily operations
//! - [`Dashboard`]: Aggregate snapshots
//!
//! # Common Pattern
//!
//! ```ignore
//! use hostelctl::db::handlers::{Rooms, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Rooms::new(&mut tx);
//!
//!     let rooms = repo.list(&RoomFilter::default()).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! Workflows that move several entities at once (assigning a bed, closing an assignment, marking a
//! member as left, generating a bill) take row locks with the `lock_*` methods and run every step on
//! the same transaction.

pub mod attendance;
pub mod bed_assignments;
pub mod beds;
pub mod bills;
pub mod dashboard;
pub mod food_items;
pub mod food_orders;
pub mod members;
pub mod permissions;
pub mod repository;
pub mod roles;
pub mod rooms;
pub mod users;
pub mod visitors;

pub use attendance::Attendance;
pub use bed_assignments::BedAssignments;
pub use beds::Beds;
pub use bills::Bills;
pub use dashboard::Dashboard;
pub use food_items::FoodItems;
pub use food_orders::FoodOrders;
pub use members::Members;
pub use permissions::Permissions;
pub use repository::Repository;
pub use roles::Roles;
pub use rooms::Rooms;
pub use users::Users;
pub use visitors::Visitors;
