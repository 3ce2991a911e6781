//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows. These models are used by repositories to return query results
//! and accept insertion/update data.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each `*DBResponse` matches a table row (plus any joined columns)
//! - **SQLx Integration**: Models derive `sqlx::FromRow` for query results
//! - **Separation**: Database models are distinct from API models to allow
//!   independent evolution of storage and API representations
//! - **Closed enums**: Every status column maps to a Rust enum stored as uppercase text
//!
//! # Model Categories
//!
//! ## Identity and access
//!
//! - [`permissions`]: The permission registry
//! - [`roles`]: Roles and their ordered permission sets
//! - [`users`]: Staff accounts
//!
//! ## Facility and residents
//!
//! - [`rooms`], [`beds`]: Physical capacity
//! - [`members`]: Residents
//! - [`bed_assignments`]: Member to bed bindings with a rent snapshot
//!
//! ## Operations
//!
//! - [`food_items`], [`food_orders`]: Mess catalog and snapshot-based orders
//! - [`bills`]: Monthly bills and the pure total derivation
//! - [`attendance`], [`visitors`]: Daily attendance and the visitor log
//! - [`dashboard`]: Per-day aggregate snapshots

pub mod attendance;
pub mod bed_assignments;
pub mod beds;
pub mod bills;
pub mod dashboard;
pub mod food_items;
pub mod food_orders;
pub mod members;
pub mod permissions;
pub mod roles;
pub mod rooms;
pub mod users;
pub mod visitors;
