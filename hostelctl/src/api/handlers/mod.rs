//! HTTP request handlers for all API endpoints.
//!
//! Handlers are organized by resource. Each one validates its input, checks the caller's
//! permission through its extractor, runs the repository calls (inside a transaction whenever
//! more than one row changes), and wraps the result in the success envelope.
//!
//! # Handler Modules
//!
//! - [`auth`]: Login and staff signup
//! - [`permissions`]: Permission catalog management
//! - [`roles`]: Roles and their permission sets
//! - [`users`]: Staff accounts and the caller's profile
//! - [`rooms`]: Rooms, capacity and status
//! - [`beds`]: Beds within rooms
//! - [`members`]: Resident records and status changes
//! - [`bed_assignments`]: Assigning and releasing beds
//! - [`food_items`]: Mess menu
//! - [`food_orders`]: Mess orders with price snapshots
//! - [`bills`]: Monthly bills and payments
//! - [`attendance`]: Daily attendance sheets
//! - [`visitors`]: Visitor check-in and check-out
//! - [`dashboard`]: Summary statistics snapshots
//!
//! # Authentication
//!
//! Every handler except login and the health check takes a
//! [`RequiresPermission`](crate::auth::permissions::RequiresPermission) or
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts into the failure envelope with the
//! matching HTTP status.

pub mod attendance;
pub mod auth;
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
