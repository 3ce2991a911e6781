//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **Wire format**: Fields are camelCase; soft-delete state is exposed as `isActive`
//! - **OpenAPI**: All models are annotated with `utoipa` for automatic API docs
//! - **Envelope**: Every success body is wrapped in [`response::ApiResponse`]
//!
//! # Model Categories
//!
//! ## Identity
//!
//! - [`auth`]: Login and staff account creation payloads
//! - [`users`]: Staff profiles and the authenticated [`users::CurrentUser`]
//! - [`roles`], [`permissions`]: Role definitions and the permission registry
//!
//! ## Facility and residents
//!
//! - [`rooms`], [`beds`], [`members`], [`bed_assignments`]
//!
//! ## Mess and billing
//!
//! - [`food_items`], [`food_orders`], [`bills`]
//!
//! ## Daily operations
//!
//! - [`attendance`], [`visitors`], [`dashboard`]

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
pub mod response;
pub mod roles;
pub mod rooms;
pub mod users;
pub mod visitors;
