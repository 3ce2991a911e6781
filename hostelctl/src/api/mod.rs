//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is mounted under `/api`:
//!
//! - **Identity** (`/auth`, `/users`, `/roles`, `/permissions`): Login, staff accounts and RBAC
//! - **Facility** (`/rooms`, `/beds`): Rooms and the beds inside them
//! - **Residents** (`/members`, `/bed-assignments`): Members and where they sleep
//! - **Mess** (`/food-items`, `/food-orders`): Menu and per-member orders
//! - **Billing** (`/bills`): Monthly bills and payments
//! - **Daily operations** (`/attendance`, `/visitors`)
//! - **Dashboard** (`/dashboard`): Aggregate snapshots
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/docs` when `enable_openapi` is set.

use axum::extract::FromRequest;

use crate::errors::Error;

pub mod handlers;
pub mod models;

/// JSON request body whose rejections (malformed JSON, missing or mistyped fields) are reported
/// as 400 in the standard error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);
