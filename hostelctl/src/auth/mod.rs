//! Authentication and authorization.
//!
//! Staff log in with email and password and receive a signed session token (JWT, HS256). Every
//! protected request carries it as `Authorization: Bearer <token>`.
//!
//! # Authentication
//!
//! The token only identifies the user. On each request the [`CurrentUser`] extractor re-loads the
//! user, its role and the role's active permission keys, so deactivating a user or role, or
//! revoking a permission, takes effect immediately rather than at token expiry.
//!
//! # Authorization
//!
//! Access is role based: a role holds a set of [`PermissionKey`]s and each handler requires exactly
//! one. See [`permissions`] for the extractor that enforces this.
//!
//! # Modules
//!
//! - [`current_user`]: Bearer token extractor for the authenticated user
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Type-level permission requirements for handlers
//! - [`session`]: Session token creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use hostelctl::auth::permissions::{RequiresPermission, require};
//!
//! async fn list_rooms(
//!     State(state): State<AppState>,
//!     _: RequiresPermission<require::RoomView>,
//! ) -> Result<Json<ApiResponse<Vec<RoomResponse>>>> { ... }
//! ```
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser
//! [`PermissionKey`]: crate::types::PermissionKey

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
