//! Permission checking.
//!
//! Handlers declare the key they need in their signature:
//!
//! ```ignore
//! pub async fn create_room(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<require::RoomCreate>,
//!     Json(body): Json<RoomCreate>,
//! ) -> Result<(StatusCode, Json<ApiResponse<RoomResponse>>)> { ... }
//! ```
//!
//! The extractor authenticates the caller through [`CurrentUser`] and then checks set membership
//! of the marker's key in the caller's flattened permission set.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::PermissionKey,
};

/// Type-level name for a single [`PermissionKey`].
pub trait PermissionMarker: Send + Sync + 'static {
    const KEY: PermissionKey;
}

macro_rules! markers {
    ($($name:ident),+ $(,)?) => {
        /// Marker types for [`RequiresPermission`], one per permission key.
        pub mod require {
            use super::PermissionMarker;
            use crate::types::PermissionKey;

            $(
                pub struct $name;

                impl PermissionMarker for $name {
                    const KEY: PermissionKey = PermissionKey::$name;
                }
            )+
        }
    };
}

markers! {
    PermissionCreate,
    PermissionView,
    PermissionUpdate,
    PermissionDelete,
    RoleCreate,
    RoleView,
    RoleUpdate,
    UserCreate,
    UserView,
    UserUpdate,
    UserStatus,
    RoomCreate,
    RoomView,
    RoomUpdate,
    RoomDelete,
    BedCreate,
    BedView,
    BedUpdate,
    BedDelete,
    MemberCreate,
    MemberView,
    MemberUpdate,
    MemberDelete,
    AssignBed,
    ViewBedAssignments,
    UpdateBedAssignments,
    CloseBedAssignments,
    DeleteBedAssignments,
    FoodItemCreate,
    FoodItemView,
    FoodItemUpdate,
    FoodItemDelete,
    CreateFoodOrder,
    ViewFoodOrder,
    UpdateFoodOrder,
    BillFoodOrder,
    DeleteFoodOrder,
    BillCreate,
    BillView,
    BillUpdate,
    BillPayment,
    BillDelete,
    AttendanceMark,
    AttendanceView,
    AttendanceDelete,
    VisitorCreate,
    VisitorView,
    VisitorUpdate,
    VisitorDelete,
    ViewDashboard,
    RefreshDashboard,
}

/// Check if a user holds a specific permission key
pub fn has_permission(user: &CurrentUser, key: PermissionKey) -> bool {
    user.permissions.contains(&key)
}

/// Require a permission key, returning `Forbidden` naming the missing key
pub fn require(user: &CurrentUser, key: PermissionKey) -> Result<()> {
    if has_permission(user, key) {
        Ok(())
    } else {
        Err(Error::Forbidden { required: key })
    }
}

/// An authenticated caller whose role grants `K`.
pub struct RequiresPermission<K: PermissionMarker>(pub CurrentUser, PhantomData<K>);

impl<K: PermissionMarker> RequiresPermission<K> {
    pub fn into_inner(self) -> CurrentUser {
        self.0
    }
}

impl<K: PermissionMarker> Deref for RequiresPermission<K> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: PermissionMarker> FromRequestParts<AppState> for RequiresPermission<K> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if let Err(e) = require(&user, K::KEY) {
            debug!(user_id = %user.id, required = %K::KEY, "permission denied");
            return Err(e);
        }

        Ok(RequiresPermission(user, PhantomData))
    }
}
