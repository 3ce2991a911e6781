//! Common type definitions and the permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, RoomId, etc.)
//! - [`PermissionKey`], the closed set of capabilities a role can grant
//! - [`Lifecycle`], the active/inactive state shared by soft-deletable records
//!
//! # Permission keys
//!
//! Every protected operation requires exactly one [`PermissionKey`]. A caller is allowed through
//! when the flattened key set of their role contains that key; there are no wildcards and no
//! hierarchy between keys.
//!
//! ```ignore
//! use hostelctl::types::PermissionKey;
//!
//! let key: PermissionKey = "ROOM_CREATE".parse()?;
//! assert_eq!(key.module(), "room");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type RoleId = Uuid;
pub type PermissionId = Uuid;
pub type RoomId = Uuid;
pub type BedId = Uuid;
pub type MemberId = Uuid;
pub type BedAssignmentId = Uuid;
pub type FoodItemId = Uuid;
pub type FoodOrderId = Uuid;
pub type BillId = Uuid;
pub type AttendanceId = Uuid;
pub type VisitorId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Whether a record is live or has been soft-deleted / switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Lifecycle {
    Active,
    Inactive,
}

impl Lifecycle {
    pub fn is_active(self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    /// The opposite state, used by the `PATCH .../status` toggles.
    pub fn toggled(self) -> Self {
        match self {
            Lifecycle::Active => Lifecycle::Inactive,
            Lifecycle::Inactive => Lifecycle::Active,
        }
    }
}

impl From<bool> for Lifecycle {
    fn from(active: bool) -> Self {
        if active { Lifecycle::Active } else { Lifecycle::Inactive }
    }
}

macro_rules! permission_keys {
    ($($variant:ident => $key:literal in $module:literal),+ $(,)?) => {
        /// A capability a role can grant. Serialized as its SCREAMING_SNAKE_CASE key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
        #[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum PermissionKey {
            $($variant,)+
        }

        impl PermissionKey {
            /// Every key the system knows about, in declaration order.
            pub const ALL: &'static [PermissionKey] = &[$(PermissionKey::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(PermissionKey::$variant => $key,)+
                }
            }

            /// Module label used to group keys in the permission registry.
            pub fn module(&self) -> &'static str {
                match self {
                    $(PermissionKey::$variant => $module,)+
                }
            }
        }

        impl FromStr for PermissionKey {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($key => Ok(PermissionKey::$variant),)+
                    _ => Err(format!("Unknown permission key: {s}")),
                }
            }
        }
    };
}

permission_keys! {
    PermissionCreate => "PERMISSION_CREATE" in "permission",
    PermissionView => "PERMISSION_VIEW" in "permission",
    PermissionUpdate => "PERMISSION_UPDATE" in "permission",
    PermissionDelete => "PERMISSION_DELETE" in "permission",
    RoleCreate => "ROLE_CREATE" in "role",
    RoleView => "ROLE_VIEW" in "role",
    RoleUpdate => "ROLE_UPDATE" in "role",
    UserCreate => "USER_CREATE" in "user",
    UserView => "USER_VIEW" in "user",
    UserUpdate => "USER_UPDATE" in "user",
    UserStatus => "USER_STATUS" in "user",
    RoomCreate => "ROOM_CREATE" in "room",
    RoomView => "ROOM_VIEW" in "room",
    RoomUpdate => "ROOM_UPDATE" in "room",
    RoomDelete => "ROOM_DELETE" in "room",
    BedCreate => "BED_CREATE" in "bed",
    BedView => "BED_VIEW" in "bed",
    BedUpdate => "BED_UPDATE" in "bed",
    BedDelete => "BED_DELETE" in "bed",
    MemberCreate => "MEMBER_CREATE" in "member",
    MemberView => "MEMBER_VIEW" in "member",
    MemberUpdate => "MEMBER_UPDATE" in "member",
    MemberDelete => "MEMBER_DELETE" in "member",
    AssignBed => "ASSIGN_BED" in "bed_assignment",
    ViewBedAssignments => "VIEW_BED_ASSIGNMENTS" in "bed_assignment",
    UpdateBedAssignments => "UPDATE_BED_ASSIGNMENTS" in "bed_assignment",
    CloseBedAssignments => "CLOSE_BED_ASSIGNMENTS" in "bed_assignment",
    DeleteBedAssignments => "DELETE_BED_ASSIGNMENTS" in "bed_assignment",
    FoodItemCreate => "FOOD_ITEM_CREATE" in "food_item",
    FoodItemView => "FOOD_ITEM_VIEW" in "food_item",
    FoodItemUpdate => "FOOD_ITEM_UPDATE" in "food_item",
    FoodItemDelete => "FOOD_ITEM_DELETE" in "food_item",
    CreateFoodOrder => "CREATE_FOOD_ORDER" in "food_order",
    ViewFoodOrder => "VIEW_FOOD_ORDER" in "food_order",
    UpdateFoodOrder => "UPDATE_FOOD_ORDER" in "food_order",
    BillFoodOrder => "BILL_FOOD_ORDER" in "food_order",
    DeleteFoodOrder => "DELETE_FOOD_ORDER" in "food_order",
    BillCreate => "BILL_CREATE" in "bill",
    BillView => "BILL_VIEW" in "bill",
    BillUpdate => "BILL_UPDATE" in "bill",
    BillPayment => "BILL_PAYMENT" in "bill",
    BillDelete => "BILL_DELETE" in "bill",
    AttendanceMark => "ATTENDANCE_MARK" in "attendance",
    AttendanceView => "ATTENDANCE_VIEW" in "attendance",
    AttendanceDelete => "ATTENDANCE_DELETE" in "attendance",
    VisitorCreate => "VISITOR_CREATE" in "visitor",
    VisitorView => "VISITOR_VIEW" in "visitor",
    VisitorUpdate => "VISITOR_UPDATE" in "visitor",
    VisitorDelete => "VISITOR_DELETE" in "visitor",
    ViewDashboard => "VIEW_DASHBOARD" in "dashboard",
    RefreshDashboard => "REFRESH_DASHBOARD" in "dashboard",
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_round_trip_through_serde_and_from_str() {
        for key in PermissionKey::ALL {
            let json = serde_json::to_value(key).unwrap();
            assert_eq!(json, serde_json::Value::String(key.as_str().to_string()));
            assert_eq!(key.as_str().parse::<PermissionKey>().unwrap(), *key);
        }
    }

    #[test]
    fn test_keys_are_unique() {
        let unique: HashSet<&str> = PermissionKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(unique.len(), PermissionKey::ALL.len());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!("ROOM_EXPLODE".parse::<PermissionKey>().is_err());
        // Exact match only
        assert!("room_create".parse::<PermissionKey>().is_err());
    }

    #[test]
    fn test_lifecycle_toggle() {
        assert_eq!(Lifecycle::Active.toggled(), Lifecycle::Inactive);
        assert_eq!(Lifecycle::Inactive.toggled(), Lifecycle::Active);
        assert!(Lifecycle::from(true).is_active());
        assert!(!Lifecycle::from(false).is_active());
    }

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
