//! OpenAPI documentation for the `/api` surface, served by Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};
use crate::db::models as db_models;

/// Registers the bearer session token scheme that handlers refer to as `BearerAuth`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /auth/login`. Send it on every request:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hostel management API",
        description = "Rooms, beds, residents, mess, billing, attendance and visitors behind role-based access control."
    ),
    servers(
        (url = "/api", description = "Hostel management API")
    ),
    modifiers(&SecurityAddon),
    paths(
        crate::health,
        handlers::auth::login,
        handlers::auth::signup,
        handlers::permissions::create_permission,
        handlers::permissions::list_permissions,
        handlers::permissions::get_permission,
        handlers::permissions::update_permission,
        handlers::permissions::toggle_permission_status,
        handlers::permissions::delete_permission,
        handlers::roles::create_role,
        handlers::roles::list_roles,
        handlers::roles::get_role,
        handlers::roles::update_role,
        handlers::roles::toggle_role_status,
        handlers::users::get_profile,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::toggle_user_status,
        handlers::rooms::create_room,
        handlers::rooms::list_rooms,
        handlers::rooms::get_room,
        handlers::rooms::update_room,
        handlers::rooms::update_room_status,
        handlers::rooms::delete_room,
        handlers::beds::create_bed,
        handlers::beds::list_beds,
        handlers::beds::get_bed,
        handlers::beds::list_beds_by_room,
        handlers::beds::update_bed,
        handlers::beds::update_bed_status,
        handlers::beds::activate_bed,
        handlers::beds::delete_bed,
        handlers::members::create_member,
        handlers::members::list_members,
        handlers::members::get_member,
        handlers::members::update_member,
        handlers::members::update_member_status,
        handlers::members::delete_member,
        handlers::bed_assignments::create_assignment,
        handlers::bed_assignments::list_assignments,
        handlers::bed_assignments::get_assignment,
        handlers::bed_assignments::list_member_assignments,
        handlers::bed_assignments::close_assignment,
        handlers::bed_assignments::update_assignment,
        handlers::bed_assignments::delete_assignment,
        handlers::food_items::create_food_item,
        handlers::food_items::list_food_items,
        handlers::food_items::get_food_item,
        handlers::food_items::update_food_item,
        handlers::food_items::delete_food_item,
        handlers::food_orders::create_food_order,
        handlers::food_orders::list_food_orders,
        handlers::food_orders::get_food_order,
        handlers::food_orders::list_member_food_orders,
        handlers::food_orders::update_food_order,
        handlers::food_orders::mark_food_order_billed,
        handlers::food_orders::delete_food_order,
        handlers::bills::create_bill,
        handlers::bills::list_bills,
        handlers::bills::get_bill,
        handlers::bills::update_bill,
        handlers::bills::add_payment,
        handlers::bills::delete_bill,
        handlers::attendance::mark_bulk,
        handlers::attendance::get_sheet,
        handlers::attendance::member_history,
        handlers::attendance::room_attendance,
        handlers::attendance::delete_attendance,
        handlers::visitors::create_visitor,
        handlers::visitors::list_visitors,
        handlers::visitors::get_visitor,
        handlers::visitors::checkout_visitor,
        handlers::visitors::delete_visitor,
        handlers::dashboard::refresh_stats,
        handlers::dashboard::get_stats,
    ),
    components(
        schemas(
            models::response::MessageResponse,
            db_models::rooms::RoomStatus,
            db_models::beds::BedStatus,
            db_models::members::MemberStatus,
            db_models::bed_assignments::AssignmentStatus,
            db_models::food_items::MealCategory,
            db_models::bills::BillStatus,
            db_models::attendance::AttendanceStatus,
            db_models::visitors::VisitorStatus,
        )
    ),
    tags(
        (name = "health", description = "Liveness check"),
        (name = "auth", description = "Login and staff account creation"),
        (name = "permissions", description = "The permission registry. Keys are a fixed set; rows can be renamed or deactivated."),
        (name = "roles", description = "Roles and the permissions they grant"),
        (name = "users", description = "Staff accounts"),
        (name = "rooms", description = "Rooms, their capacity and occupancy status"),
        (name = "beds", description = "Beds within rooms"),
        (name = "members", description = "Residents"),
        (name = "bed-assignments", description = "Placing residents in beds and releasing them. \
            Bed, room and member state change together with the assignment."),
        (name = "food-items", description = "The mess menu"),
        (name = "food-orders", description = "Mess orders. Lines keep the name and price the item had when ordered."),
        (name = "bills", description = "Monthly bills and payments"),
        (name = "attendance", description = "Daily attendance sheets"),
        (name = "visitors", description = "Visitor log"),
        (name = "dashboard", description = "Stored summary snapshots"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_path_documents_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components are generated");
        assert!(components.security_schemes.contains_key("BearerAuth"));
        assert!(doc.paths.paths.contains_key("/rooms/{id}/status"));
        assert!(doc.paths.paths.contains_key("/bed-assignments/{id}/close"));
        assert!(doc.paths.paths.contains_key("/attendance/mark-bulk"));
    }
}
