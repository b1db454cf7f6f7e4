//! Static role table and department scoping.

use bailbook_db::models::{User, UserStatus};

use crate::filter::Filter;

pub const VIEW_CASES: u64 = 1 << 0;
pub const EDIT_CASES: u64 = 1 << 1;
pub const MANAGE_DOCUMENTS: u64 = 1 << 2;
pub const SEND_MESSAGES: u64 = 1 << 3;
pub const MANAGE_CHECKINS: u64 = 1 << 4;
pub const MANAGE_USERS: u64 = 1 << 5;
pub const VIEW_ALL_DEPARTMENTS: u64 = 1 << 6;

pub const VIEWER: u64 = VIEW_CASES;

pub const AGENT: u64 = VIEWER | EDIT_CASES | MANAGE_DOCUMENTS | SEND_MESSAGES | MANAGE_CHECKINS;

pub const MANAGER: u64 = AGENT | VIEW_ALL_DEPARTMENTS;

pub const ADMIN: u64 = MANAGER | MANAGE_USERS;

pub const ROLE_NAMES: [&str; 4] = ["admin", "manager", "agent", "viewer"];

pub fn role_permissions(role: &str) -> Option<u64> {
    match role {
        "admin" => Some(ADMIN),
        "manager" => Some(MANAGER),
        "agent" => Some(AGENT),
        "viewer" => Some(VIEWER),
        _ => None,
    }
}

/// Union of the bits granted by `roles`. Unknown names grant nothing.
pub fn for_roles<S: AsRef<str>>(roles: &[S]) -> u64 {
    roles
        .iter()
        .filter_map(|r| role_permissions(r.as_ref()))
        .fold(0, |acc, bits| acc | bits)
}

pub fn for_user(user: &User) -> u64 {
    if user.status == UserStatus::Disabled {
        return 0;
    }
    for_roles(&user.roles)
}

pub fn has(permissions: u64, flag: u64) -> bool {
    permissions & flag == flag
}

/// Names in `roles` that the table does not know.
pub fn unknown_roles<S: AsRef<str>>(roles: &[S]) -> Vec<String> {
    roles
        .iter()
        .map(AsRef::as_ref)
        .filter(|r| role_permissions(r).is_none())
        .map(str::to_string)
        .collect()
}

/// Cases a user may see: everything with `VIEW_ALL_DEPARTMENTS`, otherwise
/// cases assigned to one of their departments or to them personally.
pub fn case_scope(user: &User) -> Filter {
    if has(for_user(user), VIEW_ALL_DEPARTMENTS) {
        return Filter::All;
    }
    Filter::Or(vec![
        Filter::is_in("crm_details.assigned_department", user.departments.clone()),
        Filter::eq("crm_details.assigned_to", user.uid.as_str()),
    ])
}
