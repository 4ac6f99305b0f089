use crate::ipc::helpers::{
    admin, opt_str, patch_nullable_string, patch_object, patch_string, required_id, required_str,
    respond, teacher, unknown_patch_field, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{Employee, EmployeeDraft, EmployeePatch, Role};
use crate::store::RecordStore;
use serde_json::json;

// Passwords never leave the store.
fn employee_to_json(e: &Employee) -> serde_json::Value {
    json!({
        "employeeId": e.employee_id,
        "name": e.name,
        "contact": e.contact,
        "position": e.position,
        "username": e.username,
        "role": e.role.as_str(),
    })
}

fn username_taken(store: &RecordStore, username: &str, except: Option<u64>) -> bool {
    store
        .employees()
        .iter()
        .any(|e| e.username.as_deref() == Some(username) && Some(e.employee_id) != except)
}

fn parse_employee_patch(
    params: &serde_json::Value,
    allow_position: bool,
) -> Result<EmployeePatch, HandlerErr> {
    let mut patch = EmployeePatch::default();
    for (k, v) in patch_object(params)? {
        match k.as_str() {
            "name" => patch.name = Some(patch_string(k, v)?),
            "contact" => patch.contact = Some(patch_string(k, v)?),
            "position" if allow_position => {
                let p = patch_string(k, v)?;
                if p.is_empty() {
                    return Err(HandlerErr::bad_params("patch.position must not be empty"));
                }
                patch.position = Some(p);
            }
            "username" => patch.username = Some(patch_nullable_string(k, v)?),
            "password" => patch.password = Some(patch_nullable_string(k, v)?),
            _ => return Err(unknown_patch_field(k)),
        }
    }
    Ok(patch)
}

fn check_username(
    store: &RecordStore,
    patch: &EmployeePatch,
    employee_id: u64,
) -> Result<(), HandlerErr> {
    if let Some(Some(u)) = &patch.username {
        if username_taken(store, u, Some(employee_id)) {
            return Err(HandlerErr::bad_params("username already in use"));
        }
    }
    Ok(())
}

fn employees_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let admin = admin(state)?;
    let rows: Vec<serde_json::Value> = admin
        .store()
        .employees()
        .iter()
        .map(employee_to_json)
        .collect();
    Ok(json!({ "employees": rows }))
}

fn employees_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let contact = required_str(params, "contact")?;
    let position = required_str(params, "position")?;
    let username = opt_str(params, "username")?;
    let password = opt_str(params, "password")?;
    let role = Role::from_position(&position);
    if role.can_log_in() && (username.is_none() || password.is_none()) {
        return Err(HandlerErr::bad_params(
            "username and password are required for admin/teacher positions",
        ));
    }
    let mut admin = admin(state)?;
    if role.can_log_in() {
        if let Some(u) = &username {
            if username_taken(admin.store(), u, None) {
                return Err(HandlerErr::bad_params("username already in use"));
            }
        }
    }
    let employee_id = admin.add_employee(EmployeeDraft {
        name,
        contact,
        position,
        username,
        password,
    })?;
    Ok(json!({ "employeeId": employee_id, "role": role.as_str() }))
}

fn employees_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let employee_id = required_id(params, "employeeId")?;
    let patch = parse_employee_patch(params, true)?;
    let mut admin = admin(state)?;
    check_username(admin.store(), &patch, employee_id)?;
    let is_self = employee_id == admin.employee_id();
    check_admin_kept(admin.store(), &patch, employee_id, is_self)?;
    let renamed = patch.username.clone().flatten().filter(|_| is_self);
    if !admin.update_employee(employee_id, patch)? {
        return Err(HandlerErr::not_found("employee not found"));
    }
    drop(admin);
    // The session follows the logged-in admin's own row.
    if let (Some(username), Some(s)) = (renamed, state.session.as_mut()) {
        s.username = username;
    }
    Ok(json!({ "ok": true }))
}

/// The logged-in admin keeps their role and credentials, and the workspace
/// always keeps at least one admin.
fn check_admin_kept(
    store: &RecordStore,
    patch: &EmployeePatch,
    employee_id: u64,
    is_self: bool,
) -> Result<(), HandlerErr> {
    if is_self && matches!(patch.username, Some(None)) {
        return Err(HandlerErr::bad_params(
            "cannot clear the logged-in admin's username",
        ));
    }
    if is_self && matches!(patch.password, Some(None)) {
        return Err(HandlerErr::bad_params(
            "cannot clear the logged-in admin's password",
        ));
    }
    let Some(position) = &patch.position else {
        return Ok(());
    };
    let target_is_admin = store
        .employee(employee_id)
        .is_some_and(|e| e.role == Role::Admin);
    if !target_is_admin || Role::from_position(position) == Role::Admin {
        return Ok(());
    }
    let admins = store
        .employees()
        .iter()
        .filter(|e| e.role == Role::Admin)
        .count();
    if admins <= 1 {
        return Err(HandlerErr::bad_params("cannot demote the last admin"));
    }
    if is_self {
        return Err(HandlerErr::bad_params(
            "cannot change the logged-in admin's position",
        ));
    }
    Ok(())
}

fn employees_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let employee_id = required_id(params, "employeeId")?;
    let mut admin = admin(state)?;
    if employee_id == admin.employee_id() {
        return Err(HandlerErr::bad_params("cannot remove the logged-in admin"));
    }
    admin.remove_employee(employee_id)?;
    Ok(json!({ "ok": true }))
}

fn profile_get(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let teacher = teacher(state)?;
    let profile = teacher
        .profile()
        .ok_or_else(|| HandlerErr::not_found("profile not found"))?;
    Ok(json!({ "profile": employee_to_json(profile) }))
}

fn profile_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let patch = parse_employee_patch(params, false)?;
    if let Some(None) = patch.username {
        return Err(HandlerErr::bad_params("patch.username must not be empty"));
    }
    if let Some(None) = patch.password {
        return Err(HandlerErr::bad_params("patch.password must not be empty"));
    }
    let mut teacher = teacher(state)?;
    check_username(teacher.store(), &patch, teacher.employee_id())?;
    let renamed = patch.username.clone().flatten();
    if !teacher.update_profile(patch)? {
        return Err(HandlerErr::not_found("profile not found"));
    }
    let profile = teacher.profile().map(employee_to_json);
    drop(teacher);
    if let (Some(username), Some(s)) = (renamed, state.session.as_mut()) {
        s.username = username;
    }
    Ok(json!({ "profile": profile }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "employees.list" => employees_list(state),
        "employees.create" => employees_create(state, &req.params),
        "employees.update" => employees_update(state, &req.params),
        "employees.delete" => employees_delete(state, &req.params),
        "profile.get" => profile_get(state),
        "profile.update" => profile_update(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
