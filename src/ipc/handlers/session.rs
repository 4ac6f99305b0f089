use crate::ipc::helpers::{required_str, respond, session, store_mut, HandlerErr};
use crate::ipc::types::{AppState, Request, Session};
use crate::records::EmployeeDraft;
use serde_json::json;
use tracing::{info, warn};

/// Creates the first admin on an empty workspace. Refused once any admin exists.
fn bootstrap_admin(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let contact = required_str(params, "contact")?;
    let username = required_str(params, "username")?;
    let password = required_str(params, "password")?;
    let store = store_mut(state)?;
    if store.has_admin() {
        return Err(HandlerErr::new("forbidden", "an admin already exists"));
    }
    if store.employee_by_username(&username).is_some() {
        return Err(HandlerErr::bad_params("username already in use"));
    }
    let employee_id = store.add_employee(EmployeeDraft {
        name,
        contact,
        position: "admin".to_string(),
        username: Some(username),
        password: Some(password),
    })?;
    Ok(json!({ "employeeId": employee_id }))
}

fn login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let username = required_str(params, "username")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?
        .to_string();
    let store = store_mut(state)?;
    let Some((employee_id, name, role)) = store
        .authenticate(&username, &password)
        .map(|e| (e.employee_id, e.name.clone(), e.role))
    else {
        warn!(username = %username, "login rejected");
        return Err(HandlerErr::new("login_failed", "invalid credentials"));
    };
    info!(username = %username, role = role.as_str(), "logged in");
    state.session = Some(Session {
        username,
        role,
        employee_id,
    });
    let result = json!({
        "employeeId": employee_id,
        "name": name,
        "role": role.as_str(),
    });
    Ok(result)
}

fn whoami(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let s = session(state)?;
    Ok(json!({
        "username": s.username,
        "role": s.role.as_str(),
        "employeeId": s.employee_id,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "session.bootstrapAdmin" => bootstrap_admin(state, &req.params),
        "session.login" => login(state, &req.params),
        "session.logout" => {
            state.session = None;
            Ok(json!({ "ok": true }))
        }
        "session.whoami" => whoami(state),
        _ => return None,
    };
    Some(respond(req, res))
}
