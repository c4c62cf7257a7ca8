//! Centralized access policy, evaluated once per request before dispatch.
//! A method that is not in the table is denied rather than silently open.

use crate::ipc::error::ApiError;
use crate::ipc::types::AppState;
use crate::store::users::Role;

pub enum Access {
    Public,
    SignedIn,
    Roles(&'static [Role]),
}

pub fn policy_for(method: &str) -> Option<Access> {
    use Role::{Admin, Faculty};
    Some(match method {
        "health" | "workspace.select" | "auth.register" | "auth.signIn" => Access::Public,

        "auth.signOut"
        | "auth.me"
        | "users.update"
        | "subjects.list"
        | "attendance.studentSummary"
        | "fees.listForStudent"
        | "assignments.list"
        | "materials.list"
        | "feed.post"
        | "feed.list"
        | "feed.like"
        | "feed.unlike"
        | "feed.delete"
        | "clubs.list"
        | "clubs.join"
        | "clubs.leave"
        | "fundraising.list"
        | "fundraising.donate"
        | "reports.submit"
        | "reports.list"
        | "timetable.get"
        | "notifications.generate"
        | "notifications.list"
        | "notifications.markRead"
        | "notifications.markAllRead"
        | "notifications.prefs.get"
        | "notifications.prefs.set" => Access::SignedIn,

        "users.list" => Access::Roles(&[Admin, Faculty]),

        "attendance.mark"
        | "attendance.branchSummary"
        | "fees.upsert"
        | "fees.markPaid"
        | "fees.branchSummary"
        | "assignments.create"
        | "assignments.update"
        | "assignments.delete"
        | "materials.upload"
        | "materials.delete"
        | "clubs.create"
        | "fundraising.create" => Access::Roles(&[Faculty, Admin]),

        "users.approve"
        | "users.reject"
        | "users.delete"
        | "subjects.create"
        | "subjects.update"
        | "subjects.delete"
        | "subjects.assignFaculty"
        | "timetable.setSlot"
        | "reports.resolve"
        | "settings.get"
        | "settings.update"
        | "backup.export"
        | "backup.import" => Access::Roles(&[Admin]),

        _ => return None,
    })
}

pub fn check_access(state: &AppState, method: &str) -> Result<(), ApiError> {
    let Some(policy) = policy_for(method) else {
        return Err(ApiError::new(
            "not_implemented",
            format!("unknown method: {method}"),
        ));
    };
    match policy {
        Access::Public => Ok(()),
        Access::SignedIn => {
            if state.session.is_some() {
                Ok(())
            } else {
                Err(ApiError::new("not_signed_in", "sign in first"))
            }
        }
        Access::Roles(roles) => {
            let Some(session) = state.session.as_ref() else {
                return Err(ApiError::new("not_signed_in", "sign in first"));
            };
            if roles.contains(&session.role) {
                Ok(())
            } else {
                Err(ApiError::forbidden(format!(
                    "{} may not call {method}",
                    session.role.as_str()
                )))
            }
        }
    }
}
