use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod auth;
mod common;
mod departments;
mod elections;
#[cfg(test)]
mod fixtures;
mod positions;
mod results;
mod voter;
mod voters;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(departments::routes());
    routes.extend(elections::routes());
    routes.extend(positions::routes());
    routes.extend(voters::routes());
    routes.extend(results::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render failures that never reached a handler (bad guards, malformed bodies, unknown routes)
/// in the same shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let message = match status.code {
        401 => "Not signed in",
        403 => "Not permitted for this account",
        _ => status.reason().unwrap_or("Request failed"),
    };
    (status, Json(ErrorBody::new(message)))
}
