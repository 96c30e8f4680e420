//! Interpreting the submission's terminal response.
//!
//! The portal answers a submission with a redirect: to the confirmation
//! resource (success, id in the query) or to the error resource (reason in
//! the query when it supplies one). Anything else is treated as a transient
//! portal fault and handed to the retry policy.

use reqwest::StatusCode;
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::extract;

/// Path fragment of the confirmation resource.
const CONFIRMATION_PATH: &str = "/reserve/confirmation";
/// Path fragment of the error resource.
const ERROR_PATH: &str = "/reserve/error";

/// Turn the submit response's status + `Location` into a confirmation id,
/// or the most specific error the response supports.
pub fn interpret(status: StatusCode, location: Option<&str>) -> Result<String> {
    if !status.is_redirection() {
        return Err(PortalError::Portal {
            reason: format!("submission answered {status} instead of a redirect"),
        });
    }
    let Some(location) = location else {
        return Err(PortalError::MalformedResponse(
            "redirect without Location header".to_string(),
        ));
    };
    debug!(%status, location, "submission redirect");

    if location.contains(CONFIRMATION_PATH) {
        return extract::confirmation_id(location);
    }

    if location.contains(ERROR_PATH) {
        let reason = extract::query_param(location, "reason")
            .unwrap_or_else(|| "portal reported an unspecified error".to_string());
        if reason.to_ascii_lowercase().contains("token") {
            return Err(PortalError::TokenRejected { reason });
        }
        return Err(PortalError::Portal { reason });
    }

    Err(PortalError::MalformedResponse(format!(
        "unexpected redirect target: {location}"
    )))
}
