use thiserror::Error;

/// Everything that can go wrong while talking to the booking portal.
///
/// The split that matters to the engine is permanent vs. transient:
/// permanent failures end the instance, transient ones go back to the
/// retry queue with a fresh session (and a fresh token) next time.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Login rejected, or the portal bounced us back to the login page
    /// mid-workflow. Permanent — retrying with the same credentials cannot
    /// help.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The requested slot is taken and no acceptable substitute exists.
    /// Permanent for this instance.
    #[error("no availability on {date}: {detail}")]
    AvailabilityConflict {
        date: chrono::NaiveDate,
        detail: String,
    },

    /// No decrypted credentials for this owner. Permanent.
    #[error("no platform credentials for owner {owner_id}")]
    MissingCredentials { owner_id: String },

    /// Instance has no surviving parent template to book from. Permanent.
    #[error("instance {instance_id} has no template to book from")]
    MissingTemplate { instance_id: String },

    /// Network-level failure or timeout. Transient.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The acquired challenge token outlived its validity budget before we
    /// could submit. Transient; the next attempt mints a new one.
    #[error("challenge token expired before submission ({budget_secs}s budget)")]
    TokenExpired { budget_secs: u64 },

    /// The portal refused the token it just issued. Transient; the token is
    /// single-use and is never resubmitted.
    #[error("challenge token rejected: {reason}")]
    TokenRejected { reason: String },

    /// A response we could not make sense of. Transient, capped by the
    /// engine's retry policy.
    #[error("malformed portal response: {0}")]
    MalformedResponse(String),

    /// The portal reported an error we have no specific handling for.
    /// Transient, capped.
    #[error("portal error: {reason}")]
    Portal { reason: String },
}

impl PortalError {
    /// Should the engine stop retrying this instance?
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PortalError::Authentication(_)
                | PortalError::AvailabilityConflict { .. }
                | PortalError::MissingCredentials { .. }
                | PortalError::MissingTemplate { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanence_split() {
        assert!(PortalError::Authentication("bad password".into()).is_permanent());
        assert!(PortalError::MissingCredentials {
            owner_id: "u1".into()
        }
        .is_permanent());
        assert!(!PortalError::TokenRejected {
            reason: "stale".into()
        }
        .is_permanent());
        assert!(!PortalError::Portal {
            reason: "500".into()
        }
        .is_permanent());
        assert!(!PortalError::TokenExpired { budget_secs: 5 }.is_permanent());
        assert!(!PortalError::MalformedResponse("??".into()).is_permanent());
    }
}
