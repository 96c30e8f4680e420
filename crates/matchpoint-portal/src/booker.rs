//! The full submission workflow for one instance, start to finish.

use std::sync::Arc;

use async_trait::async_trait;
use matchpoint_core::config::PortalConfig;
use matchpoint_scheduler::{SubmissionExecutor, SubmissionOutcome};
use matchpoint_store::{BookingInstance, BookingTemplate};
use tracing::{info, instrument, warn};

use crate::availability::choose_unit;
use crate::credentials::CredentialSource;
use crate::error::{PortalError, Result};
use crate::extract;
use crate::form::reservation_payload;
use crate::outcome;
use crate::session::PortalSession;

/// Drives one complete portal session per submission attempt. Stateless
/// between attempts on purpose: every execution logs in afresh, and the
/// session (cookies and all) dies with the attempt.
pub struct PortalBooker {
    cfg: PortalConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl PortalBooker {
    pub fn new(cfg: PortalConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        Self { cfg, credentials }
    }

    /// The five protocol steps, strictly in order. Steps 1–3 and the
    /// hidden-field extraction all happen before the token is minted, so
    /// the token's few-second budget is spent only on the submit itself.
    #[instrument(skip_all, fields(instance_id = %instance.id, date = %instance.date))]
    pub async fn book(
        &self,
        template: &BookingTemplate,
        instance: &BookingInstance,
    ) -> Result<String> {
        let creds = self.credentials.lookup(&template.owner_id).await?;
        let session = PortalSession::login(&self.cfg, &creds).await?;

        let day = session.fetch_availability(instance.date).await?;
        let unit = choose_unit(
            &day,
            template.preferred_unit.as_deref(),
            template.accept_any_unit,
            template.time_of_day,
            template.duration_minutes,
        )?;
        if template
            .preferred_unit
            .as_deref()
            .is_some_and(|preferred| preferred != unit)
        {
            info!(unit, "preferred unit taken, booking substitute");
        }

        let form_html = session.fetch_booking_form(&unit, instance.date).await?;
        let hidden = extract::hidden_fields(&form_html);

        // Last preparatory step: the token clock starts here.
        let token = session.acquire_token().await?;
        let payload = reservation_payload(
            &hidden,
            &unit,
            instance.date,
            template,
            self.cfg.slot_minutes,
            token.value(),
        );
        let (status, location) = session.submit(payload, &token).await?;

        let confirmation_id = outcome::interpret(status, location.as_deref())?;
        info!(confirmation_id, unit, "reservation confirmed");
        Ok(confirmation_id)
    }
}

#[async_trait]
impl SubmissionExecutor for PortalBooker {
    async fn execute(
        &self,
        template: Option<&BookingTemplate>,
        instance: &BookingInstance,
    ) -> SubmissionOutcome {
        let Some(template) = template else {
            return SubmissionOutcome::Permanent {
                detail: PortalError::MissingTemplate {
                    instance_id: instance.id.clone(),
                }
                .to_string(),
            };
        };

        match self.book(template, instance).await {
            Ok(confirmation_id) => SubmissionOutcome::Confirmed { confirmation_id },
            Err(e) if e.is_permanent() => {
                warn!(instance_id = %instance.id, "permanent submission failure: {e}");
                SubmissionOutcome::Permanent {
                    detail: e.to_string(),
                }
            }
            Err(e) => {
                warn!(instance_id = %instance.id, "transient submission failure: {e}");
                SubmissionOutcome::Transient {
                    detail: e.to_string(),
                }
            }
        }
    }
}
