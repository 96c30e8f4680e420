//! One authenticated portal session — owned by exactly one instance's
//! submission and dropped with it.
//!
//! The session wraps its own `reqwest::Client` with a private cookie store;
//! nothing here is shared or reused across instances, so credentials never
//! bleed between users and a stale session can never be submitted on.
//! Redirects are not followed: the submission protocol reads `Location`
//! headers itself.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use matchpoint_core::config::PortalConfig;

use crate::availability::DayAvailability;
use crate::credentials::PlatformCredentials;
use crate::error::{PortalError, Result};
use crate::form::FormBody;
use crate::token::ChallengeToken;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct PortalSession {
    client: Client,
    base_url: String,
    token_budget: Duration,
}

#[derive(Deserialize)]
struct ChallengeResponse {
    token: String,
}

impl PortalSession {
    /// Authenticate and return a live session. The credentials are used for
    /// this one POST and not retained.
    #[instrument(skip_all, fields(username = %creds.username))]
    pub async fn login(cfg: &PortalConfig, creds: &PlatformCredentials) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .redirect(redirect::Policy::none())
            .build()?;

        let session = Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token_budget: Duration::from_secs(cfg.token_budget_secs),
        };

        let mut body = FormBody::new();
        body.push("username", creds.username.clone());
        body.push("password", creds.password.clone());

        let resp = session
            .client
            .post(format!("{}/account/login", session.base_url))
            .header("content-type", FORM_CONTENT_TYPE)
            .body(body.encode())
            .send()
            .await?;

        let status = resp.status();
        match status {
            s if s.is_redirection() => {
                debug!("portal login accepted");
                Ok(session)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortalError::Authentication(
                "portal rejected the credentials".to_string(),
            )),
            s if s.is_success() => {
                // A 200 that re-serves the login form is a rejection too.
                let text = resp.text().await.unwrap_or_default();
                if text.contains("name=\"password\"") {
                    Err(PortalError::Authentication(
                        "portal re-served the login form".to_string(),
                    ))
                } else {
                    debug!("portal login accepted");
                    Ok(session)
                }
            }
            s => Err(PortalError::Portal {
                reason: format!("login answered {s}"),
            }),
        }
    }

    /// Per-unit operating hours and booked intervals for one date.
    pub async fn fetch_availability(&self, date: NaiveDate) -> Result<DayAvailability> {
        let resp = self
            .client
            .get(format!("{}/api/availability", self.base_url))
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await?;
        let resp = self.ensure_authenticated(resp, "availability")?;

        resp.json().await.map_err(|e| {
            PortalError::MalformedResponse(format!("availability payload: {e}"))
        })
    }

    /// The server-rendered booking form, source of the hidden fields that
    /// must be echoed back on submit.
    pub async fn fetch_booking_form(&self, unit_id: &str, date: NaiveDate) -> Result<String> {
        let resp = self
            .client
            .get(format!("{}/reserve/new", self.base_url))
            .query(&[
                ("unit", unit_id.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await?;
        let resp = self.ensure_authenticated(resp, "booking form")?;
        Ok(resp.text().await?)
    }

    /// Mint the single-use challenge token. Call this last — the clock on
    /// its validity budget starts now.
    pub async fn acquire_token(&self) -> Result<ChallengeToken> {
        let resp = self
            .client
            .get(format!("{}/api/challenge", self.base_url))
            .send()
            .await?;
        let resp = self.ensure_authenticated(resp, "challenge")?;

        let challenge: ChallengeResponse = resp
            .json()
            .await
            .map_err(|e| PortalError::MalformedResponse(format!("challenge payload: {e}")))?;
        debug!("challenge token acquired");
        Ok(ChallengeToken::new(challenge.token, self.token_budget))
    }

    /// POST the reservation. Refuses to send a token past its deadline —
    /// the portal would reject it anyway and tokens are single-use.
    /// Returns the raw terminal status and `Location` for interpretation.
    pub async fn submit(
        &self,
        payload: FormBody,
        token: &ChallengeToken,
    ) -> Result<(StatusCode, Option<String>)> {
        if token.is_expired() {
            warn!("challenge token missed its submission deadline");
            return Err(PortalError::TokenExpired {
                budget_secs: token.budget().as_secs(),
            });
        }

        let resp = self
            .client
            .post(format!("{}/reserve", self.base_url))
            .header("content-type", FORM_CONTENT_TYPE)
            .body(payload.encode())
            .send()
            .await?;

        let status = resp.status();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Ok((status, location))
    }

    /// A 401/403, or a bounce to the login page, means the session died
    /// mid-workflow — an authentication failure, not a portal fault.
    fn ensure_authenticated(
        &self,
        resp: reqwest::Response,
        step: &str,
    ) -> Result<reqwest::Response> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PortalError::Authentication(format!(
                "session rejected during {step} fetch"
            )));
        }
        if status.is_redirection() {
            let to_login = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|loc| loc.contains("/account/login"));
            if to_login {
                return Err(PortalError::Authentication(format!(
                    "session expired during {step} fetch"
                )));
            }
        }
        if !status.is_success() {
            return Err(PortalError::Portal {
                reason: format!("{step} answered {status}"),
            });
        }
        Ok(resp)
    }
}
