//! `matchpoint-portal` — the reservation submission protocol.
//!
//! # Overview
//!
//! One call to [`booker::PortalBooker`] drives the portal's full workflow
//! for a single instance:
//!
//! 1. form login (fresh cookie session, never shared across instances);
//! 2. availability fetch and free-window computation;
//! 3. unit selection (preferred court, or first free substitute when the
//!    template allows any);
//! 4. hidden-field extraction from the booking form, then — last, because
//!    the token only lives a few seconds — challenge-token acquisition;
//! 5. the form-encoded submission itself, where `duration` must appear
//!    twice (slot granularity and requested total) so the body is built
//!    from an ordered pair list, never a map.
//!
//! The terminal response is a redirect: to the confirmation resource
//! (carrying the confirmation id) or the error resource. [`outcome`] turns
//! that into the engine's [`matchpoint_scheduler::SubmissionOutcome`].

pub mod availability;
pub mod booker;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod form;
pub mod outcome;
pub mod session;
pub mod token;

pub use booker::PortalBooker;
pub use credentials::{ConfigCredentials, CredentialSource, PlatformCredentials};
pub use error::{PortalError, Result};
pub use form::FormBody;
pub use token::ChallengeToken;
