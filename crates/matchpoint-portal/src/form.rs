//! Ordered, multi-valued form bodies.
//!
//! The portal's submission payload needs the `duration` key twice — once
//! for the slot granularity, once for the requested total. A map-based
//! encoder would silently collapse the pair, so the body is an ordered list
//! of `(key, value)` pairs end to end.

use chrono::NaiveDate;
use matchpoint_store::BookingTemplate;

/// Field name the portal expects twice in every submission.
pub const DURATION_FIELD: &str = "duration";

/// An ordered `application/x-www-form-urlencoded` body that preserves
/// duplicate keys and insertion order.
#[derive(Debug, Default, Clone)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Percent-encode into the wire body. Duplicate keys survive because
    /// the underlying encoder walks the sequence as-is.
    pub fn encode(&self) -> String {
        // Encoding a Vec of string pairs cannot fail.
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }
}

/// Assemble the reservation payload in the order the portal's own form
/// submits it: hidden fields first, then the visible selection, the
/// double `duration`, and the challenge token last.
pub fn reservation_payload(
    hidden_fields: &[(String, String)],
    unit_id: &str,
    date: NaiveDate,
    template: &BookingTemplate,
    slot_minutes: u32,
    challenge_token: &str,
) -> FormBody {
    let mut body = FormBody::new();
    for (name, value) in hidden_fields {
        body.push(name.clone(), value.clone());
    }
    body.push("unit", unit_id);
    body.push("date", date.format("%Y-%m-%d").to_string());
    body.push("start_time", template.time_of_day.format("%H:%M").to_string());
    // Slot granularity first, requested total second. Both under the same
    // key on purpose.
    body.push(DURATION_FIELD, slot_minutes.to_string());
    body.push(DURATION_FIELD, template.duration_minutes.to_string());
    body.push("party_type", template.party_type.clone());
    body.push("party_size", template.party_size.to_string());
    body.push("challenge_token", challenge_token);
    body
}
