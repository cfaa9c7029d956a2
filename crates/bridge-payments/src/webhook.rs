//! Stripe Webhook Verification
//!
//! Authenticates inbound webhooks against the raw request bytes and turns the
//! payload into a typed event. The signature header has the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`, where the HMAC-SHA256 covers
//! `"<t>." + body`.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::metadata::CheckoutMetadata;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe's recommended replay window
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Event type for a paid checkout
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Raw verified event envelope
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayEvent {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: EventData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Checkout session as delivered in `checkout.session.completed`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: String,

    #[serde(default)]
    pub payment_intent: Option<String>,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Payment collected - replicate into the ERP
    CheckoutCompleted(CompletedSession),

    /// Anything else is acknowledged and ignored
    Other { event_type: String },
}

impl GatewayEvent {
    /// Classify the event, decoding the session object when it matters
    pub fn classify(&self) -> Result<WebhookEvent> {
        if self.event_type == CHECKOUT_SESSION_COMPLETED {
            let session = CompletedSession::deserialize(&self.data.object).map_err(|e| {
                PaymentError::Parse(format!("Invalid checkout session data: {e}"))
            })?;
            Ok(WebhookEvent::CheckoutCompleted(session))
        } else {
            Ok(WebhookEvent::Other {
                event_type: self.event_type.clone(),
            })
        }
    }
}

/// Parsed `stripe-signature` header
#[derive(Debug)]
struct SignatureHeader<'a> {
    timestamp: &'a str,
    signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(header: &'a str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let part = part.trim();
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                signatures.push(s);
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::Signature("no timestamp in signature header".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::Signature("no v1 signature in header".into()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Webhook verifier bound to one shared secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify `payload` exactly as received and parse the event
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<GatewayEvent> {
        self.verify_at(payload, signature, Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<GatewayEvent> {
        let header = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(PaymentError::MissingSignature)?;
        let header = SignatureHeader::parse(header)?;

        let timestamp: i64 = header
            .timestamp
            .parse()
            .map_err(|_| PaymentError::Signature("invalid timestamp in signature header".into()))?;
        let age = now
            .checked_sub(timestamp)
            .ok_or_else(|| PaymentError::Signature("timestamp out of range".into()))?;
        if age > self.tolerance_secs {
            return Err(PaymentError::Signature(format!(
                "timestamp too old (age={age}s, max={}s)",
                self.tolerance_secs
            )));
        }
        if age < self.tolerance_secs.saturating_neg() {
            return Err(PaymentError::Signature(format!(
                "timestamp in the future (age={age}s)"
            )));
        }

        let mac = self.mac_for(header.timestamp, payload)?;
        let matched = header.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(PaymentError::Signature(
                "no signature matches the payload".into(),
            ));
        }

        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::Parse(format!("Invalid webhook payload: {e}")))
    }

    /// Build a signature header for `payload` (local tooling and tests)
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let ts = timestamp.to_string();
        let mac = self.mac_for(&ts, payload)?;
        Ok(format!(
            "t={ts},v1={}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    fn mac_for(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| PaymentError::Config("invalid webhook secret".into()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1_760_000_000;

    fn completed_payload() -> Vec<u8> {
        br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_test_1","payment_intent":"pi_1","metadata":{"customer_email":"a@b.com"}}}}"#.to_vec()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let header = verifier.sign(&payload, NOW).unwrap();

        let event = verifier.verify_at(&payload, Some(&header), NOW).unwrap();
        assert_eq!(event.event_type, CHECKOUT_SESSION_COMPLETED);
        match event.classify().unwrap() {
            WebhookEvent::CheckoutCompleted(session) => {
                assert_eq!(session.id, "cs_test_1");
                assert_eq!(session.payment_intent.as_deref(), Some("pi_1"));
                assert_eq!(session.metadata.get("customer_email"), "a@b.com");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = completed_payload();
        let header = WebhookVerifier::new("wrong_secret").sign(&payload, NOW).unwrap();

        let err = WebhookVerifier::new(SECRET)
            .verify_at(&payload, Some(&header), NOW)
            .unwrap_err();
        assert!(matches!(err, PaymentError::Signature(_)));
    }

    #[test]
    fn test_any_single_byte_mutation_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let header = verifier.sign(&payload, NOW).unwrap();

        for idx in 0..payload.len() {
            let mut mutated = payload.clone();
            mutated[idx] ^= 0x01;
            let result = verifier.verify_at(&mutated, Some(&header), NOW);
            assert!(
                matches!(result, Err(PaymentError::Signature(_))),
                "mutation at byte {idx} was accepted"
            );
        }
    }

    #[test]
    fn test_reserialized_body_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = br#"{"id":"evt_1", "type":"customer.created", "data":{"object":{}}}"#;
        let header = verifier.sign(payload, NOW).unwrap();

        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        let reserialized = serde_json::to_vec(&value).unwrap();
        assert_ne!(reserialized, payload.to_vec());
        assert!(verifier.verify_at(&reserialized, Some(&header), NOW).is_err());
        assert!(verifier.verify_at(payload, Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_missing_header_rejected_first() {
        let verifier = WebhookVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify_at(b"not json", None, NOW),
            Err(PaymentError::MissingSignature)
        ));
        assert!(matches!(
            verifier.verify_at(b"not json", Some("  "), NOW),
            Err(PaymentError::MissingSignature)
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        for header in [
            "garbage",
            "t=123",
            "v1=abcd",
            "t=abc,v1=00",
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(matches!(
                verifier.verify_at(&payload, Some(header), NOW),
                Err(PaymentError::Signature(_))
            ));
        }
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let header = verifier.sign(&payload, NOW - 600).unwrap();
        assert!(verifier.verify_at(&payload, Some(&header), NOW).is_err());

        let relaxed = WebhookVerifier::new(SECRET).with_tolerance(3600);
        assert!(relaxed.verify_at(&payload, Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_second_v1_signature_matches() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let good = verifier.sign(&payload, NOW).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1={},v1={good_sig}", "0".repeat(64));
        assert!(verifier.verify_at(&payload, Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_other_event_classified() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = br#"{"id":"evt_2","type":"payment_intent.created","data":{"object":{}}}"#;
        let header = verifier.sign(payload, NOW).unwrap();
        let event = verifier.verify_at(payload, Some(&header), NOW).unwrap();
        assert!(matches!(
            event.classify().unwrap(),
            WebhookEvent::Other { ref event_type } if event_type == "payment_intent.created"
        ));
    }

    #[test]
    fn test_completed_event_without_session_id_is_parse_error() {
        let event: GatewayEvent = serde_json::from_str(
            r#"{"type":"checkout.session.completed","data":{"object":{"metadata":{}}}}"#,
        )
        .unwrap();
        assert!(matches!(event.classify(), Err(PaymentError::Parse(_))));
    }
}
