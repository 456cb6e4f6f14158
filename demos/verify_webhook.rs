//! Example demonstrating webhook signature verification.
//!
//! This example shows how to:
//! - Verify an incoming webhook against the API secret
//! - Accept deliveries signed during a secret rotation
//! - Tell the verification failures apart
//!
//! Run with: `cargo run --example verify_webhook`

use authsignal::webhook::Webhook;
use authsignal::{Client, Error, WebhookError};
use std::time::{SystemTime, UNIX_EPOCH};

const PAYLOAD: &str = r#"{"version":1,"type":"email.created","id":"bc1598bc-e5d6-4c69-9afb-1a6fe3469d6e","source":"https://authsignal.com","time":"2025-02-20T01:51:56.070Z","tenantId":"7752d28e-e627-4b1b-bb81-b45d68d617bc","data":{"to":"user@example.com","code":"157743","verificationMethod":"EMAIL_OTP"}}"#;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("authsignal=debug")
        .init();

    let client = Client::new("my-api-secret")?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default();

    println!("=== Example 1: Valid Delivery ===");
    // A real handler reads this header from the incoming request.
    let header = client.webhook().signature_header(now, PAYLOAD);
    println!("Signature header: {}", header);

    let event = client.webhook().construct_event(PAYLOAD, &header)?;
    println!("Event {} ({}) for tenant {}", event.id, event.event_type, event.tenant_id);
    println!("Data: {:?}", event.data);
    println!();

    println!("=== Example 2: Rotated Secret ===");
    // During rotation the header carries one v2 signature per active secret.
    let previous = Webhook::new("my-previous-api-secret");
    let rotated = format!(
        "t={},v2={},v2={}",
        now,
        previous.compute_signature(now, PAYLOAD),
        client.webhook().compute_signature(now, PAYLOAD)
    );
    let event = client.webhook().construct_event(PAYLOAD, &rotated)?;
    println!("Accepted {} signed under both secrets", event.id);
    println!();

    println!("=== Example 3: Rejected Deliveries ===");
    let stale = client.webhook().signature_header(now - 3600, PAYLOAD);
    let cases = [
        ("malformed header", PAYLOAD, "123".to_string()),
        ("stale timestamp", PAYLOAD, stale),
        ("tampered body", r#"{"version":1}"#, header.clone()),
    ];

    for (label, payload, signature) in &cases {
        match client.webhook().construct_event(payload, signature) {
            Ok(event) => println!("{}: unexpectedly accepted {}", label, event.id),
            Err(WebhookError::InvalidSignatureFormat) => {
                println!("{}: header could not be parsed", label)
            }
            Err(WebhookError::TimestampOutsideTolerance) => {
                println!("{}: delivery is too old, possible replay", label)
            }
            Err(WebhookError::SignatureMismatch) => {
                println!("{}: signature does not match", label)
            }
            Err(e) => println!("{}: {}", label, e),
        }
    }

    Ok(())
}
