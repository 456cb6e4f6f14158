//! Example demonstrating retries and the retry observer.
//!
//! This example shows how to:
//! - Configure the retry budget and backoff
//! - Watch every retry through `on_retry`
//! - Inspect the transport error once retries are exhausted
//!
//! It targets a closed local port, so every attempt is refused.
//!
//! Run with: `cargo run --example retry_observer`

use authsignal::retry::RetryPolicy;
use authsignal::{Client, Error, RequestDescriptor};
use std::net::TcpListener;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("authsignal=info,retry_observer=info")
        .init();

    // Bind then drop a listener to find a port nobody is listening on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map_err(|e| Error::ConfigurationError(e.to_string()))?;

    println!("=== Example 1: Default Policy ===");
    let client = Client::builder()
        .secret("my-api-secret")
        .base_url(format!("http://{}/v1", addr))
        .on_retry(|retry, error| match error {
            Some(e) => println!("  retry #{} after {} ({:?})", retry, e, e.kind()),
            None => println!("  retry #{} after a server error", retry),
        })
        .build()?;

    let start = Instant::now();
    match client.get::<serde_json::Value>("/users/123").await {
        Ok(response) => println!("Success after {} attempts", response.attempts),
        Err(Error::Transport(e)) => println!(
            "Gave up after {:?}: {} (retryable: {})",
            start.elapsed(),
            e,
            e.is_retryable()
        ),
        Err(e) => println!("Failed: {}", e),
    }
    println!();

    println!("=== Example 2: More Retries, Shorter Backoff ===");
    let policy = RetryPolicy::new().with_base_delay(Duration::from_millis(20));
    println!(
        "Worst-case backoff for 4 retries: {:?}",
        policy.worst_case_backoff(4)
    );

    let client = Client::builder()
        .secret("my-api-secret")
        .base_url(format!("http://{}/v1", addr))
        .retries(4)
        .retry_policy(policy)
        .on_retry(|retry, _| println!("  retry #{}", retry))
        .build()?;

    // Connection failures are retried for writes too.
    let descriptor = RequestDescriptor::post("/users/123/actions/signIn")
        .with_json_body(&serde_json::json!({ "redirectUrl": "https://example.com" }))?;
    if let Err(e) = client.execute(&descriptor).await {
        println!("Failed: {}", e);
    }

    Ok(())
}
