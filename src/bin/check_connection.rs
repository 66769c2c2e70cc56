//! Standalone connectivity probe for the Discord side of the relay.
//!
//! Reads `DISCORD_WEBHOOK_URL` and `PROXY_URL` from the environment (or a
//! local `.env`) and reports which of the direct, proxied, and multipart
//! dispatch paths actually work. Useful when the relay runs but nothing
//! arrives in the channel.

use std::time::Duration;

use tg_discord_relay::config::{ENV_PROXY_URL, ENV_WEBHOOK_URL};

/// Timeout for the plain reachability probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the real test dispatch.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let webhook_url = match std::env::var(ENV_WEBHOOK_URL) {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("✗ {ENV_WEBHOOK_URL} is not set, nothing to probe");
            std::process::exit(1);
        }
    };
    let proxy_url = std::env::var(ENV_PROXY_URL)
        .ok()
        .filter(|url| !url.trim().is_empty());

    println!("Probing Discord connectivity...");
    match &proxy_url {
        Some(proxy) => println!("Proxy configured: {proxy}"),
        None => println!("No proxy configured, testing direct connection only"),
    }

    println!("\n1. Direct connection to the webhook...");
    match client(PROBE_TIMEOUT, None)?.get(&webhook_url).send().await {
        Ok(response) if response.status().is_success() => {
            println!("  ✓ Direct connection works");
        }
        Ok(response) => println!("  ✗ Webhook returned status {}", response.status()),
        Err(e) => println!("  ✗ Direct connection failed: {e}"),
    }

    if let Some(proxy) = &proxy_url {
        println!("\n2. Connection through the proxy...");
        match client(PROBE_TIMEOUT, Some(proxy)) {
            Ok(proxied) => match proxied.get(&webhook_url).send().await {
                Ok(response) if response.status().is_success() => {
                    println!("  ✓ Proxy works");
                }
                Ok(response) => {
                    println!("  ✗ Webhook returned status {} via proxy", response.status());
                }
                Err(e) => {
                    println!("  ✗ Proxy connection failed: {e}");
                    println!("  Possible causes:");
                    println!("    - the proxy server is not responding");
                    println!("    - the proxy requires authentication");
                    println!("    - the proxy is blocked from this network");
                    println!("    - the proxy URL is malformed");
                }
            },
            Err(e) => println!("  ✗ Unusable proxy URL: {e}"),
        }
    }

    println!("\n3. Test message through the webhook...");
    let dispatcher = match proxy_url.as_deref().map(|p| client(DISPATCH_TIMEOUT, Some(p))) {
        Some(Ok(proxied)) => proxied,
        Some(Err(e)) => {
            println!("  Could not build a proxied client ({e}), dispatching directly");
            client(DISPATCH_TIMEOUT, None)?
        }
        None => client(DISPATCH_TIMEOUT, None)?,
    };

    let form = reqwest::multipart::Form::new().text("content", "🧪 Relay connectivity test");
    match dispatcher.post(&webhook_url).multipart(form).send().await {
        Ok(response) if response.status().is_success() => {
            println!("  ✓ Webhook accepted the test message");
        }
        Ok(response) => {
            println!("  ✗ Webhook refused the test message: status {}", response.status());
        }
        Err(e) => println!("  ✗ Dispatch failed: {e}"),
    }

    Ok(())
}

fn client(timeout: Duration, proxy_url: Option<&str>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy_url) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }
    builder.build()
}
