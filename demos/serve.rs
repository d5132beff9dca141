//! REST API server example
//!
//! Serves a directory with the archive pipeline enabled.
//!
//! ```text
//! cargo run --example serve -- [config.json]
//! ```
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:8080/swagger-ui
//! - List the root via GET http://localhost:8080/api/v1/list
//! - Build an archive via POST http://localhost:8080/api/v1/archive

use dirindex::{Config, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dirindex=info")),
        )
        .init();

    // Optional JSON config file; every field has a default
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Config>(&raw)?
        }
        None => Config::default(),
    };

    let address = config.server.api.bind_address;
    println!("Serving {:?}", config.listing.root_dir);
    println!("Swagger UI: http://{address}/swagger-ui");
    println!("API Base:   http://{address}/api/v1");
    println!();
    println!("Example commands:");
    println!("  # Stream progress for an archive of the whole root");
    println!("  curl -N -X POST http://{address}/api/v1/archive \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"mode\": \"all\", \"progress\": true}}'");
    println!();
    println!("  # Download the archive in one request");
    println!("  curl -OJ -X POST http://{address}/api/v1/archive \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"mode\": \"selected\", \"names\": [\"docs\"]}}'");

    run_with_shutdown(config).await?;
    Ok(())
}
