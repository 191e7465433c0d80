//! Turnstile application entry point.
//!
//! Bootstraps the service:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Upsert the bootstrap super-admin
//! 4. Build router with API routes
//! 5. Apply security headers middleware
//! 6. Start Axum server
//!
//! Also supports a `hash-password` subcommand for generating Argon2id
//! hashes from the command line.

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use turnstile::{
    auth::middleware::AppState, auth::password::hash_password, config::Config,
    middleware::security_headers, routes, storage,
};

fn print_hash_usage() {
    eprintln!("Usage: turnstile hash-password <password>");
    eprintln!();
    eprintln!("Print the Argon2id hash of a password.");
}

#[tokio::main]
async fn main() {
    // Check for hash-password subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "hash-password" {
        if args.len() != 3 {
            print_hash_usage();
            std::process::exit(1);
        }
        match hash_password(&args[2]) {
            Ok(hash) => println!("{}", hash),
            Err(e) => {
                eprintln!("Error hashing password: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting turnstile on {}", config.bind_addr);

    // Connect to Redis
    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    // Verify Redis connection
    let mut con = redis_client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");

    // Upsert the bootstrap super-admin (permanent record)
    let admin_hash = hash_password(&config.admin_password).expect("Failed to hash admin password");
    storage::user::upsert_admin(&mut con, &config.admin_email, &config.admin_full_name, &admin_hash)
        .await
        .expect("Failed to upsert admin user");
    tracing::info!("Bootstrap admin '{}' configured", config.admin_email);

    // Build shared state
    let state = AppState {
        redis: redis_client,
        config: Arc::new(config.clone()),
    };

    // Explicit CORS: deny all cross-origin requests (same-origin deployment).
    // CorsLayer::new() with no allowed origins rejects all CORS preflight requests.
    let cors = CorsLayer::new();

    let app = routes::api_router()
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
