use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use whatismyip_server::ServerConfig;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "whatismyipd",
    about = "whatismyipd — report the caller's IP and manage an IP allowlist",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,
    /// Host to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Log level: error, warn, info, debug, trace
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
    /// Comma-separated IPs seeding the in-memory allowlist (empty = open)
    #[arg(long, env = "ALLOWED_IP")]
    allowed_ip: Option<String>,
    /// `user:pass` required by the allowlist management endpoints
    #[arg(long, env = "BASIC_AUTH", hide_env_values = true)]
    basic_auth: Option<String>,
    /// GCP project; when set the allowlist lives in Firestore
    #[arg(long, env = "GCP_PROJECT")]
    project: Option<String>,
    /// Firestore emulator `host:port`
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    firestore_emulator_host: Option<String>,
    /// Static Firestore bearer token (skips the metadata server)
    #[arg(long, env = "FIRESTORE_TOKEN", hide_env_values = true)]
    firestore_token: Option<String>,
    /// Comma-separated CORS origins (default: any)
    #[arg(long, env = "CORS_ORIGINS")]
    cors_origins: Option<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .init();

    whatismyip_server::run(server_config(cli)).await
}

/// Empty values (e.g. `GCP_PROJECT=`) count as unset for the optional
/// backend settings.
fn server_config(cli: Cli) -> ServerConfig {
    ServerConfig {
        host: cli.host,
        port: cli.port,
        allowed_ip: cli.allowed_ip,
        basic_auth: cli.basic_auth,
        project_id: non_empty(cli.project),
        firestore_emulator_host: non_empty(cli.firestore_emulator_host),
        firestore_token: non_empty(cli.firestore_token),
        cors_origins: cli.cors_origins,
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}
