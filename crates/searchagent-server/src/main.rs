use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use searchagent::{Orchestrator, WEB_SEARCH_TOOL};
use searchagent_openai::{OpenAiConfig, OpenAiResponsesClient};
use searchagent_server::config::{self, ServeArgs};
use searchagent_server::{app, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "searchagent")]
#[command(about = "Web search agent HTTP service (OpenAI Responses API)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Diagnose configuration issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing(default_filter: &str) {
    // Logs go to stderr so `doctor`/`version` stdout stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    init_tracing(args.log_filter());

    let openai = args.openai_config()?;
    let cors = args.cors_layer()?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("searchagent/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;
    let gateway = OpenAiResponsesClient::new(http, openai).context("configuring OpenAI gateway")?;
    let base_url = gateway.base_url().to_string();
    let orchestrator = Orchestrator::new(Arc::new(gateway), args.orchestrator_config());

    let router = app(AppState::new(orchestrator.clone())).layer(cors);
    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("binding {}:{}", args.host, args.port))?;
    info!(
        addr = %listener.local_addr()?,
        model = orchestrator.model(),
        base_url = %base_url,
        default_context_size = %orchestrator.default_context_size(),
        "searchagent listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("searchagent stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn doctor(args: DoctorCmd) -> Result<()> {
    let t0 = std::time::Instant::now();
    let s = &args.serve;
    let mut checks: Vec<serde_json::Value> = Vec::new();

    // Booleans only; never print the key itself.
    let key_ok = s.api_key_configured();
    checks.push(serde_json::json!({
        "name": "openai_api_key",
        "ok": key_ok,
        "message": if key_ok { "OpenAI API key is set" } else { "OpenAI API key is missing" },
        "hint": if key_ok { "" } else { "Set OPENAI_API_KEY (or pass --api-key / use a .env file)." },
    }));

    // Validate url and model independently of the key.
    let mut candidate = OpenAiConfig::new("doctor-check");
    candidate.base_url = s.base_url.clone();
    candidate.model = s.model.clone();
    let base_ok = OpenAiResponsesClient::new(reqwest::Client::new(), candidate).is_ok();
    checks.push(serde_json::json!({
        "name": "openai_base_url",
        "ok": base_ok,
        "message": if base_ok { "base url and model are valid" } else { "base url or model is invalid" },
        "hint": if base_ok { "" } else { "OPENAI_BASE_URL must be an http(s) origin, e.g. https://api.openai.com" },
    }));

    let cors_ok = s.cors_layer().is_ok();
    checks.push(serde_json::json!({
        "name": "allowed_origins",
        "ok": cors_ok,
        "message": if cors_ok { "allowed origins parse" } else { "allowed origins contain an invalid value" },
        "hint": if cors_ok { "" } else { "ALLOWED_ORIGINS is a comma-separated list of origins, or *" },
    }));

    let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "searchagent",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "openai": key_ok,
            "model": s.model,
            "base_url": s.base_url,
            "default_context_size": s.default_context_size,
            "timeout_ms": s.timeout_ms,
            "bind": format!("{}:{}", s.host, s.port),
            "debug": s.debug,
            "tool": WEB_SEARCH_TOOL,
        },
        "checks": checks,
    });
    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("searchagent {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!("model: {} base_url: {}", s.model, s.base_url);
            println!("openai key: {}", if key_ok { "set" } else { "missing" });
            println!("checks:");
            if let Some(arr) = payload["checks"].as_array() {
                for c in arr {
                    let name = c["name"].as_str().unwrap_or("?");
                    let ok = c["ok"].as_bool().unwrap_or(false);
                    println!("- {}: {}", name, if ok { "ok" } else { "fail" });
                }
            }
        }
        _ => println!("{payload}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env_file();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Doctor(args) => doctor(args)?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "searchagent",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("searchagent {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
