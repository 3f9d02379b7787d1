// rescue-planner-rs/src/main.rs
// Fire emergency rescue planner
// HTTP entry point: POST /rescue-plan, GET /health, GET /status

use anyhow::Context;
use rescue_planner::{build_state, http, PlannerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    config_rs::load_dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = PlannerConfig::from_env().context("invalid configuration")?;
    for endpoint in &config.endpoints {
        tracing::info!(
            service = %endpoint.name,
            url = %endpoint.base_url,
            timeout_secs = endpoint.timeout.as_secs_f64(),
            required = endpoint.required,
            "upstream service"
        );
    }

    let state = build_state(&config).context("failed to build service client")?;
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        "{} listening on {}",
        config_rs::get_formatted_service_name(rescue_planner::config::SERVICE_NAME),
        config.bind_addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}
