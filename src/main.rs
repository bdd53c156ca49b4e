use anyhow::Context;
use dotenv::dotenv;
use feedback_sentiment::api::{self, AppState};
use feedback_sentiment::auth::JwtSecret;
use feedback_sentiment::store::postgres;
use feedback_sentiment::store::PgFeedbackStore;
use feedback_sentiment::{Engine, RecalcConfig};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RecalcConfig::from_env()?;
    tracing::info!("⚙️ Loaded config: {:?}", config);

    let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = postgres::connect(&db_url, 5).await?;
    postgres::init_schema(&pool).await?;

    let jwt_secret = env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("⚠️ SUPABASE_JWT_SECRET not set; every recalculation request will be rejected");
        String::new()
    });

    let engine = Engine::from_config(Arc::new(PgFeedbackStore::new(pool)), config);
    let state = Arc::new(AppState {
        engine,
        jwt_secret: JwtSecret(jwt_secret),
    });

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
