use rosterd::auth::token::TokenService;
use rosterd::config::Config;
use rosterd::http::AppState;
use rosterd::{db, http};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rosterd=info")),
        )
        .init();

    let cfg = Config::from_env();
    if cfg.token_secret_is_default {
        tracing::warn!("ROSTERD_TOKEN_SECRET not set; using the development secret");
    }

    let conn = db::open_db(&cfg.data_dir)?;
    if db::seed_default_admin(&conn)? {
        tracing::warn!("seeded default admin account (admin/admin); change its password");
    }

    let state = AppState::new(conn, TokenService::new(&cfg.token_secret));
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind.as_str()).await?;
    tracing::info!(addr = %cfg.bind, data_dir = %cfg.data_dir.display(), "rosterd listening");
    axum::serve(listener, app).await?;
    Ok(())
}
