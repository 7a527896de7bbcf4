//! HTTP front end for the member portal.
//!
//! Pages fetch `/view/<shortcode>` (or post their content to `/render`) and get JSON
//! views back; forms post to `/forms/<kind>` and follow the redirect. Admin routes live
//! under `/admin`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use api::db::{get_pool, PgStore};
use api::geocode::{GeocodeService, GoogleGeocoder};
use api::mail::LogMailer;
use api::payment::StripeGateway;
use api::{lifecycle, Portal, Settings};
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod admin;
mod error;
mod routes;
mod state;

use state::{ensure_admin, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().context("failed to load settings")?;

    // Initialize database pool
    let pool = get_pool(&settings.database.url())
        .await
        .context("failed to connect to database")?;

    // Run migrations
    sqlx::migrate!("../api/migrations")
        .run(pool)
        .await
        .context("failed to run migrations")?;

    // Create session store
    let session_store = PostgresStore::new(pool.clone());
    session_store
        .migrate()
        .await
        .context("failed to migrate session store")?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time_duration(settings.session.days)?));

    let store = PgStore::new(pool.clone());
    ensure_admin(&store, &settings.admin)
        .await
        .context("failed to prepare the administrator account")?;

    let mut builder = Portal::builder(store, settings.token.secret.clone())
        .gateway(Arc::new(StripeGateway::new()))
        .mailer(Arc::new(LogMailer {
            from: settings.mail.from.clone(),
        }));
    if settings.geocoding_enabled() {
        builder = builder.geocoder(GeocodeService::new(
            Arc::new(GoogleGeocoder::new(settings.geocoder.key.clone())),
            chrono::Duration::seconds(settings.geocoder.interval as i64),
        ));
    } else {
        tracing::warn!("no geocoder key configured, the member map shows stored coordinates only");
    }
    let portal = builder.build().context("failed to register form fields")?;
    lifecycle::activate(portal.repo())
        .await
        .context("failed to activate the portal")?;

    let router = axum::Router::new()
        .merge(routes::router())
        .merge(admin::router())
        .with_state(AppState::new(portal))
        .layer(session_layer);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind))?;
    tracing::info!("Server listening on {}", settings.server.bind);

    axum::serve(listener, router.into_make_service())
        .await
        .context("server error")?;
    Ok(())
}

fn time_duration(days: u64) -> anyhow::Result<tower_sessions::cookie::time::Duration> {
    Duration::from_secs(60 * 60 * 24 * days)
        .try_into()
        .context("session lifetime out of range")
}
