//! # labctl: Booking Control Layer for Shared Infrastructure
//!
//! `labctl` lets an organization publish bookable time windows ("slots") on
//! shared scientific infrastructure and lets end users request, and managers
//! approve or reject, bookings against those windows. The service guarantees
//! that no infrastructure is ever double-booked, that batch slot generation
//! never creates overlapping windows, that end-user cancellations respect a
//! time cutoff, and that stale windows are retired without manual
//! intervention.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for all persistence. A single `slots`
//! table holds every time window; claiming a slot flips its kind from
//! `timeslot` to `booking` and starts the approval state machine on the same
//! row.
//!
//! ### Request Flow
//!
//! Requests pass through a trusted upstream auth proxy that injects the
//! caller's identity and role as headers; the [`auth::Actor`] extractor turns
//! those into an explicit request-scoped context. Handlers perform
//! capability checks (`manager`/`admin` for publishing, approval, and
//! maintenance), then drive the [`db::handlers::Slots`] repository, which
//! owns every status transition. Overlap checks and their subsequent writes
//! share one transaction, serialized per infrastructure and date with
//! advisory locks, so concurrent writers cannot both claim the same window.
//!
//! ### Background Services
//!
//! A recurring expiry sweeper retires past-dated active slots to
//! `completed`; the same pass can be forced through the maintenance API.
//! Booking transitions emit best-effort email notifications after commit.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use labctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = labctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     labctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod notifications;
mod openapi;
mod sweeper;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::notifications::Notifier;
use crate::openapi::ApiDoc;
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{BookingId, InfrastructureId, QuestionId, SlotId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub notifier: Arc<Notifier>,
}

/// Get the labctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    let mut cors = CorsLayer::new().allow_credentials(cors_config.allow_credentials);

    if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_origin(tower_http::cors::Any);
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            origins.push(origin.parse::<HeaderValue>()?);
        }
        cors = cors.allow_origin(origins);
    }

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/infrastructures/{infrastructure_id}/slots",
            get(api::handlers::slots::list_available_slots).post(api::handlers::slots::create_slot),
        )
        .route(
            "/infrastructures/{infrastructure_id}/slots/batch",
            post(api::handlers::slots::create_batch_slots),
        )
        .route("/slots/{slot_id}/bookings", post(api::handlers::bookings::request_booking))
        .route("/bookings/{booking_id}", get(api::handlers::bookings::get_booking))
        .route("/bookings/{booking_id}/approve", post(api::handlers::bookings::approve_booking))
        .route("/bookings/{booking_id}/reject", post(api::handlers::bookings::reject_booking))
        .route("/bookings/{booking_id}/cancel", post(api::handlers::bookings::cancel_booking))
        .route("/maintenance/sweep", post(api::handlers::maintenance::force_sweep))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// When dropped, the `drop_guard` cancels the shutdown token, signaling all
/// tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Setup background services (the expiry sweeper)
fn setup_background_services(pool: PgPool, config: &Config, shutdown_token: tokio_util::sync::CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if config.sweeper.enabled {
        let sweeper_config = config.sweeper.clone();
        let sweeper_shutdown = shutdown_token.clone();
        let handle = tokio::spawn(async move {
            sweeper::run_expiry_sweeper(sweeper_config, pool, sweeper_shutdown).await;
        });
        background_tasks.push(handle);
    } else {
        info!("Expiry sweeper disabled by configuration");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts
///    handling requests
/// 3. **Shutdown**: when the shutdown signal resolves, background services
///    stop and connections close
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], but reuse an existing pool (used by tests,
    /// where the harness hands out per-test databases)
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        let pool = match pool {
            Some(pool) => pool,
            None => {
                sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .connect(&config.database.url)
                    .await?
            }
        };

        migrator().run(&pool).await?;

        let notifier = Arc::new(Notifier::new(&config).map_err(|e| anyhow::anyhow!("Failed to create notifier: {e}"))?);

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let bg_services = setup_background_services(pool.clone(), &config, shutdown_token);

        let state = AppState::builder().db(pool.clone()).config(config.clone()).notifier(notifier).build();
        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Booking control layer listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
