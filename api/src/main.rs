use std::net::SocketAddr;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod error;
mod llm;
mod middleware;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pacer API",
        version = "0.1.0",
        description = "Fitness-coaching agenda service: multi-week training plans, daily check-in merging, and calendar-event conflict resolution."
    ),
    paths(
        routes::health::health_check,
        routes::agenda::create_agenda,
        routes::agenda::get_agenda,
        routes::agenda::update_agenda,
        routes::agenda::reset_agenda,
        routes::calendar::conflict_check,
        routes::calendar::join_event,
    ),
    components(schemas(
        routes::health::HealthResponse,
        pacer_core::error::ApiError,
        pacer_core::agenda::Weekday,
        pacer_core::agenda::Session,
        pacer_core::agenda::SessionPatch,
        pacer_core::agenda::Week,
        pacer_core::agenda::WeekPatch,
        pacer_core::agenda::AgendaPatch,
        pacer_core::agenda::Agenda,
        pacer_core::calendar::Event,
        pacer_core::conflict::Conflict,
        pacer_core::conflict::Resolution,
        routes::agenda::CreateAgendaRequest,
        routes::agenda::AgendaResponse,
        routes::agenda::AgendaDeletedResponse,
        routes::calendar::ConflictCheckRequest,
        routes::calendar::ConflictCheckResponse,
        routes::calendar::JoinEventRequest,
        routes::calendar::JoinEventResponse,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pacer_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState {
        db: pool,
        generator: llm::GenerationClient::from_env(),
    };

    // CORS
    let cors_layer = middleware::cors::build_cors_layer();

    // Router with per-group rate limiting
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::agenda::write_router().layer(middleware::rate_limit::agenda_write_layer()))
        .merge(routes::agenda::read_router().layer(middleware::rate_limit::agenda_read_layer()))
        .merge(routes::calendar::router().layer(middleware::rate_limit::calendar_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Pacer API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
