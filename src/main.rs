use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use tower_http::trace::TraceLayer;

use pharmacy_platform::{
    chat,
    core::{app_state::AppState, bootstrap, config, db, swagger},
    routes,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let routes = routes::auth::routes_with_openapi()
        .merge(routes::staff::routes_with_openapi())
        .merge(routes::countries::routes_with_openapi())
        .merge(routes::manufacturers::routes_with_openapi())
        .merge(routes::brands::routes_with_openapi())
        .merge(routes::categories::routes_with_openapi())
        .merge(routes::products::routes_with_openapi())
        .merge(routes::banners::routes_with_openapi())
        .merge(routes::branches::routes_with_openapi())
        .merge(routes::shipping_methods::routes_with_openapi())
        .merge(routes::payment_types::routes_with_openapi())
        .merge(routes::promotions::routes_with_openapi())
        .merge(routes::reviews::routes_with_openapi())
        .merge(routes::prescriptions::routes_with_openapi())
        .merge(routes::customers::carts::routes_with_openapi())
        .merge(routes::customers::orders::routes_with_openapi())
        .merge(routes::orders::routes_with_openapi())
        .merge(routes::consultations::routes_with_openapi())
        .merge(routes::statistics::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Pharmacy Platform API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    tracing::info!("Running migrations...");
    let config = config::load()?;
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database.url).await?;
    let state = AppState::new(db_pool);

    let app = Router::new()
        .merge(routes)
        .merge(chat::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(swagger_ui);

    bootstrap::serve("PharmacyPlatform", app, &config.server.bind_addr).await
}
