//! Demo project: users and posts mounted into one application.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Configure with `DATABASE_URL`, `HOST`, `PORT` (see `Settings`).

mod apps;

use std::sync::Arc;
use tokio::net::TcpListener;
use viewset_sdk::{init_tracing, Application, SessionManager, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("viewset_sdk=info,example_consumer=info,tower_http=info");
    let settings = Settings::load()?;

    let sessions = Arc::new(SessionManager::connect(&settings.database_url, &settings.pool).await?);
    let app = Application::builder(sessions.clone())
        .module(apps::users::Users)
        .module(apps::posts::Posts)
        .body_limit(settings.body_limit)
        .build()?;
    app.create_tables().await?;
    for route in app.routes() {
        tracing::debug!(verb = route.verb.as_str(), path = %route.path, operation_id = %route.operation_id, "mounted");
    }

    let listener = TcpListener::bind(settings.bind_addr()?).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    sessions.close().await;
    Ok(())
}
