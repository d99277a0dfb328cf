mod error;
mod events;
mod hub;
mod routes;
mod state;
mod utils {
    pub mod room;
}

use std::sync::Arc;

use axum::{Extension, Router};
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tracing::info;

use crate::error::AppErr;
use crate::hub::Hub;
use crate::state::{Clients, Registry, Rooms, SharedHub};

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let hub: SharedHub = Arc::new(Mutex::new(Hub::new(Registry::default(), Rooms::default())));
    let clients = Clients::default();

    let app = Router::new()
        .merge(routes::router())
        .fallback_service(ServeDir::new("static"))
        .layer(Extension(hub))
        .layer(Extension(clients));

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
