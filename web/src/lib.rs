//! HTTP layer of the file store.
//!
//! Requests are not routed by path. Every request runs through one
//! [`pipeline::Pipeline`] of stages (token check, watch stream, file read,
//! file write, missing handler), and the router wraps it with the CORS and
//! access-log middleware.

use log::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub use service::AppState;

mod controller;
pub mod error;
mod middleware;
pub mod path;
pub mod pipeline;
pub mod router;
mod sse;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let bind_address = app_state.config.bind_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("File server running on http://{bind_address}/");

    let router = router::define_routes(app_state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
