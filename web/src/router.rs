use crate::controller::{fallback_controller::MissingHandler, file_controller};
use crate::middleware::{access_log, auth::TokenCheck, cors};
use crate::path::PathMapper;
use crate::pipeline::Pipeline;
use crate::sse::handler::WatchStream;
use crate::AppState;
use axum::extract::{Request, State};
use axum::middleware::from_fn;
use axum::response::Response;
use axum::Router;
use std::sync::Arc;

/// Every request goes through one pipeline; the router only adds the
/// per-response decoration and the access log around it.
pub fn define_routes(app_state: AppState) -> Router {
    let pipeline = Arc::new(build_pipeline(&app_state));

    Router::new()
        .fallback(dispatch)
        .with_state(pipeline)
        .layer(from_fn(cors::reflect_origin))
        .layer(from_fn(access_log::access_log))
}

/// Stage order matters: the token check must run before anything touches a
/// file or the watch stream, and the missing handler must come last.
pub fn build_pipeline(app_state: &AppState) -> Pipeline {
    let path_mapper = Arc::new(PathMapper::new(app_state.config.storage_path()));

    Pipeline::new()
        .with_stage(TokenCheck::new(app_state.config.auth_token()))
        .with_stage(WatchStream::new(
            Arc::clone(&path_mapper),
            Arc::clone(&app_state.sse_manager),
        ))
        .with_stage(file_controller::ReadFile::new(
            Arc::clone(&path_mapper),
            Arc::clone(&app_state.storage),
        ))
        .with_stage(file_controller::WriteFile::new(
            path_mapper,
            Arc::clone(&app_state.storage),
            Arc::clone(&app_state.sse_manager),
        ))
        .with_stage(MissingHandler)
}

async fn dispatch(State(pipeline): State<Arc<Pipeline>>, request: Request) -> Response {
    pipeline.dispatch(request).await
}
