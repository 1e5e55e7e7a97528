use crate::error::Error;
use crate::path::PathMapper;
use crate::pipeline::{Outcome, RequestContext, Stage, StageResult};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use futures::StreamExt;
use log::*;
use sse::Manager;
use std::sync::Arc;
use storage::Storage;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// GET: streams the stored bytes back. Any failure to open is a 404.
pub struct ReadFile {
    path_mapper: Arc<PathMapper>,
    storage: Arc<dyn Storage>,
}

impl ReadFile {
    pub fn new(path_mapper: Arc<PathMapper>, storage: Arc<dyn Storage>) -> Self {
        Self {
            path_mapper,
            storage,
        }
    }
}

#[async_trait]
impl Stage for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    async fn try_handle(&self, ctx: &mut RequestContext) -> StageResult {
        if ctx.method() != Method::GET {
            return Ok(Outcome::Declined);
        }

        let request_path = self.path_mapper.map(ctx.uri().path())?;
        debug!("Reading {}", request_path.storage_key());

        let reader = self
            .storage
            .open_read(request_path.storage_key())
            .await
            .map_err(Error::file_not_found)?;

        Ok(Outcome::Handled(
            (StatusCode::OK, Body::from_stream(ReaderStream::new(reader))).into_response(),
        ))
    }
}

/// PUT: streams the request body into storage, then announces the change.
pub struct WriteFile {
    path_mapper: Arc<PathMapper>,
    storage: Arc<dyn Storage>,
    sse_manager: Arc<Manager>,
}

impl WriteFile {
    pub fn new(
        path_mapper: Arc<PathMapper>,
        storage: Arc<dyn Storage>,
        sse_manager: Arc<Manager>,
    ) -> Self {
        Self {
            path_mapper,
            storage,
            sse_manager,
        }
    }
}

#[async_trait]
impl Stage for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    async fn try_handle(&self, ctx: &mut RequestContext) -> StageResult {
        if ctx.method() != Method::PUT {
            return Ok(Outcome::Declined);
        }

        let request_path = self.path_mapper.map(ctx.uri().path())?;
        debug!("Writing {}", request_path.storage_key());

        let mut writer = self
            .storage
            .open_write(request_path.storage_key())
            .await
            .map_err(Error::write_open)?;

        // An early return drops the writer uncommitted, leaving the old content.
        let mut data_stream = ctx.take_body().into_data_stream();
        let mut received: u64 = 0;
        while let Some(chunk) = data_stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        writer.commit().await?;

        info!("Stored {received} bytes for {}", request_path.relative());
        self.sse_manager.broadcast(request_path.relative());

        Ok(Outcome::Handled((StatusCode::OK, "OK").into_response()))
    }
}
