//! Ordered request dispatch.
//!
//! A [`Pipeline`] is a list of [`Stage`]s tried in order. Each stage looks at
//! the request and either answers it ([`Outcome::Handled`]), lets the next
//! stage have it ([`Outcome::Declined`]), or fails with a typed
//! [`Error`](crate::error::Error). Failures are translated into responses here,
//! once, so no error escapes the pipeline.

use crate::error::{Error, ErrorKind, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::AsHeaderName;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use log::*;
use std::sync::Arc;

/// What a stage did with a request.
#[derive(Debug)]
pub enum Outcome {
    Handled(Response),
    Declined,
}

pub type StageResult = Result<Outcome>;

/// The parts of a request the stages see. The body can be taken once.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Body>,
}

impl RequestContext {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text. Values that are not visible ASCII count as absent.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Takes the request body. Later calls get an empty body.
    pub fn take_body(&mut self) -> Body {
        self.body.take().unwrap_or_else(Body::empty)
    }
}

impl From<Request> for RequestContext {
    fn from(request: Request) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: Some(body),
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_handle(&self, ctx: &mut RequestContext) -> StageResult;
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage; stages run in the order they were added.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let mut ctx = RequestContext::from(request);

        for stage in self.stages.iter() {
            match stage.try_handle(&mut ctx).await {
                Ok(Outcome::Handled(response)) => {
                    trace!("{} handled {} {}", stage.name(), ctx.method, ctx.uri);
                    return response;
                }
                Ok(Outcome::Declined) => continue,
                Err(error) => {
                    log_failure(stage.name(), &ctx, &error);
                    return error.into_response();
                }
            }
        }

        let error = Error::missing_handler();
        log_failure("pipeline", &ctx, &error);
        error.into_response()
    }
}

fn log_failure(stage: &str, ctx: &RequestContext, error: &Error) {
    match error.kind {
        ErrorKind::Authentication => warn!("{stage}: {} {}: {error}", ctx.method, ctx.uri),
        ErrorKind::NotFound => info!("{stage}: {} {}: {error}", ctx.method, ctx.uri),
        ErrorKind::WriteOpen | ErrorKind::Unexpected => {
            error!("{stage}: {} {}: {error}", ctx.method, ctx.uri)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Decline(Arc<AtomicUsize>);

    #[async_trait]
    impl Stage for Decline {
        fn name(&self) -> &'static str {
            "decline"
        }

        async fn try_handle(&self, _ctx: &mut RequestContext) -> StageResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Declined)
        }
    }

    struct Answer(&'static str);

    #[async_trait]
    impl Stage for Answer {
        fn name(&self) -> &'static str {
            "answer"
        }

        async fn try_handle(&self, _ctx: &mut RequestContext) -> StageResult {
            Ok(Outcome::Handled(self.0.into_response()))
        }
    }

    struct Fail;

    #[async_trait]
    impl Stage for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn try_handle(&self, _ctx: &mut RequestContext) -> StageResult {
            Err(Error::authentication())
        }
    }

    struct Echo;

    #[async_trait]
    impl Stage for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn try_handle(&self, ctx: &mut RequestContext) -> StageResult {
            let body = ctx.take_body();
            Ok(Outcome::Handled(body.into_response()))
        }
    }

    fn request() -> Request {
        Request::builder()
            .uri("/anything")
            .body(Body::from("payload"))
            .unwrap()
    }

    async fn body_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn declined_stages_pass_to_the_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_stage(Decline(calls.clone()))
            .with_stage(Decline(calls.clone()))
            .with_stage(Answer("second"));

        let response = pipeline.dispatch(request()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(body_of(response).await, "second");
    }

    #[tokio::test]
    async fn handled_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_stage(Answer("first"))
            .with_stage(Decline(calls.clone()));

        let response = pipeline.dispatch(request()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(body_of(response).await, "first");
    }

    #[tokio::test]
    async fn failure_short_circuits_into_error_response() {
        let pipeline = Pipeline::new()
            .with_stage(Fail)
            .with_stage(Answer("unreachable"));

        let response = pipeline.dispatch(request()).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(response).await, "Could not authenticate");
    }

    #[tokio::test]
    async fn exhausted_pipeline_is_missing_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new().with_stage(Decline(calls));

        let response = pipeline.dispatch(request()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "Missing handler");
    }

    #[tokio::test]
    async fn body_reaches_the_stage_that_takes_it() {
        let pipeline = Pipeline::new().with_stage(Echo);

        let response = pipeline.dispatch(request()).await;

        assert_eq!(body_of(response).await, "payload");
    }

    #[tokio::test]
    async fn second_take_gets_empty_body() {
        let mut ctx = RequestContext::from(request());
        let first = ctx.take_body();
        let second = ctx.take_body();

        assert_eq!(to_bytes(first, usize::MAX).await.unwrap(), "payload");
        assert!(to_bytes(second, usize::MAX).await.unwrap().is_empty());
    }
}
