use crate::path::PathMapper;
use crate::pipeline::{Outcome, RequestContext, Stage, StageResult};
use async_stream::stream;
use async_trait::async_trait;
use axum::http::header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use log::*;
use sse::message::EventType;
use sse::Manager;
use std::convert::Infallible;
use std::sync::Arc;

/// Serves the live-update endpoint (`/_watch`, any case).
///
/// The connection stays open and receives `file` and `ping` events. When the
/// client goes away the response body is dropped, which drops the subscriber
/// and removes it from the broadcast set.
pub struct WatchStream {
    path_mapper: Arc<PathMapper>,
    sse_manager: Arc<Manager>,
}

impl WatchStream {
    pub fn new(path_mapper: Arc<PathMapper>, sse_manager: Arc<Manager>) -> Self {
        Self {
            path_mapper,
            sse_manager,
        }
    }
}

/// Converts a hub event into an SSE event.
///
/// Carriage returns cannot be sent in a `data:` field, so they become line
/// breaks; each payload line is then written as its own `data:` field.
fn to_sse_event(event: &sse::message::Event) -> Event {
    let data = event.data().replace("\r\n", "\n").replace('\r', "\n");
    Event::default().event(event.event_type()).data(data)
}

#[async_trait]
impl Stage for WatchStream {
    fn name(&self) -> &'static str {
        "watch_stream"
    }

    async fn try_handle(&self, ctx: &mut RequestContext) -> StageResult {
        let request_path = self.path_mapper.map(ctx.uri().path())?;
        if !request_path.is_watch() {
            return Ok(Outcome::Declined);
        }

        let mut subscriber = self.sse_manager.subscribe();
        debug!("Establishing SSE connection {}", subscriber.id().as_str());

        // Events arrive from the subscriber's channel until it is closed
        let stream = stream! {
            while let Some(event) = subscriber.recv().await {
                yield Ok::<_, Infallible>(to_sse_event(&event));
            }
            debug!("SSE connection {} closed by server", subscriber.id().as_str());
        };

        // Heartbeats come from the hub, so no axum keep-alive here.
        Ok(Outcome::Handled(
            (
                StatusCode::OK,
                [(CACHE_CONTROL, "no-store"), (X_CONTENT_TYPE_OPTIONS, "nosniff")],
                Sse::new(stream),
            )
                .into_response(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::header::CONTENT_TYPE;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    fn stage(manager: &Arc<Manager>) -> WatchStream {
        WatchStream::new(Arc::new(PathMapper::new("./storage/")), manager.clone())
    }

    fn ctx(uri: &str) -> RequestContext {
        RequestContext::from(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    async fn next_frame(body: &mut axum::body::BodyDataStream) -> String {
        let chunk = timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        String::from_utf8(chunk.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn other_paths_are_declined() {
        let manager = Arc::new(Manager::new());

        let outcome = stage(&manager).try_handle(&mut ctx("/notes.txt")).await;

        assert!(matches!(outcome, Ok(Outcome::Declined)));
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn watch_path_streams_events_with_headers() {
        let manager = Arc::new(Manager::new());

        let response = match stage(&manager).try_handle(&mut ctx("/_Watch")).await {
            Ok(Outcome::Handled(response)) => response,
            other => panic!("expected handled, got {other:?}"),
        };

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers().get_all(CACHE_CONTROL).iter().count(), 1);
        assert_eq!(manager.subscriber_count(), 1);

        manager.broadcast("dir/a.txt");

        let mut body = response.into_body().into_data_stream();
        assert_eq!(next_frame(&mut body).await, "event: file\ndata: dir/a.txt\n\n");
    }

    #[tokio::test]
    async fn line_breaks_become_separate_data_fields() {
        let manager = Arc::new(Manager::new());
        let response = match stage(&manager).try_handle(&mut ctx("/_watch")).await {
            Ok(Outcome::Handled(response)) => response,
            other => panic!("expected handled, got {other:?}"),
        };
        let mut body = response.into_body().into_data_stream();

        manager.broadcast("a\nb\r\nc\rd");

        assert_eq!(
            next_frame(&mut body).await,
            "event: file\ndata: a\ndata: b\ndata: c\ndata: d\n\n"
        );
    }

    #[tokio::test]
    async fn empty_path_still_has_data_field() {
        let manager = Arc::new(Manager::new());
        let response = match stage(&manager).try_handle(&mut ctx("/_watch")).await {
            Ok(Outcome::Handled(response)) => response,
            other => panic!("expected handled, got {other:?}"),
        };
        let mut body = response.into_body().into_data_stream();

        manager.broadcast("");

        assert_eq!(next_frame(&mut body).await, "event: file\ndata: \n\n");
    }

    #[tokio::test]
    async fn ping_frames_carry_a_timestamp() {
        let manager = Arc::new(Manager::with_heartbeat_interval(Duration::from_secs(1)));
        let response = match stage(&manager).try_handle(&mut ctx("/_watch")).await {
            Ok(Outcome::Handled(response)) => response,
            other => panic!("expected handled, got {other:?}"),
        };
        let mut body = response.into_body().into_data_stream();

        let frame = next_frame(&mut body).await;

        assert!(frame.starts_with("event: ping\ndata: "), "{frame}");
        assert!(frame.ends_with("Z\n\n"), "{frame}");
    }

    #[tokio::test]
    async fn dropping_the_body_unsubscribes() {
        let manager = Arc::new(Manager::new());

        let outcome = stage(&manager).try_handle(&mut ctx("/_watch")).await;
        assert_eq!(manager.subscriber_count(), 1);

        drop(outcome);

        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn invalid_path_encoding_fails() {
        let manager = Arc::new(Manager::new());

        let outcome = stage(&manager).try_handle(&mut ctx("/%FF")).await;

        assert!(outcome.is_err());
    }
}
