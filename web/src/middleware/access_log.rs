use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{SecondsFormat, Utc};
use log::*;
use std::net::SocketAddr;

/// Writes one tab-separated `ACCESS` line per request before dispatching it.
pub async fn access_log(request: Request, next: Next) -> Response {
    info!("{}", access_line(&request));
    next.run(request).await
}

/// `ACCESS<TAB>timestamp<TAB>client ip<TAB>x-forwarded-for<TAB>method<TAB>uri`.
/// Values that are not known are left empty.
pub(crate) fn access_line(request: &Request) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    format!(
        "ACCESS\t{timestamp}\t{ip}\t{forwarded}\t{}\t{}",
        request.method(),
        request.uri()
    )
}
