use axum::extract::Request;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

/// Reflects the request's `Origin` into `Access-Control-Allow-Origin` on every
/// response, including errors and event streams.
pub async fn reflect_origin(request: Request, next: Next) -> Response {
    let origin = request.headers().get(ORIGIN).cloned();
    let mut response = next.run(request).await;
    apply_allow_origin(response.headers_mut(), origin);
    response
}

/// Sets the allow-origin header. With no origin the header is still sent, with
/// an empty value.
pub fn apply_allow_origin(headers: &mut HeaderMap, origin: Option<HeaderValue>) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        origin.unwrap_or_else(|| HeaderValue::from_static("")),
    );
}
