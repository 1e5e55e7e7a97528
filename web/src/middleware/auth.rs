use crate::error::Error;
use crate::pipeline::{Outcome, RequestContext, Stage, StageResult};
use async_trait::async_trait;
use axum::extract::Query;
use axum::http::{header::AUTHORIZATION, Uri};

/// Query parameter carrying the token.
const TOKEN_PARAM: &str = "q";

/// Shared-secret check that runs before every other stage.
///
/// Accepts `Authorization: Bearer <token>` or a `q=<token>` query parameter.
/// When `q` is repeated only the first value counts.
/// Never answers a request itself: it either declines (let it through) or
/// fails with 403.
pub struct TokenCheck {
    auth_token: String,
    bearer: String,
}

impl TokenCheck {
    pub fn new(auth_token: impl Into<String>) -> Self {
        let auth_token = auth_token.into();
        let bearer = format!("Bearer {auth_token}");
        Self { auth_token, bearer }
    }

    fn header_matches(&self, ctx: &RequestContext) -> bool {
        ctx.header(AUTHORIZATION) == Some(self.bearer.as_str())
    }

    fn query_matches(&self, uri: &Uri) -> bool {
        let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(uri) else {
            return false;
        };
        pairs
            .into_iter()
            .find(|(name, _)| name == TOKEN_PARAM)
            .is_some_and(|(_, value)| value == self.auth_token)
    }
}

#[async_trait]
impl Stage for TokenCheck {
    fn name(&self) -> &'static str {
        "token_check"
    }

    async fn try_handle(&self, ctx: &mut RequestContext) -> StageResult {
        if self.header_matches(ctx) || self.query_matches(ctx.uri()) {
            Ok(Outcome::Declined)
        } else {
            Err(Error::authentication())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::body::Body;
    use axum::extract::Request;

    fn ctx(uri: &str, authorization: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        RequestContext::from(builder.body(Body::empty()).unwrap())
    }

    async fn check(stage: &TokenCheck, uri: &str, authorization: Option<&str>) -> StageResult {
        stage.try_handle(&mut ctx(uri, authorization)).await
    }

    fn assert_declined(result: StageResult) {
        assert!(matches!(result, Ok(Outcome::Declined)), "{result:?}");
    }

    fn assert_forbidden(result: StageResult) {
        match result {
            Err(error) => assert_eq!(error.kind, ErrorKind::Authentication),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let stage = TokenCheck::new("s3cret");
        assert_declined(check(&stage, "/file", Some("Bearer s3cret")).await);
    }

    #[tokio::test]
    async fn query_parameter_is_accepted() {
        let stage = TokenCheck::new("s3cret");
        assert_declined(check(&stage, "/file?q=s3cret", None).await);
        assert_declined(check(&stage, "/file?x=1&q=s3cret", None).await);
    }

    #[tokio::test]
    async fn first_of_repeated_query_tokens_decides() {
        let stage = TokenCheck::new("s3cret");
        assert_declined(check(&stage, "/file?q=s3cret&q=other", None).await);
        assert_forbidden(check(&stage, "/file?q=other&q=s3cret", None).await);
    }

    #[tokio::test]
    async fn percent_encoded_query_token_is_decoded() {
        let stage = TokenCheck::new("a b&c");
        assert_declined(check(&stage, "/file?q=a%20b%26c", None).await);
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let stage = TokenCheck::new("s3cret");
        assert_forbidden(check(&stage, "/file", None).await);
        assert_forbidden(check(&stage, "/_watch", None).await);
    }

    #[tokio::test]
    async fn wrong_credentials_are_rejected() {
        let stage = TokenCheck::new("s3cret");
        assert_forbidden(check(&stage, "/file", Some("Bearer nope")).await);
        assert_forbidden(check(&stage, "/file", Some("s3cret")).await);
        assert_forbidden(check(&stage, "/file", Some("bearer s3cret")).await);
        assert_forbidden(check(&stage, "/file?q=nope", None).await);
        assert_forbidden(check(&stage, "/file?token=s3cret", None).await);
    }

    #[tokio::test]
    async fn one_valid_form_is_enough() {
        let stage = TokenCheck::new("s3cret");
        assert_declined(check(&stage, "/file?q=s3cret", Some("Bearer nope")).await);
        assert_declined(check(&stage, "/file?q=nope", Some("Bearer s3cret")).await);
    }
}
