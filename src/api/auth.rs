// Static bearer-token gate for the ingest endpoint

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use sha2::{Digest, Sha256};
use std::future::{ready, Ready};
use std::rc::Rc;

/// Middleware that admits a request only if it carries
/// `Authorization: Bearer <secret>`.
pub struct Auth {
    secret: Rc<str>,
}

impl Auth {
    pub fn new(secret: String) -> Self {
        Self {
            secret: Rc::from(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Auth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        }))
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        if token.is_some_and(|t| token_matches(t, &self.secret)) {
            let fut = self.service.call(req);
            return Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            });
        }

        tracing::warn!(path = %req.path(), "rejected request with missing or wrong bearer token");
        Box::pin(async move {
            let response = HttpResponse::Unauthorized()
                .json(serde_json::json!({ "error": "Unauthorized" }))
                .map_into_right_body();
            Ok(req.into_response(response))
        })
    }
}

/// Compare digests rather than the raw strings so the comparison time does
/// not depend on how much of the secret a guess shares.
pub fn token_matches(candidate: &str, secret: &str) -> bool {
    !secret.is_empty() && Sha256::digest(candidate.as_bytes()) == Sha256::digest(secret.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::token_matches;

    #[test]
    fn exact_token_only() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("S3CRET", "s3cret"));
        assert!(!token_matches("", ""));
    }
}
