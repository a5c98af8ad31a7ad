//! Bearer-token authentication gate
//!
//! [`JwtAuth`] inspects `Authorization: Bearer <token>`, verifies signature and
//! expiry, requires an access token, and asks a [`PrincipalLoader`] for the
//! principal. On success an [`Authenticated`] value is attached to the request.
//! On any failure the request proceeds unauthenticated: handlers that take
//! `Authenticated<P>` answer 401, handlers that take `Option<Authenticated<P>>`
//! serve anonymous callers.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, StatusCode},
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use async_trait::async_trait;
use crypto_core::jwt::{Claims, JwtCodec, TokenType};
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

/// Resolves the principal named by verified access-token claims.
#[async_trait]
pub trait PrincipalLoader: Send + Sync + 'static {
    type Principal: Clone + 'static;

    /// `None` when the principal no longer exists.
    async fn load_principal(&self, claims: &Claims) -> Option<Self::Principal>;
}

/// Principal attached to an authenticated request
#[derive(Debug, Clone)]
pub struct Authenticated<P>(pub P);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
            "status": self.status_code().as_u16(),
        }))
    }
}

/// Run the gate for one `Authorization` header value.
pub async fn authenticate<L>(
    codec: &JwtCodec,
    loader: &L,
    authorization: Option<&str>,
) -> Option<L::Principal>
where
    L: PrincipalLoader + ?Sized,
{
    let token = authorization?.strip_prefix("Bearer ")?.trim();

    let claims = match codec.decode(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "JWT validation failed");
            return None;
        }
    };

    if claims.token_type != TokenType::Access {
        tracing::debug!(token_type = %claims.token_type, "Non-access token presented");
        return None;
    }

    let principal = loader.load_principal(&claims).await;
    if principal.is_none() {
        tracing::debug!(subject = %claims.sub, "Token subject no longer resolves");
    }
    principal
}

/// JWT Authentication Middleware
pub struct JwtAuth<L: PrincipalLoader> {
    codec: Arc<JwtCodec>,
    loader: Arc<L>,
}

impl<L: PrincipalLoader> JwtAuth<L> {
    pub fn new(codec: Arc<JwtCodec>, loader: Arc<L>) -> Self {
        Self { codec, loader }
    }
}

impl<S, B, L> Transform<S, ServiceRequest> for JwtAuth<L>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    L: PrincipalLoader,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S, L>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
            loader: self.loader.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S, L: PrincipalLoader> {
    service: Rc<S>,
    codec: Arc<JwtCodec>,
    loader: Arc<L>,
}

impl<S, B, L> Service<ServiceRequest> for JwtAuthMiddlewareService<S, L>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    L: PrincipalLoader,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let codec = self.codec.clone();
        let loader = self.loader.clone();

        Box::pin(async move {
            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned);

            if let Some(principal) =
                authenticate(&codec, loader.as_ref(), authorization.as_deref()).await
            {
                req.extensions_mut().insert(Authenticated(principal));
            }

            service.call(req).await
        })
    }
}

impl<P: Clone + 'static> FromRequest for Authenticated<P> {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Authenticated<P>>()
                .cloned()
                .ok_or(AuthError::Unauthorized),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};
    use crypto_core::jwt::{JwtConfig, JwtKeys};
    use uuid::Uuid;

    const SECRET: &[u8] = b"middleware-test-secret-long-enough-for-hs512-signing";

    /// Accepts every subject except "gone@x.com"
    struct EmailLoader;

    #[async_trait]
    impl PrincipalLoader for EmailLoader {
        type Principal = String;

        async fn load_principal(&self, claims: &Claims) -> Option<String> {
            (claims.sub != "gone@x.com").then(|| claims.sub.clone())
        }
    }

    fn codec() -> Arc<JwtCodec> {
        Arc::new(JwtCodec::new(JwtKeys::hmac(SECRET).unwrap(), JwtConfig::default()).unwrap())
    }

    async fn me(user: Authenticated<String>) -> HttpResponse {
        HttpResponse::Ok().body(user.0)
    }

    async fn open(user: Option<Authenticated<String>>) -> HttpResponse {
        HttpResponse::Ok().body(user.map(|u| u.0).unwrap_or_else(|| "anonymous".into()))
    }

    macro_rules! app {
        ($codec:expr) => {
            test::init_service(
                App::new()
                    .wrap(JwtAuth::new($codec, Arc::new(EmailLoader)))
                    .route("/me", web::get().to(me))
                    .route("/open", web::get().to(open)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_access_token_authenticates() {
        let codec = codec();
        let pair = codec.issue_pair("a@x.com", Uuid::new_v4()).unwrap();
        let app = app!(codec);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", pair.access_token)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;

        assert_eq!(body, "a@x.com");
    }

    #[actix_rt::test]
    async fn test_missing_token_is_401_with_json_body() {
        let app = app!(codec());

        let req = test::TestRequest::get().uri("/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 401);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[actix_rt::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let codec = codec();
        let pair = codec.issue_pair("a@x.com", Uuid::new_v4()).unwrap();
        let app = app!(codec);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", pair.refresh_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_unresolvable_principal_is_anonymous() {
        let codec = codec();
        let pair = codec.issue_pair("gone@x.com", Uuid::new_v4()).unwrap();
        let app = app!(codec);

        let req = test::TestRequest::get()
            .uri("/open")
            .insert_header(("Authorization", format!("Bearer {}", pair.access_token)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;

        assert_eq!(body, "anonymous");
    }

    #[actix_rt::test]
    async fn test_garbage_token_leaves_open_route_anonymous() {
        let app = app!(codec());

        let req = test::TestRequest::get()
            .uri("/open")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;

        assert_eq!(body, "anonymous");
    }

    #[actix_rt::test]
    async fn test_non_bearer_scheme_is_ignored() {
        let codec = codec();
        let loader = EmailLoader;

        assert!(authenticate(&codec, &loader, Some("Basic abc")).await.is_none());
        assert!(authenticate(&codec, &loader, None).await.is_none());
    }
}
