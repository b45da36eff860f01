use std::{future::Future, pin::Pin, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures::future::{Ready, ok};

use common::{
    env_config::JwtConfig,
    error::Res,
    jwt::{self, JwtClaims},
};

/// Validates bearer tokens and stores the outcome as `Res<JwtClaims>` in the
/// request extensions. Never rejects a request; handlers decide.
pub struct ExtractionMiddleware {
    jwt_config: Arc<JwtConfig>,
}

impl ExtractionMiddleware {
    pub fn new(jwt_config: JwtConfig) -> Self {
        Self {
            jwt_config: Arc::new(jwt_config),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ExtractionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ExtractionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ExtractionMiddlewareService {
            service: Arc::new(service),
            jwt_config: self.jwt_config.clone(),
        })
    }
}

pub struct ExtractionMiddlewareService<S> {
    service: Arc<S>,
    jwt_config: Arc<JwtConfig>,
}

impl<S, B> Service<ServiceRequest> for ExtractionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // retrieve token from authorization header
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let jwt_config = self.jwt_config.clone();
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            if let Some(token) = token {
                let claims_res = jwt::validate_jwt(&token, &jwt_config);
                if let Err(e) = &claims_res {
                    log::debug!("Rejected bearer token on {}: {}", req.path(), e);
                }
                req.extensions_mut().insert::<Res<JwtClaims>>(claims_res);
            }
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpRequest, HttpResponse, test, web};
    use jsonwebtoken::{EncodingKey, Header};
    use uuid::Uuid;

    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            audience: "authenticated".to_string(),
        }
    }

    fn token(secret: &str) -> String {
        let claims = serde_json::json!({
            "sub": Uuid::nil(),
            "exp": 4_102_444_800u64,
            "aud": "authenticated",
            "email": "ana@example.com",
        });
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match jwt::optional_claims(&req) {
            Some(claims) => HttpResponse::Ok().body(claims.display_name()),
            None => HttpResponse::Ok().body("guest"),
        }
    }

    #[actix_web::test]
    async fn stores_claims_of_valid_tokens_only() {
        let app = test::init_service(
            App::new()
                .wrap(ExtractionMiddleware::new(jwt_config()))
                .route("/", web::get().to(whoami)),
        )
        .await;

        let cases = [
            (Some(token("test-secret")), "ana"),
            (Some(token("other-secret")), "guest"),
            (None, "guest"),
        ];
        for (token, expected) in cases {
            let mut req = test::TestRequest::get().uri("/");
            if let Some(token) = token {
                req = req.insert_header(("Authorization", format!("Bearer {}", token)));
            }
            let body = test::call_and_read_body(&app, req.to_request()).await;
            assert_eq!(body, expected.as_bytes());
        }
    }
}
