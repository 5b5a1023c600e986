//! Basic 认证中间件：单一静态凭据。

use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::{body::Body as AxumBody, middleware};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Basic};
use std::sync::Arc;
use tracing::warn;

use crate::config::AUTH_REALM;
use crate::error::ApiError;

#[derive(Debug)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    fn matches(&self, credentials: &Basic) -> bool {
        credentials.username() == self.username && credentials.password() == self.password
    }
}

/// 认证中间件：`/api` 下的请求必须携带匹配的 Basic 认证，静态资源放行。
pub async fn auth_middleware(
    Extension(auth): Extension<Arc<AuthConfig>>,
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    let path = req.uri().path();
    if is_auth_exempt_path(path) {
        return Ok(next.run(req).await);
    }

    match auth_header {
        Some(TypedHeader(Authorization(credentials))) if auth.matches(&credentials) => {
            return Ok(next.run(req).await);
        }
        Some(_) => warn!(path, "rejected invalid credentials"),
        None => {}
    }

    let mut headers = HeaderMap::new();
    let challenge = format!("Basic realm=\"{AUTH_REALM}\", charset=\"UTF-8\"");
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        headers.insert(header::WWW_AUTHENTICATE, value);
    }
    Err(ApiError::Unauthorized(headers))
}

fn is_auth_exempt_path(path: &str) -> bool {
    !(path == "/api" || path.starts_with("/api/"))
}
