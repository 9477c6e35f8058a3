use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{axum_http::error_responses::AppError, config::config_loader};

pub const SERVICE_ROLE: &str = "service_role";
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// Absent on service-role keys.
    pub sub: Option<String>,
    pub role: String,
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    pub exp: usize,
}

impl SupabaseClaims {
    pub fn is_admin(&self) -> bool {
        self.role == SERVICE_ROLE || self.app_metadata.role.as_deref() == Some(ADMIN_ROLE)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: String,
    pub is_admin: bool,
}

/// An [`AuthUser`] whose token carries the service role or an admin app role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

pub fn validate_supabase_jwt(token: &str, secret: &str) -> Result<SupabaseClaims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    // Service-role keys carry no audience.
    validation.validate_aud = false;

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation)
        .map_err(|e| AppError::Authentication(format!("JWT validation failed: {e}")))?;

    Ok(token_data.claims)
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Authentication("Missing Authorization header".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Authentication("Invalid Authorization header".to_string()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Authentication("Invalid Authorization header format".to_string()))
}

pub fn auth_user_from_claims(claims: SupabaseClaims) -> Result<AuthUser, AppError> {
    let user_id = claims
        .sub
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| AppError::Authentication("Invalid user ID in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        is_admin: claims.is_admin(),
        email: claims.email,
        role: claims.role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let secret = config_loader::get_jwt_secret()?;
        let claims = validate_supabase_jwt(token, &secret)?;
        auth_user_from_claims(claims)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(
                user_id = ?user.user_id,
                role = %user.role,
                path = %parts.uri.path(),
                "auth: admin route refused"
            );
            return Err(AppError::Authorization("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
