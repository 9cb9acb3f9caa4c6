use super::Claims;
use crate::domain::users::display_name;
use uuid::Uuid;

/// Authenticated caller, built from verified token claims
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            name: display_name(claims.full_name().as_deref(), claims.email.as_deref()),
        })
    }
}
