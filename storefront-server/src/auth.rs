//! 可信身份
//!
//! 上游认证层在反向代理处解析凭证，核心只接收已解析的
//! `(user_id, role)` 对，通过 `x-user-id` / `x-user-role` 头传入。
//! 本模块不做任何凭证校验。

use axum::extract::FromRequestParts;
use http::request::Parts;
use shared::error::{AppError, ErrorCode};

/// 调用方角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// 已认证的调用方
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// 管理端操作的角色门禁
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::AdminRequired))
        }
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::new(ErrorCode::NotAuthenticated))?
            .to_string();

        let role = match parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
        {
            Some("admin") => Role::Admin,
            _ => Role::Customer,
        };

        Ok(Actor { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        let admin = Actor::new("u1", Role::Admin);
        let customer = Actor::new("u2", Role::Customer);
        assert!(admin.require_admin().is_ok());
        let err = customer.require_admin().unwrap_err();
        assert_eq!(err.code, ErrorCode::AdminRequired);
    }
}
