//! Operation Context
//!
//! Identity and metadata of the actor behind the current operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Grantable entitlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Privilege {
    #[serde(rename = "ROLE_SUPER_USER")]
    SuperUser,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::SuperUser => "ROLE_SUPER_USER",
            Privilege::Admin => "ROLE_ADMIN",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_SUPER_USER" => Ok(Privilege::SuperUser),
            "ROLE_ADMIN" => Ok(Privilege::Admin),
            other => Err(format!("unknown privilege: {}", other)),
        }
    }
}

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationContext {
    /// User ID from X-Request-User-Id header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_user_id: Option<Uuid>,

    /// Privileges held by the request user, loaded from the role store
    #[serde(default)]
    pub privileges: Vec<Privilege>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context acting as the given user
    pub fn for_user(user_id: Uuid) -> Self {
        Self::new().with_request_user(user_id)
    }

    pub fn with_request_user(mut self, user_id: Uuid) -> Self {
        self.request_user_id = Some(user_id);
        self
    }

    pub fn with_privileges(mut self, privileges: Vec<Privilege>) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// The acting user, or `None` when the request is anonymous
    pub fn actor(&self) -> Option<Uuid> {
        self.request_user_id
    }

    pub fn has(&self, privilege: Privilege) -> bool {
        self.privileges.contains(&privilege)
    }

    pub fn is_admin(&self) -> bool {
        self.has(Privilege::Admin)
    }

    /// SUPER_USER or ADMIN lifts the single-account limit
    pub fn is_upgraded(&self) -> bool {
        self.has(Privilege::SuperUser) || self.has(Privilege::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let user_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_request_user(user_id)
            .with_privileges(vec![Privilege::SuperUser])
            .with_correlation_id(correlation_id);

        assert_eq!(context.actor(), Some(user_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
        assert!(context.is_upgraded());
        assert!(!context.is_admin());
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert_eq!(context.correlation_id, Some(id));

        // Calling again should return the same ID
        assert_eq!(context.ensure_correlation_id(), id);
    }

    #[test]
    fn test_privilege_names() {
        assert_eq!(Privilege::SuperUser.to_string(), "ROLE_SUPER_USER");
        assert_eq!("ROLE_ADMIN".parse::<Privilege>().unwrap(), Privilege::Admin);
        assert!("ROLE_USER".parse::<Privilege>().is_err());
        assert_eq!(serde_json::to_string(&Privilege::Admin).unwrap(), r#""ROLE_ADMIN""#);
    }
}
