//! Roles and the authenticated actor attached to a request.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserId;

/// Capability a user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages products and users, sees every order.
    Admin,
    /// Moves orders through fulfillment, sees every order.
    Manager,
    /// Places and cancels their own orders.
    Customer,
}

impl Role {
    /// Returns the role name as stored in tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "customer" => Ok(Role::Customer),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// A verified identity: who is calling and with which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Shorthand for a customer actor.
    pub fn customer(id: UserId) -> Self {
        Self::new(id, Role::Customer)
    }

    /// Returns true if the actor holds one of the given roles.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Admins and managers see every order; customers only their own.
    pub fn sees_all_orders(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }
}
