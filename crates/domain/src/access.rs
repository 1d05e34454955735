//! Per-operation access checks.
//!
//! Every operation receives the request's actor as an `Option`: `None` means
//! the authentication layer could not verify an identity.

use common::{Actor, Role};

use crate::DomainError;

/// Requires a verified identity.
pub fn require_actor(actor: Option<&Actor>) -> Result<&Actor, DomainError> {
    actor.ok_or(DomainError::Unauthorized)
}

/// Requires a verified identity holding one of `roles`.
pub fn require_role<'a>(actor: Option<&'a Actor>, roles: &[Role]) -> Result<&'a Actor, DomainError> {
    let actor = require_actor(actor)?;
    if actor.has_any_role(roles) {
        Ok(actor)
    } else {
        Err(DomainError::Forbidden)
    }
}
