//! Thin policy wrapper over [`gateway_protocol::ScopeRequirement`]: turns a
//! failed satisfaction check into the gateway's `forbidden` error.

use gateway_protocol::{GatewayError, Principal, ScopeRequirement};

pub fn require(required: &ScopeRequirement, principal: &Principal) -> Result<(), GatewayError> {
    if required.satisfied_by(principal.scopes()) {
        Ok(())
    } else {
        Err(GatewayError::forbidden("principal lacks required scopes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_fails_any_non_empty_requirement() {
        let req = ScopeRequirement::all_of(["ai:generate"]);
        assert!(require(&req, &Principal::Anonymous).is_err());
    }

    #[test]
    fn empty_requirement_always_passes() {
        assert!(require(&ScopeRequirement::none(), &Principal::Anonymous).is_ok());
    }
}
