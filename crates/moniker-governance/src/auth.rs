//! Two-token bearer auth for the governance lanes.
//!
//! Reads are anonymous. Writes come in two lanes with separate tokens:
//! a submit token for proposing monikers and an approve token for
//! decisions and status changes. A single legacy write token may stand
//! in for both lanes during migration. Tokens that are configured
//! nowhere are generated at startup and printed once to the operator
//! log; nothing is persisted.

use rand::RngCore;
use tracing::warn;

use crate::error::{GovernanceError, Result};

/// The privilege level a bearer token grants.
///
/// Ordered: an approver can do anything a submitter can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// No token, or an unrecognized one. Read-only.
    Anonymous,
    /// May propose monikers and list pending requests.
    Submitter,
    /// May approve, reject, and drive status transitions.
    Approver,
}

/// Resolves bearer tokens to roles.
#[derive(Debug)]
pub struct AuthGate {
    submit_token: String,
    approve_token: String,
}

impl AuthGate {
    /// Creates a gate with explicit lane tokens.
    #[must_use]
    pub fn new(submit_token: impl Into<String>, approve_token: impl Into<String>) -> Self {
        Self {
            submit_token: submit_token.into(),
            approve_token: approve_token.into(),
        }
    }

    /// Builds the gate from optional configuration.
    ///
    /// Each lane falls back to the legacy write token, then to a freshly
    /// generated value that is logged once so the operator can capture it.
    #[must_use]
    pub fn from_config(
        submit_token: Option<String>,
        approve_token: Option<String>,
        legacy_write_token: Option<String>,
    ) -> Self {
        let submit = submit_token
            .or_else(|| legacy_write_token.clone())
            .unwrap_or_else(|| {
                let token = generate_token();
                warn!(token = %token, "no submit token configured, generated one");
                token
            });
        let approve = approve_token.or(legacy_write_token).unwrap_or_else(|| {
            let token = generate_token();
            warn!(token = %token, "no approve token configured, generated one");
            token
        });
        Self::new(submit, approve)
    }

    /// The role a presented bearer token grants.
    #[must_use]
    pub fn role_for(&self, bearer: Option<&str>) -> Role {
        match bearer {
            Some(token) if token == self.approve_token => Role::Approver,
            Some(token) if token == self.submit_token => Role::Submitter,
            _ => Role::Anonymous,
        }
    }

    /// Enforces a minimum role, returning the granted role on success.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Forbidden`] when the token grants less
    /// than `min`.
    pub fn require(&self, bearer: Option<&str>, min: Role) -> Result<Role> {
        let role = self.role_for(bearer);
        if role >= min {
            Ok(role)
        } else {
            Err(GovernanceError::Forbidden { required: min })
        }
    }
}

/// 32 random bytes, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::Anonymous < Role::Submitter);
        assert!(Role::Submitter < Role::Approver);
    }

    #[test]
    fn tokens_map_to_roles() {
        let gate = AuthGate::new("sub", "app");
        assert_eq!(gate.role_for(Some("app")), Role::Approver);
        assert_eq!(gate.role_for(Some("sub")), Role::Submitter);
        assert_eq!(gate.role_for(Some("wrong")), Role::Anonymous);
        assert_eq!(gate.role_for(None), Role::Anonymous);
    }

    #[test]
    fn approver_satisfies_submitter_requirement() {
        let gate = AuthGate::new("sub", "app");
        assert!(gate.require(Some("app"), Role::Submitter).is_ok());
    }

    #[test]
    fn submitter_cannot_approve() {
        let gate = AuthGate::new("sub", "app");
        let err = gate.require(Some("sub"), Role::Approver).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::Forbidden {
                required: Role::Approver
            }
        ));
    }

    #[test]
    fn legacy_token_grants_both_lanes() {
        let gate = AuthGate::from_config(None, None, Some("legacy".into()));
        assert_eq!(gate.role_for(Some("legacy")), Role::Approver);
        assert!(gate.require(Some("legacy"), Role::Submitter).is_ok());
    }

    #[test]
    fn generated_tokens_are_distinct_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn unset_tokens_still_yield_a_working_gate() {
        let gate = AuthGate::from_config(None, None, None);
        // Whatever was generated, an arbitrary token stays anonymous.
        assert_eq!(gate.role_for(Some("guess")), Role::Anonymous);
    }
}
