use std::sync::{PoisonError, RwLock};
use shared::voter::VoterIdentity;

/// Source of the signed-in voter. Credential handling lives elsewhere.
pub trait Authenticator: Send + Sync {
    fn current_voter(&self) -> Option<VoterIdentity>;
}

/// Holds whatever identity the host application last signed in.
///
/// The slot is a plain `Option`, so a panic while it was held cannot leave
/// it half-written; a poisoned lock is recovered rather than skipped.
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    pub(crate) voter: RwLock<Option<VoterIdentity>>,
}

impl StaticAuthenticator {
    pub fn signed_in(voter: VoterIdentity) -> Self {
        Self { voter: RwLock::new(Some(voter)) }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, voter: VoterIdentity) {
        *self.voter.write().unwrap_or_else(PoisonError::into_inner) = Some(voter);
    }

    pub fn sign_out(&self) {
        *self.voter.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Authenticator for StaticAuthenticator {
    fn current_voter(&self) -> Option<VoterIdentity> {
        self.voter.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
