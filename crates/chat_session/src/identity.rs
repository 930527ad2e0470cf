/// Source of the signed-in user. Login itself happens elsewhere.
pub trait IdentityProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// Opaque user identifier, present once authenticated.
    fn current_user_id(&self) -> Option<String>;
}

/// Fixed identity for headless use and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            user_id: (!user_id.trim().is_empty()).then_some(user_id),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// User id of an authenticated identity, if any.
pub(crate) fn authenticated_user(identity: &dyn IdentityProvider) -> Option<String> {
    if !identity.is_authenticated() {
        return None;
    }
    identity
        .current_user_id()
        .filter(|user_id| !user_id.trim().is_empty())
}
