/*
 * Responsibility
 * - The authenticated-caller contract visible to handlers
 * - The gate validates and installs it; handlers only ever read it
 *
 * Notes
 * - Token and signature handling is the middleware/services side's concern.
 *   This is the fixed "type (contract)" the rest of the app consumes.
 */

/// Coarse grant attached to an authenticated caller.
///
/// There is exactly one grant today. If finer-grained authorization shows up
/// later, extend this enum and resolve capabilities from the stored identity
/// instead of hardcoding the single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AuthenticatedUser,
}

/// Identity attached to a request after the gate validated its token.
///
/// Request-scoped: built fresh per request, carried in request extensions,
/// dropped when the request completes. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_name: String,
    pub capabilities: Vec<Capability>,
}

impl Principal {
    /// Standard principal for a validated caller: the single fixed grant.
    pub fn authenticated_user(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            capabilities: vec![Capability::AuthenticatedUser],
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}
