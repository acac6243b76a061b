//! Tenant scoping primitives.
//!
//! Every piece of persistent data except the tenant roster itself belongs to
//! exactly one tenant. Instead of an ambient thread-local that queries
//! consult implicitly, tenancy here is explicit at both ends:
//!
//! - repository methods take a [`TenantId`] parameter, so an unscoped query
//!   cannot be written by accident;
//! - engines resolve their tenant from a [`TenantContext`] created per unit
//!   of work (one sync run, one mail run), which fails closed when nothing
//!   is active.
//!
//! Cross-tenant administrative reads require a [`Sudo`] token that is only
//! obtainable from a sudo-scoped context, keeping unfiltered access visible
//! at the call site and bounded by a guard.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// TenantId
// ---------------------------------------------------------------------------

/// Identifier of a tenant row (`tenants.id`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TenantId(DbId);

impl TenantId {
    /// Wrap a raw database id.
    pub const fn new(id: DbId) -> Self {
        Self(id)
    }

    /// The raw database id, for binding into queries.
    pub const fn as_i64(self) -> DbId {
        self.0
    }
}

impl From<DbId> for TenantId {
    fn from(id: DbId) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The scope a unit of work executes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// All data access is confined to this tenant.
    Tenant(TenantId),
    /// Cross-tenant administrative scope; tenant filtering is bypassed.
    Sudo,
}

/// Token required by cross-tenant repository methods.
///
/// Only [`TenantContext::sudo_token`] produces one, so every unfiltered read
/// names its authority explicitly at the call site.
#[derive(Debug)]
pub struct Sudo {
    _priv: (),
}

/// Errors from fail-closed scope resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TenantError {
    /// No scope is active; tenant-scoped data access is refused.
    #[error("no tenant scope is active")]
    NotSet,

    /// The cross-tenant scope is active where a single tenant is required.
    #[error("sudo scope cannot stand in for a single tenant")]
    SudoActive,

    /// A single-tenant scope is active where the cross-tenant scope is
    /// required.
    #[error("cross-tenant access requires sudo scope")]
    SudoRequired,
}

// ---------------------------------------------------------------------------
// TenantContext
// ---------------------------------------------------------------------------

/// Execution-scoped holder of the active [`TenantScope`].
///
/// One context is created per logical unit of work and dropped when that
/// unit finishes, so a reused worker task can never observe a stale tenant.
/// Scope overrides ([`enter_tenant`](Self::enter_tenant),
/// [`enter_sudo`](Self::enter_sudo)) restore the previous scope when their
/// guard drops, on every exit path including unwinding.
#[derive(Debug, Default)]
pub struct TenantContext {
    scope: Option<TenantScope>,
}

impl TenantContext {
    /// An empty context: all tenant-scoped access fails closed until a
    /// scope is set.
    pub fn new() -> Self {
        Self { scope: None }
    }

    /// A context already scoped to `id`.
    pub fn for_tenant(id: TenantId) -> Self {
        Self {
            scope: Some(TenantScope::Tenant(id)),
        }
    }

    /// Activate `id` as the current tenant.
    pub fn set_tenant(&mut self, id: TenantId) {
        self.scope = Some(TenantScope::Tenant(id));
    }

    /// The active tenant, if a single-tenant scope is set.
    pub fn tenant(&self) -> Option<TenantId> {
        match self.scope {
            Some(TenantScope::Tenant(id)) => Some(id),
            _ => None,
        }
    }

    /// Drop whatever scope is active.
    pub fn clear(&mut self) {
        self.scope = None;
    }

    /// Whether the cross-tenant scope is active.
    pub fn is_sudo(&self) -> bool {
        matches!(self.scope, Some(TenantScope::Sudo))
    }

    /// Resolve the active tenant, failing closed.
    ///
    /// Errors when no scope is set and when sudo is active: a per-tenant
    /// operation must never run unscoped or fan out across tenants.
    pub fn require_tenant(&self) -> Result<TenantId, TenantError> {
        match self.scope {
            Some(TenantScope::Tenant(id)) => Ok(id),
            Some(TenantScope::Sudo) => Err(TenantError::SudoActive),
            None => Err(TenantError::NotSet),
        }
    }

    /// Produce a [`Sudo`] token for cross-tenant reads.
    ///
    /// Only valid while the sudo scope is active.
    pub fn sudo_token(&self) -> Result<Sudo, TenantError> {
        match self.scope {
            Some(TenantScope::Sudo) => Ok(Sudo { _priv: () }),
            Some(TenantScope::Tenant(_)) => Err(TenantError::SudoRequired),
            None => Err(TenantError::NotSet),
        }
    }

    /// Activate `id` for the lifetime of the returned guard.
    pub fn enter_tenant(&mut self, id: TenantId) -> ScopeGuard<'_> {
        let prev = self.scope.replace(TenantScope::Tenant(id));
        ScopeGuard { ctx: self, prev }
    }

    /// Activate the cross-tenant scope for the lifetime of the returned
    /// guard.
    pub fn enter_sudo(&mut self) -> ScopeGuard<'_> {
        let prev = self.scope.replace(TenantScope::Sudo);
        ScopeGuard { ctx: self, prev }
    }

    /// Run `f` scoped to `id`, restoring the previous scope afterwards.
    pub fn with_tenant<R>(&mut self, id: TenantId, f: impl FnOnce(&TenantContext) -> R) -> R {
        let guard = self.enter_tenant(id);
        f(&guard)
    }

    /// Run `f` under the cross-tenant scope, restoring the previous scope
    /// afterwards.
    pub fn with_sudo<R>(&mut self, f: impl FnOnce(&TenantContext) -> R) -> R {
        let guard = self.enter_sudo();
        f(&guard)
    }
}

/// Restores the previous scope when dropped.
pub struct ScopeGuard<'a> {
    ctx: &'a mut TenantContext,
    prev: Option<TenantScope>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.scope = self.prev;
    }
}

impl std::ops::Deref for ScopeGuard<'_> {
    type Target = TenantContext;

    fn deref(&self) -> &TenantContext {
        self.ctx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_context_fails_closed() {
        let ctx = TenantContext::new();
        assert_matches!(ctx.require_tenant(), Err(TenantError::NotSet));
        assert_matches!(ctx.sudo_token(), Err(TenantError::NotSet));
        assert_eq!(ctx.tenant(), None);
    }

    #[test]
    fn set_and_get_tenant() {
        let mut ctx = TenantContext::new();
        ctx.set_tenant(TenantId::new(7));
        assert_eq!(ctx.tenant(), Some(TenantId::new(7)));
        assert_eq!(ctx.require_tenant().unwrap(), TenantId::new(7));
    }

    #[test]
    fn clear_removes_scope() {
        let mut ctx = TenantContext::for_tenant(TenantId::new(7));
        ctx.clear();
        assert_matches!(ctx.require_tenant(), Err(TenantError::NotSet));
    }

    #[test]
    fn require_tenant_rejects_sudo() {
        let mut ctx = TenantContext::new();
        let sudo = ctx.enter_sudo();
        assert_matches!(sudo.require_tenant(), Err(TenantError::SudoActive));
    }

    #[test]
    fn sudo_token_requires_sudo_scope() {
        let mut ctx = TenantContext::for_tenant(TenantId::new(1));
        assert_matches!(ctx.sudo_token(), Err(TenantError::SudoRequired));
        let guard = ctx.enter_sudo();
        assert!(guard.sudo_token().is_ok());
    }

    #[test]
    fn with_tenant_restores_previous_scope() {
        let mut ctx = TenantContext::for_tenant(TenantId::new(1));
        let inner = ctx.with_tenant(TenantId::new(2), |scoped| scoped.require_tenant().unwrap());
        assert_eq!(inner, TenantId::new(2));
        assert_eq!(ctx.tenant(), Some(TenantId::new(1)));
    }

    #[test]
    fn with_sudo_restores_previous_scope() {
        let mut ctx = TenantContext::for_tenant(TenantId::new(1));
        ctx.with_sudo(|scoped| {
            assert!(scoped.is_sudo());
            assert!(scoped.sudo_token().is_ok());
        });
        assert!(!ctx.is_sudo());
        assert_eq!(ctx.tenant(), Some(TenantId::new(1)));
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let mut ctx = TenantContext::new();
        {
            let mut outer = ctx.enter_tenant(TenantId::new(1));
            {
                let inner = outer.ctx.enter_sudo();
                assert!(inner.is_sudo());
            }
            assert_eq!(outer.tenant(), Some(TenantId::new(1)));
        }
        assert_matches!(ctx.require_tenant(), Err(TenantError::NotSet));
    }

    #[test]
    fn guard_restores_scope_during_unwind() {
        let mut ctx = TenantContext::for_tenant(TenantId::new(1));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.with_tenant(TenantId::new(2), |_| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(ctx.tenant(), Some(TenantId::new(1)));
    }

    #[test]
    fn tenant_id_display_and_raw() {
        let id = TenantId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_i64(), 42);
    }
}
