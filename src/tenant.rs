use uuid::Uuid;

/// Identity carried through every Core operation.
///
/// The API layer that authenticates a caller is out of scope for this crate
/// (spec.md §1 non-goals); `TenantContext` is the interface boundary between
/// that surface and the Core: every store query and driver invocation takes
/// one of these so that isolation between tenants is enforced at the single
/// choke point of `db::*`, rather than scattered across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, owner_id: Uuid) -> Self {
        Self {
            tenant_id,
            owner_id,
        }
    }

    /// A context scoped to a background/system actor acting on behalf of a
    /// tenant (detached workers, the supervisor's monitor loop, scheduled
    /// scans) — owner_id is the tenant itself, there being no human caller.
    pub fn system(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            owner_id: tenant_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_context_has_matching_owner() {
        let tenant_id = Uuid::new_v4();
        let ctx = TenantContext::system(tenant_id);
        assert_eq!(ctx.tenant_id, ctx.owner_id);
    }
}
