//! Multi-tenant traits.

use crate::ids::TenantId;

/// Trait for entities that belong to a specific tenant.
///
/// Implementing this trait marks an entity as tenant-scoped, so generic
/// code can verify tenant isolation without knowing the concrete type.
///
/// # Example
///
/// ```
/// use facel_core::{TenantId, TenantAware};
///
/// struct Delivery {
///     tenant_id: TenantId,
/// }
///
/// impl TenantAware for Delivery {
///     fn tenant_id(&self) -> TenantId {
///         self.tenant_id
///     }
/// }
///
/// fn belongs_to<T: TenantAware>(entity: &T, tenant: TenantId) -> bool {
///     entity.tenant_id() == tenant
/// }
/// ```
pub trait TenantAware {
    /// Returns the tenant ID associated with this entity.
    fn tenant_id(&self) -> TenantId;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestEntity {
        tenant: TenantId,
    }

    impl TenantAware for TestEntity {
        fn tenant_id(&self) -> TenantId {
            self.tenant
        }
    }

    #[test]
    fn test_impl_returns_correct_tenant_id() {
        let tenant = TenantId::new();
        let entity = TestEntity { tenant };
        assert_eq!(entity.tenant_id(), tenant);
    }

    #[test]
    fn test_trait_is_object_safe() {
        let tenant = TenantId::new();
        let entity = TestEntity { tenant };
        let dyn_entity: &dyn TenantAware = &entity;
        assert_eq!(dyn_entity.tenant_id(), tenant);
    }
}
