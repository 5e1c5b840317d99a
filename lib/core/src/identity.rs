//! Identity mappings between directory identities and platform user ids.

use serde::{Deserialize, Serialize};

/// Association between an external directory identity and the platform
/// user id it has within a tenant.
///
/// The whole record is hashable so it can serve as its own dedup key: a
/// changed display name is a different key and therefore gets written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityMapping {
    /// External directory id. Unique across the registry.
    pub external_id: String,
    /// Tenant the identity was last seen in.
    pub tenant_id: String,
    /// Platform-specific user id within the tenant.
    pub platform_user_id: String,
    /// Display name, when the event carried one.
    pub name: Option<String>,
}

impl IdentityMapping {
    /// Creates a new mapping.
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        tenant_id: impl Into<String>,
        platform_user_id: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            tenant_id: tenant_id.into(),
            platform_user_id: platform_user_id.into(),
            name,
        }
    }

    /// Merges an incoming observation into this stored mapping.
    ///
    /// Tenant and platform id are always taken from `incoming`; the name is
    /// only replaced when `incoming` carries one.
    #[must_use]
    pub fn merged_with(self, incoming: IdentityMapping) -> IdentityMapping {
        IdentityMapping {
            external_id: self.external_id,
            tenant_id: incoming.tenant_id,
            platform_user_id: incoming.platform_user_id,
            name: incoming.name.or(self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_name_when_incoming_has_none() {
        let stored = IdentityMapping::new("u1", "t1", "p1", Some("Alice".to_string()));
        let merged = stored.merged_with(IdentityMapping::new("u1", "t1", "p1", None));
        assert_eq!(merged.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn merge_overwrites_everything_else() {
        let stored = IdentityMapping::new("u1", "t1", "p1", Some("Alice".to_string()));
        let merged = stored.merged_with(IdentityMapping::new(
            "u1",
            "t2",
            "p2",
            Some("Alice B.".to_string()),
        ));
        assert_eq!(merged.tenant_id, "t2");
        assert_eq!(merged.platform_user_id, "p2");
        assert_eq!(merged.name.as_deref(), Some("Alice B."));
    }
}
