use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Bucket that always backs the `default` partition on Couchbase.
pub const DEFAULT_BUCKET: &str = "gluu";

/// Which persistence backend(s) hold identity data.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Ldap,
    Couchbase,
    Hybrid,
}

impl Topology {
    #[must_use]
    pub fn uses_ldap(self) -> bool {
        matches!(self, Topology::Ldap | Topology::Hybrid)
    }

    #[must_use]
    pub fn uses_couchbase(self) -> bool {
        matches!(self, Topology::Couchbase | Topology::Hybrid)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topology::Ldap => "ldap",
            Topology::Couchbase => "couchbase",
            Topology::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Logical slice of identity data that can be routed to a backend.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Default,
    User,
    Cache,
    Site,
    Token,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Default,
        Partition::User,
        Partition::Cache,
        Partition::Site,
        Partition::Token,
    ];

    #[must_use]
    pub fn bucket(self) -> &'static str {
        match self {
            Partition::Default => DEFAULT_BUCKET,
            Partition::User => "gluu_user",
            Partition::Cache => "gluu_cache",
            Partition::Site => "gluu_site",
            Partition::Token => "gluu_token",
        }
    }

    /// Directory branches stored in this partition. Empty for `default`,
    /// which holds everything not claimed by another partition.
    #[must_use]
    pub fn mapping(self) -> &'static str {
        match self {
            Partition::Default => "",
            Partition::User => "people, groups, authorizations",
            Partition::Cache => "cache",
            Partition::Site => "cache-refresh",
            Partition::Token => "tokens",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Partition::Default => "default",
            Partition::User => "user",
            Partition::Cache => "cache",
            Partition::Site => "site",
            Partition::Token => "token",
        };
        f.write_str(name)
    }
}

/// Topology plus the partition kept on LDAP when running hybrid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceLayout {
    pub topology: Topology,
    pub ldap_mapping: Partition,
}

impl PersistenceLayout {
    #[must_use]
    pub fn new(topology: Topology, ldap_mapping: Partition) -> Self {
        Self {
            topology,
            ldap_mapping,
        }
    }

    /// Whether people/groups are served from Couchbase rather than LDAP.
    #[must_use]
    pub fn user_in_couchbase(&self) -> bool {
        match self.topology {
            Topology::Ldap => false,
            Topology::Couchbase => true,
            Topology::Hybrid => self.ldap_mapping != Partition::User,
        }
    }

    /// Partitions hosted on Couchbase, in canonical order.
    #[must_use]
    pub fn couchbase_partitions(&self) -> Vec<Partition> {
        match self.topology {
            Topology::Ldap => Vec::new(),
            Topology::Couchbase => Partition::ALL.to_vec(),
            Topology::Hybrid => Partition::ALL
                .into_iter()
                .filter(|partition| *partition != self.ldap_mapping)
                .collect(),
        }
    }

    /// Comma-separated bucket list; the default bucket is always present.
    #[must_use]
    pub fn couchbase_buckets(&self) -> String {
        let mut buckets: Vec<&str> = self
            .couchbase_partitions()
            .into_iter()
            .map(Partition::bucket)
            .collect();
        if !buckets.contains(&DEFAULT_BUCKET) {
            buckets.insert(0, DEFAULT_BUCKET);
        }
        buckets.join(", ")
    }

    /// `bucket.<name>.mapping: <branches>` lines for partitions with a mapping.
    #[must_use]
    pub fn couchbase_mapping_lines(&self) -> String {
        self.couchbase_partitions()
            .into_iter()
            .filter(|partition| !partition.mapping().is_empty())
            .map(|partition| {
                format!(
                    "bucket.{}.mapping: {}",
                    partition.bucket(),
                    partition.mapping()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Body of the hybrid routing properties file.
    #[must_use]
    pub fn hybrid_properties(&self) -> String {
        let default_storage = if self.ldap_mapping == Partition::Default {
            "ldap"
        } else {
            "couchbase"
        };
        let couchbase_mapping = self
            .couchbase_partitions()
            .into_iter()
            .map(Partition::mapping)
            .filter(|mapping| !mapping.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "storages: ldap, couchbase\n\
             storage.default: {default_storage}\n\
             storage.ldap.mapping: {}\n\
             storage.couchbase.mapping: {couchbase_mapping}\n",
            self.ldap_mapping.mapping()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_location_by_topology() {
        assert!(!PersistenceLayout::new(Topology::Ldap, Partition::Default).user_in_couchbase());
        assert!(
            PersistenceLayout::new(Topology::Couchbase, Partition::Default).user_in_couchbase()
        );
        assert!(!PersistenceLayout::new(Topology::Hybrid, Partition::User).user_in_couchbase());
        assert!(PersistenceLayout::new(Topology::Hybrid, Partition::Cache).user_in_couchbase());
    }

    #[test]
    fn test_hybrid_user_on_ldap_keeps_default_bucket() {
        let layout = PersistenceLayout::new(Topology::Hybrid, Partition::User);

        let buckets = layout.couchbase_buckets();
        let mappings = layout.couchbase_mapping_lines();

        assert_eq!(buckets, "gluu, gluu_cache, gluu_site, gluu_token");
        assert!(!mappings.contains("gluu_user"));
        assert!(mappings.contains("bucket.gluu_cache.mapping: cache"));
    }

    #[test]
    fn test_hybrid_default_on_ldap_still_lists_default_bucket() {
        let layout = PersistenceLayout::new(Topology::Hybrid, Partition::Default);

        let buckets = layout.couchbase_buckets();

        assert!(buckets.starts_with("gluu, "));
        assert!(buckets.contains("gluu_user"));
    }

    #[test]
    fn test_couchbase_lists_every_bucket_once() {
        let layout = PersistenceLayout::new(Topology::Couchbase, Partition::User);

        assert_eq!(
            layout.couchbase_buckets(),
            "gluu, gluu_user, gluu_cache, gluu_site, gluu_token"
        );
        assert_eq!(layout.couchbase_mapping_lines().lines().count(), 4);
    }

    #[test]
    fn test_hybrid_properties_exclude_ldap_partition() {
        let layout = PersistenceLayout::new(Topology::Hybrid, Partition::Token);

        let props = layout.hybrid_properties();

        assert!(props.contains("storage.default: couchbase"));
        assert!(props.contains("storage.ldap.mapping: tokens"));
        assert!(props.contains(
            "storage.couchbase.mapping: people, groups, authorizations, cache, cache-refresh\n"
        ));
    }

    #[test]
    fn test_hybrid_properties_default_on_ldap() {
        let layout = PersistenceLayout::new(Topology::Hybrid, Partition::Default);

        let props = layout.hybrid_properties();

        assert!(props.contains("storage.default: ldap"));
        assert!(props.contains("storage.ldap.mapping: \n"));
    }
}
