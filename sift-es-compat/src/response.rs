//! Informational documents served on the compatibility surface
//!
//! Clients such as Kibana, Logstash and the official language clients probe
//! these endpoints before issuing real requests, and refuse to continue when
//! the reported version or product is not what they expect.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Identity of the emulated cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub node_name: String,
    pub cluster_name: String,
    pub cluster_uuid: String,
    /// Elasticsearch version reported to clients
    pub version_number: String,
    /// Version of the serving product, reported as the build hash
    pub build_version: String,
}

impl Default for ClusterIdentity {
    fn default() -> Self {
        Self {
            node_name: "sift".to_string(),
            cluster_name: "sift".to_string(),
            cluster_uuid: "sift-es-compat".to_string(),
            version_number: "8.1.0".to_string(),
            build_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// GET /es/ - root info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsRootInfo {
    pub name: String,
    pub cluster_name: String,
    pub cluster_uuid: String,
    pub version: EsVersion,
    pub tagline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsVersion {
    pub number: String,
    pub build_flavor: String,
    pub build_type: String,
    pub build_hash: String,
    pub build_date: String,
    pub build_snapshot: bool,
    pub lucene_version: String,
    pub minimum_wire_compatibility_version: String,
    pub minimum_index_compatibility_version: String,
}

impl EsRootInfo {
    pub fn new(identity: &ClusterIdentity) -> Self {
        Self {
            name: identity.node_name.clone(),
            cluster_name: identity.cluster_name.clone(),
            cluster_uuid: identity.cluster_uuid.clone(),
            version: EsVersion {
                number: identity.version_number.clone(),
                build_flavor: "default".to_string(),
                build_type: "sift".to_string(),
                build_hash: identity.build_version.clone(),
                build_date: "2023-01-01T00:00:00.000000Z".to_string(),
                build_snapshot: false,
                lucene_version: "9.0.0".to_string(),
                minimum_wire_compatibility_version: "7.17.0".to_string(),
                minimum_index_compatibility_version: "7.0.0".to_string(),
            },
            tagline: "You Know, for Search".to_string(),
        }
    }
}

impl Default for EsRootInfo {
    fn default() -> Self {
        Self::new(&ClusterIdentity::default())
    }
}

/// GET /es/_license
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsLicense {
    pub license: EsLicenseDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsLicenseDetail {
    pub status: String,
    pub uid: String,
    #[serde(rename = "type")]
    pub license_type: String,
    pub issue_date: String,
    pub issue_date_in_millis: i64,
    pub max_nodes: u32,
    pub issued_to: String,
    pub issuer: String,
    pub start_date_in_millis: i64,
}

impl EsLicense {
    pub fn new(identity: &ClusterIdentity) -> Self {
        Self {
            license: EsLicenseDetail {
                status: "active".to_string(),
                uid: identity.cluster_uuid.clone(),
                license_type: "basic".to_string(),
                issue_date: "2023-01-01T00:00:00.000Z".to_string(),
                issue_date_in_millis: 1_672_531_200_000,
                max_nodes: 1000,
                issued_to: identity.cluster_name.clone(),
                issuer: "elasticsearch".to_string(),
                start_date_in_millis: -1,
            },
        }
    }
}

/// GET /es/_xpack
pub fn xpack_info(identity: &ClusterIdentity) -> Value {
    let feature = |available: bool| json!({ "available": available, "enabled": available });

    json!({
        "build": {
            "hash": identity.build_version,
            "date": "2023-01-01T00:00:00.000000Z"
        },
        "license": {
            "uid": identity.cluster_uuid,
            "type": "basic",
            "mode": "basic",
            "status": "active"
        },
        "features": {
            "security": feature(true),
            "monitoring": feature(false),
            "ml": feature(false),
            "graph": feature(false),
            "watcher": feature(false),
            "sql": feature(false),
            "ilm": feature(false),
            "data_streams": feature(true)
        },
        "tagline": "You know, for X"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_info_default() {
        let info = EsRootInfo::default();
        assert_eq!(info.name, "sift");
        assert_eq!(info.cluster_name, "sift");
        assert_eq!(info.version.number, "8.1.0");
        assert_eq!(info.version.build_flavor, "default");
        assert!(!info.version.build_snapshot);
        assert_eq!(info.tagline, "You Know, for Search");
    }

    #[test]
    fn test_root_info_uses_identity() {
        let identity = ClusterIdentity {
            cluster_name: "search-prod".to_string(),
            version_number: "7.17.9".to_string(),
            ..Default::default()
        };
        let info = EsRootInfo::new(&identity);
        assert_eq!(info.cluster_name, "search-prod");
        assert_eq!(info.version.number, "7.17.9");
    }

    #[test]
    fn test_license_shape() {
        let license = serde_json::to_value(EsLicense::new(&ClusterIdentity::default())).unwrap();
        assert_eq!(license["license"]["status"], "active");
        assert_eq!(license["license"]["type"], "basic");
        assert_eq!(license["license"]["issued_to"], "sift");
    }

    #[test]
    fn test_xpack_security_feature() {
        let info = xpack_info(&ClusterIdentity::default());
        assert_eq!(info["features"]["security"]["available"], true);
        assert_eq!(info["license"]["mode"], "basic");
    }
}
