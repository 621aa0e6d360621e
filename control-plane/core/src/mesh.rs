use crate::common::{is_default, EntryMeta};
use serde::{Deserialize, Serialize};

/// The `mesh` entry. There is exactly one per partition, so it carries no
/// name of its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshConfigEntry {
    #[serde(skip_serializing_if = "is_default")]
    pub transparent_proxy: TransparentProxyMeshConfig,
    #[serde(
        rename = "AllowEnablingPermissiveMutualTLS",
        skip_serializing_if = "is_default"
    )]
    pub allow_enabling_permissive_mutual_tls: bool,
    #[serde(rename = "TLS", skip_serializing_if = "Option::is_none")]
    pub tls: Option<MeshTlsConfig>,
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    pub http: Option<MeshHttpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peering: Option<PeeringMeshConfig>,
    #[serde(skip_serializing_if = "is_default")]
    pub validate_clusters: bool,
    #[serde(flatten)]
    pub entry_meta: EntryMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransparentProxyMeshConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub mesh_destinations_only: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshTlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<MeshDirectionalTlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<MeshDirectionalTlsConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshDirectionalTlsConfig {
    #[serde(rename = "TLSMinVersion", skip_serializing_if = "String::is_empty")]
    pub tls_min_version: String,
    #[serde(rename = "TLSMaxVersion", skip_serializing_if = "String::is_empty")]
    pub tls_max_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cipher_suites: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshHttpConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub sanitize_x_forwarded_client_cert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<MeshDirectionalHttpConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshDirectionalHttpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_normalization: Option<RequestNormalizationMeshConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestNormalizationMeshConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub insecure_disable_path_normalization: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub merge_slashes: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_with_escaped_slashes_action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub headers_with_underscores_action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeeringMeshConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub peer_through_mesh_gateways: bool,
}
