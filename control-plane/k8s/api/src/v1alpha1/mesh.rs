use crate::{
    field::{self, ErrorList, Invalid, Path},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{is_default, not_in_slice_message, validate_tls_versions},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta, mesh as consul, namespace::DEFAULT_PARTITION, ConfigEntry, MESH,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const PATH_WITH_ESCAPED_SLASHES_ACTIONS: &[&str] = &[
    "IMPLEMENTATION_SPECIFIC_DEFAULT",
    "KEEP_UNCHANGED",
    "REJECT_REQUEST",
    "UNESCAPE_AND_REDIRECT",
    "UNESCAPE_AND_FORWARD",
    "",
];

const HEADERS_WITH_UNDERSCORES_ACTIONS: &[&str] = &["ALLOW", "REJECT_REQUEST", "DROP_HEADER", ""];

/// Mesh-wide configuration. Consul keeps one per partition.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "Mesh",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshSpec {
    #[serde(skip_serializing_if = "is_default")]
    pub transparent_proxy: TransparentProxyMeshConfig,
    #[serde(
        rename = "allowEnablingPermissiveMutualTLS",
        skip_serializing_if = "is_default"
    )]
    pub allow_enabling_permissive_mutual_tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<MeshTlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<MeshHttpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peering: Option<PeeringMeshConfig>,
    #[serde(skip_serializing_if = "is_default")]
    pub validate_clusters: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TransparentProxyMeshConfig {
    /// Only allow transparent proxies to dial services in the mesh.
    #[serde(skip_serializing_if = "is_default")]
    pub mesh_destinations_only: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshTlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<MeshDirectionalTlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<MeshDirectionalTlsConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshDirectionalTlsConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tls_min_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tls_max_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cipher_suites: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshHttpConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub sanitize_x_forwarded_client_cert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<MeshDirectionalHttpConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshDirectionalHttpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_normalization: Option<RequestNormalizationMeshConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
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

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PeeringMeshConfig {
    /// Route peering control plane traffic through mesh gateways. Only
    /// valid in the default partition.
    #[serde(skip_serializing_if = "is_default")]
    pub peer_through_mesh_gateways: bool,
}

impl ConfigEntryResource for Mesh {
    const KUBE_KIND: &'static str = "mesh";
    const CONSUL_KIND: &'static str = MESH;
    const GLOBAL: bool = true;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        let spec = &self.spec;
        ConfigEntry::Mesh(consul::MeshConfigEntry {
            transparent_proxy: consul::TransparentProxyMeshConfig {
                mesh_destinations_only: spec.transparent_proxy.mesh_destinations_only,
            },
            allow_enabling_permissive_mutual_tls: spec.allow_enabling_permissive_mutual_tls,
            tls: spec.tls.as_ref().map(|tls| consul::MeshTlsConfig {
                incoming: tls.incoming.as_ref().map(MeshDirectionalTlsConfig::to_consul),
                outgoing: tls.outgoing.as_ref().map(MeshDirectionalTlsConfig::to_consul),
            }),
            http: spec.http.as_ref().map(|http| consul::MeshHttpConfig {
                sanitize_x_forwarded_client_cert: http.sanitize_x_forwarded_client_cert,
                incoming: http.incoming.as_ref().map(|i| consul::MeshDirectionalHttpConfig {
                    request_normalization: i
                        .request_normalization
                        .as_ref()
                        .map(RequestNormalizationMeshConfig::to_consul),
                }),
            }),
            peering: spec.peering.as_ref().map(|p| consul::PeeringMeshConfig {
                peer_through_mesh_gateways: p.peer_through_mesh_gateways,
            }),
            validate_clusters: spec.validate_clusters,
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |_| {})
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let spec = &self.spec;
        let path = Path::new("spec");
        let mut errs = ErrorList::new();

        if let Some(tls) = &spec.tls {
            let tls_path = path.child("tls");
            for (dir, cfg) in [("incoming", &tls.incoming), ("outgoing", &tls.outgoing)] {
                if let Some(cfg) = cfg {
                    errs.extend(cfg.validate(&tls_path.child(dir)));
                }
            }
        }

        let peer_through_gateways = spec
            .peering
            .as_ref()
            .is_some_and(|p| p.peer_through_mesh_gateways);
        if meta.partitions_enabled && peer_through_gateways && meta.partition != DEFAULT_PARTITION {
            errs.push(field::forbidden(
                &path.child("peering").child("peerThroughMeshGateways"),
                "\"peerThroughMeshGateways\" is only valid in the \"default\" partition",
            ));
        }

        let normalization = spec
            .http
            .as_ref()
            .and_then(|h| h.incoming.as_ref())
            .and_then(|i| i.request_normalization.as_ref());
        if let Some(rn) = normalization {
            errs.extend(rn.validate(
                &path
                    .child("http")
                    .child("incoming")
                    .child("requestNormalization"),
            ));
        }

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

impl MeshDirectionalTlsConfig {
    fn to_consul(&self) -> consul::MeshDirectionalTlsConfig {
        consul::MeshDirectionalTlsConfig {
            tls_min_version: self.tls_min_version.clone(),
            tls_max_version: self.tls_max_version.clone(),
            cipher_suites: self.cipher_suites.clone(),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        validate_tls_versions(&self.tls_min_version, &self.tls_max_version, path)
    }
}

impl RequestNormalizationMeshConfig {
    fn to_consul(&self) -> consul::RequestNormalizationMeshConfig {
        consul::RequestNormalizationMeshConfig {
            insecure_disable_path_normalization: self.insecure_disable_path_normalization,
            merge_slashes: self.merge_slashes,
            path_with_escaped_slashes_action: self.path_with_escaped_slashes_action.clone(),
            headers_with_underscores_action: self.headers_with_underscores_action.clone(),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        let action = &self.path_with_escaped_slashes_action;
        if !PATH_WITH_ESCAPED_SLASHES_ACTIONS.contains(&action.as_str()) {
            errs.push(field::invalid(
                &path.child("pathWithEscapedSlashesAction"),
                action,
                not_in_slice_message(PATH_WITH_ESCAPED_SLASHES_ACTIONS),
            ));
        }
        let action = &self.headers_with_underscores_action;
        if !HEADERS_WITH_UNDERSCORES_ACTIONS.contains(&action.as_str()) {
            errs.push(field::invalid(
                &path.child("headersWithUnderscoresAction"),
                action,
                not_in_slice_message(HEADERS_WITH_UNDERSCORES_ACTIONS),
            ));
        }
        errs
    }
}
