use crate::{
    common::EntryMeta, exported::ExportedServicesConfigEntry, gateway::*,
    intentions::ServiceIntentionsConfigEntry, jwt::JwtProviderConfigEntry, mesh::MeshConfigEntry,
    proxy::ProxyConfigEntry, rate_limit::RateLimitIpConfigEntry,
    resolver::ServiceResolverConfigEntry, router::ServiceRouterConfigEntry,
    sameness::SamenessGroupConfigEntry, service::ServiceConfigEntry,
    splitter::ServiceSplitterConfigEntry,
};
use serde::{Deserialize, Serialize};

pub const SERVICE_DEFAULTS: &str = "service-defaults";
pub const PROXY_DEFAULTS: &str = "proxy-defaults";
pub const SERVICE_ROUTER: &str = "service-router";
pub const SERVICE_SPLITTER: &str = "service-splitter";
pub const SERVICE_RESOLVER: &str = "service-resolver";
pub const INGRESS_GATEWAY: &str = "ingress-gateway";
pub const TERMINATING_GATEWAY: &str = "terminating-gateway";
pub const SERVICE_INTENTIONS: &str = "service-intentions";
pub const MESH: &str = "mesh";
pub const EXPORTED_SERVICES: &str = "exported-services";
pub const SAMENESS_GROUP: &str = "sameness-group";
pub const JWT_PROVIDER: &str = "jwt-provider";
pub const RATE_LIMIT_IP: &str = "control-plane-request-limit";

/// A Consul config entry of any kind, tagged by its `Kind` field.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "Kind")]
pub enum ConfigEntry {
    #[serde(rename = "service-defaults")]
    ServiceDefaults(ServiceConfigEntry),
    #[serde(rename = "proxy-defaults")]
    ProxyDefaults(ProxyConfigEntry),
    #[serde(rename = "service-router")]
    ServiceRouter(ServiceRouterConfigEntry),
    #[serde(rename = "service-splitter")]
    ServiceSplitter(ServiceSplitterConfigEntry),
    #[serde(rename = "service-resolver")]
    ServiceResolver(ServiceResolverConfigEntry),
    #[serde(rename = "ingress-gateway")]
    IngressGateway(IngressGatewayConfigEntry),
    #[serde(rename = "terminating-gateway")]
    TerminatingGateway(TerminatingGatewayConfigEntry),
    #[serde(rename = "service-intentions")]
    ServiceIntentions(ServiceIntentionsConfigEntry),
    #[serde(rename = "mesh")]
    Mesh(MeshConfigEntry),
    #[serde(rename = "exported-services")]
    ExportedServices(ExportedServicesConfigEntry),
    #[serde(rename = "sameness-group")]
    SamenessGroup(SamenessGroupConfigEntry),
    #[serde(rename = "jwt-provider")]
    JwtProvider(JwtProviderConfigEntry),
    #[serde(rename = "control-plane-request-limit")]
    RateLimitIp(RateLimitIpConfigEntry),
}

impl ConfigEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceDefaults(_) => SERVICE_DEFAULTS,
            Self::ProxyDefaults(_) => PROXY_DEFAULTS,
            Self::ServiceRouter(_) => SERVICE_ROUTER,
            Self::ServiceSplitter(_) => SERVICE_SPLITTER,
            Self::ServiceResolver(_) => SERVICE_RESOLVER,
            Self::IngressGateway(_) => INGRESS_GATEWAY,
            Self::TerminatingGateway(_) => TERMINATING_GATEWAY,
            Self::ServiceIntentions(_) => SERVICE_INTENTIONS,
            Self::Mesh(_) => MESH,
            Self::ExportedServices(_) => EXPORTED_SERVICES,
            Self::SamenessGroup(_) => SAMENESS_GROUP,
            Self::JwtProvider(_) => JWT_PROVIDER,
            Self::RateLimitIp(_) => RATE_LIMIT_IP,
        }
    }

    /// The entry's name. Mesh entries are singletons and are always named
    /// `mesh`.
    pub fn name(&self) -> &str {
        match self {
            Self::ServiceDefaults(e) => &e.name,
            Self::ProxyDefaults(e) => &e.name,
            Self::ServiceRouter(e) => &e.name,
            Self::ServiceSplitter(e) => &e.name,
            Self::ServiceResolver(e) => &e.name,
            Self::IngressGateway(e) => &e.name,
            Self::TerminatingGateway(e) => &e.name,
            Self::ServiceIntentions(e) => &e.name,
            Self::Mesh(_) => MESH,
            Self::ExportedServices(e) => &e.name,
            Self::SamenessGroup(e) => &e.name,
            Self::JwtProvider(e) => &e.name,
            Self::RateLimitIp(e) => &e.name,
        }
    }

    pub fn entry_meta(&self) -> &EntryMeta {
        match self {
            Self::ServiceDefaults(e) => &e.entry_meta,
            Self::ProxyDefaults(e) => &e.entry_meta,
            Self::ServiceRouter(e) => &e.entry_meta,
            Self::ServiceSplitter(e) => &e.entry_meta,
            Self::ServiceResolver(e) => &e.entry_meta,
            Self::IngressGateway(e) => &e.entry_meta,
            Self::TerminatingGateway(e) => &e.entry_meta,
            Self::ServiceIntentions(e) => &e.entry_meta,
            Self::Mesh(e) => &e.entry_meta,
            Self::ExportedServices(e) => &e.entry_meta,
            Self::SamenessGroup(e) => &e.entry_meta,
            Self::JwtProvider(e) => &e.entry_meta,
            Self::RateLimitIp(e) => &e.entry_meta,
        }
    }

    pub fn entry_meta_mut(&mut self) -> &mut EntryMeta {
        match self {
            Self::ServiceDefaults(e) => &mut e.entry_meta,
            Self::ProxyDefaults(e) => &mut e.entry_meta,
            Self::ServiceRouter(e) => &mut e.entry_meta,
            Self::ServiceSplitter(e) => &mut e.entry_meta,
            Self::ServiceResolver(e) => &mut e.entry_meta,
            Self::IngressGateway(e) => &mut e.entry_meta,
            Self::TerminatingGateway(e) => &mut e.entry_meta,
            Self::ServiceIntentions(e) => &mut e.entry_meta,
            Self::Mesh(e) => &mut e.entry_meta,
            Self::ExportedServices(e) => &mut e.entry_meta,
            Self::SamenessGroup(e) => &mut e.entry_meta,
            Self::JwtProvider(e) => &mut e.entry_meta,
            Self::RateLimitIp(e) => &mut e.entry_meta,
        }
    }

    /// Clears the fields Consul owns: meta, namespace, partition and the raft
    /// indexes. What remains is the configuration itself.
    pub fn clear_server_fields(&mut self) {
        *self.entry_meta_mut() = EntryMeta::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Meta;
    use pretty_assertions::assert_eq;

    #[test]
    fn tagged_by_kind() {
        let entry = ConfigEntry::ServiceDefaults(ServiceConfigEntry {
            name: "web".to_string(),
            protocol: "http".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Kind": "service-defaults",
                "Name": "web",
                "Protocol": "http",
            })
        );
        assert_eq!(serde_json::from_value::<ConfigEntry>(json).unwrap(), entry);
    }

    #[test]
    fn decodes_consul_response() {
        let entry: ConfigEntry = serde_json::from_value(serde_json::json!({
            "Kind": "control-plane-request-limit",
            "Name": "global",
            "Mode": "permissive",
            "ReadRate": 100.0,
            "WriteRate": 100.0,
            "ACL": { "ReadRate": 1.0, "WriteRate": 2.0 },
            "Meta": { "external-source": "kubernetes" },
            "CreateIndex": 12,
            "ModifyIndex": 14,
        }))
        .unwrap();
        assert_eq!(entry.kind(), RATE_LIMIT_IP);
        assert_eq!(entry.name(), "global");
        assert_eq!(entry.entry_meta().modify_index, 14);

        let ConfigEntry::RateLimitIp(cprl) = &entry else {
            panic!("unexpected kind: {}", entry.kind());
        };
        assert_eq!(cprl.acl.as_ref().map(|c| c.write_rate), Some(2.0));
    }

    #[test]
    fn mesh_is_named_mesh() {
        let entry = ConfigEntry::Mesh(Default::default());
        assert_eq!(entry.kind(), "mesh");
        assert_eq!(entry.name(), "mesh");
    }

    #[test]
    fn clears_server_fields() {
        let mut entry = ConfigEntry::SamenessGroup(SamenessGroupConfigEntry {
            name: "group".to_string(),
            entry_meta: EntryMeta {
                namespace: "ns".to_string(),
                partition: "part".to_string(),
                meta: Meta::from([("k".to_string(), "v".to_string())]),
                create_index: 1,
                modify_index: 2,
            },
            ..Default::default()
        });
        entry.clear_server_fields();
        assert_eq!(
            entry,
            ConfigEntry::SamenessGroup(SamenessGroupConfigEntry {
                name: "group".to_string(),
                ..Default::default()
            })
        );
    }
}
