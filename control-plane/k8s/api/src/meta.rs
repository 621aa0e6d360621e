//! How the controller's Consul installation is laid out.

pub use consul_k8s_core::namespace::consul_namespace;
use consul_k8s_core::{
    namespace::{DATACENTER_KEY, SOURCE_KEY, SOURCE_VALUE},
    Meta,
};

/// Enterprise features and namespace placement of the Consul cluster that
/// resources are validated against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsulMeta {
    pub partitions_enabled: bool,
    /// The local admin partition.
    pub partition: String,
    pub namespaces_enabled: bool,
    pub destination_namespace: String,
    pub mirroring: bool,
    pub prefix: String,
}

impl ConsulMeta {
    /// The Consul namespace resources in `kube_ns` are written to.
    pub fn consul_namespace(&self, kube_ns: &str) -> String {
        consul_namespace(
            kube_ns,
            self.namespaces_enabled,
            &self.destination_namespace,
            self.mirroring,
            &self.prefix,
        )
    }
}

/// Marks an entry as written from Kubernetes in `datacenter`.
pub fn source_meta(datacenter: &str) -> Meta {
    Meta::from([
        (SOURCE_KEY.to_string(), SOURCE_VALUE.to_string()),
        (DATACENTER_KEY.to_string(), datacenter.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stamps_source() {
        assert_eq!(
            source_meta("dc1"),
            Meta::from([
                ("consul.hashicorp.com/source-datacenter".to_string(), "dc1".to_string()),
                ("external-source".to_string(), "kubernetes".to_string()),
            ])
        );
    }

    #[test]
    fn mirrors_with_prefix() {
        let meta = ConsulMeta {
            namespaces_enabled: true,
            mirroring: true,
            prefix: "k8s-".to_string(),
            ..Default::default()
        };
        assert_eq!(meta.consul_namespace("web"), "k8s-web");
        assert_eq!(ConsulMeta::default().consul_namespace("web"), "");
    }
}
