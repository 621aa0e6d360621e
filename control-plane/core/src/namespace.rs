/// The Consul namespace and partition that an unset field refers to.
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_PARTITION: &str = "default";

pub const WILDCARD: &str = "*";

/// Meta keys stamped on every entry written by this controller.
pub const SOURCE_KEY: &str = "external-source";
pub const SOURCE_VALUE: &str = "kubernetes";
pub const DATACENTER_KEY: &str = "consul.hashicorp.com/source-datacenter";

/// Returns the Consul namespace that resources in `kube_ns` are written to.
///
/// Empty when Consul namespaces are disabled. With mirroring, the Kubernetes
/// namespace is used behind `prefix`; otherwise every resource lands in
/// `destination`.
pub fn consul_namespace(
    kube_ns: &str,
    namespaces_enabled: bool,
    destination: &str,
    mirroring: bool,
    prefix: &str,
) -> String {
    if !namespaces_enabled {
        return String::new();
    }
    if mirroring {
        return format!("{prefix}{kube_ns}");
    }
    destination.to_string()
}

/// Treats an empty namespace or partition as `default`.
pub fn normalize_empty_to_default(value: &mut String) {
    if value.is_empty() {
        value.push_str(DEFAULT_NAMESPACE);
    }
}
