use crate::{
    field::Invalid,
    meta::ConsulMeta,
    status::{ConditionStatus, Status},
};
use chrono::{DateTime, Utc};
use consul_k8s_core::{namespace::DEFAULT_NAMESPACE, ConfigEntry};
use kube::ResourceExt;

/// A custom resource that is written to Consul as a config entry.
pub trait ConfigEntryResource:
    kube::Resource<DynamicType = ()>
    + Clone
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The lower-case Kubernetes kind, e.g. `servicedefaults`.
    const KUBE_KIND: &'static str;

    /// The Consul config entry kind, e.g. `service-defaults`.
    const CONSUL_KIND: &'static str;

    /// Global resources are written once per Consul partition rather than
    /// once per namespace.
    const GLOBAL: bool = false;

    fn consul_name(&self) -> String {
        self.name_any()
    }

    fn kubernetes_name(&self) -> String {
        self.name_any()
    }

    fn consul_global_resource(&self) -> bool {
        Self::GLOBAL
    }

    /// The namespace mirrored into Consul when namespace mirroring is
    /// enabled.
    fn consul_mirroring_ns(&self) -> String {
        if Self::GLOBAL {
            return DEFAULT_NAMESPACE.to_string();
        }
        self.namespace().unwrap_or_default()
    }

    fn to_consul(&self, datacenter: &str) -> ConfigEntry;

    /// Whether `candidate`, as read from Consul, already holds this
    /// resource's configuration.
    fn matches_consul(&self, candidate: &ConfigEntry) -> bool;

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid>;

    /// Fills unset namespace fields with the namespace the resource is
    /// written to.
    fn default_namespace_fields(&mut self, _meta: &ConsulMeta) {}

    fn status(&self) -> Option<&Status>;

    fn status_mut(&mut self) -> &mut Status;

    fn set_synced_condition(
        &mut self,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.status_mut().set_synced(status, reason, message);
    }

    fn synced_condition(&self) -> (ConditionStatus, String, String) {
        match self.status() {
            Some(status) => {
                let (s, reason, message) = status.synced();
                (s, reason.to_string(), message.to_string())
            }
            None => (ConditionStatus::Unknown, String::new(), String::new()),
        }
    }

    fn synced_condition_status(&self) -> ConditionStatus {
        self.synced_condition().0
    }

    fn set_last_synced_time(&mut self, time: DateTime<Utc>) {
        self.status_mut().last_synced_time = Some(time);
    }

    fn add_finalizer(&mut self, name: &str) {
        let finalizers = self.finalizers_mut();
        if !finalizers.iter().any(|f| f == name) {
            finalizers.push(name.to_string());
        }
    }

    fn remove_finalizer(&mut self, name: &str) {
        self.finalizers_mut().retain(|f| f != name);
    }
}

/// Implements the status accessors for a resource with a `status` field.
macro_rules! status_accessors {
    () => {
        fn status(&self) -> Option<&$crate::status::Status> {
            self.status.as_ref()
        }

        fn status_mut(&mut self) -> &mut $crate::status::Status {
            self.status.get_or_insert_with(Default::default)
        }
    };
}

pub(crate) use status_accessors;

/// Compares a converted entry with one read from Consul, ignoring the fields
/// Consul owns. `normalize` is applied to both sides first.
pub(crate) fn entries_match(
    mut ours: ConfigEntry,
    theirs: &ConfigEntry,
    normalize: impl Fn(&mut ConfigEntry),
) -> bool {
    if ours.kind() != theirs.kind() {
        return false;
    }
    let mut theirs = theirs.clone();
    for entry in [&mut ours, &mut theirs] {
        entry.clear_server_fields();
        normalize(entry);
    }
    ours == theirs
}
