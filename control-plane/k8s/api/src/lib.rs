#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod field;
pub mod meta;
pub mod resource;
pub mod shared;
pub mod status;
pub mod v1alpha1;

pub use self::{
    field::{Invalid, GROUP},
    meta::ConsulMeta,
    resource::ConfigEntryResource,
    status::{ConditionStatus, Status},
};
pub use consul_k8s_core::{ConfigEntry, GoDuration};
pub use k8s_openapi::{api, apimachinery::pkg::apis::meta::v1::ObjectMeta};
pub use kube::ResourceExt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexports_object_metadata() {
        let mut sd = v1alpha1::ServiceDefaults::new("web", Default::default());
        sd.metadata = ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some("apps".to_string()),
            ..Default::default()
        };
        assert_eq!(sd.name_any(), "web");
        assert_eq!(sd.namespace().as_deref(), Some("apps"));
    }
}
