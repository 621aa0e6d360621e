use crate::{
    field::{self, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{is_default, HttpHeaderModifiers},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta, namespace::normalize_empty_to_default, splitter as consul, ConfigEntry,
    SERVICE_SPLITTER,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Splits traffic for a service across a set of weighted targets.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ServiceSplitter",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSplitterSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<ServiceSplit>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSplit {
    /// Percentage of traffic sent to this target.
    #[serde(skip_serializing_if = "is_default")]
    pub weight: f32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HttpHeaderModifiers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HttpHeaderModifiers>,
}

impl ConfigEntryResource for ServiceSplitter {
    const KUBE_KIND: &'static str = "servicesplitter";
    const CONSUL_KIND: &'static str = SERVICE_SPLITTER;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::ServiceSplitter(consul::ServiceSplitterConfigEntry {
            name: self.consul_name(),
            splits: self.spec.splits.iter().map(ServiceSplit::to_consul).collect(),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ServiceSplitter(ss) = entry else {
                return;
            };
            for split in &mut ss.splits {
                normalize_empty_to_default(&mut split.namespace);
                normalize_empty_to_default(&mut split.partition);
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let path = Path::new("spec").child("splits");
        let mut errs = validate_splits(&self.spec.splits, &path);

        if !meta.namespaces_enabled {
            for (i, split) in self.spec.splits.iter().enumerate() {
                if !split.namespace.is_empty() {
                    errs.push(field::invalid(
                        &path.index(i).child("namespace"),
                        &split.namespace,
                        "Consul Enterprise namespaces must be enabled to set split.namespace",
                    ));
                }
            }
        }
        if !meta.partitions_enabled {
            for (i, split) in self.spec.splits.iter().enumerate() {
                if !split.partition.is_empty() {
                    errs.push(field::invalid(
                        &path.index(i).child("partition"),
                        &split.partition,
                        "Consul Enterprise partitions must be enabled to set split.partition",
                    ));
                }
            }
        }

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

/// Each weight must be zero or a percentage, and together they must sum to
/// exactly 100.
fn validate_splits(splits: &[ServiceSplit], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut sum = 0f32;
    for (i, split) in splits.iter().enumerate() {
        let w = split.weight;
        if w != 0.0 && !(0.01..=100.0).contains(&w) {
            errs.push(field::invalid(
                &path.index(i).child("weight"),
                w,
                "weight must be a percentage between 0.01 and 100",
            ));
        }
        sum += w;
    }

    if sum != 100.0 {
        errs.push(field::invalid(
            path,
            Value::json_string(splits),
            format!("the sum of weights across all splits must add up to 100 percent, but adds up to {sum:.6}"),
        ));
    }
    errs
}

impl ServiceSplit {
    fn to_consul(&self) -> consul::ServiceSplit {
        consul::ServiceSplit {
            weight: self.weight,
            service: self.service.clone(),
            service_subset: self.service_subset.clone(),
            namespace: self.namespace.clone(),
            partition: self.partition.clone(),
            request_headers: self.request_headers.as_ref().map(HttpHeaderModifiers::to_consul),
            response_headers: self
                .response_headers
                .as_ref()
                .map(HttpHeaderModifiers::to_consul),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn splitter(splits: Vec<ServiceSplit>) -> ServiceSplitter {
        let mut ss = ServiceSplitter::new("foo", ServiceSplitterSpec { splits });
        ss.metadata.namespace = Some("bar".to_string());
        ss
    }

    fn weighted(weight: f32) -> ServiceSplit {
        ServiceSplit {
            weight,
            ..Default::default()
        }
    }

    #[test]
    fn to_consul() {
        let ss = splitter(vec![ServiceSplit {
            weight: 100.0,
            service: "web-v2".to_string(),
            service_subset: "canary".to_string(),
            request_headers: Some(HttpHeaderModifiers {
                remove: vec!["x-debug".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        }]);
        let ConfigEntry::ServiceSplitter(entry) = ss.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        assert_eq!(entry.name, "foo");
        assert_eq!(entry.entry_meta.meta, source_meta("dc1"));
        assert_eq!(entry.splits[0].weight, 100.0);
        assert_eq!(entry.splits[0].service_subset, "canary");
        assert_eq!(
            entry.splits[0].request_headers.as_ref().map(|h| h.remove.clone()),
            Some(vec!["x-debug".to_string()])
        );
    }

    #[test]
    fn matches_normalized_namespaces() {
        let ss = splitter(vec![weighted(100.0)]);
        let ConfigEntry::ServiceSplitter(mut candidate) = ss.to_consul("dc2") else {
            panic!("unexpected kind");
        };
        candidate.splits[0].namespace = "default".to_string();
        candidate.entry_meta.modify_index = 4;
        assert!(ss.matches_consul(&ConfigEntry::ServiceSplitter(candidate.clone())));

        candidate.splits[0].weight = 50.0;
        assert!(!ss.matches_consul(&ConfigEntry::ServiceSplitter(candidate)));
    }

    #[rstest]
    #[case::exact(vec![weighted(100.0)])]
    #[case::fractional(vec![weighted(99.99), weighted(0.01)])]
    #[case::zero_weight(vec![weighted(50.0), weighted(50.0), weighted(0.0)])]
    fn accepts_valid(#[case] splits: Vec<ServiceSplit>) {
        assert_eq!(splitter(splits).validate(&ConsulMeta::default()), Ok(()));
    }

    #[rstest]
    #[case::sum(
        vec![weighted(90.0), weighted(5.0)],
        r#"servicesplitter.consul.hashicorp.com "foo" is invalid: spec.splits: Invalid value: "[{\"weight\":90.0},{\"weight\":5.0}]": the sum of weights across all splits must add up to 100 percent, but adds up to 95.000000"#
    )]
    #[case::range(
        vec![weighted(101.0), weighted(0.001)],
        r#"servicesplitter.consul.hashicorp.com "foo" is invalid: [spec.splits[0].weight: Invalid value: 101: weight must be a percentage between 0.01 and 100, spec.splits[1].weight: Invalid value: 0.001: weight must be a percentage between 0.01 and 100, spec.splits: Invalid value: "[{\"weight\":101.0},{\"weight\":0.001}]": the sum of weights across all splits must add up to 100 percent, but adds up to 101.000999]"#
    )]
    #[case::namespace(
        vec![ServiceSplit { weight: 100.0, namespace: "other".to_string(), ..Default::default() }],
        r#"servicesplitter.consul.hashicorp.com "foo" is invalid: spec.splits[0].namespace: Invalid value: "other": Consul Enterprise namespaces must be enabled to set split.namespace"#
    )]
    #[case::partition(
        vec![ServiceSplit { weight: 100.0, partition: "other".to_string(), ..Default::default() }],
        r#"servicesplitter.consul.hashicorp.com "foo" is invalid: spec.splits[0].partition: Invalid value: "other": Consul Enterprise partitions must be enabled to set split.partition"#
    )]
    fn rejects_invalid(#[case] splits: Vec<ServiceSplit>, #[case] expected: &str) {
        let err = splitter(splits).validate(&ConsulMeta::default()).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn tiny_weights_render_with_exponent() {
        let err = splitter(vec![weighted(99.0), weighted(0.00001)])
            .validate(&ConsulMeta::default())
            .unwrap_err()
            .to_string();
        assert!(
            err.contains("spec.splits[1].weight: Invalid value: 1e-05: weight must be a percentage between 0.01 and 100"),
            "{err}"
        );
        assert!(err.contains("but adds up to 99.000008"), "{err}");
    }

    #[test]
    fn enterprise_fields_allowed_when_enabled() {
        let meta = ConsulMeta {
            namespaces_enabled: true,
            partitions_enabled: true,
            ..Default::default()
        };
        let ss = splitter(vec![ServiceSplit {
            weight: 100.0,
            namespace: "other".to_string(),
            partition: "other".to_string(),
            ..Default::default()
        }]);
        assert_eq!(ss.validate(&meta), Ok(()));
    }
}
