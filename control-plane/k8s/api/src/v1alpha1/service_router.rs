use crate::{
    field::{self, Error, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{invalid_path_prefix, is_default, HttpHeaderModifiers},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta, namespace::normalize_empty_to_default, router as consul, ConfigEntry,
    GoDuration, SERVICE_ROUTER,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Routes layer 7 traffic to services by request attributes.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ServiceRouter",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRouterSpec {
    /// Evaluated in order; the first matching route wins.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<ServiceRoute>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRoute {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub r#match: Option<ServiceRouteMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<ServiceRouteDestination>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRouteMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<ServiceRouteHttpMatch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRouteHttpMatch {
    #[serde(skip_serializing_if = "is_default")]
    pub case_insensitive: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_exact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_regex: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<HttpHeaderMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query_param: Vec<QueryParamMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

/// Matches a request header. At most one of `present`, `exact`, `prefix`,
/// `suffix` and `regex` may be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpHeaderMatch {
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub present: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub regex: String,
    #[serde(skip_serializing_if = "is_default")]
    pub invert: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParamMatch {
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub present: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub regex: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRouteDestination {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Replaces the matched path prefix or exact path.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix_rewrite: String,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub idle_timeout: GoDuration,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub request_timeout: GoDuration,
    #[serde(skip_serializing_if = "is_default")]
    pub num_retries: u32,
    #[serde(skip_serializing_if = "is_default")]
    pub retry_on_connect_failure: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retry_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retry_on_status_codes: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HttpHeaderModifiers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HttpHeaderModifiers>,
}

impl ConfigEntryResource for ServiceRouter {
    const KUBE_KIND: &'static str = "servicerouter";
    const CONSUL_KIND: &'static str = SERVICE_ROUTER;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::ServiceRouter(consul::ServiceRouterConfigEntry {
            name: self.consul_name(),
            routes: self.spec.routes.iter().map(ServiceRoute::to_consul).collect(),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ServiceRouter(sr) = entry else {
                return;
            };
            for dest in sr.routes.iter_mut().filter_map(|r| r.destination.as_mut()) {
                normalize_empty_to_default(&mut dest.namespace);
                normalize_empty_to_default(&mut dest.partition);
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let routes = Path::new("spec").child("routes");
        let mut errs = ErrorList::new();
        for (i, route) in self.spec.routes.iter().enumerate() {
            errs.extend(route.validate(&routes.index(i)));
        }

        let destinations = self
            .spec
            .routes
            .iter()
            .enumerate()
            .filter_map(|(i, r)| Some((routes.index(i).child("destination"), r.destination.as_ref()?)));
        if !meta.namespaces_enabled {
            for (path, dest) in destinations.clone().filter(|(_, d)| !d.namespace.is_empty()) {
                errs.push(field::invalid(
                    &path.child("namespace"),
                    &dest.namespace,
                    "Consul Enterprise namespaces must be enabled to set destination.namespace",
                ));
            }
        }
        if !meta.partitions_enabled {
            for (path, dest) in destinations.filter(|(_, d)| !d.partition.is_empty()) {
                errs.push(field::invalid(
                    &path.child("partition"),
                    &dest.partition,
                    "Consul Enterprise partitions must be enabled to set destination.partition",
                ));
            }
        }

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }

    fn default_namespace_fields(&mut self, meta: &ConsulMeta) {
        if !meta.namespaces_enabled {
            return;
        }
        let namespace = meta.consul_namespace(&self.namespace().unwrap_or_default());
        for dest in self.spec.routes.iter_mut().filter_map(|r| r.destination.as_mut()) {
            if dest.namespace.is_empty() {
                dest.namespace = namespace.clone();
            }
        }
    }
}

impl ServiceRoute {
    fn to_consul(&self) -> consul::ServiceRoute {
        consul::ServiceRoute {
            r#match: self.r#match.as_ref().map(|m| consul::ServiceRouteMatch {
                http: m.http.as_ref().map(ServiceRouteHttpMatch::to_consul),
            }),
            destination: self
                .destination
                .as_ref()
                .map(ServiceRouteDestination::to_consul),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        let http = self.r#match.as_ref().and_then(|m| m.http.as_ref());
        let rewrites = self
            .destination
            .as_ref()
            .is_some_and(|d| !d.prefix_rewrite.is_empty());
        let has_prefix = http.is_some_and(|h| !h.path_prefix.is_empty() || !h.path_exact.is_empty());
        if rewrites && !has_prefix {
            errs.push(field::invalid(
                path,
                Value::json_string(self),
                "destination.prefixRewrite requires that either match.http.pathPrefix or match.http.pathExact be configured on this route",
            ));
        }
        if let Some(http) = http {
            errs.extend(http.validate(&path.child("match").child("http")));
        }
        errs
    }
}

impl ServiceRouteHttpMatch {
    fn to_consul(&self) -> consul::ServiceRouteHttpMatch {
        consul::ServiceRouteHttpMatch {
            case_insensitive: self.case_insensitive,
            path_exact: self.path_exact.clone(),
            path_prefix: self.path_prefix.clone(),
            path_regex: self.path_regex.clone(),
            header: self.header.iter().map(HttpHeaderMatch::to_consul).collect(),
            query_param: self
                .query_param
                .iter()
                .map(|q| consul::QueryParamMatch {
                    name: q.name.clone(),
                    present: q.present,
                    exact: q.exact.clone(),
                    regex: q.regex.clone(),
                })
                .collect(),
            methods: self.methods.clone(),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        if count_set(&[&self.path_exact, &self.path_prefix, &self.path_regex], &[]) > 1 {
            errs.push(field::invalid(
                path,
                Value::json_string(self),
                "at most only one of pathExact, pathPrefix, or pathRegex may be configured",
            ));
        }
        if invalid_path_prefix(&self.path_exact) {
            errs.push(field::invalid(
                &path.child("pathExact"),
                &self.path_exact,
                "must begin with a '/'",
            ));
        }
        if invalid_path_prefix(&self.path_prefix) {
            errs.push(field::invalid(
                &path.child("pathPrefix"),
                &self.path_prefix,
                "must begin with a '/'",
            ));
        }
        for (i, h) in self.header.iter().enumerate() {
            errs.extend(h.validate(
                &path.child("header").index(i),
                "at most only one of exact, prefix, suffix, regex, or present may be configured",
            ));
        }
        for (i, q) in self.query_param.iter().enumerate() {
            if count_set(&[&q.exact, &q.regex], &[q.present]) > 1 {
                errs.push(field::invalid(
                    &path.child("queryParam").index(i),
                    Value::json_string(q),
                    "at most only one of exact, regex, or present may be configured",
                ));
            }
        }
        errs
    }
}

impl HttpHeaderMatch {
    pub(crate) fn to_consul(&self) -> consul::HttpHeaderMatch {
        consul::HttpHeaderMatch {
            name: self.name.clone(),
            present: self.present,
            exact: self.exact.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            regex: self.regex.clone(),
            invert: self.invert,
        }
    }

    /// Rejects matchers that set more than one match type.
    pub(crate) fn validate(&self, path: &Path, detail: &str) -> Option<Error> {
        let set = count_set(
            &[&self.exact, &self.prefix, &self.suffix, &self.regex],
            &[self.present],
        );
        (set > 1).then(|| field::invalid(path, Value::json_string(self), detail))
    }
}

impl ServiceRouteDestination {
    fn to_consul(&self) -> consul::ServiceRouteDestination {
        consul::ServiceRouteDestination {
            service: self.service.clone(),
            service_subset: self.service_subset.clone(),
            namespace: self.namespace.clone(),
            partition: self.partition.clone(),
            prefix_rewrite: self.prefix_rewrite.clone(),
            idle_timeout: self.idle_timeout,
            request_timeout: self.request_timeout,
            num_retries: self.num_retries,
            retry_on_connect_failure: self.retry_on_connect_failure,
            retry_on: self.retry_on.clone(),
            retry_on_status_codes: self.retry_on_status_codes.clone(),
            request_headers: self.request_headers.as_ref().map(HttpHeaderModifiers::to_consul),
            response_headers: self
                .response_headers
                .as_ref()
                .map(HttpHeaderModifiers::to_consul),
        }
    }
}

/// Counts the non-empty strings and true flags.
pub(crate) fn count_set(strings: &[&String], flags: &[bool]) -> usize {
    strings.iter().filter(|s| !s.is_empty()).count() + flags.iter().filter(|f| **f).count()
}
