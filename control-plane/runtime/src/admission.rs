use crate::k8s::{
    v1alpha1::{
        ControlPlaneRequestLimit, ExportedServices, GatewayPolicy, IngressGateway, JWTProvider,
        Mesh, ProxyDefaults, SamenessGroup, ServiceDefaults, ServiceIntentions, ServiceResolver,
        ServiceRouter, ServiceSplitter, TerminatingGateway,
    },
    ConfigEntryResource, ConsulMeta,
};
use anyhow::{anyhow, bail, ensure, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::{
    api::{Api, ListParams},
    core::{admission::Operation, DynamicObject},
    Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

const GLOBAL_PROXY_DEFAULTS: &str = "global";
const MESH: &str = "mesh";

#[derive(Clone)]
pub struct Admission<L = kube::Client> {
    consul: Arc<ConsulMeta>,
    lister: L,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lists the resources of a kind across all namespaces.
#[async_trait::async_trait]
pub trait Lister: Clone + Send + Sync + 'static {
    async fn list<K>(&self) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static;
}

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

/// Checks a kind needs in addition to its own `validate`, typically ones
/// that look at other resources in the cluster.
#[async_trait::async_trait]
trait Validate<T> {
    async fn validate(&self, op: &Operation, obj: &T, old: Option<&T>) -> Result<()>;
}

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Lister ===

#[async_trait::async_trait]
impl Lister for kube::Client {
    async fn list<K>(&self) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let list = Api::<K>::all(self.clone())
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }
}

// === impl AdmissionService ===

impl<L: Lister> tower::Service<Request<hyper::body::Incoming>> for Admission<L> {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: Review = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(client: kube::Client, consul: Arc<ConsulMeta>) -> Self {
        Self::with_lister(client, consul)
    }
}

impl<L: Lister> Admission<L> {
    pub fn with_lister(lister: L, consul: Arc<ConsulMeta>) -> Self {
        Self { consul, lister }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        if is_kind::<ServiceDefaults>(&req) {
            return self.admit_config_entry::<ServiceDefaults>(req).await;
        }

        if is_kind::<ServiceResolver>(&req) {
            return self.admit_config_entry::<ServiceResolver>(req).await;
        }

        if is_kind::<ServiceRouter>(&req) {
            return self.admit_config_entry::<ServiceRouter>(req).await;
        }

        if is_kind::<ServiceSplitter>(&req) {
            return self.admit_config_entry::<ServiceSplitter>(req).await;
        }

        if is_kind::<ServiceIntentions>(&req) {
            return self.admit_config_entry::<ServiceIntentions>(req).await;
        }

        if is_kind::<ProxyDefaults>(&req) {
            return self.admit_config_entry::<ProxyDefaults>(req).await;
        }

        if is_kind::<Mesh>(&req) {
            return self.admit_config_entry::<Mesh>(req).await;
        }

        if is_kind::<IngressGateway>(&req) {
            return self.admit_config_entry::<IngressGateway>(req).await;
        }

        if is_kind::<TerminatingGateway>(&req) {
            return self.admit_config_entry::<TerminatingGateway>(req).await;
        }

        if is_kind::<ExportedServices>(&req) {
            return self.admit_config_entry::<ExportedServices>(req).await;
        }

        if is_kind::<SamenessGroup>(&req) {
            return self.admit_config_entry::<SamenessGroup>(req).await;
        }

        if is_kind::<JWTProvider>(&req) {
            return self.admit_config_entry::<JWTProvider>(req).await;
        }

        if is_kind::<ControlPlaneRequestLimit>(&req) {
            return self.admit_config_entry::<ControlPlaneRequestLimit>(req).await;
        }

        if is_kind::<GatewayPolicy>(&req) {
            return self.admit_gateway_policy(req).await;
        }

        AdmissionResponse::invalid(format_args!(
            "unsupported resource type: {}.{}.{}",
            req.kind.group, req.kind.version, req.kind.kind
        ))
    }

    async fn admit_config_entry<K>(self, req: AdmissionRequest) -> AdmissionResponse
    where
        K: ConfigEntryResource,
        Self: Validate<K>,
    {
        let rsp = AdmissionResponse::from(&req);

        let kind = req.kind.kind.clone();
        let (obj, old) = match parse_objects::<K>(&req) {
            Ok(objs) => objs,
            Err(error) => {
                warn!(%error, "Failed to parse {}", kind);
                return rsp.deny(error);
            }
        };

        let ns = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        let patch = match self.check_config_entry(&req.operation, obj, old).await {
            Ok(patch) => patch,
            Err(error) => {
                info!(%error, %ns, %name, %kind, "Denied");
                return rsp.deny(error);
            }
        };

        if patch.0.is_empty() {
            return rsp;
        }
        match rsp.with_patch(patch) {
            Ok(rsp) => rsp,
            Err(error) => {
                warn!(%error, %ns, %name, %kind, "Failed to encode patch");
                AdmissionResponse::from(&req).deny(error)
            }
        }
    }

    /// Runs the admission checks for a config entry, returning the patch
    /// that fills in its defaulted namespace fields.
    async fn check_config_entry<K>(
        &self,
        op: &Operation,
        obj: K,
        old: Option<K>,
    ) -> Result<json_patch::Patch>
    where
        K: ConfigEntryResource,
        Self: Validate<K>,
    {
        let patch = default_patch(&obj, &self.consul)?;
        self.validate(op, &obj, old.as_ref()).await?;
        obj.validate(&self.consul)?;
        Ok(patch)
    }

    async fn admit_gateway_policy(self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        let policy = match parse_objects::<GatewayPolicy>(&req) {
            Ok((policy, _)) => policy,
            Err(error) => {
                warn!(%error, "Failed to parse GatewayPolicy");
                return rsp.deny(error);
            }
        };

        if let Err(error) = self.check_gateway_policy(&policy).await {
            let ns = policy.namespace().unwrap_or_default();
            let name = policy.name_any();
            info!(%error, %ns, %name, kind = "GatewayPolicy", "Denied");
            return rsp.deny(error);
        }

        rsp
    }

    async fn check_gateway_policy(&self, policy: &GatewayPolicy) -> Result<()> {
        let existing = self.lister.list::<GatewayPolicy>().await?;
        if let Some(conflict) = policy.listener_conflict(&existing) {
            bail!(conflict);
        }
        Ok(())
    }

    /// Rejects a new resource whose name is already used in another
    /// namespace, unless each namespace maps to its own Consul namespace.
    async fn ensure_unique_name<K>(&self, op: &Operation, obj: &K) -> Result<()>
    where
        K: ConfigEntryResource,
    {
        if !matches!(op, Operation::Create) || (self.consul.namespaces_enabled && self.consul.mirroring)
        {
            return Ok(());
        }

        let name = obj.kubernetes_name();
        let existing = self.lister.list::<K>().await?;
        ensure!(
            existing.iter().all(|e| e.kubernetes_name() != name),
            "{kind} resource with name \"{name}\" is already defined – all {kind} resources must have unique names across namespaces",
            kind = K::KUBE_KIND,
        );
        Ok(())
    }

    /// Rejects creating a second resource of a kind that Consul only
    /// supports once per partition.
    async fn ensure_singleton<K>(&self, op: &Operation, kind: &str, entry: &str) -> Result<()>
    where
        K: ConfigEntryResource,
    {
        if !matches!(op, Operation::Create) {
            return Ok(());
        }
        ensure!(
            self.lister.list::<K>().await?.is_empty(),
            "{kind} resource already defined - only one {entry} entry is supported",
        );
        Ok(())
    }
}

macro_rules! unique_names {
    ($($kind:ty),+ $(,)?) => {
        $(
            #[async_trait::async_trait]
            impl<L: Lister> Validate<$kind> for Admission<L> {
                async fn validate(&self, op: &Operation, obj: &$kind, _: Option<&$kind>) -> Result<()> {
                    self.ensure_unique_name(op, obj).await
                }
            }
        )+
    };
}

unique_names!(
    ServiceDefaults,
    ServiceResolver,
    ServiceRouter,
    ServiceSplitter,
    IngressGateway,
    TerminatingGateway,
    SamenessGroup,
    JWTProvider,
    ControlPlaneRequestLimit,
);

#[async_trait::async_trait]
impl<L: Lister> Validate<ProxyDefaults> for Admission<L> {
    async fn validate(&self, op: &Operation, obj: &ProxyDefaults, _: Option<&ProxyDefaults>) -> Result<()> {
        self.ensure_singleton::<ProxyDefaults>(op, "ProxyDefaults", GLOBAL_PROXY_DEFAULTS)
            .await?;
        ensure!(
            obj.kubernetes_name() == GLOBAL_PROXY_DEFAULTS,
            "ProxyDefaults resource name must be \"{GLOBAL_PROXY_DEFAULTS}\"",
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl<L: Lister> Validate<Mesh> for Admission<L> {
    async fn validate(&self, op: &Operation, obj: &Mesh, _: Option<&Mesh>) -> Result<()> {
        self.ensure_singleton::<Mesh>(op, "Mesh", MESH).await?;
        ensure!(
            obj.kubernetes_name() == MESH,
            "Mesh resource name must be \"{MESH}\"",
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl<L: Lister> Validate<ExportedServices> for Admission<L> {
    async fn validate(
        &self,
        op: &Operation,
        _: &ExportedServices,
        _: Option<&ExportedServices>,
    ) -> Result<()> {
        self.ensure_singleton::<ExportedServices>(op, "ExportedServices", "ExportedServices")
            .await
    }
}

#[async_trait::async_trait]
impl<L: Lister> Validate<ServiceIntentions> for Admission<L> {
    async fn validate(
        &self,
        op: &Operation,
        obj: &ServiceIntentions,
        old: Option<&ServiceIntentions>,
    ) -> Result<()> {
        let dest = &obj.spec.destination;
        match op {
            Operation::Create => {
                let mirroring = self.consul.namespaces_enabled && self.consul.mirroring;
                let existing = self.lister.list::<ServiceIntentions>().await?;
                let conflict = existing.iter().any(|e| {
                    let other = &e.spec.destination;
                    other.name == dest.name && (!mirroring || other.namespace == dest.namespace)
                });
                if conflict {
                    if mirroring {
                        bail!(
                            "an existing ServiceIntentions resource has `spec.destination.name: {}` and `spec.destination.namespace: {}`",
                            dest.name,
                            dest.namespace,
                        );
                    }
                    bail!(
                        "an existing ServiceIntentions resource has `spec.destination.name: {}`",
                        dest.name,
                    );
                }
            }
            Operation::Update => {
                let old = old.ok_or_else(|| anyhow!("admission request missing 'oldObject'"))?;
                ensure!(
                    old.spec.destination.name == dest.name
                        && old.spec.destination.namespace == dest.namespace,
                    "spec.destination.name and spec.destination.namespace are immutable fields for ServiceIntentions",
                );
            }
            _ => {}
        }
        Ok(())
    }
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

/// Decodes the request's object and, on updates, the object it replaces.
fn parse_objects<K: DeserializeOwned>(req: &AdmissionRequest) -> Result<(K, Option<K>)> {
    let obj = req
        .object
        .as_ref()
        .ok_or_else(|| anyhow!("admission request missing 'object'"))?;
    let obj = serde_json::from_value(serde_json::to_value(obj)?)?;
    let old = req
        .old_object
        .as_ref()
        .map(|old| serde_json::to_value(old).and_then(serde_json::from_value))
        .transpose()?;
    Ok((obj, old))
}

/// The JSON patch from `obj` to `obj` with its namespace fields defaulted.
fn default_patch<K: ConfigEntryResource>(obj: &K, consul: &ConsulMeta) -> Result<json_patch::Patch> {
    let mut defaulted = obj.clone();
    defaulted.default_namespace_fields(consul);
    Ok(json_patch::diff(
        &serde_json::to_value(obj)?,
        &serde_json::to_value(&defaulted)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::v1alpha1::{
        gateway_policy::PolicyTargetReference,
        service_intentions::{IntentionDestination, SourceIntention},
        service_router::{ServiceRoute, ServiceRouteDestination},
        ExportedServicesSpec, GatewayPolicySpec, MeshSpec, ProxyDefaultsSpec,
        ServiceDefaultsSpec, ServiceIntentionsSpec, ServiceRouterSpec,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Serves a fixed set of objects, filtered by kind.
    #[derive(Clone, Default)]
    struct Fixed(Arc<Vec<serde_json::Value>>);

    #[async_trait::async_trait]
    impl Lister for Fixed {
        async fn list<K>(&self) -> Result<Vec<K>>
        where
            K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
        {
            let kind = K::kind(&());
            self.0
                .iter()
                .filter(|obj| obj["kind"] == *kind)
                .map(|obj| serde_json::from_value(obj.clone()).map_err(Into::into))
                .collect()
        }
    }

    fn admission(existing: Vec<serde_json::Value>, consul: ConsulMeta) -> Admission<Fixed> {
        Admission::with_lister(Fixed(Arc::new(existing)), Arc::new(consul))
    }

    fn with_ns<K: Resource>(mut obj: K, ns: &str) -> K {
        obj.meta_mut().namespace = Some(ns.to_string());
        obj
    }

    fn to_json<K: serde::Serialize>(obj: &K) -> serde_json::Value {
        serde_json::to_value(obj).unwrap()
    }

    fn service_defaults(name: &str, ns: &str) -> ServiceDefaults {
        with_ns(
            ServiceDefaults::new(
                name,
                ServiceDefaultsSpec {
                    protocol: "http".to_string(),
                    ..Default::default()
                },
            ),
            ns,
        )
    }

    fn intentions(name: &str, dest_name: &str, dest_ns: &str) -> ServiceIntentions {
        with_ns(
            ServiceIntentions::new(
                name,
                ServiceIntentionsSpec {
                    destination: IntentionDestination {
                        name: dest_name.to_string(),
                        namespace: dest_ns.to_string(),
                    },
                    sources: vec![SourceIntention {
                        name: "bar".to_string(),
                        action: "allow".to_string(),
                        ..Default::default()
                    }],
                },
            ),
            "default",
        )
    }

    fn review(op: &str, obj: serde_json::Value, old: Option<serde_json::Value>) -> AdmissionRequest {
        let kind = obj["kind"].clone();
        let review: Review = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "b9c3a3a1-7d4f-4f6e-9f6b-1e7a0c2d3e4f",
                "kind": { "group": "consul.hashicorp.com", "version": "v1alpha1", "kind": kind },
                "resource": { "group": "consul.hashicorp.com", "version": "v1alpha1", "resource": "unused" },
                "name": obj["metadata"]["name"],
                "namespace": obj["metadata"]["namespace"],
                "operation": op,
                "userInfo": {},
                "object": obj,
                "oldObject": old,
                "dryRun": false,
            },
        }))
        .unwrap();
        review.try_into().unwrap()
    }

    #[tokio::test]
    async fn allows_unique_names() {
        let admission = admission(vec![], ConsulMeta::default());
        let obj = service_defaults("foo", "other");
        let patch = admission
            .check_config_entry(&Operation::Create, obj, None)
            .await
            .unwrap();
        assert!(patch.0.is_empty());
    }

    #[tokio::test]
    async fn denies_duplicate_names() {
        let existing = vec![to_json(&service_defaults("foo", "default"))];
        for consul in [
            ConsulMeta::default(),
            ConsulMeta {
                namespaces_enabled: true,
                ..Default::default()
            },
        ] {
            let err = admission(existing.clone(), consul)
                .check_config_entry(&Operation::Create, service_defaults("foo", "other"), None)
                .await
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "servicedefaults resource with name \"foo\" is already defined – all servicedefaults resources must have unique names across namespaces"
            );
        }
    }

    #[tokio::test]
    async fn allows_duplicate_names_with_mirroring() {
        let existing = vec![to_json(&service_defaults("foo", "default"))];
        let consul = ConsulMeta {
            namespaces_enabled: true,
            mirroring: true,
            ..Default::default()
        };
        let res = admission(existing, consul)
            .check_config_entry(&Operation::Create, service_defaults("foo", "other"), None)
            .await;
        assert!(res.is_ok(), "{res:?}");
    }

    #[tokio::test]
    async fn allows_updates_to_existing_names() {
        let existing = vec![to_json(&service_defaults("foo", "default"))];
        let res = admission(existing, ConsulMeta::default())
            .check_config_entry(&Operation::Update, service_defaults("foo", "default"), None)
            .await;
        assert!(res.is_ok(), "{res:?}");
    }

    #[tokio::test]
    async fn denies_invalid_resources() {
        let mut obj = service_defaults("foo", "default");
        obj.spec.protocol = "invalid".to_string();
        let err = admission(vec![], ConsulMeta::default())
            .check_config_entry(&Operation::Create, obj, None)
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("servicedefaults.consul.hashicorp.com \"foo\" is invalid: spec.protocol"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn patches_defaulted_namespaces() {
        let consul = ConsulMeta {
            namespaces_enabled: true,
            mirroring: true,
            prefix: "k8s-".to_string(),
            ..Default::default()
        };
        let router = with_ns(
            ServiceRouter::new(
                "web",
                ServiceRouterSpec {
                    routes: vec![ServiceRoute {
                        destination: Some(ServiceRouteDestination {
                            service: "api".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                },
            ),
            "bar",
        );
        let patch = admission(vec![], consul)
            .check_config_entry(&Operation::Create, router, None)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{ "op": "add", "path": "/spec/routes/0/destination/namespace", "value": "k8s-bar" }])
        );
    }

    #[tokio::test]
    async fn proxy_defaults_is_global() {
        let global = ProxyDefaults::new("global", ProxyDefaultsSpec::default());
        let existing = vec![to_json(&global)];

        let err = admission(existing.clone(), ConsulMeta::default())
            .check_config_entry(&Operation::Create, global.clone(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ProxyDefaults resource already defined - only one global entry is supported"
        );

        let res = admission(existing, ConsulMeta::default())
            .check_config_entry(&Operation::Update, global, None)
            .await;
        assert!(res.is_ok(), "{res:?}");

        let err = admission(vec![], ConsulMeta::default())
            .check_config_entry(
                &Operation::Create,
                ProxyDefaults::new("other", ProxyDefaultsSpec::default()),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ProxyDefaults resource name must be \"global\"");
    }

    #[tokio::test]
    async fn mesh_is_a_singleton() {
        let mesh = Mesh::new("mesh", MeshSpec::default());
        let err = admission(vec![to_json(&mesh)], ConsulMeta::default())
            .check_config_entry(&Operation::Create, mesh, None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Mesh resource already defined - only one mesh entry is supported"
        );

        let err = admission(vec![], ConsulMeta::default())
            .check_config_entry(&Operation::Create, Mesh::new("other", MeshSpec::default()), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Mesh resource name must be \"mesh\"");
    }

    #[tokio::test]
    async fn exported_services_is_a_singleton() {
        let exported = ExportedServices::new("default", ExportedServicesSpec::default());
        let err = admission(vec![to_json(&exported)], ConsulMeta::default())
            .check_config_entry(&Operation::Create, exported, None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ExportedServices resource already defined - only one ExportedServices entry is supported"
        );
    }

    #[tokio::test]
    async fn intentions_unique_destination() {
        let existing = vec![to_json(&intentions("foo-intention", "foo", "bar"))];

        let err = admission(existing.clone(), ConsulMeta::default())
            .check_config_entry(&Operation::Create, intentions("bar-intention", "foo", "baz"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "an existing ServiceIntentions resource has `spec.destination.name: foo`"
        );

        let mirroring = ConsulMeta {
            namespaces_enabled: true,
            mirroring: true,
            ..Default::default()
        };
        let res = admission(existing.clone(), mirroring.clone())
            .check_config_entry(&Operation::Create, intentions("bar-intention", "foo", "baz"), None)
            .await;
        assert!(res.is_ok(), "{res:?}");

        let err = admission(existing, mirroring)
            .check_config_entry(&Operation::Create, intentions("bar-intention", "foo", "bar"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "an existing ServiceIntentions resource has `spec.destination.name: foo` and `spec.destination.namespace: bar`"
        );
    }

    #[tokio::test]
    async fn intentions_destination_is_immutable() {
        let old = intentions("foo-intention", "foo", "");
        let admission = admission(vec![to_json(&old)], ConsulMeta::default());

        let res = admission
            .check_config_entry(&Operation::Update, old.clone(), Some(old.clone()))
            .await;
        assert!(res.is_ok(), "{res:?}");

        let err = admission
            .check_config_entry(
                &Operation::Update,
                intentions("foo-intention", "other", ""),
                Some(old),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "spec.destination.name and spec.destination.namespace are immutable fields for ServiceIntentions"
        );
    }

    #[tokio::test]
    async fn gateway_policy_listener_conflict() {
        let policy = |name: &str, listener: &str| {
            with_ns(
                GatewayPolicy::new(
                    name,
                    GatewayPolicySpec {
                        target_ref: PolicyTargetReference {
                            group: "gateway.networking.k8s.io/v1beta1".to_string(),
                            kind: "Gateway".to_string(),
                            name: "my-gateway".to_string(),
                            section_name: Some(listener.to_string()),
                            ..Default::default()
                        },
                        ..Default::default()
                    },
                ),
                "default",
            )
        };
        let admission = admission(vec![to_json(&policy("my-policy", "l1"))], ConsulMeta::default());

        assert!(admission.check_gateway_policy(&policy("my-policy-2", "l2")).await.is_ok());

        let err = admission
            .check_gateway_policy(&policy("my-policy-2", "l1"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "policy targets gateway listener \"l1\" that is already the target of an existing policy \"my-policy\""
        );
    }

    #[tokio::test]
    async fn admits_reviews() {
        let admission = admission(vec![], ConsulMeta::default());

        let obj = to_json(&service_defaults("foo", "default"));
        let rsp = admission.clone().admit(review("CREATE", obj, None)).await;
        assert!(rsp.allowed);

        let mut invalid = service_defaults("foo", "default");
        invalid.spec.protocol = "invalid".to_string();
        let rsp = admission.clone().admit(review("CREATE", to_json(&invalid), None)).await;
        assert!(!rsp.allowed);
        assert!(
            rsp.result.message.contains("spec.protocol: Invalid value: \"invalid\""),
            "{}",
            rsp.result.message
        );

        let overflowing = json!({
            "apiVersion": "consul.hashicorp.com/v1alpha1",
            "kind": "ServiceResolver",
            "metadata": { "name": "foo", "namespace": "default" },
            "spec": { "connectTimeout": "99999999999999999999h" },
        });
        let rsp = admission.clone().admit(review("CREATE", overflowing, None)).await;
        assert!(!rsp.allowed);
        assert!(
            rsp.result.message.contains("duration out of range"),
            "{}",
            rsp.result.message
        );

        let unknown = json!({
            "apiVersion": "consul.hashicorp.com/v1alpha1",
            "kind": "Unknown",
            "metadata": { "name": "foo", "namespace": "default" },
        });
        let rsp = admission.admit(review("CREATE", unknown, None)).await;
        assert!(!rsp.allowed);
        assert_eq!(
            rsp.result.message,
            "unsupported resource type: consul.hashicorp.com.v1alpha1.Unknown"
        );
    }
}
