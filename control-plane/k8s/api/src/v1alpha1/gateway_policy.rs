use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";
const GATEWAY_KIND: &str = "Gateway";

/// JWT requirements attached to a gateway, or to one of its listeners.
///
/// Unlike the other kinds in this module, a policy is not written to Consul
/// as a config entry of its own; it is folded into the gateway's listeners.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "GatewayPolicy",
    status = "GatewayPolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayPolicySpec {
    pub target_ref: PolicyTargetReference,
    /// Applied to every route on the listener, replacing route-level
    /// configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#override: Option<GatewayPolicyConfig>,
    /// Applied to routes that carry no configuration of their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<GatewayPolicyConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyTargetReference {
    /// The API group and version of the target, e.g.
    /// `gateway.networking.k8s.io/v1beta1`.
    pub group: String,
    pub kind: String,
    pub name: String,
    /// Defaults to the policy's namespace.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// The listener name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayPolicyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<GatewayJwtRequirement>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayJwtRequirement {
    pub providers: Vec<GatewayJwtProvider>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayJwtProvider {
    /// Names a `JWTProvider` resource.
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verify_claims: Vec<GatewayJwtClaimVerification>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayJwtClaimVerification {
    /// Path to the claim in the token payload.
    pub path: Vec<String>,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayPolicyStatus {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl GatewayPolicy {
    /// The `namespace/name` of the targeted gateway, if the policy targets a
    /// gateway at all.
    pub fn target_gateway(&self) -> Option<String> {
        let target = &self.spec.target_ref;
        let (group, _version) = target.group.split_once('/')?;
        if group != GATEWAY_GROUP || target.kind != GATEWAY_KIND {
            return None;
        }
        let namespace = if target.namespace.is_empty() {
            self.namespace().unwrap_or_else(|| "default".to_string())
        } else {
            target.namespace.clone()
        };
        Some(format!("{namespace}/{}", target.name))
    }

    /// Returns a message describing the first policy in `existing` that
    /// already targets the same gateway listener as this one.
    pub fn listener_conflict<'p>(
        &self,
        existing: impl IntoIterator<Item = &'p GatewayPolicy>,
    ) -> Option<String> {
        let gateway = self.target_gateway()?;
        let listener = self.spec.target_ref.section_name.as_ref()?;
        let name = self.name_any();
        existing
            .into_iter()
            .filter(|other| other.name_any() != name)
            .filter(|other| other.target_gateway().as_ref() == Some(&gateway))
            .find(|other| other.spec.target_ref.section_name.as_ref() == Some(listener))
            .map(|other| {
                format!(
                    "policy targets gateway listener \"{listener}\" that is already the target of an existing policy \"{}\"",
                    other.name_any()
                )
            })
    }
}
