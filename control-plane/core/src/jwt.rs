use crate::{
    common::{is_default, EntryMeta},
    duration::GoDuration,
};
use serde::{Deserialize, Serialize};

/// A `jwt-provider` entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtProviderConfigEntry {
    pub name: String,
    #[serde(rename = "JSONWebKeySet", skip_serializing_if = "Option::is_none")]
    pub json_web_key_set: Option<JsonWebKeySet>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<JwtLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarding: Option<JwtForwardingConfig>,
    #[serde(skip_serializing_if = "is_default")]
    pub clock_skew_seconds: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_config: Option<JwtCacheConfig>,
    #[serde(flatten)]
    pub entry_meta: EntryMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JsonWebKeySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalJwks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteJwks>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LocalJwks {
    #[serde(rename = "JWKS", skip_serializing_if = "String::is_empty")]
    pub jwks: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RemoteJwks {
    #[serde(rename = "URI", skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(skip_serializing_if = "is_default")]
    pub request_timeout_ms: i32,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub cache_duration: GoDuration,
    #[serde(skip_serializing_if = "is_default")]
    pub fetch_asynchronously: bool,
    #[serde(rename = "UseSNI", skip_serializing_if = "is_default")]
    pub use_sni: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<JwksRetryPolicy>,
    #[serde(rename = "JWKSCluster", skip_serializing_if = "Option::is_none")]
    pub jwks_cluster: Option<JwksCluster>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwksCluster {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub discovery_type: String,
    #[serde(rename = "TLSCertificates", skip_serializing_if = "Option::is_none")]
    pub tls_certificates: Option<JwksTlsCertificate>,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub connect_timeout: GoDuration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwksTlsCertificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate_provider_instance: Option<JwksTlsCertProviderInstance>,
    #[serde(rename = "TrustedCA", skip_serializing_if = "Option::is_none")]
    pub trusted_ca: Option<JwksTlsCertTrustedCa>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwksTlsCertProviderInstance {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate_name: String,
}

/// Exactly one source is expected. `InlineBytes` holds base64 text, the way
/// Consul encodes byte slices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwksTlsCertTrustedCa {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_variable: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub inline_string: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub inline_bytes: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwksRetryPolicy {
    #[serde(skip_serializing_if = "is_default")]
    pub num_retries: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy_back_off: Option<RetryPolicyBackOff>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RetryPolicyBackOff {
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub base_interval: GoDuration,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub max_interval: GoDuration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<JwtLocationHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_param: Option<JwtLocationQueryParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<JwtLocationCookie>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtLocationHeader {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value_prefix: String,
    #[serde(skip_serializing_if = "is_default")]
    pub forward: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtLocationQueryParam {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtLocationCookie {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtForwardingConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub header_name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub pad_forward_payload_header: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtCacheConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub size: i32,
}
