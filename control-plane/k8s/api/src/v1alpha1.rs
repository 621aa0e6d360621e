pub mod control_plane_request_limit;
pub mod exported_services;
pub mod gateway_policy;
pub mod ingress_gateway;
pub mod jwt_provider;
pub mod mesh;
pub mod proxy_defaults;
pub mod sameness_group;
pub mod service_defaults;
pub mod service_intentions;
pub mod service_resolver;
pub mod service_router;
pub mod service_splitter;
pub mod terminating_gateway;

pub use self::{
    control_plane_request_limit::{ControlPlaneRequestLimit, ControlPlaneRequestLimitSpec},
    exported_services::{ExportedServices, ExportedServicesSpec},
    gateway_policy::{GatewayPolicy, GatewayPolicySpec},
    ingress_gateway::{IngressGateway, IngressGatewaySpec},
    jwt_provider::{JWTProvider, JwtProviderSpec},
    mesh::{Mesh, MeshSpec},
    proxy_defaults::{ProxyDefaults, ProxyDefaultsSpec},
    sameness_group::{SamenessGroup, SamenessGroupSpec},
    service_defaults::{ServiceDefaults, ServiceDefaultsSpec},
    service_intentions::{ServiceIntentions, ServiceIntentionsSpec},
    service_resolver::{ServiceResolver, ServiceResolverSpec},
    service_router::{ServiceRouter, ServiceRouterSpec},
    service_splitter::{ServiceSplitter, ServiceSplitterSpec},
    terminating_gateway::{TerminatingGateway, TerminatingGatewaySpec},
};
