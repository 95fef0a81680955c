//! Shared types for the relaymux request router: data model, per-request
//! context, and the domain error enum every other crate propagates.

pub mod context;
pub mod error;
pub mod model;

pub use context::{
    ProtocolConfig, RequestContext, RequestMetadata, RoutingDecision, LAYER_PROTOCOL,
    LAYER_RETRANSFORM, LAYER_ROUTER, LAYER_SERVER, LAYER_SERVER_COMPATIBILITY, LAYER_TRANSFORMER,
};
pub use error::{ErrorKind, GatewayError, HttpError};
pub use model::{
    now_unix_secs, pipeline_id, ApiKeys, CompatibilityTag, PipelineStatus, Protocol,
    ProviderDescriptor, RequestPriority, RouteEntry, RouteTarget, VirtualModel,
};
