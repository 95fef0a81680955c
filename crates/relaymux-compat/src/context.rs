/// Mutable side-channel an adapter can use to amend the request's eventual
/// HTTP framing, mirroring `context.metadata.protocolConfig` (spec.md
/// §4.5.4)
#[derive(Debug, Default)]
pub struct AdapterContext {
    /// Additional headers the adapter wants sent with the request
    pub custom_headers: Vec<(String, String)>,
    /// Endpoint override, if the adapter needs to redirect off the
    /// Protocol layer's computed endpoint
    pub endpoint_override: Option<String>,
}
