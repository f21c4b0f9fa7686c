//! Remote MCP transport over streamable HTTP
//!
//! Backed by rmcp's streamable HTTP client. rmcp performs the MCP
//! `initialize` exchange as part of bringing the service up, so `start`
//! covers "open the stream and exchange hellos" and `initialize` checks that
//! what the server negotiated is something this client can work with.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, ClientInfo, Implementation, ProtocolVersion, RawContent},
    service::RunningService,
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig,
        StreamableHttpClientTransport,
    },
    Peer, RoleClient, ServiceError, ServiceExt,
};
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use super::error::TransportError;
use super::transport::{McpTransport, TransportFactory};
use super::types::{ClientIdentity, McpTool, ServerSummary, ToolOutput};

/// Protocol versions this client knows how to speak
fn supported_protocol_versions() -> [ProtocolVersion; 3] {
    [
        ProtocolVersion::V_2024_11_05,
        ProtocolVersion::V_2025_03_26,
        ProtocolVersion::LATEST,
    ]
}

fn protocol_label(version: &ProtocolVersion) -> String {
    serde_json::to_value(version)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", version))
}

/// Map an rmcp service error onto the transport taxonomy
fn map_service_error(err: ServiceError) -> TransportError {
    match err {
        ServiceError::McpError(data) => TransportError::Remote(data.message.to_string()),
        other => TransportError::Connection(other.to_string()),
    }
}

/// Parse and check an endpoint URL
pub fn parse_endpoint(endpoint: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

/// One streamable HTTP connection to a remote MCP server
pub struct RemoteTransport {
    endpoint: Url,
    identity: ClientIdentity,
    api_key: Option<String>,
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

impl RemoteTransport {
    pub fn new(endpoint: Url, identity: ClientIdentity) -> Self {
        Self {
            endpoint,
            identity,
            api_key: None,
            service: Mutex::new(None),
        }
    }

    /// Authenticate every request with `key` as a bearer token
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    fn transport_config(&self) -> StreamableHttpClientTransportConfig {
        let config = StreamableHttpClientTransportConfig::with_uri(self.endpoint.as_str());
        match &self.api_key {
            Some(key) => config.auth_header(key.clone()),
            None => config,
        }
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            client_info: Implementation {
                name: self.identity.name.clone(),
                version: self.identity.version.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn peer(&self) -> Result<Peer<RoleClient>, TransportError> {
        self.service
            .lock()
            .await
            .as_ref()
            .map(|service| service.peer().clone())
            .ok_or(TransportError::NotStarted)
    }
}

#[async_trait]
impl McpTransport for RemoteTransport {
    async fn start(&self) -> Result<(), TransportError> {
        tracing::debug!("Opening MCP stream to {}", self.endpoint);

        let transport = StreamableHttpClientTransport::from_config(self.transport_config());
        let service = self
            .client_info()
            .serve(transport)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        *self.service.lock().await = Some(service);
        Ok(())
    }

    async fn initialize(&self, identity: &ClientIdentity) -> Result<ServerSummary, TransportError> {
        let peer = self.peer().await?;
        let info = peer
            .peer_info()
            .ok_or_else(|| TransportError::Protocol("server sent no initialize result".into()))?;

        if !supported_protocol_versions().contains(&info.protocol_version) {
            return Err(TransportError::Protocol(format!(
                "unsupported protocol version {}",
                protocol_label(&info.protocol_version)
            )));
        }
        if info.capabilities.tools.is_none() {
            return Err(TransportError::Protocol(
                "server does not expose tools".into(),
            ));
        }

        let summary = ServerSummary {
            name: info.server_info.name.clone(),
            version: info.server_info.version.clone(),
            protocol_version: protocol_label(&info.protocol_version),
        };
        tracing::info!(
            "Session initialized as {}/{} with {} {} (protocol {})",
            identity.name,
            identity.version,
            summary.name,
            summary.version,
            summary.protocol_version
        );
        Ok(summary)
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, TransportError> {
        let peer = self.peer().await?;
        let tools = peer.list_all_tools().await.map_err(map_service_error)?;

        Ok(tools
            .into_iter()
            .map(|t| McpTool {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()),
                input_schema: serde_json::to_value(&t.input_schema).ok(),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, TransportError> {
        let peer = self.peer().await?;
        let args = arguments.and_then(|v| v.as_object().cloned());

        let result = peer
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args,
                task: None,
            })
            .await
            .map_err(map_service_error)?;

        let mut text = String::new();
        for content in &result.content {
            if !text.is_empty() {
                text.push('\n');
            }
            match &content.raw {
                RawContent::Text(t) => text.push_str(&t.text),
                _ => text.push_str(&format!("{:?}", content)),
            }
        }

        Ok(ToolOutput {
            text,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        let service = self.service.lock().await.take();
        if let Some(service) = service {
            service
                .cancel()
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Builds [`RemoteTransport`] handles
#[derive(Clone, Default)]
pub struct RemoteTransportFactory {
    identity: ClientIdentity,
    api_key: Option<String>,
}

impl RemoteTransportFactory {
    pub fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    fn build(&self, endpoint: &str) -> Result<RemoteTransport, TransportError> {
        let url = parse_endpoint(endpoint)?;
        Ok(RemoteTransport::new(url, self.identity.clone()).with_api_key(self.api_key.clone()))
    }
}

// Keeps the key out of logs
impl std::fmt::Debug for RemoteTransportFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTransportFactory")
            .field("identity", &self.identity)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl TransportFactory for RemoteTransportFactory {
    fn create(&self, endpoint: &str) -> Result<Arc<dyn McpTransport>, TransportError> {
        Ok(Arc::new(self.build(endpoint)?))
    }
}
