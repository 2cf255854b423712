//! In-process MCP tool bridge.
//!
//! Hosts an MCP server and client inside one process, connected by an
//! in-memory duplex byte channel. The server registers the park search
//! capability; the client performs the standard discovery handshake and
//! invokes tools over JSON-RPC frames, exactly as it would against a remote
//! deployment. Keeping the real protocol in the loop means the assistant
//! consumes tools the same way any external MCP client would.
//!
//! The channel pair mirrors a socket: `tokio::io::duplex` yields two
//! endpoints whose internal buffers cross, and each endpoint is split into a
//! read half and a write half. The server reads what the client writes and
//! vice versa. Request/response correlation is rmcp's JSON-RPC id matching,
//! so overlapping invocations cannot cross-deliver results.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rmcp::model::*;
use rmcp::service::{Peer, RunningService};
use rmcp::{ErrorData as McpError, RoleClient, RoleServer, ServerHandler, ServiceExt};

use crate::search_tool::SearchTool;

/// Name the search capability is advertised under.
pub const SEARCH_TOOL_NAME: &str = "search_parks";

const SEARCH_TOOL_DESCRIPTION: &str = "Search national park information by natural language \
     query. Returns relevant park details including name, code, state, and content.";

/// Buffer size of each direction of the in-memory channel.
const CHANNEL_CAPACITY: usize = 64 * 1024;

// ============ Server handler ============

/// MCP server side of the bridge. Each session shares the same
/// [`SearchTool`] behind an `Arc`.
#[derive(Clone)]
pub struct ParkToolServer {
    search: Arc<SearchTool>,
}

impl ParkToolServer {
    pub fn new(search: Arc<SearchTool>) -> Self {
        Self { search }
    }

    /// Descriptor for the single registered tool: one required string
    /// parameter, `query`.
    pub(crate) fn search_descriptor() -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query about national parks"
                }
            },
            "required": ["query"]
        });
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match schema {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Borrowed(SEARCH_TOOL_NAME),
            title: None,
            description: Some(Cow::Borrowed(SEARCH_TOOL_DESCRIPTION)),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for ParkToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "park-knowledge".to_string(),
                title: Some("Park Knowledge".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Park knowledge retrieval. Use the search_parks tool to find information \
                 about US national parks by natural language query."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(vec![
            Self::search_descriptor(),
        ])))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        (name == SEARCH_TOOL_NAME).then(Self::search_descriptor)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if request.name != SEARCH_TOOL_NAME {
            return Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            ));
        }

        let query = request
            .arguments
            .as_ref()
            .and_then(|args| args.get("query"))
            .and_then(|q| q.as_str())
            .unwrap_or("");

        if query.trim().is_empty() {
            return Err(McpError::new(
                ErrorCode::INVALID_PARAMS,
                "query must not be empty".to_string(),
                None,
            ));
        }

        match self.search.search(query).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

// ============ Bridge lifecycle ============

/// Both running service ends plus the descriptor cache.
struct BridgeInner {
    server: RunningService<RoleServer, ParkToolServer>,
    client: RunningService<RoleClient, ()>,
    peer: Peer<RoleClient>,
    tools: Vec<Tool>,
}

/// The started bridge. Created once at startup, shut down once at exit;
/// tool invocations in between run concurrently without shared locks held
/// across await points.
pub struct ToolBridge {
    inner: Mutex<Option<BridgeInner>>,
}

impl ToolBridge {
    /// Start the server, connect the client, and run the discovery
    /// handshake. The discovered descriptor set is cached for the lifetime
    /// of the bridge.
    pub async fn start(search: Arc<SearchTool>) -> Result<Self> {
        let (server_end, client_end) = tokio::io::duplex(CHANNEL_CAPACITY);
        let (server_read, server_write) = tokio::io::split(server_end);
        let (client_read, client_write) = tokio::io::split(client_end);

        // The server's message loop runs in the background for the process
        // lifetime, serving every invocation from every request.
        let server = ParkToolServer::new(search)
            .serve((server_read, server_write))
            .await
            .context("failed to start in-process MCP server")?;

        let client = ()
            .serve((client_read, client_write))
            .await
            .context("failed to connect in-process MCP client")?;

        let tools = client
            .list_tools(None)
            .await
            .context("MCP tool discovery failed")?
            .tools;

        println!(
            "Tool bridge started with {} tool(s): {}",
            tools.len(),
            tools
                .iter()
                .map(|t| t.name.as_ref())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let peer = client.peer().clone();

        Ok(Self {
            inner: Mutex::new(Some(BridgeInner {
                server,
                client,
                peer,
                tools,
            })),
        })
    }

    /// Snapshot of the discovered tool descriptors. Empty after shutdown.
    pub fn tools(&self) -> Vec<Tool> {
        self.inner
            .lock()
            .unwrap()
            .as_ref()
            .map(|inner| inner.tools.clone())
            .unwrap_or_default()
    }

    /// Invoke a discovered tool by name and return its text result.
    ///
    /// The request travels through the client end, across the channel, and
    /// through the server's message loop; the response frame is correlated
    /// back to this call by rmcp.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let peer = {
            let guard = self.inner.lock().unwrap();
            let inner = guard
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("tool bridge is shut down"))?;
            inner.peer.clone()
        };

        let result = peer
            .call_tool(CallToolRequestParams {
                name: name.to_string().into(),
                arguments: Some(arguments),
                meta: None,
                task: None,
            })
            .await
            .with_context(|| format!("tool call '{}' failed", name))?;

        let text: String = result
            .content
            .iter()
            .filter_map(|block| block.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("");

        if result.is_error.unwrap_or(false) {
            anyhow::bail!("tool '{}' returned an error: {}", name, text);
        }

        Ok(text)
    }

    /// Stop both ends and clear the descriptor cache.
    ///
    /// Order matters: disposing the client first closes its channel ends,
    /// which the server's loop observes as end-of-stream; the server is then
    /// cancelled and awaited, with a cancellation outcome treated as the
    /// expected way down. Safe to call more than once.
    pub async fn shutdown(&self) {
        let inner = self.inner.lock().unwrap().take();

        if let Some(inner) = inner {
            let BridgeInner { server, client, .. } = inner;
            let _ = client.cancel().await;
            let _ = server.cancel().await;
        }
    }
}
