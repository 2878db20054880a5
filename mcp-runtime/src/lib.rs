//! MCP runtime for the ORKL threat intelligence catalog.
//!
//! Speaks JSON-RPC 2.0 over stdio and exposes six fixed fetch tools against
//! the upstream REST API. Every successful fetch is reconciled into a
//! process-wide read-through cache, which in turn backs the `threat://`
//! resource surface: listing and reading resources never touches the
//! network.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use clap::Subcommand;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::io::{self, BufReader};

use orkl_core::cache::CacheStore;
use orkl_core::entity::{self, EntityKind};
use orkl_core::resource::ResourceAddress;

mod util;

use util::{client, parse_response_body, read_framed_json, to_pretty_json, write_framed_json};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "orkl-mcp";

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the ORKL MCP server over stdio
    Serve,
}

pub async fn run(api_url: &str, command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve => {
            let server = McpServer::new(McpRuntimeConfig {
                api_url: api_url.to_string(),
            });
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
struct McpRuntimeConfig {
    api_url: String,
}

/// Dispatch failures surfaced to the MCP caller as `isError` tool results.
///
/// Non-success upstream statuses are deliberately absent here: those are
/// recovered into a normal text result carrying the status code and body, so
/// the caller can inspect them and decide whether to retry. The variants
/// below are either caller errors (wrong name, missing argument) or
/// transport failures that never produced a status at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("failed to reach ORKL API at {api_url}: {message}")]
    Connection { api_url: String, message: String },
}

impl ToolError {
    fn code(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::MissingArgument(_) => "missing_argument",
            ToolError::Connection { .. } => "connection_error",
        }
    }

    fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let ToolError::MissingArgument(field) = self {
            payload["field"] = Value::String((*field).to_string());
        }
        payload
    }
}

/// Outcome of one upstream catalog request: HTTP status, the body parsed as
/// JSON, and the raw body text used when rendering a non-success status back
/// to the caller.
#[derive(Debug, Clone)]
struct UpstreamResponse {
    status: u16,
    body: Value,
    raw: String,
}

impl UpstreamResponse {
    fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Single-request view of the upstream catalog API.
///
/// Dispatch performs exactly one `get` per tool invocation; substituting
/// this trait is how tests observe call counts without a live catalog.
#[async_trait]
trait Upstream: Send + Sync {
    async fn get(&self, path: &str) -> Result<UpstreamResponse, ToolError>;
}

/// Live adapter for the ORKL REST API.
#[derive(Clone, Debug)]
struct OrklApi {
    base_url: String,
}

impl OrklApi {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Upstream for OrklApi {
    async fn get(&self, path: &str) -> Result<UpstreamResponse, ToolError> {
        // One client per invocation, dropped on every exit path. No retries,
        // no backoff, no timeout beyond the client defaults.
        let http = client();
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = http.get(&url).send().await.map_err(|e| ToolError::Connection {
            api_url: self.base_url.clone(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| ToolError::Connection {
            api_url: self.base_url.clone(),
            message: format!("failed to read response body: {e}"),
        })?;
        Ok(UpstreamResponse {
            status,
            body: parse_response_body(&bytes),
            raw: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// The six catalog operations exposed as MCP tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolOp {
    LatestThreatReports,
    ThreatReportDetails,
    ThreatActors,
    ThreatActorDetails,
    Sources,
    SourceDetails,
}

/// Table entry for one tool: wire name, description, the entity kind it
/// populates, and the shape of its upstream request.
struct ToolSpec {
    name: &'static str,
    description: &'static str,
    kind: EntityKind,
    request: RequestShape,
}

/// The two request shapes in the table: fixed-endpoint list fetches and
/// detail fetches templated over one required identifier argument.
enum RequestShape {
    List {
        endpoint: &'static str,
    },
    Detail {
        id_argument: &'static str,
        endpoint_prefix: &'static str,
    },
}

impl ToolOp {
    const ALL: [ToolOp; 6] = [
        ToolOp::LatestThreatReports,
        ToolOp::ThreatReportDetails,
        ToolOp::ThreatActors,
        ToolOp::ThreatActorDetails,
        ToolOp::Sources,
        ToolOp::SourceDetails,
    ];

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.spec().name == name)
    }

    fn spec(self) -> ToolSpec {
        match self {
            ToolOp::LatestThreatReports => ToolSpec {
                name: "fetch_latest_threat_reports",
                description: "Fetch the latest threat reports from ORKL.",
                kind: EntityKind::Report,
                request: RequestShape::List {
                    endpoint: "/library/entries?limit=5&order_by=created_at&order=desc",
                },
            },
            ToolOp::ThreatReportDetails => ToolSpec {
                name: "fetch_threat_report_details",
                description: "Fetch detailed information for a specific threat report by ID.",
                kind: EntityKind::Report,
                request: RequestShape::Detail {
                    id_argument: "report_id",
                    endpoint_prefix: "/library/entry",
                },
            },
            ToolOp::ThreatActors => ToolSpec {
                name: "fetch_threat_actors",
                description: "Fetch the list of threat actors.",
                kind: EntityKind::Actor,
                request: RequestShape::List {
                    endpoint: "/ta/entries",
                },
            },
            ToolOp::ThreatActorDetails => ToolSpec {
                name: "fetch_threat_actor_details",
                description: "Fetch detailed information for a specific threat actor by ID.",
                kind: EntityKind::Actor,
                request: RequestShape::Detail {
                    id_argument: "actor_id",
                    endpoint_prefix: "/ta/entry",
                },
            },
            ToolOp::Sources => ToolSpec {
                name: "fetch_sources",
                description: "Fetch the list of sources.",
                kind: EntityKind::Source,
                request: RequestShape::List {
                    endpoint: "/source/entries",
                },
            },
            ToolOp::SourceDetails => ToolSpec {
                name: "fetch_source_details",
                description: "Fetch detailed information for a specific source by ID.",
                kind: EntityKind::Source,
                request: RequestShape::Detail {
                    id_argument: "source_id",
                    endpoint_prefix: "/source/entry",
                },
            },
        }
    }
}

impl ToolSpec {
    fn input_schema(&self) -> Value {
        match self.request {
            RequestShape::List { .. } => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            RequestShape::Detail { id_argument, .. } => {
                let mut properties = Map::new();
                properties.insert(
                    id_argument.to_string(),
                    json!({
                        "type": "string",
                        "description": format!("The ID of the {} to fetch.", kind_noun(self.kind)),
                    }),
                );
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": [id_argument]
                })
            }
        }
    }
}

fn kind_noun(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Report => "threat report",
        EntityKind::Actor => "threat actor",
        EntityKind::Source => "source",
    }
}

/// MCP server for the ORKL catalog: the fixed tool table, one read-through
/// cache per server instance, and the `threat://` resource surface over that
/// cache.
struct McpServer {
    config: McpRuntimeConfig,
    cache: Arc<Mutex<CacheStore>>,
    upstream: Arc<dyn Upstream>,
}

impl McpServer {
    fn new(config: McpRuntimeConfig) -> Self {
        let upstream = Arc::new(OrklApi::new(config.api_url.clone()));
        Self::with_upstream(config, upstream)
    }

    fn with_upstream(config: McpRuntimeConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            config,
            cache: Arc::new(Mutex::new(CacheStore::new())),
            upstream,
        }
    }

    // The lock is only ever held across synchronous cache access, never
    // across an await point.
    fn lock_cache(&self) -> MutexGuard<'_, CacheStore> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn serve_stdio(&self) -> Result<(), String> {
        self.emit_startup_status();

        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut stdout = io::stdout();

        loop {
            let incoming = read_framed_json(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some(incoming) = incoming else {
                break;
            };

            let responses = self.handle_incoming_message(incoming).await;
            for response in responses {
                write_framed_json(&mut stdout, &response)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        Ok(())
    }

    // stdout carries protocol frames, so status goes to stderr as one
    // structured JSON event.
    fn emit_startup_status(&self) {
        let payload = json!({
            "event": "mcp_server_start",
            "server": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "api_url": self.config.api_url,
            "started_at": chrono::Utc::now(),
        });
        eprintln!("{}", to_pretty_json(&payload));
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Most likely a client response; this server issues no outbound
            // requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            self.handle_notification(method).await;
            None
        }
    }

    async fn handle_notification(&self, method: &str) {
        if matches!(
            method,
            "notifications/initialized" | "notifications/cancelled"
        ) {
            return;
        }
        // Unknown notifications are intentionally ignored.
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(self.resources_list_payload()),
            "resources/read" => self.handle_resources_read(&params),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "listChanged": false
                },
                "prompts": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Start with fetch_latest_threat_reports, fetch_threat_actors, or fetch_sources to populate the catalog cache; cached records are then readable as threat:// resources, and the *_details tools fetch full records by ID."
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = ToolOp::ALL
            .into_iter()
            .map(|op| {
                let spec = op.spec();
                json!({
                    "name": spec.name,
                    "description": spec.description,
                    "inputSchema": spec.input_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        Ok(match self.execute_tool(name, &args).await {
            Ok(blocks) => json!({
                "content": blocks
                    .iter()
                    .map(|text| json!({ "type": "text", "text": text }))
                    .collect::<Vec<_>>(),
            }),
            Err(err) => json!({
                "isError": true,
                "content": [{ "type": "text", "text": to_pretty_json(&err.to_value()) }],
            }),
        })
    }

    /// Dispatch one tool invocation: resolve the table entry, validate the
    /// required argument before any network attempt, then perform the single
    /// upstream call for the entry's shape.
    async fn execute_tool(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<Vec<String>, ToolError> {
        let Some(op) = ToolOp::from_name(name) else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };
        let spec = op.spec();
        match spec.request {
            RequestShape::List { endpoint } => self.run_list_op(spec.kind, endpoint).await,
            RequestShape::Detail {
                id_argument,
                endpoint_prefix,
            } => {
                let id = required_string(args, id_argument)?;
                self.run_detail_op(spec.kind, endpoint_prefix, &id).await
            }
        }
    }

    async fn run_list_op(
        &self,
        kind: EntityKind,
        endpoint: &str,
    ) -> Result<Vec<String>, ToolError> {
        let response = self.upstream.get(endpoint).await?;
        if !response.is_success() {
            return Ok(vec![upstream_error_text(&response)]);
        }

        // An absent `data` field is an empty catalog page, not a fault.
        let records = response
            .body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut lines = Vec::with_capacity(records.len());
        let mut cache = self.lock_cache();
        for record in records {
            // Records without a string id cannot be cached or addressed.
            let Some(id) = record.get("id").and_then(Value::as_str).map(str::to_owned) else {
                continue;
            };
            lines.push(entity::summary_line(kind, &id, &record));
            cache.put(kind, id, record);
        }
        Ok(vec![lines.join("\n")])
    }

    async fn run_detail_op(
        &self,
        kind: EntityKind,
        endpoint_prefix: &str,
        id: &str,
    ) -> Result<Vec<String>, ToolError> {
        let response = self.upstream.get(&format!("{endpoint_prefix}/{id}")).await?;
        if !response.is_success() {
            return Ok(vec![upstream_error_text(&response)]);
        }

        // Cached under the id the caller supplied, not whatever the record
        // claims, so the resource address matches the request.
        let record = response
            .body
            .get("data")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let rendered = to_pretty_json(&record);
        self.lock_cache().put(kind, id, record);
        Ok(vec![rendered])
    }

    fn resources_list_payload(&self) -> Value {
        let cache = self.lock_cache();
        let mut resources = Vec::new();
        for kind in EntityKind::ALL {
            for (id, record) in cache.list(kind) {
                resources.push(json!({
                    "uri": ResourceAddress::new(kind, id).to_string(),
                    "name": entity::resource_name(kind, record),
                    "description": entity::resource_description(kind, record),
                    "mimeType": "application/json",
                }));
            }
        }
        json!({ "resources": resources })
    }

    fn handle_resources_read(&self, params: &Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("resources/read params must be an object"))?;
        let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RpcError::invalid_params("resources/read requires string field 'uri'")
        })?;

        let address = ResourceAddress::parse(uri)
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;

        // A cache miss reads as an empty document; only undecodable
        // addresses fail.
        let text = {
            let cache = self.lock_cache();
            match cache.get(address.kind, &address.id) {
                Some(record) => to_pretty_json(record),
                None => to_pretty_json(&json!({})),
            }
        };

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": text,
            }]
        }))
    }
}

fn required_string(args: &Map<String, Value>, key: &'static str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(v)) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(ToolError::MissingArgument(key)),
    }
}

fn upstream_error_text(response: &UpstreamResponse) -> String {
    format!("Error: {} {}", response.status, response.raw)
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}
