// MCP server: newline-delimited JSON-RPC over stdio

use crate::dispatcher::{Dispatcher, ToolInvocation};
use crate::protocol::{
    negotiate_version, CallToolParams, CallToolResult, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities,
    ServerInfo, ToolsCapability, JSONRPC_VERSION,
};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

/// Longest frame accepted from the client
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Responses waiting for the writer
const OUTBOX_CAPACITY: usize = 64;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_PING: &str = "ping";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

type Outbox = mpsc::Sender<JsonRpcResponse>;

pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            info: ServerInfo::default(),
        }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn start(&self) -> Result<()> {
        info!(
            tools = self.dispatcher.registry().len(),
            "MCP server listening on stdio"
        );
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one client connection.
    ///
    /// Each `tools/call` runs on its own task; all responses go through a
    /// single writer so frames never interleave. Returns once the input is
    /// exhausted and every in-flight call has answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbox, responses) = mpsc::channel(OUTBOX_CAPACITY);
        let writer_task = tokio::spawn(write_responses(writer, responses));

        let mut frames = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        let mut read_error = None;
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(line) => self.handle_frame(&line, &outbox).await,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(limit = MAX_FRAME_BYTES, "Dropping oversized frame");
                    respond(
                        &outbox,
                        JsonRpcResponse::error(
                            Value::Null,
                            JsonRpcError::parse_error("frame exceeds size limit"),
                        ),
                    )
                    .await;
                }
                Err(LinesCodecError::Io(e)) => {
                    read_error = Some(e);
                    break;
                }
            }
        }

        // The writer stops once the last in-flight call drops its sender.
        drop(outbox);
        writer_task.await.context("response writer panicked")??;

        match read_error {
            Some(e) => Err(e).context("reading from client"),
            None => {
                info!("Client closed the connection");
                Ok(())
            }
        }
    }

    async fn handle_frame(&self, line: &str, outbox: &Outbox) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Unparsable frame");
                let response = JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(e.to_string()));
                respond(outbox, response).await;
                return;
            }
        };
        let id_hint = raw.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                let response = JsonRpcResponse::error(id_hint, JsonRpcError::invalid_request(e.to_string()));
                respond(outbox, response).await;
                return;
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            let response = JsonRpcResponse::error(
                id_hint,
                JsonRpcError::invalid_request(format!("unsupported jsonrpc version {:?}", request.jsonrpc)),
            );
            respond(outbox, response).await;
            return;
        }

        if request.is_notification() {
            self.handle_notification(&request);
            return;
        }
        let id = request.id.clone().unwrap_or_default();
        debug!(method = %request.method, "Request");

        match request.method.as_str() {
            METHOD_TOOLS_CALL => self.spawn_call(id, request.params, outbox.clone()).await,
            _ => {
                let response = self.handle_request(id, &request);
                respond(outbox, response).await;
            }
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            METHOD_INITIALIZED => info!("Client initialized"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    fn handle_request(&self, id: Value, request: &JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            METHOD_INITIALIZE => {
                let params: InitializeParams = match request.params.clone() {
                    Some(params) => match serde_json::from_value(params) {
                        Ok(params) => params,
                        Err(e) => {
                            return JsonRpcResponse::error(
                                id,
                                JsonRpcError::invalid_params(format!("initialize: {}", e)),
                            )
                        }
                    },
                    None => InitializeParams::default(),
                };
                let version = negotiate_version(params.protocol_version.as_deref());
                if let Some(client) = &params.client_info {
                    info!(client = %client.name, client_version = %client.version, protocol = version, "Initializing session");
                }
                JsonRpcResponse::success(
                    id,
                    InitializeResult {
                        protocol_version: version.to_string(),
                        capabilities: ServerCapabilities {
                            tools: ToolsCapability {
                                list_changed: false,
                            },
                        },
                        server_info: self.info.clone(),
                    },
                )
            }
            METHOD_PING => JsonRpcResponse::success(id, json!({})),
            METHOD_TOOLS_LIST => JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.dispatcher.registry().list(),
                },
            ),
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        }
    }

    async fn spawn_call(&self, id: Value, params: Option<Value>, outbox: Outbox) {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                let response = JsonRpcResponse::error(id, JsonRpcError::invalid_params(format!("tools/call: {}", e)));
                respond(&outbox, response).await;
                return;
            }
            None => {
                let response = JsonRpcResponse::error(id, JsonRpcError::invalid_params("tools/call: missing params"));
                respond(&outbox, response).await;
                return;
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let result = dispatcher
                .invoke(ToolInvocation::new(params.name, params.arguments))
                .await;
            let call = CallToolResult::json(result.to_json(), !result.success);
            respond(&outbox, JsonRpcResponse::success(id, call)).await;
        });
    }
}

async fn respond(outbox: &Outbox, response: JsonRpcResponse) {
    if outbox.send(response).await.is_err() {
        debug!("Response dropped; writer has stopped");
    }
}

async fn write_responses<W>(writer: W, mut responses: mpsc::Receiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(response) = responses.recv().await {
        let line = match serde_json::to_string(&response) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                continue;
            }
        };
        sink.send(line).await.context("writing response")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchConfig;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use xbridge_core::{
        CredentialBundle, Operation, RateLimitGovernor, Upstream, UpstreamError, UpstreamReply,
    };

    struct Echo;

    #[async_trait]
    impl Upstream for Echo {
        async fn execute(&self, operation: &Operation) -> Result<UpstreamReply, UpstreamError> {
            match operation {
                Operation::PostTweet(tweet) => Ok(UpstreamReply::new(json!({"data": {
                    "id": "100",
                    "text": tweet.text,
                }}))),
                _ => Ok(UpstreamReply::new(json!({"data": {}}))),
            }
        }
    }

    fn server() -> McpServer {
        let credentials = CredentialBundle::from_lookup(|key| Some(format!("{}-value", key)));
        let dispatcher = Dispatcher::new(
            Arc::new(ToolRegistry::with_catalog()),
            Arc::new(RateLimitGovernor::default()),
            Arc::new(Echo),
            Arc::new(credentials),
            DispatchConfig::default(),
        );
        McpServer::new(Arc::new(dispatcher))
    }

    /// Feed `input` lines to a server and collect every response frame.
    async fn session(input: &[&str]) -> Vec<Value> {
        let (client, server_io) = tokio::io::duplex(256 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, mut client_write) = tokio::io::split(client);

        for line in input {
            client_write.write_all(line.as_bytes()).await.unwrap();
            client_write.write_all(b"\n").await.unwrap();
        }
        client_write.shutdown().await.unwrap();

        server().serve(server_read, server_write).await.unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(serde_json::from_str(&line).unwrap());
        }
        out
    }

    fn by_id(responses: &[Value], id: i64) -> &Value {
        responses
            .iter()
            .find(|r| r["id"] == json!(id))
            .unwrap_or_else(|| panic!("no response with id {}", id))
    }

    #[tokio::test]
    async fn test_handshake_and_listing() {
        let responses = session(&[
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"0"}}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":1}}"#,
            r#"{"jsonrpc":"2.0","method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
        ])
        .await;

        assert_eq!(responses.len(), 3);
        let init = by_id(&responses, 1);
        assert_eq!(init["result"]["protocolVersion"], json!("2024-11-05"));
        assert_eq!(init["result"]["serverInfo"]["name"], json!("xbridge-mcp"));

        let tools = by_id(&responses, 2)["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 23);
        assert!(tools.iter().any(|t| t["name"] == json!("post_tweet")));
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == json!("object")));

        assert_eq!(by_id(&responses, 3)["result"], json!({}));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let responses = session(&[
            "this is not json",
            r#"{"jsonrpc":"2.0","id":7,"method":"resources/list"}"#,
            r#"{"jsonrpc":"2.0","id":8}"#,
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call"}"#,
        ])
        .await;

        assert_eq!(responses.len(), 4);
        let parse = responses
            .iter()
            .find(|r| r["id"].is_null())
            .unwrap();
        assert_eq!(parse["error"]["code"], json!(JsonRpcError::PARSE_ERROR));
        assert_eq!(by_id(&responses, 7)["error"]["code"], json!(JsonRpcError::METHOD_NOT_FOUND));
        assert_eq!(by_id(&responses, 8)["error"]["code"], json!(JsonRpcError::INVALID_REQUEST));
        assert_eq!(by_id(&responses, 9)["error"]["code"], json!(JsonRpcError::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_tool_calls() {
        let responses = session(&[
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"post_tweet","arguments":{"text":"Hello"}}}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"launch_rocket","arguments":{}}}"#,
        ])
        .await;

        let ok = &by_id(&responses, 1)["result"];
        assert_eq!(ok["isError"], json!(false));
        assert_eq!(ok["structuredContent"]["success"], json!(true));
        assert_eq!(ok["structuredContent"]["payload"]["text"], json!("Hello"));
        assert_eq!(ok["structuredContent"]["provenance"], json!("upstream"));
        let text: Value =
            serde_json::from_str(ok["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text, ok["structuredContent"]);

        let failed = &by_id(&responses, 2)["result"];
        assert_eq!(failed["isError"], json!(true));
        assert_eq!(
            failed["structuredContent"]["error"]["kind"],
            json!("UnknownTool")
        );
    }
}
