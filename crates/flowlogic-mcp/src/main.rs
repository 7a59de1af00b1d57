use flowlogic_core::{Arity, EditError, EditorSession, NewNode, RuleEvaluator};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ImportRuleRequest {
    /// The rule as JSON text, e.g. {"==": [{"var": "temperature"}, 22]}. Replaces the whole canvas.
    rule: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddNodeItem {
    /// Node kind: "operator", "variable", "constant", or "start"
    kind: NewNode,
    /// Operator symbol (operator nodes only). Default: "=="
    operator: Option<String>,
    /// Variable name (variable nodes only). Default: "x"
    name: Option<String>,
    /// Constant text, parsed as JSON when the rule is rebuilt (constant nodes only). Default: "0"
    value: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddNodeRequest {
    /// Array of nodes to add
    nodes: Vec<AddNodeItem>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ConnectItem {
    /// ID of the node whose output is used
    source: String,
    /// ID of the operator node (or "result") that consumes it
    target: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ConnectRequest {
    /// Connections to draw, in order. Each one takes the lowest free argument slot of its target.
    edges: Vec<ConnectItem>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteNodeRequest {
    /// IDs of nodes to delete. Connected edges are removed too. The result node cannot be deleted.
    node_ids: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteEdgeRequest {
    /// IDs of edges to delete
    edge_ids: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetOperatorRequest {
    /// ID of the operator node (e.g. "operator-1")
    node_id: String,
    /// New operator symbol, e.g. "and", "<", "if"
    symbol: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetVariableRequest {
    /// ID of the variable node (e.g. "variable-1")
    node_id: String,
    /// New variable name, e.g. "user.age"
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetConstantRequest {
    /// ID of the constant node (e.g. "constant-1")
    node_id: String,
    /// New constant text. JSON literals like 22, true, "abc" or [1,2]; anything else is kept as a string.
    value: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExportRuleRequest {
    /// File path to write the rule JSON to, e.g. "rule.json"
    path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct EditSourceRequest {
    /// Replacement rule text. Kept as-is until `apply_source`; the canvas does not change.
    text: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct EvaluateRuleRequest {
    /// Data the rule's variables read from, as JSON text, e.g. {"temperature": 22}. Use {} for none.
    data: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetArityRequest {
    /// Operator symbol to look up
    symbol: String,
}

// --- Server ---

#[derive(Clone)]
pub struct FlowLogicServer {
    session: Arc<Mutex<EditorSession>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl FlowLogicServer {
    pub fn new(session: EditorSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            tool_router: Self::tool_router(),
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, EditorSession>, McpError> {
        self.session
            .lock()
            .map_err(|_| McpError::internal_error("editor session lock poisoned", None))
    }

    #[tool(
        description = "Replace the canvas with the graph of a JsonLogic rule. Nothing changes if the text is not valid JSON."
    )]
    fn import_rule(
        &self,
        Parameters(req): Parameters<ImportRuleRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        match session.import_text(&req.rule) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Imported rule: {} node(s), {} edge(s)",
                session.graph().nodes.len(),
                session.graph().edges.len()
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "Get the JsonLogic rule currently expressed by the canvas ({} when nothing is wired into the result node)")]
    fn get_rule(&self) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        Ok(CallToolResult::success(vec![Content::text(
            session.source_text().to_string(),
        )]))
    }

    #[tool(
        description = "Get the canvas as JSON: {nodes: [{id, type, position, data}], edges: [{id, source, target, data: {argIndex}}]}. Node types are operator (data.operatorSymbol), variable (data.name), constant (data.rawText), start and result."
    )]
    fn get_graph(&self) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        let json = serde_json::to_string_pretty(session.graph())
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Add one or more nodes to the canvas. Returns the new node IDs in order.")]
    fn add_nodes(
        &self,
        Parameters(req): Parameters<AddNodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        match add_nodes(&mut session, req.nodes) {
            Ok(ids) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Added {} node(s): {}",
                ids.len(),
                ids.join(", ")
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Connect node outputs to operator inputs or to the result node. Refused connections add nothing and are listed with the reason."
    )]
    fn connect(
        &self,
        Parameters(req): Parameters<ConnectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        let report = connect_all(&mut session, &req.edges);
        Ok(CallToolResult::success(vec![Content::text(report)]))
    }

    #[tool(description = "Delete nodes and their connected edges. The result node is never deleted.")]
    fn delete_nodes(
        &self,
        Parameters(req): Parameters<DeleteNodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        let removed = session.delete_nodes(&req.node_ids);
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Deleted {} node(s)",
            removed
        ))]))
    }

    #[tool(description = "Delete one or more edges from the canvas")]
    fn delete_edges(
        &self,
        Parameters(req): Parameters<DeleteEdgeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        let removed = session.delete_edges(&req.edge_ids);
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Deleted {} edge(s)",
            removed
        ))]))
    }

    #[tool(
        description = "Change an operator node's symbol. If the new symbol takes fewer inputs, the inputs in the highest slots are disconnected."
    )]
    fn set_operator(
        &self,
        Parameters(req): Parameters<SetOperatorRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        match session.set_operator(&req.node_id, &req.symbol) {
            Ok(pruned) if pruned.is_empty() => Ok(CallToolResult::success(vec![Content::text(
                format!("Set '{}' to '{}'", req.node_id, req.symbol),
            )])),
            Ok(pruned) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Set '{}' to '{}'; disconnected {}",
                req.node_id,
                req.symbol,
                pruned.join(", ")
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "Rename a variable node")]
    fn set_variable(
        &self,
        Parameters(req): Parameters<SetVariableRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        match session.set_variable_name(&req.node_id, &req.name) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Renamed '{}' to '{}'",
                req.node_id, req.name
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "Change a constant node's text")]
    fn set_constant(
        &self,
        Parameters(req): Parameters<SetConstantRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        match session.set_constant_text(&req.node_id, &req.value) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Set '{}' to {}",
                req.node_id, req.value
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Write the rule text to a file. This is the text `get_rule` shows, including unapplied `edit_source` edits."
    )]
    fn export_rule(
        &self,
        Parameters(req): Parameters<ExportRuleRequest>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        match export_source(&session, Path::new(&req.path)) {
            Ok(()) if session.source_is_valid() => Ok(CallToolResult::success(vec![
                Content::text(format!("Wrote {}", req.path)),
            ])),
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Wrote {} (the text is not valid JSON)",
                req.path
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to write '{}': {}",
                req.path, e
            ))])),
        }
    }

    #[tool(
        description = "Replace the rule text without touching the canvas. Call `apply_source` to rebuild the canvas from it."
    )]
    fn edit_source(
        &self,
        Parameters(req): Parameters<EditSourceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        session.set_source_text(req.text);
        let status = if session.source_is_valid() {
            "Rule text updated"
        } else {
            "Rule text updated; it is not valid JSON yet"
        };
        Ok(CallToolResult::success(vec![Content::text(status)]))
    }

    #[tool(description = "Rebuild the canvas from the current rule text. Nothing changes if the text is not valid JSON.")]
    fn apply_source(&self) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        match session.import_source() {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Applied rule text: {} node(s), {} edge(s)",
                session.graph().nodes.len(),
                session.graph().edges.len()
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Run the rule built on the canvas against a data object and return the result as JSON"
    )]
    fn evaluate_rule(
        &self,
        Parameters(req): Parameters<EvaluateRuleRequest>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        match evaluate(&session, &req.data) {
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(value.to_string())])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }

    #[tool(description = "Get how many inputs an operator symbol accepts")]
    fn get_arity(
        &self,
        Parameters(req): Parameters<GetArityRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(format!(
            "'{}' accepts {} input(s)",
            req.symbol,
            Arity::of(&req.symbol)
        ))]))
    }

    #[tool(description = "Get the wiring rules that govern how rule graphs are built")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            flowlogic_core::rules::RULES,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for FlowLogicServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Wiring Rules\n{}",
            INSTRUCTIONS,
            flowlogic_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

/// Add nodes and apply their initial attributes. Stops at the first failed edit.
fn add_nodes(session: &mut EditorSession, items: Vec<AddNodeItem>) -> Result<Vec<String>, EditError> {
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id = session.add_node(item.kind);
        match item.kind {
            NewNode::Operator => {
                if let Some(op) = item.operator {
                    session.set_operator(&id, &op)?;
                }
            }
            NewNode::Variable => {
                if let Some(name) = item.name {
                    session.set_variable_name(&id, &name)?;
                }
            }
            NewNode::Constant => {
                if let Some(value) = item.value {
                    session.set_constant_text(&id, &value)?;
                }
            }
            NewNode::Start => {}
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Draw each connection in turn and describe what happened, one line per request.
fn connect_all(session: &mut EditorSession, items: &[ConnectItem]) -> String {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        match session.try_connect(&item.source, &item.target) {
            Ok(edge_id) => {
                let slot = session
                    .graph()
                    .edge(&edge_id)
                    .and_then(|e| e.arg_index())
                    .map(|i| format!(" (argument {})", i))
                    .unwrap_or_default();
                lines.push(format!("Added {}{}", edge_id, slot));
            }
            Err(reason) => {
                tracing::debug!(source = %item.source, target = %item.target, %reason, "connection refused");
                lines.push(format!(
                    "No edge added from '{}' to '{}': {}",
                    item.source, item.target, reason
                ));
            }
        }
    }
    lines.join("\n")
}

/// The JsonLogic engine from the `jsonlogic-rs` crate.
struct JsonLogic;

impl RuleEvaluator for JsonLogic {
    // `jsonlogic_rs::Error` lives in a private module and cannot be named;
    // keep its Display text.
    type Error = String;

    fn evaluate(&self, rule: &Value, data: &Value) -> Result<Value, Self::Error> {
        jsonlogic_rs::apply(rule, data).map_err(|e| e.to_string())
    }
}

/// Parse `data` and run the session's rule against it.
fn evaluate(session: &EditorSession, data: &str) -> Result<Value, String> {
    let data: Value =
        serde_json::from_str(data).map_err(|e| format!("Invalid data JSON: {}", e))?;
    session
        .evaluate_with(&JsonLogic, &data)
        .map_err(|e| format!("Evaluation failed: {}", e))
}

fn export_source(session: &EditorSession, path: &Path) -> std::io::Result<()> {
    write_atomic(path, session.source_text())
}

/// Write via a temp file + rename so readers never see a half-written rule.
fn write_atomic(path: &Path, data: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&dir)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "rule.json".to_string());
    let tmp = dir.join(format!(".{}.tmp", name));
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, dir.join(name))
}

const INSTRUCTIONS: &str = r#"This server edits one JsonLogic rule as a graph of nodes.

## Workflow
1. `import_rule` to start from existing JSON, or build from scratch with `add_nodes`.
2. Wire arguments into operators with `connect`, in argument order. Wire the root of the rule into the node with ID "result".
3. Read the rule back with `get_rule` after every change. It is rebuilt from the graph after each canvas edit.
4. Use `get_graph` to see node and edge IDs before deleting or editing.
5. `evaluate_rule` runs the rule against sample data.
6. `export_rule` writes the rule to a file when done.

To edit the JSON directly, send it with `edit_source`, then `apply_source` to rebuild the canvas.

Refused connections are normal; the reply says why. Check `get_arity` before wiring an operator."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if std::env::args().nth(1).as_deref() == Some("init") {
        return init_project();
    }

    let settings = flowlogic_core::read_settings();
    let session = EditorSession::new(settings);
    tracing::info!(
        pretty_print = session.settings().pretty_print,
        "starting flowlogic MCP server"
    );

    let service = FlowLogicServer::new(session)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

/// Register flowlogic-mcp with the agent clients found on PATH, writing
/// project-scoped config into the current directory.
fn init_project() -> Result<(), Box<dyn std::error::Error>> {
    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();
    let cwd = std::env::current_dir()?;

    let mut configured = Vec::new();
    if on_path("claude") {
        write_mcp_json(&cwd, &binary_path)?;
        configured.push("Claude Code");
    }
    if on_path("codex") {
        write_codex_toml(&cwd, &binary_path)?;
        configured.push("Codex");
    }

    if configured.is_empty() {
        tracing::error!("neither `claude` nor `codex` found in PATH; install one and re-run `flowlogic-mcp init`");
        std::process::exit(1);
    }
    tracing::info!("{} will use flowlogic in this project", configured.join(" and "));
    Ok(())
}

fn on_path(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
            })
        })
        .unwrap_or(false)
}

/// Contents of a config file, or `None` when it does not exist yet.
/// Any other read failure is an error so an unreadable file is never replaced.
fn read_config(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Merge a `flowlogic` entry into .mcp.json, keeping every other server.
fn write_mcp_json(cwd: &Path, binary_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = cwd.join(".mcp.json");
    let mut root = match read_config(&path)? {
        Some(contents) => match serde_json::from_str::<Value>(&contents) {
            Ok(root) if root.is_object() => root,
            Ok(_) => return Err(format!("{} is not a JSON object", path.display()).into()),
            Err(e) => return Err(format!("{} is not valid JSON: {}", path.display(), e).into()),
        },
        None => serde_json::json!({}),
    };
    if !root.get("mcpServers").is_some_and(Value::is_object) {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"]["flowlogic"] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
    });
    std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
    tracing::info!(path = %path.display(), "registered flowlogic server");
    Ok(())
}

/// Set `[mcp_servers.flowlogic]` in .codex/config.toml, preserving the rest of the file.
fn write_codex_toml(cwd: &Path, binary_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = cwd.join(".codex");
    let path = dir.join("config.toml");
    let mut doc = match read_config(&path)? {
        Some(contents) => contents
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| format!("{} is not valid TOML: {}", path.display(), e))?,
        None => toml_edit::DocumentMut::new(),
    };

    let servers = doc
        .entry("mcp_servers")
        .or_insert_with(toml_edit::table)
        .as_table_mut()
        .ok_or_else(|| format!("`mcp_servers` in {} is not a table", path.display()))?;
    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    servers.insert("flowlogic", toml_edit::Item::Table(server));

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, doc.to_string())?;
    tracing::info!(path = %path.display(), "registered flowlogic server");
    Ok(())
}
