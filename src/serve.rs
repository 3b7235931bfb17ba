use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::service_fn;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::document;
use crate::editor::{EditSession, SaveOutcome};
use crate::graph::{ConnectionParams, Edge, Graph, Node, Point};
use crate::FlowError;

/// Arguments for running the flowpad web editor server
#[derive(Debug, Clone, Parser)]
#[command(name = "flowpad serve", about = "Start the flowpad web editor API server.")]
pub struct ServeArgs {
    /// Path to the flow document backing the editor. Created with the
    /// seed graph when it does not exist yet.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5151)]
    pub port: u16,
}

struct Workspace {
    graph: Graph,
    session: EditSession,
}

struct ServeState {
    source_path: PathBuf,
    workspace: RwLock<Workspace>,
}

impl ServeState {
    /// Writes the current graph back to the backing file. Called with
    /// the workspace write lock held, so saves never interleave.
    async fn persist(&self, graph: &Graph) -> Result<()> {
        let contents = document::to_document(graph).context("failed to serialize graph")?;
        tokio::fs::write(&self.source_path, contents.as_bytes())
            .await
            .with_context(|| format!("failed to write '{}'", self.source_path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphPayload {
    source_path: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    open: bool,
    is_edit_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer: Option<BufferPayload>,
}

#[derive(Debug, Clone, Serialize)]
struct BufferPayload {
    id: String,
    label: String,
    description: String,
}

#[derive(Debug, Clone, Serialize)]
struct CreatedPayload {
    id: String,
}

#[derive(Debug, Clone, Serialize)]
struct SaveResultPayload {
    action: &'static str,
    id: String,
}

#[derive(Debug, Deserialize)]
struct NodeUpsertRequest {
    label: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    source: String,
    target: String,
    #[serde(default)]
    source_handle: Option<String>,
    #[serde(default)]
    target_handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BufferUpdateRequest {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub async fn run_serve(args: ServeArgs, ui_root: Option<PathBuf>) -> Result<()> {
    let graph = if args.input.is_file() {
        let contents = tokio::fs::read_to_string(&args.input)
            .await
            .with_context(|| format!("failed to read '{}'", args.input.display()))?;
        document::from_document(&contents)
            .with_context(|| format!("failed to parse '{}'", args.input.display()))?
    } else {
        Graph::new()
    };

    let state = Arc::new(ServeState {
        source_path: args.input.clone(),
        workspace: RwLock::new(Workspace {
            graph,
            session: EditSession::new(),
        }),
    });

    if !args.input.is_file() {
        let workspace = state.workspace.read().await;
        state.persist(&workspace.graph).await?;
    }

    let mut app = Router::new()
        .route("/api/graph", get(get_graph))
        .route("/api/graph/nodes", post(post_node))
        .route("/api/graph/nodes/:id", put(put_node).delete(delete_node))
        .route("/api/graph/nodes/:id/position", put(put_node_position))
        .route("/api/graph/edges", post(post_edge))
        .route("/api/graph/arrange", post(post_arrange))
        .route("/api/graph/export", get(get_export))
        .route("/api/graph/import", put(put_import))
        .route("/api/session", get(get_session))
        .route("/api/session/new", post(post_session_new))
        .route("/api/session/edit/:id", post(post_session_edit))
        .route("/api/session/buffer", put(put_session_buffer))
        .route("/api/session/save", post(post_session_save))
        .route("/api/session/cancel", post(post_session_cancel))
        .route("/api/session/delete", post(post_session_delete))
        .with_state(state);

    if let Some(root) = ui_root {
        let static_dir = ServeDir::new(root.clone())
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(root.join("index.html")));
        let dir_for_service = static_dir.clone();

        let static_service = service_fn(move |req| {
            let svc = dir_for_service.clone();
            async move {
                match svc.oneshot(req).await {
                    Ok(response) => Ok(response.map(axum::body::Body::new)),
                    Err(error) => {
                        let message = format!("Static file error: {error}");
                        Ok((StatusCode::INTERNAL_SERVER_ERROR, message).into_response())
                    }
                }
            }
        });

        app = app.fallback_service(static_service);
    }

    let app = app.layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("flowpad server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn get_graph(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<GraphPayload>, (StatusCode, String)> {
    let workspace = state.workspace.read().await;
    Ok(Json(GraphPayload {
        source_path: state.source_path.display().to_string(),
        nodes: workspace.graph.nodes().to_vec(),
        edges: workspace.graph.edges().to_vec(),
    }))
}

async fn post_node(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<NodeUpsertRequest>,
) -> Result<Json<CreatedPayload>, (StatusCode, String)> {
    if request.label.trim().is_empty() {
        return Err(empty_label());
    }

    let mut workspace = state.workspace.write().await;
    let id = workspace
        .graph
        .add_node(&request.label, &request.description);
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(Json(CreatedPayload { id }))
}

async fn put_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
    Json(request): Json<NodeUpsertRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if request.label.trim().is_empty() {
        return Err(empty_label());
    }

    let mut workspace = state.workspace.write().await;
    workspace
        .graph
        .update_node(&node_id, &request.label, &request.description)
        .map_err(not_found)?;
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_node_position(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
    Json(position): Json<Point>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    workspace
        .graph
        .move_node(&node_id, position)
        .map_err(not_found)?;
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    if !workspace.graph.delete_node(&node_id) {
        return Err((StatusCode::NOT_FOUND, format!("node '{node_id}' not found")));
    }
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_edge(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<CreatedPayload>, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;

    // The store trusts connect callers, so endpoint existence is
    // checked here at the boundary that received the gesture.
    for endpoint in [&request.source, &request.target] {
        if !workspace.graph.contains(endpoint) {
            return Err((StatusCode::NOT_FOUND, format!("node '{endpoint}' not found")));
        }
    }

    let id = workspace.graph.connect(
        &request.source,
        &request.target,
        ConnectionParams {
            source_handle: request.source_handle,
            target_handle: request.target_handle,
        },
    );
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(Json(CreatedPayload { id }))
}

async fn post_arrange(
    State(state): State<Arc<ServeState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    workspace.graph.auto_arrange();
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_export(
    State(state): State<Arc<ServeState>>,
) -> Result<Response, (StatusCode, String)> {
    let workspace = state.workspace.read().await;
    let contents = document::to_document(&workspace.graph)
        .map_err(|err| internal_error(anyhow::Error::new(err)))?;

    let mut response = Response::new(contents.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"flow.json\""),
    );
    Ok(response)
}

async fn put_import(
    State(state): State<Arc<ServeState>>,
    body: String,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    workspace
        .graph
        .import(&body)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_session(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<SessionPayload>, (StatusCode, String)> {
    let workspace = state.workspace.read().await;
    Ok(Json(session_payload(&workspace.session)))
}

async fn post_session_new(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<SessionPayload>, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    workspace.session.open_new();
    Ok(Json(session_payload(&workspace.session)))
}

async fn post_session_edit(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
) -> Result<Json<SessionPayload>, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    let Workspace { graph, session } = &mut *workspace;
    session.open_existing(graph, &node_id).map_err(not_found)?;
    Ok(Json(session_payload(session)))
}

async fn put_session_buffer(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<BufferUpdateRequest>,
) -> Result<Json<SessionPayload>, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    let Some(buffer) = workspace.session.buffer_mut() else {
        return Err(no_session());
    };
    if let Some(label) = request.label {
        buffer.label = label;
    }
    if let Some(description) = request.description {
        buffer.description = description;
    }
    Ok(Json(session_payload(&workspace.session)))
}

async fn post_session_save(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<SaveResultPayload>, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    let Workspace { graph, session } = &mut *workspace;

    let outcome = match session.save(graph) {
        Ok(outcome) => outcome,
        Err(FlowError::EmptyLabel) => return Err(empty_label()),
        Err(FlowError::SessionClosed) => return Err(no_session()),
        Err(err) => return Err(internal_error(anyhow::Error::new(err))),
    };

    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;

    let (action, id) = match outcome {
        SaveOutcome::Added(id) => ("added", id),
        SaveOutcome::Updated(id) => ("updated", id),
        SaveOutcome::Skipped(id) => ("skipped", id),
    };
    Ok(Json(SaveResultPayload { action, id }))
}

async fn post_session_cancel(
    State(state): State<Arc<ServeState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    workspace.session.cancel();
    Ok(StatusCode::NO_CONTENT)
}

async fn post_session_delete(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<SaveResultPayload>, (StatusCode, String)> {
    let mut workspace = state.workspace.write().await;
    let Workspace { graph, session } = &mut *workspace;

    let id = match session.delete(graph) {
        Ok(id) => id,
        Err(FlowError::SessionClosed) => return Err(no_session()),
        Err(err) => return Err(internal_error(anyhow::Error::new(err))),
    };

    state
        .persist(&workspace.graph)
        .await
        .map_err(internal_error)?;
    Ok(Json(SaveResultPayload {
        action: "deleted",
        id,
    }))
}

fn session_payload(session: &EditSession) -> SessionPayload {
    SessionPayload {
        open: session.is_open(),
        is_edit_mode: session.is_editing(),
        buffer: session.buffer().map(|buffer| BufferPayload {
            id: buffer.id.clone(),
            label: buffer.label.clone(),
            description: buffer.description.clone(),
        }),
    }
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn not_found(err: FlowError) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, err.to_string())
}

fn empty_label() -> (StatusCode, String) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::EmptyLabel.to_string(),
    )
}

fn no_session() -> (StatusCode, String) {
    (StatusCode::CONFLICT, FlowError::SessionClosed.to_string())
}
