use axum::{
    body::Body,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, get_service, MethodRouter},
    Router,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::ControlSession;

pub fn create_router(session: Arc<ControlSession>) -> Router {
    // Installer sets are fetched from /pub/<file>; nesting strips the prefix.
    // Uploads are accepted on every path, /pub included.
    let sets: MethodRouter = get_service(ServeDir::new(&session.artifact_dir))
        .post(upload_result)
        .with_state(session.clone());

    Router::new()
        .route("/", get(fallback).post(upload_result))
        .route("/disklabel", get(disklabel).post(upload_result))
        .route("/install.conf", get(install_conf).post(upload_result))
        .nest_service("/pub", sets)
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(session)
}

async fn disklabel(State(session): State<Arc<ControlSession>>) -> String {
    session.disklabel.clone()
}

async fn install_conf(State(session): State<Arc<ControlSession>>) -> String {
    session.install_script.clone()
}

async fn upload_result(State(session): State<Arc<ControlSession>>, body: Body) -> Response {
    match store_body(&session.result_file, body).await {
        Ok(bytes) => {
            info!(bytes, path = %session.result_file.display(), "Stored guest upload");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!(error = %e, path = %session.result_file.display(), "Failed to store guest upload");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error writing request body").into_response()
        }
    }
}

async fn fallback(
    State(session): State<Arc<ControlSession>>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Response {
    if method == Method::POST {
        return upload_result(State(session), body).await;
    }
    warn!(%method, path = uri.path(), "Unexpected request from guest");
    StatusCode::NOT_FOUND.into_response()
}

/// Streams the body into `path`, replacing any previous content.
async fn store_body(path: &Path, body: Body) -> std::io::Result<u64> {
    let mut out = File::create(path).await?;
    let mut stream = body.into_data_stream();
    let mut total = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(std::io::Error::other)?;
        out.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }

    out.flush().await?;
    Ok(total)
}
