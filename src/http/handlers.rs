use super::state::AppState;
use crate::relay::ConnectionInfo;
use axum::{
    extract::{ws::WebSocketUpgrade, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Absolute path to hand back over the streaming websocket
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

/// Keep a short alphanumeric extension so the decoder can sniff the container.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /api/health-check
pub async fn api_health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// POST /api/streaming/upload-audio/
/// Store an uploaded audio file for a later streaming session
pub async fn upload_audio(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let max_bytes = state.config.audio.max_upload_bytes();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(e.status(), e.body_text()),
        };

        if field.name() != Some("file") {
            continue;
        }

        let extension = upload_extension(field.file_name());
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return error_response(e.status(), e.body_text()),
        };

        if data.len() > max_bytes {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "File exceeds the {}MB upload limit",
                    state.config.audio.max_upload_mb
                ),
            );
        }

        let upload_dir = state.relay.upload_dir();
        if let Err(e) = tokio::fs::create_dir_all(upload_dir).await {
            error!("Failed to create upload directory: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }

        let path = upload_dir.join(format!("{}{}", uuid::Uuid::new_v4(), extension));
        if let Err(e) = tokio::fs::write(&path, &data).await {
            error!("Failed to store upload {}: {}", path.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }

        info!("Stored upload {} ({} bytes)", path.display(), data.len());
        return (
            StatusCode::OK,
            Json(UploadResponse {
                filename: path.display().to_string(),
            }),
        )
            .into_response();
    }

    error_response(StatusCode::BAD_REQUEST, "Missing multipart field 'file'")
}

/// GET /api/streaming/ws/:client_id
/// Upgrade to the client-facing relay websocket
pub async fn streaming_ws(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    info!("Websocket connection requested by client {}", client_id);

    ws.on_upgrade(move |socket| async move {
        state.relay.handle(&client_id, socket).await;
    })
}

/// GET /api/streaming/connections
/// List live relay connections
pub async fn list_connections(State(state): State<AppState>) -> Json<Vec<ConnectionInfo>> {
    Json(state.relay.connections().list().await)
}

#[cfg(test)]
mod tests {
    use super::upload_extension;

    #[test]
    fn extension_is_kept_when_sane() {
        assert_eq!(upload_extension(Some("meeting.WebM")), ".webm");
        assert_eq!(upload_extension(Some("a.b.wav")), ".wav");
        assert_eq!(upload_extension(Some("noext")), "");
        assert_eq!(upload_extension(Some("evil.w/../x")), "");
        assert_eq!(upload_extension(None), "");
    }
}
