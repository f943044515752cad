//! Attachment uploads
//!
//! Files are stored under the upload directory and referenced from chat
//! frames by id, so clients never name server paths directly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, header},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::attachments::Attachment;
use crate::voice::extension_for_mime;
use crate::{Error, Result};

/// Largest accepted upload
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// An upload and the session that made it
#[derive(Debug, Clone)]
struct StoredUpload {
    session_id: String,
    attachment: Attachment,
}

/// Uploaded files indexed by id
///
/// An upload is only visible to the session that stored it and lives as
/// long as that session.
#[derive(Debug)]
pub struct UploadStore {
    dir: PathBuf,
    files: RwLock<HashMap<Uuid, StoredUpload>>,
}

impl UploadStore {
    /// Create a store writing into `dir`
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: RwLock::new(HashMap::new()),
        }
    }

    /// Persist an upload for `session_id` and return its id
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn store(
        &self,
        session_id: &str,
        name: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<(Uuid, Attachment)> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = Uuid::new_v4();
        let path = self
            .dir
            .join(format!("{id}.{}", extension_for_mime(mime_type)));
        tokio::fs::write(&path, data).await?;

        let attachment = Attachment {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            path,
        };
        tracing::debug!(%id, session_id, name, mime_type, bytes = data.len(), "stored upload");

        self.files.write().await.insert(
            id,
            StoredUpload {
                session_id: session_id.to_string(),
                attachment: attachment.clone(),
            },
        );
        Ok((id, attachment))
    }

    /// Look up an upload made by `session_id`
    ///
    /// # Errors
    ///
    /// Returns `Attachment` error for unknown ids and for uploads owned by
    /// another session
    pub async fn resolve(&self, session_id: &str, id: Uuid) -> Result<Attachment> {
        self.files
            .read()
            .await
            .get(&id)
            .filter(|upload| upload.session_id == session_id)
            .map(|upload| upload.attachment.clone())
            .ok_or_else(|| Error::Attachment(format!("unknown upload: {id}")))
    }

    /// Resolve several uploads, failing on the first unknown id
    ///
    /// # Errors
    ///
    /// Returns `Attachment` error for unknown or foreign ids
    pub async fn resolve_all(&self, session_id: &str, ids: &[Uuid]) -> Result<Vec<Attachment>> {
        let mut attachments = Vec::with_capacity(ids.len());
        for id in ids {
            attachments.push(self.resolve(session_id, *id).await?);
        }
        Ok(attachments)
    }

    /// Forget every upload made by `session_id` and delete the files
    ///
    /// Returns the number of uploads released.
    pub async fn release_session(&self, session_id: &str) -> usize {
        let released: Vec<StoredUpload> = {
            let mut files = self.files.write().await;
            let ids: Vec<Uuid> = files
                .iter()
                .filter(|(_, upload)| upload.session_id == session_id)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| files.remove(id)).collect()
        };

        for upload in &released {
            if let Err(e) = tokio::fs::remove_file(&upload.attachment.path).await {
                tracing::warn!(
                    path = %upload.attachment.path.display(),
                    error = %e,
                    "failed to delete upload"
                );
            }
        }

        if !released.is_empty() {
            tracing::debug!(session_id, count = released.len(), "released uploads");
        }
        released.len()
    }
}

/// Build files router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Upload query parameters
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub session_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: Uuid,
    pub name: String,
    pub mime: String,
}

/// Store a raw request body as an attachment
async fn upload(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<UploadedFile>, ApiError> {
    state.sessions.get(&query.session_id).await?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let name = query
        .name
        .as_deref()
        .and_then(|n| std::path::Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    let (id, _) = state
        .uploads
        .store(&query.session_id, &name, &mime, &body)
        .await?;

    Ok(Json(UploadedFile { id, name, mime }))
}
