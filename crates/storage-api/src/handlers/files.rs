//! `/files/*` handlers (spec §6, §4.5).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use storage_core::CreateFileInput;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{content_disposition, FileRecordDto, Page, PageQuery};
use crate::middleware::{extract_ip, rate_limit_key};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    page: PageQuery,
    search: Option<String>,
    #[serde(rename = "parentId")]
    parent_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<FileRecordDto>>, ApiError> {
    let pagination = query.page.into_pagination();
    let (items, total) = state
        .files
        .list(&user, query.parent_id, query.search.as_deref(), pagination)
        .await?;
    Ok(Json(Page {
        items: items.iter().map(FileRecordDto::from).collect(),
        total,
        page: pagination.page,
        limit: pagination.limit,
    }))
}

pub async fn list_trash(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<FileRecordDto>>, ApiError> {
    let pagination = query.into_pagination();
    let (items, total) = state.files.list_trash(&user, pagination).await?;
    Ok(Json(Page {
        items: items.iter().map(FileRecordDto::from).collect(),
        total,
        page: pagination.page,
        limit: pagination.limit,
    }))
}

#[derive(Deserialize)]
pub struct CreateFileBody {
    name: String,
    size: i64,
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "parentId")]
    parent_id: Option<Uuid>,
    #[serde(rename = "isFolder", default)]
    is_folder: bool,
    #[serde(rename = "fileHash")]
    file_hash: Option<String>,
    #[serde(rename = "skipDuplicateCheck", default)]
    skip_duplicate_check: bool,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateFileBody>,
) -> Result<Json<FileRecordDto>, ApiError> {
    let record = state
        .files
        .create(
            &user,
            CreateFileInput {
                name: body.name,
                size_bytes: body.size,
                mime_type: body.mime_type,
                parent_id: body.parent_id,
                is_folder: body.is_folder,
                content_hash: body.file_hash,
                skip_duplicate_check: body.skip_duplicate_check,
            },
        )
        .await?;
    Ok(Json(FileRecordDto::from(record)))
}

#[derive(Deserialize)]
pub struct CheckDuplicateBody {
    #[serde(rename = "fileHash")]
    file_hash: String,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

pub async fn check_duplicate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<CheckDuplicateBody>,
) -> Result<Json<Vec<FileRecordDto>>, ApiError> {
    let matches = state
        .files
        .check_duplicate(&user, &body.file_hash, body.file_name.as_deref())
        .await?;
    Ok(Json(matches.iter().map(FileRecordDto::from).collect()))
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<FileRecordDto>, ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.upload, &ip.to_string()).await?;

    let mut bytes: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?,
            );
        }
    }
    let bytes = bytes.ok_or_else(|| ApiError::Validation("missing \"file\" field".to_string()))?;

    let record = state.files.upload(&user, id, bytes.to_vec()).await?;
    Ok(Json(FileRecordDto::from(record)))
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = storage_meta::files::find_by_id(&state.pool, id)
        .await
        .map_err(|e| match e {
            storage_meta::MetaError::NotFound => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        })?;
    if record.owner_id != user.id {
        return Err(ApiError::Forbidden("not the owner of this file".to_string()));
    }

    if record.is_folder {
        let (name, zip_bytes) = state.files.folder_zip(&user, id).await?;
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (header::CONTENT_DISPOSITION, content_disposition(&name)),
            ],
            zip_bytes,
        )
            .into_response());
    }

    let (record, plaintext) = state.files.download(&user, id).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, record.mime_type.clone()),
            (header::CONTENT_DISPOSITION, content_disposition(&record.name)),
        ],
        plaintext,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct RenameBody {
    name: String,
}

pub async fn rename(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameBody>,
) -> Result<Json<FileRecordDto>, ApiError> {
    let record = state.files.rename(&user, id, &body.name).await?;
    Ok(Json(FileRecordDto::from(record)))
}

pub async fn soft_delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(), ApiError> {
    state.files.soft_delete(&user, id).await?;
    Ok(())
}

pub async fn restore(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(), ApiError> {
    state.files.restore(&user, id).await?;
    Ok(())
}

pub async fn permanent_delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(), ApiError> {
    state.files.permanent_delete(&user, id).await?;
    Ok(())
}

pub async fn empty_trash(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Result<(), ApiError> {
    state.files.empty_trash(&user).await?;
    Ok(())
}

#[derive(Deserialize)]
pub struct BulkDeleteBody {
    ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct BulkDeleteResult {
    id: Uuid,
    ok: bool,
    error: Option<String>,
}

pub async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<BulkDeleteBody>,
) -> Json<Vec<BulkDeleteResult>> {
    let results = state.files.bulk_soft_delete(&user, &body.ids).await;
    Json(
        results
            .into_iter()
            .map(|(id, result)| match result {
                Ok(()) => BulkDeleteResult { id, ok: true, error: None },
                Err(e) => BulkDeleteResult {
                    id,
                    ok: false,
                    error: Some(e.to_string()),
                },
            })
            .collect(),
    )
}
