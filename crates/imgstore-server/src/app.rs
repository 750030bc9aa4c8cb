//! HTTP routes of the image store.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | `POST` | `/upload` | multipart `category` + `file` |
//! | `GET` | `/images` | list |
//! | `GET` | `/images/{filename}` | image bytes, cached forever |
//! | `DELETE` | `/images/{filename}` | one image |
//! | `DELETE` | `/images/category/{category}` | one category |
//! | `DELETE` | `/images/all` | everything |
//! | `GET` | `/health` | liveness |

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::compression::predicate::{DefaultPredicate, Predicate, SizeAbove};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::repository::LIST_LIMIT;
use crate::state::AppState;
use crate::storage::StagedFile;
use crate::validation::{validate_category, validate_extension, validate_filename};

/// Responses smaller than this are sent uncompressed.
const COMPRESSION_MIN_BYTES: u16 = 1000;

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload_image))
        .route("/images", get(list_images))
        .route("/images/all", delete(delete_all))
        .route("/images/category/{category}", delete(delete_category))
        .route("/images/{filename}", get(get_image).delete(delete_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CompressionLayer::new().compress_when(
                    DefaultPredicate::new().and(SizeAbove::new(COMPRESSION_MIN_BYTES)),
                ),
            ),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ImageEntry {
    pub id: i64,
    pub filename: String,
    pub category: String,
    pub url: String,
}

/// Upload one image.
///
/// The file is streamed to a staging file while it arrives and only moved
/// into its category folder once the whole form has been read and checked.
async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut category: Option<String> = None;
    let mut upload: Option<(StagedFile, String)> = None;

    let outcome = read_upload_form(&state, &mut multipart, &mut category, &mut upload).await;
    let (category, (staged, ext)) = match (outcome, category, upload) {
        (Ok(()), Some(category), Some(upload)) => (category, upload),
        (outcome, _, upload) => {
            if let Some((staged, _)) = upload {
                staged.discard().await;
            }
            outcome?;
            return Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "missing form field 'category' or 'file'",
            ));
        }
    };

    let filename = format!("{}.{ext}", uuid::Uuid::new_v4());
    let path = staged.commit(&state.store, &category, &filename).await?;

    let image = match state.repo.insert(&filename, &category).await {
        Ok(image) => image,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %remove_err, "failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(id = image.id, %filename, %category, "image uploaded");
    Ok(Json(UploadResponse {
        id: image.id,
        image_url: format!("/images/{filename}"),
    }))
}

/// Consume the form, validating `category` and streaming `file` to staging.
async fn read_upload_form(
    state: &AppState,
    multipart: &mut Multipart,
    category: &mut Option<String>,
    upload: &mut Option<(StagedFile, String)>,
) -> Result<(), ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("category") => {
                let raw = field.text().await?;
                *category = Some(validate_category(&raw)?);
            }
            Some("file") if upload.is_none() => {
                let ext = validate_extension(field.file_name().unwrap_or_default())?;
                let mut staged = state.store.stage(state.max_upload_bytes).await?;
                loop {
                    let chunk = match field.chunk().await {
                        Ok(Some(chunk)) => chunk,
                        Ok(None) => break,
                        Err(e) => {
                            staged.discard().await;
                            return Err(e.into());
                        }
                    };
                    if let Err(e) = staged.write(&chunk).await {
                        staged.discard().await;
                        return Err(e.into());
                    }
                }
                *upload = Some((staged, ext));
            }
            _ => {}
        }
    }
    Ok(())
}

async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<ImageEntry>>, ApiError> {
    let images = state.repo.list(LIST_LIMIT).await?;
    Ok(Json(
        images
            .into_iter()
            .map(|image| ImageEntry {
                url: format!("/images/{}", image.filename),
                id: image.id,
                filename: image.filename,
                category: image.category,
            })
            .collect(),
    ))
}

async fn get_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let filename = validate_filename(&filename)?;
    let image = state
        .repo
        .find(filename)
        .await?
        .ok_or_else(|| ApiError::not_found("image not found"))?;

    let path = state.store.image_path(&image.category, &image.filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("file not found on disk"));
        }
        Err(e) => return Err(ApiError::internal(format!("failed to read file: {e}"))),
    };

    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let etag = format!("\"{}-{}\"", image.id, image.filename);

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&format!("image/{ext}"))
            .map_err(|e| ApiError::internal(format!("invalid content type: {e}")))?,
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    headers.insert(
        header::ETAG,
        HeaderValue::from_str(&etag)
            .map_err(|e| ApiError::internal(format!("invalid etag: {e}")))?,
    );
    Ok(response)
}

async fn delete_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let filename = validate_filename(&filename)?;
    let image = state
        .repo
        .find(filename)
        .await?
        .ok_or_else(|| ApiError::not_found("image not found"))?;

    let removed = state.store.remove(&image.category, &image.filename).await?;
    if !removed {
        tracing::warn!(filename = %image.filename, "image file already missing on disk");
    }
    state.repo.delete(image.id).await?;

    tracing::info!(id = image.id, filename = %image.filename, "image deleted");
    Ok(Json(json!({ "detail": format!("image '{filename}' deleted") })))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let category = validate_category(&category)?;
    let total = state.repo.count_category(&category).await?;
    if total == 0 {
        return Err(ApiError::not_found("no images in that category"));
    }

    state.store.remove_category(&category).await?;
    state.repo.delete_category(&category).await?;

    tracing::info!(%category, total, "category deleted");
    Ok(Json(json!({
        "detail": format!("category '{category}' deleted"),
        "total": total,
    })))
}

async fn delete_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let total = state.repo.count().await?;
    if total == 0 {
        return Err(ApiError::not_found("no images"));
    }

    state.store.clear().await?;
    state.repo.delete_all().await?;

    tracing::info!(total, "all images deleted");
    Ok(Json(json!({ "detail": "all images deleted", "total": total })))
}
