//! Lead import handlers

use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::services::lead_import::LeadImportService;
use crate::types::{
    ErrorResponse, ImportFileRequest, ImportFileResponse, LeadImportRequest, ListRequest,
    ListResponse, Request, SuccessResponse,
};

/// Reason an upload body was refused before the pipeline ran
#[derive(Debug, PartialEq)]
pub(crate) enum UploadRejection {
    NotBase64(String),
    TooLarge { size: usize, limit: usize },
}

impl UploadRejection {
    fn into_response(self, request_id: Uuid) -> ErrorResponse {
        match self {
            UploadRejection::NotBase64(reason) => ErrorResponse::new(
                request_id,
                "INVALID_REQUEST",
                format!("contentBase64 is not valid base64: {}", reason),
            ),
            UploadRejection::TooLarge { size, limit } => ErrorResponse::new(
                request_id,
                "PAYLOAD_TOO_LARGE",
                format!("File is {} bytes, the limit is {} bytes", size, limit),
            ),
        }
    }
}

/// Decode the uploaded file and enforce the size limit.
///
/// Oversized bodies are refused from the encoded length alone so a huge
/// payload is never decoded.
pub(crate) fn decode_upload(content_base64: &str, limit: usize) -> Result<Vec<u8>, UploadRejection> {
    let encoded = content_base64.trim();
    let estimated = encoded.len() / 4 * 3;
    if estimated > limit + 3 {
        return Err(UploadRejection::TooLarge { size: estimated, limit });
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| UploadRejection::NotBase64(e.to_string()))?;

    if bytes.len() > limit {
        return Err(UploadRejection::TooLarge { size: bytes.len(), limit });
    }
    Ok(bytes)
}

/// Handle leadport.import.leads requests
pub async fn handle_import(
    client: Client,
    mut subscriber: Subscriber,
    service: Arc<LeadImportService>,
    jwt_secret: Arc<String>,
    max_upload_bytes: usize,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.leads message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LeadImportRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let bytes = match decode_upload(&request.payload.content_base64, max_upload_bytes) {
            Ok(bytes) => bytes,
            Err(rejection) => {
                warn!("Rejected upload {}: {:?}", request.payload.filename, rejection);
                let error = rejection.into_response(request.id);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        debug!("Decoded {} bytes from {} (role {})", bytes.len(), request.payload.filename, auth_info.role);

        match service.import(auth_info.user_id, &request.payload.filename, &bytes).await {
            Ok(result) => {
                info!(
                    "Import of {} finished: {} created, {} skipped, {} errors",
                    request.payload.filename, result.created, result.skipped, result.errors
                );
                let response = SuccessResponse::new(request.id, result);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Import of {} failed: {}", request.payload.filename, e);
                let error = ErrorResponse::from_import_error(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle leadport.import.history.list requests
pub async fn handle_history_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.history.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Err(e) = auth::extract_auth(&request, &jwt_secret) {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", e.to_string());
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let (limit, offset) = request.payload.bounds();
        let listed = match queries::import_history::list_history(&pool, limit, offset).await {
            Ok(items) => queries::import_history::count_history(&pool)
                .await
                .map(|total| (items, total)),
            Err(e) => Err(e),
        };

        match listed {
            Ok((items, total)) => {
                debug!("Listed {} of {} imports", items.len(), total);
                let response = SuccessResponse::new(
                    request.id,
                    ListResponse { items, total, limit, offset },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list import history: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle leadport.import.history.download requests
pub async fn handle_history_download(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    service: Arc<LeadImportService>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.history.download message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ImportFileRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Err(e) = auth::extract_auth(&request, &jwt_secret) {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", e.to_string());
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let import_id = request.payload.import_id;
        let entry = match queries::import_history::get_history(&pool, import_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", format!("Import {} not found", import_id));
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load import {}: {}", import_id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match service.uploads().read(&entry.filename).await {
            Ok(bytes) => {
                let response = SuccessResponse::new(
                    request.id,
                    ImportFileResponse {
                        content_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
                        filename: entry.filename,
                        original_filename: entry.original_filename,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Stored file {} for import {} is missing", entry.filename, import_id);
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Stored file no longer exists");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to read stored file {}: {}", entry.filename, e);
                let error = ErrorResponse::new(request.id, "IMPORT_FAILED", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_upload_accepts_file_within_limit() {
        let body = b"Name,Phone\nJane,9876543210\n";
        let decoded = decode_upload(&encode(body), 1024).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_decode_upload_tolerates_surrounding_whitespace() {
        let decoded = decode_upload(&format!("  {}\n", encode(b"abc")), 16).unwrap();
        assert_eq!(decoded, b"abc");
    }

    #[test]
    fn test_decode_upload_rejects_invalid_base64() {
        let err = decode_upload("not base64!!", 1024).unwrap_err();
        assert!(matches!(err, UploadRejection::NotBase64(_)));
        let response = err.into_response(Uuid::nil());
        assert_eq!(response.error.code, "INVALID_REQUEST");
    }

    #[test]
    fn test_decode_upload_rejects_oversized_file() {
        let body = vec![b'x'; 2048];
        let err = decode_upload(&encode(&body), 1024).unwrap_err();
        assert!(matches!(err, UploadRejection::TooLarge { limit: 1024, .. }));
        let response = err.into_response(Uuid::nil());
        assert_eq!(response.error.code, "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn test_decode_upload_limit_is_inclusive() {
        let body = vec![b'x'; 10];
        assert_eq!(decode_upload(&encode(&body), 10).unwrap().len(), 10);
        assert_eq!(
            decode_upload(&encode(&[b'x'; 11]), 10).unwrap_err(),
            UploadRejection::TooLarge { size: 11, limit: 10 }
        );
    }
}
