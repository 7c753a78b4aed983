//! Upload request handler
//!
//! Validates an upload form, resolves the destination and relays the file
//! through a [`DocumentRelay`].

use super::form::{self, UploadForm};
use super::{UploadError, UploadLimits, UploadResponse};
use crate::destination::Destination;
use crate::metrics;
use crate::telegram::{DocumentRelay, RelayResult};
use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Handles `POST /api/upload`
pub struct UploadHandler {
    relay: Arc<dyn DocumentRelay>,
    default_chat_id: Option<String>,
    limits: UploadLimits,
}

impl UploadHandler {
    pub fn new(
        relay: Arc<dyn DocumentRelay>,
        default_chat_id: Option<String>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            relay,
            default_chat_id,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Run the full upload pipeline for one request and produce the status
    /// and JSON body to send back.
    pub async fn handle<B>(&self, req: Request<B>) -> (StatusCode, UploadResponse)
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let span = tracing::info_span!("upload", request_id = %uuid::Uuid::new_v4());

        async move {
            let result = match form::multipart_from_request(req) {
                Ok(multipart) => {
                    form::read_upload_form(multipart, self.limits.max_file_size_bytes).await
                }
                Err(e) => Err(e),
            };
            let result = match result {
                Ok(form) => self.process(form).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(response) => (StatusCode::OK, response),
                Err(e) => {
                    let status = e.status_code();
                    if status.is_client_error() {
                        metrics::record_rejected_upload(e.kind());
                        tracing::info!(error = %e, "Upload rejected");
                    } else {
                        tracing::error!(error = %e, "Upload failed");
                    }
                    (status, UploadResponse::from(&e))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Validate a parsed form and relay it.
    pub async fn process(&self, form: UploadForm) -> Result<UploadResponse, UploadError> {
        let file = form
            .file
            .ok_or_else(|| UploadError::NoFile("no such file".into()))?;

        if file.size > self.limits.max_file_size_bytes {
            return Err(UploadError::file_too_large(
                file.size,
                self.limits.max_file_size_mb,
            ));
        }

        let raw_destination = form
            .chat_id
            .filter(|chat_id| !chat_id.is_empty())
            .or_else(|| self.default_chat_id.clone())
            .unwrap_or_default();
        let destination = Destination::normalize(&raw_destination)
            .map_err(|_| UploadError::DestinationRequired)?;

        let caption = form.caption.unwrap_or_default();

        let destination_kind = if destination.is_username() {
            tracing::info!("Sending file to username: {}", destination);
            "username"
        } else {
            tracing::info!("Sending file to chat ID: {}", destination);
            "chat_id"
        };

        let start_time = Instant::now();
        let result = self
            .relay
            .send_document(&destination, &file.filename, file.data, &caption)
            .await;
        let duration = start_time.elapsed().as_secs_f64();

        match result {
            Ok(RelayResult::Success {
                message_id,
                file_id,
            }) => {
                metrics::record_relay_duration("success", duration);
                metrics::record_relay_success(destination_kind, file.size);
                Ok(UploadResponse::delivered(file_id, message_id))
            }
            Ok(RelayResult::Failure { message }) => {
                metrics::record_relay_duration("failure", duration);
                metrics::record_relay_failure(destination_kind);
                Err(UploadError::RelayFailed(message))
            }
            Err(e) => {
                metrics::record_relay_duration("error", duration);
                metrics::record_relay_error(destination_kind);
                Err(UploadError::Relay(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{MockDocumentRelay, TelegramError, TOKEN_MISSING_MESSAGE};
    use crate::upload::form::tests::{multipart_body, multipart_request};
    use crate::upload::FilePart;

    const MB: u64 = 1024 * 1024;

    fn handler(relay: MockDocumentRelay, default_chat_id: Option<&str>) -> UploadHandler {
        UploadHandler::new(
            Arc::new(relay),
            default_chat_id.map(str::to_string),
            UploadLimits::from_megabytes(20),
        )
    }

    fn form_with_file(size: usize, chat_id: Option<&str>) -> UploadForm {
        UploadForm {
            file: Some(FilePart {
                filename: "notes.txt".into(),
                size: size as u64,
                data: Bytes::from(vec![b'a'; size]),
            }),
            chat_id: chat_id.map(str::to_string),
            caption: None,
        }
    }

    #[tokio::test]
    async fn test_default_destination_and_success() {
        let mut relay = MockDocumentRelay::new();
        relay
            .expect_send_document()
            .withf(|destination, filename, file, caption| {
                destination.as_str() == "123456"
                    && filename == "notes.txt"
                    && file.len() == 5 * MB as usize
                    && caption.is_empty()
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(RelayResult::Success {
                    message_id: 42,
                    file_id: "ABC".into(),
                })
            });

        let handler = handler(relay, Some("123456"));
        let response = handler
            .process(form_with_file(5 * MB as usize, None))
            .await
            .unwrap();

        assert_eq!(response, UploadResponse::delivered("ABC".into(), 42));
    }

    #[tokio::test]
    async fn test_explicit_chat_id_overrides_default() {
        let mut relay = MockDocumentRelay::new();
        relay
            .expect_send_document()
            .withf(|destination, _, _, _| destination.as_str() == "@alice")
            .times(1)
            .returning(|_, _, _, _| {
                Ok(RelayResult::Success {
                    message_id: 1,
                    file_id: "F".into(),
                })
            });

        let handler = handler(relay, Some("123456"));
        handler
            .process(form_with_file(10, Some("  alice ")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_file() {
        let mut relay = MockDocumentRelay::new();
        relay.expect_send_document().never();

        let handler = handler(relay, Some("123456"));
        let err = handler.process(UploadForm::default()).await.unwrap_err();
        assert!(matches!(err, UploadError::NoFile(_)));
        assert!(err.to_string().contains("No file provided"));
    }

    #[tokio::test]
    async fn test_file_too_large() {
        let mut relay = MockDocumentRelay::new();
        relay.expect_send_document().never();

        let handler = handler(relay, Some("123456"));
        let mut form = form_with_file(0, None);
        if let Some(file) = form.file.as_mut() {
            file.size = 20 * MB + 1;
        }

        let err = handler.process(form).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "File size (20.00 MB) exceeds the limit of 20 MB"
        );
    }

    #[tokio::test]
    async fn test_file_at_limit_is_accepted() {
        let mut relay = MockDocumentRelay::new();
        relay.expect_send_document().times(1).returning(|_, _, _, _| {
            Ok(RelayResult::Success {
                message_id: 7,
                file_id: "LIMIT".into(),
            })
        });

        let handler = handler(relay, Some("123456"));
        let response = handler
            .process(form_with_file(20 * MB as usize, None))
            .await
            .unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_destination_required() {
        for (chat_id, default) in [(None, None), (Some(""), None), (Some("@"), Some("123"))] {
            let mut relay = MockDocumentRelay::new();
            relay.expect_send_document().never();
            let handler = handler(relay, default);
            let err = handler
                .process(form_with_file(10, chat_id))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::DestinationRequired));
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.to_string().contains("DEFAULT_CHAT_ID"));
        }
    }

    #[tokio::test]
    async fn test_structured_failure_is_server_error() {
        let mut relay = MockDocumentRelay::new();
        relay
            .expect_send_document()
            .returning(|_, _, _, _| Ok(RelayResult::failure(TOKEN_MISSING_MESSAGE)));

        let handler = handler(relay, Some("123456"));
        let err = handler.process(form_with_file(10, None)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), TOKEN_MISSING_MESSAGE);
    }

    #[tokio::test]
    async fn test_transport_error_is_wrapped() {
        let mut relay = MockDocumentRelay::new();
        relay.expect_send_document().returning(|_, _, _, _| {
            Err(TelegramError::ResponseError(
                "failed to parse response: expected value".into(),
            ))
        });

        let handler = handler(relay, Some("123456"));
        let err = handler.process(form_with_file(10, None)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err
            .to_string()
            .starts_with("Failed to upload to Telegram: failed to parse response"));
    }

    #[tokio::test]
    async fn test_caption_is_forwarded() {
        let mut relay = MockDocumentRelay::new();
        relay
            .expect_send_document()
            .withf(|_, _, _, caption| caption == "quarterly numbers")
            .times(1)
            .returning(|_, _, _, _| {
                Ok(RelayResult::Success {
                    message_id: 3,
                    file_id: "CAP".into(),
                })
            });

        let handler = handler(relay, Some("123456"));
        let mut form = form_with_file(10, None);
        form.caption = Some("quarterly numbers".into());
        handler.process(form).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_renders_json_response() {
        let mut relay = MockDocumentRelay::new();
        relay
            .expect_send_document()
            .withf(|destination, filename, file, _| {
                destination.as_str() == "@bob" && filename == "a b.txt" && &file[..] == b"hi"
            })
            .returning(|_, _, _, _| {
                Ok(RelayResult::Success {
                    message_id: 9,
                    file_id: "XYZ".into(),
                })
            });

        let handler = handler(relay, None);
        let body = multipart_body(&[("chatId", "@@bob")], Some(("file", "a b.txt", b"hi")));
        let (status, response) = handler.handle(multipart_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, UploadResponse::delivered("XYZ".into(), 9));
    }

    #[tokio::test]
    async fn test_handle_without_file() {
        let mut relay = MockDocumentRelay::new();
        relay.expect_send_document().never();

        let handler = handler(relay, Some("123456"));
        let body = multipart_body(&[("caption", "orphan")], None);
        let (status, response) = handler.handle(multipart_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("No file provided"));
    }

    #[tokio::test]
    async fn test_handle_with_no_file_chosen() {
        let mut relay = MockDocumentRelay::new();
        relay.expect_send_document().never();

        let handler = handler(relay, Some("123456"));
        let body = multipart_body(&[("caption", "hi")], Some(("file", "", b"")));
        let (status, response) = handler.handle(multipart_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response.error.unwrap().starts_with("No file provided"));
    }
}
