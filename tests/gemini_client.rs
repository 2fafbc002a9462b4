//! Gemini client against a mocked generateContent endpoint.

use gemini_image_editor::error::{Error, NO_IMAGE_MESSAGE, REQUEST_FAILED_MESSAGE};
use gemini_image_editor::gemini::{GeminiClient, ImageEditor};
use gemini_image_editor::{codec, EditRequest, EditResult, EditSession};
use mockito::Matcher;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const MODEL: &str = "gemini-2.5-flash-image";
const PATH: &str = "/models/gemini-2.5-flash-image:generateContent";

fn client_for(server: &mockito::Server) -> GeminiClient {
    GeminiClient::new("test-key", server.url(), MODEL)
}

#[tokio::test]
async fn sends_image_then_prompt_and_asks_for_image_output() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": "image/jpeg", "data": "QUJD"}},
                    {"text": "remove the lamp post"}
                ]
            }],
            "generationConfig": {"responseModalities": ["IMAGE"]}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "RURJVEVE"}}]}}]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let image = client_for(&server)
        .submit("remove the lamp post", "QUJD", "image/jpeg")
        .await
        .unwrap();

    assert_eq!(image, "RURJVEVE");
    mock.assert_async().await;
}

#[tokio::test]
async fn text_only_first_candidate_is_skipped() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [
                    {"content": {"parts": [{"text": "Sure, here is a description."}]}},
                    {"content": {"parts": [
                        {"text": "And the image:"},
                        {"inlineData": {"mimeType": "image/png", "data": "Rmlyc3Q="}},
                        {"inlineData": {"mimeType": "image/png", "data": "U2Vjb25k"}}
                    ]}}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let image = client_for(&server).submit("add snow", "QUJD", "image/png").await.unwrap();
    assert_eq!(image, "Rmlyc3Q=");
}

#[tokio::test]
async fn response_without_image_is_no_image_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{"content": {"parts": [{"text": "I cannot edit this image."}]}, "finishReason": "STOP"}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = client_for(&server).submit("add snow", "QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::NoImageInResponse));
    assert_eq!(err.to_string(), NO_IMAGE_MESSAGE);
}

#[tokio::test]
async fn http_errors_are_generic() {
    for status in [400, 403, 429, 500] {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).submit("add snow", "QUJD", "image/png").await.unwrap_err();
        assert!(matches!(err, Error::RequestFailed), "status {status}");
        assert_eq!(err.to_string(), REQUEST_FAILED_MESSAGE);
        assert!(!err.to_string().contains("API key"));
    }
}

#[tokio::test]
async fn malformed_body_is_request_failed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>gateway timeout</html>")
        .create_async()
        .await;

    let err = client_for(&server).submit("add snow", "QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::RequestFailed));
}

#[tokio::test]
async fn connection_failure_is_request_failed() {
    let client = GeminiClient::new("test-key", "http://127.0.0.1:1/v1beta", MODEL);
    let err = client.submit("add snow", "QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::RequestFailed));
}

#[tokio::test]
async fn trait_submission_uses_request_fields() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": "image/webp", "data": "AQID"}},
                {"text": "warmer colours"}
            ]}]
        })))
        .with_status(200)
        .with_body(json!({"candidates": [{"content": {"parts": [{"inlineData": {"data": "T0s="}}]}}]}).to_string())
        .expect(1)
        .create_async()
        .await;

    let uploaded = codec::encode(codec::FileHandle::from_bytes("w.webp", "image/webp", vec![1u8, 2, 3]))
        .await
        .unwrap();
    let request = EditRequest::new(Some(&uploaded), "  warmer colours  ").unwrap();
    let editor: Arc<dyn ImageEditor> = Arc::new(client_for(&server));

    assert_eq!(editor.submit(&request).await.unwrap(), "T0s=");
    mock.assert_async().await;
}

#[tokio::test]
async fn session_end_to_end() {
    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    let returned = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png);

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": returned.clone()}}]}}]}).to_string())
        .create_async()
        .await;

    let session = EditSession::new(Arc::new(client_for(&server)));
    session
        .select_file(codec::FileHandle::from_bytes("in.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]))
        .await
        .unwrap();
    session.update_prompt("turn it into a watercolour");
    session.submit().await;

    assert_eq!(session.result(), EditResult::Success(format!("data:image/png;base64,{returned}")));
}
