//! Black-box end-to-end tests
//!
//! Drives the query-protocol surface in process, one request per call, the
//! way an SDK client would over the wire.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::any,
    Router,
};
use tower::util::ServiceExt;

use rustmq_queue::engine::Broker;
use rustmq_queue::handlers;

fn app() -> Router {
    let broker = Arc::new(Broker::new("http://localhost:4576"));
    Router::new()
        .route("/", any(handlers::handle_request))
        .with_state(broker)
}

async fn call(app: &Router, params: &[(&str, &str)]) -> (StatusCode, String) {
    let body = {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    };

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn xml_value(body: &str, tag: &str) -> Option<String> {
    let open_tag = format!("<{tag}>");
    let close_tag = format!("</{tag}>");
    let start = body.find(&open_tag)? + open_tag.len();
    let end = body[start..].find(&close_tag)?;
    Some(body[start..start + end].to_string())
}

fn xml_values(body: &str, tag: &str) -> Vec<String> {
    let open_tag = format!("<{tag}>");
    let close_tag = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find(&open_tag) {
        let value_start = start + open_tag.len();
        let Some(end) = rest[value_start..].find(&close_tag) else {
            break;
        };
        values.push(rest[value_start..value_start + end].to_string());
        rest = &rest[value_start + end + close_tag.len()..];
    }
    values
}

fn message_count(body: &str) -> usize {
    body.matches("<Message>").count()
}

async fn create_queue(app: &Router, name: &str) -> String {
    let (status, body) = call(app, &[("Action", "CreateQueue"), ("QueueName", name)]).await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    xml_value(&body, "QueueUrl").expect("CreateQueue returns a QueueUrl")
}

async fn attribute(app: &Router, queue_url: &str, name: &str) -> String {
    let (status, body) = call(
        app,
        &[("Action", "GetQueueAttributes"), ("QueueUrl", queue_url)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "attributes failed: {body}");

    let marker = format!("<Name>{name}</Name><Value>");
    let start = body.find(&marker).expect("attribute present") + marker.len();
    let end = body[start..].find("</Value>").expect("value closed");
    body[start..start + end].to_string()
}

async fn send(app: &Router, queue_url: &str, body: &str) {
    let (status, response) = call(
        app,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", queue_url),
            ("MessageBody", body),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "send failed: {response}");
}

// =============================================================================
// QUEUE LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_create_queue() {
    let app = app();
    let url = create_queue(&app, "end_to_end_create").await;
    assert_eq!(url, "http://localhost:4576/000000000000/end_to_end_create");
}

#[tokio::test]
async fn test_create_queue_is_idempotent() {
    let app = app();
    let first = create_queue(&app, "end_to_end_idempotent").await;
    let second = create_queue(&app, "end_to_end_idempotent").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_create_queue_bad_name_dot() {
    let app = app();
    let (status, body) = call(&app, &[("Action", "CreateQueue"), ("QueueName", ".")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidParameterValue</Code>"), "{body}");
}

#[tokio::test]
async fn test_create_queue_bad_name_special_char() {
    let app = app();
    let (status, body) = call(&app, &[("Action", "CreateQueue"), ("QueueName", "!")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidParameterValue</Code>"), "{body}");
}

#[tokio::test]
async fn test_create_queue_bad_name_non_ascii() {
    let app = app();
    let (status, body) = call(&app, &[("Action", "CreateQueue"), ("QueueName", "Я")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidParameterValue</Code>"), "{body}");
}

#[tokio::test]
async fn test_create_queue_bad_name_too_long() {
    let app = app();
    let name = "z".repeat(100);
    let (status, body) = call(&app, &[("Action", "CreateQueue"), ("QueueName", &name)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidParameterValue</Code>"), "{body}");
}

#[tokio::test]
async fn test_get_queue_url() {
    let app = app();
    let created_url = create_queue(&app, "end_to_end_url").await;

    let (status, body) = call(
        &app,
        &[("Action", "GetQueueUrl"), ("QueueName", "end_to_end_url")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(xml_value(&body, "QueueUrl").unwrap(), created_url);
}

#[tokio::test]
async fn test_get_queue_url_nonexistent() {
    let app = app();
    let (status, body) = call(
        &app,
        &[("Action", "GetQueueUrl"), ("QueueName", "never_created")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body.contains("<Code>AWS.SimpleQueueService.NonExistentQueue</Code>"),
        "{body}"
    );
}

#[tokio::test]
async fn test_get_queue_attributes() {
    let app = app();
    let url = create_queue(&app, "end_to_end_attributes").await;

    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "0");
    assert_eq!(attribute(&app, &url, "VisibilityTimeout").await, "30");
    assert_eq!(attribute(&app, &url, "MaximumMessageSize").await, "262144");
}

#[tokio::test]
async fn test_list_queues_with_prefix() {
    let app = app();
    create_queue(&app, "list_a").await;
    create_queue(&app, "list_b").await;
    create_queue(&app, "other").await;

    let (status, body) = call(
        &app,
        &[("Action", "ListQueues"), ("QueueNamePrefix", "list_")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(xml_values(&body, "QueueUrl").len(), 2);
}

#[tokio::test]
async fn test_delete_queue() {
    let app = app();
    let url = create_queue(&app, "end_to_end_delete").await;

    let (status, _body) = call(&app, &[("Action", "DeleteQueue"), ("QueueUrl", &url)]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        &[("Action", "GetQueueUrl"), ("QueueName", "end_to_end_delete")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_delete_queue_nonexistent() {
    let app = app();
    let (status, body) = call(
        &app,
        &[("Action", "DeleteQueue"), ("QueueUrl", "nonexistent-queue")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body.contains("<Code>AWS.SimpleQueueService.NonExistentQueue</Code>"),
        "{body}"
    );
}

// =============================================================================
// SEND
// =============================================================================

#[tokio::test]
async fn test_send_message() {
    let app = app();
    let url = create_queue(&app, "end_to_end_send").await;
    send(&app, &url, "123").await;

    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "1");
}

#[tokio::test]
async fn test_send_message_missing_body() {
    let app = app();
    let url = create_queue(&app, "end_to_end_send_missing").await;

    let (status, body) = call(&app, &[("Action", "SendMessage"), ("QueueUrl", &url)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>MissingParameter</Code>"), "{body}");
}

#[tokio::test]
async fn test_send_message_batch() {
    let app = app();
    let url = create_queue(&app, "end_to_end_batch").await;

    let mut params = vec![
        ("Action".to_string(), "SendMessageBatch".to_string()),
        ("QueueUrl".to_string(), url.clone()),
    ];
    for i in 0..10 {
        params.push((format!("SendMessageBatchRequestEntry.{}.Id", i + 1), i.to_string()));
        params.push((
            format!("SendMessageBatchRequestEntry.{}.MessageBody", i + 1),
            i.to_string(),
        ));
    }
    let refs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let (status, body) = call(&app, &refs).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body.matches("<SendMessageBatchResultEntry>").count(), 10);
    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "10");
}

#[tokio::test]
async fn test_send_message_batch_too_large() {
    let app = app();
    let url = create_queue(&app, "end_to_end_batch_large").await;

    let mut params = vec![
        ("Action".to_string(), "SendMessageBatch".to_string()),
        ("QueueUrl".to_string(), url.clone()),
    ];
    for i in 0..11 {
        params.push((format!("SendMessageBatchRequestEntry.{}.Id", i + 1), i.to_string()));
        params.push((
            format!("SendMessageBatchRequestEntry.{}.MessageBody", i + 1),
            i.to_string(),
        ));
    }
    let refs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let (status, body) = call(&app, &refs).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("TooManyEntriesInBatchRequest"), "{body}");
    // All-or-nothing: nothing was enqueued
    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "0");
}

// =============================================================================
// RECEIVE
// =============================================================================

#[tokio::test]
async fn test_receive_message() {
    let app = app();
    let url = create_queue(&app, "end_to_end_receive").await;
    send(&app, &url, "123").await;

    let (status, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "10"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message_count(&body), 1);
    assert_eq!(xml_value(&body, "Body").unwrap(), "123");
    assert!(xml_value(&body, "ReceiptHandle").is_some());
}

#[tokio::test]
async fn test_receive_message_delay_seconds() {
    let app = app();
    let url = create_queue(&app, "end_to_end_delay").await;

    let (status, _body) = call(
        &app,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", &url),
            ("MessageBody", "123"),
            ("DelaySeconds", "1"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "0"),
        ],
    )
    .await;
    assert_eq!(message_count(&body), 0, "delayed message leaked: {body}");

    tokio::time::sleep(Duration::from_secs(2)).await;

    let (_, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "0"),
        ],
    )
    .await;
    assert_eq!(message_count(&body), 1, "{body}");
}

#[tokio::test]
async fn test_receive_message_invalid_parameters() {
    let app = app();
    let url = create_queue(&app, "end_to_end_invalid_max").await;

    for max in ["0", "11"] {
        let (status, body) = call(
            &app,
            &[
                ("Action", "ReceiveMessage"),
                ("QueueUrl", &url),
                ("MaxNumberOfMessages", max),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("InvalidParameterValue"), "{body}");
    }
}

#[tokio::test]
async fn test_receive_message_multiple_messages() {
    let app = app();
    let url = create_queue(&app, "end_to_end_multiple").await;
    send(&app, &url, "123").await;
    send(&app, &url, "234").await;

    let (status, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "10"),
            ("MaxNumberOfMessages", "10"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message_count(&body), 2);
}

#[tokio::test]
async fn test_receive_message_does_not_return_more_than_max() {
    let app = app();
    let url = create_queue(&app, "end_to_end_max").await;
    send(&app, &url, "123").await;
    send(&app, &url, "234").await;
    send(&app, &url, "345").await;

    let (status, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "10"),
            ("MaxNumberOfMessages", "2"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message_count(&body), 2);
}

#[tokio::test]
async fn test_long_poll_wakes_on_send() {
    let app = app();
    let url = create_queue(&app, "end_to_end_long_poll").await;

    let sender_app = app.clone();
    let sender_url = url.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        send(&sender_app, &sender_url, "late arrival").await;
    });

    let started = std::time::Instant::now();
    let (status, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "10"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message_count(&body), 1);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "long poll did not wake early"
    );
}

#[tokio::test]
async fn test_concurrent_receives_never_share_a_message() {
    let app = app();
    let url = create_queue(&app, "end_to_end_concurrent").await;
    send(&app, &url, "only one").await;

    let params = [
        ("Action", "ReceiveMessage"),
        ("QueueUrl", url.as_str()),
        ("WaitTimeSeconds", "0"),
    ];
    let (first, second) = tokio::join!(call(&app, &params), call(&app, &params));

    let total = message_count(&first.1) + message_count(&second.1);
    assert_eq!(total, 1, "a message was delivered twice while in flight");
}

// =============================================================================
// DELETE
// =============================================================================

#[tokio::test]
async fn test_delete_message() {
    let app = app();
    let url = create_queue(&app, "end_to_end_delete_message").await;
    send(&app, &url, "123").await;

    let (_, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("WaitTimeSeconds", "10"),
        ],
    )
    .await;
    let receipt_handle = xml_value(&body, "ReceiptHandle").unwrap();

    let (status, body) = call(
        &app,
        &[
            ("Action", "DeleteMessage"),
            ("QueueUrl", &url),
            ("ReceiptHandle", &receipt_handle),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "0");
}

#[tokio::test]
async fn test_delete_message_batch() {
    let app = app();
    let url = create_queue(&app, "end_to_end_delete_batch").await;
    send(&app, &url, "123").await;
    send(&app, &url, "345").await;

    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "2");

    let (_, body) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", &url),
            ("MaxNumberOfMessages", "10"),
        ],
    )
    .await;
    let handles = xml_values(&body, "ReceiptHandle");
    assert_eq!(handles.len(), 2);

    let (status, body) = call(
        &app,
        &[
            ("Action", "DeleteMessageBatch"),
            ("QueueUrl", &url),
            ("DeleteMessageBatchRequestEntry.1.Id", "1"),
            ("DeleteMessageBatchRequestEntry.1.ReceiptHandle", &handles[0]),
            ("DeleteMessageBatchRequestEntry.2.Id", "2"),
            ("DeleteMessageBatchRequestEntry.2.ReceiptHandle", &handles[1]),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body.matches("<DeleteMessageBatchResultEntry>").count(), 2);
    assert_eq!(attribute(&app, &url, "ApproximateNumberOfMessages").await, "0");
}

#[tokio::test]
async fn test_delete_message_bad_receipt_handle() {
    let app = app();
    let url = create_queue(&app, "end_to_end_bad_handle").await;

    let (status, body) = call(
        &app,
        &[
            ("Action", "DeleteMessage"),
            ("QueueUrl", &url),
            ("ReceiptHandle", "fake-receipt-handle"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>ReceiptHandleIsInvalid</Code>"), "{body}");
}

// =============================================================================
// PROTOCOL
// =============================================================================

#[tokio::test]
async fn test_unknown_action() {
    let app = app();
    let (status, body) = call(&app, &[("Action", "TeleportQueue")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidAction</Code>"), "{body}");
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let app = app();
    create_queue(&app, "end_to_end_request_id").await;

    let (_, body) = call(
        &app,
        &[("Action", "GetQueueUrl"), ("QueueName", "end_to_end_request_id")],
    )
    .await;
    let request_id = xml_value(&body, "RequestId").unwrap();
    assert!(!request_id.is_empty());
}
