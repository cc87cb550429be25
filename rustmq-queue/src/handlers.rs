//! HTTP handlers for the queue API
//!
//! One handler per query-protocol action, dispatched on the `Action`
//! parameter. Handlers decode parameters, call into the engine, and render
//! the XML response documents.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use rustmq_core::{AwsError, ErrorCode, RequestId, DEFAULT_ACCOUNT_ID};

use crate::engine::{
    Broker, DeleteBatchEntry, Message, QueueError, ReceiveOptions, SendBatchEntry,
};
use crate::params::Params;

/// Entry point for all queue API requests.
pub async fn handle_request(State(broker): State<Arc<Broker>>, body: Bytes) -> Response {
    let params = Params::parse(&body);
    let request_id = RequestId::new();
    let action = params.get("Action").unwrap_or("").to_string();

    debug!(action = %action, request_id = %request_id.id, "Queue API request");

    let result = match action.as_str() {
        "CreateQueue" => handle_create_queue(&broker, &params),
        "GetQueueUrl" => handle_get_queue_url(&broker, &params),
        "GetQueueAttributes" => handle_get_queue_attributes(&broker, &params),
        "ListQueues" => handle_list_queues(&broker, &params),
        "DeleteQueue" => handle_delete_queue(&broker, &params),
        "SendMessage" => handle_send_message(&broker, &params),
        "SendMessageBatch" => handle_send_message_batch(&broker, &params),
        "ReceiveMessage" => handle_receive_message(&broker, &params).await,
        "DeleteMessage" => handle_delete_message(&broker, &params),
        "DeleteMessageBatch" => handle_delete_message_batch(&broker, &params),
        _ => {
            warn!(action = %action, "Unknown action");
            Err(AwsError::new(
                ErrorCode::InvalidAction,
                "The action or operation requested is invalid. Verify that the action is typed correctly.",
            ))
        }
    };

    match result {
        Ok(result_xml) => success_response(&action, &result_xml, &request_id.id),
        Err(error) => error_response(&error.with_request_id(request_id.id)),
    }
}

// === Handlers ===

fn handle_create_queue(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = required_param(params, "QueueName")?;
    let (queue, _created) = broker.create_queue(queue_name).map_err(to_aws_error)?;
    Ok(format!("<QueueUrl>{}</QueueUrl>", queue.url()))
}

fn handle_get_queue_url(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = required_param(params, "QueueName")?;
    let queue = broker.get_queue(queue_name).map_err(to_aws_error)?;
    Ok(format!("<QueueUrl>{}</QueueUrl>", queue.url()))
}

fn handle_get_queue_attributes(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;
    let attributes = broker
        .get_queue_attributes(queue_name)
        .map_err(to_aws_error)?;

    let mut result = String::new();
    let mut push = |name: &str, value: String| {
        let _ = write!(
            result,
            "<Attribute><Name>{name}</Name><Value>{value}</Value></Attribute>"
        );
    };
    push("QueueArn", attributes.queue_arn.clone());
    push(
        "ApproximateNumberOfMessages",
        attributes.approximate_number_of_messages.to_string(),
    );
    push(
        "ApproximateNumberOfMessagesNotVisible",
        attributes
            .approximate_number_of_messages_not_visible
            .to_string(),
    );
    push(
        "ApproximateNumberOfMessagesDelayed",
        attributes
            .approximate_number_of_messages_delayed
            .to_string(),
    );
    push("CreatedTimestamp", attributes.created_timestamp.to_string());
    push(
        "LastModifiedTimestamp",
        attributes.last_modified_timestamp.to_string(),
    );
    push(
        "VisibilityTimeout",
        attributes.visibility_timeout.to_string(),
    );
    push(
        "MaximumMessageSize",
        attributes.maximum_message_size.to_string(),
    );
    push(
        "MessageRetentionPeriod",
        attributes.message_retention_period.to_string(),
    );
    push("DelaySeconds", attributes.delay_seconds.to_string());
    push(
        "ReceiveMessageWaitTimeSeconds",
        attributes.receive_message_wait_time_seconds.to_string(),
    );
    Ok(result)
}

fn handle_list_queues(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let prefix = params.get("QueueNamePrefix");
    let mut result = String::new();
    for url in broker.list_queues(prefix) {
        let _ = write!(result, "<QueueUrl>{url}</QueueUrl>");
    }
    Ok(result)
}

fn handle_delete_queue(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;
    broker.delete_queue(queue_name).map_err(to_aws_error)?;
    Ok(String::new())
}

fn handle_send_message(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;
    let body = required_param(params, "MessageBody")?;
    let delay_seconds = int_param(params, "DelaySeconds")?;

    let sent = broker
        .send_message(queue_name, body.to_string(), delay_seconds)
        .map_err(to_aws_error)?;
    Ok(format!(
        "<MD5OfMessageBody>{}</MD5OfMessageBody><MessageId>{}</MessageId>",
        sent.md5_of_body, sent.message_id
    ))
}

fn handle_send_message_batch(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;

    let mut entries = Vec::new();
    for (index, id) in collect_batch_ids(params, "SendMessageBatchRequestEntry")? {
        let body = params
            .get(&format!("SendMessageBatchRequestEntry.{index}.MessageBody"))
            .unwrap_or_default()
            .to_string();
        // An unparsable per-entry DelaySeconds flows through the engine's
        // range check as an invalid value.
        let delay_seconds = params
            .get(&format!("SendMessageBatchRequestEntry.{index}.DelaySeconds"))
            .map(|raw| raw.parse::<i64>().unwrap_or(-1));
        entries.push(SendBatchEntry {
            id,
            body,
            delay_seconds,
        });
    }

    let results = broker
        .send_message_batch(queue_name, entries)
        .map_err(to_aws_error)?;

    let mut successful = String::new();
    let mut failed = String::new();
    for entry in results {
        match entry.result {
            Ok(sent) => {
                let _ = write!(
                    successful,
                    "<SendMessageBatchResultEntry><Id>{}</Id><MD5OfMessageBody>{}</MD5OfMessageBody><MessageId>{}</MessageId></SendMessageBatchResultEntry>",
                    entry.id, sent.md5_of_body, sent.message_id
                );
            }
            Err(error) => {
                let _ = write!(
                    failed,
                    "<BatchResultErrorEntry><Id>{}</Id><Code>{}</Code><Message>{}</Message><SenderFault>true</SenderFault></BatchResultErrorEntry>",
                    entry.id,
                    error.code(),
                    escape_xml(&error.to_string())
                );
            }
        }
    }
    Ok(format!("{successful}{failed}"))
}

async fn handle_receive_message(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;
    let options = ReceiveOptions {
        max_number_of_messages: int_param(params, "MaxNumberOfMessages")?,
        wait_time_seconds: int_param(params, "WaitTimeSeconds")?,
        visibility_timeout: int_param(params, "VisibilityTimeout")?,
    };

    let messages = broker
        .receive_message(queue_name, &options)
        .await
        .map_err(to_aws_error)?;

    let mut result = String::new();
    for message in messages {
        result.push_str(&message_xml(&message));
    }
    Ok(result)
}

fn handle_delete_message(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;
    let receipt_handle = required_param(params, "ReceiptHandle")?;
    broker
        .delete_message(queue_name, receipt_handle)
        .map_err(to_aws_error)?;
    Ok(String::new())
}

fn handle_delete_message_batch(broker: &Broker, params: &Params) -> Result<String, AwsError> {
    let queue_name = queue_name_param(params)?;

    let mut entries = Vec::new();
    for (index, id) in collect_batch_ids(params, "DeleteMessageBatchRequestEntry")? {
        let receipt_handle = params
            .get(&format!(
                "DeleteMessageBatchRequestEntry.{index}.ReceiptHandle"
            ))
            .unwrap_or_default()
            .to_string();
        entries.push(DeleteBatchEntry { id, receipt_handle });
    }

    let results = broker
        .delete_message_batch(queue_name, entries)
        .map_err(to_aws_error)?;

    let mut successful = String::new();
    let mut failed = String::new();
    for entry in results {
        match entry.result {
            Ok(()) => {
                let _ = write!(
                    successful,
                    "<DeleteMessageBatchResultEntry><Id>{}</Id></DeleteMessageBatchResultEntry>",
                    entry.id
                );
            }
            Err(error) => {
                let _ = write!(
                    failed,
                    "<BatchResultErrorEntry><Id>{}</Id><Code>{}</Code><Message>{}</Message><SenderFault>true</SenderFault></BatchResultErrorEntry>",
                    entry.id,
                    error.code(),
                    escape_xml(&error.to_string())
                );
            }
        }
    }
    Ok(format!("{successful}{failed}"))
}

// === Parameter helpers ===

fn required_param<'a>(params: &'a Params, key: &str) -> Result<&'a str, AwsError> {
    params.get(key).ok_or_else(|| {
        AwsError::new(
            ErrorCode::MissingParameter,
            format!("A required parameter {key} is not supplied."),
        )
    })
}

/// Queue operations address the queue by its URL; the queue name is the last
/// path segment.
fn queue_name_param<'a>(params: &'a Params) -> Result<&'a str, AwsError> {
    let queue_url = required_param(params, "QueueUrl")?;
    Ok(queue_url.rsplit('/').next().unwrap_or(queue_url))
}

fn int_param(params: &Params, key: &str) -> Result<Option<i64>, AwsError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
            AwsError::new(
                ErrorCode::InvalidParameterValue,
                format!("Parameter {key} should be of type Integer"),
            )
        }),
    }
}

/// Collect 1-based batch entry ids, stopping at the first gap.
fn collect_batch_ids(params: &Params, prefix: &str) -> Result<Vec<(usize, String)>, AwsError> {
    let mut entries = Vec::new();
    for index in 1.. {
        let Some(ids) = params.get_all(&format!("{prefix}.{index}.Id")) else {
            break;
        };
        if ids.len() != 1 {
            return Err(AwsError::new(
                ErrorCode::InvalidQueryParameter,
                "The AWS query string is malformed or does not adhere to AWS standards.",
            ));
        }
        entries.push((index, ids[0].clone()));
    }
    Ok(entries)
}

// === XML helpers ===

fn message_xml(message: &Message) -> String {
    format!(
        "<Message><MessageId>{}</MessageId><ReceiptHandle>{}</ReceiptHandle><MD5OfBody>{}</MD5OfBody><Body>{}</Body>\
         <Attribute><Name>SenderId</Name><Value>{}</Value></Attribute>\
         <Attribute><Name>SentTimestamp</Name><Value>{}</Value></Attribute>\
         <Attribute><Name>ApproximateReceiveCount</Name><Value>{}</Value></Attribute>\
         <Attribute><Name>ApproximateFirstReceiveTimestamp</Name><Value>{}</Value></Attribute>\
         </Message>",
        message.message_id,
        message.receipt_handle.as_deref().unwrap_or_default(),
        message.md5_of_body,
        escape_xml(&message.body),
        DEFAULT_ACCOUNT_ID,
        message.sent_timestamp,
        message.receive_count,
        message.first_receive_timestamp.unwrap_or_default(),
    )
}

fn to_aws_error(error: QueueError) -> AwsError {
    let code = match &error {
        QueueError::InvalidQueueName | QueueError::InvalidParameter { .. } => {
            ErrorCode::InvalidParameterValue
        }
        QueueError::QueueNotFound(_) => ErrorCode::NonExistentQueue,
        QueueError::ReceiptHandleInvalid(_) => ErrorCode::ReceiptHandleIsInvalid,
        QueueError::TooManyEntriesInBatchRequest => ErrorCode::TooManyEntriesInBatchRequest,
        QueueError::EmptyBatchRequest => ErrorCode::EmptyBatchRequest,
        QueueError::InvalidBatchEntryId => ErrorCode::InvalidBatchEntryId,
        QueueError::BatchEntryIdNotDistinct(_) => ErrorCode::BatchEntryIdsNotDistinct,
    };
    AwsError::new(code, error.to_string())
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn success_response(action: &str, result: &str, request_id: &str) -> Response {
    let xml = format!(
        "<{action}Response>\n  <{action}Result>{result}</{action}Result>\n  <ResponseMetadata>\n    <RequestId>{request_id}</RequestId>\n  </ResponseMetadata>\n</{action}Response>"
    );
    xml_response(StatusCode::OK, &xml)
}

fn error_response(error: &AwsError) -> Response {
    let status =
        StatusCode::from_u16(error.code.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    xml_response(status, &error.to_xml())
}

fn xml_response(status: StatusCode, body: &str) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/xml"),
    );
    response
}
