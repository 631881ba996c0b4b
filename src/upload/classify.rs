use serde_json::Value;
use super::outcome::{Outcome, UploadError, UploadReceipt};

/// Maps a completed upload exchange to its outcome.
///
/// Total over every status code: anything not listed explicitly becomes
/// `ServerError(status)`. Only a 200 body is inspected.
pub fn classify(status: u16, body: &[u8]) -> Outcome {
    match status {
        200 => classify_body(body),
        400 => Outcome::Failed(UploadError::BadRequest),
        403 => Outcome::Failed(UploadError::BadCredential),
        409 => Outcome::Failed(UploadError::DuplicateFile),
        413 => Outcome::Failed(UploadError::TooLarge),
        status => Outcome::Failed(UploadError::ServerError { status }),
    }
}

fn classify_body(body: &[u8]) -> Outcome {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return Outcome::Failed(UploadError::MalformedResponse),
    };

    // `null` parses but carries no fields at all
    if value.is_null() {
        return Outcome::Failed(UploadError::MalformedResponse);
    }

    if value.get("success").and_then(Value::as_bool) == Some(true) {
        let receipt = serde_json::from_value(value).unwrap_or_default();
        return Outcome::Succeeded(receipt);
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_owned);

    Outcome::Failed(UploadError::ServerRejected { message })
}
