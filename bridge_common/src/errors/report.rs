//! Reporting boundary: the one place a full chain and stack get logged.

use std::error::Error as StdError;

use tracing::error;

use super::error::{Error, find};
use super::marshal::marshal_stack;
use super::metadata::Metadata;

/// Log `err` once as a structured event.
///
/// The event message is the full chain message; the `stack` field carries
/// the marshalled frames as JSON and `error` the latest annotation. When
/// `err` has no [`Error`] in its chain, one is captured here from its text.
pub fn report_error(err: &(dyn StdError + 'static)) {
    let captured;
    let structured = match find::<Error>(err) {
        Some(structured) => structured,
        None => {
            captured = Error::msg(err);
            &captured
        }
    };

    let records = marshal_stack(structured).unwrap_or_default();
    let stack = serde_json::to_string(&records)
        .unwrap_or_else(|e| format!("<unserializable stack: {e}>"));

    match structured.metadata().and_then(Metadata::http) {
        Some(http) => error!(
            error = %structured,
            stack = %stack,
            http_status = http.code(),
            "{}",
            structured.chain_message()
        ),
        None => error!(
            error = %structured,
            stack = %stack,
            "{}",
            structured.chain_message()
        ),
    }
}
