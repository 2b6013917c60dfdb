//! Structured stack output for log events.

use std::error::Error as StdError;

use serde::Serialize;

use super::error::{Error, find};
use super::CHAIN_SEPARATOR;

/// One reported frame: where, and in which function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackSource {
    /// `file:line:` of the frame.
    #[serde(rename = "source")]
    pub source_file: String,
    /// Function the frame belongs to.
    #[serde(rename = "func")]
    pub function: String,
}

/// Render the stack of the first [`Error`] in `err`'s chain.
///
/// One record is produced per chain segment (root text plus every wrap), so
/// `"root -- step1 -- step2"` yields the three innermost frames, capped at
/// the number of frames actually resolved. `None` when no link in the chain
/// carries a stack.
pub fn marshal_stack(err: &(dyn StdError + 'static)) -> Option<Vec<StackSource>> {
    let structured = find::<Error>(err)?;
    let segments = structured.chain_message().split(CHAIN_SEPARATOR).count();

    let records = structured
        .frames()
        .iter()
        .take(segments)
        .map(|frame| StackSource {
            source_file: frame.summary(),
            function: frame.function_name().to_string(),
        })
        .collect();

    Some(records)
}
