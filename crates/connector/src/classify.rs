//! Relevance predicate for inbound live frames
//!
//! The feed schema is not fixed, so this is a loose heuristic, read as an
//! if/else chain:
//! - when the nested `data` object carries the `programId` of a known [`Dex`],
//!   the frame is kept only if `data.type == "trade"`;
//! - otherwise it is kept when it carries any identifying field (`signature`,
//!   `mintAddress`, `txId`, `mint`) at the top level or one level under `data`.
//!
//! A `data` value that is present but not an object makes the frame
//! unclassifiable and it is dropped.

use serde_json::{Map, Value};

use crate::dex::Dex;
use crate::format::is_truthy;

const IDENTIFYING_FIELDS: [&str; 4] = ["signature", "mintAddress", "txId", "mint"];

/// Whether an inbound frame should be buffered
pub fn is_relevant(event: &Value) -> bool {
    let Some(top) = event.as_object() else {
        return false;
    };
    let nested = match top.get("data") {
        Some(Value::Object(nested)) => Some(nested),
        Some(_) => return false,
        None => None,
    };

    if let Some(data) = nested.filter(|data| has_known_program(data)) {
        return data.get("type").and_then(Value::as_str) == Some("trade");
    }

    has_identifying_field(top) || nested.is_some_and(has_identifying_field)
}

fn has_known_program(data: &Map<String, Value>) -> bool {
    data.get("programId")
        .and_then(Value::as_str)
        .and_then(Dex::from_program_id)
        .is_some()
}

fn has_identifying_field(scope: &Map<String, Value>) -> bool {
    IDENTIFYING_FIELDS
        .iter()
        .any(|key| scope.get(*key).is_some_and(is_truthy))
}
