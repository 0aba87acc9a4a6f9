//! Mapping from upstream JSON to typed records.
//!
//! Upstream payloads are loosely shaped: lists arrive bare or wrapped in a
//! keyed envelope, field names come in camelCase or snake_case, and ids may
//! be numbers or strings. Items that lack an id are skipped; when an id
//! repeats within one payload the last occurrence wins.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::agent::{AgentState, AgentStatus};
use crate::models::call::CallRecord;
use crate::models::queue::QueueReading;

/// Pull the item list out of a payload, accepting a bare array or any of
/// `wrappers` (tried in order, then `data`).
#[must_use]
pub fn extract_list<'a>(payload: &'a Value, wrappers: &[&str]) -> &'a [Value] {
    if let Value::Array(items) = payload {
        return items;
    }
    wrappers
        .iter()
        .chain(std::iter::once(&"data"))
        .find_map(|key| payload.get(*key).and_then(Value::as_array))
        .map_or(&[][..], Vec::as_slice)
}

/// Map every agent in an `agents/state` payload.
#[must_use]
pub fn agents_from_payload(payload: &Value, now: DateTime<Utc>) -> Vec<AgentState> {
    let agents = map_items(extract_list(payload, &["agents"]), "agent", |v| {
        agent_from_value(v, now)
    });
    dedupe_by_id(agents, "agent", |a| &a.agent_id)
}

/// Map every queue in a `services/state` payload.
#[must_use]
pub fn queues_from_payload(payload: &Value) -> Vec<QueueReading> {
    let queues = map_items(extract_list(payload, &["services", "queues"]), "queue", queue_from_value);
    dedupe_by_id(queues, "queue", |q| &q.queue_id)
}

/// Map every call in a `services/cases` payload.
#[must_use]
pub fn calls_from_payload(payload: &Value) -> Vec<CallRecord> {
    map_items(extract_list(payload, &["cases", "calls"]), "call", call_from_value)
}

fn map_items<T>(items: &[Value], what: &str, f: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    let mapped: Vec<T> = items.iter().filter_map(f).collect();
    let skipped = items.len() - mapped.len();
    if skipped > 0 {
        warn!(what, skipped, "skipped upstream items without an id");
    }
    mapped
}

/// Collapse repeated ids, keeping the first position and the last value.
fn dedupe_by_id<T>(items: Vec<T>, what: &str, id: impl Fn(&T) -> &String) -> Vec<T> {
    let mut position: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    let mut duplicates = 0_usize;
    for item in items {
        let seen = position.get(id(&item)).copied();
        if let Some(at) = seen {
            unique[at] = item;
            duplicates += 1;
        } else {
            position.insert(id(&item).clone(), unique.len());
            unique.push(item);
        }
    }
    if duplicates > 0 {
        warn!(what, duplicates, "duplicate upstream ids, keeping the last occurrence");
    }
    unique
}

/// Map one agent object.
#[must_use]
pub fn agent_from_value(value: &Value, now: DateTime<Utc>) -> Option<AgentState> {
    let agent_id = id_field(value, &["id", "agentId", "agent_id"])?;
    let name = str_field(value, &["name", "displayName", "display_name", "firstName"])
        .unwrap_or_else(|| "Unknown".to_owned());
    let status = str_field(value, &["status", "state"])
        .map_or(AgentStatus::Unavailable, |s| AgentStatus::from_upstream(&s));
    Some(AgentState {
        agent_id,
        name,
        status,
        current_call_duration: u32_field(value, &["currentCallDuration", "current_call_duration"]),
        calls_handled_today: u32_field(value, &["callsHandledToday", "calls_handled_today"])
            .unwrap_or(0),
        average_call_time: f64_field(value, &["averageCallTime", "average_call_time"]),
        last_updated: now,
    })
}

/// Map one queue (service) object.
#[must_use]
pub fn queue_from_value(value: &Value) -> Option<QueueReading> {
    let queue_id = id_field(value, &["id", "serviceId", "service_id", "queueId", "queue_id"])?;
    let queue_name = str_field(value, &["name", "serviceName", "service_name", "queueName"])
        .unwrap_or_else(|| "Unknown Queue".to_owned());
    let current_wait_time =
        u32_field(value, &["currentWaitTime", "current_wait_time", "waitTime", "wait_time", "wait"])
            .unwrap_or(0);
    Some(QueueReading {
        queue_id,
        queue_name,
        current_wait_time,
        queue_depth: u32_field(value, &["queueDepth", "queue_depth", "queueLength"]).unwrap_or(0),
        calls_waiting: u32_field(value, &["callsWaiting", "calls_waiting", "queueSize"])
            .unwrap_or(0),
        average_wait_time: f64_field(value, &["averageWaitTime", "average_wait_time"])
            .unwrap_or(0.0),
        longest_wait_time: u32_field(value, &["longestWaitTime", "longest_wait_time"])
            .unwrap_or(current_wait_time),
    })
}

/// Map one case object.
///
/// A case counts as answered unless it is flagged abandoned or carries an
/// explicit `answered: false`.
#[must_use]
pub fn call_from_value(value: &Value) -> Option<CallRecord> {
    let queue_id = id_field(
        value,
        &["serviceId", "service_id", "queueId", "queue_id", "service", "queue"],
    )?;
    let wait_seconds = u32_field(value, &["waitTime", "wait_time", "queueTime", "queue_time"])
        .unwrap_or(0);
    let abandoned = bool_field(value, &["abandoned"]).unwrap_or(false)
        || str_field(value, &["status", "state", "outcome"])
            .is_some_and(|s| s.eq_ignore_ascii_case("abandoned"));
    let answered = bool_field(value, &["answered"]).unwrap_or(true) && !abandoned;
    Some(CallRecord {
        queue_id,
        wait_seconds,
        answered,
    })
}

fn first<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| value.get(*k).filter(|v| !v.is_null()))
}

fn id_field(value: &Value, keys: &[&str]) -> Option<String> {
    match first(value, keys)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    first(value, keys)?.as_str().map(str::to_owned)
}

fn f64_field(value: &Value, keys: &[&str]) -> Option<f64> {
    match first(value, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped first.
fn u32_field(value: &Value, keys: &[&str]) -> Option<u32> {
    f64_field(value, keys)
        .filter(|n| n.is_finite())
        .map(|n| n.clamp(0.0, f64::from(u32::MAX)).round() as u32)
}

fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    first(value, keys)?.as_bool()
}
