//! Service-level arithmetic over the day's call records.

use std::collections::HashMap;

use crate::models::call::CallRecord;
use crate::models::service_level::ServiceLevel;

use super::Thresholds;

/// Compute the service-level block for today's calls.
///
/// With no calls the percentage is 100: nobody waited beyond target.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Call counts are far below 2^52.
pub fn compute_service_level(calls: &[CallRecord], thresholds: &Thresholds) -> ServiceLevel {
    let total_calls = u32::try_from(calls.len()).unwrap_or(u32::MAX);
    let within_target = calls
        .iter()
        .filter(|c| c.answered && c.wait_seconds <= thresholds.service_level_target_seconds)
        .count();
    let calls_answered_within_target = u32::try_from(within_target).unwrap_or(u32::MAX);

    let percentage = if total_calls == 0 {
        100.0
    } else {
        (f64::from(calls_answered_within_target) * 100.0 / f64::from(total_calls)).clamp(0.0, 100.0)
    };

    let total_queue_time: u64 = calls.iter().map(|c| u64::from(c.wait_seconds)).sum();
    let average_wait_time = if calls.is_empty() {
        0.0
    } else {
        total_queue_time as f64 / calls.len() as f64
    };
    let peak_wait_time = calls.iter().map(|c| c.wait_seconds).max().unwrap_or(0);
    let daily_limit_breached = daily_queue_time(calls)
        .values()
        .any(|total| *total > thresholds.daily_queue_time_limit_seconds);

    ServiceLevel {
        total_calls,
        calls_answered_within_target,
        percentage,
        target_percentage: thresholds.service_level_target_percent,
        meets_target: percentage >= thresholds.service_level_target_percent,
        average_wait_time,
        peak_wait_time,
        total_queue_time,
        daily_limit_breached,
    }
}

/// Cumulative wait per queue across the given calls.
#[must_use]
pub fn daily_queue_time(calls: &[CallRecord]) -> HashMap<String, u64> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for call in calls {
        *totals.entry(call.queue_id.clone()).or_default() += u64::from(call.wait_seconds);
    }
    totals
}
