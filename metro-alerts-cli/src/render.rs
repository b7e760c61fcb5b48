//! Text rendering of alert state changes

use chrono::{DateTime, Utc};
use suspension_channel::{AlertState, ConnectionState, Suspension};

/// One line describing the state, as shown after each change
pub fn describe(state: &AlertState, now: DateTime<Utc>) -> String {
    let connection = match (&state.connection_state, &state.last_error) {
        (ConnectionState::Error, Some(error)) => format!("live updates unavailable ({error})"),
        (ConnectionState::Error, None) => "live updates unavailable".to_string(),
        (other, _) => other.to_string(),
    };

    match &state.suspension {
        Some(suspension) => format!("[{connection}] {}", describe_suspension(suspension, now)),
        None => format!("[{connection}] no active suspensions"),
    }
}

fn describe_suspension(suspension: &Suspension, now: DateTime<Utc>) -> String {
    let restore = suspension
        .expected_restore_time
        .format("%Y-%m-%d %H:%M UTC");
    let overdue = if suspension.is_overdue(now) {
        " (overdue)"
    } else {
        ""
    };

    format!(
        "{} line {}: {} - {} (restore by {}){}",
        suspension.suspension_type,
        suspension.metro_line_id,
        suspension.title,
        suspension.description,
        restore,
        overdue
    )
}

/// JSON rendering for log shippers and scripts
pub fn to_json(state: &AlertState) -> serde_json::Result<String> {
    serde_json::to_string(state)
}
