// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-action-type tables: required draft fields and hold windows.

use serde_json::Value;

use maitred_config::model::HoldConfig;
use maitred_core::{ActionType, MaitredError};

/// `action_data` keys that must be present before a draft can dispatch.
pub fn required_fields(action_type: ActionType) -> &'static [&'static str] {
    match action_type {
        ActionType::Taxi => &["pickup", "dropoff"],
        ActionType::Supplies => &["items", "deliver_to"],
        ActionType::Reservation => &["party_size", "reserved_for"],
        ActionType::Activity => &["activity_name", "scheduled_for"],
        ActionType::Experience => &["experience_name", "scheduled_for"],
    }
}

/// Hold window for an action type, in seconds.
pub fn hold_window_secs(holds: &HoldConfig, action_type: ActionType) -> i64 {
    match action_type {
        ActionType::Taxi => holds.taxi_secs,
        ActionType::Reservation => holds.reservation_secs,
        ActionType::Activity => holds.activity_secs,
        ActionType::Experience => holds.experience_secs,
        ActionType::Supplies => holds.supplies_secs,
    }
}

/// Check `action_data` against the action type's required keys.
///
/// Null counts as missing; the error names every absent key at once.
pub fn validate_action_data(action_type: ActionType, data: &Value) -> Result<(), MaitredError> {
    let obj = data.as_object().ok_or_else(|| {
        MaitredError::Validation(format!("action_data for {action_type} must be an object"))
    })?;
    let missing: Vec<&str> = required_fields(action_type)
        .iter()
        .copied()
        .filter(|key| obj.get(*key).is_none_or(Value::is_null))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MaitredError::Validation(format!(
            "{action_type} request is missing required fields: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_action_type_has_required_fields() {
        for action_type in [
            ActionType::Taxi,
            ActionType::Supplies,
            ActionType::Reservation,
            ActionType::Activity,
            ActionType::Experience,
        ] {
            assert!(!required_fields(action_type).is_empty());
        }
    }

    #[test]
    fn complete_taxi_data_passes() {
        let data = json!({ "pickup": "Pier 7", "dropoff": "Hotel Mar", "notes": "two bags" });
        validate_action_data(ActionType::Taxi, &data).unwrap();
    }

    #[test]
    fn missing_fields_are_all_named() {
        let err = validate_action_data(ActionType::Taxi, &json!({})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pickup"), "{msg}");
        assert!(msg.contains("dropoff"), "{msg}");
    }

    #[test]
    fn null_counts_as_missing() {
        let data = json!({ "pickup": "Pier 7", "dropoff": null });
        let err = validate_action_data(ActionType::Taxi, &data).unwrap_err();
        assert!(err.to_string().contains("dropoff"));
    }

    #[test]
    fn non_object_data_is_rejected() {
        let err = validate_action_data(ActionType::Taxi, &json!("pier 7")).unwrap_err();
        assert!(matches!(err, MaitredError::Validation(_)));
    }

    #[test]
    fn hold_windows_follow_config() {
        let holds = HoldConfig::default();
        // Taxi is the tightest window, supplies the loosest.
        assert!(hold_window_secs(&holds, ActionType::Taxi)
            < hold_window_secs(&holds, ActionType::Supplies));
        assert_eq!(hold_window_secs(&holds, ActionType::Taxi), 600);
        assert_eq!(hold_window_secs(&holds, ActionType::Supplies), 14_400);
    }
}
