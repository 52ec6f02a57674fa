//! Helpers for the condition list of an abnormal status.

use super::abnormal::{AbnormalCondition, AbnormalStatus, ConditionType};
use super::meta::now;

/// Finds the condition of the given type.
///
/// Returns its position in the list together with the condition, or `None`
/// when no condition of that type is present.
pub fn get_condition(
    status: &AbnormalStatus,
    condition_type: ConditionType,
) -> Option<(usize, &AbnormalCondition)> {
    status
        .conditions
        .iter()
        .enumerate()
        .find(|(_, c)| c.condition_type == condition_type)
}

/// Upserts a condition by type.
///
/// An existing condition with the same status is left untouched. When the
/// status differs, the status, reason and message are replaced and the
/// transition time is reset. A condition of a new type is appended with the
/// current time. Returns whether the list changed.
pub fn update_condition(status: &mut AbnormalStatus, mut condition: AbnormalCondition) -> bool {
    condition.last_transition_time = Some(now());

    match status
        .conditions
        .iter_mut()
        .find(|c| c.condition_type == condition.condition_type)
    {
        None => {
            status.conditions.push(condition);
            true
        }
        Some(existing) if existing.status == condition.status => false,
        Some(existing) => {
            *existing = condition;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::abnormal::ConditionStatus;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn identified(status: ConditionStatus) -> AbnormalCondition {
        AbnormalCondition::new(ConditionType::Identified, status).with_reason("r", "m")
    }

    #[test]
    fn test_get_condition_absent() {
        let status = AbnormalStatus::default();
        assert!(get_condition(&status, ConditionType::Recovered).is_none());
    }

    #[test]
    fn test_get_condition_returns_position() {
        let mut status = AbnormalStatus::default();
        update_condition(
            &mut status,
            AbnormalCondition::new(ConditionType::InformationCollected, ConditionStatus::True),
        );
        update_condition(&mut status, identified(ConditionStatus::True));

        let (index, condition) = get_condition(&status, ConditionType::Identified).unwrap();
        assert_eq!(index, 1);
        assert_eq!(condition.status, ConditionStatus::True);
    }

    #[test]
    fn test_update_appends_new_type() {
        let mut status = AbnormalStatus::default();

        assert!(update_condition(&mut status, identified(ConditionStatus::True)));
        assert_eq!(status.conditions.len(), 1);
        assert!(status.conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_update_with_same_status_is_noop() {
        let mut status = AbnormalStatus::default();
        update_condition(&mut status, identified(ConditionStatus::True));
        let before = status.clone();

        let changed = update_condition(
            &mut status,
            AbnormalCondition::new(ConditionType::Identified, ConditionStatus::True)
                .with_reason("other", "other message"),
        );

        assert!(!changed);
        assert_eq!(status, before);
    }

    #[test]
    fn test_update_replaces_changed_status() {
        let mut status = AbnormalStatus::default();
        update_condition(&mut status, identified(ConditionStatus::True));

        let changed = update_condition(
            &mut status,
            AbnormalCondition::new(ConditionType::Identified, ConditionStatus::False)
                .with_reason("NotIdentified", "no diagnoser matched"),
        );

        assert!(changed);
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, ConditionStatus::False);
        assert_eq!(status.conditions[0].reason, "NotIdentified");
    }

    #[test]
    fn test_update_advances_transition_time_in_place() {
        // GIVEN an old Identified condition between two others
        let old = DateTime::parse_from_rfc3339("2000-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut status = AbnormalStatus::default();
        update_condition(
            &mut status,
            AbnormalCondition::new(ConditionType::InformationCollected, ConditionStatus::True),
        );
        update_condition(&mut status, identified(ConditionStatus::True));
        update_condition(
            &mut status,
            AbnormalCondition::new(ConditionType::Recovered, ConditionStatus::Unknown),
        );
        status.conditions[1].last_transition_time = Some(old);

        // WHEN its status flips
        assert!(update_condition(&mut status, identified(ConditionStatus::False)));

        // THEN it stays in place with a newer transition time
        let (index, condition) = get_condition(&status, ConditionType::Identified).unwrap();
        assert_eq!(index, 1);
        assert_eq!(condition.status, ConditionStatus::False);
        assert!(condition.last_transition_time.unwrap() > old);
        assert_eq!(status.conditions.len(), 3);
    }

    fn condition_type() -> impl Strategy<Value = ConditionType> {
        prop_oneof![
            Just(ConditionType::InformationCollected),
            Just(ConditionType::Identified),
            Just(ConditionType::Recovered),
        ]
    }

    fn condition_status() -> impl Strategy<Value = ConditionStatus> {
        prop_oneof![
            Just(ConditionStatus::True),
            Just(ConditionStatus::False),
            Just(ConditionStatus::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_condition_per_type(
            updates in prop::collection::vec((condition_type(), condition_status()), 0..32)
        ) {
            let mut status = AbnormalStatus::default();
            for (t, s) in updates {
                update_condition(&mut status, AbnormalCondition::new(t, s));
            }
            for t in [ConditionType::InformationCollected, ConditionType::Identified, ConditionType::Recovered] {
                let count = status.conditions.iter().filter(|c| c.condition_type == t).count();
                prop_assert!(count <= 1);
            }
        }

        #[test]
        fn prop_repeated_update_is_idempotent(t in condition_type(), s in condition_status()) {
            let mut status = AbnormalStatus::default();
            prop_assert!(update_condition(&mut status, AbnormalCondition::new(t, s)));
            let after_first = status.clone();
            prop_assert!(!update_condition(&mut status, AbnormalCondition::new(t, s)));
            prop_assert_eq!(status, after_first);
        }
    }
}
