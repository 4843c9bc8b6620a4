use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::record::{Priority, TaskRecord};

/// Selection criterion of the filter view.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PriorityFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl PriorityFilter {
    pub fn admits(self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Low => priority == Priority::Low,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::High => priority == Priority::High,
        }
    }
}

impl From<Priority> for PriorityFilter {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => PriorityFilter::Low,
            Priority::Medium => PriorityFilter::Medium,
            Priority::High => PriorityFilter::High,
        }
    }
}

/// The records admitted by `criterion`, in their original order.
pub fn filter_view(records: &[TaskRecord], criterion: PriorityFilter) -> Vec<&TaskRecord> {
    records
        .iter()
        .filter(|record| criterion.admits(record.priority))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::record::TaskFields;

    fn records(priorities: &[Priority]) -> Vec<TaskRecord> {
        priorities
            .iter()
            .enumerate()
            .map(|(i, priority)| {
                TaskRecord::from_fields(
                    format!("{:04}", i),
                    TaskFields::new(format!("task {}", i), "d").with_priority(*priority),
                    "ann@example.com".to_string(),
                    Utc::now(),
                )
            })
            .collect()
    }

    fn ids(view: Vec<&TaskRecord>) -> Vec<&str> {
        view.into_iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn high_keeps_relative_order() {
        let state = records(&[Priority::Low, Priority::High, Priority::High]);
        assert_eq!(
            ids(filter_view(&state, PriorityFilter::High)),
            vec!["0001", "0002"]
        );
    }

    #[test]
    fn all_returns_everything_unchanged() {
        let state = records(&[Priority::Medium, Priority::Low, Priority::High]);
        let view = filter_view(&state, PriorityFilter::All);
        assert_eq!(view.len(), state.len());
        assert!(view.iter().zip(state.iter()).all(|(a, b)| *a == b));
    }

    #[test]
    fn each_criterion_admits_exactly_its_priority() {
        let state = records(&[
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Low,
            Priority::Medium,
        ]);
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            let view = filter_view(&state, priority.into());
            let expected: Vec<&TaskRecord> =
                state.iter().filter(|r| r.priority == priority).collect();
            assert_eq!(view, expected);
        }
    }

    #[test]
    fn empty_state_gives_empty_view() {
        assert!(filter_view(&[], PriorityFilter::Low).is_empty());
    }

    #[test]
    fn criterion_parses_from_text() {
        assert_eq!("all".parse::<PriorityFilter>().unwrap(), PriorityFilter::All);
        assert_eq!("High".parse::<PriorityFilter>().unwrap(), PriorityFilter::High);
    }
}
