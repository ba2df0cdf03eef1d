//! Aging policy: decides effective priority and dispatch order.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};

use crate::domain::Task;

/// Anti-starvation aging.
///
/// effective = stated priority + floor(age_secs / aging_factor_secs)
///
/// Example with aging_factor_secs=60:
/// - priority 1, age 0s: 1
/// - priority 1, age 59s: 1
/// - priority 1, age 60s: 2
/// - priority 1, age 600s: 11 (outranks any fresh priority 10 task)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingPolicy {
    /// Seconds of waiting per bonus point. Never zero (config validation).
    pub aging_factor_secs: u64,
}

impl AgingPolicy {
    pub fn new(aging_factor_secs: u64) -> Self {
        Self {
            aging_factor_secs: aging_factor_secs.max(1),
        }
    }

    /// Bonus earned by waiting since `created_at`. Future timestamps earn nothing.
    pub fn aging_bonus(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let age_secs = (now - created_at).num_seconds().max(0) as u64;
        age_secs / self.aging_factor_secs
    }

    pub fn effective_priority(&self, task: &Task, now: DateTime<Utc>) -> u64 {
        u64::from(task.priority.get()) + self.aging_bonus(task.created_at, now)
    }

    /// Order `tasks` for presentation and dispatch.
    ///
    /// `tasks` must be in insertion order. Sort keys:
    /// 1. effective priority, descending
    /// 2. stated priority, descending
    /// 3. insertion order (stable sort keeps earlier first)
    pub fn order(&self, tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
        let mut ordered = tasks.to_vec();
        ordered.sort_by_key(|t| (Reverse(self.effective_priority(t, now)), Reverse(t.priority)));
        ordered
    }

    /// The task a scheduler should pick next, if any.
    pub fn top<'a>(&self, tasks: &'a [Task], now: DateTime<Utc>) -> Option<&'a Task> {
        // max_by_key returns the last max; scan in reverse so the earliest wins ties.
        tasks
            .iter()
            .rev()
            .max_by_key(|t| (self.effective_priority(t, now), t.priority))
    }
}

impl Default for AgingPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_AGING_FACTOR_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskId};
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn task(name: &str, priority: u8, created_secs: i64) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            name,
            Priority::new(priority).unwrap(),
            t0() + Duration::seconds(created_secs),
        )
    }

    #[rstest]
    #[case::fresh(0, 1)]
    #[case::just_below_window(59, 1)]
    #[case::one_window(60, 2)]
    #[case::ten_windows(600, 11)]
    fn bonus_grows_by_whole_windows(#[case] age_secs: i64, #[case] expected: u64) {
        let policy = AgingPolicy::new(60);
        let t = task("a", 1, 0);
        assert_eq!(
            policy.effective_priority(&t, t0() + Duration::seconds(age_secs)),
            expected
        );
    }

    #[test]
    fn effective_never_below_stated_and_never_decreases() {
        let policy = AgingPolicy::new(7);
        let t = task("a", 4, 0);
        let mut last = 0;
        for secs in (-10..500).step_by(3) {
            let eff = policy.effective_priority(&t, t0() + Duration::seconds(secs));
            assert!(eff >= 4);
            assert!(eff >= last);
            last = eff;
        }
    }

    #[test]
    fn aging_eventually_overtakes_freshly_submitted_high_priority() {
        let policy = AgingPolicy::new(60);
        let old_low = task("low", 1, 0);

        // first instant at which a priority 10 task submitted right then loses to old_low
        let overtake = (0..2000)
            .map(|s| t0() + Duration::seconds(s))
            .find(|now| {
                let fresh_high = Task::new(
                    TaskId::from_ulid(Ulid::new()),
                    "high",
                    Priority::MAX,
                    *now,
                );
                policy.effective_priority(&old_low, *now) > policy.effective_priority(&fresh_high, *now)
            })
            .unwrap();

        assert_eq!(overtake, t0() + Duration::seconds(600));
    }

    #[rstest]
    #[case::before_overtake(599, "high")]
    #[case::at_overtake(600, "low")]
    fn top_dispatches_aged_task_over_fresh_high(#[case] at_secs: i64, #[case] expected: &str) {
        let policy = AgingPolicy::new(60);
        // high is submitted at the comparison instant, after low
        let tasks = vec![task("low", 1, 0), task("high", 10, at_secs)];

        let now = t0() + Duration::seconds(at_secs);
        assert_eq!(policy.top(&tasks, now).unwrap().name, expected);
        assert_eq!(policy.order(&tasks, now)[0].name, expected);
    }

    #[test]
    fn order_sorts_by_effective_priority() {
        let policy = AgingPolicy::new(60);
        let tasks = vec![task("Low", 1, 0), task("High", 10, 0), task("Medium", 5, 0)];

        let names: Vec<_> = policy.order(&tasks, t0()).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["High", "Medium", "Low"]);
    }

    #[test]
    fn old_task_is_boosted_above_new_high() {
        // aggressive aging: 1 point per second
        let policy = AgingPolicy::new(1);
        let tasks = vec![task("Old Low Priority", 1, -120), task("New High Priority", 5, 0)];

        let ordered = policy.order(&tasks, t0());
        assert_eq!(ordered[0].name, "Old Low Priority");
        assert_eq!(policy.top(&tasks, t0()).unwrap().name, "Old Low Priority");
    }

    #[test]
    fn ties_break_on_stated_priority_then_insertion() {
        let policy = AgingPolicy::new(60);
        // effective: a=5, b=5 (4 + 1 window), c=5, d=5
        let tasks = vec![
            task("a", 5, 0),
            task("b", 4, -60),
            task("c", 5, 0),
            task("d", 4, -60),
        ];

        let names: Vec<_> = policy.order(&tasks, t0()).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "c", "b", "d"]);
        assert_eq!(policy.top(&tasks, t0()).unwrap().name, "a");

        // repeated calls at the same instant agree
        assert_eq!(policy.order(&tasks, t0()), policy.order(&tasks, t0()));
    }

    #[test]
    fn top_of_empty_is_none() {
        assert!(AgingPolicy::default().top(&[], t0()).is_none());
    }
}
