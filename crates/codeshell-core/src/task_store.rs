use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::task::{
    normalize_tags, validate_hours, validate_title, NewTask, Priority, Status, Task, TaskError,
    TaskPatch,
};

pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub overdue: usize,
    /// Percentage in `[0, 100]`, full precision, `0.0` for an empty store.
    pub completion_rate: f64,
}

/// In-memory collection of tasks keyed by id.
///
/// Missing ids are reported through `Option`/`bool` returns; only malformed
/// input produces a [`TaskError`].
pub struct TaskStore {
    tasks: BTreeMap<String, Task>,
    next_id: u64,
    clock: Clock,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn create(&mut self, request: NewTask) -> Result<Task, TaskError> {
        validate_title(&request.title)?;
        validate_hours("estimated_hours", request.estimated_hours)?;

        let id = format!("task-{:03}", self.next_id);
        self.next_id += 1;
        let now = (self.clock)();
        let task = Task {
            id: id.clone(),
            title: request.title.trim().to_string(),
            description: request.description.unwrap_or_default(),
            priority: request.priority.unwrap_or_default(),
            status: Status::Todo,
            created_at: now,
            updated_at: now,
            due_date: request.due_date,
            tags: normalize_tags(request.tags),
            assignee: request.assignee,
            estimated_hours: request.estimated_hours,
            actual_hours: 0.0,
        };
        debug!(task_id = %id, "task created");
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Snapshot of every task; changes to the returned vector never reach the store.
    pub fn list(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Merges `patch` into the task named by `id`.
    ///
    /// Returns `Ok(None)` when no such task exists. `updated_at` never moves
    /// backwards even if the clock does.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Option<Task>, TaskError> {
        let now = (self.clock)();
        let Some(task) = self.tasks.get_mut(id) else {
            return Ok(None);
        };
        patch.validate()?;
        patch.apply(task);
        task.updated_at = now.max(task.updated_at);
        debug!(task_id = %id, "task updated");
        Ok(Some(task.clone()))
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.tasks.remove(id).is_some();
        if removed {
            debug!(task_id = %id, "task deleted");
        }
        removed
    }

    pub fn by_priority(&self, priority: Priority) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.priority == priority)
            .collect()
    }

    pub fn by_status(&self, status: Status) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.status == status)
            .collect()
    }

    pub fn by_assignee(&self, assignee: &str) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.assignee.as_deref() == Some(assignee))
            .collect()
    }

    /// Tasks with a due date strictly before `now` that are not done.
    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.is_overdue(now))
            .collect()
    }

    /// Tasks due in `[midnight, midnight + 1 day)` of `now`'s calendar day in
    /// `now`'s own time zone.
    pub fn due_today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<&Task> {
        let start = start_of_day(now).with_timezone(&Utc);
        let end = start + Duration::days(1);
        self.tasks
            .values()
            .filter(|task| {
                task.due_date
                    .map(|due| due >= start && due < end)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.matches(query))
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics_at((self.clock)())
    }

    pub fn statistics_at(&self, now: DateTime<Utc>) -> Statistics {
        let total = self.tasks.len();
        let completed = self.by_status(Status::Done).len();
        let in_progress = self.by_status(Status::InProgress).len();
        let overdue = self.overdue(now).len();
        let completion_rate = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Statistics {
            total,
            completed,
            in_progress,
            overdue,
            completion_rate,
        }
    }

    /// Sets `status` on every listed task; unknown ids are skipped.
    pub fn bulk_update_status<S: AsRef<str>>(&mut self, ids: &[S], status: Status) -> usize {
        let mut updated = 0;
        for id in ids {
            if let Ok(Some(_)) = self.update(id.as_ref(), TaskPatch::status(status)) {
                updated += 1;
            }
        }
        updated
    }

    /// Drops every task and restarts id numbering.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.next_id = 1;
    }
}

fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(start) => start,
        // Midnight skipped by a DST jump.
        None => now.clone() - now.time().signed_duration_since(NaiveTime::MIN),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use chrono::FixedOffset;

    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn ticking_clock(start: DateTime<Utc>) -> Clock {
        let ticks = Rc::new(Cell::new(0));
        Box::new(move || {
            let n = ticks.get();
            ticks.set(n + 1);
            start + Duration::seconds(n)
        })
    }

    fn due(title: &str, due_date: DateTime<Utc>) -> NewTask {
        NewTask {
            due_date: Some(due_date),
            ..NewTask::titled(title)
        }
    }

    #[test]
    fn create_assigns_defaults_and_equal_timestamps() {
        let mut store = TaskStore::new();
        let task = store.create(NewTask::titled("  Write docs ")).expect("create");
        assert_eq!(task.title, "Write docs");
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.actual_hours, 0.0);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.description.is_empty());
    }

    #[test]
    fn create_rejects_blank_title() {
        let mut store = TaskStore::new();
        assert_eq!(
            store.create(NewTask::titled("   ")),
            Err(TaskError::EmptyTitle)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut store = TaskStore::new();
        let first = store.create(NewTask::titled("a")).expect("a");
        assert!(store.delete(&first.id));
        let second = store.create(NewTask::titled("b")).expect("b");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn clear_resets_id_generation() {
        let mut store = TaskStore::new();
        let first = store.create(NewTask::titled("a")).expect("a");
        store.create(NewTask::titled("b")).expect("b");
        store.clear();
        assert!(store.list().is_empty());
        let again = store.create(NewTask::titled("c")).expect("c");
        assert_eq!(again.id, first.id);
    }

    #[test]
    fn update_refreshes_updated_at_and_keeps_other_fields() {
        let mut store = TaskStore::with_clock(ticking_clock(at("2026-03-01T09:00:00Z")));
        let created = store
            .create(NewTask {
                description: Some("first pass".to_string()),
                tags: vec!["docs".to_string()],
                ..NewTask::titled("Write docs")
            })
            .expect("create");

        let patch = TaskPatch {
            priority: Some(Priority::Urgent),
            assignee: Some(Some("sam".to_string())),
            ..TaskPatch::default()
        };
        let updated = store.update(&created.id, patch).expect("valid").expect("found");

        assert_eq!(updated.priority, Priority::Urgent);
        assert_eq!(updated.assignee.as_deref(), Some("sam"));
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.description, created.description);
        assert_eq!(updated.tags, created.tags);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(store.get(&created.id), Some(&updated));
    }

    #[test]
    fn update_never_moves_updated_at_backwards() {
        let now = at("2026-03-01T09:00:00Z");
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut store = TaskStore::with_clock(Box::new(move || {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                now
            } else {
                now - Duration::hours(1)
            }
        }));
        let task = store.create(NewTask::titled("skew")).expect("create");
        let updated = store
            .update(&task.id, TaskPatch::status(Status::Review))
            .expect("valid")
            .expect("found");
        assert!(updated.updated_at >= updated.created_at);
    }

    #[test]
    fn update_and_delete_missing_ids_leave_store_untouched() {
        let mut store = TaskStore::new();
        let task = store.create(NewTask::titled("keep")).expect("create");
        let before = store.list();

        assert_eq!(
            store.update("task-999", TaskPatch::status(Status::Done)),
            Ok(None)
        );
        assert!(!store.delete("task-999"));
        assert_eq!(store.list(), before);
        assert_eq!(store.get(&task.id).map(|t| t.status), Some(Status::Todo));
    }

    #[test]
    fn update_rejects_negative_hours_without_mutating() {
        let mut store = TaskStore::new();
        let task = store.create(NewTask::titled("hours")).expect("create");
        let patch = TaskPatch {
            actual_hours: Some(-2.0),
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        assert!(store.update(&task.id, patch).is_err());
        assert_eq!(store.get(&task.id), Some(&task));
    }

    #[test]
    fn list_is_a_defensive_copy() {
        let mut store = TaskStore::new();
        store.create(NewTask::titled("a")).expect("a");
        let mut listed = store.list();
        listed[0].title = "changed".to_string();
        listed.clear();
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].title, "a");
    }

    #[test]
    fn overdue_skips_done_tasks() {
        let now = at("2026-03-10T12:00:00Z");
        let mut store = TaskStore::new();
        let late = store
            .create(due("late", now - Duration::days(2)))
            .expect("late");
        let finished = store
            .create(due("finished", now - Duration::days(2)))
            .expect("finished");
        store
            .create(due("future", now + Duration::days(2)))
            .expect("future");
        store.create(NewTask::titled("undated")).expect("undated");
        store
            .update(&finished.id, TaskPatch::status(Status::Done))
            .expect("valid");

        let ids: Vec<&str> = store.overdue(now).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![late.id.as_str()]);
    }

    #[test]
    fn due_today_uses_half_open_day() {
        let now = at("2026-03-10T15:30:00Z");
        let mut store = TaskStore::new();
        let morning = store
            .create(due("morning", at("2026-03-10T00:00:00Z")))
            .expect("morning");
        let night = store
            .create(due("night", at("2026-03-10T23:59:59Z")))
            .expect("night");
        store
            .create(due("tomorrow", at("2026-03-11T00:00:00Z")))
            .expect("tomorrow");
        store
            .create(due("yesterday", at("2026-03-09T23:59:59Z")))
            .expect("yesterday");

        let ids: Vec<&str> = store.due_today(&now).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![morning.id.as_str(), night.id.as_str()]);
    }

    #[test]
    fn due_today_respects_the_callers_time_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        // 01:00 local on the 11th is 23:00 UTC on the 10th.
        let now = tz
            .with_ymd_and_hms(2026, 3, 11, 1, 0, 0)
            .single()
            .expect("local time");
        let mut store = TaskStore::new();
        let local_today = store
            .create(due("local", at("2026-03-10T22:30:00Z")))
            .expect("local");
        store
            .create(due("local yesterday", at("2026-03-10T21:59:59Z")))
            .expect("yesterday");

        let ids: Vec<&str> = store.due_today(&now).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![local_today.id.as_str()]);
    }

    #[test]
    fn search_matches_title_description_and_tags() {
        let mut store = TaskStore::new();
        store
            .create(NewTask {
                description: Some("Refactor the PARSER".to_string()),
                ..NewTask::titled("cleanup")
            })
            .expect("description");
        store
            .create(NewTask {
                tags: vec!["Parser".to_string()],
                ..NewTask::titled("tagged")
            })
            .expect("tag");
        store.create(NewTask::titled("Parser tests")).expect("title");
        store.create(NewTask::titled("unrelated")).expect("other");

        assert_eq!(store.search("parser").len(), 3);
        assert!(store.search("nothing").is_empty());
    }

    #[test]
    fn filters_by_priority_status_and_assignee() {
        let mut store = TaskStore::new();
        let urgent = store
            .create(NewTask {
                priority: Some(Priority::Urgent),
                assignee: Some("ana".to_string()),
                ..NewTask::titled("hotfix")
            })
            .expect("urgent");
        store.create(NewTask::titled("routine")).expect("routine");
        store
            .update(&urgent.id, TaskPatch::status(Status::InProgress))
            .expect("valid");

        assert_eq!(store.by_priority(Priority::Urgent).len(), 1);
        assert_eq!(store.by_priority(Priority::Medium).len(), 1);
        assert_eq!(store.by_status(Status::InProgress)[0].id, urgent.id);
        assert_eq!(store.by_assignee("ana")[0].id, urgent.id);
        assert!(store.by_assignee("bob").is_empty());
    }

    #[test]
    fn statistics_reports_completion_rate() {
        let now = at("2026-03-10T12:00:00Z");
        let mut store = TaskStore::new();
        assert_eq!(store.statistics_at(now).completion_rate, 0.0);

        let a = store.create(NewTask::titled("a")).expect("a");
        let b = store
            .create(due("b", now - Duration::days(1)))
            .expect("b");
        store.create(NewTask::titled("c")).expect("c");
        store
            .update(&a.id, TaskPatch::status(Status::Done))
            .expect("valid");
        store
            .update(&b.id, TaskPatch::status(Status::InProgress))
            .expect("valid");

        let stats = store.statistics_at(now);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_rate, 1.0 / 3.0 * 100.0);
    }

    #[test]
    fn bulk_update_counts_only_existing_ids() {
        let mut store = TaskStore::new();
        let a = store.create(NewTask::titled("a")).expect("a");
        let b = store.create(NewTask::titled("b")).expect("b");
        let updated = store.bulk_update_status(
            &[a.id.as_str(), "task-404", b.id.as_str()],
            Status::Cancelled,
        );
        assert_eq!(updated, 2);
        assert_eq!(store.by_status(Status::Cancelled).len(), 2);
    }
}
