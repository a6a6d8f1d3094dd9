use agenda_core::clock::parse_timestamp;
use agenda_core::{
    DueTaskSource, Importance, ManualClock, NewTask, ReminderMatcher, TaskPatch, TaskStore,
};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn matcher_at(now: &str) -> (TempDir, TaskStore, ReminderMatcher, Arc<ManualClock>) {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::at(now).unwrap());
    let store = TaskStore::open(dir.path().join("agenda.sqlite3"), clock.clone()).unwrap();
    let matcher = ReminderMatcher::new(store.clone());
    (dir, store, matcher, clock)
}

fn ts(text: &str) -> chrono::NaiveDateTime {
    parse_timestamp(text).unwrap()
}

fn due_ids(matcher: &ReminderMatcher) -> Vec<i64> {
    matcher.due_now().unwrap().iter().map(|task| task.id).collect()
}

#[test]
fn recurring_task_fires_only_on_its_minute() {
    let (_dir, store, matcher, clock) = matcher_at("2024-01-01 08:00:00");
    let id = store
        .create(
            &NewTask::new("standup")
                .with_reminder(ts("2024-01-01 09:00:00"))
                .recurring(),
        )
        .unwrap();

    clock.set(ts("2024-06-15 09:00:00"));
    assert_eq!(due_ids(&matcher), vec![id]);
    assert_eq!(due_ids(&matcher), vec![id]);

    clock.set(ts("2024-06-15 09:01:00"));
    assert!(due_ids(&matcher).is_empty());

    clock.set(ts("2024-06-16 09:00:30"));
    assert_eq!(due_ids(&matcher), vec![id]);
}

#[test]
fn recurring_task_waits_for_its_start_date() {
    let (_dir, store, matcher, clock) = matcher_at("2024-01-01 08:00:00");
    store
        .create(
            &NewTask::new("pills")
                .with_reminder(ts("2024-03-01 09:00:00"))
                .recurring(),
        )
        .unwrap();

    clock.set(ts("2024-02-29 09:00:00"));
    assert!(due_ids(&matcher).is_empty());
    clock.set(ts("2024-03-01 09:00:00"));
    assert_eq!(due_ids(&matcher).len(), 1);
}

#[test]
fn future_one_shot_task_fires_once_its_instant_passes() {
    let (_dir, store, matcher, clock) = matcher_at("2098-12-31 23:58:00");
    let id = store
        .create(&NewTask::new("new century").with_reminder(ts("2099-01-01 00:00:00")))
        .unwrap();

    assert!(due_ids(&matcher).is_empty());
    clock.advance(Duration::from_secs(60));
    assert!(due_ids(&matcher).is_empty());
    clock.advance(Duration::from_secs(60));
    assert_eq!(due_ids(&matcher), vec![id]);
    clock.advance(Duration::from_secs(3_600));
    assert_eq!(due_ids(&matcher), vec![id]);
}

#[test]
fn completed_task_is_never_due() {
    let (_dir, store, matcher, _clock) = matcher_at("2024-06-15 09:00:00");
    let one_shot = store
        .create(&NewTask::new("overdue").with_reminder(ts("2024-06-01 09:00:00")))
        .unwrap();
    let daily = store
        .create(
            &NewTask::new("daily")
                .with_reminder(ts("2024-01-01 09:00:00"))
                .recurring(),
        )
        .unwrap();
    assert_eq!(due_ids(&matcher).len(), 2);

    store.mark_completed(one_shot).unwrap();
    store.mark_completed(daily).unwrap();

    assert!(due_ids(&matcher).is_empty());
    assert!(store.read_pending().unwrap().is_empty());
}

#[test]
fn due_tasks_carry_notification_fields() {
    let (_dir, store, matcher, _clock) = matcher_at("2024-06-15 09:00:00");
    let id = store
        .create(
            &NewTask::new("pay rent")
                .with_description("transfer")
                .with_reminder(ts("2024-06-15 08:00:00"))
                .with_importance(Importance::Urgent)
                .with_notify(false),
        )
        .unwrap();

    let due = matcher.due_now().unwrap();
    assert_eq!(due.len(), 1);
    let task = &due[0];
    assert_eq!(task.id, id);
    assert_eq!(task.title, "pay rent");
    assert_eq!(task.description.as_deref(), Some("transfer"));
    assert_eq!(task.reminder_at, "2024-06-15 08:00:00");
    assert!(!task.notify);
    assert_eq!(task.importance, Importance::Urgent);
    assert!(!task.recurring);
}

#[test]
fn tasks_without_reminder_are_ignored() {
    let (_dir, store, matcher, _clock) = matcher_at("2024-06-15 09:00:00");
    let id = store
        .create(&NewTask::new("someday").with_reminder(ts("2024-06-15 08:00:00")))
        .unwrap();
    store
        .update(
            id,
            &TaskPatch {
                reminder_at: Some(None),
                ..TaskPatch::default()
            },
        )
        .unwrap();

    assert!(due_ids(&matcher).is_empty());
}

#[test]
fn malformed_stored_reminders_are_skipped_or_prefix_matched() {
    let (dir, _store, matcher, _clock) = matcher_at("2024-06-15 07:45:00");
    let conn = Connection::open(dir.path().join("agenda.sqlite3")).unwrap();
    conn.execute_batch(
        "INSERT INTO tasks (title, created_at, reminder_at, recurring)
         VALUES ('legacy daily', '2023-01-01 00:00:00', '07:45', 1);
         INSERT INTO tasks (title, created_at, reminder_at, recurring)
         VALUES ('garbage daily', '2023-01-01 00:00:00', 'mornings', 1);",
    )
    .unwrap();
    drop(conn);

    let due = matcher.due_at(ts("2024-06-15 07:45:00")).unwrap();
    let titles: Vec<_> = due.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, vec!["legacy daily"]);
}

#[test]
fn undecodable_rows_do_not_hide_other_due_tasks() {
    let (dir, store, matcher, _clock) = matcher_at("2024-06-15 09:00:00");
    let id = store
        .create(&NewTask::new("take out bins").with_reminder(ts("2024-06-15 08:00:00")))
        .unwrap();
    let conn = Connection::open(dir.path().join("agenda.sqlite3")).unwrap();
    conn.execute_batch(
        "INSERT INTO tasks (title, created_at, reminder_at)
         VALUES ('bad created_at', 'last tuesday', '2024-06-15 08:00:00');
         INSERT INTO tasks (title, created_at, reminder_at, notify)
         VALUES ('bad flag', '2024-06-01 10:00:00', '2024-06-15 08:00:00', 7);",
    )
    .unwrap();
    drop(conn);

    assert_eq!(due_ids(&matcher), vec![id]);
}
