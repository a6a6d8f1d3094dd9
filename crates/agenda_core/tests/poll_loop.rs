use agenda_core::clock::parse_timestamp;
use agenda_core::db::DbError;
use agenda_core::{
    Clock, DueTask, DueTaskSource, Importance, ManualClock, NewTask, NotificationError,
    NotificationSink, PollLoop, PollState, ReminderMatcher, RepoError, RepoResult, TaskStore,
    TickReport,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    fail_titles: Vec<&'static str>,
}

impl RecordingSink {
    fn failing_on(titles: Vec<&'static str>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_titles: titles,
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        if self.fail_titles.contains(&title) {
            return Err(NotificationError::new("toast service unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}

struct FixedSource(Vec<DueTask>);

impl DueTaskSource for FixedSource {
    fn due_at(&self, _now: NaiveDateTime) -> RepoResult<Vec<DueTask>> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

impl DueTaskSource for BrokenSource {
    fn due_at(&self, _now: NaiveDateTime) -> RepoResult<Vec<DueTask>> {
        Err(RepoError::Db(DbError::UnsupportedSchemaVersion {
            db_version: 99,
            latest_supported: 4,
        }))
    }
}

fn due(id: i64, title: &str, notify: bool) -> DueTask {
    DueTask {
        id,
        title: title.to_string(),
        description: None,
        reminder_at: "2024-06-15 09:00:00".to_string(),
        notify,
        importance: Importance::Normal,
        recurring: false,
    }
}

fn clock_at(text: &str) -> Arc<ManualClock> {
    Arc::new(ManualClock::at(text).unwrap())
}

#[test]
fn tick_dispatches_due_tasks_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at("2024-06-15 08:00:00");
    let store = TaskStore::open(dir.path().join("agenda.sqlite3"), clock.clone()).unwrap();
    store
        .create(
            &NewTask::new("standup")
                .with_description("room 4")
                .with_reminder(parse_timestamp("2024-01-01 09:00:00").unwrap())
                .with_importance(Importance::Important)
                .recurring(),
        )
        .unwrap();
    store
        .create(
            &NewTask::new("quiet")
                .with_reminder(parse_timestamp("2024-06-15 07:00:00").unwrap())
                .with_notify(false),
        )
        .unwrap();

    let sink = Arc::new(RecordingSink::default());
    let poll = PollLoop::new(
        Arc::new(ReminderMatcher::new(store)),
        sink.clone(),
        clock.clone(),
    );

    assert_eq!(
        poll.tick(),
        TickReport {
            due: 1,
            notified: 0,
            failed: 0,
            skipped: 1,
        }
    );

    clock.set(parse_timestamp("2024-06-15 09:00:00").unwrap());
    let report = poll.tick();
    assert_eq!(report.notified, 1);
    assert_eq!(
        sink.sent(),
        vec![(
            "standup".to_string(),
            "room 4\nImportance: Important".to_string()
        )]
    );
    assert_eq!(poll.state(), PollState::Idle);
}

#[test]
fn tick_notifies_valid_tasks_next_to_a_corrupt_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agenda.sqlite3");
    let clock = clock_at("2024-06-15 09:00:00");
    let store = TaskStore::open(&path, clock.clone()).unwrap();
    store
        .create(
            &NewTask::new("call plumber")
                .with_reminder(parse_timestamp("2024-06-15 08:30:00").unwrap()),
        )
        .unwrap();
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO tasks (title, created_at, reminder_at, recurring)
         VALUES ('corrupt', '??', '2024-06-15 08:30:00', 5);",
        [],
    )
    .unwrap();
    drop(conn);

    let sink = Arc::new(RecordingSink::default());
    let poll = PollLoop::new(Arc::new(ReminderMatcher::new(store)), sink.clone(), clock);

    let report = poll.tick();

    assert_eq!(report.due, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(sink.sent()[0].0, "call plumber");
}

#[test]
fn repeated_ticks_in_the_same_minute_notify_again() {
    let sink = Arc::new(RecordingSink::default());
    let poll = PollLoop::new(
        Arc::new(FixedSource(vec![due(1, "water plants", true)])),
        sink.clone(),
        clock_at("2024-06-15 09:00:00"),
    );

    poll.tick();
    poll.tick();

    assert_eq!(sink.sent().len(), 2);
}

#[test]
fn failed_dispatch_does_not_block_remaining_tasks() {
    let sink = Arc::new(RecordingSink::failing_on(vec!["first"]));
    let poll = PollLoop::new(
        Arc::new(FixedSource(vec![
            due(1, "first", true),
            due(2, "second", true),
        ])),
        sink.clone(),
        clock_at("2024-06-15 09:00:00"),
    );

    let report = poll.tick();

    assert_eq!(report.failed, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(sink.sent()[0].0, "second");
}

#[test]
fn panicking_sink_is_counted_as_failure() {
    let sink = Arc::new(
        |_title: &str, _message: &str| -> Result<(), NotificationError> {
            panic!("toast backend crashed")
        },
    );
    let poll = PollLoop::new(
        Arc::new(FixedSource(vec![due(1, "first", true)])),
        sink,
        clock_at("2024-06-15 09:00:00"),
    );

    let report = poll.tick();

    assert_eq!(report.failed, 1);
    assert_eq!(poll.state(), PollState::Idle);
}

#[test]
fn matcher_failure_is_swallowed() {
    let sink = Arc::new(RecordingSink::default());
    let poll = PollLoop::new(
        Arc::new(BrokenSource),
        sink.clone(),
        clock_at("2024-06-15 09:00:00"),
    );

    assert_eq!(poll.tick(), TickReport::default());
    assert!(sink.sent().is_empty());
}

#[test]
fn spawned_loop_ticks_and_stops_promptly() {
    let (tx, rx) = mpsc::channel::<String>();
    let tx = Mutex::new(tx);
    let sink = Arc::new(
        move |title: &str, _message: &str| -> Result<(), NotificationError> {
            tx.lock()
                .unwrap()
                .send(title.to_string())
                .map_err(|err| NotificationError::new(err.to_string()))
        },
    );
    let clock: Arc<dyn Clock> = clock_at("2024-06-15 09:00:00");
    let handle = PollLoop::new(
        Arc::new(FixedSource(vec![due(1, "stretch", true)])),
        sink,
        clock,
    )
    .with_interval(Duration::from_secs(1))
    .spawn()
    .unwrap();

    let title = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(title, "stretch");

    let started = Instant::now();
    handle.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
}
