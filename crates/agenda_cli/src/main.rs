//! Terminal front-end for the Agenda core.
//!
//! # Responsibility
//! - Map subcommands onto task store and reminder use-cases.
//! - Run the poll loop in the foreground with a stdout notification sink.
//!
//! # Invariants
//! - Configuration is read from `--config-dir` (default: current directory).
//! - Failures print one line to stderr and exit with status 1.

use agenda_core::model::task::describe_reminder;
use agenda_core::{
    compose_reminder, init_logging_from_config, reminder_in_past, AppConfig, Clock, Importance,
    NewTask, NotificationError, PollLoop, ReminderMatcher, Task, TaskPatch, TaskStore,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "agenda")]
#[command(about = "Tasks with one-shot and daily reminders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding `agenda.json` and the default database
    #[arg(long, value_name = "DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add(AddArgs),
    /// List pending (or completed) tasks
    List {
        /// Show completed tasks instead of pending ones
        #[arg(long)]
        completed: bool,
    },
    /// Change fields of a task
    Edit(EditArgs),
    /// Mark a task completed
    Done {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Delete a task
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Print tasks whose reminder is due right now
    Due,
    /// Run the reminder loop in the foreground and print notifications
    Watch,
}

#[derive(Args)]
struct AddArgs {
    /// Task title
    title: String,

    #[arg(short, long)]
    description: Option<String>,

    /// Reminder date (YYYY-MM-DD); requires --time
    #[arg(long, requires = "time")]
    date: Option<NaiveDate>,

    /// Reminder time (HH:MM)
    #[arg(long, requires = "date")]
    time: Option<String>,

    #[arg(short, long, value_enum, default_value = "normal")]
    importance: ImportanceArg,

    /// Repeat the reminder every day from --date on
    #[arg(long)]
    recurring: bool,

    /// Store the task without popup notifications
    #[arg(long)]
    no_notify: bool,
}

#[derive(Args)]
struct EditArgs {
    #[arg(value_name = "ID")]
    id: i64,

    #[arg(long)]
    title: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    description: Option<String>,

    #[arg(long)]
    clear_description: bool,

    #[arg(long, requires = "time", conflicts_with = "clear_reminder")]
    date: Option<NaiveDate>,

    #[arg(long, requires = "date")]
    time: Option<String>,

    #[arg(long)]
    clear_reminder: bool,

    #[arg(short, long, value_enum)]
    importance: Option<ImportanceArg>,

    #[arg(long, value_name = "BOOL")]
    recurring: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    notify: Option<bool>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImportanceArg {
    Normal,
    Important,
    Urgent,
}

impl From<ImportanceArg> for Importance {
    fn from(arg: ImportanceArg) -> Self {
        match arg {
            ImportanceArg::Normal => Importance::Normal,
            ImportanceArg::Important => Importance::Important,
            ImportanceArg::Urgent => Importance::Urgent,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_dir);
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("warning: logging disabled: {err}");
    }

    if let Err(message) = run(cli.command, &config) {
        log::warn!("event=cli_command module=cli status=error error={message}");
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<(), String> {
    let clock: Arc<dyn Clock> = Arc::new(config.clock());
    let store = TaskStore::open(&config.db_path, clock).map_err(|err| err.to_string())?;

    match command {
        Commands::Add(args) => add(&store, args),
        Commands::List { completed } => {
            let tasks = if completed {
                store.read_completed()
            } else {
                store.read_pending()
            }
            .map_err(|err| err.to_string())?;
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in &tasks {
                print_task(task);
            }
            Ok(())
        }
        Commands::Edit(args) => edit(&store, args),
        Commands::Done { id } => {
            store.mark_completed(id).map_err(|err| err.to_string())?;
            println!("Task {id} completed.");
            Ok(())
        }
        Commands::Delete { id } => {
            store.delete(id).map_err(|err| err.to_string())?;
            println!("Task {id} deleted.");
            Ok(())
        }
        Commands::Due => {
            let due = ReminderMatcher::new(store)
                .due_now()
                .map_err(|err| err.to_string())?;
            for task in &due {
                println!("#{} {}: {}", task.id, task.title, task.notification_message());
            }
            Ok(())
        }
        Commands::Watch => watch(store, config),
    }
}

fn add(store: &TaskStore, args: AddArgs) -> Result<(), String> {
    let mut task = NewTask::new(args.title)
        .with_importance(args.importance.into())
        .with_notify(!args.no_notify);
    if let Some(description) = args.description {
        task = task.with_description(description);
    }
    if let (Some(date), Some(time)) = (args.date, args.time.as_deref()) {
        task = task.with_reminder(compose_reminder(date, time).map_err(|err| err.to_string())?);
    }
    if args.recurring {
        task = task.recurring();
    }

    let id = store.create(&task).map_err(|err| err.to_string())?;
    println!("Task {id} created.");
    if let Some(reminder) = task.reminder_at {
        if !task.recurring && reminder_in_past(reminder, store.clock().now()) {
            println!("Note: the reminder time is already in the past.");
        }
    }
    Ok(())
}

fn edit(store: &TaskStore, args: EditArgs) -> Result<(), String> {
    let reminder_at = match (args.date, args.time.as_deref()) {
        (Some(date), Some(time)) => {
            Some(Some(compose_reminder(date, time).map_err(|err| err.to_string())?))
        }
        _ if args.clear_reminder => Some(None),
        _ => None,
    };
    let description = match args.description {
        Some(description) => Some(Some(description)),
        None if args.clear_description => Some(None),
        None => None,
    };
    let patch = TaskPatch {
        title: args.title,
        description,
        reminder_at,
        notify: args.notify,
        importance: args.importance.map(Importance::from),
        recurring: args.recurring,
    };
    if patch.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    store.update(args.id, &patch).map_err(|err| err.to_string())?;
    println!("Task {} updated.", args.id);
    Ok(())
}

fn watch(store: TaskStore, config: &AppConfig) -> Result<(), String> {
    let clock = Arc::clone(store.clock());
    let sink = Arc::new(|title: &str, message: &str| -> Result<(), NotificationError> {
        println!("[reminder] {title}\n{message}\n");
        Ok(())
    });
    let handle = PollLoop::new(Arc::new(ReminderMatcher::new(store)), sink, clock)
        .with_interval(config.poll_interval)
        .spawn()
        .map_err(|err| format!("failed to start reminder loop: {err}"))?;

    println!(
        "Watching reminders every {}s; press Ctrl+C to stop.",
        config.poll_interval.as_secs()
    );
    handle.wait();
    Ok(())
}

fn print_task(task: &Task) {
    let reminder = describe_reminder(task).unwrap_or_else(|| "-".to_string());
    let flags = match (task.notify, task.completed) {
        (_, true) => " [done]",
        (false, false) => " [silent]",
        (true, false) => "",
    };
    println!(
        "#{:<4} {:<9} {:<18} {}{}",
        task.id,
        task.importance.as_str(),
        reminder,
        task.title,
        flags
    );
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        println!("      {description}");
    }
}
