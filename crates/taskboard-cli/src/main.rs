use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use taskboard_core::app::{BoardStats, MoveOutcome, TaskBoard, bind_process_store};
use taskboard_core::config::Config;
use taskboard_core::domain::{
    CreateTaskPayload, Priority, Task, TaskId, TaskStatus, UpdateTaskPayload,
};
use taskboard_core::query::{FilterState, SortDirection, SortField, group_by_status};

#[derive(Parser, Debug)]
#[command(name = "taskboard", version, about = "Task board with drag-between-columns semantics")]
struct Cli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Structured database file (overrides storage.database_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Key-value directory (overrides storage.key_value_dir)
    #[arg(long, global = true)]
    kv_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show tasks, grouped by column unless a sort is given
    List {
        #[arg(long = "status")]
        statuses: Vec<TaskStatus>,
        #[arg(long = "priority")]
        priorities: Vec<Priority>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        sort: Option<SortField>,
        #[arg(long)]
        asc: bool,
    },
    /// Create a task
    Add {
        title: String,
        #[arg(long, default_value = "thing_to_do")]
        status: TaskStatus,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
        /// minutes
        #[arg(long)]
        estimate: Option<u32>,
    },
    /// Change fields of a task; omitted flags keep their values
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        estimate: Option<u32>,
        #[arg(long)]
        actual: Option<u32>,
    },
    /// Move a task to another column
    Move { id: String, status: TaskStatus },
    Delete { id: String },
    /// Write the export snapshot to a file or stdout
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace every task with the contents of an export snapshot
    Import { path: PathBuf },
    Clear,
    Stats,
}

fn init_tracing(config: &Config, verbose: u8) -> anyhow::Result<()> {
    let default_filter = match verbose {
        0 => config.logging.filter.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }
    Ok(())
}

fn print_task(task: &Task) {
    let priority = task.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
    let tags = task.tags.as_deref().map(|t| t.join(",")).unwrap_or_default();
    println!(
        "{}  [{}]  {}  ({priority})  {tags}",
        task.id,
        task.status,
        task.title
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("loading configuration")?;
    init_tracing(&config, cli.verbose)?;

    if let Some(db) = cli.db {
        config.storage.database_path = Some(db);
    }
    if let Some(dir) = cli.kv_dir {
        config.storage.key_value_dir = Some(dir);
    }

    let backend = bind_process_store(&config.storage_environment());
    info!(backend = %backend.kind, "task store bound");

    let board = TaskBoard::new(backend.store, config.board.clone());
    board.load().await;
    if let Some(error) = board.error() {
        return Err(anyhow!(error)).context("loading tasks");
    }

    match cli.command {
        Command::List {
            statuses,
            priorities,
            tags,
            search,
            sort,
            asc,
        } => {
            let mut filters = FilterState::new();
            filters.set_status_filter(statuses);
            filters.set_priority_filter(priorities);
            filters.set_tag_filter(tags);
            if let Some(query) = search {
                filters.set_search_query(&query);
            }
            if asc {
                filters.set_sort_direction(SortDirection::Asc);
            }

            match sort {
                Some(field) => {
                    filters.set_sort_field(field);
                    for task in filters.visible(&board.tasks()) {
                        print_task(&task);
                    }
                }
                None => {
                    for (status, column) in group_by_status(&filters.visible(&board.tasks())) {
                        println!("== {} ({})", status.label(), column.len());
                        for task in &column {
                            print_task(task);
                        }
                    }
                }
            }
        }
        Command::Add {
            title,
            status,
            description,
            priority,
            tags,
            due,
            estimate,
        } => {
            let payload = CreateTaskPayload {
                description,
                priority,
                tags: (!tags.is_empty()).then_some(tags),
                due_date: due,
                estimated_time: estimate,
                ..CreateTaskPayload::new(title, status)
            };
            let task = board.create_task(payload).await?;
            print_task(&task);
        }
        Command::Edit {
            id,
            title,
            description,
            status,
            priority,
            tags,
            due,
            estimate,
            actual,
        } => {
            let payload = UpdateTaskPayload {
                title,
                description,
                status,
                priority,
                tags: (!tags.is_empty()).then_some(tags),
                due_date: due,
                estimated_time: estimate,
                actual_time: actual,
                ..UpdateTaskPayload::new(TaskId::new(id))
            };
            let task = board.update_task(payload).await?;
            print_task(&task);
        }
        Command::Move { id, status } => {
            let id = TaskId::new(id);
            match board.on_task_status_change(&id, status).await {
                MoveOutcome::Confirmed => println!("moved {id} to {}", status.label()),
                MoveOutcome::Unchanged => println!("{id} is already in {}", status.label()),
                MoveOutcome::UnknownTask => return Err(anyhow!("task not found: {id}")),
                MoveOutcome::RolledBack(previous) => {
                    let message = board
                        .notice()
                        .map(|n| n.message)
                        .unwrap_or_else(|| "move failed".into());
                    return Err(anyhow!("{message} ({id} stays in {})", previous.label()));
                }
                MoveOutcome::Superseded => println!("move of {id} superseded"),
            }
        }
        Command::Delete { id } => {
            let id = TaskId::new(id);
            if !board.delete_task(&id).await {
                match board.error() {
                    Some(error) => return Err(anyhow!(error)),
                    None => println!("no task {id}"),
                }
            }
        }
        Command::Export { output } => {
            let json = board.export_tasks().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "exported tasks");
                }
                None => println!("{json}"),
            }
        }
        Command::Import { path } => {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let imported = board.import_tasks(&data).await?;
            println!("imported {} tasks", imported.len());
        }
        Command::Clear => {
            if !board.clear_all().await {
                return Err(anyhow!(board.error().unwrap_or_else(|| "clear failed".into())));
            }
        }
        Command::Stats => {
            let stats = BoardStats::from_tasks(&board.tasks());
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("completion: {:.0}%", stats.completion_rate() * 100.0);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_move_with_wire_status() {
        let cli = Cli::try_parse_from(["taskboard", "move", "task-1", "done"]).unwrap();
        match cli.command {
            Command::Move { id, status } => {
                assert_eq!(id, "task-1");
                assert_eq!(status, TaskStatus::Done);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Cli::try_parse_from(["taskboard", "move", "task-1", "archived"]).is_err());
    }
}
