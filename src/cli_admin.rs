use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

mod cli_style;
mod queue;
mod server;
mod sqlite_persistence;

use cli_style::{get_styles, TableBuilder};
use queue::{AuditLogFilter, JobFilter, JobStatus, QueueManager, SqliteJobStore};

use rustyline::{
    completion::Completer,
    highlight::Highlighter,
    history::FileHistory,
    validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the SQLite jobs database file. Defaults to ./jobs.db.
    #[clap(value_parser = parse_path)]
    pub path: Option<PathBuf>,
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Adds a new job to the queue.
    Enqueue {
        tag: String,

        /// Scheduling priority, 1 (critical) to 4 (low).
        #[clap(long)]
        priority: Option<i32>,

        /// Lease timeout in seconds.
        #[clap(long)]
        timeout: Option<i64>,

        /// Maximum number of processing attempts.
        #[clap(long)]
        max_attempts: Option<i32>,
    },

    /// Shows a job with its full audit history.
    Show { job_id: i64 },

    /// Lists jobs, optionally filtered by status and tag.
    List {
        #[clap(long)]
        status: Option<String>,

        #[clap(long)]
        tag: Option<String>,

        /// Maximum number of jobs to display.
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },

    /// Shows per-status job counts.
    Stats,

    /// Shows recent audit log entries, newest first.
    Audit {
        /// Only show entries for this job.
        #[clap(long)]
        job_id: Option<i64>,

        #[clap(long, default_value_t = 20)]
        limit: usize,
    },

    /// Deletes audit log entries older than the given number of days.
    Prune { days: u64 },

    /// Shows the path of the current jobs db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

const PROMPT: &str = ">> ";

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn truncate_cell(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    } else {
        s.to_string()
    }
}

fn execute_command(
    line: String,
    queue_manager: &QueueManager,
    db_path: String,
) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => {
            cli_style::print_command_echo(&line);
            match cli.command {
                InnerCommand::Enqueue {
                    tag,
                    priority,
                    timeout,
                    max_attempts,
                } => match queue_manager.enqueue_job(&tag, priority, timeout, max_attempts) {
                    Ok(job) => cli_style::print_success(&format!(
                        "Enqueued job {} with tag '{}' at priority {}",
                        job.id,
                        job.tag,
                        job.priority.as_i32()
                    )),
                    Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                },
                InnerCommand::Show { job_id } => {
                    let job = match queue_manager.get_job(job_id) {
                        Ok(job) => job,
                        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                    };

                    cli_style::print_section_header("Job Details");
                    cli_style::print_field_highlight("Id", &job.id.to_string());
                    cli_style::print_field("Tag", &job.tag);
                    cli_style::print_field("Status", job.status.as_str());
                    cli_style::print_field(
                        "Priority",
                        &format!("{} ({:?})", job.priority.as_i32(), job.priority),
                    );
                    cli_style::print_field(
                        "Attempts",
                        &format!("{}/{}", job.attempts, job.max_attempts),
                    );
                    cli_style::print_field("Timeout", &format!("{}s", job.timeout));
                    if let Some(worker_id) = &job.worker_id {
                        cli_style::print_field("Worker", worker_id);
                    }
                    cli_style::print_field("Created", &format_timestamp(job.created_at));
                    cli_style::print_field("Updated", &format_timestamp(job.updated_at));
                    if let Some(started_at) = job.started_at {
                        cli_style::print_field("Started", &format_timestamp(started_at));
                    }
                    if let Some(expires_at) = job.lease_expires_at() {
                        cli_style::print_field("Lease expires", &format_timestamp(expires_at));
                    }
                    if let Some(completed_at) = job.completed_at {
                        cli_style::print_field("Completed", &format_timestamp(completed_at));
                    }
                    if let Some(failed_at) = job.failed_at {
                        cli_style::print_field("Failed", &format_timestamp(failed_at));
                    }
                    if let Some(reason) = &job.fail_reason {
                        cli_style::print_field("Fail reason", reason);
                    }
                    if let Some(message) = &job.fail_message {
                        cli_style::print_field("Fail message", message);
                    }
                    if let Some(result) = &job.result {
                        cli_style::print_field("Result", &result.to_string());
                    }
                    cli_style::print_section_footer();

                    match queue_manager.get_job_audit_log(job_id) {
                        Ok(entries) if entries.is_empty() => {
                            cli_style::print_empty_list("No audit entries recorded");
                        }
                        Ok(entries) => {
                            let mut table =
                                TableBuilder::new(vec!["Time", "Event", "Worker", "Details"]);
                            let rows: Vec<[String; 4]> = entries
                                .iter()
                                .map(|e| {
                                    [
                                        format_timestamp(e.created_at),
                                        e.event_type.as_str().to_string(),
                                        e.worker_id.clone().unwrap_or_else(|| "-".to_string()),
                                        truncate_cell(
                                            &e.details
                                                .as_ref()
                                                .map(|d| d.to_string())
                                                .unwrap_or_default(),
                                            48,
                                        ),
                                    ]
                                })
                                .collect();
                            for row in &rows {
                                table.add_row(row.iter().map(String::as_str).collect());
                            }
                            table.print();
                        }
                        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                    }
                }
                InnerCommand::List { status, tag, limit } => {
                    let status = match status {
                        Some(s) => match JobStatus::from_str(&s) {
                            Some(parsed) => Some(parsed),
                            None => {
                                return CommandExecutionResult::Error(format!(
                                    "Invalid status '{}'. Valid statuses are: queued, \
                                     in_progress, completed, failed, failed_retrying, dequeued",
                                    s
                                ));
                            }
                        },
                        None => None,
                    };

                    let filter = JobFilter {
                        status,
                        tag,
                        limit,
                        offset: 0,
                    };
                    let (jobs, total) = match queue_manager.list_jobs(&filter) {
                        Ok(page) => page,
                        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                    };

                    if jobs.is_empty() {
                        cli_style::print_empty_list("No jobs found");
                    } else {
                        let mut table = TableBuilder::new(vec![
                            "Id", "Tag", "Status", "Prio", "Att", "Worker", "Created",
                        ]);
                        let rows: Vec<[String; 7]> = jobs
                            .iter()
                            .map(|job| {
                                [
                                    job.id.to_string(),
                                    truncate_cell(&job.tag, 24),
                                    job.status.as_str().to_string(),
                                    job.priority.as_i32().to_string(),
                                    format!("{}/{}", job.attempts, job.max_attempts),
                                    job.worker_id.clone().unwrap_or_else(|| "-".to_string()),
                                    format_timestamp(job.created_at),
                                ]
                            })
                            .collect();
                        for row in &rows {
                            table.add_row(row.iter().map(String::as_str).collect());
                        }
                        table.print();
                        cli_style::print_field(
                            "Showing",
                            &format!("{} of {} jobs", jobs.len(), total),
                        );
                    }
                }
                InnerCommand::Stats => match queue_manager.queue_stats() {
                    Ok(stats) => {
                        cli_style::print_section_header("Queue Stats");
                        cli_style::print_field_highlight("Total", &stats.total_jobs.to_string());
                        cli_style::print_field("Queued", &stats.queued.to_string());
                        cli_style::print_field("In progress", &stats.in_progress.to_string());
                        cli_style::print_field(
                            "Failed retrying",
                            &stats.failed_retrying.to_string(),
                        );
                        cli_style::print_field("Completed", &stats.completed.to_string());
                        cli_style::print_field("Failed", &stats.failed.to_string());
                        cli_style::print_field("Dequeued", &stats.dequeued.to_string());
                        cli_style::print_section_footer();
                    }
                    Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                },
                InnerCommand::Audit { job_id, limit } => {
                    let filter = AuditLogFilter {
                        job_id,
                        event_type: None,
                        limit,
                        offset: 0,
                    };
                    let (entries, total) = match queue_manager.get_audit_log(&filter) {
                        Ok(page) => page,
                        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                    };

                    if entries.is_empty() {
                        cli_style::print_empty_list("No audit entries found");
                    } else {
                        let mut table =
                            TableBuilder::new(vec!["Time", "Event", "Job", "Worker", "Details"]);
                        let rows: Vec<[String; 5]> = entries
                            .iter()
                            .map(|e| {
                                [
                                    format_timestamp(e.created_at),
                                    e.event_type.as_str().to_string(),
                                    e.job_id.map(|id| id.to_string()).unwrap_or_default(),
                                    e.worker_id.clone().unwrap_or_else(|| "-".to_string()),
                                    truncate_cell(
                                        &e.details
                                            .as_ref()
                                            .map(|d| d.to_string())
                                            .unwrap_or_default(),
                                        48,
                                    ),
                                ]
                            })
                            .collect();
                        for row in &rows {
                            table.add_row(row.iter().map(String::as_str).collect());
                        }
                        table.print();
                        cli_style::print_field(
                            "Showing",
                            &format!("{} of {} entries", entries.len(), total),
                        );
                    }
                }
                InnerCommand::Prune { days } => {
                    let cutoff = chrono::Utc::now().timestamp() - (days as i64 * 24 * 60 * 60);
                    match queue_manager.prune_audit_log(cutoff) {
                        Ok(0) => cli_style::print_warning("Nothing to prune"),
                        Ok(count) => cli_style::print_success(&format!(
                            "Pruned {} audit log entries older than {} days",
                            count, days
                        )),
                        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                    }
                }
                InnerCommand::Where => {
                    println!("{}", db_path);
                }
                InnerCommand::Exit => return CommandExecutionResult::Exit,
            }
        }

        Err(e) => {
            if let Err(_) = e.print() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct MyHelper {
    commands_names: Vec<String>,
}

impl MyHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        MyHelper { commands_names }
    }
}

impl Completer for MyHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(" ") {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for MyHelper {}
impl Validator for MyHelper {}
impl Helper for MyHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let jobs_db_path = match cli_args.path {
        Some(path) => path,
        None => std::env::current_dir()?.join("jobs.db"),
    };
    let job_store = SqliteJobStore::new(&jobs_db_path)?;
    let queue_manager = QueueManager::new(Arc::new(job_store));

    cli_style::print_welcome(&jobs_db_path.display().to_string());

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<MyHelper, FileHistory>::with_config(config)?;

    let helper = MyHelper::new();
    rl.set_helper(Some(helper));

    loop {
        let readline = rl.readline(PROMPT);

        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(
                    line,
                    &queue_manager,
                    jobs_db_path.display().to_string(),
                ) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        cli_style::print_goodbye();
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        cli_style::print_error(&err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}
