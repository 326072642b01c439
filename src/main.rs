//! Grasp - Comprehension tracking gate for AI-generated code
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grasp::cli::check::CheckCommand;
use grasp::cli::design::DesignCommand;
use grasp::cli::lookup::LookupCommand;
use grasp::cli::score::{ScoreCommand, DEFAULT_HISTORY_LIMIT};
use grasp::cli::task::{parse_line_range, resolve_code, TaskCommand};
use grasp::cli::{CommandOutput, OutputOptions, Render};
use grasp::config::{crash_log_path, Config};
use grasp::core::{ChunkLogged, ChunkRequest};
use grasp::error::exit_codes;
use grasp::hooks::{HookRunner, HookType};
use grasp::storage::FileStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Grasp - Comprehension tracking gate for AI-generated code
#[derive(Parser)]
#[command(name = "grasp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// [Internal] Run a hook (JSON stdin/stdout). Called by host editor hooks
    Hook {
        /// The hook event type (defaults to the event's hook_event_name)
        #[arg(value_enum)]
        event: Option<HookEvent>,
    },

    /// [Agent] Declare intent before generating code
    StartTask {
        /// What the developer wants to build
        intent: String,
        /// Files the task will touch
        #[arg(long = "file", short)]
        files: Vec<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Log one block of generated code with its rationale
    LogChunk {
        /// Why the code is written this way
        #[arg(long, short)]
        explanation: String,
        /// The generated code
        #[arg(long, conflicts_with = "code_file")]
        code: Option<String>,
        /// Read the generated code from a file
        #[arg(long)]
        code_file: Option<PathBuf>,
        /// Task the chunk belongs to (auto-created when omitted)
        #[arg(long)]
        task_id: Option<String>,
        /// File the code was written to
        #[arg(long)]
        file: Option<String>,
        /// Line range in the file, e.g. 10-42
        #[arg(long, value_parser = parse_line_range)]
        lines: Option<(u32, u32)>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Mark a task complete
    CompleteTask {
        /// Task ID
        task_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Open the pre-code design review for a task
    DesignReview {
        /// Task ID
        task_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Record the developer's answer to a design question
    RecordDesign {
        /// Design review ID
        design_review_id: String,
        /// The developer's response, verbatim
        response: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Create comprehension questions for a task's code
    Check {
        /// Task ID
        task_id: String,
        /// Restrict the check to these chunks
        #[arg(long = "chunk")]
        chunk_ids: Vec<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Record the developer's answer to a comprehension question
    RecordAnswer {
        /// Check ID
        check_id: String,
        /// The developer's answer, verbatim
        answer: Option<String>,
        /// The developer skipped the question
        #[arg(long, conflicts_with = "answer")]
        skipped: bool,
        /// Grade: correct, partial, incorrect, needs_explanation
        #[arg(long)]
        quality: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [User/Agent] Show the comprehension score
    Score {
        /// Score a single task instead of everything
        #[arg(long)]
        task_id: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [User] Show daily score snapshots
    History {
        /// Maximum number of days
        #[arg(long, short, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [User/Agent] Explain why a file's AI-generated code looks the way it does
    Why {
        /// File path
        file: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Familiarity briefing for files about to be touched
    Context {
        /// File paths
        #[arg(required = true)]
        files: Vec<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Agent] Record where a logged chunk landed in a file
    RecordLineage {
        /// Chunk ID
        chunk_id: String,
        /// File path
        file: String,
        /// Line range, e.g. 10-42
        #[arg(value_parser = parse_line_range)]
        lines: (u32, u32),
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [User] Show which tasks produced the code in a file
    Lineage {
        /// File path
        file: String,
        /// Only chunks covering this line
        #[arg(long)]
        line: Option<u32>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum HookEvent {
    PreToolUse,
    PostToolUse,
}

impl From<HookEvent> for HookType {
    fn from(event: HookEvent) -> Self {
        match event {
            HookEvent::PreToolUse => HookType::PreToolUse,
            HookEvent::PostToolUse => HookType::PostToolUse,
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("grasp error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Install the stderr log subscriber.
///
/// `GRASP_LOG` takes an `EnvFilter` directive; `GRASP_LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("GRASP_LOG").unwrap_or_else(|_| EnvFilter::new("grasp=warn"));
    let json = std::env::var("GRASP_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to `<grasp_home>/crash.log` and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("grasp panic: {}", info);

        if let Some(crash_log) = crash_log_path() {
            if let Some(parent) = crash_log.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Run the CLI and return the exit code.
fn run(cli: Cli) -> CliResult {
    match cli.command {
        Commands::Hook { event } => run_hook(event.map(HookType::from)),
        Commands::StartTask {
            intent,
            files,
            json,
            quiet,
        } => {
            let cmd = TaskCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.start(&intent, files), json, quiet))
        }
        Commands::LogChunk {
            explanation,
            code,
            code_file,
            task_id,
            file,
            lines,
            json,
            quiet,
        } => {
            let code = match resolve_code(code, code_file.as_deref()) {
                Ok(code) => code,
                Err(e) => {
                    let output = CommandOutput::<ChunkLogged>::failure(e.to_string());
                    return Ok(emit(&output, json, quiet));
                }
            };
            let cmd = TaskCommand::new(FileStore::new()?, Config::load());
            let request = ChunkRequest {
                task_id,
                code,
                explanation,
                file_path: file,
                lines,
            };
            Ok(emit(&cmd.log_chunk(request), json, quiet))
        }
        Commands::CompleteTask {
            task_id,
            json,
            quiet,
        } => {
            let cmd = TaskCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.complete(&task_id), json, quiet))
        }
        Commands::DesignReview {
            task_id,
            json,
            quiet,
        } => {
            let cmd = DesignCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.review(&task_id), json, quiet))
        }
        Commands::RecordDesign {
            design_review_id,
            response,
            json,
            quiet,
        } => {
            let cmd = DesignCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.record(&design_review_id, &response), json, quiet))
        }
        Commands::Check {
            task_id,
            chunk_ids,
            json,
            quiet,
        } => {
            let cmd = CheckCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.request(&task_id, &chunk_ids), json, quiet))
        }
        Commands::RecordAnswer {
            check_id,
            answer,
            skipped,
            quality,
            json,
            quiet,
        } => {
            let cmd = CheckCommand::new(FileStore::new()?, Config::load());
            let output = cmd.answer(&check_id, answer.as_deref(), skipped, quality.as_deref());
            Ok(emit(&output, json, quiet))
        }
        Commands::Score {
            task_id,
            json,
            quiet,
        } => {
            let cmd = ScoreCommand::new(FileStore::new()?);
            Ok(emit(&cmd.score(task_id.as_deref()), json, quiet))
        }
        Commands::History { limit, json, quiet } => {
            let cmd = ScoreCommand::new(FileStore::new()?);
            Ok(emit(&cmd.history(limit), json, quiet))
        }
        Commands::Why { file, json, quiet } => {
            let cmd = LookupCommand::new(FileStore::new()?);
            Ok(emit(&cmd.why(&file), json, quiet))
        }
        Commands::Context { files, json, quiet } => {
            let cmd = LookupCommand::new(FileStore::new()?);
            Ok(emit(&cmd.context(files), json, quiet))
        }
        Commands::RecordLineage {
            chunk_id,
            file,
            lines,
            json,
            quiet,
        } => {
            let cmd = TaskCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.record_lineage(&chunk_id, &file, lines), json, quiet))
        }
        Commands::Lineage {
            file,
            line,
            json,
            quiet,
        } => {
            let cmd = TaskCommand::new(FileStore::new()?, Config::load());
            Ok(emit(&cmd.lineage(&file, line), json, quiet))
        }
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Run a hook. Handled paths always exit APPROVE; decisions travel in JSON.
fn run_hook(hook_type: Option<HookType>) -> CliResult {
    let config = Config::load();
    let store = match FileStore::new() {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("opening store: {} (fail-open: allowing)", e);
            return Ok(ExitCode::from(exit_codes::APPROVE as u8));
        }
    };
    let runner = HookRunner::new(store, config);

    let output = runner.run(hook_type)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(ExitCode::from(exit_codes::APPROVE as u8))
}

/// Print a command's output and map its success to an exit code.
fn emit<T: serde::Serialize + Render>(
    output: &CommandOutput<T>,
    json: bool,
    quiet: bool,
) -> ExitCode {
    let formatted = output.format(&OutputOptions { json, quiet });
    if !formatted.is_empty() {
        println!("{}", formatted);
    }
    success_to_exit_code(output.success)
}

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::APPROVE as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

// =============================================================================
// Tests
// =============================================================================
