#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "cairn: plan ledger and workflow state machine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Project root containing `.cairn/` (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a cairn ledger",
        long_about = "Create .cairn/ledger.jsonl and a default .cairn/config.toml.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    cairn init\n\n    # Initialize elsewhere\n    cairn --dir ../proj init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Select the active spec file",
        after_help = "EXAMPLES:\n    cairn spec spec.md"
    )]
    Spec(cmd::spec::SpecArgs),

    #[command(next_help_heading = "Setup", about = "Show or record configuration")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    #[command(
        next_help_heading = "Plan",
        about = "Add a task",
        long_about = "Validate a task proposal and append it as a pending task.",
        after_help = "EXAMPLES:\n    cairn add --name \"Fix loop bound\" \\\n        --notes \"see src/foo.py lines 10-20, change the loop bound\" \\\n        --accept \"pytest tests/test_foo.py passes\""
    )]
    Add(cmd::add::TaskArgs),

    #[command(
        next_help_heading = "Plan",
        about = "Validate a task without recording it",
        after_help = "EXAMPLES:\n    cairn check --name \"Fix\" --notes \"fix bug\" --accept \"works\" --json"
    )]
    Check(cmd::add::TaskArgs),

    #[command(
        next_help_heading = "Plan",
        about = "Split a task into children",
        long_about = "Replace a task with the children read from a JSON array of task drafts.",
        after_help = "EXAMPLES:\n    cairn decompose t-1f9a2c04 --from children.json\n\n    # Read drafts from stdin\n    cairn decompose t-1f9a2c04 --from -"
    )]
    Decompose(cmd::decompose::DecomposeArgs),

    #[command(next_help_heading = "Plan", about = "Remove a task")]
    Delete(cmd::delete::DeleteArgs),

    #[command(next_help_heading = "Plan", about = "Change a task's priority")]
    Prioritize(cmd::prioritize::PrioritizeArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Mark a task done",
        after_help = "EXAMPLES:\n    # Mark the next ready task done\n    cairn done\n\n    # Mark a specific task done\n    cairn done t-1f9a2c04"
    )]
    Done(cmd::done::DoneArgs),

    #[command(next_help_heading = "Lifecycle", about = "Accept a done task")]
    Accept(cmd::review::AcceptArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Reject a done task back to pending",
        after_help = "EXAMPLES:\n    cairn reject --reason \"pytest tests/test_foo.py fails on empty input\""
    )]
    Reject(cmd::review::RejectArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Flag a task whose attempt was killed",
        after_help = "EXAMPLES:\n    cairn kill t-1f9a2c04 --reason \"context limit\"\n\n    # Clear the flag\n    cairn kill t-1f9a2c04 --clear"
    )]
    Kill(cmd::kill::KillArgs),

    #[command(next_help_heading = "Lifecycle", about = "Attach research findings to a task")]
    Research(cmd::research::ResearchArgs),

    #[command(next_help_heading = "Lifecycle", about = "Record or resolve issues")]
    Issue {
        #[command(subcommand)]
        command: IssueCommand,
    },

    #[command(next_help_heading = "Read", about = "Summarize the ledger")]
    Status(cmd::status::StatusArgs),

    #[command(next_help_heading = "Read", about = "Print the current stage")]
    Stage,

    #[command(next_help_heading = "Read", about = "Show the next ready task")]
    Next,

    #[command(next_help_heading = "Read", about = "List tasks")]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Read", about = "Show raw ledger records")]
    Log(cmd::log::LogArgs),

    #[command(
        next_help_heading = "Read",
        about = "Follow the ledger and report stage changes",
        after_help = "EXAMPLES:\n    cairn watch --interval 500"
    )]
    Watch(cmd::watch::WatchArgs),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(
        about = "Record a configuration override in the ledger",
        after_help = "EXAMPLES:\n    cairn config set max_rejections 5\n    cairn config set strict false"
    )]
    Set(cmd::config::SetArgs),
}

#[derive(Subcommand, Debug)]
enum IssueCommand {
    #[command(about = "Record an open issue")]
    Add(cmd::issue::AddArgs),
    #[command(about = "Mark one issue, or every open issue, fixed")]
    Resolve(cmd::issue::ResolveArgs),
    #[command(about = "List issues")]
    List,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CAIRN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "cairn=debug,cairn_core=debug,info"
        } else {
            "cairn=info,cairn_core=info,warn"
        })
    });

    let format = env::var("CAIRN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let project_root = match cli.dir {
        Some(ref dir) => dir.clone(),
        None => env::current_dir()?,
    };
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Spec(ref args) => cmd::spec::run_spec(args, output, &project_root),
        Commands::Config {
            command: ConfigCommand::Show,
        } => cmd::config::run_show(output, &project_root),
        Commands::Config {
            command: ConfigCommand::Set(ref args),
        } => cmd::config::run_set(args, output, &project_root),
        Commands::Add(ref args) => cmd::add::run_add(args, output, &project_root),
        Commands::Check(ref args) => cmd::add::run_check(args, output, &project_root),
        Commands::Decompose(ref args) => cmd::decompose::run_decompose(args, output, &project_root),
        Commands::Delete(ref args) => cmd::delete::run_delete(args, output, &project_root),
        Commands::Prioritize(ref args) => {
            cmd::prioritize::run_prioritize(args, output, &project_root)
        }
        Commands::Done(ref args) => cmd::done::run_done(args, output, &project_root),
        Commands::Accept(ref args) => cmd::review::run_accept(args, output, &project_root),
        Commands::Reject(ref args) => cmd::review::run_reject(args, output, &project_root),
        Commands::Kill(ref args) => cmd::kill::run_kill(args, output, &project_root),
        Commands::Research(ref args) => cmd::research::run_research(args, output, &project_root),
        Commands::Issue {
            command: IssueCommand::Add(ref args),
        } => cmd::issue::run_add(args, output, &project_root),
        Commands::Issue {
            command: IssueCommand::Resolve(ref args),
        } => cmd::issue::run_resolve(args, output, &project_root),
        Commands::Issue {
            command: IssueCommand::List,
        } => cmd::issue::run_list(output, &project_root),
        Commands::Status(ref args) => cmd::status::run_status(args, output, &project_root),
        Commands::Stage => cmd::status::run_stage(output, &project_root),
        Commands::Next => cmd::next::run_next(output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Log(ref args) => cmd::log::run_log(args, output, &project_root),
        Commands::Watch(ref args) => cmd::watch::run_watch(args, output, &project_root),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = cli.output_mode();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            if let Err(render_err) = render_error(output, &CliError::from(&err)) {
                eprintln!("error: {err:#} (and rendering failed: {render_err})");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["cairn", "--json", "list"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["cairn", "list", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn default_output_is_human() {
        let cli = Cli::parse_from(["cairn", "stage"]);
        assert!(!cli.output_mode().is_json());
    }

    #[test]
    fn dir_flag_is_global() {
        let cli = Cli::parse_from(["cairn", "next", "--dir", "/tmp/proj"]);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/proj")));
    }

    #[test]
    fn optional_ids_parse() {
        let cli = Cli::parse_from(["cairn", "done"]);
        assert!(matches!(cli.command, Commands::Done(ref a) if a.id.is_none()));

        let cli = Cli::parse_from(["cairn", "accept", "t-1"]);
        assert!(matches!(cli.command, Commands::Accept(ref a) if a.id.as_deref() == Some("t-1")));
    }

    #[test]
    fn reject_requires_reason() {
        assert!(Cli::try_parse_from(["cairn", "reject"]).is_err());
        assert!(Cli::try_parse_from(["cairn", "reject", "--reason", "fails"]).is_ok());
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["cairn", "init"],
            vec!["cairn", "spec", "spec.md"],
            vec!["cairn", "config", "show"],
            vec!["cairn", "config", "set", "strict", "false"],
            vec!["cairn", "add", "--name", "n", "--notes", "n", "--accept", "a"],
            vec!["cairn", "check", "--name", "n"],
            vec!["cairn", "decompose", "t-1", "--from", "kids.json"],
            vec!["cairn", "delete", "t-1"],
            vec!["cairn", "prioritize", "t-1", "high"],
            vec!["cairn", "done", "t-1"],
            vec!["cairn", "accept"],
            vec!["cairn", "reject", "t-1", "--reason", "r"],
            vec!["cairn", "kill", "t-1", "--reason", "timeout"],
            vec!["cairn", "kill", "t-1", "--clear"],
            vec!["cairn", "research", "t-1", "--data", "{}"],
            vec!["cairn", "issue", "add", "--desc", "d"],
            vec!["cairn", "issue", "resolve"],
            vec!["cairn", "issue", "list"],
            vec!["cairn", "status"],
            vec!["cairn", "stage"],
            vec!["cairn", "next"],
            vec!["cairn", "list", "--status", "done"],
            vec!["cairn", "log", "--tail", "5"],
            vec!["cairn", "watch", "--interval", "100", "--count", "1"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(
                result.is_ok(),
                "Failed to parse: {:?} - error: {:?}",
                args,
                result.err()
            );
        }
    }
}
