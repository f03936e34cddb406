use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};

use gitcherry::config::DEFAULT_MESSAGE_TEMPLATE;
use gitcherry::{
    short_id, should_proceed, Config, DuplicatePolicy, Error, Execution, Gateway, GitCli,
    OperationPlan, Prepared, Result, Session, UndoEntry,
};

#[derive(Parser, Debug)]
#[command(
    name = "gitcherry",
    version,
    about = "Move, revert, and restore commit ranges between branches",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Execute the plan. Without this flag only the commands are printed.
    #[arg(long, global = true)]
    apply: bool,

    /// Run `git fetch --prune --tags` before planning.
    #[arg(long, global = true, env = "GITCHERRY_AUTO_REFRESH")]
    refresh: bool,

    /// Apply without printing the plan or asking for confirmation.
    #[arg(long, global = true)]
    no_preview: bool,

    #[arg(
        long,
        global = true,
        hide = true,
        env = "GITCHERRY_PREVIEW",
        value_parser = BoolishValueParser::new()
    )]
    preview: Option<bool>,

    /// What to do when patches already exist on the target: ask, skip, apply.
    #[arg(long, global = true, env = "GITCHERRY_ON_DUPLICATE")]
    on_duplicate: Option<DuplicatePolicy>,

    /// Branch used when --to / --on is omitted.
    #[arg(long, global = true, env = "GITCHERRY_DEFAULT_BRANCH")]
    default_branch: Option<String>,

    /// Transfer message template ({source}, {target}, {range}).
    #[arg(long, global = true, env = "GITCHERRY_MESSAGE_TEMPLATE")]
    message_template: Option<String>,

    /// Directory holding `.gitcherry/` (default: repository top level).
    #[arg(long, global = true, env = "GITCHERRY_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// Increase log verbosity.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Squash a commit range from one branch onto another.
    Transfer {
        /// Branch the commits come from.
        #[arg(long = "from")]
        source: String,
        /// Branch that receives the squashed commit.
        #[arg(long = "to")]
        target: Option<String>,
        /// Inclusive range `start..end`.
        #[arg(long)]
        range: String,
        /// Commit message.
        #[arg(short, long, conflicts_with_all = ["edit", "auto_message"])]
        message: Option<String>,
        /// Write the message in $EDITOR, seeded with the template.
        #[arg(long, conflicts_with = "auto_message")]
        edit: bool,
        /// Use the message template (the default).
        #[arg(long)]
        auto_message: bool,
    },
    /// Revert a commit or range on a branch as one commit.
    Revert {
        /// Branch to revert on.
        #[arg(long = "on")]
        branch: Option<String>,
        /// A single commit or an inclusive range `start..end`.
        #[arg(long)]
        range: String,
        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Create a branch pointing at a commit.
    Restore {
        /// Commit the new branch points at.
        #[arg(long = "at")]
        commit: String,
        /// Name of the branch to create.
        #[arg(long)]
        branch_name: String,
    },
    /// Step back in the recorded history.
    Undo,
    /// Step forward in the recorded history.
    Redo,
    /// List recorded operations, oldest first.
    Log,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Flags and `GITCHERRY_*` values folded into a [`Config`].
fn resolve_config(cli: &Cli) -> Config {
    let defaults = Config::default();
    Config {
        on_duplicate: cli.on_duplicate.unwrap_or(defaults.on_duplicate),
        preview: !cli.no_preview && cli.preview.unwrap_or(defaults.preview),
        auto_refresh: cli.refresh,
        default_branch: cli
            .default_branch
            .clone()
            .filter(|b| !b.trim().is_empty()),
        message_template: cli
            .message_template
            .clone()
            .unwrap_or_else(|| DEFAULT_MESSAGE_TEMPLATE.to_string()),
    }
}

/// An explicit policy wins; otherwise ask on a terminal and skip elsewhere.
fn duplicate_policy(cli: &Cli, config: &Config) -> DuplicatePolicy {
    match cli.on_duplicate {
        Some(policy) => policy,
        None if !std::io::stdin().is_terminal() => DuplicatePolicy::Skip,
        None => config.on_duplicate,
    }
}

fn store_root(cli: &Cli, git: &GitCli) -> Result<PathBuf> {
    if let Some(root) = &cli.store_root {
        return Ok(root.clone());
    }
    let out = git.run(&["rev-parse", "--show-toplevel"])?;
    if out.success {
        let top = out.stdout.trim();
        if !top.is_empty() {
            return Ok(PathBuf::from(top));
        }
    }
    Ok(std::env::current_dir()?)
}

fn branch_or_default(given: Option<String>, config: &Config, flag: &str) -> Result<String> {
    given
        .or_else(|| config.default_branch.clone())
        .ok_or_else(|| {
            Error::invalid_config(format!(
                "{} is required (or set GITCHERRY_DEFAULT_BRANCH)",
                flag
            ))
        })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli);
    let policy = duplicate_policy(&cli, &config);
    let git = GitCli::new();
    let root = store_root(&cli, &git)?;
    let refresh = config.auto_refresh;
    let apply = cli.apply;
    let session = Session::new(&git, &root, config);

    match cli.command {
        Commands::Transfer {
            source,
            target,
            range,
            message,
            edit,
            auto_message: _,
        } => {
            let target = branch_or_default(target, session.config(), "--to")?;
            session.preflight(refresh)?;
            let message = if edit {
                let seed = session
                    .config()
                    .transfer_message(&source, &target, range.trim());
                Some(edit_message(&seed)?)
            } else {
                message
            };
            let prepared = session.transfer(&source, &target, &range, message.as_deref())?;
            print_selection(&prepared);
            let proceed = should_proceed(policy, &prepared.duplicates, |dups| {
                confirm(&format!(
                    "Detected {} duplicate patches already on target (e.g., {}). Apply anyway? [y/N] ",
                    dups.len(),
                    short_id(&dups[0])
                ))
            })?;
            if !proceed {
                println!(
                    "Skipping transfer: {} duplicate patch(es) already on {}.",
                    prepared.duplicates.len(),
                    target
                );
                return Ok(());
            }
            finish(&session, &prepared.plan, apply)
        }
        Commands::Revert {
            branch,
            range,
            message,
        } => {
            let branch = branch_or_default(branch, session.config(), "--on")?;
            session.preflight(refresh)?;
            let prepared = session.revert(&branch, &range, message.as_deref())?;
            finish(&session, &prepared.plan, apply)
        }
        Commands::Restore {
            commit,
            branch_name,
        } => {
            session.preflight(refresh)?;
            let prepared = session.restore(&branch_name, &commit)?;
            finish(&session, &prepared.plan, apply)
        }
        Commands::Undo => {
            match session.undo()? {
                Some(entry) => print_undo_entry("Undo", &entry),
                None => println!("Nothing to undo."),
            }
            Ok(())
        }
        Commands::Redo => {
            match session.redo()? {
                Some(entry) => print_undo_entry("Redo", &entry),
                None => println!("Nothing to redo."),
            }
            Ok(())
        }
        Commands::Log => {
            let records = session.history()?;
            if records.is_empty() {
                println!("No operations recorded.");
            }
            for r in records {
                let subject = r.message.lines().next().unwrap_or("");
                println!(
                    "{}  {:<8} {} -> {}  {}..{}  {}",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.kind,
                    r.source,
                    r.target,
                    short_id(&r.start),
                    short_id(&r.end),
                    subject
                );
            }
            Ok(())
        }
    }
}

/// Print the plan (dry run) or execute it, with optional preview.
fn finish(session: &Session<'_, GitCli>, plan: &OperationPlan, apply: bool) -> Result<()> {
    if !apply {
        print_plan(plan);
        println!("Dry run only; pass --apply to execute.");
        return Ok(());
    }

    if session.config().preview {
        print_plan(plan);
        if std::io::stdin().is_terminal() && !confirm("Proceed? [y/N] ")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let done = session.apply(plan)?;
    print_execution(plan, &done);
    Ok(())
}

fn print_selection(prepared: &Prepared) {
    let ids: Vec<&str> = prepared.commits.iter().map(|id| short_id(id)).collect();
    println!("Commits ({}): {}", ids.len(), ids.join(" "));
}

fn print_plan(plan: &OperationPlan) {
    println!("Planned commands:");
    for cmd in plan.commands() {
        println!("  {}", cmd);
    }
}

fn print_execution(plan: &OperationPlan, done: &Execution) {
    for out in &done.output {
        println!("{}", out);
    }
    println!(
        "{} on {} applied: {} -> {}",
        plan.kind,
        plan.target,
        done.before_head.as_deref().map(short_id).unwrap_or("(new)"),
        short_id(&done.after_head)
    );
    println!("Recorded in {}", done.record_path.display());
}

fn print_undo_entry(label: &str, entry: &UndoEntry) {
    println!(
        "{} entry: branch={} before={} after={}",
        label,
        entry.target,
        entry.before_head.as_deref().unwrap_or("(none)"),
        entry.after_head
    );
    println!("Please manually reset your repository as needed (e.g., git reset --hard).");
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

/// Ask a yes/no question on stdin. A non-interactive stdin answers no.
fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Open `$EDITOR` (default `vi`) on a temp file seeded with `seed`.
fn edit_message(seed: &str) -> Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("gitcherry-msg-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(seed.as_bytes())
        .map_err(|e| Error::io(file.path(), e))?;
    file.flush().map_err(|e| Error::io(file.path(), e))?;

    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .map_err(|e| Error::io(program, e))?;
    if !status.success() {
        return Err(Error::invalid_config(format!(
            "editor '{}' exited with {}",
            editor, status
        )));
    }

    let text =
        std::fs::read_to_string(file.path()).map_err(|e| Error::io(file.path(), e))?;
    let message = text.trim();
    if message.is_empty() {
        return Err(Error::invalid_config("commit message is empty"));
    }
    Ok(message.to_string())
}
