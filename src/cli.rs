use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::commands::{self, CommandOutput, Context};
use crate::env_loader;
use crate::seamless::monitor::DetachedLauncher;
use crate::seamless::paths::resolve_paths;
use crate::seamless::statusline::PLACEHOLDER_LINE;

#[derive(Debug, Parser)]
#[command(name = "seamless")]
#[command(about = "Distill long-running sessions into handoff summaries before their context fills")]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Per-turn hook: watch usage, admit jobs, print the status line.
    Statusline,
    /// Host pre-compaction hook.
    PreCompact,
    /// Prompt hook: deliver pending one-shot notices.
    PromptSubmit,
    /// Session start hook: print restore context.
    SessionStart,
    /// Background worker for one session.
    Compact(CompactArgs),
    Resume(ResumeArgs),
    Summarise(SummariseArgs),
    Status,
}

#[derive(Debug, Args)]
pub struct CompactArgs {
    pub session_id: String,
    pub transcript: PathBuf,
    /// Token of the lock the launching hook acquired.
    #[arg(long, hide = true)]
    pub lock_token: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct ResumeArgs {
    #[arg(long, conflicts_with_all = ["latest", "session"])]
    pub list: bool,
    #[arg(long, conflicts_with = "session")]
    pub latest: bool,
    /// Session id or unique prefix.
    pub session: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct SummariseArgs {
    #[arg(long)]
    pub list: bool,
    #[arg(long)]
    pub force: bool,
    /// Session id or prefix.
    pub prefix: Option<String>,
}

impl Command {
    fn hook_name(&self) -> Option<&'static str> {
        match self {
            Command::Statusline => Some("statusline"),
            Command::PreCompact => Some("pre-compact"),
            Command::PromptSubmit => Some("prompt-submit"),
            Command::SessionStart => Some("session-start"),
            _ => None,
        }
    }
}

fn print_report(report: &commands::CommandReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("command: {}", report.command);
    println!("ok: {}", report.ok);
    if !report.details.is_empty() {
        println!("details:");
        for detail in &report.details {
            println!("- {detail}");
        }
    }
    if !report.issues.is_empty() {
        println!("issues:");
        for issue in &report.issues {
            println!("- {issue}");
        }
    }
    Ok(())
}

fn print_text(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn dispatch_hook(command: &Command, stdin: &str) -> Result<String> {
    let ctx = Context::load()?;
    match command {
        Command::Statusline => {
            commands::statusline::run(&ctx, stdin, &DetachedLauncher::current()?)
        }
        Command::PreCompact => {
            commands::pre_compact::run(&ctx, stdin, &DetachedLauncher::current()?)
        }
        Command::PromptSubmit => commands::prompt_submit::run(&ctx, stdin),
        Command::SessionStart => commands::session_start::run(&ctx, stdin),
        _ => Ok(String::new()),
    }
}

/// Hooks always exit 0: a failure is logged and the host carries on.
fn run_hook(command: &Command, name: &str) -> Result<()> {
    let mut stdin = String::new();
    let _ = io::stdin().read_to_string(&mut stdin);

    match dispatch_hook(command, &stdin) {
        Ok(text) => print_text(&text),
        Err(err) => {
            match resolve_paths() {
                Ok(paths) => commands::record_hook_error(&paths, name, &err),
                Err(_) => eprintln!("seamless {name}: {err:#}"),
            }
            if matches!(command, Command::Statusline) {
                println!("{PLACEHOLDER_LINE}");
            }
            Ok(())
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let _ = env_loader::load_dotenv();

    if let Some(name) = cli.command.hook_name() {
        return run_hook(&cli.command, name);
    }

    let ctx = Context::load()?;
    let output = match &cli.command {
        Command::Compact(args) => CommandOutput::Report(commands::compact::run(
            &ctx,
            &args.session_id,
            &args.transcript,
            args.lock_token.as_deref(),
        )?),
        Command::Resume(args) => CommandOutput::Text(commands::resume::run(
            &ctx,
            &commands::resume::ResumeOptions {
                list: args.list,
                latest: args.latest,
                selector: args.session.clone(),
            },
        )?),
        Command::Summarise(args) => commands::summarise::run(
            &ctx,
            &commands::summarise::SummariseOptions {
                prefix: args.prefix.clone(),
                list: args.list,
                force: args.force,
            },
        )?,
        Command::Status => CommandOutput::Report(commands::status::run(&ctx)?),
        Command::Statusline | Command::PreCompact | Command::PromptSubmit | Command::SessionStart => {
            return Ok(());
        }
    };

    match output {
        CommandOutput::Text(text) => print_text(&text),
        CommandOutput::Report(report) => {
            print_report(&report, cli.json)?;
            if report.ok {
                Ok(())
            } else {
                std::process::exit(2);
            }
        }
    }
}
