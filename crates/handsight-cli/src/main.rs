use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use handsight_contracts::commands::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use handsight_contracts::config::{normalize_base_url, ClientConfig, API_URL_ENV, TIMEOUT_SECS_ENV};
use handsight_contracts::events::EventWriter;
use handsight_contracts::results::{parse_result_with, ScorePolicy};
use handsight_contracts::uploads::detect_mime;
use handsight_engine::{HttpTransport, ResultView, Workflow, WorkflowView};
use serde_json::Value;
use uuid::Uuid;

const EXIT_OK: i32 = 0;
const EXIT_REQUEST_FAILED: i32 = 1;
const EXIT_INVALID_FILE: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "handsight-rs", version, about = "Handwriting trait analysis client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one image and print the profile.
    Analyze(AnalyzeArgs),
    /// Interactive session: open files, analyze, re-analyze.
    Session(SessionArgs),
    /// Render a saved analysis response without contacting the service.
    Inspect(InspectArgs),
}

#[derive(Debug, Parser)]
struct ServiceArgs {
    #[arg(long, env = API_URL_ENV)]
    api_url: String,
    #[arg(long, env = TIMEOUT_SECS_ENV)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[command(flatten)]
    service: ServiceArgs,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[command(flatten)]
    service: ServiceArgs,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct InspectArgs {
    #[arg(long)]
    response: PathBuf,
    /// Fail on out-of-range scores instead of clamping them.
    #[arg(long)]
    strict: bool,
    #[arg(long)]
    json: bool,
}

impl ServiceArgs {
    fn client_config(&self) -> Result<ClientConfig> {
        let timeout = self.timeout_secs.map(Duration::from_secs);
        Ok(ClientConfig::new(normalize_base_url(&self.api_url))?.with_request_timeout(timeout))
    }

    fn workflow(&self, events: Option<&Path>) -> Result<Workflow> {
        let transport = HttpTransport::new(&self.client_config()?)?;
        let workflow = Workflow::new(Arc::new(transport));
        let Some(path) = events else {
            return Ok(workflow);
        };
        let events = EventWriter::new(path, Uuid::new_v4().to_string());
        eprintln!(
            "Session {} logging to {}",
            events.session_id(),
            events.path().display()
        );
        Ok(workflow.with_events(events))
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("handsight-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(EXIT_OK)
        }
        Command::Inspect(args) => run_inspect(args),
    }
}

/// Bytes, declared mime type and display name for a file on disk.
fn read_upload(path: &Path) -> Result<(Vec<u8>, String, Option<String>)> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime_type = detect_mime(path, &bytes);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string());
    Ok((bytes, mime_type, name))
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let mut workflow = args.service.workflow(args.events.as_deref())?;
    let (bytes, mime_type, name) = read_upload(&args.image)?;
    if let Err(err) = workflow.select_file(bytes, &mime_type, name) {
        eprintln!("{}", err.user_message());
        return Ok(EXIT_INVALID_FILE);
    }
    workflow.analyze()?;
    workflow.wait(None);

    let view = WorkflowView::from_state(workflow.state());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view.to_json()?)?);
    } else {
        print!("{}", view.render_text());
    }
    Ok(if view.error.is_some() {
        EXIT_REQUEST_FAILED
    } else {
        EXIT_OK
    })
}

fn run_session(args: SessionArgs) -> Result<()> {
    let mut workflow = args.service.workflow(args.events.as_deref())?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Handsight session started. Type /help for commands.");

    loop {
        if workflow.poll() > 0 {
            print!("{}", WorkflowView::from_state(workflow.state()).render_text());
        }
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match parse_command(input) {
            SessionCommand::Noop => continue,
            SessionCommand::Help => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
            }
            SessionCommand::Open { path } => {
                if path.is_empty() {
                    println!("/open requires a path");
                    continue;
                }
                let (bytes, mime_type, name) = match read_upload(Path::new(&path)) {
                    Ok(upload) => upload,
                    Err(err) => {
                        println!("Open failed: {err:#}");
                        continue;
                    }
                };
                match workflow.select_file(bytes, &mime_type, name) {
                    Ok(state) => print!("{}", WorkflowView::from_state(state).render_text()),
                    Err(err) => println!("{}", err.user_message()),
                }
            }
            SessionCommand::Analyze => match workflow.analyze() {
                Ok(request_id) => println!("Analysis {request_id} started. /wait to block on it."),
                Err(err) => println!("Cannot analyze: {err}"),
            },
            SessionCommand::Status => {
                print!("{}", WorkflowView::from_state(workflow.state()).render_text());
            }
            SessionCommand::Wait => {
                if workflow.wait(None) {
                    print!("{}", WorkflowView::from_state(workflow.state()).render_text());
                } else {
                    println!("No analysis in flight.");
                }
            }
            SessionCommand::Quit => break,
            SessionCommand::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
        }
    }

    workflow.close();
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<i32> {
    let text = fs::read_to_string(&args.response)
        .with_context(|| format!("failed to read {}", args.response.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", args.response.display()))?;
    let policy = if args.strict {
        ScorePolicy::Reject
    } else {
        ScorePolicy::Clamp
    };
    let result = parse_result_with(&raw, policy)
        .with_context(|| format!("{} is not an analysis response", args.response.display()))?;

    let view = ResultView::from_result(&result);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", view.render_text());
    }
    Ok(EXIT_OK)
}
