//! Command-line front-end: one session per invocation.
//!
//! The files are added in the order given, read and checked, then the tool
//! runs once over everything usable and its outputs land in the output
//! directory.

use clap::{ArgAction, Args, Parser, Subcommand};
use sheaf_config::Config;
use sheaf_engine::{CompressionLevel, NativeEngine, Orientation, PageSize};
use sheaf_session::output::DirectorySink;
use sheaf_session::{BatchStatus, FileRecord, RawInput, Session, Status, Tool, format_file_size};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "sheaf", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "SHEAF_CONFIG")]
    config: Option<PathBuf>,
    /// Log more (-v for debug, -vv for trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Directory to write outputs into (defaults to the current directory).
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Combine PDFs into one document, in the order given.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Shrink each PDF on its own.
    Compress(CompressArgs),
    /// Turn images into one PDF, one page per image.
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
struct CompressArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// basic or strong.
    #[arg(long)]
    level: Option<CompressionLevel>,
    /// Keep document metadata even at the strong level.
    #[arg(long)]
    keep_metadata: bool,
    /// Drop annotations (comments, highlights, form widgets).
    #[arg(long)]
    flatten_annotations: bool,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// a4, letter or original.
    #[arg(long)]
    page_size: Option<PageSize>,
    /// auto, portrait or landscape.
    #[arg(long)]
    orientation: Option<Orientation>,
    /// Margin on every side, in millimetres.
    #[arg(long)]
    margin: Option<f32>,
    /// JPEG quality in (0, 1]; exactly 1 embeds the images losslessly.
    #[arg(long)]
    quality: Option<f32>,
}

impl Command {
    /// Fold the command's options into `config`.
    fn apply(self, config: &mut Config) -> (Tool, Vec<PathBuf>) {
        match self {
            Command::Merge { files } => (Tool::Merge, files),
            Command::Compress(args) => {
                if let Some(level) = args.level {
                    config.compression.level = level;
                }
                if args.keep_metadata {
                    config.compression.remove_metadata = false;
                }
                if args.flatten_annotations {
                    config.compression.flatten_annotations = true;
                }
                (Tool::Compress, args.files)
            },
            Command::Convert(args) => {
                if let Some(page_size) = args.page_size {
                    config.convert.page_size = page_size;
                }
                if let Some(orientation) = args.orientation {
                    config.convert.orientation = orientation;
                }
                if let Some(margin) = args.margin {
                    config.convert.margin_mm = margin;
                }
                if let Some(quality) = args.quality {
                    config.convert.image_quality = quality;
                }
                (Tool::Convert, args.images)
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<ExitCode, BoxError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(directory) = cli.output {
        config.output.directory = Some(directory);
    }
    let (tool, paths) = cli.command.apply(&mut config);
    config.validate()?;

    let sink = Arc::new(DirectorySink::new("directory", config.output.directory_or_current()));
    let session = Session::init(tool, &config, Arc::new(NativeEngine::new()), sink)?;
    let outcome = process(&session, paths).await;
    session.dispose();
    outcome
}

async fn process(session: &Session, paths: Vec<PathBuf>) -> Result<ExitCode, BoxError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in &paths {
        inputs.push(RawInput::from_path(path).await?);
    }
    if let Err(err) = session.add_files(inputs) {
        return Err(banner_or(session, err.into()));
    }
    session.settled().await;
    for file in session.files() {
        report_notice(&file);
    }

    let run = session.run().map_err(|err| banner_or(session, err.into()))?;
    run.await?;
    let batch = session.batch();
    if batch.status == BatchStatus::Error {
        eprintln!("{}", batch.message);
        return Ok(ExitCode::FAILURE);
    }

    match session.tool() {
        Tool::Compress => {
            for file in session.files() {
                report_result(&file);
            }
            for path in session.download_all().await? {
                println!("{}", path.display());
            }
        },
        Tool::Merge | Tool::Convert => {
            let delivered = session.last_output().and_then(|output| output.path);
            match delivered {
                Some(path) => println!("{}", path.display()),
                None => {
                    if let Some(message) = session.error() {
                        eprintln!("{message}");
                    }
                    return Ok(ExitCode::FAILURE);
                },
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}

/// Prefer the session's own message (it is written for the user).
fn banner_or(session: &Session, err: BoxError) -> BoxError {
    match session.error() {
        Some(message) => message.into(),
        None => err,
    }
}

fn report_notice(file: &FileRecord) {
    if let Some(notice) = &file.last_error {
        eprintln!("{}: {}", file.name, notice.message);
    }
}

fn report_result(file: &FileRecord) {
    if file.status != Status::Transformed {
        return;
    }
    if let Some(result) = &file.result {
        eprintln!(
            "{}: {} -> {} ({:.1}% smaller)",
            file.name,
            format_file_size(file.original_size),
            format_file_size(result.size),
            result.ratio
        );
    }
}
