//! Playhost CLI - run guest scripts against the process terminal
//!
//! Guest output goes to stdout with ANSI colors, keystrokes are read from
//! stdin on a background thread, and logs go to stderr.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use playhost::host::{HostConfig, Outcome, ScriptHost};
use playhost::interpreter::compile;
use playhost::terminal::{AnsiColor, AnsiSink, Key, KeyDecoder, TerminalHandle};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "playhost")]
#[command(about = "Run scripts with a cooperative, suspend/resume script host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a script
    Run {
        /// Script file
        file: PathBuf,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for choice/random
        #[arg(long)]
        seed: Option<u64>,

        /// Time slice before yielding to the event loop, in milliseconds
        #[arg(long)]
        yield_ms: Option<u64>,

        /// Color of normal output (green, cyan, bright-white, ...)
        #[arg(long)]
        color: Option<AnsiColor>,

        /// Directory of importable library modules
        #[arg(long)]
        lib: Option<PathBuf>,
    },

    /// Compile a script without running it
    Check {
        /// Script file
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            config,
            seed,
            yield_ms,
            color,
            lib,
        } => {
            let mut config = match config {
                Some(path) => HostConfig::load(path)?,
                None => HostConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(ms) = yield_ms {
                config.yield_limit_ms = ms;
            }
            if let Some(color) = color {
                config.normal_color = color;
            }
            if lib.is_some() {
                config.library_dir = lib;
            }
            run(&file, config)
        }

        Commands::Check { file } => {
            let source = read_script(&file)?;
            match compile(&file.display().to_string(), &source) {
                Ok(program) => {
                    println!("{}: ok ({} instructions)", file.display(), program.code.len());
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("{}: {}", file.display(), err);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn run(file: &Path, config: HostConfig) -> anyhow::Result<ExitCode> {
    let source = read_script(file)?;

    // A cooked-mode TTY already echoes what the user types.
    let echo = config.echo_input && !std::io::stdin().is_terminal();
    let terminal = TerminalHandle::new(AnsiSink::new(std::io::stdout(), config.palette(), echo));

    let (tx, rx) = mpsc::channel(256);
    spawn_stdin_reader(tx);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let mut host = ScriptHost::new(config, terminal, rx)?;

        let cancel = host.cancel_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let outcome = host.run(&source).await?;
        host.teardown();
        Ok::<_, anyhow::Error>(match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failure(_) => ExitCode::FAILURE,
        })
    })
}

fn read_script(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read script {}", file.display()))
}

fn spawn_stdin_reader(tx: mpsc::Sender<Key>) {
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut decoder = KeyDecoder::new();
        let mut buf = [0u8; 1024];
        loop {
            let keys = match stdin.read(&mut buf) {
                Ok(0) => {
                    let _ = send_all(&tx, decoder.finish());
                    break;
                }
                Ok(n) => decoder.feed(&buf[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "stdin read failed");
                    break;
                }
            };
            if send_all(&tx, keys).is_err() {
                break;
            }
        }
    });
}

fn send_all(tx: &mpsc::Sender<Key>, keys: Vec<Key>) -> Result<(), mpsc::error::SendError<Key>> {
    for key in keys {
        tx.blocking_send(key)?;
    }
    Ok(())
}
