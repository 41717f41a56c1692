use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio::io::BufReader;

use fixprint_logs::{InputSource, InterruptFlag, Report, RunOutcome, StopReason, StreamLoop};
use fixprint_protocol::{Dictionary, FixDecoder};

mod signals;

/// fixprint - FIX protocol log printer
#[derive(Parser, Debug)]
#[command(name = "fixprint")]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
#[command(arg(
    clap::Arg::new("version")
        .short('v')
        .long("version")
        .action(clap::ArgAction::Version)
        .help("Print version then exit")
))]
#[command(after_help = "Examples:
  fixprint myfix_server_protocol.log
  fixprint -s -o 12 myfix_client_protocol.log
  cat myfix_client_protocol.log | fixprint -")]
struct Args {
    /// FIX protocol log file, use '-' for stdin
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Bytes to skip on each line before parsing the FIX message
    #[arg(short, long, default_value_t = 0, value_name = "BYTES")]
    offset: usize,

    /// Generate a message summary
    #[arg(short, long)]
    summary: bool,

    /// Print the FIX context (begin string and version) then exit
    #[arg(short, long)]
    context: bool,

    /// TOML file with additional message types and fields
    #[arg(short, long, value_name = "FILE")]
    dictionary: Option<PathBuf>,

    /// Do not validate message checksums
    #[arg(long)]
    no_checksum: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Help and version go to stdout and are not errors
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Diagnostics go to stderr so stdout carries only decoded messages
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(args));

    // A stdin read parked in the blocking pool cannot be cancelled
    runtime.shutdown_background();

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut dictionary = Dictionary::fix42();
    if let Some(path) = &args.dictionary {
        dictionary.load_overlay(path)?;
    }

    if args.context {
        println!("Context FIX beginstring:{}", dictionary.begin_string());
        println!("Context FIX version:{}", dictionary.version());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(input_name) = args.input.as_deref().filter(|name| !name.is_empty()) else {
        let _ = Args::command().write_help(&mut io::stderr());
        return Ok(ExitCode::FAILURE);
    };

    let interrupt = InterruptFlag::new();
    signals::spawn_listener(interrupt.clone()).context("failed to install signal handlers")?;

    let decoder = FixDecoder::new(&dictionary).with_checksum_validation(!args.no_checksum);
    let mut stream = StreamLoop::new(decoder, interrupt)
        .with_offset(args.offset)
        .with_summary(args.summary);

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = if input_name == "-" {
        InputSource::from_reader(&mut stdin)
    } else {
        InputSource::open(input_name).await?
    };

    let mut stdout = io::stdout();
    let RunOutcome {
        decoded,
        summary,
        reason,
    } = stream.run(&mut input, &mut stdout).await;
    drop(input);

    let failed = match reason {
        StopReason::EndOfStream => false,
        StopReason::Interrupted => {
            eprintln!("interrupted");
            false
        }
        StopReason::Failed(err) => {
            eprintln!("Error: {:#}", anyhow::Error::new(err));
            true
        }
    };

    Report::new(decoded, summary.as_ref()).write(&mut stdout, &dictionary)?;

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
