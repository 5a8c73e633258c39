//! sy binary entry point.

use std::io::Write;
use std::process::ExitCode;

use sy::cli::{self, Args, Subcommand};
use sy::config::Config;
use sy::execution::{self, Command};
use sy::{logging, SyError};
use tracing::debug;

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_TIMEOUT: u8 = 124;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("sy: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sy: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if let Err(e) = logging::init_with_sinks(config.log_filter(), &config.log_sinks()) {
        eprintln!("sy: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }
    debug!("sy v{}", env!("CARGO_PKG_VERSION"));

    match dispatch(&args, &config).await {
        Ok(code) => code,
        Err(e) => {
            if let Some(out) = e.stdout() {
                print!("{out}");
            }
            let _ = std::io::stdout().flush();
            eprintln!("sy: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn dispatch(args: &Args, config: &Config) -> sy::Result<ExitCode> {
    let (Some(subcommand), Some(target)) = (args.subcommand, args.target.as_deref()) else {
        cli::print_help();
        return Ok(ExitCode::from(EXIT_USAGE));
    };

    let command = Command::new(target)
        .args(args.args.iter().cloned())
        .expect(args.expect)
        .prefix(args.prefix.clone());
    let executor = config.executor();

    match subcommand {
        Subcommand::Find => {
            let path = execution::find(target)?;
            if args.json {
                println!("{}", to_json(&serde_json::json!({ "name": target, "path": path }))?);
            } else {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Subcommand::Run => {
            let result = executor.run_async(command).await?;
            if args.json {
                println!("{}", to_json(&result)?);
            } else {
                print!("{}", result.stdout);
                eprint!("{}", result.stderr);
            }
            Ok(ExitCode::from(
                u8::try_from(result.status).unwrap_or(EXIT_FAILURE),
            ))
        }
        Subcommand::Check => {
            let (out, err) = executor.check_async(command).await?;
            if args.json {
                println!(
                    "{}",
                    to_json(&serde_json::json!({ "stdout": out, "stderr": err }))?
                );
            } else {
                print!("{out}");
                eprint!("{err}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Subcommand::Lines => {
            let (out, _) = executor.check_async(command).await?;
            let lines: Vec<&str> = out.lines().collect();
            if args.json {
                println!("{}", to_json(&lines)?);
            } else {
                for line in lines {
                    println!("{line}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> sy::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SyError::Io(e.into()))
}

fn exit_code_for(err: &SyError) -> u8 {
    match err {
        SyError::Timeout { .. } => EXIT_TIMEOUT,
        SyError::ArgumentCountMismatch { .. } | SyError::EmptyCommand => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}
