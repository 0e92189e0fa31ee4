//! CLI for Aviatrix acceptance-test environments
//!
//! Lets CI scripts check a runner's configuration before launching the
//! Terraform suite:
//! - `check` validates the full configuration and lists every problem
//! - `credentials` prints the masked credential summary
//! - `precheck` runs the controller and per-provider pre-checks
//! - `name` generates a test resource name
//! - `prune-logs` removes stale log files from the artifact directory

#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use aviatrix_acctest_core::config::REGION_FALLBACKS;
use aviatrix_acctest_core::precheck::{self, PreCheckOutcome};
use aviatrix_acctest_core::{
    ConfigError, EnvSnapshot, LoggerFactory, Provider, ResourceNamingConfig, TestConfiguration,
    credentials_summary, naming,
};

/// Exit code for a pre-check that decided to skip.
pub const EXIT_SKIPPED: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("exit code {0}")]
    ExitCode(i32),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] aviatrix_acctest_core::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "avx-acctest", version, about = "Aviatrix acceptance-test environment helper")]
pub struct Cli {
    /// Overlay a dotenv file; variables already set in the environment win.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate controller and provider configuration.
    Check,
    /// Show configured credentials with secrets masked.
    Credentials {
        #[arg(long)]
        json: bool,
    },
    /// Decide whether tests for one provider would run, skip, or fail.
    Precheck {
        /// aws, azure, gcp, or oci
        provider: String,
    },
    /// Generate a test resource name.
    Name {
        resource_type: String,
        /// `{prefix}-{8 random chars}` instead of the timestamped form.
        #[arg(long)]
        random: bool,
    },
    /// Delete log files older than the given age, e.g. `7d` or `36h`.
    #[command(name = "prune-logs")]
    PruneLogs {
        #[arg(long, value_parser = humantime::parse_duration)]
        older_than: Duration,
    },
}

pub fn run() -> i32 {
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(cli, EnvSnapshot::from_process(), &mut out) {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            err_exit_code(&err)
        }
    }
}

const fn err_exit_code(err: &CliError) -> i32 {
    match err {
        CliError::ExitCode(code) => *code,
        _ => 1,
    }
}

fn emit_error(err: &CliError) {
    if matches!(err, CliError::ExitCode(_)) {
        return;
    }
    eprintln!("error: {err}");
}

/// Run one parsed command against `env`, writing its report to `out`.
pub fn execute(cli: Cli, env: EnvSnapshot, out: &mut impl Write) -> CliResult<()> {
    let env = match &cli.env_file {
        Some(path) => env.with_env_file(path)?,
        None => env,
    };
    match cli.command {
        Commands::Check => handle_check(&env, out),
        Commands::Credentials { json } => handle_credentials(&env, json, out),
        Commands::Precheck { provider } => handle_precheck(&env, &provider, out),
        Commands::Name {
            resource_type,
            random,
        } => handle_name(&env, &resource_type, random, out),
        Commands::PruneLogs { older_than } => handle_prune(&env, older_than, out),
    }
}

fn handle_check(env: &EnvSnapshot, out: &mut impl Write) -> CliResult<()> {
    let config = TestConfiguration::resolve(env);
    write!(out, "{}", config.summary())?;
    match config.validate() {
        Ok(()) => {
            writeln!(out, "configuration OK")?;
            Ok(())
        }
        Err(e) => {
            writeln!(out, "{e}")?;
            Err(CliError::ExitCode(1))
        }
    }
}

fn handle_credentials(env: &EnvSnapshot, json: bool, out: &mut impl Write) -> CliResult<()> {
    let summary = credentials_summary(env);
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        write!(out, "{summary}")?;
    }
    Ok(())
}

fn handle_precheck(env: &EnvSnapshot, provider: &str, out: &mut impl Write) -> CliResult<()> {
    let provider: Provider = provider.parse()?;
    // Same region defaults `check` applies, so the two commands agree.
    let env = &env.clone().with_fallbacks(REGION_FALLBACKS);
    let outcome = precheck::compose([
        precheck::controller_precheck(env),
        precheck::provider_precheck(provider, env),
    ]);
    writeln!(out, "{provider}: {outcome}")?;
    tracing::debug!(%provider, %outcome, "precheck finished");
    match outcome {
        PreCheckOutcome::Run => Ok(()),
        PreCheckOutcome::Skip(_) => Err(CliError::ExitCode(EXIT_SKIPPED)),
        PreCheckOutcome::Fail(_) => Err(CliError::ExitCode(1)),
    }
}

fn handle_name(
    env: &EnvSnapshot,
    resource_type: &str,
    random: bool,
    out: &mut impl Write,
) -> CliResult<()> {
    let naming = ResourceNamingConfig::from_env(env);
    let name = if random {
        naming::generate_test_resource_name(&format!("{}-{resource_type}", naming.prefix))
    } else {
        naming.generate_name(resource_type)
    };
    writeln!(out, "{name}")?;
    Ok(())
}

fn handle_prune(env: &EnvSnapshot, older_than: Duration, out: &mut impl Write) -> CliResult<()> {
    let config = TestConfiguration::resolve(env);
    let removed = LoggerFactory::from_config(&config).cleanup_old_logs(older_than)?;
    writeln!(
        out,
        "removed {removed} log file(s) older than {} from {}",
        humantime::format_duration(older_than),
        config.logs_dir().display()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_prune_duration() {
        let cli = Cli::try_parse_from(["avx-acctest", "prune-logs", "--older-than", "36h"]).unwrap();
        match cli.command {
            Commands::PruneLogs { older_than } => {
                assert_eq!(older_than, Duration::from_secs(36 * 3600));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_duration() {
        assert!(Cli::try_parse_from(["avx-acctest", "prune-logs", "--older-than", "soon"]).is_err());
    }

    #[test]
    fn env_file_is_global() {
        let cli = Cli::try_parse_from(["avx-acctest", "check", "--env-file", "ci.env"]).unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("ci.env")));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(err_exit_code(&CliError::ExitCode(EXIT_SKIPPED)), 3);
        assert_eq!(err_exit_code(&CliError::Io(io::Error::other("x"))), 1);
    }
}
