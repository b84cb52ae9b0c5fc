//! waldur_os_security_group - manage OpenStack security groups through Waldur
//!
//! Reads the module arguments file, runs the module and prints the result as
//! a single JSON object on stdout. Logs go to stderr.

mod cli;

use anyhow::Result;
use cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use waldur_os::config::{LogFormat, LoggingConfig, Settings};
use waldur_os::invocation::ModuleInvocation;
use waldur_os::modules::{ModuleOutput, ModuleRegistry};
use waldur_os::output;

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Load configuration before logging so the logging section applies
    let loaded = Settings::load(cli.config.as_ref());
    let logging = loaded
        .as_ref()
        .map(|settings| settings.logging.clone())
        .unwrap_or_default();
    init_logging(cli.verbosity(), &logging);

    tracing::debug!("waldur_os_security_group v{}", VERSION);

    let settings = loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}", e);
        Settings::default()
    });

    let result = run(&cli, &settings);
    if let Err(ref e) = result {
        tracing::error!("{}", e);
    }

    if cli.is_json() {
        println!("{}", serde_json::to_string(&output::json_result(&result))?);
    } else {
        println!("{}", output::human_result(&cli.module, &result));
        if let Some(diff) = result.as_ref().ok().and_then(output::human_diff) {
            println!("{}", diff);
        }
    }

    let failed = result.as_ref().map_or(true, ModuleOutput::is_failed);
    std::process::exit(i32::from(failed));
}

/// Run the requested module against the arguments file
fn run(cli: &Cli, settings: &Settings) -> waldur_os::error::Result<ModuleOutput> {
    let mut invocation = ModuleInvocation::from_file(&cli.args_file)?;
    settings.waldur.apply_defaults(&mut invocation.params);

    let context = invocation.context(cli.check_mode, cli.diff_mode);
    tracing::info!(
        module = %cli.module,
        check_mode = context.check_mode,
        diff_mode = context.diff_mode,
        "Running module"
    );

    let registry = ModuleRegistry::with_builtins();
    Ok(registry.execute(&cli.module, &invocation.params, &context)?)
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let json = logging.format == LogFormat::Json;
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity >= 3)
    });
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(env_filter)
        .init();
}
