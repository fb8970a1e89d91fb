use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use sitewright::config::{Config, Mode};
use sitewright::logging::{self, LogLevel};
use sitewright::notifier::Notifier;
use sitewright::tasks::{self, BuildSummary, PipelineKind};
use sitewright::watch::{self, Shutdown};
use sitewright::{lint, output, serve};

#[derive(Parser)]
#[command(name = "sitewright")]
#[command(about = "Static site asset builder with a live-reload dev server")]
#[command(long_about = "\
Static site asset builder with a live-reload dev server

Sources live under src/, vendored assets under vendor/, and builds
compile everything into dist/:

  project/
  ├── sitewright.toml              # Optional config (overrides stock defaults)
  ├── src/
  │   ├── pages/                   # Page templates → dist/**/*.html
  │   ├── templates/               # Shared fragments pages extend or include
  │   ├── styles/                  # Stylesheets → dist/assets/css/
  │   ├── img/                     # Images → dist/assets/img/
  │   └── js-modules/              # Scripts → dist/assets/js-modules/
  ├── vendor/
  │   └── fontawesome/             # Icon font → dist/assets/webfonts/
  └── dist/                        # Build output (wiped by clean)

Production builds minify pages and styles, optimize images, compress
scripts, and emit content-hashed stylesheet names with a
manifest/css.json mapping for deploys. Development builds keep output
readable and attach source map sidecars.

The STATIC_URL environment variable sets the URL prefix pages reference
assets under; when unset, assets resolve relative to the page.

Run 'sitewright' with no command to start the dev loop: one development
build, then watch sources and serve the output with live reload.")]
#[command(version)]
struct Cli {
    /// Project root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: sitewright.toml in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the build mode
    #[arg(long, value_enum, global = true)]
    mode: Option<ModeArg>,

    /// Log level (default: info, or SITEWRIGHT_LOG)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Compile all sources into the output tree
    Build,
    /// Remove the output tree
    Clean,
    /// Compile stylesheets only
    Style,
    /// Lint script modules
    Lint,
    /// Build, then watch sources and serve the output with live reload
    Dev,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Development,
    Production,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Development => Mode::Development,
            ModeArg::Production => Mode::Production,
        }
    }
}

/// Builds default to production, everything else to development. The dev
/// loop is development regardless; its watch reruns are too.
fn resolve_mode(arg: Option<ModeArg>, command: &Command) -> Mode {
    match command {
        Command::Build => arg.map(Mode::from).unwrap_or(Mode::Production),
        Command::Dev => Mode::Development,
        _ => arg.map(Mode::from).unwrap_or(Mode::Development),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level);

    let command = cli.command.unwrap_or(Command::Dev);
    let config = Arc::new(Config::load(&cli.root, cli.config.as_deref())?);
    let mode = resolve_mode(cli.mode, &command);

    match command {
        Command::Build => {
            let notifier = Arc::new(Notifier::new());
            let summary = tasks::build(&config, mode, &notifier).await?;
            output::print_build_summary(&summary, mode);
            if !summary.is_clean() {
                anyhow::bail!("build finished with failures");
            }
        }
        Command::Clean => {
            tasks::clean(&config)?;
        }
        Command::Style => {
            let notifier = Notifier::new();
            let report = tasks::run_pipeline(PipelineKind::Styles, &config, mode, &notifier)?;
            let mut summary = BuildSummary::default();
            summary.reports.push(report);
            summary.alerts = notifier.alerts();
            output::print_build_summary(&summary, mode);
        }
        Command::Lint => {
            // Findings are informational; the command itself succeeds.
            let report = lint::run(&config)?;
            output::print_lint_report(&report);
        }
        Command::Dev => {
            run_dev(config).await?;
        }
    }

    Ok(())
}

/// The dev loop: one development build, then source watching and the
/// live-reload server until Ctrl-C.
async fn run_dev(config: Arc<Config>) -> anyhow::Result<()> {
    let notifier = Arc::new(Notifier::new());
    let shutdown = Shutdown::new();

    let summary = tasks::build(&config, Mode::Development, &notifier).await?;
    output::print_build_summary(&summary, Mode::Development);

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            signal_shutdown.trigger();
        }
    });

    let watcher = watch::watch_sources(Arc::clone(&config), notifier, shutdown.clone());
    let server = serve::run(Arc::clone(&config), shutdown);
    tokio::try_join!(
        async { watcher.await.map_err(anyhow::Error::from) },
        async { server.await.map_err(anyhow::Error::from) },
    )?;
    Ok(())
}
