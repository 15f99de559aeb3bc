use clap::{Parser, Subcommand, ValueEnum};
use djbundle::pipeline::{Pipeline, Stage, StageReport};
use djbundle::rules::{Pass, RuleTable, Scope};
use djbundle::{Config, Result, scan_templates, watch};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LONG_HELP: &str = r#"
Source layout (defaults, see djbundle.toml to change them):
  src/**/*.html        - Page templates, written to templates/
  src/partials/**      - Include-only fragments, never written out
  src/assets/css/      - Copied to static/css/
  src/assets/js/       - Copied to static/js/
  src/assets/images/   - Copied to static/images/
  src/assets/fonts/    - Copied to static/fonts/
  package.json         - Runtime dependencies, copied to static/libs/

Examples:
  # Full production build
  djbundle build
  # Build once, then rebuild whatever changes
  djbundle develop
  # Regenerate the templates only
  djbundle templates
  # Report src/href values no template tag wraps
  djbundle check
  # Same, as JSON for scripting
  djbundle check --format json
  # Show the rewrite rules in the order they run
  djbundle rules
  # Build a project elsewhere, with debug logging
  djbundle --root ../site -vv build
"#;

/// Django template and static asset bundler.
#[derive(Parser, Debug)]
#[command(
    name = "djbundle",
    version,
    about = "Turn HTML/CSS/JS sources into Django templates and static files.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Project root; source and output folders resolve against it
    #[arg(short, long, value_name = "DIR", env = "DJBUNDLE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Configuration file (defaults to <root>/djbundle.toml when present)
    #[arg(short, long, value_name = "FILE", env = "DJBUNDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build once, then watch the sources and rebuild on change
    Develop,
    /// Clean and rebuild everything, including libraries
    Build,
    /// Render templates and run the corrective pass
    Templates,
    /// Copy stylesheets
    Css,
    /// Copy scripts
    Js,
    /// Copy images
    Images,
    /// Copy fonts
    Fonts,
    /// Copy runtime dependencies from node_modules
    Libs,
    /// Run the corrective pass over the written templates
    FixRefs,
    /// Remove the static subtrees
    Clean,
    /// Create the destination folders
    Init,
    /// Report asset references that no template tag wraps
    Check {
        /// Report format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: CheckFormat,
    },
    /// Print the active rewrite rules in order
    Rules,
}

impl Command {
    /// Stages for the commands that map onto a fixed sequence
    fn stages(&self) -> &'static [Stage] {
        match self {
            Command::Templates => &[Stage::InitFolders, Stage::Templates, Stage::FixRefs],
            Command::Css => &[Stage::InitFolders, Stage::Css],
            Command::Js => &[Stage::InitFolders, Stage::Js],
            Command::Images => &[Stage::InitFolders, Stage::Images],
            Command::Fonts => &[Stage::InitFolders, Stage::Fonts],
            Command::Libs => &[Stage::InitFolders, Stage::Libs],
            Command::FixRefs => &[Stage::FixRefs],
            Command::Clean => &[Stage::CleanStatic],
            Command::Init => &[Stage::InitFolders],
            Command::Develop | Command::Build | Command::Check { .. } | Command::Rules => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CheckFormat {
    /// One line per finding
    Plain,
    /// JSON array for scripting
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DJBUNDLE_LOG").unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.root, cli.config.as_deref())?;

    match &cli.command {
        Command::Rules => {
            print_rules(Pipeline::new(&config)?.rules());
            Ok(())
        }
        Command::Check { format } => check(&config, *format),
        Command::Develop => watch::develop(&Pipeline::new(&config)?),
        Command::Build => {
            let reports = Pipeline::new(&config)?.build()?;
            summarize(&reports, cli.quiet);
            Ok(())
        }
        command => {
            let reports = Pipeline::new(&config)?.run_sequence(command.stages())?;
            summarize(&reports, cli.quiet);
            Ok(())
        }
    }
}

fn summarize(reports: &[StageReport], quiet: bool) {
    if quiet {
        return;
    }
    for report in reports {
        match report.stage {
            Stage::InitFolders | Stage::CleanStatic => println!("✓ {}", report.stage),
            stage => println!("✓ {stage} ({} files)", report.files),
        }
    }
}

fn check(config: &Config, format: CheckFormat) -> Result<()> {
    let findings = scan_templates(&config.templates_dir());

    match format {
        CheckFormat::Plain => {
            if findings.is_empty() {
                println!("No static asset issues found in templates!");
            } else {
                for finding in &findings {
                    println!("{}", finding.message());
                }
                println!("\nSummary: {} potential issues found", findings.len());
            }
        }
        CheckFormat::Json => {
            let json = serde_json::to_string_pretty(&findings)?;
            println!("{json}");
        }
    }

    Ok(())
}

fn print_rules(rules: &RuleTable) {
    for pass in [Pass::Primary, Pass::Corrective] {
        for (index, rule) in rules.rules(pass).iter().enumerate() {
            let scope = match rule.scope() {
                Scope::First => " (first match)",
                Scope::All => "",
            };
            println!("{pass:<10} {:>2}. {}{scope}", index + 1, rule.name());
            println!("      pattern:     {}", rule.pattern());
            println!("      replacement: {}", rule.replacement().escape_debug());
        }
    }
}
