use mutscope::aggregator::{Completion, Report};
use mutscope::catalog::Catalog;
use mutscope::config::Settings;
use mutscope::copy_tree;
use mutscope::coverage::{self, CoverageIndex};
use mutscope::equivalence::EquivalenceRegistry;
use mutscope::error::EngineError;
use mutscope::generator::GenerateOptions;
use mutscope::output::{self, ConsoleSink, JsonSink, ReportSink};
use mutscope::parser;
use mutscope::pipeline::{self, Engine};
use mutscope::runner::CommandRunner;
use mutscope::scheduler::{CancelToken, SchedulerConfig, WorkspaceMode};
use mutscope::state;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mutscope", version, about = "Coverage-guided mutation testing for Java, C and Rust")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mutate source files and run the covering tests against each mutant
    Run(RunArgs),
    /// Show details for a survived mutant by ref
    Show {
        /// Mutant ref (e.g. @m1 or m1)
        #[arg(name = "ref")]
        mutant_ref: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Summary of last run
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List the mutation operators
    Operators {
        /// Config file whose operator selection to mark
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the functions a file defines
    Functions {
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Source files to mutate (.java, .c, .h, .rs)
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Project root (default: nearest directory with a build file)
    #[arg(short, long)]
    project: Option<PathBuf>,
    /// Config file (default: mutscope.yaml in the project root)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON coverage records, repeatable
    #[arg(long)]
    coverage: Vec<PathBuf>,
    /// Directory of per-test LCOV files named <test>.info, repeatable
    #[arg(long)]
    lcov_dir: Vec<PathBuf>,
    /// Test command template with {tests} or {test}
    #[arg(long, env = "MUTSCOPE_TEST_CMD")]
    test_cmd: Option<String>,
    /// Worker count
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Per-mutant timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Function name to scope mutations to
    #[arg(short, long)]
    function: Option<String>,
    /// Equivalence registry file, loaded before and saved after the run
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,
    /// Write the JSON report here as well
    #[arg(long)]
    report: Option<PathBuf>,
    /// Exit code only, no output
    #[arg(short, long)]
    quiet: bool,
    /// Print each verdict as it arrives
    #[arg(short, long)]
    verbose: bool,
    /// Session ID for worker directory names (default: auto-generated)
    #[arg(long)]
    session: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Show { mutant_ref, json } => cmd_show(mutant_ref, json),
        Commands::Status { json } => cmd_status(json),
        Commands::Operators { config } => cmd_operators(config),
        Commands::Functions { file } => cmd_functions(file),
    };

    process::exit(exit_code);
}

fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// 0 when nothing survived, 1 when something did, 2 for usage problems,
/// 3 when the run itself failed.
fn exit_code_for(report: &Report) -> i32 {
    match report.completion {
        Completion::Aborted(_) => 3,
        _ if report.summary.survived > 0 => 1,
        _ => 0,
    }
}

fn error_code(e: &EngineError) -> i32 {
    match e {
        EngineError::Config(_) | EngineError::Yaml(_) | EngineError::Coverage(_) => 2,
        _ => 3,
    }
}

fn cmd_run(args: RunArgs) -> i32 {
    // Everything downstream expects absolute paths: ids and coverage units
    // are made relative to the project root by stripping it.
    let mut files = Vec::with_capacity(args.files.len());
    for file in &args.files {
        match file.canonicalize() {
            Ok(path) => files.push(path),
            Err(_) => {
                output::print_error(&format!(
                    "Source file not found: {}. Check the path and try again.",
                    file.display()
                ));
                return 2;
            }
        }
    }

    let project_root = match &args.project {
        Some(p) => match p.canonicalize() {
            Ok(root) => root,
            Err(e) => {
                output::print_error(&format!("Project root {}: {}", p.display(), e));
                return 2;
            }
        },
        None => copy_tree::find_project_root(&files[0]),
    };

    match run(&args, &files, &project_root) {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&e.to_string());
            error_code(&e)
        }
    }
}

fn run(args: &RunArgs, files: &[PathBuf], project_root: &Path) -> mutscope::error::Result<i32> {
    log::debug!("Project root {}", project_root.display());
    let mut settings = Settings::discover(args.config.as_deref(), project_root)?;
    settings.resolve_paths(project_root)?;
    if let Some(cmd) = &args.test_cmd {
        settings.test_command = cmd.clone();
    }
    if let Some(jobs) = args.jobs {
        settings.jobs = jobs;
    }
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(registry) = &args.registry {
        settings.equivalence_registry = Some(registry.clone());
    }
    settings.coverage.extend(args.coverage.iter().cloned());
    settings.lcov_dirs.extend(args.lcov_dir.iter().cloned());
    settings.validate()?;

    let catalog = Catalog::from_names(&settings.operators, settings.rewrite_policy())?;
    let registry = match &settings.equivalence_registry {
        Some(path) => EquivalenceRegistry::load(path)?,
        None => EquivalenceRegistry::new(),
    };

    let mut records = Vec::new();
    for path in &settings.coverage {
        records.extend(coverage::load_json(path)?);
    }
    for dir in &settings.lcov_dirs {
        records.extend(coverage::load_lcov_dir(dir, Some(project_root))?);
    }
    let index = CoverageIndex::build(records);
    if index.is_empty() {
        log::warn!("No coverage data: every mutant will survive untested");
    } else {
        log::info!("Coverage index: {} covered lines", index.covered_lines());
    }

    let runner = CommandRunner::new(settings.test_command.clone())
        .with_separator(settings.test_separator.clone())
        .with_compile_error_markers(settings.compile_error_markers.clone())
        .with_fail_fast(settings.fail_fast);

    let scheduler = SchedulerConfig {
        project_root: project_root.to_path_buf(),
        jobs: settings.jobs,
        timeout: settings.timeout(),
        infra_retries: settings.infra_retries,
        retry_backoff: settings.retry_backoff(),
        workspace: match &settings.workspace_root {
            Some(root) => WorkspaceMode::Persistent(root.clone()),
            None => WorkspaceMode::Temporary,
        },
        session_id: args.session.clone().unwrap_or_else(generate_session_id),
    };

    let sources = pipeline::load_sources(project_root, files)?;
    if !index.is_empty() {
        let covered = index.units();
        for source in &sources {
            if !covered.contains(coverage::normalize_unit(source.path.as_str()).as_str()) {
                log::warn!("No coverage recorded for {}", source.path);
            }
        }
    }
    let engine = Engine {
        catalog: &catalog,
        registry: &registry,
        index: &index,
        runner: &runner,
        scheduler,
        options: GenerateOptions {
            function: args.function.clone(),
            skip_call_prefixes: settings.skip_call_prefixes.clone(),
            ..GenerateOptions::default()
        },
        cancel: CancelToken::new(),
    };

    let verbose = args.verbose && !args.quiet;
    let report = engine.run(&sources, &mut |result| {
        if verbose {
            output::print_progress(result);
        }
    })?;

    if let Some(path) = &settings.equivalence_registry {
        registry.save(path)?;
        log::debug!("Saved {} equivalence shapes", registry.len());
    }

    if let Err(e) = state::save_last_run(&state::RunResult::from_report(&report)) {
        log::warn!("Could not save run state: {}", e);
    }
    if let Some(path) = &args.report {
        JsonSink::to_file(path).emit(&report)?;
        if !args.quiet && !args.json {
            output::print_success(&format!("Report written to {}", path.display()));
        }
    }

    if !args.quiet {
        if args.json {
            JsonSink::stdout().emit(&report)?;
        } else {
            ConsoleSink.emit(&report)?;
        }
    }

    Ok(exit_code_for(&report))
}

fn cmd_show(mutant_ref: String, json_mode: bool) -> i32 {
    let result = match state::load_last_run() {
        Some(r) => r,
        None => {
            output::print_error("No previous run found. Run `mutscope run` first.");
            return 2;
        }
    };

    let mutant = match result.find(&mutant_ref) {
        Some(m) => m,
        None => {
            output::print_error(&format!(
                "Mutant ref '{}' not found. Use `mutscope status` to see available refs.",
                mutant_ref.trim_start_matches('@')
            ));
            return 2;
        }
    };

    if json_mode {
        match serde_json::to_string_pretty(mutant) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                output::print_error(&format!("Failed to serialize mutant: {}", e));
                return 3;
            }
        }
    } else {
        output::print_mutant_detail(mutant);
    }

    0
}

fn cmd_status(json_mode: bool) -> i32 {
    let result = match state::load_last_run() {
        Some(r) => r,
        None => {
            output::print_error("No previous run found. Run `mutscope run` first.");
            return 2;
        }
    };

    if json_mode {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                output::print_error(&format!("Failed to serialize state: {}", e));
                return 3;
            }
        }
    } else {
        output::print_status(&result);
    }

    0
}

fn cmd_operators(config: Option<PathBuf>) -> i32 {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let selected = Settings::discover(config.as_deref(), &cwd)
        .and_then(|s| Catalog::from_names(&s.operators, s.rewrite_policy()));
    match selected {
        Ok(catalog) => {
            output::print_operators(&catalog);
            0
        }
        Err(e) => {
            output::print_error(&e.to_string());
            error_code(&e)
        }
    }
}

fn cmd_functions(file: PathBuf) -> i32 {
    let language = match mutscope::detect_language(&file) {
        Some(l) => l,
        None => {
            output::print_error(&format!(
                "Unsupported file type: {}. Expected .java, .c, .h or .rs.",
                file.display()
            ));
            return 2;
        }
    };
    let text = match std::fs::read_to_string(&file) {
        Ok(t) => t,
        Err(e) => {
            output::print_error(&format!("Failed to read {}: {}", file.display(), e));
            return 3;
        }
    };
    match parser::list_functions(language, &text) {
        Ok(names) => {
            for name in names {
                println!("{}", name);
            }
            0
        }
        Err(e) => {
            output::print_error(&e.to_string());
            3
        }
    }
}
