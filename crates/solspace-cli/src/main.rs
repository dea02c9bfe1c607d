//! Solution space CLI.
//!
//! Provides the `solspace` binary:
//!
//! - `build` folds a directory of learner history files into a solution
//!   graph and stores it in a SQLite database
//! - `hint` recommends the next code state for one source file
//! - `list` prints the stored graphs
//! - `show` prints one graph in breadth-first order
//!
//! Machine-readable results go to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use solspace_core::{CodeInfo, Collaborators, Experience, GraphConfig, Language, Profile, Task, User};
use solspace_hint::{HintConfig, HintError, HintHandler, ScoringWeights, Strategy};
use solspace_storage::{
    construct_solution_graph, history_files_in, GraphKey, GraphStore, SqliteStore, StorageError,
};

const EXIT_OK: i32 = 0;
const EXIT_DOMAIN: i32 = 1;
const EXIT_IO: i32 = 3;

/// Solution space graph builder and hint tool.
#[derive(Parser)]
#[command(name = "solspace", about = "Solution space graph builder and hint tool")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the graph database file.
    #[arg(long, global = true, env = "SOLSPACE_DB_PATH", default_value = "solspace.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build a solution graph from learner history files.
    Build {
        /// Directory holding one `*.json` history file per learner.
        #[arg(long)]
        history: PathBuf,

        #[arg(short, long)]
        task: String,

        #[arg(short, long, value_enum, default_value_t = LanguageArg::Python)]
        language: LanguageArg,

        /// Also write every code variant as a file under this directory.
        #[arg(long)]
        files: Option<PathBuf>,
    },

    /// Recommend the next code state for a source file.
    Hint {
        #[arg(short, long)]
        task: String,

        #[arg(short, long, value_enum, default_value_t = LanguageArg::Python)]
        language: LanguageArg,

        /// Learner source file.
        #[arg(short, long)]
        source: PathBuf,

        /// Pass-rate of the source in [-1, 1]. The line-based collaborators
        /// have no test runner, so omitting it fails the request.
        #[arg(short, long, allow_hyphen_values = true)]
        rate: Option<f64>,

        #[arg(long, default_value = "cli")]
        user: String,

        #[arg(long)]
        age: Option<u32>,

        /// Experience bracket.
        #[arg(long, value_enum)]
        experience: Option<ExperienceArg>,

        /// Hint configuration JSON file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path finder. Overrides the config file.
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Scoring weight preset. Overrides the config file.
        #[arg(long, value_enum)]
        weights: Option<WeightsArg>,

        /// Add the learner's code to the graph and save it back.
        #[arg(long)]
        record: bool,
    },

    /// List stored graphs.
    List,

    /// Print a stored graph in breadth-first order.
    Show {
        #[arg(short, long)]
        task: String,

        #[arg(short, long, value_enum, default_value_t = LanguageArg::Python)]
        language: LanguageArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LanguageArg {
    #[value(alias = "py")]
    Python,
    Java,
    #[value(alias = "kt")]
    Kotlin,
    #[value(alias = "c++")]
    Cpp,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Python => Language::Python,
            LanguageArg::Java => Language::Java,
            LanguageArg::Kotlin => Language::Kotlin,
            LanguageArg::Cpp => Language::Cpp,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    V1,
    V2,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::V1 => Strategy::V1,
            StrategyArg::V2 => Strategy::V2,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "snake_case")]
enum WeightsArg {
    /// Edit distance, population, rate, rollback and structure terms.
    #[value(name = "tree_v7")]
    TreeV7,
    /// Edit distance alone.
    DistanceOnly,
}

impl From<WeightsArg> for ScoringWeights {
    fn from(arg: WeightsArg) -> Self {
        match arg {
            WeightsArg::TreeV7 => ScoringWeights::tree_v7(),
            WeightsArg::DistanceOnly => ScoringWeights::distance_only(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "snake_case")]
enum ExperienceArg {
    LessThanHalfYear,
    FromHalfToOneYear,
    FromOneToTwoYears,
    FromTwoToFourYears,
    FromFourToSixYears,
    MoreThanSixYears,
}

impl From<ExperienceArg> for Experience {
    fn from(arg: ExperienceArg) -> Self {
        match arg {
            ExperienceArg::LessThanHalfYear => Experience::LessThanHalfYear,
            ExperienceArg::FromHalfToOneYear => Experience::FromHalfToOneYear,
            ExperienceArg::FromOneToTwoYears => Experience::FromOneToTwoYears,
            ExperienceArg::FromTwoToFourYears => Experience::FromTwoToFourYears,
            ExperienceArg::FromFourToSixYears => Experience::FromFourToSixYears,
            ExperienceArg::MoreThanSixYears => Experience::MoreThanSixYears,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Build {
            history,
            task,
            language,
            files,
        } => run_build(&cli.db, &history, &task, language.into(), files.as_deref()),
        Commands::Hint {
            task,
            language,
            source,
            rate,
            user,
            age,
            experience,
            config,
            strategy,
            weights,
            record,
        } => {
            let request = HintRequest {
                task,
                language: language.into(),
                source,
                rate,
                user,
                age,
                experience,
                config,
                strategy,
                weights,
                record,
            };
            run_hint(&cli.db, request)
        }
        Commands::List => run_list(&cli.db),
        Commands::Show { task, language } => run_show(&cli.db, &task, language.into()),
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Error reporting
// ---------------------------------------------------------------------------

/// Exit code for a storage failure: domain errors surfacing through storage
/// are 1, everything else is 3.
fn storage_exit(context: &str, e: &StorageError) -> i32 {
    eprintln!("Error: {context}: {e}");
    match e {
        StorageError::Core(_) | StorageError::History { .. } => EXIT_DOMAIN,
        _ => EXIT_IO,
    }
}

fn hint_exit(context: &str, e: &HintError) -> i32 {
    eprintln!("Error: {context}: {e}");
    match e {
        HintError::ConfigIo(_) => EXIT_IO,
        _ => EXIT_DOMAIN,
    }
}

fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {e}\"}}"));
    println!("{json}");
}

fn open_store(db_path: &str) -> Result<SqliteStore, i32> {
    SqliteStore::new(db_path)
        .map_err(|e| storage_exit(&format!("failed to open database '{db_path}'"), &e))
}

fn load_space(store: &SqliteStore, key: &GraphKey) -> Result<solspace_core::SolutionSpace, i32> {
    match store.load_by_key(key) {
        Ok(Some(space)) => Ok(space),
        Ok(None) => {
            eprintln!("Error: no graph stored for {key}; run `solspace build` first");
            Err(EXIT_DOMAIN)
        }
        Err(e) => Err(storage_exit(&format!("failed to load graph {key}"), &e)),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Returns exit code: 0 = success, 1 = bad input or history, 3 = I/O or
/// storage error.
fn run_build(
    db_path: &str,
    history: &Path,
    task: &str,
    language: Language,
    files: Option<&Path>,
) -> i32 {
    let key = GraphKey::new(Task::new(task), language);
    let mut config = GraphConfig::new(key.task.clone(), key.language);
    if let Some(root) = files {
        config = config.with_files_under(root);
    }

    let history_files = match history_files_in(history) {
        Ok(files) => files,
        Err(e) => return storage_exit("failed to list history files", &e),
    };
    let space = match construct_solution_graph(&history_files, config, &Collaborators::line_based()) {
        Ok(space) => space,
        Err(e) => return storage_exit("failed to build the solution graph", &e),
    };

    let mut store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let id = match store.save_or_create(&space) {
        Ok(id) => id,
        Err(e) => return storage_exit("failed to save the solution graph", &e),
    };
    info!(graph = %id, key = %key, "stored solution graph");

    print_json(&serde_json::json!({
        "graph": id.0,
        "task": key.task,
        "language": key.language,
        "history_files": history_files.len(),
        "vertices": space.graph.vertices().filter(|v| !v.is_sentinel()).count(),
        "edges": space.graph.edge_count(),
        "goals": space.graph.goals().len(),
    }));
    EXIT_OK
}

struct HintRequest {
    task: String,
    language: Language,
    source: PathBuf,
    rate: Option<f64>,
    user: String,
    age: Option<u32>,
    experience: Option<ExperienceArg>,
    config: Option<PathBuf>,
    strategy: Option<StrategyArg>,
    weights: Option<WeightsArg>,
    record: bool,
}

fn hint_config(request: &HintRequest) -> Result<HintConfig, i32> {
    let mut config = match &request.config {
        Some(path) => HintConfig::load(path)
            .map_err(|e| hint_exit(&format!("failed to load '{}'", path.display()), &e))?,
        None => HintConfig::default(),
    };
    if let Some(strategy) = request.strategy {
        config.strategy = strategy.into();
    }
    if let Some(weights) = request.weights {
        config.weights = weights.into();
    }
    config.record_learner_code |= request.record;
    Ok(config)
}

fn learner_info(request: &HintRequest) -> CodeInfo {
    let profile = Profile {
        age: request.age,
        experience: request.experience.map(Experience::from),
    };
    CodeInfo::new(User::with_profile(request.user.clone(), profile)).with_date(Utc::now())
}

/// Returns exit code: 0 = success, 1 = no hint available or bad input,
/// 3 = I/O or storage error.
fn run_hint(db_path: &str, request: HintRequest) -> i32 {
    let key = GraphKey::new(Task::new(&request.task), request.language);
    let config = match hint_config(&request) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let code_info = learner_info(&request);
    let source = match std::fs::read_to_string(&request.source) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {e}", request.source.display());
            return EXIT_IO;
        }
    };

    let mut store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let space = match load_space(&store, &key) {
        Ok(space) => space,
        Err(code) => return code,
    };

    let record = config.record_learner_code;
    let mut handler = HintHandler::new(space, Collaborators::line_based(), config);
    let hint = match handler.get_hint(&source, request.rate, code_info) {
        Ok(hint) => hint,
        Err(e) => return hint_exit("no hint available", &e),
    };

    if record {
        if let Err(e) = store.save_or_create(&handler.into_space()) {
            return storage_exit("failed to save the updated graph", &e);
        }
    }

    match serde_json::to_value(&hint) {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("Error: failed to serialize hint: {e}");
            return EXIT_DOMAIN;
        }
    }
    EXIT_OK
}

/// Returns exit code: 0 = success, 3 = I/O or storage error.
fn run_list(db_path: &str) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    match store.list_graphs() {
        Ok(graphs) => {
            for graph in graphs {
                println!(
                    "{}\t{}\t{}\t{} vertices\t{} edges",
                    graph.id.0, graph.key.task, graph.key.language, graph.vertex_count, graph.edge_count
                );
            }
            EXIT_OK
        }
        Err(e) => storage_exit("failed to list graphs", &e),
    }
}

/// Returns exit code: 0 = success, 1 = unknown graph, 3 = I/O or storage
/// error.
fn run_show(db_path: &str, task: &str, language: Language) -> i32 {
    let key = GraphKey::new(Task::new(task), language);
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let space = match load_space(&store, &key) {
        Ok(space) => space,
        Err(code) => return code,
    };

    let graph = &space.graph;
    for vertex in graph.get_traversal() {
        let children = match graph.children(vertex.id()) {
            Ok(children) => children,
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_DOMAIN;
            }
        };
        let children: Vec<String> = children.iter().map(|c| c.id().to_string()).collect();
        let rate = vertex
            .rate()
            .map_or_else(|| "-".to_string(), |r| format!("{r:.2}"));
        println!(
            "{}\t{}\trate {}\tusers {}\tvariants {}\t-> [{}]",
            vertex.id(),
            vertex.kind(),
            rate,
            vertex.population(),
            vertex.code().map_or(0, |c| c.variants().len()),
            children.join(", ")
        );
    }
    EXIT_OK
}
