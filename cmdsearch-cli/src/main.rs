use clap::{Args, Parser, Subcommand};
use cmdsearch::{
    CmdSearchConfig, PatternSyntax, ProfileStore, SearchBackend, SearchError, SearchHistory,
    SearchProfile, SearchSession, SearchStats,
};
use colored::Colorize;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, SearchError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, read after the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options describing what to look for
#[derive(Args, Debug, Default)]
struct CriteriaArgs {
    /// File name pattern (glob unless --regex is given)
    #[arg(short = 'n', long = "name")]
    name: Option<String>,

    /// Treat the name pattern as a regular expression
    #[arg(short = 'r', long)]
    regex: bool,

    /// Only report files whose content matches this regular expression
    #[arg(short = 'c', long = "content")]
    content: Option<String>,

    /// Match names and content case-sensitively
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Maximum depth below the start directory (-1 for unlimited)
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    max_depth: Option<i32>,
}

impl CriteriaArgs {
    fn apply_to(self, config: &mut CmdSearchConfig) {
        if let Some(name) = self.name {
            config.name_pattern = name;
        }
        if self.regex {
            config.syntax = PatternSyntax::Regex;
        }
        if let Some(content) = self.content {
            config.content_pattern = Some(content);
        }
        if self.case_sensitive {
            config.match_case = true;
        }
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
    }
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    criteria: CriteriaArgs,

    /// Directory to search in
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Start from a saved profile; other options override it
    #[arg(long)]
    profile: Option<String>,

    /// Run the search with the system find and grep commands
    #[arg(long)]
    external: bool,

    /// Print search statistics
    #[arg(long)]
    stats: bool,

    /// Do not record this search in the history
    #[arg(long)]
    no_history: bool,

    /// Also list the directories that contain matches
    #[arg(long)]
    dirs: bool,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List saved profiles
    List,

    /// Save search options under a name
    Save {
        #[arg(id = "profile_name", value_name = "NAME")]
        name: String,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    /// Delete a saved profile
    Delete { name: String },

    /// Print a saved profile as JSON
    Show { name: String },
}

#[derive(Subcommand)]
enum Commands {
    /// Search for files by name and content
    Search(Box<SearchArgs>),

    /// Manage saved search profiles
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Show or clear the search history
    History {
        /// Forget all recorded searches
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = CmdSearchConfig::load_from(cli.config.as_deref())?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Search(args) => run_search(config, *args),
        Commands::Profiles { command } => run_profiles(command),
        Commands::History { clear } => run_history(&config, clear),
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn profiles_path() -> Result<PathBuf> {
    ProfileStore::default_path()
        .ok_or_else(|| SearchError::config_error("Cannot determine the configuration directory"))
}

fn history_path() -> Result<PathBuf> {
    SearchHistory::default_path()
        .ok_or_else(|| SearchError::config_error("Cannot determine the configuration directory"))
}

fn no_such_profile(name: &str) -> SearchError {
    SearchError::config_error(format!("No such profile: {}", name))
}

fn run_search(file_config: CmdSearchConfig, args: SearchArgs) -> Result<()> {
    let mut cli_config = CmdSearchConfig::default();
    if let Some(dir) = args.dir {
        cli_config.root_path = dir;
    }
    if args.external {
        cli_config.backend = SearchBackend::External;
    }
    let mut config = file_config.merge_with_cli(cli_config);

    // A profile replaces the configured criteria as a whole; flags given
    // on the command line still win over it
    if let Some(name) = &args.profile {
        let store = ProfileStore::load(&profiles_path()?)?;
        let profile = store.get(name).ok_or_else(|| no_such_profile(name))?;
        config.apply_criteria(&profile.criteria);
    }
    args.criteria.apply_to(&mut config);
    let criteria = config.criteria();
    let root = config.root_path.clone();
    debug!("Search criteria: {:?}", criteria);

    let mut session = SearchSession::new(config.poll_interval()).with_backend(config.backend);
    let started = Instant::now();
    session.start(&root, &criteria)?;

    let spinner = ProgressBar::new_spinner();
    let summary = session.run_to_completion(|update| {
        for file in &update.new_files {
            spinner.suspend(|| println!("{}", file.path.display().to_string().blue()));
        }
        if let Some(status) = &update.status {
            spinner.set_message(status.clone());
        }
        spinner.tick();
    });
    spinner.finish_and_clear();

    if let Some(err) = session.take_error() {
        return Err(err);
    }

    if args.dirs && !session.match_dirs().is_empty() {
        println!("\nDirectories with matches:");
        for dir in session.match_dirs() {
            println!("  {}", dir.display().to_string().cyan());
        }
    }

    if args.stats {
        let stats = session.stats().snapshot();
        println!("\nDirectories visited: {}", stats.dirs_visited);
        println!("Files examined: {}", stats.files_examined);
        println!("Content scans: {}", stats.content_scans);
        println!("Bytes scanned: {}", stats.bytes_scanned);
        println!("Errors: {}", stats.errors);
    }

    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
    let message = summary.message();
    if summary.aborted {
        println!("\n{}", message.yellow());
    } else {
        println!("\n{}", message.green());
    }
    println!("Elapsed: {}", humantime::format_duration(elapsed));

    if !args.no_history {
        if let Err(e) = record_history(&config, &root) {
            warn!("Failed to update search history: {}", e);
        }
    }
    Ok(())
}

fn record_history(config: &CmdSearchConfig, root: &Path) -> Result<()> {
    let path = history_path()?;
    let mut history = SearchHistory::load(&path)?;
    history.set_max_size(config.history_size);
    history.record(&config.criteria(), root);
    history.save(&path)
}

fn run_profiles(command: ProfileCommands) -> Result<()> {
    let path = profiles_path()?;
    let mut store = ProfileStore::load(&path)?;

    match command {
        ProfileCommands::List => {
            if store.is_empty() {
                println!("No saved profiles");
            }
            for profile in &store.profiles {
                println!("{}  {}", profile.name.bold(), profile.description());
            }
        }
        ProfileCommands::Save { name, criteria } => {
            let mut config = CmdSearchConfig::default();
            criteria.apply_to(&mut config);
            let criteria = config.criteria();
            criteria.compile(&SearchStats::new())?;
            store.add(SearchProfile::new(name.clone(), criteria));
            store.save(&path)?;
            println!("Saved profile {}", name.green());
        }
        ProfileCommands::Delete { name } => {
            store.remove(&name).ok_or_else(|| no_such_profile(&name))?;
            store.save(&path)?;
            println!("Deleted profile {}", name);
        }
        ProfileCommands::Show { name } => {
            let profile = store.get(&name).ok_or_else(|| no_such_profile(&name))?;
            println!("{}", profile.to_json()?);
        }
    }
    Ok(())
}

fn run_history(config: &CmdSearchConfig, clear: bool) -> Result<()> {
    let path = history_path()?;
    let mut history = SearchHistory::load(&path)?;

    if clear {
        history.clear();
        history.save(&path)?;
        println!("Search history cleared");
        return Ok(());
    }

    history.set_max_size(config.history_size);
    let sections = [
        ("Name patterns", &history.name_patterns),
        ("Content patterns", &history.content_patterns),
        ("Directories", &history.directories),
    ];
    for (title, items) in sections {
        println!("{}:", title.bold());
        for item in items.items() {
            println!("  {}", item);
        }
    }
    Ok(())
}
