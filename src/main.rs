// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use entropy::config::DEFAULT_SETTINGS_PATH;
use entropy::maintenance::{self, Verbosity};
use entropy::repository::{SqliteRepository, import_index};
use entropy::resolver::policy_for;
use entropy::{MatchOptions, MatchResult, Scope, SelectionKind, Session, Settings};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "equo")]
#[command(author, version, about = "Entropy package matching and cache maintenance", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debugging output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty repository database
    Init {
        /// Repository identifier
        id: String,
        /// Database path
        db_path: PathBuf,
    },
    /// Load a JSON repository index into a repository database
    Import {
        /// Repository identifier
        id: String,
        /// Database path (created when missing)
        db_path: PathBuf,
        /// Index file
        index: PathBuf,
    },
    /// Resolve a dependency string
    Match {
        /// Atom or "or" dependency, e.g. ">=app-foo/foo-1.2:2[ssl]"
        atom: String,
        /// Print every match instead of the best one
        #[arg(short, long)]
        multi: bool,
        /// Match against installed packages
        #[arg(short, long, conflicts_with = "repo")]
        installed: bool,
        /// Restrict to these repositories, in this order
        #[arg(short, long)]
        repo: Vec<String>,
        /// Fail on ambiguous package names
        #[arg(long)]
        strict: bool,
        /// Pick the first key for ambiguous package names
        #[arg(long, conflicts_with = "strict")]
        lenient: bool,
        /// Let tagged packages match atoms without a tag
        #[arg(long)]
        tagged: bool,
        /// Bypass the match cache
        #[arg(long)]
        no_cache: bool,
        /// Ignore package_mask
        #[arg(long)]
        no_mask: bool,
        /// Cross-repository selection policy
        #[arg(long, value_enum)]
        selection: Option<SelectionKind>,
    },
    /// Find the packages owning a file
    Belongs {
        path: String,
        /// Search installed packages
        #[arg(short, long)]
        installed: bool,
    },
    /// Find the packages providing a shared library
    Library {
        /// Soname, e.g. libz.so.1
        soname: String,
        /// ELF class of the library
        #[arg(short, long)]
        arch: String,
        /// Search installed packages
        #[arg(short, long)]
        installed: bool,
    },
    /// Maintain the match cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Rebuild the cache for every enabled repository
    Generate,
    /// Remove every cache entry
    Clean,
}

fn verbosity(cli: &Cli) -> Verbosity {
    if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() && path == Path::new(DEFAULT_SETTINGS_PATH) {
        warn!("{} not found, using default settings", path.display());
        return Ok(Settings::default());
    }
    Settings::load(path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn scope(installed: bool, repos: Vec<String>) -> Scope {
    if installed {
        Scope::Installed
    } else if repos.is_empty() {
        Scope::Available
    } else {
        Scope::Repositories(repos)
    }
}

/// `--strict` or `--lenient` override the configured `strict_keys`
fn strict_override(strict: bool, lenient: bool) -> Option<bool> {
    if strict {
        Some(true)
    } else if lenient {
        Some(false)
    } else {
        None
    }
}

/// Render a match as `atom@repository`
fn describe(session: &Session, result: &MatchResult) -> String {
    let Some(repo) = result.repository.as_deref().filter(|_| result.is_found()) else {
        return result.to_string();
    };
    let atom = session
        .store(repo)
        .and_then(|store| store.match_info(result.package_id))
        .ok()
        .flatten()
        .map(|record| record.atom);
    match atom {
        Some(atom) => format!("{}@{} {}", atom, repo, result),
        None => result.to_string(),
    }
}

fn print_matches(session: &Session, results: &[MatchResult]) {
    if results.is_empty() {
        println!("{}", MatchResult::not_found());
    }
    for result in results {
        println!("{}", describe(session, result));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let verbosity = verbosity(&cli);

    let status = match cli.command {
        Some(Commands::Init { id, db_path }) => {
            info!("Initializing repository {} at {}", id, db_path.display());
            SqliteRepository::create(&id, &db_path.to_string_lossy())?;
            println!("Repository {} initialized at {}", id, db_path.display());
            0
        }
        Some(Commands::Import { id, db_path, index }) => {
            let mut store = SqliteRepository::create(&id, &db_path.to_string_lossy())?;
            let count = import_index(&mut store, &index)
                .with_context(|| format!("Failed to import {}", index.display()))?;
            println!("Imported {} package(s) into {}", count, id);
            0
        }
        Some(Commands::Match {
            atom,
            multi,
            installed,
            repo,
            strict,
            lenient,
            tagged,
            no_cache,
            no_mask,
            selection,
        }) => {
            let mut session = Session::new(load_settings(&cli.config)?)?;
            if let Some(kind) = selection {
                session.set_policy(policy_for(kind));
            }
            let options = MatchOptions {
                scope: scope(installed, repo),
                strict_keys: strict_override(strict, lenient),
                tagged_fallback: tagged,
                use_cache: !no_cache,
                mask_filter: !no_mask,
            };

            let matcher = session.matcher();
            let results = if multi {
                matcher.match_packages(&atom, &options)?
            } else {
                vec![matcher.match_package(&atom, &options)?]
                    .into_iter()
                    .filter(MatchResult::is_found)
                    .collect()
            };
            print_matches(&session, &results);
            session.shutdown();
            if results.is_empty() { 1 } else { 0 }
        }
        Some(Commands::Belongs { path, installed }) => {
            let session = Session::new(load_settings(&cli.config)?)?;
            let results = session.matcher().belongs(&path, &scope(installed, Vec::new()))?;
            print_matches(&session, &results);
            session.shutdown();
            if results.is_empty() { 1 } else { 0 }
        }
        Some(Commands::Library {
            soname,
            arch,
            installed,
        }) => {
            let session = Session::new(load_settings(&cli.config)?)?;
            let results = session
                .matcher()
                .library_providers(&soname, &arch, &scope(installed, Vec::new()))?;
            print_matches(&session, &results);
            session.shutdown();
            if results.is_empty() { 1 } else { 0 }
        }
        Some(Commands::Cache { action }) => {
            let session = Session::new(load_settings(&cli.config)?)?;
            let status = match action {
                CacheAction::Generate => maintenance::generate_cache(&session, verbosity),
                CacheAction::Clean => maintenance::clean_cache(&session, verbosity),
            };
            session.shutdown();
            status
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "equo", &mut std::io::stdout());
            0
        }
        None => {
            println!("equo v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'equo --help' for usage information");
            0
        }
    };

    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
