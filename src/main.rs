use clap::{Parser, Subcommand};
use classdrive::cache::{FolderListingCache, FsCacheStore};
use classdrive::config::{self, CONFIG_FILENAME};
use classdrive::drive::DriveClient;
use classdrive::{output, sync};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "classdrive")]
#[command(about = "Incremental Google Drive crawler for class websites")]
#[command(long_about = "\
Incremental Google Drive crawler for class websites

Each configured class is a Drive folder. Topic folders inside it hold lesson
folders; everything is flattened into data/class-<url_name>.json for the site
renderer.

Drive structure:

  Physics 10/                      # Class root (configured in classdrive.toml)
  ├── assignments.md               # First four sections become the assignments page
  ├── 1 Mechanics/                 # Topic (ordered by leading number)
  │   ├── 1 Vectors/               # Lesson
  │   │   ├── description.md       # Lesson description (markdown)
  │   │   ├── metadata.json        # {\"due_date\": \"01-09-25\", ...}
  │   │   ├── Worksheet.pdf        # Shown as \"Worksheet\"
  │   │   └── Extras/              # Nested folders, any depth
  │   └── 13.5 Quiz/
  └── 2 Waves/

Runs are incremental: the Drive change feed says which folders changed since
the last run, and everything else is served from the cache directory.

Set the access token in the environment variable named by
drive.access_token_env (default DRIVE_ACCESS_TOKEN).

Run 'classdrive gen-config' to generate a documented classdrive.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every class and write its JSON document
    Sync {
        /// Ignore cached listings and lessons (the cache is still rewritten)
        #[arg(long)]
        no_cache: bool,
    },
    /// Drop cached folder listings so the next sync refetches them
    Invalidate {
        /// Drop every listing, every lesson, and the change-feed token
        #[arg(long, conflicts_with = "folders")]
        all: bool,
        /// Folder ids or Drive folder URLs
        #[arg(required_unless_present = "all")]
        folders: Vec<String>,
    },
    /// Validate the config and list the classes without crawling
    Check,
    /// Print a stock classdrive.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Sync { no_cache } => {
            let config = config::load_config(&cli.config)?;
            let remote = DriveClient::from_config(&config.drive)?;
            let store = FsCacheStore::new(&config.cache_dir);
            println!("==> Syncing {} classes", config.classes.len());
            let report = sync::sync(&remote, &store, &config, !no_cache)?;
            output::print_sync_output(&report);
            let failed = report.failed_classes();
            if failed > 0 {
                return Err(format!("{failed} classes failed").into());
            }
        }
        Command::Invalidate { all, folders } => {
            let config = config::load_config(&cli.config)?;
            let store = FsCacheStore::new(&config.cache_dir);
            let listings = FolderListingCache::new(&store);
            if all {
                listings.invalidate_all()?;
                println!("==> Cleared {}", store.root().display());
            } else {
                for folder in &folders {
                    let id = classdrive::naming::folder_id_from_url(folder);
                    listings.invalidate(&id)?;
                    println!("Invalidated {id}");
                }
            }
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            println!("==> Checking {}", cli.config.display());
            output::print_check_output(&config);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
