//! CLI entry point for heritage-site

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heritage_site::{commands, server, Site};

#[derive(Parser)]
#[command(name = "heritage-site")]
#[command(version)]
#[command(about = "Content site and form server for a tapestry heritage project", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site with sample content
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new news article (unpublished)
    New {
        /// Title of the new article
        title: String,

        /// Category: news, blog, events or press
        #[arg(short = 'C', long)]
        category: Option<String>,
    },

    /// Generate static files
    #[command(alias = "g")]
    Generate {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Start a local server with the form endpoints
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Enable static mode (no file watching)
        #[arg(long)]
        r#static: bool,
    },

    /// Clean the public folder
    Clean,

    /// List site content
    List {
        /// news, team, sponsors, tapestries, pages, categories or tags
        #[arg(default_value = "news")]
        r#type: String,
    },

    /// Copy or link the media library into the public folder
    SyncMedia {
        /// Symlink files instead of copying them
        #[arg(long)]
        symlink: bool,

        /// Remove files that are no longer in the media folder
        #[arg(long)]
        clean: bool,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "heritage_site=debug,info"
    } else {
        "heritage_site=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot read the current directory")?,
    };

    // API keys may live in a .env file next to _config.yml
    match dotenvy::from_path(base_dir.join(".env")) {
        Ok(()) => tracing::debug!("Loaded .env from {:?}", base_dir),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to read .env: {}", e),
    }

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            commands::init::init_site(&target_dir)?;
            println!("Initialized site in {:?}", target_dir);
        }

        Commands::New { title, category } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Creating new article: {}", title);
            commands::new::run(&site, &title, category.as_deref())?;
        }

        Commands::Generate { watch } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Generating static files...");

            site.generate()?;
            println!("Generated successfully!");

            if watch {
                tokio::task::spawn_blocking(move || commands::generate::watch(&site)).await??;
            }
        }

        Commands::Server {
            port,
            ip,
            open,
            r#static,
        } => {
            let site = Site::new(&base_dir)?;

            // Generate first
            tracing::info!("Generating static files...");
            site.generate()?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            server::start(&site, &ip, port, !r#static, open).await?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            commands::list::run(&site, &r#type)?;
        }

        Commands::SyncMedia { symlink, clean } => {
            let site = Site::new(&base_dir)?;
            commands::sync_media::run(&site, symlink, clean)?;
        }

        Commands::Version => {
            println!("heritage-site version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
