//! jugaadpress - markdown notebook and book compiler

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jugaadpress::book::Cover;
use jugaadpress::config::{Config, StoreMode};
use jugaadpress::export::{Format, compile};
use jugaadpress::store::{LocalStore, load_manuscript};

#[derive(Parser)]
#[command(name = "jugaadpress")]
#[command(version, about = "Markdown notebook that compiles pages into books", long_about = None)]
#[command(after_help = "EXAMPLES:
    jugaadpress serve                          Serve ./library on port 5000
    jugaadpress serve --store drive            Serve from Google Drive
    jugaadpress export pages/ -o notes.epub    Compile a folder of pages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (settings from the environment and .env)
    Serve {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Storage backend: local or drive (overrides STORE_MODE)
        #[arg(long, value_name = "MODE")]
        store: Option<String>,

        /// Library directory for local mode (overrides PAGES_DIR)
        #[arg(long, value_name = "DIR")]
        pages_dir: Option<PathBuf>,
    },

    /// Compile a folder of markdown pages
    Export {
        /// Folder containing the .md pages
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Output file; the format follows its extension unless --format is given
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// epub, pdf or html
        #[arg(short, long)]
        format: Option<String>,

        /// Book title (default: the book settings title or folder name)
        #[arg(short, long)]
        title: Option<String>,

        /// Cover image (JPEG, PNG or GIF)
        #[arg(long, value_name = "IMAGE")]
        cover: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jugaadpress=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve {
            host,
            port,
            store,
            pages_dir,
        } => serve(host, port, store, pages_dir).await,
        Command::Export {
            dir,
            output,
            format,
            title,
            cover,
        } => export(&dir, &output, format, title, cover).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(
    host: Option<String>,
    port: Option<u16>,
    store: Option<String>,
    pages_dir: Option<PathBuf>,
) -> jugaadpress::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(store) = store {
        config.store_mode = store.parse::<StoreMode>()?;
    }
    if let Some(dir) = pages_dir {
        config.pages_dir = dir;
    }
    jugaadpress::server::serve(config).await
}

async fn export(
    dir: &Path,
    output: &Path,
    format: Option<String>,
    title: Option<String>,
    cover: Option<PathBuf>,
) -> jugaadpress::Result<()> {
    let format: Format = match format {
        Some(format) => format.parse()?,
        None => output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .parse()?,
    };

    let dir = std::fs::canonicalize(dir)?;
    let (root, book) = match (dir.parent(), dir.file_name().and_then(|n| n.to_str())) {
        (Some(root), Some(book)) => (root.to_path_buf(), book.to_string()),
        _ => {
            return Err(jugaadpress::Error::InvalidInput(format!(
                "cannot use {} as a book folder",
                dir.display()
            )));
        }
    };

    let store = LocalStore::new(root);
    let mut manuscript = load_manuscript(&store, &book).await?;
    if let Some(title) = title {
        manuscript.title = title;
    }
    if let Some(path) = cover {
        manuscript.cover = Some(Cover::from_bytes(std::fs::read(path)?)?);
    }

    let artifact = compile(&manuscript, format)?;
    std::fs::write(output, &artifact.data)?;
    println!(
        "Wrote {} ({} pages, {} bytes)",
        output.display(),
        manuscript.pages.len(),
        artifact.data.len()
    );
    Ok(())
}
