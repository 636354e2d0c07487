//! Copy a local book folder into Google Drive.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jugaadpress::auth::installed::{self, DEFAULT_PORT};
use jugaadpress::store::drive::{DEFAULT_ROOT_FOLDER, DriveClient, DriveStore};
use jugaadpress::store::{LocalStore, PageStore, copy_book};

/// Upload a folder of markdown pages as a JugaadPress book on Google Drive
#[derive(Parser, Debug)]
#[command(name = "jugaadpress-migrate")]
struct Args {
    /// Folder holding the book's .md pages
    #[arg(default_value = "pages")]
    dir: PathBuf,

    /// Book name on Drive (default: the folder name)
    #[arg(short, long)]
    book: Option<String>,

    /// Name of the root folder on Drive
    #[arg(long, default_value = DEFAULT_ROOT_FOLDER)]
    root: String,

    /// OAuth client secrets downloaded from the Google Cloud console
    #[arg(long, default_value = "client_secret.json")]
    secrets: PathBuf,

    /// Where to cache the access and refresh tokens
    #[arg(long, default_value = "token.json")]
    token: PathBuf,

    /// Loopback port for the consent redirect
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jugaadpress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> jugaadpress::Result<()> {
    let dir = std::fs::canonicalize(&args.dir)?;
    let (Some(root), Some(source_book)) = (
        dir.parent(),
        dir.file_name().and_then(|n| n.to_str()),
    ) else {
        return Err(jugaadpress::Error::InvalidInput(format!(
            "cannot use {} as a book folder",
            dir.display()
        )));
    };
    let target_book = args.book.as_deref().unwrap_or(source_book);

    let local = LocalStore::new(root);
    let pages = local.list_pages(source_book).await?;
    if pages.is_empty() {
        return Err(jugaadpress::Error::NoContent);
    }
    println!("Found {} pages in {}", pages.len(), dir.display());

    let http = reqwest::Client::new();
    let tokens = installed::authorize(&args.secrets, &args.token, args.port, http.clone()).await?;
    let drive = DriveStore::new(DriveClient::new(http, tokens.access_token), args.root);

    let copied = copy_book(&local, source_book, &drive, target_book).await?;

    // Create .user_settings.json on a fresh Drive
    let settings = drive.global_settings().await?;
    if !settings.is_mail_configured() {
        drive.save_global_settings(&settings).await?;
    }

    println!("Migrated {} pages into book '{}'", copied.len(), target_book);
    Ok(())
}
