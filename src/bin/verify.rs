//! Check the JugaadPress folder layout on Google Drive.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jugaadpress::auth::installed::{self, DEFAULT_PORT};
use jugaadpress::store::drive::verify::{StructureReport, verify_structure};
use jugaadpress::store::drive::{DEFAULT_ROOT_FOLDER, DriveClient, DriveStore};

/// Verify the JugaadPress folder structure on Google Drive
#[derive(Parser, Debug)]
#[command(name = "jugaadpress-verify")]
struct Args {
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
                .unwrap_or_else(|_| "jugaadpress=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let http = reqwest::Client::new();
    let report = match installed::authorize(&args.secrets, &args.token, args.port, http.clone())
        .await
    {
        Ok(tokens) => {
            let store = DriveStore::new(DriveClient::new(http, tokens.access_token), args.root.as_str());
            verify_structure(&store).await
        }
        Err(e) => Err(e),
    };

    match report {
        Ok(report) => {
            print_report(&args.root, &report);
            if report.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_report(root: &str, report: &StructureReport) {
    match &report.root_id {
        Some(id) => println!("{root}/ ({id})"),
        None => println!("{root}/ (missing)"),
    }
    for book in &report.books {
        let settings = if book.has_settings { "" } else { ", no settings" };
        println!("  {}/  {} pages{}", book.name, book.page_count, settings);
    }

    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
    if report.errors.is_empty() {
        println!("\nStructure OK ({} books)", report.books.len());
    } else {
        println!("\nErrors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }
}
