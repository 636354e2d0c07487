//! # jugaadpress
//!
//! A markdown notebook that compiles its pages into books.
//!
//! Pages live in a [`store::PageStore`]: a local directory tree or a user's
//! Google Drive. A book is the set of pages of one folder, ordered by
//! filename, and compiles to:
//!
//! - a single HTML document with a table of contents
//! - an EPUB 3 container (with an NCX for older readers)
//! - a US-Letter PDF
//!
//! EPUBs can be mailed to a Kindle address through [`delivery`].
//!
//! ## Quick Start
//!
//! ```
//! use jugaadpress::Manuscript;
//! use jugaadpress::export::{Format, compile};
//!
//! let book = Manuscript::new("Japanese")
//!     .with_page("01_intro.md", "# Intro\nSee [particles](./02_grammar.md).")
//!     .with_page("02_grammar.md", "# Particles\n- wa\n- ga");
//!
//! let html = compile(&book, Format::Html)?;
//! let html = String::from_utf8(html.data).unwrap();
//! assert!(html.contains(r##"href="#02_grammar""##));
//! # Ok::<(), jugaadpress::Error>(())
//! ```
//!
//! ## Serving
//!
//! [`server::router`] exposes the editor API over HTTP; [`config::Config`]
//! reads its settings from the environment.

pub mod auth;
pub mod book;
pub mod config;
pub mod delivery;
pub mod error;
pub mod export;
pub mod markdown;
pub mod server;
pub mod store;
pub mod util;

pub use book::{BookSettings, Cover, GlobalSettings, Manuscript, Page};
pub use error::{Error, Result};
pub use export::{Artifact, Format, compile};
pub use store::{LocalStore, PageStore};
