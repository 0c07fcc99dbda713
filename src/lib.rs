//! A small Rust client for the Rentman REST API.
//!
//! Rentman exposes its data as paginated collections of JSON records whose
//! references to other resources are path strings (`"/crew/5"`). This crate
//! pages through those collections, flattens the records into a [`Table`]
//! and resolves ids to display names.
//!
//! ## Quick start
//! - Configure authentication via environment variables (`RENTMAN_URL`,
//!   `RENTMAN_API_KEY`), a `.env` file, or a `.rentmanrc` file (current
//!   directory or home directory).
//! - Call [`Client::fetch_and_normalize`] with an endpoint.
//!
//! ```no_run
//! use anyhow::Result;
//! use rentman::{Client, DEFAULT_BATCH_SIZE};
//!
//! fn main() -> Result<()> {
//!     let client = Client::from_env()?;
//!     let crew = client.fetch_and_normalize("crew");
//!     let mut contacts = client.fetch_and_normalize("contacts");
//!     contacts.resolve_column("creator", &crew, "displayname", "id");
//!
//!     let groups = client.fetch_and_normalize("projectfunctiongroups?fields=id,project");
//!     let costs = client.batch_fetch_and_normalize(
//!         "costs?project=",
//!         &groups.ids_csv("project"),
//!         DEFAULT_BATCH_SIZE,
//!     );
//!     println!("{} contacts, {} cost lines", contacts.len(), costs.len());
//!     Ok(())
//! }
//! ```
//!
//! Failed requests never raise: they are logged through `tracing` and the
//! caller receives whatever was fetched before the failure.

#![forbid(unsafe_code)]

mod batch;
mod cache;
mod client;
mod config;
mod error;
mod lookup;
mod normalize;
mod table;
mod transport;
mod util;

pub use batch::{DEFAULT_BATCH_SIZE, IDS_PLACEHOLDER, apply_template, split_ids};
pub use cache::{DEFAULT_TTL, DiskCache, MemoryCache, NoCache, ResponseCache};
pub use client::{Client, ClientConfig, DEFAULT_PAGE_SIZE, PageFailure, Pages};
pub use lookup::{
    DEFAULT_DISPLAY_COLUMN, DEFAULT_KEY_COLUMN, ItemKey, Lookup, lookup_display_name,
    resolve_display_name,
};
pub use normalize::{KEY_SEPARATOR, normalize, strip_path_prefix};
pub use table::{Row, Table};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
