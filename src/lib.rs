// Library root
// -----------
// Client and tooling for a Seafile server. Two binaries sit on top of it:
// `seafile-capshare` uploads one file and copies its share link, and
// `seafile-cleanup` deletes files older than a maximum age.
//
// Module responsibilities:
// - `api`: the HTTP client (auth token, upload, share links, listing,
//   file detail, delete) and its wire types.
// - `error`: the error taxonomy shared by every api operation.
// - `share`: the sequential upload-then-share flow.
// - `cleanup`: the bounded-concurrency retention sweep.
// - `config`: flags, environment and config file resolution.
// - `ui`, `desktop`: terminal prompts and the desktop programs the capture
//   tool drives.
pub mod api;
pub mod cleanup;
pub mod config;
pub mod desktop;
pub mod error;
pub mod share;
pub mod ui;

pub use api::ApiClient;
pub use error::{ApiError, Result};
