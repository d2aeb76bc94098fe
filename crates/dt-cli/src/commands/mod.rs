//! CLI subcommand implementations.
//!
//! Every command writes to a caller-supplied writer so output can be
//! snapshot-tested.

pub mod commit;
pub mod commits;
pub mod export;
pub mod ingest;
pub mod projects;
pub mod rebuild;
pub mod roi;
pub mod session;
pub mod stats;
pub mod status;
pub mod sync;
pub mod tool;
pub mod util;
