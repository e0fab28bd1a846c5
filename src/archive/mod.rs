//! Archiver
//!
//! Moves each fully processed input file into the raw archive as
//! `<stem>_<YYYYMMDDTHHMMSS><.ext>`, and its output artifact into the
//! processed archive under the artifact's own (already timestamped) name.
//! A taken name gets `_<n>` appended; an existing archive entry is never
//! overwritten.

mod archiver;

pub use archiver::{archive_file_name, kept_file_name, Archiver, ARCHIVE_TIMESTAMP_FORMAT};
