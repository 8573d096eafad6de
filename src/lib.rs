//! Stampa — an asynchronous document-render job engine.
//!
//! Submissions (HTML or a URL plus render options) become jobs that a
//! bounded queue feeds to a fixed worker pool; workers invoke a pluggable
//! converter and persist the produced artifact. Callers poll job state and
//! download the result over HTTP.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
