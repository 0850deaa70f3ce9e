//! CLI subcommands.

pub mod check;
pub mod inspect;
pub mod validate;

use anyhow::Result;
use serde::Serialize;

use crate::OutputFormat;

/// Print `value` as JSON in the requested format.
///
/// Returns `false` for [`OutputFormat::Human`] so the caller prints its own
/// layout.
fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Human => Ok(false),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(true)
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(value)?);
            Ok(true)
        }
    }
}
