//! Command handlers

pub mod backup;
pub mod bottle;
pub mod cellar;
pub mod config;
pub mod settings;
pub mod stats;
pub mod status;
pub mod sync;

use anyhow::{bail, Result};

/// Pick one id out of `candidates` by exact match or unique prefix.
///
/// Each candidate is `(id, label)`; labels are only used to list the
/// ambiguous matches.
pub(crate) fn match_id<'a>(
    kind: &str,
    input: &str,
    candidates: impl IntoIterator<Item = (&'a str, String)>,
) -> Result<String> {
    let mut matches = Vec::new();
    for (id, label) in candidates {
        if id == input {
            return Ok(id.to_string());
        }
        if id.starts_with(input) {
            matches.push((id, label));
        }
    }

    match matches.len() {
        0 => bail!("No {} found matching: {}", kind, input),
        1 => Ok(matches[0].0.to_string()),
        _ => {
            eprintln!("Multiple {}s match '{}':", kind, input);
            for (id, label) in &matches {
                eprintln!("  {} - {}", id, label);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
