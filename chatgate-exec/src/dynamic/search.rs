use std::path::PathBuf;

use chatgate_commons::CommandResponse;
use walkdir::WalkDir;

use super::HandlerResult;

/// Levels below the starting directory that `find` descends into.
pub const FIND_MAX_DEPTH: usize = 7;
pub const FIND_MAX_RESULTS: usize = 200;

/// Case-insensitive directory-name search below `start`.
///
/// Only directories match. Symlinks are not followed and the walk stops at
/// the first [`FIND_MAX_RESULTS`] matches.
pub(super) async fn find_directories(start: PathBuf, needle: String) -> HandlerResult {
    let matches = tokio::task::spawn_blocking(move || -> Result<Vec<String>, walkdir::Error> {
        let mut matches = Vec::new();
        let walker = WalkDir::new(&start)
            .follow_links(false)
            .max_depth(FIND_MAX_DEPTH)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains(&needle)
            {
                matches.push(entry.path().display().to_string());
                if matches.len() >= FIND_MAX_RESULTS {
                    break;
                }
            }
        }
        Ok(matches)
    })
    .await??;

    if matches.is_empty() {
        return Ok(CommandResponse::success("(no matches)\n"));
    }
    Ok(CommandResponse::success(format!("{}\n", matches.join("\n"))))
}
