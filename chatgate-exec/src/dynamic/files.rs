use std::path::Path;

use chatgate_commons::CommandResponse;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{HandlerResult, path_line};

/// Create the file if absent. Existing contents are left untouched.
pub(super) async fn touch(target: &Path) -> HandlerResult {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true);
    #[cfg(unix)]
    options.mode(0o644);
    options.open(target).await?;
    Ok(CommandResponse::success(path_line(target)))
}

pub(super) async fn mkdir(target: &Path) -> HandlerResult {
    fs::create_dir_all(target).await?;
    Ok(CommandResponse::success(path_line(target)))
}

pub(super) async fn write(target: &Path, content: &str, append: bool) -> HandlerResult {
    let mut options = OpenOptions::new();
    options.create(true).write(true);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(target).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(CommandResponse::success(path_line(target)))
}

/// 1 for a file; regular files directly inside a directory otherwise.
pub(super) async fn count(target: &Path) -> HandlerResult {
    let metadata = fs::metadata(target).await?;
    if !metadata.is_dir() {
        return Ok(CommandResponse::success("1\n"));
    }

    let mut entries = fs::read_dir(target).await?;
    let mut files = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files += 1;
        }
    }
    Ok(CommandResponse::success(format!("{files}\n")))
}
