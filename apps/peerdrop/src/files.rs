//! Helpers around local files: room names, MIME types and saving artifacts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use peerdrop_protocol::constants::DEFAULT_MIME_TYPE;
use peerdrop_transfer::Artifact;

/// Normalizes a user-typed room name: trimmed, lowercase, whitespace runs
/// replaced by a single `-`.
pub fn normalize_room(room: &str) -> String {
    room.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Guesses a MIME type from the file extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "js" => "text/javascript",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// `name` for the first attempt, then `stem (n).ext`.
fn candidate_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    let path = Path::new(name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) if !stem.is_empty() => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{name} ({attempt})"),
    }
}

/// Writes `artifact` into `dir` without replacing any existing file.
///
/// Returns the path actually written.
pub async fn save_artifact(dir: &Path, artifact: &Artifact) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = artifact.safe_file_name();

    for attempt in 0..1000 {
        let path = dir.join(candidate_name(&name, attempt));
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(artifact.bytes()).await?;
        file.flush().await?;
        return Ok(path);
    }

    anyhow::bail!("no free file name for {name} in {}", dir.display())
}
