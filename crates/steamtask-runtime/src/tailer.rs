//! Incremental tailing of SteamCMD's on-disk log files.
//!
//! On Windows SteamCMD buffers its stdout so heavily that live capture
//! misses most of the run; the files under its `logs/` directory are the
//! reliable signal. This tailer polls for growth rather than watching:
//! the failure modes stay trivial, and any unreadable file or directory
//! is simply skipped for that pass. Tailing is a best-effort supplement,
//! never a correctness requirement, so no error here escalates.

use std::collections::{HashMap, HashSet};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default poll interval.
pub const DEFAULT_TAIL_INTERVAL: Duration = Duration::from_millis(300);

/// Handle over a running tail loop.
///
/// Dropping the handle does not stop the loop; call [`TailHandle::stop`],
/// which is idempotent. Clones stop the same loop.
#[derive(Clone)]
pub struct TailHandle {
    token: CancellationToken,
}

impl TailHandle {
    /// Stop scanning. A scan already in flight finishes but its results
    /// are discarded.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether [`Self::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Start polling `dirs` (deduplicated, scanned non-recursively) for
/// growth in `.log`/`.txt` files, invoking `on_data` with each newly
/// appended chunk.
///
/// A file observed for the first time is never backfilled: its cursor
/// starts at the current size, so only bytes appended after discovery
/// are delivered. A file that shrinks stalls until it grows past its
/// previous size again; rotation is not detected.
pub fn start_tail<F>(dirs: &[PathBuf], on_data: F, interval: Duration) -> TailHandle
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let token = CancellationToken::new();
    let loop_token = token.clone();

    let mut seen = HashSet::new();
    let folders: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| seen.insert(dir.as_path()))
        .cloned()
        .collect();

    tokio::spawn(async move {
        let mut cursors: HashMap<PathBuf, u64> = HashMap::new();
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = loop_token.cancelled() => break,
            }
            scan_once(&folders, &mut cursors, &on_data, &loop_token).await;
        }
        debug!("tail loop exiting");
    });

    TailHandle { token }
}

/// One pass over every watched directory.
async fn scan_once<F>(
    folders: &[PathBuf],
    cursors: &mut HashMap<PathBuf, u64>,
    on_data: &F,
    token: &CancellationToken,
) where
    F: Fn(&str),
{
    for dir in folders {
        let Ok(mut entries) = fs::read_dir(dir).await else {
            // Missing or unreadable directory: skip this pass.
            continue;
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                _ => break,
            };
            if token.is_cancelled() {
                return;
            }
            let path = entry.path();
            if !is_tail_candidate(&path) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let size = meta.len();
            match cursors.get(&path).copied() {
                Some(prev) if size > prev => {
                    if let Ok(chunk) = read_appended(&path, prev, size).await {
                        if token.is_cancelled() {
                            return;
                        }
                        on_data(&chunk);
                    }
                    // Advance even when the read failed, so a bad range
                    // is not retried forever.
                    cursors.insert(path, size);
                }
                Some(_) => {}
                None => {
                    // First sighting: remember the size, deliver nothing.
                    cursors.insert(path, size);
                }
            }
        }
    }
}

fn is_tail_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            ext == "log" || ext == "txt"
        })
}

/// Read exactly the byte range appended since the last scan, decoded
/// lossily (SteamCMD logs are not guaranteed UTF-8).
async fn read_appended(path: &Path, from: u64, to: u64) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    file.seek(SeekFrom::Start(from)).await?;

    #[allow(clippy::cast_possible_truncation)]
    let mut buf = vec![0u8; (to - from) as usize];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            // File shrank between stat and read; deliver what we got.
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;

    const FAST: Duration = Duration::from_millis(25);

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn drain(rx: &mpsc::Receiver<String>) -> String {
        let mut out = String::new();
        while let Ok(chunk) = rx.try_recv() {
            out.push_str(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn test_preexisting_content_is_not_backfilled() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("console.log");
        append(&log, "history before the tailer started\n");

        let (tx, rx) = mpsc::channel();
        let handle = start_tail(
            &[dir.path().to_path_buf()],
            move |chunk| {
                let _ = tx.send(chunk.to_string());
            },
            FAST,
        );

        tokio::time::sleep(FAST * 4).await;
        assert_eq!(drain(&rx), "");

        append(&log, "fresh line\n");
        tokio::time::sleep(FAST * 4).await;
        assert_eq!(drain(&rx), "fresh line\n");

        handle.stop();
    }

    #[tokio::test]
    async fn test_only_log_and_txt_files_are_tailed() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("content_log.TXT");
        let other = dir.path().join("appmanifest.acf");
        append(&log, "");
        append(&other, "");

        let (tx, rx) = mpsc::channel();
        let handle = start_tail(
            &[dir.path().to_path_buf()],
            move |chunk| {
                let _ = tx.send(chunk.to_string());
            },
            FAST,
        );
        tokio::time::sleep(FAST * 3).await;

        append(&log, "tracked\n");
        append(&other, "ignored\n");
        tokio::time::sleep(FAST * 4).await;

        assert_eq!(drain(&rx), "tracked\n");
        handle.stop();
    }

    #[tokio::test]
    async fn test_stop_halts_delivery_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("a.log");
        append(&log, "");

        let (tx, rx) = mpsc::channel();
        let handle = start_tail(
            &[dir.path().to_path_buf()],
            move |chunk| {
                let _ = tx.send(chunk.to_string());
            },
            FAST,
        );
        tokio::time::sleep(FAST * 3).await;

        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());

        append(&log, "too late\n");
        tokio::time::sleep(FAST * 4).await;
        assert_eq!(drain(&rx), "");
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("live.log");
        append(&log, "");

        let ghost = dir.path().join("does-not-exist");
        let (tx, rx) = mpsc::channel();
        // Duplicate live dir also exercises deduplication.
        let handle = start_tail(
            &[
                ghost,
                dir.path().to_path_buf(),
                dir.path().to_path_buf(),
            ],
            move |chunk| {
                let _ = tx.send(chunk.to_string());
            },
            FAST,
        );
        tokio::time::sleep(FAST * 3).await;

        append(&log, "still tailing\n");
        tokio::time::sleep(FAST * 4).await;
        assert_eq!(drain(&rx), "still tailing\n");
        handle.stop();
    }

    #[tokio::test]
    async fn test_truncated_file_stalls_until_regrowth() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("rotating.log");
        append(&log, "");

        let (tx, rx) = mpsc::channel();
        let handle = start_tail(
            &[dir.path().to_path_buf()],
            move |chunk| {
                let _ = tx.send(chunk.to_string());
            },
            FAST,
        );
        tokio::time::sleep(FAST * 3).await;

        append(&log, "0123456789\n");
        tokio::time::sleep(FAST * 4).await;
        assert_eq!(drain(&rx), "0123456789\n");

        // Truncate and rewrite something shorter: no delivery.
        std::fs::write(&log, "short\n").unwrap();
        tokio::time::sleep(FAST * 4).await;
        assert_eq!(drain(&rx), "");

        handle.stop();
    }
}
