//! Crash logging
//!
//! A panic hook that appends the panic and a backtrace to
//! `<output_dir>/crash.log` and exits with status 101.

use std::backtrace::Backtrace;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CRASH_LOG: &str = "crash.log";
const MAX_LOG_BYTES: u64 = 1024 * 1024;
const KEEP_ROTATED: usize = 3;

/// Exit status after a panic
pub const CRASH_EXIT_CODE: i32 = 101;

/// Install the panic hook for the whole process
pub fn install_crash_handler(output_dir: impl Into<PathBuf>) {
    let log_path = output_dir.into().join(CRASH_LOG);

    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());

        let entry = format!(
            "[{}] panic at {}: {}\n{}\n",
            chrono::Utc::now().to_rfc3339(),
            location,
            message,
            Backtrace::force_capture()
        );

        tracing::error!("panic at {}: {}", location, message);
        match append_rotating(&log_path, &entry) {
            Ok(()) => eprintln!("Crash details written to {}", log_path.display()),
            Err(e) => eprintln!("Failed to write {}: {}\n{}", log_path.display(), e, entry),
        }

        std::process::exit(CRASH_EXIT_CODE);
    }));
}

/// Append to a log, rotating `log` -> `log.1` -> ... once it exceeds the cap
fn append_rotating(path: &Path, entry: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size > 0 && size + entry.len() as u64 > MAX_LOG_BYTES {
        rotate(path)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(entry.as_bytes())
}

fn rotated(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

fn rotate(path: &Path) -> io::Result<()> {
    let oldest = rotated(path, KEEP_ROTATED);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..KEEP_ROTATED).rev() {
        let from = rotated(path, n);
        if from.exists() {
            fs::rename(&from, rotated(path, n + 1))?;
        }
    }
    fs::rename(path, rotated(path, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_creates_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CRASH_LOG);

        append_rotating(&path, "first\n").unwrap();
        append_rotating(&path, "second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_rotation_keeps_three() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CRASH_LOG);
        let big = "x".repeat(MAX_LOG_BYTES as usize);

        for i in 0..5 {
            append_rotating(&path, &format!("{i}{big}")).unwrap();
        }

        assert!(fs::read_to_string(&path).unwrap().starts_with('4'));
        assert!(fs::read_to_string(rotated(&path, 1)).unwrap().starts_with('3'));
        assert!(fs::read_to_string(rotated(&path, 3)).unwrap().starts_with('1'));
        assert!(!rotated(&path, 4).exists());
    }
}
