use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::audio::{self, AudioResource};

pub fn sandbox_dir() -> PathBuf {
    std::env::temp_dir().join("loop-practice").join("imports")
}

/// Copies `src` into `sandbox`, replacing an earlier copy with the same name.
pub fn copy_into_sandbox(src: &Path, sandbox: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .with_context(|| format!("{} has no file name", src.display()))?;
    fs::create_dir_all(sandbox)
        .with_context(|| format!("failed to create {}", sandbox.display()))?;
    let dest = sandbox.join(name);

    if let (Ok(a), Ok(b)) = (src.canonicalize(), dest.canonicalize()) {
        if a == b {
            return Ok(dest);
        }
    }
    if dest.exists() {
        fs::remove_file(&dest).with_context(|| format!("failed to replace {}", dest.display()))?;
    }
    fs::copy(src, &dest).with_context(|| format!("failed to copy {}", src.display()))?;
    log::info!("copied {} to {}", src.display(), dest.display());
    Ok(dest)
}

pub enum ImportPoll {
    Pending,
    /// Reported once when the job outlives the timeout; the job keeps running.
    TimedOut,
    Done(Result<AudioResource>),
}

pub struct ImportJob {
    name: String,
    started: Instant,
    timeout: Duration,
    timeout_reported: bool,
    rx: Receiver<Result<AudioResource>>,
}

impl ImportJob {
    pub fn spawn(path: PathBuf, sandbox: PathBuf, timeout: Duration) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let result = copy_into_sandbox(&path, &sandbox).and_then(audio::load_resource);
            tx.send(result).ok();
        });
        Self {
            name,
            started: Instant::now(),
            timeout,
            timeout_reported: false,
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll(&mut self) -> ImportPoll {
        match self.rx.try_recv() {
            Ok(result) => ImportPoll::Done(result),
            Err(TryRecvError::Disconnected) => {
                ImportPoll::Done(Err(anyhow!("import of {} was interrupted", self.name)))
            }
            Err(TryRecvError::Empty) => {
                if !self.timeout_reported && self.started.elapsed() >= self.timeout {
                    self.timeout_reported = true;
                    log::warn!("import of {} is taking longer than {:?}", self.name, self.timeout);
                    ImportPoll::TimedOut
                } else {
                    ImportPoll::Pending
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_replaces_previous_import() {
        let src_dir = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("lesson.mp3");

        fs::write(&src, b"first").unwrap();
        let dest = copy_into_sandbox(&src, sandbox.path()).unwrap();
        fs::write(&src, b"second").unwrap();
        let again = copy_into_sandbox(&src, sandbox.path()).unwrap();

        assert_eq!(dest, again);
        assert_eq!(fs::read(&dest).unwrap(), b"second");
    }

    #[test]
    fn copying_a_sandboxed_file_onto_itself_keeps_it() {
        let sandbox = tempfile::tempdir().unwrap();
        let file = sandbox.path().join("lesson.mp3");
        fs::write(&file, b"audio").unwrap();
        let dest = copy_into_sandbox(&file, sandbox.path()).unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"audio");
    }

    #[test]
    fn undecodable_file_fails_the_job() {
        let src_dir = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("notes.txt");
        fs::write(&src, b"not audio at all").unwrap();

        let mut job = ImportJob::spawn(src, sandbox.path().to_path_buf(), Duration::from_secs(20));
        let result = loop {
            match job.poll() {
                ImportPoll::Done(result) => break result,
                _ => thread::sleep(Duration::from_millis(5)),
            }
        };
        assert!(result.is_err());
    }

    #[test]
    fn slow_job_reports_timeout_once() {
        let (_tx, rx) = bounded::<Result<AudioResource>>(1);
        let mut job = ImportJob {
            name: "slow.mp3".into(),
            started: Instant::now(),
            timeout: Duration::ZERO,
            timeout_reported: false,
            rx,
        };
        assert!(matches!(job.poll(), ImportPoll::TimedOut));
        assert!(matches!(job.poll(), ImportPoll::Pending));
    }
}
