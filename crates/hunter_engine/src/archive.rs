use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hunter_core::JobId;
use hunter_logging::{hunter_debug, hunter_info};
use thiserror::Error;
use tokio::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no output directory for job {0}")]
    NotFound(JobId),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("archive task failed: {0}")]
    Task(String),
}

/// Builds `<output_root>/<job_id>.zip` from `<output_root>/<job_id>/` once and reuses it afterwards.
#[derive(Debug)]
pub struct Archiver {
    output_root: PathBuf,
    locks: DashMap<JobId, Arc<Mutex<()>>>,
    builds: AtomicUsize,
}

impl Archiver {
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            output_root,
            locks: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn job_dir(&self, id: JobId) -> PathBuf {
        self.output_root.join(id.to_string())
    }

    /// Number of archives written since startup.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn archive_name(id: JobId) -> String {
        format!("{id}.zip")
    }

    pub fn archive_path(&self, id: JobId) -> PathBuf {
        self.output_root.join(Self::archive_name(id))
    }

    pub async fn get_or_build_archive(&self, id: JobId) -> Result<PathBuf, ArchiveError> {
        let job_dir = self.job_dir(id);
        match tokio::fs::metadata(&job_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ArchiveError::NotFound(id)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::NotFound(id))
            }
            Err(err) => return Err(err.into()),
        }

        let target = self.archive_path(id);
        if tokio::fs::try_exists(&target).await? {
            hunter_debug!("reusing archive {}", target.display());
            return Ok(target);
        }

        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            if tokio::fs::try_exists(&target).await? {
                hunter_debug!("archive {} built by a concurrent request", target.display());
                Ok(target)
            } else {
                self.build(id, job_dir).await
            }
        };
        self.locks.remove_if(&id, |_, held| Arc::ptr_eq(held, &lock));
        result
    }

    async fn build(&self, id: JobId, job_dir: PathBuf) -> Result<PathBuf, ArchiveError> {
        let writer = AtomicFileWriter::new(self.output_root.clone());
        let name = Self::archive_name(id);
        let path = tokio::task::spawn_blocking(move || -> Result<(PathBuf, usize), ArchiveError> {
            let files = collect_files(&job_dir)?;
            let count = files.len();
            let path = writer.write_with(&name, |file| write_zip(file, &job_dir, &files))?;
            Ok((path, count))
        })
        .await
        .map_err(|err| ArchiveError::Task(err.to_string()))?;

        let (path, count) = path?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        hunter_info!("built archive {} ({} files)", path.display(), count);
        Ok(path)
    }
}

/// Regular files under `root`, as paths relative to it, in a stable order.
fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        for entry in fs::read_dir(root.join(&relative))? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let child = relative.join(entry.file_name());
            if file_type.is_dir() {
                pending.push(child);
            } else if file_type.is_file() {
                files.push(child);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn write_zip(file: &mut File, root: &Path, files: &[PathBuf]) -> io::Result<()> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(file);
    for relative in files {
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options).map_err(io::Error::other)?;
        let mut source = File::open(root.join(relative))?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish().map_err(io::Error::other)?;
    Ok(())
}
