use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::request::InboundRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Input,
    Output,
}

impl FileRole {
    fn prefix(self) -> &'static str {
        match self {
            FileRole::Input => "input",
            FileRole::Output => "output",
        }
    }
}

/// Request-scoped file path. Removed by [`TransientFile::release`], or on drop
/// if the owning request never got that far.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
    role: FileRole,
    released: bool,
}

impl TransientFile {
    fn new(path: PathBuf, role: FileRole) -> Self {
        Self {
            path,
            role,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> FileRole {
        self.role
    }

    /// Removes the file. A path that was never written is not an error.
    pub async fn release(mut self) -> io::Result<bool> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Input and output files of one request.
#[derive(Debug)]
pub struct RequestFiles {
    pub input: TransientFile,
    pub output: TransientFile,
}

impl RequestFiles {
    /// Removes both files, logging (not propagating) failures.
    pub async fn release(self) {
        let RequestFiles { input, output } = self;
        for file in [input, output] {
            let path = file.path().to_path_buf();
            let role = file.role();
            match file.release().await {
                Ok(true) => debug!(path = %path.display(), ?role, "removed transient file"),
                Ok(false) => {}
                Err(err) => {
                    warn!(path = %path.display(), ?role, error = %err, "failed to remove transient file")
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransientStore {
    root: PathBuf,
}

impl TransientStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, request: &InboundRequest, role: FileRole) -> PathBuf {
        self.root.join(format!(
            "{}_{}.{}",
            role.prefix(),
            request.request_id(),
            request.extension()
        ))
    }

    /// Binds both paths to the request. Nothing is created on disk yet.
    pub fn allocate(&self, request: &InboundRequest) -> RequestFiles {
        RequestFiles {
            input: TransientFile::new(self.path_for(request, FileRole::Input), FileRole::Input),
            output: TransientFile::new(
                self.path_for(request, FileRole::Output),
                FileRole::Output,
            ),
        }
    }
}
