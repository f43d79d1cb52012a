//! Scoped access to resource containers on disk.
//!
//! A container is opened either as a [`ReadView`] for inspecting its resources, or as an
//! [`UpdateSession`] that stages resource changes and applies them in a single commit.
//! Any number of read views may be open on a container, but only one update session, and
//! the session refuses to commit while read views on the same container are still open.
//!
//! Neither mode loads the container as executable code, the file is only parsed.

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::{debug, info, warn};

use crate::{enumerate::*, errors::*, image::Image, key::*, resource::*};

#[derive(Debug, Default)]
struct Usage {
    readers: usize,
    writer:  bool,
}

/// Open read views and update sessions per canonical container path.
static CONTAINERS: Mutex<BTreeMap<PathBuf, Usage>> = Mutex::new(BTreeMap::new());

fn containers() -> MutexGuard<'static, BTreeMap<PathBuf, Usage>> {
    CONTAINERS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn release(containers: &mut BTreeMap<PathBuf, Usage>, path: &Path, update: impl FnOnce(&mut Usage)) {
    if let Some(usage) = containers.get_mut(path) {
        update(usage);
        if usage.readers == 0 && !usage.writer {
            containers.remove(path);
        }
    }
}

/// Read-only view of the resources of a container.
///
/// Resource data returned by the view borrows from it and is released with it.
#[derive(Debug)]
pub struct ReadView {
    path:      PathBuf,
    directory: ResourceDirectory,
}
impl ReadView {
    /// Open the container at the path for reading its resources.
    ///
    /// An image without a resource directory yields an empty view.
    ///
    /// # Returns
    /// Returns [`ContainerError::OpenFailed`] if the file does not exist, cannot be read or is not a portable executable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let open_failed = |error: ImageReadError| ContainerError::OpenFailed(path.to_path_buf(), error);

        let canonical = fs::canonicalize(path).map_err(|e| open_failed(e.into()))?;
        let image = Image::parse_file(&canonical).map_err(open_failed)?;
        let directory = image.resource_directory().cloned().unwrap_or_default();
        debug!(
            "opened read view of {} ({} resource types)",
            canonical.display(),
            directory.root().len()
        );

        containers().entry(canonical.clone()).or_default().readers += 1;
        Ok(Self {
            path: canonical,
            directory,
        })
    }

    /// Returns the canonical path of the container.
    pub fn path(&self) -> &Path { &self.path }

    /// Returns the resource directory of the container.
    pub fn directory(&self) -> &ResourceDirectory { &self.directory }

    /// Returns an iterator over all resources of the given type.
    pub fn entries(&self, kind: ResourceType) -> Entries<'_> { self.directory.entries(kind) }

    /// Get the resource stored under the key.
    pub fn get(&self, key: &ResourceKey) -> Option<ResourceEntry<'_>> {
        self.entries(key.kind).find(|entry| entry.key() == key)
    }

    /// Find a resource of the given type and name in any language.
    pub fn find(&self, kind: ResourceType, name: &ResourceName) -> Option<ResourceEntry<'_>> {
        self.entries(kind).find(|entry| &entry.key().name == name)
    }

    /// Close the view. Equivalent to dropping it.
    pub fn close(self) {}
}
impl Drop for ReadView {
    fn drop(&mut self) {
        release(&mut containers(), &self.path, |usage| {
            usage.readers = usage.readers.saturating_sub(1)
        });
        debug!("closed read view of {}", self.path.display());
    }
}

/// Open a container for reading its resources.
pub fn open_read<P: AsRef<Path>>(path: P) -> Result<ReadView, ContainerError> { ReadView::open(path) }

/// Returns an iterator over all resources of the given type in the view.
pub fn enumerate(view: &ReadView, kind: ResourceType) -> Entries<'_> { view.entries(kind) }

/// A staged change to a resource.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Mutation {
    Put(ResourceKey, Vec<u8>),
    Delete(ResourceKey),
}

/// Exclusive transaction over the resources of one container.
///
/// Changes are staged in memory and written by [`UpdateSession::commit`] in one step.
/// Dropping a session that was neither committed nor discarded discards it.
#[derive(Debug)]
pub struct UpdateSession {
    path:     PathBuf,
    image:    Image<'static>,
    pending:  Vec<Mutation>,
    finished: bool,
}
impl UpdateSession {
    /// Begin an update session on the container at the path.
    ///
    /// # Returns
    /// Returns [`ContainerError::SessionOpenFailed`] if the file cannot be opened for writing, is not a portable executable,
    /// or another session on the same container is still open.
    pub fn begin<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let session_failed =
            |error: SessionError| ContainerError::SessionOpenFailed(path.to_path_buf(), error);

        let canonical = fs::canonicalize(path).map_err(|e| session_failed(e.into()))?;
        // fail early on read-only files instead of at commit
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&canonical)
            .map_err(|e| session_failed(e.into()))?;
        let image = Image::parse_file(&canonical).map_err(|e| session_failed(e.into()))?;

        let mut registry = containers();
        let usage = registry.entry(canonical.clone()).or_default();
        if usage.writer {
            return Err(session_failed(SessionError::InUse));
        }
        usage.writer = true;
        debug!("began update session on {}", canonical.display());

        Ok(Self {
            path: canonical,
            image,
            pending: Vec::new(),
            finished: false,
        })
    }

    /// Returns the canonical path of the container.
    pub fn path(&self) -> &Path { &self.path }

    /// Returns the mutations staged so far, in staging order.
    pub fn pending(&self) -> &[Mutation] { &self.pending }

    /// Stage writing the data under the key, replacing existing data.
    /// Staging empty data is a deletion.
    pub fn stage_put<D: Into<Vec<u8>>>(&mut self, key: ResourceKey, data: D) {
        let data = data.into();
        if data.is_empty() {
            return self.stage_delete(key);
        }
        debug!("staging put of {} ({} bytes)", key, data.len());
        self.pending.push(Mutation::Put(key, data));
    }

    /// Stage deleting the resource stored under the key.
    pub fn stage_delete(&mut self, key: ResourceKey) {
        debug!("staging delete of {}", key);
        self.pending.push(Mutation::Delete(key));
    }

    /// Apply all staged mutations to the container.
    ///
    /// The image is rebuilt and written to a temporary file next to the container, which then replaces the container.
    /// A failed commit leaves the container unchanged. Either way the session ends.
    ///
    /// # Returns
    /// Returns [`ContainerError::CommitFailed`] if read views on the container are still open,
    /// the image cannot be rebuilt with the new resources, or the file cannot be written.
    pub fn commit(mut self) -> Result<(), ContainerError> {
        self.finished = true;
        let path = self.path.clone();
        let commit_failed = |error: CommitError| ContainerError::CommitFailed(path.clone(), error);

        let registry = containers();
        let readers = registry.get(&self.path).map(|usage| usage.readers).unwrap_or_default();
        if readers > 0 {
            warn!(
                "refusing to commit {}: {} read view(s) still open",
                self.path.display(),
                readers
            );
            return Err(commit_failed(CommitError::ReadViewsOpen(readers)));
        }

        let mut directory = self.image.resource_directory().cloned().unwrap_or_default();
        let mut changed = false;
        for mutation in self.pending.drain(..) {
            match mutation {
                Mutation::Put(key, data) => {
                    let previous = directory.insert(&key, data);
                    changed |= previous.as_ref().map(ResourceData::data)
                        != directory.get(&key).map(ResourceData::data);
                }
                Mutation::Delete(key) => changed |= directory.remove(&key).is_some(),
            }
        }
        if !changed {
            debug!("no changes to commit to {}", self.path.display());
            return Ok(());
        }

        self.image.set_resource_directory(directory).map_err(|e| commit_failed(e.into()))?;
        write_atomic(&self.path, self.image.data()).map_err(|e| commit_failed(e.into()))?;
        drop(registry);

        info!("committed resource update of {}", self.path.display());
        Ok(())
    }

    /// Abandon all staged mutations and end the session.
    pub fn discard(mut self) {
        self.finished = true;
        debug!(
            "discarded update session on {} ({} staged mutations)",
            self.path.display(),
            self.pending.len()
        );
    }
}
impl Drop for UpdateSession {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                "update session on {} dropped without commit, discarding {} staged mutations",
                self.path.display(),
                self.pending.len()
            );
        }
        release(&mut containers(), &self.path, |usage| usage.writer = false);
    }
}

/// Begin an update session on a container.
pub fn begin_write<P: AsRef<Path>>(path: P) -> Result<UpdateSession, ContainerError> {
    UpdateSession::begin(path)
}

/// Replace the file at the path with the data, keeping its permissions.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let permissions = fs::metadata(path)?.permissions();
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(directory)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    fs::set_permissions(file.path(), permissions)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
