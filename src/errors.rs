//! Errors specific to reading, writing or modifying a PE image and its resources.

use alloc::string::String;
use core::str::Utf8Error;

#[cfg(feature = "std")]
use std::{io::Error as IOError, path::PathBuf};

#[cfg(feature = "std")]
use crate::{ResourceName, ResourceType};

/// Error that can occur when reading and parsing bytes.
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "std", error("{0}"))]
pub struct ReadError(pub String);

/// Errors that can occur when reading a PE image.
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ImageReadError {
    #[cfg_attr(feature = "std", error("invalid utf8: {0}"))]
    Utf8Error(Utf8Error),
    #[cfg_attr(feature = "std", error("invalid bytes: {0}"))]
    InvalidBytes(ReadError),
    #[cfg_attr(feature = "std", error("invalid header: {0}"))]
    InvalidHeader(String),
    #[cfg_attr(feature = "std", error("invalid resource table: {0}"))]
    InvalidResourceTable(String),
    #[cfg(feature = "std")]
    #[error("io error: {0}")]
    IOError(IOError),
}
impl From<Utf8Error> for ImageReadError {
    fn from(error: Utf8Error) -> Self { ImageReadError::Utf8Error(error) }
}
impl From<ReadError> for ImageReadError {
    fn from(error: ReadError) -> Self { ImageReadError::InvalidBytes(error) }
}
#[cfg(feature = "std")]
impl From<IOError> for ImageReadError {
    fn from(error: IOError) -> Self { ImageReadError::IOError(error) }
}

/// Errors that can occur when writing a PE image.
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ImageWriteError {
    #[cfg_attr(feature = "std", error("not enough space in file header"))]
    NotEnoughSpaceInHeader,
    #[cfg_attr(feature = "std", error("section points outside image: {0} > {1}"))]
    InvalidSectionRange(u64, u64),
}

/// Reasons an update session could not be started.
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("container already has an open update session")]
    InUse,
    #[error("container is not a valid image: {0}")]
    Image(ImageReadError),
    #[error("io error: {0}")]
    IOError(IOError),
}
#[cfg(feature = "std")]
impl From<ImageReadError> for SessionError {
    fn from(error: ImageReadError) -> Self { SessionError::Image(error) }
}
#[cfg(feature = "std")]
impl From<IOError> for SessionError {
    fn from(error: IOError) -> Self { SessionError::IOError(error) }
}

/// Reasons staged mutations could not be committed.
///
/// A failed commit never touches the container file: the rebuilt image is written to a
/// sibling temporary file and only renamed over the container once it is complete.
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("{0} read view(s) still open on the container")]
    ReadViewsOpen(usize),
    #[error("image could not be rebuilt: {0}")]
    Build(ImageWriteError),
    #[error("io error: {0}")]
    IOError(IOError),
}
#[cfg(feature = "std")]
impl From<ImageWriteError> for CommitError {
    fn from(error: ImageWriteError) -> Self { CommitError::Build(error) }
}
#[cfg(feature = "std")]
impl From<IOError> for CommitError {
    fn from(error: IOError) -> Self { CommitError::IOError(error) }
}

/// Errors of operations on resource containers on disk.
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("failed to open {0}: {1}")]
    OpenFailed(PathBuf, ImageReadError),
    #[error("failed to begin update of {0}: {1}")]
    SessionOpenFailed(PathBuf, SessionError),
    #[error("resource {0}/{1} not found")]
    ResourceNotFound(ResourceType, ResourceName),
    #[error("failed to read payload {0}: {1}")]
    SourceReadFailed(PathBuf, IOError),
    #[error("failed to commit update of {0}: {1}")]
    CommitFailed(PathBuf, CommitError),
    #[error("failed to launch {0}: {1}")]
    LaunchFailed(PathBuf, IOError),
    #[error("io error: {0}")]
    IOError(IOError),
}
#[cfg(feature = "std")]
impl From<IOError> for ContainerError {
    fn from(error: IOError) -> Self { ContainerError::IOError(error) }
}
