//! Arbitrary files stored as `RT_RCDATA` resources.
//!
//! A payload is stored verbatim under a numeric id, without any header or length prefix.
//! It can later be extracted to a fresh temporary file and started from there.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{constants::*, errors::*, io::*, key::*, launcher::*};

/// Language payloads are stored with.
pub const PAYLOAD_LANGUAGE: LANGID = LANGUAGE_ID_EN_US;

/// Returns the key a payload with the given id is stored under.
pub fn payload_key(id: u16) -> ResourceKey { ResourceKey::new(ResourceType::RCDATA, id, PAYLOAD_LANGUAGE) }

/// Store the contents of the payload file in the container under the id.
/// An existing payload with the same id is replaced, an empty payload file removes it.
///
/// # Returns
/// Returns [`ContainerError::SourceReadFailed`] if the payload cannot be read.
/// The container is not opened in that case.
pub fn embed<P: AsRef<Path>, C: AsRef<Path>>(
    payload: P, container: C, id: u16,
) -> Result<(), ContainerError> {
    let (payload, container) = (payload.as_ref(), container.as_ref());
    let data =
        fs::read(payload).map_err(|e| ContainerError::SourceReadFailed(payload.to_path_buf(), e))?;
    debug!("read {} bytes of payload {}", data.len(), payload.display());

    let mut session = begin_write(container)?;
    let size = data.len();
    session.stage_put(payload_key(id), data);
    session.commit()?;
    info!("embedded {} ({} bytes) in {} as #{}", payload.display(), size, container.display(), id);
    Ok(())
}

/// Copy the payload with the id out of the container.
/// Payloads stored in another language are found as well.
fn read_payload(container: &Path, id: u16) -> Result<Vec<u8>, ContainerError> {
    let view = open_read(container)?;
    let key = payload_key(id);
    let entry = view
        .get(&key)
        .or_else(|| view.find(key.kind, &key.name))
        .ok_or_else(|| ContainerError::ResourceNotFound(key.kind, key.name.clone()))?;
    debug!("found payload {} ({} bytes) in {}", entry.key(), entry.len(), container.display());
    Ok(entry.data().to_vec())
}

/// Write the payload with the id to a new temporary file with the extension.
///
/// # Returns
/// The path of the file, which is not removed automatically.
/// Returns [`ContainerError::ResourceNotFound`] if the container has no payload with the id,
/// no file is created in that case.
pub fn extract<C: AsRef<Path>>(container: C, id: u16, extension: &str) -> Result<PathBuf, ContainerError> {
    extract_in(container, id, extension, std::env::temp_dir())
}

/// Write the payload with the id to a new file with the extension in the directory.
///
/// See [`extract`].
pub fn extract_in<C: AsRef<Path>, D: AsRef<Path>>(
    container: C, id: u16, extension: &str, directory: D,
) -> Result<PathBuf, ContainerError> {
    let container = container.as_ref();
    let data = read_payload(container, id)?;

    let suffix = match extension.trim_start_matches('.') {
        "" => String::new(),
        extension => format!(".{}", extension),
    };
    let mut file = tempfile::Builder::new()
        .prefix("pegraft")
        .suffix(&suffix)
        .tempfile_in(directory)?;
    file.write_all(&data)?;
    file.as_file().sync_all()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;

    info!("extracted #{} of {} to {}", id, container.display(), path.display());
    Ok(path)
}

/// Start the extracted payload without waiting for it.
///
/// Executables are started directly, scripts are passed to their interpreter as the only argument.
pub fn launch<P: AsRef<Path>, L: Launcher + ?Sized>(
    path: P, kind: &PayloadKind, launcher: &L,
) -> Result<(), ContainerError> {
    let path = path.as_ref();
    let result = match kind {
        PayloadKind::Executable => launcher.spawn_detached(path.as_os_str(), &[]),
        PayloadKind::Script { interpreter, .. } => {
            launcher.spawn_detached(interpreter, &[path.as_os_str()])
        }
    };
    result.map_err(|e| ContainerError::LaunchFailed(path.to_path_buf(), e))?;
    debug!("launched {} as {:?}", path.display(), kind);
    Ok(())
}

/// Extract the payload with the id to a temporary file and start it.
///
/// # Returns
/// The path of the extracted file.
pub fn run<C: AsRef<Path>, L: Launcher + ?Sized>(
    container: C, id: u16, kind: &PayloadKind, launcher: &L,
) -> Result<PathBuf, ContainerError> {
    let path = extract(container, id, kind.extension())?;
    #[cfg(unix)]
    if !kind.is_interpreted() {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }
    launch(&path, kind, launcher)?;
    Ok(path)
}
