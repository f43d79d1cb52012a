//! Moving icon and version resources between executables.
//!
//! Icons are transplanted in two phases: [`delete_icons`] clears stale icon data from the
//! destination, then [`copy_icons`] copies every icon variant of the source over.
//! [`replace_icon`] runs both. Each phase is a separate update session on the destination,
//! a failed phase is not rolled back.
//!
//! [`delete_icons`] only removes icons with the neutral language. Icons tagged with a
//! locale-specific language are left in place and overwritten by the copy where the source
//! has the same key.

use std::path::Path;

use log::{debug, info, warn};

use crate::{errors::*, io::*, key::*};

/// Options for copying resources between executables.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransplantOptions {
    /// Copy version information (product name, version, copyright) along with the icons.
    pub version_info: bool,
}
impl Default for TransplantOptions {
    fn default() -> Self { Self { version_info: true } }
}

/// Returns whether the resource has to be removed before new icons are copied in.
fn is_stale(key: &ResourceKey) -> bool {
    match key.kind {
        // the resource loader refuses updates to files with mui configuration
        ResourceType::Mui => true,
        ResourceType::Icon | ResourceType::IconGroup => key.is_neutral(),
        _ => false,
    }
}

/// Delete the icons of the destination.
///
/// Removes every `MUI` resource, and icon and icon group resources with the neutral language.
///
/// # Returns
/// The number of deleted resources.
pub fn delete_icons<P: AsRef<Path>>(destination: P) -> Result<usize, ContainerError> {
    let destination = destination.as_ref();
    let view = open_read(destination)?;
    debug!("opened {} for enumeration", destination.display());
    let mut session = begin_write(destination)?;
    debug!("began deleting icons of {}", destination.display());

    for kind in [ResourceType::Mui, ResourceType::Icon, ResourceType::IconGroup] {
        for entry in enumerate(&view, kind) {
            if is_stale(entry.key()) {
                session.stage_delete(entry.key().clone());
            } else {
                debug!("keeping {}", entry.key());
            }
        }
    }
    let deleted = session.pending().len();
    debug!("staged {} deletes in {}", deleted, destination.display());

    view.close();
    session.commit()?;
    info!("deleted {} icon resources from {}", deleted, destination.display());
    Ok(deleted)
}

/// Copy all icons and the version information of the source to the destination.
///
/// See [`copy_icons_with`].
pub fn copy_icons<S: AsRef<Path>, D: AsRef<Path>>(
    source: S, destination: D,
) -> Result<usize, ContainerError> {
    copy_icons_with(source, destination, &TransplantOptions::default())
}

/// Copy all icons of the source to the destination.
///
/// Every icon and icon group resource is copied in every language it is stored in, existing
/// resources with the same key are overwritten.
///
/// # Returns
/// The number of copied resources.
pub fn copy_icons_with<S: AsRef<Path>, D: AsRef<Path>>(
    source: S, destination: D, options: &TransplantOptions,
) -> Result<usize, ContainerError> {
    let (source, destination) = (source.as_ref(), destination.as_ref());
    let view = open_read(source)?;
    debug!("opened source {}", source.display());
    let mut session = begin_write(destination)?;
    debug!("began copying icons to {}", destination.display());

    let mut kinds = vec![ResourceType::Icon, ResourceType::IconGroup];
    if options.version_info {
        kinds.push(ResourceType::Version);
    }
    for kind in kinds {
        for entry in enumerate(&view, kind) {
            session.stage_put(entry.key().clone(), entry.data());
        }
    }
    let copied = session.pending().len();
    debug!("staged {} puts in {}", copied, destination.display());

    view.close();
    session.commit()?;
    info!(
        "copied {} resources from {} to {}",
        copied,
        source.display(),
        destination.display()
    );
    Ok(copied)
}

/// Replace the icons of the destination with the icons of the source.
///
/// See [`replace_icon_with`].
pub fn replace_icon<S: AsRef<Path>, D: AsRef<Path>>(
    source: S, destination: D,
) -> Result<usize, ContainerError> {
    replace_icon_with(source, destination, &TransplantOptions::default())
}

/// Replace the icons of the destination with the icons of the source.
///
/// Deletes the icons of the destination, then copies the icons of the source.
/// The copy runs even if the deletion failed.
///
/// # Returns
/// The number of copied resources.
pub fn replace_icon_with<S: AsRef<Path>, D: AsRef<Path>>(
    source: S, destination: D, options: &TransplantOptions,
) -> Result<usize, ContainerError> {
    let destination = destination.as_ref();
    if let Err(e) = delete_icons(destination) {
        warn!("failed to delete icons of {}, copying anyway: {}", destination.display(), e);
    }
    copy_icons_with(source, destination, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn stale_resources() {
        assert!(is_stale(&ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_NEUTRAL)));
        assert!(is_stale(&ResourceKey::new(ResourceType::IconGroup, "MAINICON", LANGUAGE_NEUTRAL)));
        assert!(!is_stale(&ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_ID_EN_US)));
        assert!(is_stale(&ResourceKey::new(ResourceType::Mui, 1u16, LANGUAGE_ID_EN_US)));
        assert!(!is_stale(&ResourceKey::new(ResourceType::Version, 1u16, LANGUAGE_NEUTRAL)));
        assert!(!is_stale(&ResourceKey::new(ResourceType::RCDATA, 1u16, LANGUAGE_NEUTRAL)));
    }
}
