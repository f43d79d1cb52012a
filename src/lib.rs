//! Resource **graft**ing for **p**ortable **e**xecutables.
//!
//! Supports:
//! * Parsing and rebuilding the resource directory of portable executables
//! * Transactional resource updates of executables on disk
//! * Icon and version information transplant between executables
//! * Embedding arbitrary files as resources, and extracting and starting them again
//!
//! See [`ReadView`] and [`UpdateSession`] for reading and updating the resources of an executable on disk,
//! and [`Image`] for working with executable images in memory.
//!
//! # Examples
//!
//! ### Icon replacement
//! ```
//! // remove the stale icons of the target, then copy all icons and the version information of the source
//! pegraft::replace_icon(SOURCE_PATH, TARGET_PATH)?;
//! ```
//!
//! ### Resource updates
//! ```
//! use pegraft::{ResourceKey, ResourceType, UpdateSession, constants::LANGUAGE_ID_EN_US};
//!
//! let view = pegraft::open_read(TARGET_PATH)?;
//! let icons = view.entries(ResourceType::Icon).count();
//! // read views have to be closed before committing
//! view.close();
//!
//! let mut session = UpdateSession::begin(TARGET_PATH)?;
//! session.stage_put(ResourceKey::new(ResourceType::RCDATA, 1u16, LANGUAGE_ID_EN_US), b"data".to_vec());
//! session.stage_delete(ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_ID_EN_US));
//! session.commit()?;
//! ```
//!
//! ### Payloads
//! ```
//! use pegraft::{DetachedProcess, PayloadKind};
//!
//! pegraft::embed(SCRIPT_PATH, TARGET_PATH, 101)?;
//!
//! // extract the script to a temporary file and start it with the python interpreter
//! let path = pegraft::run(TARGET_PATH, 101, &PayloadKind::python(), &DetachedProcess)?;
//! ```
//!
//! ### In-memory resource transfer
//! ```
//! use pegraft::Image;
//!
//! let source = std::fs::read(SOURCE_PATH)?;
//! let target = std::fs::read(TARGET_PATH)?;
//!
//! // get the source resource directory
//! let resources = Image::parse(&source)?.resource_directory().cloned().unwrap_or_default();
//!
//! // set the resource directory in the target image
//! let mut image = Image::parse(&target)?;
//! image.set_resource_directory(resources)?;
//!
//! // build an executable image with all changes applied
//! let target = image.data();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(doc)))]

extern crate alloc;

pub(crate) mod enumerate;
pub(crate) mod errors;
pub(crate) mod image;
pub(crate) mod key;
pub(crate) mod resource;
pub(crate) mod util;

#[cfg(feature = "std")]
pub(crate) mod capsule;
#[cfg(feature = "std")]
pub(crate) mod io;
#[cfg(feature = "std")]
pub(crate) mod launcher;
#[cfg(feature = "std")]
pub(crate) mod transplant;

pub mod constants;
pub mod types;

pub use crate::{enumerate::*, errors::*, image::*, key::*, resource::*};
#[cfg(feature = "std")]
pub use crate::{capsule::*, io::*, launcher::*, transplant::*};
