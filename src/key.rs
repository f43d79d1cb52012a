//! Keys addressing a single resource in the three-level resource directory.
//!
//! Resources are stored as `type -> name -> language -> data`.
//! A [`ResourceKey`] names one leaf of that tree.

use core::fmt;

use crate::{constants::*, resource::ResourceName};

/// Resource type, the first level of the resource directory.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceType {
    /// Single icon image (`RT_ICON`).
    Icon,
    /// Icon group directory referencing icon images (`RT_GROUP_ICON`).
    IconGroup,
    /// Version information (`RT_VERSION`).
    Version,
    /// Multilingual user interface configuration, stored under the named type `MUI`.
    Mui,
    /// Any other numeric resource type, `RT_RCDATA` for custom payloads.
    Custom(WORD),
}
impl ResourceType {
    /// Raw application-defined data.
    pub const RCDATA: ResourceType = ResourceType::Custom(RT_RCDATA);

    /// Returns the name of the root table entry holding resources of this type.
    pub fn name(&self) -> ResourceName {
        match self {
            ResourceType::Icon => ResourceName::ID(RT_ICON as u32),
            ResourceType::IconGroup => ResourceName::ID(RT_GROUP_ICON as u32),
            ResourceType::Version => ResourceName::ID(RT_VERSION as u32),
            ResourceType::Mui => ResourceName::from_string(RT_MUI),
            ResourceType::Custom(id) => ResourceName::ID(*id as u32),
        }
    }

    /// Returns the type stored under the root table entry, if it is one of the known kinds.
    pub fn from_name(name: &ResourceName) -> Option<Self> {
        match name {
            ResourceName::ID(id) => u16::try_from(*id).ok().map(Self::from),
            ResourceName::Name(_) if *name == ResourceName::from_string(RT_MUI) => {
                Some(ResourceType::Mui)
            }
            ResourceName::Name(_) => None,
        }
    }
}
impl From<WORD> for ResourceType {
    fn from(id: WORD) -> Self {
        match id {
            RT_ICON => ResourceType::Icon,
            RT_GROUP_ICON => ResourceType::IconGroup,
            RT_VERSION => ResourceType::Version,
            id => ResourceType::Custom(id),
        }
    }
}
impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Icon => f.write_str("RT_ICON"),
            ResourceType::IconGroup => f.write_str("RT_GROUP_ICON"),
            ResourceType::Version => f.write_str("RT_VERSION"),
            ResourceType::Mui => f.write_str(RT_MUI),
            ResourceType::Custom(RT_RCDATA) => f.write_str("RT_RCDATA"),
            ResourceType::Custom(id) => write!(f, "#{}", id),
        }
    }
}

/// Full address of a resource: type, name or id, and language.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceKey {
    pub kind:     ResourceType,
    pub name:     ResourceName,
    pub language: LANGID,
}
impl ResourceKey {
    pub fn new<N: Into<ResourceName>>(kind: ResourceType, name: N, language: LANGID) -> Self {
        Self {
            kind,
            name: name.into(),
            language,
        }
    }

    /// Returns whether the resource carries the neutral language used for in-application resources.
    pub fn is_neutral(&self) -> bool { self.language == LANGUAGE_NEUTRAL }
}
impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.name, self.language)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn known_type_ids_map_to_variants() {
        assert_eq!(ResourceType::from(RT_ICON), ResourceType::Icon);
        assert_eq!(ResourceType::from(RT_GROUP_ICON), ResourceType::IconGroup);
        assert_eq!(ResourceType::from(RT_VERSION), ResourceType::Version);
        assert_eq!(ResourceType::from(RT_RCDATA), ResourceType::RCDATA);
        assert_eq!(ResourceType::from(RT_MANIFEST), ResourceType::Custom(24));
    }

    #[test]
    fn type_names_round_trip() {
        for kind in [
            ResourceType::Icon,
            ResourceType::IconGroup,
            ResourceType::Version,
            ResourceType::Mui,
            ResourceType::RCDATA,
        ] {
            assert_eq!(ResourceType::from_name(&kind.name()), Some(kind));
        }
        assert_eq!(ResourceType::from_name(&ResourceName::from_string("PNG")), None);
    }

    #[test]
    fn display_key() {
        let key = ResourceKey::new(ResourceType::IconGroup, "MAINICON", LANGUAGE_ID_EN_US);
        assert_eq!(key.to_string(), "RT_GROUP_ICON/MAINICON/1033");
        let key = ResourceKey::new(ResourceType::RCDATA, 7u16, LANGUAGE_NEUTRAL);
        assert_eq!(key.to_string(), "RT_RCDATA/#7/0");
        assert!(key.is_neutral());
    }
}
