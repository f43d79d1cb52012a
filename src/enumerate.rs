//! Flat enumeration of the `type -> name -> language` resource tree.

use indexmap::map::Iter;
use log::warn;

use crate::{key::*, resource::*};

/// A single stored resource: its key and the bytes it holds.
///
/// The bytes borrow from the directory they were enumerated from and cannot outlive it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceEntry<'a> {
    key:  ResourceKey,
    data: &'a [u8],
}
impl<'a> ResourceEntry<'a> {
    pub fn key(&self) -> &ResourceKey { &self.key }

    pub fn data(&self) -> &'a [u8] { self.data }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

/// Lazy iterator over every resource of one type, one item per stored name and language.
///
/// Created by [`ResourceDirectory::entries`] or [`crate::ReadView::entries`].
/// The order follows the directory and is not significant.
#[derive(Debug)]
pub struct Entries<'a> {
    kind:      ResourceType,
    names:     Option<Iter<'a, ResourceName, ResourceNode>>,
    languages: Option<(&'a ResourceName, Iter<'a, ResourceName, ResourceNode>)>,
}
impl<'a> Entries<'a> {
    pub(crate) fn new(directory: &'a ResourceDirectory, kind: ResourceType) -> Self {
        Self {
            kind,
            names: directory.type_table(&kind).map(ResourceTable::iter),
            languages: None,
        }
    }
}
impl<'a> Iterator for Entries<'a> {
    type Item = ResourceEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((name, languages)) = &mut self.languages {
                for (language, node) in languages.by_ref() {
                    let language = language.id().and_then(|id| u16::try_from(id).ok());
                    match (language, node) {
                        (Some(language), ResourceNode::Data(data)) => {
                            return Some(ResourceEntry {
                                key:  ResourceKey::new(self.kind, (*name).clone(), language),
                                data: data.data(),
                            });
                        }
                        _ => warn!("skipping malformed language entry of resource {}/{}", self.kind, name),
                    }
                }
                self.languages = None;
            }

            let (name, node) = self.names.as_mut()?.next()?;
            match node {
                ResourceNode::Table(languages) => self.languages = Some((name, languages.iter())),
                ResourceNode::Data(_) => {
                    warn!("skipping resource {}/{} without language table", self.kind, name)
                }
            }
        }
    }
}

impl ResourceDirectory {
    /// Returns an iterator over all resources of the given type.
    pub fn entries(&self, kind: ResourceType) -> Entries<'_> { Entries::new(self, kind) }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::constants::*;

    #[test]
    fn enumerate_every_language() {
        let mut directory = ResourceDirectory::default();
        directory.insert(&ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_NEUTRAL), vec![1]);
        directory.insert(&ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_ID_EN_US), vec![2]);
        directory.insert(&ResourceKey::new(ResourceType::Icon, 2u16, LANGUAGE_ID_EN_GB), vec![3, 3]);
        directory.insert(&ResourceKey::new(ResourceType::IconGroup, 1u16, LANGUAGE_NEUTRAL), vec![4]);

        let mut icons = directory
            .entries(ResourceType::Icon)
            .map(|entry| (entry.key().clone(), entry.data().to_vec()))
            .collect::<Vec<_>>();
        icons.sort_by_key(|(key, _)| (key.name.id(), key.language));
        assert_eq!(icons, vec![
            (ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_NEUTRAL), vec![1]),
            (ResourceKey::new(ResourceType::Icon, 1u16, LANGUAGE_ID_EN_US), vec![2]),
            (ResourceKey::new(ResourceType::Icon, 2u16, LANGUAGE_ID_EN_GB), vec![3, 3]),
        ]);

        assert_eq!(directory.entries(ResourceType::IconGroup).count(), 1);
        assert_eq!(directory.entries(ResourceType::Version).count(), 0);
    }

    #[test]
    fn skip_malformed_branches() {
        let mut directory = ResourceDirectory::default();
        directory.insert(&ResourceKey::new(ResourceType::RCDATA, 1u16, LANGUAGE_NEUTRAL), vec![1]);
        let names = directory
            .root_mut()
            .get_mut(ResourceType::RCDATA.name())
            .and_then(ResourceNode::as_table_mut)
            .unwrap();
        names.insert(ResourceName::ID(2), ResourceNode::Data(ResourceData::new(vec![2])));

        let entries = directory.entries(ResourceType::RCDATA).collect::<Vec<_>>();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data(), &[1]);
        assert_eq!(entries[0].len(), 1);
    }
}
