//! Data types for parsing and building the resource section.
//! The resource section contains the resource directory and the resource data.
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-rsrc-section> for more information.

use alloc::{string::String, vec::Vec};
use core::{borrow::Borrow, cmp::Ordering, fmt, mem::size_of};

use ahash::RandomState;
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use log::{error, trace, warn};
use zerocopy::IntoBytes;

use crate::{errors::*, key::*, types::*, util::*};

/// Resource trees nest `type -> name -> language`, anything deeper than this is treated as corrupt.
const MAX_TABLE_DEPTH: usize = 8;

/// Portable executable resource directory.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceDirectory {
    pub(crate) virtual_address: u32,
    pub(crate) root:            ResourceTable,
}
impl ResourceDirectory {
    /// Parse the resource directory from the given image at the given file offset.
    /// The virtual address is used to resolve the resource data offsets and has to correspond to the virtual address of the directory in the source image.
    ///
    /// # Returns
    /// Returns an error if the resource directory at the given address is invalid.
    pub fn parse(
        image: &[u8], base_address: u32, virtual_address: u32,
    ) -> Result<Self, ImageReadError> {
        let root = ResourceTable::parse(image, base_address, virtual_address, 0, 0)?;
        Ok(Self {
            virtual_address,
            root,
        })
    }

    /// Returns the virtual address of the resource directory in the source image.
    pub fn virtual_address(&self) -> u32 { self.virtual_address }

    /// Returns the root resource table.
    /// The root resource table contains one entry per resource type.
    pub fn root(&self) -> &ResourceTable { &self.root }

    /// Returns the mutable root resource table.
    pub fn root_mut(&mut self) -> &mut ResourceTable { &mut self.root }

    /// Returns the size of the resulting resource directory in bytes.
    pub fn size(&self) -> u32 { self.root.size() }

    /// Build the resource directory into raw bytes to be included in an image.
    /// The virtual address is used to compute the resource data offsets and has to correspond to the virtual address of the directory in the target image.
    pub fn build(&self, virtual_address: u32) -> Vec<u8> { self.root.build(virtual_address) }

    /// Returns the table holding all resources of the given type.
    pub fn type_table(&self, kind: &ResourceType) -> Option<&ResourceTable> {
        self.root.get(kind.name()).and_then(ResourceNode::as_table)
    }

    /// Get the resource data stored under the key.
    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceData> {
        self.type_table(&key.kind)?
            .get(&key.name)?
            .as_table()?
            .get(ResourceName::ID(key.language as u32))?
            .as_data()
    }

    /// Insert resource data under the key, creating the type and name tables as needed.
    /// # Returns
    /// The replaced data.
    pub fn insert(&mut self, key: &ResourceKey, data: Vec<u8>) -> Option<ResourceData> {
        let names = self.root.table_mut(key.kind.name());
        let languages = names.table_mut(key.name.clone());
        let previous = languages.insert(
            ResourceName::ID(key.language as u32),
            ResourceNode::Data(ResourceData::new(data)),
        );
        match previous {
            Some(ResourceNode::Data(data)) => Some(data),
            _ => None,
        }
    }

    /// Remove the resource data stored under the key.
    /// Tables left empty by the removal are removed as well.
    /// # Returns
    /// The removed data.
    pub fn remove(&mut self, key: &ResourceKey) -> Option<ResourceData> {
        let type_name = key.kind.name();
        let names = self.root.get_mut(&type_name)?.as_table_mut()?;
        let languages = names.get_mut(&key.name)?.as_table_mut()?;
        let removed = match languages.remove(ResourceName::ID(key.language as u32))? {
            ResourceNode::Data(data) => data,
            table => {
                // not a leaf, put it back untouched
                languages.insert(ResourceName::ID(key.language as u32), table);
                return None;
            }
        };
        if languages.is_empty() {
            names.remove(&key.name);
        }
        if names.is_empty() {
            self.root.remove(&type_name);
        }
        Some(removed)
    }
}

/// Portable executable resource table data.
enum TableData {
    Table(ResourceDirectoryTable),
    Entry(ResourceDirectoryEntry),
}

/// Portable executable resource table.
///
/// Entries are kept in directory order: named entries first, then ids in ascending order.
/// The Windows loader binary-searches the tables and relies on this order.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceTable {
    pub(crate) data:    ResourceDirectoryTable,
    pub(crate) entries: IndexMap<ResourceName, ResourceNode, RandomState>,
}
impl ResourceTable {
    fn parse(
        image: &[u8], base_address: u32, virtual_address: u32, directory_offset: u32, level: usize,
    ) -> Result<Self, ImageReadError> {
        if level > MAX_TABLE_DEPTH {
            return Err(ImageReadError::InvalidResourceTable(alloc::format!(
                "nesting deeper than {} levels",
                MAX_TABLE_DEPTH
            )));
        }
        let table_offset = base_address as u64 + directory_offset as u64;
        let resource_table = read_at::<ResourceDirectoryTable, _>(image, table_offset)?;
        trace!("{} {:#x?}", "--".repeat(level + 1), resource_table);

        let mut entries = IndexMap::with_hasher(RandomState::new());

        let mut entry_offset = table_offset + 16;
        for _ in 0..(resource_table.number_of_name_entries as u32
            + resource_table.number_of_id_entries as u32)
        {
            let entry = read_at::<ResourceDirectoryEntry, _>(image, entry_offset)?;
            trace!("{} {:#x?}", "--".repeat(level + 1), entry);
            entry_offset += 8;

            let name = ResourceName::parse(image, base_address, entry.name_offset_or_integer_id)?;
            if entry.data_entry_or_subdirectory_offset & 0x80000000 != 0 {
                let table = ResourceTable::parse(
                    image,
                    base_address,
                    virtual_address,
                    entry.data_entry_or_subdirectory_offset ^ 0x80000000,
                    level + 1,
                )?;
                entries.insert(name, ResourceNode::Table(table));
            } else {
                let description_offset =
                    base_address as u64 + entry.data_entry_or_subdirectory_offset as u64;
                trace!(
                    "reading {} bytes at {} (image size {})",
                    size_of::<ResourceDataEntry>(),
                    description_offset,
                    image.len()
                );
                let data = read_at::<ResourceDataEntry, _>(image, description_offset)?;
                // calculate as i64 and convert to u64 first to check for padding
                let address = base_address as i64 + data.data_rva as i64 - virtual_address as i64;
                let mut address = address as u64;
                if address & 0xffffffffff000000 == 0xffffffffff000000 {
                    warn!(
                        "{} resource data entry address {:#x?} seems to be packed, ignoring padding",
                        "--".repeat(level + 1),
                        address
                    );
                    address ^= 0xffffffffff000000;
                }
                trace!("{} {:#x?} {:#x?}", "--".repeat(level + 1), address, data);
                let end = address.checked_add(data.size as u64).filter(|&end| end <= image.len() as u64);
                let Some(end) = end else {
                    error!(
                        "{} resource data entry address {:#x?} with size {:#x?} outside valid range ({:#x?})",
                        "--".repeat(level + 1),
                        address,
                        data.size,
                        image.len()
                    );
                    continue;
                };
                let start = address as usize;
                entries.insert(
                    name,
                    ResourceNode::Data(ResourceData {
                        codepage: data.codepage,
                        reserved: data.reserved,
                        data:     image[start..end as usize].to_vec().into(),
                    }),
                );
            }
        }
        let mut table = Self {
            data: resource_table,
            entries,
        };
        // entries outside the image were skipped
        table.recount();
        Ok(table)
    }

    fn recount(&mut self) {
        let names = self.entries.keys().filter(|name| name.is_name()).count();
        self.data.number_of_name_entries = names as u16;
        self.data.number_of_id_entries = (self.entries.len() - names) as u16;
    }

    fn build(&self, virtual_address: u32) -> Vec<u8> {
        let mut tables_offset = 0;
        let mut strings_offset = 0;
        let mut descriptions_offset = 0;
        let mut data_offset = 0;
        let (mut tables_data, mut strings_data, mut descriptions_data, data_data) = self
            .build_table(
                virtual_address,
                &mut tables_offset,
                &mut strings_offset,
                &mut descriptions_offset,
                &mut data_offset,
            );
        // keep the data descriptions and the data itself 8 byte aligned
        let strings_offset = aligned_to(strings_offset, 8);
        strings_data.resize(strings_offset as usize, 0);

        let mut data = Vec::with_capacity(self.size() as usize);
        data.extend(tables_data.iter_mut().flat_map(|data| match data {
            TableData::Table(table) => table.as_bytes(),
            TableData::Entry(entry) => {
                if entry.data_entry_or_subdirectory_offset & 0x80000000 == 0 {
                    entry.data_entry_or_subdirectory_offset += tables_offset + strings_offset;
                }
                if entry.name_offset_or_integer_id & 0x80000000 != 0 {
                    entry.name_offset_or_integer_id += tables_offset;
                }
                entry.as_bytes()
            }
        }));
        data.extend(strings_data.iter());
        data.extend(descriptions_data.iter_mut().flat_map(|data| {
            data.data_rva += tables_offset + strings_offset + descriptions_offset;
            data.as_bytes()
        }));
        data.extend(data_data);

        data
    }

    fn build_table(
        &self, virtual_address: u32, tables_offset: &mut u32, strings_offset: &mut u32,
        descriptions_offset: &mut u32, data_offset: &mut u32,
    ) -> (Vec<TableData>, Vec<u8>, Vec<ResourceDataEntry>, Vec<u8>) {
        let mut tables_data = Vec::<TableData>::new();
        let mut strings_data = Vec::<u8>::new();
        let mut descriptions_data = Vec::<ResourceDataEntry>::new();
        let mut data_data = Vec::<u8>::new();

        tables_data.push(TableData::Table(self.data));
        *tables_offset += 16;

        let mut next_table_offset = 0u32;
        let mut next_table_sizes = 0u32;
        for (name, entry) in &self.entries {
            strings_data.extend(name.string_data());
            let name_offset_or_integer_id = match name {
                ResourceName::ID(id) => *id,
                ResourceName::Name(_) => *strings_offset | 0x80000000,
            };
            *strings_offset += name.string_size();

            match entry {
                ResourceNode::Table(table) => {
                    let entry_data = ResourceDirectoryEntry {
                        name_offset_or_integer_id,
                        data_entry_or_subdirectory_offset: (*tables_offset
                            + self.entries.len() as u32 * 8
                            + next_table_sizes)
                            | 0x80000000,
                    };
                    tables_data.push(TableData::Entry(entry_data));
                    next_table_offset += 8;
                    next_table_sizes += table.tables_size();
                }
                ResourceNode::Data(data) => {
                    let entry_data = ResourceDirectoryEntry {
                        name_offset_or_integer_id,
                        data_entry_or_subdirectory_offset: *descriptions_offset,
                    };
                    tables_data.push(TableData::Entry(entry_data));
                    next_table_offset += 8;

                    let padded_size = aligned_to(data.data.len() as u32, 8);
                    data_data.extend(data.data.iter());
                    data_data.resize(data_data.len() + (padded_size as usize - data.data.len()), 0);
                    let description_data = ResourceDataEntry {
                        data_rva: *data_offset + virtual_address,
                        size:     data.data.len() as u32,
                        codepage: data.codepage,
                        reserved: data.reserved,
                    };
                    descriptions_data.push(description_data);
                    *descriptions_offset += 16;
                    *data_offset += padded_size;
                }
            }
        }
        *tables_offset += next_table_offset;

        for entry in self.entries.values() {
            if let ResourceNode::Table(table) = entry {
                let (t_tables_data, t_strings_data, t_descriptions_data, t_data_data) = table
                    .build_table(
                        virtual_address,
                        tables_offset,
                        strings_offset,
                        descriptions_offset,
                        data_offset,
                    );
                tables_data.extend(t_tables_data);
                strings_data.extend(t_strings_data);
                descriptions_data.extend(t_descriptions_data);
                data_data.extend(t_data_data);
            }
        }

        (tables_data, strings_data, descriptions_data, data_data)
    }

    /// Returns the index of the entry with the given name.
    /// Names match case-insensitively, the same way the loader looks them up.
    fn index_of(&self, name: &ResourceName) -> Option<usize> {
        self.entries.get_index_of(name).or_else(|| {
            if !name.is_name() {
                return None;
            }
            self.entries.keys().position(|other| other.directory_order(name) == Ordering::Equal)
        })
    }

    /// Get a resource entry from the table.
    pub fn get<N: Borrow<ResourceName>>(&self, name: N) -> Option<&ResourceNode> {
        let index = self.index_of(name.borrow())?;
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    /// Get a mutable resource entry from the table.
    pub fn get_mut<N: Borrow<ResourceName>>(&mut self, name: N) -> Option<&mut ResourceNode> {
        let index = self.index_of(name.borrow())?;
        self.entries.get_index_mut(index).map(|(_, entry)| entry)
    }

    /// Returns the child table with the given name, replacing a data entry of the same name or inserting an empty table if there is none.
    fn table_mut(&mut self, name: ResourceName) -> &mut ResourceTable {
        if !matches!(self.get(&name), Some(ResourceNode::Table(_))) {
            self.insert(&name, ResourceNode::Table(ResourceTable::default()));
        }
        match self.get_mut(&name) {
            Some(ResourceNode::Table(table)) => table,
            _ => unreachable!("table was inserted above"),
        }
    }

    /// Insert a resource entry into the table.
    /// If an entry with the given name already exists, it will be replaced.
    /// A name that only differs in case replaces the existing entry and takes over its spelling.
    /// # Returns
    /// The replaced entry.
    pub fn insert<N: Borrow<ResourceName>>(
        &mut self, name: N, entry: ResourceNode,
    ) -> Option<ResourceNode> {
        let name = name.borrow();
        if let Some(existing) = self.entries.get_mut(name) {
            return Some(core::mem::replace(existing, entry));
        }
        let replaced = self
            .index_of(name)
            .and_then(|index| self.entries.shift_remove_index(index))
            .map(|(_, entry)| entry);
        self.entries.insert(name.clone(), entry);
        self.entries.sort_by(|a, _, b, _| a.directory_order(b));
        self.recount();
        replaced
    }

    /// Remove a resource entry from the table.
    /// # Returns
    /// The removed entry.
    pub fn remove<N: Borrow<ResourceName>>(&mut self, name: N) -> Option<ResourceNode> {
        let index = self.index_of(name.borrow())?;
        let (_, entry) = self.entries.shift_remove_index(index)?;
        self.recount();
        Some(entry)
    }

    /// Returns the entry names in the table.
    pub fn entries(&self) -> Vec<&ResourceName> { self.entries.keys().collect() }

    /// Returns an iterator over the entries in the table.
    pub fn iter(&self) -> indexmap::map::Iter<'_, ResourceName, ResourceNode> { self.entries.iter() }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns whether the table has no entries.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Returns the complete size of the table, its resources and its children in the resource table.
    pub fn size(&self) -> u32 {
        self.tables_size()
            + aligned_to(self.strings_size(), 8)
            + self.descriptions_size()
            + self.data_size()
    }

    /// Returns the size of the table and its children in the resource table.
    pub fn tables_size(&self) -> u32 {
        self.entries.values().map(|entry| entry.table_size()).sum::<u32>() + 16
    }

    /// Returns the size of the strings in the entry and its children in the resource table.
    pub fn strings_size(&self) -> u32 {
        self.entries
            .iter()
            .map(|(name, entry)| name.string_size() + entry.strings_size())
            .sum::<u32>()
    }

    /// Returns the size of the descriptions in the tables children in the resource table.
    pub fn descriptions_size(&self) -> u32 {
        self.entries.values().map(|entry| entry.description_size()).sum::<u32>()
    }

    /// Returns the size of the data in in the tables children in the resource table, including alignment padding.
    pub fn data_size(&self) -> u32 {
        self.entries.values().map(|entry| entry.data_size()).sum::<u32>()
    }
}

/// Raw resource data.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceData {
    data:     DebugIgnore<Vec<u8>>,
    codepage: u32,
    reserved: u32,
}
impl ResourceData {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Returns the raw data.
    pub fn data(&self) -> &[u8] { &self.data }

    /// Returns the codepage of the data.
    pub fn codepage(&self) -> u32 { self.codepage }

    /// Set the raw data.
    pub fn set_data(&mut self, data: Vec<u8>) { self.data = data.into(); }
}

/// Resource entry in a resource table.
/// This can be either a child table or raw data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResourceNode {
    Table(ResourceTable),
    Data(ResourceData),
}
impl ResourceNode {
    pub fn as_table(&self) -> Option<&ResourceTable> {
        match self {
            ResourceNode::Table(table) => Some(table),
            ResourceNode::Data(_) => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut ResourceTable> {
        match self {
            ResourceNode::Table(table) => Some(table),
            ResourceNode::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&ResourceData> {
        match self {
            ResourceNode::Table(_) => None,
            ResourceNode::Data(data) => Some(data),
        }
    }

    /// Returns the size of the table entry and its children in the resource table.
    pub fn table_size(&self) -> u32 {
        match self {
            // entry + sub-table
            ResourceNode::Table(table) => table.tables_size() + 8,
            // entry
            ResourceNode::Data(_) => 8,
        }
    }

    /// Returns the size of the strings in the entry and its children in the resource table.
    /// This is the size of the resource names of child tables.
    pub fn strings_size(&self) -> u32 {
        match self {
            ResourceNode::Table(table) => table.strings_size(),
            ResourceNode::Data(_) => 0,
        }
    }

    /// Returns the size of the descriptions in the entry and its children in the resource table.
    pub fn description_size(&self) -> u32 {
        match self {
            ResourceNode::Table(table) => table.descriptions_size(),
            ResourceNode::Data(_) => 16,
        }
    }

    /// Returns the size of the data in the entry and its children in the resource table.
    pub fn data_size(&self) -> u32 {
        match self {
            ResourceNode::Table(table) => table.data_size(),
            ResourceNode::Data(data) => aligned_to(data.data.len() as u32, 8),
        }
    }
}

/// Resource directory entry name.
/// This can either be a raw id or a name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ResourceName {
    // raw id
    ID(u32),
    // 2 byte length in utf-16 units + utf-16le data
    Name(Vec<u8>),
}
impl ResourceName {
    fn parse(image: &[u8], offset: u32, id: u32) -> Result<Self, ReadError> {
        if id & 0x80000000 != 0 {
            trace!("reading resource name {:#x?}", id);
            let address = offset as u64 + (id ^ 0x80000000) as u64;
            let length = read_at::<u16, _>(image, address)? as usize;
            trace!("resource name length: {}", length);
            // size is in 16 bit characters so it needs to be doubled
            let data = slice_at(image, address, 2 + length * 2)?;
            trace!("resource name: {:x?}", data);
            Ok(Self::Name(data.to_vec()))
        } else {
            trace!("reading resource id {:#x?}", id);
            Ok(Self::ID(id))
        }
    }

    pub fn from_string<S: AsRef<str>>(string: S) -> Self {
        let units = string.as_ref().encode_utf16().collect::<Vec<_>>();
        let mut data = Vec::with_capacity(units.len() * 2 + 2);
        data.extend_from_slice(&(units.len() as u16).to_le_bytes());
        data.extend(units.iter().flat_map(|c| c.to_le_bytes()));
        Self::Name(data)
    }

    /// Returns the name as a string, or `None` for ids.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::ID(_) => None,
            Self::Name(_) => Some(char::decode_utf16(self.units()).map(|c| c.unwrap_or('\u{fffd}')).collect()),
        }
    }

    /// Returns the id, or `None` for names.
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::ID(id) => Some(*id),
            Self::Name(_) => None,
        }
    }

    pub fn is_name(&self) -> bool { matches!(self, Self::Name(_)) }

    fn units(&self) -> impl Iterator<Item = u16> + '_ {
        let data = match self {
            Self::ID(_) => &[][..],
            Self::Name(data) => data.get(2..).unwrap_or_default(),
        };
        data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))
    }

    /// Order of entries within a resource table: names sorted case-insensitively before ids in ascending order.
    pub fn directory_order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::ID(a), Self::ID(b)) => a.cmp(b),
            (Self::Name(_), Self::ID(_)) => Ordering::Less,
            (Self::ID(_), Self::Name(_)) => Ordering::Greater,
            (Self::Name(_), Self::Name(_)) => {
                let upper = |c: u16| if (b'a' as u16..=b'z' as u16).contains(&c) { c - 0x20 } else { c };
                self.units().map(upper).cmp(other.units().map(upper))
            }
        }
    }

    fn string_size(&self) -> u32 {
        match self {
            Self::ID(_) => 0,
            Self::Name(name) => name.len() as u32,
        }
    }

    fn string_data(&self) -> &[u8] {
        match self {
            Self::ID(_) => &[],
            Self::Name(data) => data.as_slice(),
        }
    }
}
impl From<u16> for ResourceName {
    fn from(id: u16) -> Self { Self::ID(id as u32) }
}
impl From<u32> for ResourceName {
    fn from(id: u32) -> Self { Self::ID(id) }
}
impl From<&str> for ResourceName {
    fn from(name: &str) -> Self { Self::from_string(name) }
}
impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ID(id) => write!(f, "#{}", id),
            Self::Name(_) => {
                for c in char::decode_utf16(self.units()) {
                    fmt::Write::write_char(f, c.unwrap_or('\u{fffd}'))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::constants::*;

    fn key(kind: ResourceType, name: u16, language: u16) -> ResourceKey {
        ResourceKey::new(kind, name, language)
    }

    #[test]
    fn insert_and_remove_prunes_tables() {
        let mut directory = ResourceDirectory::default();
        let icon = key(ResourceType::Icon, 1, LANGUAGE_NEUTRAL);
        let icon_us = key(ResourceType::Icon, 1, LANGUAGE_ID_EN_US);

        assert!(directory.insert(&icon, vec![1, 2, 3]).is_none());
        assert!(directory.insert(&icon_us, vec![4, 5]).is_none());
        assert_eq!(directory.insert(&icon, vec![6]).unwrap().data(), &[1, 2, 3]);
        assert_eq!(directory.get(&icon).unwrap().data(), &[6]);

        assert_eq!(directory.remove(&icon).unwrap().data(), &[6]);
        assert!(directory.get(&icon).is_none());
        assert!(directory.type_table(&ResourceType::Icon).is_some());

        assert!(directory.remove(&icon_us).is_some());
        assert!(directory.type_table(&ResourceType::Icon).is_none());
        assert!(directory.root().is_empty());
        assert!(directory.remove(&icon_us).is_none());
    }

    #[test]
    fn entries_are_kept_in_directory_order() {
        let mut table = ResourceTable::default();
        for name in [
            ResourceName::ID(14),
            ResourceName::from_string("zeta"),
            ResourceName::ID(3),
            ResourceName::from_string("MUI"),
            ResourceName::from_string("Alpha"),
        ] {
            table.insert(name, ResourceNode::Data(ResourceData::default()));
        }
        let names = table.entries().iter().map(|name| name.to_string()).collect::<Vec<_>>();
        assert_eq!(names, ["Alpha", "MUI", "zeta", "#3", "#14"]);
    }

    #[test]
    fn build_and_parse_directory() {
        let mut directory = ResourceDirectory::default();
        directory.insert(&key(ResourceType::Icon, 1, LANGUAGE_ID_EN_US), vec![0xaa; 37]);
        directory.insert(&key(ResourceType::Icon, 2, LANGUAGE_NEUTRAL), vec![0xbb; 8]);
        directory.insert(
            &ResourceKey::new(ResourceType::IconGroup, "MAINICON", LANGUAGE_ID_EN_US),
            vec![0xcc; 20],
        );
        directory.insert(&ResourceKey::new(ResourceType::Mui, 1u16, LANGUAGE_ID_EN_GB), vec![0xdd; 3]);

        let virtual_address = 0x3000;
        let data = directory.build(virtual_address);
        assert_eq!(data.len(), directory.size() as usize, "built resource size equals computed size");

        let parsed = ResourceDirectory::parse(&data, 0, virtual_address).unwrap();
        assert_eq!(parsed.root(), directory.root(), "parsed and built directories equal");
        assert_eq!(
            parsed
                .get(&ResourceKey::new(ResourceType::IconGroup, "MAINICON", LANGUAGE_ID_EN_US))
                .unwrap()
                .data(),
            &[0xcc; 20]
        );
    }

    #[test]
    fn parse_rejects_truncated_directory() {
        let mut directory = ResourceDirectory::default();
        directory.insert(&key(ResourceType::RCDATA, 7, LANGUAGE_ID_EN_US), vec![1; 16]);
        let data = directory.build(0x1000);
        assert!(ResourceDirectory::parse(&data[..20], 0, 0x1000).is_err());
    }

    #[test]
    fn insert_replaces_name_differing_in_case() {
        let mut table = ResourceTable::default();
        table.insert(ResourceName::from_string("mainicon"), ResourceNode::Data(ResourceData::new(vec![1])));
        table.insert(ResourceName::ID(1), ResourceNode::Data(ResourceData::new(vec![2])));

        let replaced =
            table.insert(ResourceName::from_string("MAINICON"), ResourceNode::Data(ResourceData::new(vec![3])));
        assert_eq!(replaced.and_then(|entry| entry.as_data().map(|data| data.data().to_vec())), Some(vec![1]));
        assert_eq!(table.len(), 2);
        let named = table.data.number_of_name_entries;
        assert_eq!(named, 1);
        let names = table.entries().iter().map(|name| name.to_string()).collect::<Vec<_>>();
        assert_eq!(names, ["MAINICON", "#1"]);

        let entry = table.get(ResourceName::from_string("MainIcon")).and_then(ResourceNode::as_data);
        assert_eq!(entry.map(ResourceData::data), Some(&[3u8][..]));
        assert!(table.remove(ResourceName::from_string("mainICON")).is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn named_keys_match_case_insensitively() {
        let mut directory = ResourceDirectory::default();
        let upper = ResourceKey::new(ResourceType::IconGroup, "MAINICON", LANGUAGE_ID_EN_US);
        let lower = ResourceKey::new(ResourceType::IconGroup, "mainicon", LANGUAGE_ID_EN_US);
        let other_language = ResourceKey::new(ResourceType::IconGroup, "MainIcon", LANGUAGE_NEUTRAL);

        directory.insert(&upper, vec![1]);
        assert_eq!(directory.insert(&lower, vec![2]).map(|data| data.data().to_vec()), Some(vec![1]));
        directory.insert(&other_language, vec![3]);

        let names = directory.type_table(&ResourceType::IconGroup).unwrap();
        assert_eq!(names.len(), 1, "one name table for all spellings");
        assert_eq!(directory.get(&upper).unwrap().data(), &[2]);
        assert_eq!(directory.get(&other_language).unwrap().data(), &[3]);

        assert!(directory.remove(&upper).is_some());
        assert!(directory.remove(&other_language).is_some());
        assert!(directory.root().is_empty());
    }

    #[test]
    fn parse_skips_data_outside_image() {
        let mut directory = ResourceDirectory::default();
        let payload = key(ResourceType::RCDATA, 1, LANGUAGE_ID_EN_US);
        directory.insert(&payload, vec![1; 16]);
        let virtual_address = 0x2000_0000;
        let mut data = directory.build(virtual_address);

        // point the single data description far below the directory with the largest size
        let description =
            directory.root().tables_size() as usize + aligned_to(directory.root().strings_size(), 8) as usize;
        data[description..description + 4].copy_from_slice(&0u32.to_le_bytes());
        data[description + 4..description + 8].copy_from_slice(&u32::MAX.to_le_bytes());

        let parsed = ResourceDirectory::parse(&data, 0, virtual_address).unwrap();
        assert!(parsed.get(&payload).is_none());

        // and just past the end of the image
        let end = data.len() as u32;
        data[description..description + 4].copy_from_slice(&(virtual_address + end - 8).to_le_bytes());
        data[description + 4..description + 8].copy_from_slice(&16u32.to_le_bytes());
        let parsed = ResourceDirectory::parse(&data, 0, virtual_address).unwrap();
        assert!(parsed.get(&payload).is_none());
    }

    #[test]
    fn convert_resource_name_string() {
        let name = ResourceName::from_string("MAINICON");
        assert_eq!(name.as_string(), Some("MAINICON".to_string()));
        assert_eq!(name.to_string(), "MAINICON");
        assert_eq!(ResourceName::ID(5).as_string(), None);
        assert_eq!(ResourceName::ID(5).to_string(), "#5");
    }
}
