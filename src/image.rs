//! Portable executable image representation.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format> for more information.

use alloc::{borrow::Cow, string::ToString, vec::Vec};

use ahash::RandomState;
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use zerocopy::IntoBytes;

use crate::{constants::*, errors::*, resource::*, types::*, util::*};

/// Image data directory type enumeration.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DataDirectoryType {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TLSTable,
    LoadConfigTable,
    BoundImport,
    IAT,
    DelayImportDescriptor,
    CLRRuntimeHeader,
    Reserved,
}
impl DataDirectoryType {
    const ALL: [DataDirectoryType; IMAGE_NUMBEROF_DIRECTORY_ENTRIES] = {
        use DataDirectoryType::*;
        [
            ExportTable,
            ImportTable,
            ResourceTable,
            ExceptionTable,
            CertificateTable,
            BaseRelocationTable,
            Debug,
            Architecture,
            GlobalPtr,
            TLSTable,
            LoadConfigTable,
            BoundImport,
            IAT,
            DelayImportDescriptor,
            CLRRuntimeHeader,
            Reserved,
        ]
    };
}

/// Portable executable image representation.
///
/// Only the headers needed to locate and relocate the resource directory are parsed.
/// Everything else is carried through as raw bytes.
#[derive(Debug, Clone)]
pub struct Image<'a> {
    pub(crate) image: Cow<'a, [u8]>,

    pub(crate) coff_header:           CoffHeader,
    pub(crate) standard_header:       StandardHeader,
    pub(crate) windows_header:        GenericWindowsHeader,
    pub(crate) header_data_directory: IndexMap<DataDirectoryType, ImageDataDirectory, RandomState>,
    pub(crate) section_table:         Vec<SectionHeader>,

    pub(crate) resource_directory: Option<ResourceDirectory>,

    coff_header_offset:    u64,
    windows_header_offset: u64,
    directories_offset:    u64,
}

impl PartialEq for Image<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.coff_header == other.coff_header
            && self.standard_header == other.standard_header
            && self.windows_header == other.windows_header
            && self.header_data_directory == other.header_data_directory
            && self.section_table == other.section_table
            && self.resource_directory == other.resource_directory
    }
}
impl Eq for Image<'_> {}

impl<'a> Image<'a> {
    /// Parse a portable executable image from a byte slice.
    ///
    /// # Returns
    /// Returns the `Image`, or an error if the byte slice is not a valid portable executable image or is missing required headers.
    /// Truncated or malformed input results in an error, never in a panic.
    pub fn parse<R: Into<Cow<'a, [u8]>>>(image: R) -> Result<Self, ImageReadError> {
        let image = image.into();

        let pe_dos_magic = read_at::<u16, _>(&image, 0u64)?;
        debug!("pe_dos_magic: {:#x?}", pe_dos_magic);
        if pe_dos_magic != PE_DOS_MAGIC {
            return Err(ImageReadError::InvalidHeader("no dos magic".into()));
        }

        let pe_signature_offset = read_at::<u32, _>(&image, PE_PTR_OFFSET)?;
        debug!("pe_signature_offset: {:#x?}", pe_signature_offset);

        let pe_signature = read_at::<u32, _>(&image, pe_signature_offset)?;
        debug!("pe_signature: {:#x?}", pe_signature);
        if pe_signature != PE_NT_SIGNATURE {
            return Err(ImageReadError::InvalidHeader("no pe signature".into()));
        }

        let coff_header_offset = pe_signature_offset as u64 + 4;
        let coff_header = read_at::<CoffHeader, _>(&image, coff_header_offset)?;
        debug!("{:#x?}: {:#x?}", coff_header_offset, coff_header);
        if coff_header.size_of_optional_header < 24 {
            return Err(ImageReadError::InvalidHeader("optional header too small".into()));
        }

        let standard_header_offset = coff_header_offset + 20;
        let standard_header = read_at::<StandardHeader, _>(&image, standard_header_offset)?;
        debug!("{:#x?}: {:#x?}", standard_header_offset, standard_header);

        // pe32 images carry an additional base of data field before the windows header
        let (windows_header_offset, windows_header, optional_header_dd_offset) = {
            if standard_header.magic == PE_32_MAGIC && coff_header.size_of_optional_header >= 96 {
                let windows_header_offset = standard_header_offset + 28;
                let windows_header =
                    read_at::<WindowsHeader<u32>, _>(&image, windows_header_offset)?;
                (
                    windows_header_offset,
                    GenericWindowsHeader::WindowsHeader32(windows_header),
                    standard_header_offset + 96,
                )
            } else if standard_header.magic == PE_64_MAGIC
                && coff_header.size_of_optional_header >= 112
            {
                let windows_header_offset = standard_header_offset + 24;
                let windows_header =
                    read_at::<WindowsHeader<u64>, _>(&image, windows_header_offset)?;
                (
                    windows_header_offset,
                    GenericWindowsHeader::WindowsHeader64(windows_header),
                    standard_header_offset + 112,
                )
            } else {
                return Err(ImageReadError::InvalidHeader("invalid optional header".into()));
            }
        };
        debug!("{:#x?}: {:#x?}", windows_header_offset, windows_header);

        if image.len() as u64 <= optional_header_dd_offset {
            return Err(ImageReadError::InvalidHeader(
                "image truncated after optional header".into(),
            ));
        }

        let mut header_data_directory =
            IndexMap::<DataDirectoryType, ImageDataDirectory, _>::with_hasher(RandomState::new());
        let number_of_rva_and_sizes = windows_header.number_of_rva_and_sizes() as usize;
        for (index, &header) in DataDirectoryType::ALL.iter().enumerate() {
            if index < number_of_rva_and_sizes {
                let offset = optional_header_dd_offset + (index * 8) as u64;
                let data = read_at::<ImageDataDirectory, _>(&image, offset)?;
                header_data_directory.insert(header, data);
                debug!("{:#x?}: {:?}: {:#x?}", offset, header, data);
            }
        }

        let section_table_offset =
            standard_header_offset + coff_header.size_of_optional_header as u64;
        let mut section_table = Vec::with_capacity(coff_header.number_of_sections as usize);
        for index in 0..coff_header.number_of_sections as u64 {
            let offset = section_table_offset + index * 40;
            let section_header = read_at::<SectionHeader, _>(&image, offset)?;
            debug!(
                "{:#x?}: {}: {:#x?}",
                offset,
                section_header.name().unwrap_or("?".to_string()),
                section_header
            );
            section_table.push(section_header);
        }

        let directories_offset =
            section_table_offset + coff_header.number_of_sections as u64 * 40;

        let mut resource_directory = None;
        if let Some(resource_data) = header_data_directory.get(&DataDirectoryType::ResourceTable) {
            if resource_data.virtual_address > 0 && resource_data.size > 0 {
                let virtual_address = resource_data.virtual_address;
                let section = section_table.iter().find(|section| section.contains(virtual_address));
                if let Some(section) = section {
                    debug!(
                        "found resource directory in {} section: {:#x?}",
                        section.name().unwrap_or("?".to_string()),
                        section
                    );
                    let base_address = section.pointer_to_raw_data as u64
                        + (virtual_address - section.virtual_address) as u64;
                    let base_address = u32::try_from(base_address).map_err(|_| {
                        ImageReadError::InvalidHeader("resource directory offset overflows".into())
                    })?;
                    resource_directory =
                        Some(ResourceDirectory::parse(&image, base_address, virtual_address)?);
                } else {
                    warn!(
                        "resource directory at {:#x?} is not contained in any section",
                        virtual_address
                    );
                }
            }
        }

        Ok(Self {
            image,
            coff_header,
            standard_header,
            windows_header,
            header_data_directory,
            section_table,
            resource_directory,
            coff_header_offset,
            windows_header_offset,
            directories_offset,
        })
    }

    #[cfg(feature = "std")]
    /// Parse a portable executable image from a file.
    ///
    /// # Returns
    /// Returns the `Image`, or an error if the file could not be read, is not a valid portable executable image or is missing required headers.
    pub fn parse_file<P: AsRef<std::path::Path>>(path: P) -> Result<Image<'static>, ImageReadError> {
        let data = std::fs::read(path)?;
        Image::parse(data)
    }

    /// Set the resource directory of the image.
    ///
    /// This will update the resource data directory and the resource section.
    /// The section containing the existing resource directory is rewritten in place if it is not used by other data directories and either:
    /// - the new directory fits into the section, or
    /// - the section is the last section both in the file and in memory, in which case it is resized.
    ///
    /// Otherwise, the existing section is kept intact and a new section is added after all other sections and before any trailing data at the end of the image.
    ///
    /// # Returns
    /// Returns the previous resource directory, or an error in the following cases:
    /// - Returns an error if there is not enough space in the image header to add a new section.
    /// - Returns an error if a section points to data outside the image.
    pub fn set_resource_directory(
        &mut self, resource_directory: ResourceDirectory,
    ) -> Result<Option<ResourceDirectory>, ImageWriteError> {
        // copy to-be-modified data to allow erroring out without invalidating the image
        let mut coff_header = self.coff_header;
        let mut windows_header = self.windows_header;
        let mut header_data_directory = self.header_data_directory.clone();
        let mut section_table = self.section_table.clone();

        let file_alignment = windows_header.file_alignment().max(1);
        let section_alignment = windows_header.section_alignment().max(1);

        let mut required_header_space = 0u64;

        // ensure that the data directory entry for the resource table exists
        for (index, &header) in DataDirectoryType::ALL[..3].iter().enumerate() {
            if index + 1 > header_data_directory.len() {
                debug!("adding missing header data directory: {:?}", header);
                header_data_directory.insert(header, ImageDataDirectory::default());
                coff_header.size_of_optional_header += 8;
                required_header_space += 8;
            }
        }
        let old_resource_data_directory =
            header_data_directory.get(&DataDirectoryType::ResourceTable).copied().unwrap_or_default();

        let new_resource_directory_size = resource_directory.size();
        debug!("new resource data size: {:#x?}", new_resource_directory_size);

        let first_section_start = section_table
            .iter()
            .filter(|section| section.size_of_raw_data > 0)
            .map(|section| section.pointer_to_raw_data as usize)
            .min()
            .unwrap_or(self.image.len());
        let last_section_end = section_table
            .iter()
            .filter(|section| section.size_of_raw_data > 0)
            .map(|section| section.raw_end() as usize)
            .max()
            .unwrap_or(self.image.len());
        if last_section_end > self.image.len() {
            return Err(ImageWriteError::InvalidSectionRange(
                last_section_end as u64,
                self.image.len() as u64,
            ));
        }
        let last_virtual_end = max_virtual_end(&section_table, section_alignment)?;

        // file range of the existing resource section and its replacement data
        let mut replaced_section = None;
        if old_resource_data_directory.size > 0 {
            debug!(
                "resource directory exists in the data directory table (size: {:#x?})",
                old_resource_data_directory.size
            );
            let index = section_table
                .iter()
                .position(|section| section.contains(old_resource_data_directory.virtual_address));
            if let Some(index) = index {
                let section = section_table[index];
                debug!(
                    "found existing resource directory in {} section: {:#x?}",
                    section.name().unwrap_or("?".to_string()),
                    section
                );
                let shared = header_data_directory.iter().any(|(header, directory)| {
                    header != &DataDirectoryType::ResourceTable
                        && directory.size > 0
                        && section.contains(directory.virtual_address)
                });
                let is_last_section = section.size_of_raw_data > 0
                    && section.raw_end() as usize == last_section_end
                    && last_virtual_end == section.virtual_end(section_alignment);
                let fits = section.size_of_raw_data >= new_resource_directory_size
                    && aligned_to(section.virtual_size as u64, section_alignment as u64)
                        >= new_resource_directory_size as u64;

                if shared {
                    info!("resource section also used by other data directories, keeping section intact");
                    warn!("resource section used by multiple data directories can indicate a packed executable");
                } else if fits || is_last_section {
                    let start = section.pointer_to_raw_data as usize;
                    let end = section.raw_end() as usize;
                    let mut section_data = resource_directory.build(section.virtual_address);

                    let section = &mut section_table[index];
                    if is_last_section {
                        debug!("resource section is the last section, resizing section");
                        let size_of_raw_data = aligned_to(new_resource_directory_size, file_alignment);
                        section_data.resize(size_of_raw_data as usize, 0);
                        section.size_of_raw_data = size_of_raw_data;
                        section.virtual_size = new_resource_directory_size;
                    } else {
                        debug!("resource section is large enough, padding section with existing data");
                        section_data.extend_from_slice(&self.image[start + section_data.len()..end]);
                        section.virtual_size = section.virtual_size.max(new_resource_directory_size);
                    }

                    if let Some(resource_dd) = header_data_directory.get_mut(&DataDirectoryType::ResourceTable) {
                        resource_dd.virtual_address = section.virtual_address;
                        resource_dd.size = new_resource_directory_size;
                    }
                    replaced_section = Some((start, end, section_data));
                } else {
                    debug!(
                        "existing resource section size is too small and followed by other sections ({:#x?} < {:#x?})",
                        section.size_of_raw_data, new_resource_directory_size
                    );
                }
            }
        }

        let mut new_section_data = Vec::new();
        let mut new_section_offset = last_section_end;
        if replaced_section.is_none() {
            debug!("adding new resource section");
            let virtual_end = last_virtual_end.unwrap_or(0) as u64;
            let virtual_address = u32::try_from(aligned_to(virtual_end, section_alignment as u64))
                .ok()
                .filter(|address| address.checked_add(new_resource_directory_size).is_some())
                .ok_or(ImageWriteError::InvalidSectionRange(virtual_end, u32::MAX as u64))?
                .max(section_alignment);
            new_section_offset = aligned_to(last_section_end, file_alignment as usize);

            new_section_data = resource_directory.build(virtual_address);
            let size_of_raw_data = aligned_to(new_resource_directory_size, file_alignment);
            new_section_data.resize(size_of_raw_data as usize, 0);

            if let Some(resource_dd) = header_data_directory.get_mut(&DataDirectoryType::ResourceTable) {
                resource_dd.virtual_address = virtual_address;
                resource_dd.size = new_resource_directory_size;
            }
            section_table.push(SectionHeader {
                name: u64::from_le_bytes(*b".rsrc\0\0\0"),
                virtual_size: new_resource_directory_size,
                virtual_address,
                size_of_raw_data,
                pointer_to_raw_data: new_section_offset as u32,
                characteristics: IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ,
                ..SectionHeader::default()
            });
            coff_header.number_of_sections += 1;
            required_header_space += 40;
        }

        debug!("directories offset: {:#x?}", self.directories_offset);
        debug!("first section start: {:#x?}", first_section_start);
        let available_space = (first_section_start as u64).saturating_sub(self.directories_offset);
        debug!("available header space: {:#x?}", available_space);
        debug!("required additional header space: {:#x?}", required_header_space);
        if required_header_space > available_space {
            error!(
                "not enough space in header to add new section ({} > {})",
                required_header_space, available_space
            );
            return Err(ImageWriteError::NotEnoughSpaceInHeader);
        }

        let size_of_image = max_virtual_end(&section_table, section_alignment)?
            .unwrap_or(windows_header.size_of_image());
        windows_header.set_layout(header_data_directory.len() as u32, size_of_image);

        let mut new_image = Vec::with_capacity(self.image.len() + new_section_data.len());
        new_image.extend_from_slice(&self.image[..self.coff_header_offset as usize]);
        new_image.extend_from_slice(coff_header.as_bytes());
        new_image.extend_from_slice(self.standard_header.as_bytes());
        new_image.extend_from_slice(
            &self.image[(self.coff_header_offset + 20 + 24) as usize
                ..self.windows_header_offset as usize],
        );
        new_image.extend_from_slice(windows_header.as_bytes());
        for data in header_data_directory.values() {
            new_image.extend_from_slice(data.as_bytes());
        }
        for section_header in section_table.iter() {
            new_image.extend_from_slice(section_header.as_bytes());
        }
        new_image.extend_from_slice(
            &self.image
                [(self.directories_offset + required_header_space) as usize..first_section_start],
        );

        if let Some((start, end, section_data)) = replaced_section {
            // the existing resource section is rewritten, copy the data of the sections around it
            new_image.extend_from_slice(&self.image[first_section_start..start]);
            new_image.extend_from_slice(&section_data);
            new_image.extend_from_slice(&self.image[end..last_section_end]);
        } else {
            new_image.extend_from_slice(&self.image[first_section_start..last_section_end]);
            new_image.resize(new_image.len() + (new_section_offset - last_section_end), 0);
            new_image.extend_from_slice(&new_section_data);
        }
        new_image.extend_from_slice(&self.image[last_section_end..]);

        self.coff_header = coff_header;
        self.windows_header = windows_header;
        self.header_data_directory = header_data_directory;
        self.section_table = section_table;
        self.directories_offset += required_header_space;

        let mut resource_directory = resource_directory;
        resource_directory.virtual_address = self
            .header_data_directory
            .get(&DataDirectoryType::ResourceTable)
            .map(|directory| directory.virtual_address)
            .unwrap_or_default();
        let previous_resource_directory = self.resource_directory.replace(resource_directory);
        self.image = new_image.into();

        Ok(previous_resource_directory)
    }

    /// Returns the current resource directory or `None` if the image does not contain a resource directory.
    pub fn resource_directory(&self) -> Option<&ResourceDirectory> {
        self.resource_directory.as_ref()
    }

    /// Returns the raw image data with all changes applied.
    pub fn data(&self) -> &[u8] { &self.image }

    /// Returns the parsed coff header.
    pub fn coff_header(&self) -> &CoffHeader { &self.coff_header }

    /// Returns the parsed windows header.
    pub fn windows_header(&self) -> &GenericWindowsHeader { &self.windows_header }

    /// Returns the data directory for the requested header.
    pub fn data_directory(&self, directory: DataDirectoryType) -> Option<&ImageDataDirectory> {
        self.header_data_directory.get(&directory)
    }

    /// Returns the section header containing the data directory.
    pub fn section_header_for_data_directory(
        &self, directory: DataDirectoryType,
    ) -> Option<&SectionHeader> {
        let data_directory = self.data_directory(directory)?;
        self.section_table
            .iter()
            .find(|section| section.contains(data_directory.virtual_address))
    }

    /// Returns all section tables existing in the image.
    pub fn section_table(&self) -> &[SectionHeader] { &self.section_table }
}

/// Returns the highest aligned end of the sections in memory.
fn max_virtual_end(
    section_table: &[SectionHeader], section_alignment: u32,
) -> Result<Option<u32>, ImageWriteError> {
    let mut last = None;
    for section in section_table {
        let end = section.virtual_end(section_alignment).ok_or_else(|| {
            ImageWriteError::InvalidSectionRange(section.virtual_address as u64, u32::MAX as u64)
        })?;
        last = last.max(Some(end));
    }
    Ok(last)
}
