#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Once,
};

use pegraft::*;

static INIT_LOGGER: Once = Once::new();
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .format_timestamp(None)
            .format_module_path(false)
            .format_level(true)
            .format_target(false)
            .write_style(env_logger::WriteStyle::Auto)
            .init();
    });
}

/// Byte that fills the code section of the generated images.
pub const CODE_FILL: u8 = 0xc3;
/// Base of data field of generated PE32 images.
pub const BASE_OF_DATA: u32 = 0x3000;

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Minimal image with a single code section and no resources.
///
/// The headers occupy the first 0x400 bytes, the code section the following 0x200 bytes.
pub fn image(pe64: bool) -> Vec<u8> {
    let mut data = vec![0u8; 0x600];

    // dos header
    data[0..2].copy_from_slice(b"MZ");
    put_u32(&mut data, 0x3c, 0x40);
    data[0x40..0x44].copy_from_slice(b"PE\0\0");

    // coff header
    put_u16(&mut data, 0x44, if pe64 { 0x8664 } else { 0x14c });
    put_u16(&mut data, 0x46, 1);
    put_u16(&mut data, 0x54, if pe64 { 240 } else { 224 });
    put_u16(&mut data, 0x56, 0x22);

    // standard header
    put_u16(&mut data, 0x58, if pe64 { 0x20b } else { 0x10b });
    put_u32(&mut data, 0x5c, 0x200);
    put_u32(&mut data, 0x68, 0x1000);
    put_u32(&mut data, 0x6c, 0x1000);

    // windows header, identical offsets for both formats up to the stack sizes
    if pe64 {
        put_u64(&mut data, 0x70, 0x1_4000_0000);
    } else {
        put_u32(&mut data, 0x70, BASE_OF_DATA);
        put_u32(&mut data, 0x74, 0x40_0000);
    }
    put_u32(&mut data, 0x78, 0x1000);
    put_u32(&mut data, 0x7c, 0x200);
    put_u16(&mut data, 0x80, 6);
    put_u16(&mut data, 0x88, 6);
    put_u32(&mut data, 0x90, 0x2000);
    put_u32(&mut data, 0x94, 0x400);
    put_u16(&mut data, 0x9c, 2);
    let (section_table_offset, directories_offset) = if pe64 {
        put_u64(&mut data, 0xa0, 0x10_0000);
        put_u64(&mut data, 0xa8, 0x1000);
        put_u64(&mut data, 0xb0, 0x10_0000);
        put_u64(&mut data, 0xb8, 0x1000);
        put_u32(&mut data, 0xc4, 16);
        (0x148, 0xc8)
    } else {
        put_u32(&mut data, 0xa0, 0x10_0000);
        put_u32(&mut data, 0xa4, 0x1000);
        put_u32(&mut data, 0xa8, 0x10_0000);
        put_u32(&mut data, 0xac, 0x1000);
        put_u32(&mut data, 0xb4, 16);
        (0x138, 0xb8)
    };
    assert_eq!(directories_offset + 16 * 8, section_table_offset);

    // code section
    let section = section_table_offset;
    data[section..section + 8].copy_from_slice(b".text\0\0\0");
    put_u32(&mut data, section + 8, 0x200);
    put_u32(&mut data, section + 12, 0x1000);
    put_u32(&mut data, section + 16, 0x200);
    put_u32(&mut data, section + 20, 0x400);
    put_u32(&mut data, section + 36, 0x6000_0020);
    data[0x400..0x600].fill(CODE_FILL);

    data
}

/// Shorthand for a resource key with a numeric name.
pub fn key(kind: ResourceType, id: u16, language: u16) -> ResourceKey { ResourceKey::new(kind, id, language) }

/// Write a PE32+ container holding the resources to the directory.
pub fn container(directory: &Path, name: &str, resources: &[(ResourceKey, Vec<u8>)]) -> PathBuf {
    container_with(directory, name, true, resources)
}

pub fn container_with(
    directory: &Path, name: &str, pe64: bool, resources: &[(ResourceKey, Vec<u8>)],
) -> PathBuf {
    let path = directory.join(name);
    let data = image(pe64);
    if resources.is_empty() {
        std::fs::write(&path, &data).unwrap();
        return path;
    }

    let mut image = Image::parse(&data[..]).unwrap();
    let mut resource_directory = ResourceDirectory::default();
    for (key, data) in resources {
        resource_directory.insert(key, data.clone());
    }
    image.set_resource_directory(resource_directory).unwrap();
    std::fs::write(&path, image.data()).unwrap();
    path
}

/// Read all resources of the type from the container.
pub fn resources(path: &Path, kind: ResourceType) -> HashMap<ResourceKey, Vec<u8>> {
    let view = open_read(path).unwrap();
    let resources = view
        .entries(kind)
        .map(|entry| (entry.key().clone(), entry.data().to_vec()))
        .collect();
    view.close();
    resources
}

/// Returns the languages stored for the type in the container, sorted.
pub fn languages(path: &Path, kind: ResourceType) -> Vec<u16> {
    let mut languages = resources(path, kind).into_keys().map(|key| key.language).collect::<Vec<_>>();
    languages.sort_unstable();
    languages
}
