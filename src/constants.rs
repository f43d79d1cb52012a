//! Windows API and binary constants.

#![allow(non_upper_case_globals)]

pub type DWORD = u32;
pub type WORD = u16;
pub type LANGID = WORD;


// https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-lcid/a9eac961-e77d-41a6-90a5-ce1a8b0cdb9c
pub const LANGUAGE_NEUTRAL: LANGID = 0; // MAKELANGID(LANG_NEUTRAL, SUBLANG_NEUTRAL)
pub const LANGUAGE_ID_EN_US: LANGID = 1033; // 0x0409, en-US
pub const LANGUAGE_ID_EN_GB: LANGID = 2057; // 0x0809, en-GB


// https://docs.microsoft.com/en-us/windows/win32/debug/pe-format

pub const PE_DOS_MAGIC: WORD = 0x5a4d; // MZ
pub const PE_PTR_OFFSET: DWORD = 0x03c;
pub const PE_NT_SIGNATURE: DWORD = 0x00004550; // PE00
pub const PE_32_MAGIC: WORD = 0x010b;
pub const PE_64_MAGIC: WORD = 0x020b;

pub const IMAGE_NUMBEROF_DIRECTORY_ENTRIES: usize = 16;


// https://docs.microsoft.com/en-us/windows/win32/menurc/resource-types

pub const RT_ICON: WORD = 0x03;
pub const RT_RCDATA: WORD = 0x0A;
pub const RT_GROUP_ICON: WORD = 0x0E;
pub const RT_VERSION: WORD = 0x10;
pub const RT_MANIFEST: WORD = 0x18;

// https://learn.microsoft.com/en-us/windows/win32/api/winbase/nf-winbase-updateresourcew
// not a predefined type id, stored as a named type
pub const RT_MUI: &str = "MUI";


// https://docs.microsoft.com/en-us/windows/win32/debug/pe-format#section-flags

pub const IMAGE_SCN_CNT_INITIALIZED_DATA: DWORD = 0x00000040;
pub const IMAGE_SCN_MEM_READ: DWORD = 0x40000000;


// https://learn.microsoft.com/en-us/windows/win32/procthread/process-creation-flags

pub const DETACHED_PROCESS: DWORD = 0x00000008;
