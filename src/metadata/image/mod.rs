//! The image collaborator: a decodable binary container seen through its metadata tables.
//!
//! Byte-level decoding lives behind the [`Image`] trait. This crate never parses PE headers
//! or heaps itself; it asks an image how long a table is, positions the image's single
//! read cursor on a row and decodes the row at the cursor into a [`RawRow`].
//!
//! The cursor is shared by every lazy load of a [`crate::Module`]. Callers that move it
//! restore it afterwards (see [`crate::metadata::module::ModuleReader::frame`]), so an
//! implementation only has to make [`Image::position`] / [`Image::set_position`] exact.
//!
//! [`MemoryImage`] is an in-memory implementation used by the test suites and by callers
//! that already hold decoded rows.

mod memory;

use bitflags::bitflags;
use strum::FromRepr;

use crate::{
    metadata::{
        tables::{RawRow, TableId},
        token::Token,
    },
    Result,
};

pub use memory::{ImageProbe, MemoryImage, MemoryImageBuilder};

/// A decodable metadata image with a single read cursor.
pub trait Image: Send {
    /// Module-level information decoded from the image headers
    fn header(&self) -> &ImageHeader;

    /// Number of rows in `table`, `0` if the table is absent
    fn table_length(&self, table: TableId) -> u32;

    /// True if `table` is present and holds at least one row
    fn has_table(&self, table: TableId) -> bool {
        self.table_length(table) > 0
    }

    /// Opaque cursor position
    fn position(&self) -> u64;

    /// Move the cursor back to a position previously returned by [`Image::position`]
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `position` was never a valid position
    fn set_position(&mut self, position: u64) -> Result<()>;

    /// Place the cursor on `row` (1-based) of `table`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for row `0` or rows past the end of the table
    fn seek(&mut self, table: TableId, row: u32) -> Result<()>;

    /// Decode the row under the cursor and advance the cursor to the next row
    ///
    /// # Errors
    /// Returns an error if the cursor is not on a row or the row is corrupt
    fn read_row(&mut self) -> Result<RawRow>;

    /// Decode `row` of `table`; leaves the cursor after that row
    ///
    /// # Errors
    /// See [`Image::seek`] and [`Image::read_row`]
    fn decode_row(&mut self, table: TableId, row: u32) -> Result<RawRow> {
        self.seek(table, row)?;
        self.read_row()
    }
}

/// The kind of module, derived from the PE subsystem and the presence of an `Assembly` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModuleKind {
    /// A class library
    #[default]
    Dll,
    /// A console application
    Console,
    /// A windowed application
    Windows,
    /// A module without assembly manifest
    NetModule,
}

/// The processor architecture the image targets, by PE machine type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum TargetArchitecture {
    #[default]
    I386 = 0x014c,
    AMD64 = 0x8664,
    IA64 = 0x0200,
    ARM = 0x01c0,
    ARMv7 = 0x01c4,
    ARM64 = 0xaa64,
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    /// CLI header flags of the image
    pub struct ModuleAttributes: u32 {
        /// The image contains only IL
        const IL_ONLY = 0x0001;
        /// The image must be loaded into a 32-bit process
        const REQUIRED_32_BIT = 0x0002;
        /// The image is a pre-compiled IL library
        const IL_LIBRARY = 0x0004;
        /// The image carries a strong name signature
        const STRONG_NAME_SIGNED = 0x0008;
        /// The image prefers a 32-bit process
        const PREFERRED_32_BIT = 0x0002_0000;
    }
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    /// PE DLL characteristics of the image
    pub struct ModuleCharacteristics: u16 {
        /// 64-bit address space layout randomization
        const HIGH_ENTROPY_VA = 0x0020;
        /// Relocatable at load time
        const DYNAMIC_BASE = 0x0040;
        /// Compatible with data execution prevention
        const NX_COMPAT = 0x0100;
        /// No structured exception handling
        const NO_SEH = 0x0400;
        /// Must run inside an app container
        const APP_CONTAINER = 0x1000;
        /// Terminal server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// Module-level facts that live outside the metadata tables
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHeader {
    /// Path or file name the image was opened from, empty if unknown
    pub file_name: String,
    /// Module kind
    pub kind: ModuleKind,
    /// Runtime version string from the metadata root, e.g. `v4.0.30319`
    pub runtime_version: String,
    /// Target architecture
    pub architecture: TargetArchitecture,
    /// CLI header flags
    pub attributes: ModuleAttributes,
    /// PE DLL characteristics
    pub characteristics: ModuleCharacteristics,
    /// Entry point token from the CLI header (`MethodDef` or `File`), nil if there is none
    pub entry_point: Token,
    /// Debug directory entries of the PE image
    pub debug_header: Option<DebugHeader>,
}

impl Default for ImageHeader {
    fn default() -> Self {
        ImageHeader {
            file_name: String::new(),
            kind: ModuleKind::Dll,
            runtime_version: "v4.0.30319".to_string(),
            architecture: TargetArchitecture::I386,
            attributes: ModuleAttributes::IL_ONLY,
            characteristics: ModuleCharacteristics::DYNAMIC_BASE
                | ModuleCharacteristics::NX_COMPAT
                | ModuleCharacteristics::NO_SEH
                | ModuleCharacteristics::TERMINAL_SERVER_AWARE,
            entry_point: Token::nil(TableId::MethodDef),
            debug_header: None,
        }
    }
}

/// Type of a PE debug directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum DebugType {
    Unknown = 0,
    CodeView = 2,
    Deterministic = 16,
    EmbeddedPortablePdb = 17,
    PdbChecksum = 19,
}

/// A PE debug directory (`IMAGE_DEBUG_DIRECTORY`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DebugDirectory {
    pub characteristics: u32,
    pub timestamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub kind: DebugType,
    pub size_of_data: u32,
    pub address_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
}

/// One debug directory together with the data it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugHeaderEntry {
    /// The directory
    pub directory: DebugDirectory,
    /// The raw data the directory describes
    pub data: Vec<u8>,
}

/// All debug directory entries of an image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DebugHeader {
    /// Entries in directory order
    pub entries: Vec<DebugHeaderEntry>,
}

impl DebugHeader {
    /// True if the image carries at least one debug directory
    #[must_use]
    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    /// The first entry of the given type
    #[must_use]
    pub fn entry(&self, kind: DebugType) -> Option<&DebugHeaderEntry> {
        self.entries.iter().find(|entry| entry.directory.kind == kind)
    }
}

/// A symbol reader that can be attached to a module.
///
/// Decoding of the symbol files is outside this crate; the module only hands the reader
/// its debug header and keeps the reader if the reader accepts it.
pub trait SymbolReader: Send + Sync {
    /// Check the debug header against the symbols; `false` if they do not match
    fn process_debug_header(&mut self, header: &DebugHeader) -> bool;

    /// Release any resource held by the reader
    fn dispose(&mut self) {}
}
