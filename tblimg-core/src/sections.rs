use goblin::elf::section_header::{SectionHeader, SHT_NOBITS};
use goblin::elf::Elf;
use goblin::mach::constants::{SECTION_TYPE, S_ZEROFILL};
use goblin::mach::segment::Section as MachSection;
use serde::Serialize;

use crate::error::{Result, TableError};

/// A named symbol exported by the input object.
///
/// `value` is recorded exactly as the container stores it. For relocatable ELF
/// objects that is already an offset into the owning section; for executables
/// and Mach-O objects it is an address, see [`Section::offset_of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
    pub section_index: Option<usize>,
}

/// A contiguous named region of raw bytes within the input object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub address: u64,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl Section {
    pub fn new(name: impl Into<String>, address: u64, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            address,
            content,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Byte offset of `symbol` into [`Section::content`].
    ///
    /// Relocatable ELF sections sit at address 0, so this is the raw symbol
    /// value there. Returns `None` when the symbol lies below the section start.
    pub fn offset_of(&self, symbol: &Symbol) -> Option<u64> {
        symbol.value.checked_sub(self.address)
    }

    pub(crate) fn from_goblin_sh(bytes: &[u8], sh: &SectionHeader, elf: &Elf) -> Result<Self> {
        let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("").to_string();

        // .bss style sections occupy no file space; their image is all zeros.
        let content = if sh.sh_type == SHT_NOBITS {
            zero_filled("ELF", &name, sh.sh_size)?
        } else {
            let start = sh.sh_offset as usize;
            let end = start.saturating_add(sh.sh_size as usize);
            bytes
                .get(start..end)
                .ok_or_else(|| TableError::Parse {
                    format: "ELF",
                    source: goblin::error::Error::Malformed(format!(
                        "section {name} ({start:#x}..{end:#x}) extends past end of file"
                    )),
                })?
                .to_vec()
        };

        Ok(Section {
            name,
            address: sh.sh_addr,
            content,
        })
    }

    pub(crate) fn from_goblin_macho(section: &MachSection, data: &[u8]) -> Result<Self> {
        let name = section
            .name()
            .map_err(|source| TableError::Parse {
                format: "Mach-O",
                source,
            })?
            .to_string();

        let content = if section.flags & SECTION_TYPE == S_ZEROFILL {
            zero_filled("Mach-O", &name, section.size)?
        } else {
            data.to_vec()
        };

        Ok(Section {
            name,
            address: section.addr,
            content,
        })
    }
}

/// Largest zero-fill section that is materialized. A table's size is a u32,
/// so nothing larger can hold a descriptor and its payload.
pub const MAX_ZEROFILL_LEN: u64 = u32::MAX as u64;

/// Zero image of a section that occupies no file space.
///
/// The size comes straight from the section header, so it is bounded before
/// anything is allocated.
fn zero_filled(format: &'static str, name: &str, size: u64) -> Result<Vec<u8>> {
    let malformed = |reason: String| TableError::Parse {
        format,
        source: goblin::error::Error::Malformed(reason),
    };

    if size > MAX_ZEROFILL_LEN {
        return Err(malformed(format!(
            "zero-fill section {name} claims {size:#x} bytes (limit {MAX_ZEROFILL_LEN:#x})"
        )));
    }
    let len = usize::try_from(size)
        .map_err(|_| malformed(format!("zero-fill section {name} too large for this host")))?;

    let mut content = Vec::new();
    content
        .try_reserve_exact(len)
        .map_err(|e| malformed(format!("zero-fill section {name}: {e}")))?;
    content.resize(len, 0);
    Ok(content)
}
