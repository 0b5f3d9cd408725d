pub mod elf;
pub mod macho;

use std::fmt;

use goblin::Hint;
use serde::Serialize;

use crate::error::Result;
use crate::sections::{Section, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContainerFormat {
    Elf,
    MachO,
}

impl ContainerFormat {
    /// Returns the lookup rules for this container format.
    pub fn rules(self) -> Box<dyn ContainerRules> {
        match self {
            ContainerFormat::Elf => Box::new(elf::ElfRules),
            ContainerFormat::MachO => Box::new(macho::MachORules),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerFormat::Elf => "ELF",
            ContainerFormat::MachO => "Mach-O",
        };
        write!(f, "{}", name)
    }
}

/// Identifies the container format from the leading magic bytes.
///
/// Fat (universal) Mach-O archives and every other format yield `None`.
pub fn detect_format(bytes: &[u8]) -> Option<ContainerFormat> {
    let magic: &[u8; 16] = bytes.get(..16)?.try_into().ok()?;
    match goblin::peek_bytes(magic).ok()? {
        Hint::Elf(_) => Some(ContainerFormat::Elf),
        Hint::Mach(_) => Some(ContainerFormat::MachO),
        _ => None,
    }
}

/// Format dependent symbol lookup rules.
///
/// The two supported containers differ in how symbol names are mangled and in
/// how a symbol's owning section is recorded.
pub trait ContainerRules: fmt::Debug + Send + Sync {
    fn format(&self) -> ContainerFormat;

    /// Name to query the symbol table with for a source-level `name`.
    fn mangle_name(&self, name: &str) -> String;

    /// Section holding the bytes addressed by `symbol`.
    fn owning_section<'s>(&self, sections: &'s [Section], symbol: &Symbol) -> Result<&'s Section>;
}
