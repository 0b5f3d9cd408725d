use goblin::elf::section_header::{SHN_LORESERVE, SHN_UNDEF};
use goblin::elf::sym::Sym;
use goblin::elf::Elf;
use goblin::strtab::Strtab;

use crate::error::{Result, TableError};
use crate::format::{ContainerFormat, ContainerRules};
use crate::sections::{Section, Symbol};

/// ELF symbols are looked up by their source name, and each symbol records the
/// index of the section that holds it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElfRules;

impl ContainerRules for ElfRules {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Elf
    }

    fn mangle_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn owning_section<'s>(&self, sections: &'s [Section], symbol: &Symbol) -> Result<&'s Section> {
        let index = symbol
            .section_index
            .ok_or_else(|| TableError::SectionNotFound {
                symbol: symbol.name.clone(),
                reason: "symbol has no section index".into(),
            })?;

        sections
            .get(index)
            .ok_or_else(|| TableError::SectionNotFound {
                symbol: symbol.name.clone(),
                reason: format!(
                    "section index {index} out of range ({} sections)",
                    sections.len()
                ),
            })
    }
}

/// Materializes the sections and defined symbols of an ELF object.
///
/// Sections keep their header-table order so that a symbol's `st_shndx`
/// indexes straight into the returned vector. Static symbols come before
/// dynamic ones, so a name present in both resolves to the `.symtab` entry.
pub(crate) fn load(bytes: &[u8]) -> Result<(Vec<Symbol>, Vec<Section>)> {
    let elf = Elf::parse(bytes).map_err(|source| TableError::Parse {
        format: "ELF",
        source,
    })?;

    let sections = elf
        .section_headers
        .iter()
        .map(|sh| Section::from_goblin_sh(bytes, sh, &elf))
        .collect::<Result<Vec<_>>>()?;
    log::debug!("ELF object has {} sections", sections.len());

    let mut symbols = Vec::new();
    collect_defined(&mut symbols, elf.syms.iter(), &elf.strtab);
    collect_defined(&mut symbols, elf.dynsyms.iter(), &elf.dynstrtab);
    log::debug!("ELF object defines {} named symbols", symbols.len());

    Ok((symbols, sections))
}

fn collect_defined(out: &mut Vec<Symbol>, syms: impl Iterator<Item = Sym>, strtab: &Strtab) {
    for sym in syms {
        if sym.st_shndx == SHN_UNDEF as usize {
            continue;
        }
        let Some(name) = strtab.get_at(sym.st_name) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        // SHN_ABS, SHN_COMMON and friends do not name a real section.
        let section_index = (sym.st_shndx < SHN_LORESERVE as usize).then_some(sym.st_shndx);

        out.push(Symbol {
            name: name.to_string(),
            value: sym.st_value,
            section_index,
        });
    }
}
