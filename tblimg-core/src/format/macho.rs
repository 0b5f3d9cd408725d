use goblin::mach::MachO;

use crate::error::{Result, TableError};
use crate::format::{ContainerFormat, ContainerRules};
use crate::sections::{Section, Symbol};

/// Mach-O section that holds initialized data.
pub const DATA_SECTION_NAME: &str = "__data";

/// Mach-O prefixes C symbol names with an underscore, and table data always
/// lives in the initialized data section.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachORules;

impl ContainerRules for MachORules {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::MachO
    }

    fn mangle_name(&self, name: &str) -> String {
        format!("_{name}")
    }

    /// Always `__data`, whatever `n_sect` the symbol carries.
    fn owning_section<'s>(&self, sections: &'s [Section], symbol: &Symbol) -> Result<&'s Section> {
        sections
            .iter()
            .find(|s| s.name == DATA_SECTION_NAME)
            .ok_or_else(|| TableError::SectionNotFound {
                symbol: symbol.name.clone(),
                reason: format!("object has no {DATA_SECTION_NAME} section"),
            })
    }
}

/// Materializes the sections and defined symbols of a thin Mach-O object.
///
/// Sections are flattened in load-command order, which is the 1-based order
/// `n_sect` refers to; `section_index` is stored 0-based into that list.
pub(crate) fn load(bytes: &[u8]) -> Result<(Vec<Symbol>, Vec<Section>)> {
    let parse_err = |source: goblin::error::Error| TableError::Parse {
        format: "Mach-O",
        source,
    };
    let macho = MachO::parse(bytes, 0).map_err(parse_err)?;

    let mut sections = Vec::new();
    for segment in macho.segments.iter() {
        for (section, data) in segment.sections().map_err(parse_err)? {
            sections.push(Section::from_goblin_macho(&section, data)?);
        }
    }
    log::debug!("Mach-O object has {} sections", sections.len());

    let mut symbols = Vec::new();
    for entry in macho.symbols() {
        let (name, nlist) = entry.map_err(parse_err)?;
        if nlist.is_stab() || nlist.is_undefined() || name.is_empty() {
            continue;
        }
        symbols.push(Symbol {
            name: name.to_string(),
            value: nlist.n_value,
            section_index: nlist.n_sect.checked_sub(1),
        });
    }
    log::debug!("Mach-O object defines {} named symbols", symbols.len());

    Ok((symbols, sections))
}
