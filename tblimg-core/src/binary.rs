use std::path::Path;

use crate::error::{Result, TableError};
use crate::format::{self, detect_format, ContainerFormat, ContainerRules};
use crate::sections::{Section, Symbol};

/// An input object file, loaded once and indexed for symbol/section lookup.
#[derive(Debug)]
pub struct ObjectFile {
    pub path: String,
    pub format: ContainerFormat,
    rules: Box<dyn ContainerRules>,
    symbols: Vec<Symbol>,
    sections: Vec<Section>,
}

impl ObjectFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path).map_err(|e| TableError::io(path, e))?;
        let mut obj = Self::parse(&buf)?;
        obj.path = path.display().to_string();
        Ok(obj)
    }

    /// Parses an in-memory object image.
    ///
    /// Format detection runs first; unrecognized input fails with
    /// [`TableError::UnsupportedFormat`] before anything else is read.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let format = detect_format(buf).ok_or(TableError::UnsupportedFormat)?;
        log::info!("Detected {format} object ({} bytes)", buf.len());

        let (symbols, sections) = match format {
            ContainerFormat::Elf => format::elf::load(buf)?,
            ContainerFormat::MachO => format::macho::load(buf)?,
        };

        Ok(Self::from_parts(format, symbols, sections))
    }

    /// Builds an object from already extracted symbols and sections.
    pub fn from_parts(format: ContainerFormat, symbols: Vec<Symbol>, sections: Vec<Section>) -> Self {
        Self {
            path: String::new(),
            format,
            rules: format.rules(),
            symbols,
            sections,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Looks up a symbol by its source-level name, applying the container's
    /// name mangling first.
    pub fn find_symbol(&self, name: &str) -> Result<&Symbol> {
        let query = self.rules.mangle_name(name);
        log::debug!("Looking up symbol {query:?} in {} object", self.rules.format());
        self.symbols
            .iter()
            .find(|s| s.name == query)
            .ok_or(TableError::SymbolNotFound(query))
    }

    pub fn find_owning_section(&self, symbol: &Symbol) -> Result<&Section> {
        let section = self.rules.owning_section(&self.sections, symbol)?;
        log::debug!("Symbol {} is owned by section {}", symbol.name, section.name);
        Ok(section)
    }
}
