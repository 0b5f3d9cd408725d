use serde::Serialize;

use crate::binary::ObjectFile;
use crate::descriptor::TableDescriptor;
use crate::error::{Result, TableError};
use crate::sections::Section;

/// Where the payload slice ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PayloadBound {
    /// `[offset, offset + object_size)`.
    #[default]
    Relative,
    /// `[offset, object_size)`, byte compatible with images produced by the
    /// legacy converter. Only yields `object_size` bytes when the payload
    /// object sits at offset 0 of its section.
    Declared,
}

impl PayloadBound {
    fn range(self, offset: u64, object_size: u32) -> (u64, u64) {
        match self {
            PayloadBound::Relative => (offset, offset.saturating_add(object_size as u64)),
            PayloadBound::Declared => (offset, object_size as u64),
        }
    }
}

/// Finds the object named by `descriptor` and slices its bytes out of
/// `descriptor_section`, the section that held the descriptor itself.
pub fn resolve_payload(
    object: &ObjectFile,
    descriptor: &TableDescriptor,
    descriptor_section: &Section,
    bound: PayloadBound,
) -> Result<Vec<u8>> {
    let symbol = object.find_symbol(&descriptor.object_name)?;

    let out_of_range = |start: u64, end: u64| TableError::PayloadOutOfRange {
        symbol: symbol.name.clone(),
        section: descriptor_section.name.clone(),
        start,
        end,
        len: descriptor_section.len(),
    };

    let offset = descriptor_section
        .offset_of(symbol)
        .ok_or_else(|| out_of_range(symbol.value, symbol.value))?;
    let (start, end) = bound.range(offset, descriptor.object_size);

    if bound == PayloadBound::Declared && offset != 0 {
        log::warn!(
            "{} sits at offset {offset:#x}; legacy bound yields {} of {} declared bytes",
            symbol.name,
            end.saturating_sub(start),
            descriptor.object_size
        );
    }

    let bytes = usize::try_from(start)
        .ok()
        .zip(usize::try_from(end).ok())
        .filter(|(s, e)| s <= e)
        .and_then(|(s, e)| descriptor_section.content.get(s..e))
        .ok_or_else(|| out_of_range(start, end))?;

    log::debug!(
        "Payload {} spans {start:#x}..{end:#x} of {}",
        symbol.name,
        descriptor_section.name
    );
    Ok(bytes.to_vec())
}
