use std::io::{Cursor, Read};

use byteorder::{ReadBytesExt, LE};
use serde::Serialize;

use crate::error::{Result, TableError};
use crate::sections::{Section, Symbol};

/// Exported name of the table descriptor object.
pub const TBL_DEF_SYMBOL_NAME: &str = "CFE_TBL_FileDef";

pub const OBJECT_NAME_LEN: usize = 64;
pub const TABLE_NAME_LEN: usize = 40;
pub const DESCRIPTION_LEN: usize = 32;
pub const TARGET_FILE_NAME_LEN: usize = 20;

/// Bytes occupied by a packed descriptor in the object's data section.
pub const DESCRIPTOR_LEN: usize =
    OBJECT_NAME_LEN + TABLE_NAME_LEN + DESCRIPTION_LEN + TARGET_FILE_NAME_LEN + 4;

/// Decoded `CFE_TBL_FileDef` descriptor.
///
/// Layout in the object, packed with no padding:
///
/// | field            | width |
/// |------------------|-------|
/// | object_name      | 64    |
/// | table_name       | 40    |
/// | description      | 32    |
/// | target_file_name | 20    |
/// | object_size      | 4, little endian |
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub object_name: String,
    pub table_name: String,
    pub description: String,
    pub target_file_name: String,
    pub object_size: u32,
}

/// Reads the descriptor addressed by `symbol` out of its owning `section`.
pub fn read_descriptor(section: &Section, symbol: &Symbol) -> Result<TableDescriptor> {
    let truncated = |offset: u64, reason: String| TableError::TruncatedDescriptor {
        section: section.name.clone(),
        offset,
        reason,
    };

    let offset = section.offset_of(symbol).ok_or_else(|| {
        truncated(
            symbol.value,
            format!(
                "symbol {} lies below section start {:#x}",
                symbol.name, section.address
            ),
        )
    })?;

    let window = usize::try_from(offset)
        .ok()
        .and_then(|start| section.content.get(start..start.checked_add(DESCRIPTOR_LEN)?))
        .ok_or_else(|| {
            truncated(
                offset,
                format!(
                    "need {DESCRIPTOR_LEN} bytes, section holds {}",
                    section.len()
                ),
            )
        })?;
    log::debug!(
        "Reading descriptor {} from {} at offset {offset:#x}",
        symbol.name,
        section.name
    );

    let mut cur = Cursor::new(window);
    let mut text = |field: &'static str, width: usize| -> Result<String> {
        let mut raw = vec![0u8; width];
        cur.read_exact(&mut raw)
            .map_err(|e| truncated(offset, format!("{field}: {e}")))?;
        decode_field(raw).map_err(|e| truncated(offset, format!("{field}: {e}")))
    };

    let object_name = text("object_name", OBJECT_NAME_LEN)?;
    let table_name = text("table_name", TABLE_NAME_LEN)?;
    let description = text("description", DESCRIPTION_LEN)?;
    let target_file_name = text("target_file_name", TARGET_FILE_NAME_LEN)?;
    let object_size = cur
        .read_u32::<LE>()
        .map_err(|e| truncated(offset, format!("object_size: {e}")))?;

    Ok(TableDescriptor {
        object_name,
        table_name,
        description,
        target_file_name,
        object_size,
    })
}

/// Every NUL in the field is dropped, not only the trailing padding.
fn decode_field(mut raw: Vec<u8>) -> std::result::Result<String, std::string::FromUtf8Error> {
    raw.retain(|&b| b != 0);
    String::from_utf8(raw)
}
