use std::path::Path;

use serde::Serialize;

use crate::binary::ObjectFile;
use crate::descriptor::{read_descriptor, TableDescriptor, TBL_DEF_SYMBOL_NAME};
use crate::error::{Result, TableError};
use crate::image::{
    build_header, write_file, IdentityDefaults, OutputHeader, FILE_HEADER_LEN, IMAGE_HEADER_LEN,
    SUBTYPE_TBL_IMG,
};
use crate::payload::{resolve_payload, PayloadBound};

/// A decoded table: its descriptor and the payload bytes it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub metadata: TableDescriptor,
    #[serde(skip)]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConvertOptions {
    pub identity: IdentityDefaults,
    pub payload_bound: PayloadBound,
}

/// Locates `CFE_TBL_FileDef` and the object it describes.
pub fn read_table_definition(object: &ObjectFile, bound: PayloadBound) -> Result<TableDefinition> {
    let def_symbol = object.find_symbol(TBL_DEF_SYMBOL_NAME)?;
    let section = object.find_owning_section(def_symbol)?;
    let metadata = read_descriptor(section, def_symbol)?;
    log::info!(
        "Table {} ({:?}) from object {}, {} bytes",
        metadata.table_name,
        metadata.description,
        metadata.object_name,
        metadata.object_size
    );

    let content = resolve_payload(object, &metadata, section, bound)?;
    Ok(TableDefinition { metadata, content })
}

/// Converts an already loaded object into a table image at `output`.
pub fn convert_object(
    object: &ObjectFile,
    output: &Path,
    options: &ConvertOptions,
) -> Result<TableDefinition> {
    let table = read_table_definition(object, options.payload_bound)?;
    let header = build_header(&table.metadata, options.identity)?;
    write_file(output, &header, &table.content)?;
    Ok(table)
}

/// Converts the object file at `input` into a table image at `output`.
pub fn convert(input: &Path, output: &Path, options: &ConvertOptions) -> Result<TableDefinition> {
    let object = ObjectFile::open(input)?;
    convert_object(&object, output, options)
}

/// Checks a written image against `expected`, decoding the header
/// independently of the encoder.
pub fn verify_image(
    image: &[u8],
    expected: &TableDefinition,
    identity: IdentityDefaults,
) -> Result<()> {
    let header = OutputHeader::parse(image)?;
    let meta = &expected.metadata;

    let mismatch =
        |what: &str| -> Result<()> { Err(TableError::InvalidImage(format!("{what} does not match"))) };
    if header.sub_type != SUBTYPE_TBL_IMG || header.length != FILE_HEADER_LEN as u32 {
        return mismatch("file header type");
    }
    if header.identity != identity {
        return mismatch("identity");
    }
    if header.table_name != meta.table_name {
        return mismatch("table name");
    }
    if header.description != meta.description {
        return mismatch("description");
    }
    if header.num_bytes != meta.object_size {
        return mismatch("payload byte count");
    }
    if image[IMAGE_HEADER_LEN..] != expected.content[..] {
        return mismatch("payload");
    }
    Ok(())
}
