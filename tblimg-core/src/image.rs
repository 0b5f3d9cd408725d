//! cFE table image encoding.
//!
//! An image is a 64-byte `CFE_FS_Header_t` file header, a 52-byte table
//! header, then the raw table payload. Every integer is big endian.
//!
//! | offset | size | field                 |
//! |--------|------|-----------------------|
//! | 0      | 4    | content type (magic)  |
//! | 4      | 4    | sub type              |
//! | 8      | 4    | file header length    |
//! | 12     | 4    | spacecraft id         |
//! | 16     | 4    | processor id          |
//! | 20     | 4    | application id        |
//! | 24     | 4    | time seconds          |
//! | 28     | 4    | time subseconds       |
//! | 32     | 32   | description           |
//! | 64     | 4    | reserved              |
//! | 68     | 4    | offset                |
//! | 72     | 4    | payload byte count    |
//! | 76     | 40   | table name            |
//! | 116    | n    | payload               |

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ReadBytesExt, BE};
use serde::Serialize;

use crate::descriptor::{TableDescriptor, DESCRIPTION_LEN, TABLE_NAME_LEN};
use crate::error::{Result, TableError};

/// `'cFE1'`
pub const HEADER_MAGIC: u32 = 0x6346_4531;
pub const SUBTYPE_TBL_IMG: u32 = 8;

pub const FILE_HEADER_LEN: usize = 64;
pub const TABLE_HEADER_LEN: usize = 12 + TABLE_NAME_LEN;
/// Bytes preceding the payload in a table image.
pub const IMAGE_HEADER_LEN: usize = FILE_HEADER_LEN + TABLE_HEADER_LEN;

/// Identification and timestamp fields stamped into the file header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IdentityDefaults {
    pub spacecraft_id: u32,
    pub processor_id: u32,
    pub application_id: u32,
    pub time_seconds: u32,
    pub time_subseconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputHeader {
    pub content_type: u32,
    pub sub_type: u32,
    pub length: u32,
    pub identity: IdentityDefaults,
    pub description: String,
    pub reserved: u32,
    pub offset: u32,
    pub num_bytes: u32,
    pub table_name: String,
}

impl OutputHeader {
    pub fn new(descriptor: &TableDescriptor, identity: IdentityDefaults) -> Self {
        Self {
            content_type: HEADER_MAGIC,
            sub_type: SUBTYPE_TBL_IMG,
            length: FILE_HEADER_LEN as u32,
            identity,
            description: descriptor.description.clone(),
            reserved: 0,
            offset: 0,
            num_bytes: descriptor.object_size,
            table_name: descriptor.table_name.clone(),
        }
    }

    /// Encodes the header.
    ///
    /// Text that does not fit its fixed-width field is rejected with
    /// [`TableError::FieldOverflow`] rather than cut.
    pub fn to_bytes(&self) -> Result<[u8; IMAGE_HEADER_LEN]> {
        let mut buf = Vec::with_capacity(IMAGE_HEADER_LEN);

        for word in [
            self.content_type,
            self.sub_type,
            self.length,
            self.identity.spacecraft_id,
            self.identity.processor_id,
            self.identity.application_id,
            self.identity.time_seconds,
            self.identity.time_subseconds,
        ] {
            buf.extend_from_slice(&word.to_be_bytes());
        }
        put_padded(&mut buf, "description", &self.description, DESCRIPTION_LEN)?;

        for word in [self.reserved, self.offset, self.num_bytes] {
            buf.extend_from_slice(&word.to_be_bytes());
        }
        put_padded(&mut buf, "table_name", &self.table_name, TABLE_NAME_LEN)?;

        let len = buf.len();
        buf.try_into()
            .map_err(|_| TableError::InvalidImage(format!("encoded header is {len} bytes")))
    }

    /// Decodes the header at the start of a table image.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IMAGE_HEADER_LEN {
            return Err(TableError::InvalidImage(format!(
                "{} bytes is shorter than the {IMAGE_HEADER_LEN}-byte header",
                bytes.len()
            )));
        }

        let mut cur = Cursor::new(&bytes[..IMAGE_HEADER_LEN]);
        let short = |e: io::Error| TableError::InvalidImage(e.to_string());

        let content_type = cur.read_u32::<BE>().map_err(short)?;
        if content_type != HEADER_MAGIC {
            return Err(TableError::InvalidImage(format!(
                "bad magic {content_type:#010x}"
            )));
        }
        let sub_type = cur.read_u32::<BE>().map_err(short)?;
        let length = cur.read_u32::<BE>().map_err(short)?;
        let identity = IdentityDefaults {
            spacecraft_id: cur.read_u32::<BE>().map_err(short)?,
            processor_id: cur.read_u32::<BE>().map_err(short)?,
            application_id: cur.read_u32::<BE>().map_err(short)?,
            time_seconds: cur.read_u32::<BE>().map_err(short)?,
            time_subseconds: cur.read_u32::<BE>().map_err(short)?,
        };
        let description = read_padded(&mut cur, "description", DESCRIPTION_LEN)?;
        let reserved = cur.read_u32::<BE>().map_err(short)?;
        let offset = cur.read_u32::<BE>().map_err(short)?;
        let num_bytes = cur.read_u32::<BE>().map_err(short)?;
        let table_name = read_padded(&mut cur, "table_name", TABLE_NAME_LEN)?;

        Ok(Self {
            content_type,
            sub_type,
            length,
            identity,
            description,
            reserved,
            offset,
            num_bytes,
            table_name,
        })
    }
}

fn put_padded(buf: &mut Vec<u8>, field: &'static str, text: &str, width: usize) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > width {
        return Err(TableError::FieldOverflow {
            field,
            len: bytes.len(),
            width,
        });
    }
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + width - bytes.len(), 0);
    Ok(())
}

fn read_padded(cur: &mut Cursor<&[u8]>, field: &str, width: usize) -> Result<String> {
    let mut raw = vec![0u8; width];
    cur.read_exact(&mut raw)
        .map_err(|e| TableError::InvalidImage(format!("{field}: {e}")))?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    raw.truncate(end);
    String::from_utf8(raw).map_err(|e| TableError::InvalidImage(format!("{field}: {e}")))
}

/// Builds the fixed header preceding the payload of a table image.
pub fn build_header(
    descriptor: &TableDescriptor,
    identity: IdentityDefaults,
) -> Result<[u8; IMAGE_HEADER_LEN]> {
    OutputHeader::new(descriptor, identity).to_bytes()
}

/// Writes `header` followed directly by `payload` to `path`.
///
/// The image is written to a temporary file beside `path` and renamed into
/// place once complete, so a failed run never leaves a truncated image at
/// `path`.
pub fn write_file(path: &Path, header: &[u8], payload: &[u8]) -> Result<()> {
    let tmp = temp_path(path);

    let written = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(header)?;
        file.write_all(payload)?;
        file.sync_all()
    })();

    let published = written
        .map_err(|e| TableError::io(&tmp, e))
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| TableError::io(path, e)));

    if published.is_err() {
        if let Err(e) = fs::remove_file(&tmp) {
            log::debug!("Could not remove {}: {e}", tmp.display());
        }
    } else {
        log::info!(
            "Wrote {} bytes to {}",
            header.len() + payload.len(),
            path.display()
        );
    }
    published
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}
