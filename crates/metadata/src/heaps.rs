//! Metadata root and the heaps it points at.

use crate::bytes::Reader;
use crate::error::{MetadataError, Result};

const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// Streams located through the metadata root.
#[derive(Debug, Default)]
pub(crate) struct Streams<'a> {
    pub(crate) tables: Option<&'a [u8]>,
    pub(crate) strings: StringHeap<'a>,
    pub(crate) blobs: BlobHeap<'a>,
    pub(crate) guids: GuidHeap<'a>,
    pub(crate) version: String,
}

impl<'a> Streams<'a> {
    pub(crate) fn parse(root: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(root);
        if reader.u32()? != METADATA_SIGNATURE {
            return Err(MetadataError::InvalidImage("missing BSJB metadata signature"));
        }
        reader.skip(8)?; // major, minor, reserved
        let version_length = reader.u32()? as usize;
        let version_bytes = reader.bytes(version_length)?;
        let version = String::from_utf8_lossy(version_bytes)
            .trim_end_matches('\0')
            .to_string();
        reader.skip(2)?; // flags
        let stream_count = reader.u16()?;

        let mut streams = Streams {
            version,
            ..Default::default()
        };
        for _ in 0..stream_count {
            let offset = reader.u32()? as usize;
            let size = reader.u32()? as usize;
            let name = reader.c_string(32)?;
            reader.align4(0);

            let body = Reader::at(root, offset).bytes(size)?;
            match name {
                b"#~" | b"#-" => streams.tables = Some(body),
                b"#Strings" => streams.strings = StringHeap(body),
                b"#Blob" => streams.blobs = BlobHeap(body),
                b"#GUID" => streams.guids = GuidHeap(body),
                // User strings only matter to IL bodies.
                b"#US" => {}
                other => tracing::debug!(
                    stream = %String::from_utf8_lossy(other),
                    "ignoring unknown metadata stream"
                ),
            }
        }
        Ok(streams)
    }
}

/// `#Strings`: NUL-terminated UTF-8 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StringHeap<'a>(&'a [u8]);

impl<'a> StringHeap<'a> {
    pub(crate) fn get(&self, offset: u32) -> Result<&'a str> {
        if offset == 0 {
            return Ok("");
        }
        let bad = MetadataError::BadHeapEntry {
            heap: "#Strings",
            offset,
        };
        let tail = self.0.get(offset as usize..).ok_or_else(|| bad.clone())?;
        let len = tail.iter().position(|b| *b == 0).ok_or_else(|| bad.clone())?;
        std::str::from_utf8(&tail[..len]).map_err(|_| bad)
    }
}

/// `#Blob`: length-prefixed byte strings.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BlobHeap<'a>(&'a [u8]);

impl<'a> BlobHeap<'a> {
    pub(crate) fn get(&self, offset: u32) -> Result<&'a [u8]> {
        if offset == 0 {
            return Ok(&[]);
        }
        let bad = || MetadataError::BadHeapEntry {
            heap: "#Blob",
            offset,
        };
        let mut reader = Reader::at(self.0, offset as usize);
        let len = reader.compressed_u32().map_err(|_| bad())?;
        reader.bytes(len as usize).map_err(|_| bad())
    }
}

/// `#GUID`: 16-byte entries addressed from 1.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct GuidHeap<'a>(&'a [u8]);

impl GuidHeap<'_> {
    pub(crate) fn get(&self, index: u32) -> Result<Option<[u8; 16]>> {
        if index == 0 {
            return Ok(None);
        }
        let start = (index as usize - 1) * 16;
        let entry = self
            .0
            .get(start..start + 16)
            .ok_or(MetadataError::BadHeapEntry {
                heap: "#GUID",
                offset: index,
            })?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(entry);
        Ok(Some(guid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_heap() {
        let heap = StringHeap(b"\0Widget\0Ns\0");
        assert_eq!(heap.get(0).unwrap(), "");
        assert_eq!(heap.get(1).unwrap(), "Widget");
        assert_eq!(heap.get(8).unwrap(), "Ns");
        assert_eq!(heap.get(3).unwrap(), "dget");
        assert!(heap.get(40).is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let heap = StringHeap(b"\0abc");
        assert_eq!(
            heap.get(1),
            Err(MetadataError::BadHeapEntry {
                heap: "#Strings",
                offset: 1
            })
        );
    }

    #[test]
    fn test_blob_heap() {
        let heap = BlobHeap(&[0, 3, 0x20, 0x00, 0x01, 0x05]);
        assert_eq!(heap.get(1).unwrap(), &[0x20, 0x00, 0x01]);
        assert_eq!(heap.get(0).unwrap(), &[] as &[u8]);
        assert!(heap.get(5).is_err());
    }

    #[test]
    fn test_guid_heap() {
        let mut data = vec![0u8; 32];
        data[16] = 0xAB;
        let heap = GuidHeap(&data);
        assert_eq!(heap.get(0).unwrap(), None);
        assert_eq!(heap.get(2).unwrap().unwrap()[0], 0xAB);
        assert!(heap.get(3).is_err());
    }
}
