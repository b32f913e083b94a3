//! Just enough PE/COFF to find the CLI metadata root.

use crate::bytes::Reader;
use crate::error::{MetadataError, Result};

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;
const CLI_HEADER_DIRECTORY: u32 = 14;
const SECTION_HEADER_SIZE: usize = 40;

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_offset: u32,
}

impl Section {
    fn contains(&self, rva: u32) -> bool {
        let extent = self.virtual_size.max(self.raw_size);
        rva >= self.virtual_address && u64::from(rva) < u64::from(self.virtual_address) + u64::from(extent)
    }
}

/// A mapped PE image: the raw bytes plus its section table.
#[derive(Debug)]
pub(crate) struct PeImage<'a> {
    data: &'a [u8],
    sections: Vec<Section>,
    cli_header_rva: u32,
}

impl<'a> PeImage<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 0x40 || &data[..2] != b"MZ" {
            return Err(MetadataError::InvalidImage("missing MZ signature"));
        }
        let pe_offset = Reader::at(data, 0x3C).u32()? as usize;

        let mut reader = Reader::at(data, pe_offset);
        if reader.bytes(4)? != b"PE\0\0" {
            return Err(MetadataError::InvalidImage("missing PE signature"));
        }

        // COFF file header.
        reader.skip(2)?; // machine
        let section_count = reader.u16()? as usize;
        reader.skip(12)?; // timestamp, symbol table, symbol count
        let optional_header_size = reader.u16()? as usize;
        reader.skip(2)?; // characteristics

        let optional_header = reader.position();
        let magic = reader.u16()?;
        let (count_offset, directories_offset) = match magic {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            _ => return Err(MetadataError::InvalidImage("unknown optional header magic")),
        };

        let directory_count = Reader::at(data, optional_header + count_offset).u32()?;
        if directory_count <= CLI_HEADER_DIRECTORY {
            return Err(MetadataError::NotManaged("no CLI header data directory"));
        }
        let cli_directory =
            optional_header + directories_offset + (CLI_HEADER_DIRECTORY as usize) * 8;
        let cli_header_rva = Reader::at(data, cli_directory).u32()?;
        if cli_header_rva == 0 {
            return Err(MetadataError::NotManaged("CLI header directory is empty"));
        }

        let mut sections = Vec::with_capacity(section_count);
        let table = optional_header + optional_header_size;
        for index in 0..section_count {
            let mut header = Reader::at(data, table + index * SECTION_HEADER_SIZE);
            header.skip(8)?; // name
            let virtual_size = header.u32()?;
            let virtual_address = header.u32()?;
            let raw_size = header.u32()?;
            let raw_offset = header.u32()?;
            sections.push(Section {
                virtual_address,
                virtual_size,
                raw_size,
                raw_offset,
            });
        }

        Ok(PeImage {
            data,
            sections,
            cli_header_rva,
        })
    }

    fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        let section = self
            .sections
            .iter()
            .find(|s| s.contains(rva))
            .ok_or(MetadataError::InvalidImage("RVA outside every section"))?;
        Ok((rva - section.virtual_address) as usize + section.raw_offset as usize)
    }

    fn slice(&self, rva: u32, size: u32) -> Result<&'a [u8]> {
        let offset = self.rva_to_offset(rva)?;
        Reader::at(self.data, offset).bytes(size as usize)
    }

    /// The metadata root referenced by the CLI header.
    pub(crate) fn metadata_root(&self) -> Result<&'a [u8]> {
        let offset = self.rva_to_offset(self.cli_header_rva)?;
        let mut header = Reader::at(self.data, offset);
        header.skip(8)?; // cb, major and minor runtime version
        let metadata_rva = header.u32()?;
        let metadata_size = header.u32()?;
        if metadata_rva == 0 || metadata_size == 0 {
            return Err(MetadataError::NotManaged("CLI header has no metadata"));
        }
        self.slice(metadata_rva, metadata_size)
    }
}
