//! The `#~` tables stream: row counts, column layout and raw row access.
//!
//! Column widths depend on heap sizes and on the row counts of referenced
//! tables, so the layout of every table is computed once when the stream is
//! opened. Rows are read lazily as arrays of `u32` column values.

use crate::bytes::Reader;
use crate::error::{MetadataError, Result};

pub(crate) const TABLE_COUNT: usize = 0x2D;
pub(crate) const MAX_COLUMNS: usize = 9;

pub(crate) type Row = [u32; MAX_COLUMNS];

/// Metadata table identifiers, ECMA-335 II.22.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRva = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    const ALL: [TableId; TABLE_COUNT] = [
        TableId::Module,
        TableId::TypeRef,
        TableId::TypeDef,
        TableId::FieldPtr,
        TableId::Field,
        TableId::MethodPtr,
        TableId::MethodDef,
        TableId::ParamPtr,
        TableId::Param,
        TableId::InterfaceImpl,
        TableId::MemberRef,
        TableId::Constant,
        TableId::CustomAttribute,
        TableId::FieldMarshal,
        TableId::DeclSecurity,
        TableId::ClassLayout,
        TableId::FieldLayout,
        TableId::StandAloneSig,
        TableId::EventMap,
        TableId::EventPtr,
        TableId::Event,
        TableId::PropertyMap,
        TableId::PropertyPtr,
        TableId::Property,
        TableId::MethodSemantics,
        TableId::MethodImpl,
        TableId::ModuleRef,
        TableId::TypeSpec,
        TableId::ImplMap,
        TableId::FieldRva,
        TableId::EncLog,
        TableId::EncMap,
        TableId::Assembly,
        TableId::AssemblyProcessor,
        TableId::AssemblyOs,
        TableId::AssemblyRef,
        TableId::AssemblyRefProcessor,
        TableId::AssemblyRefOs,
        TableId::File,
        TableId::ExportedType,
        TableId::ManifestResource,
        TableId::NestedClass,
        TableId::GenericParam,
        TableId::MethodSpec,
        TableId::GenericParamConstraint,
    ];

    pub fn from_index(index: usize) -> Option<TableId> {
        Self::ALL.get(index).copied()
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Coded index kinds, ECMA-335 II.24.2.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndex {
    fn tag_bits(self) -> u32 {
        match self {
            CodedIndex::HasFieldMarshal
            | CodedIndex::HasSemantics
            | CodedIndex::MethodDefOrRef
            | CodedIndex::MemberForwarded
            | CodedIndex::TypeOrMethodDef => 1,
            CodedIndex::TypeDefOrRef
            | CodedIndex::HasConstant
            | CodedIndex::HasDeclSecurity
            | CodedIndex::Implementation
            | CodedIndex::ResolutionScope => 2,
            CodedIndex::MemberRefParent | CodedIndex::CustomAttributeType => 3,
            CodedIndex::HasCustomAttribute => 5,
        }
    }

    /// Target tables by tag value; `None` marks an unassigned tag.
    fn tables(self) -> &'static [Option<TableId>] {
        use TableId::*;
        match self {
            CodedIndex::TypeDefOrRef => &[Some(TypeDef), Some(TypeRef), Some(TypeSpec)],
            CodedIndex::HasConstant => &[Some(Field), Some(Param), Some(Property)],
            CodedIndex::HasCustomAttribute => &[
                Some(MethodDef),
                Some(Field),
                Some(TypeRef),
                Some(TypeDef),
                Some(Param),
                Some(InterfaceImpl),
                Some(MemberRef),
                Some(Module),
                Some(DeclSecurity),
                Some(Property),
                Some(Event),
                Some(StandAloneSig),
                Some(ModuleRef),
                Some(TypeSpec),
                Some(Assembly),
                Some(AssemblyRef),
                Some(File),
                Some(ExportedType),
                Some(ManifestResource),
                Some(GenericParam),
                Some(GenericParamConstraint),
                Some(MethodSpec),
            ],
            CodedIndex::HasFieldMarshal => &[Some(Field), Some(Param)],
            CodedIndex::HasDeclSecurity => &[Some(TypeDef), Some(MethodDef), Some(Assembly)],
            CodedIndex::MemberRefParent => &[
                Some(TypeDef),
                Some(TypeRef),
                Some(ModuleRef),
                Some(MethodDef),
                Some(TypeSpec),
            ],
            CodedIndex::HasSemantics => &[Some(Event), Some(Property)],
            CodedIndex::MethodDefOrRef => &[Some(MethodDef), Some(MemberRef)],
            CodedIndex::MemberForwarded => &[Some(Field), Some(MethodDef)],
            CodedIndex::Implementation => &[Some(File), Some(AssemblyRef), Some(ExportedType)],
            CodedIndex::CustomAttributeType => {
                &[None, None, Some(MethodDef), Some(MemberRef), None]
            }
            CodedIndex::ResolutionScope => {
                &[Some(Module), Some(ModuleRef), Some(AssemblyRef), Some(TypeRef)]
            }
            CodedIndex::TypeOrMethodDef => &[Some(TypeDef), Some(MethodDef)],
        }
    }

    /// Split a raw coded value into its table and 1-based row.
    /// A zero row is a null reference and decodes to `None`.
    pub(crate) fn decode(self, value: u32) -> Result<Option<(TableId, u32)>> {
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let row = value >> bits;
        if row == 0 {
            return Ok(None);
        }
        match self.tables().get(tag).copied().flatten() {
            Some(table) => Ok(Some((table, row))),
            None => Err(MetadataError::Unsupported(format!(
                "{:?} coded index uses unassigned tag {}",
                self, tag
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Fixed(u8),
    Str,
    Guid,
    Blob,
    Table(TableId),
    Coded(CodedIndex),
}

fn schema(table: TableId) -> &'static [Column] {
    use CodedIndex as C;
    use Column::*;
    use TableId as T;
    match table {
        T::Module => &[Fixed(2), Str, Guid, Guid, Guid],
        T::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
        T::TypeDef => &[
            Fixed(4),
            Str,
            Str,
            Coded(C::TypeDefOrRef),
            Table(T::Field),
            Table(T::MethodDef),
        ],
        T::FieldPtr => &[Table(T::Field)],
        T::Field => &[Fixed(2), Str, Blob],
        T::MethodPtr => &[Table(T::MethodDef)],
        T::MethodDef => &[Fixed(4), Fixed(2), Fixed(2), Str, Blob, Table(T::Param)],
        T::ParamPtr => &[Table(T::Param)],
        T::Param => &[Fixed(2), Fixed(2), Str],
        T::InterfaceImpl => &[Table(T::TypeDef), Coded(C::TypeDefOrRef)],
        T::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
        T::Constant => &[Fixed(1), Fixed(1), Coded(C::HasConstant), Blob],
        T::CustomAttribute => &[
            Coded(C::HasCustomAttribute),
            Coded(C::CustomAttributeType),
            Blob,
        ],
        T::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
        T::DeclSecurity => &[Fixed(2), Coded(C::HasDeclSecurity), Blob],
        T::ClassLayout => &[Fixed(2), Fixed(4), Table(T::TypeDef)],
        T::FieldLayout => &[Fixed(4), Table(T::Field)],
        T::StandAloneSig => &[Blob],
        T::EventMap => &[Table(T::TypeDef), Table(T::Event)],
        T::EventPtr => &[Table(T::Event)],
        T::Event => &[Fixed(2), Str, Coded(C::TypeDefOrRef)],
        T::PropertyMap => &[Table(T::TypeDef), Table(T::Property)],
        T::PropertyPtr => &[Table(T::Property)],
        T::Property => &[Fixed(2), Str, Blob],
        T::MethodSemantics => &[Fixed(2), Table(T::MethodDef), Coded(C::HasSemantics)],
        T::MethodImpl => &[
            Table(T::TypeDef),
            Coded(C::MethodDefOrRef),
            Coded(C::MethodDefOrRef),
        ],
        T::ModuleRef => &[Str],
        T::TypeSpec => &[Blob],
        T::ImplMap => &[Fixed(2), Coded(C::MemberForwarded), Str, Table(T::ModuleRef)],
        T::FieldRva => &[Fixed(4), Table(T::Field)],
        T::EncLog => &[Fixed(4), Fixed(4)],
        T::EncMap => &[Fixed(4)],
        T::Assembly => &[
            Fixed(4),
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(4),
            Blob,
            Str,
            Str,
        ],
        T::AssemblyProcessor => &[Fixed(4)],
        T::AssemblyOs => &[Fixed(4), Fixed(4), Fixed(4)],
        T::AssemblyRef => &[
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(4),
            Blob,
            Str,
            Str,
            Blob,
        ],
        T::AssemblyRefProcessor => &[Fixed(4), Table(T::AssemblyRef)],
        T::AssemblyRefOs => &[Fixed(4), Fixed(4), Fixed(4), Table(T::AssemblyRef)],
        T::File => &[Fixed(4), Str, Blob],
        T::ExportedType => &[Fixed(4), Fixed(4), Str, Str, Coded(C::Implementation)],
        T::ManifestResource => &[Fixed(4), Fixed(4), Str, Coded(C::Implementation)],
        T::NestedClass => &[Table(T::TypeDef), Table(T::TypeDef)],
        T::GenericParam => &[Fixed(2), Fixed(2), Coded(C::TypeOrMethodDef), Str],
        T::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
        T::GenericParamConstraint => &[Table(T::GenericParam), Coded(C::TypeDefOrRef)],
    }
}

const HEAP_STRINGS_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

/// An opened tables stream with its computed layout.
#[derive(Debug)]
pub(crate) struct TableStream<'a> {
    data: &'a [u8],
    heap_sizes: u8,
    rows: [u32; TABLE_COUNT],
    row_sizes: [usize; TABLE_COUNT],
    offsets: [usize; TABLE_COUNT],
}

impl<'a> TableStream<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        reader.skip(4)?; // reserved
        let major = reader.u8()?;
        let minor = reader.u8()?;
        let heap_sizes = reader.u8()?;
        reader.skip(1)?; // reserved
        let valid = reader.u64()?;
        let _sorted = reader.u64()?;

        let mut rows = [0u32; TABLE_COUNT];
        for bit in 0..64usize {
            if valid & (1u64 << bit) == 0 {
                continue;
            }
            if bit >= TABLE_COUNT {
                return Err(MetadataError::Unsupported(format!(
                    "tables stream declares unknown table {:#04x}",
                    bit
                )));
            }
            rows[bit] = reader.u32()?;
        }
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            reader.skip(4)?;
        }

        for pointer in [TableId::FieldPtr, TableId::MethodPtr, TableId::ParamPtr] {
            if rows[pointer.index()] != 0 {
                return Err(MetadataError::Unsupported(format!(
                    "uncompressed metadata with a non-empty {:?} table",
                    pointer
                )));
            }
        }

        let mut stream = TableStream {
            data,
            heap_sizes,
            rows,
            row_sizes: [0; TABLE_COUNT],
            offsets: [0; TABLE_COUNT],
        };

        let mut offset = reader.position();
        for table in TableId::ALL {
            let row_size: usize = schema(table)
                .iter()
                .map(|column| usize::from(stream.column_width(*column)))
                .sum();
            stream.row_sizes[table.index()] = row_size;
            stream.offsets[table.index()] = offset;
            offset += row_size * rows[table.index()] as usize;
        }
        if offset > data.len() {
            return Err(MetadataError::Truncated { offset: data.len() });
        }

        tracing::debug!(
            version = %format!("{}.{}", major, minor),
            heap_sizes,
            type_defs = rows[TableId::TypeDef.index()],
            methods = rows[TableId::MethodDef.index()],
            "opened tables stream"
        );
        Ok(stream)
    }

    pub(crate) fn row_count(&self, table: TableId) -> u32 {
        self.rows[table.index()]
    }

    fn column_width(&self, column: Column) -> u8 {
        let wide = |flag: u8| if self.heap_sizes & flag != 0 { 4 } else { 2 };
        match column {
            Column::Fixed(width) => width,
            Column::Str => wide(HEAP_STRINGS_WIDE),
            Column::Guid => wide(HEAP_GUID_WIDE),
            Column::Blob => wide(HEAP_BLOB_WIDE),
            Column::Table(table) => {
                if self.row_count(table) < 1 << 16 {
                    2
                } else {
                    4
                }
            }
            Column::Coded(coded) => {
                let largest = coded
                    .tables()
                    .iter()
                    .flatten()
                    .map(|table| self.row_count(*table))
                    .max()
                    .unwrap_or(0);
                if largest < 1 << (16 - coded.tag_bits()) {
                    2
                } else {
                    4
                }
            }
        }
    }

    /// Read row `rid` (1-based) of `table` as raw column values.
    pub(crate) fn read_row(&self, table: TableId, rid: u32) -> Result<Row> {
        if rid == 0 || rid > self.row_count(table) {
            return Err(MetadataError::BadIndex { table, row: rid });
        }
        let start =
            self.offsets[table.index()] + (rid as usize - 1) * self.row_sizes[table.index()];
        let mut reader = Reader::at(self.data, start);
        let mut row = [0u32; MAX_COLUMNS];
        for (slot, column) in row.iter_mut().zip(schema(table)) {
            *slot = reader.index(self.column_width(*column))?;
        }
        Ok(row)
    }

    /// Every row of `table`, in order.
    pub(crate) fn rows(&self, table: TableId) -> Result<Vec<Row>> {
        (1..=self.row_count(table))
            .map(|rid| self.read_row(table, rid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with_rows(heap_sizes: u8, counts: &[(TableId, u32)], body: usize) -> Vec<u8> {
        let mut valid = 0u64;
        for (table, _) in counts {
            valid |= 1 << table.index();
        }
        let mut data = vec![0, 0, 0, 0, 2, 0, heap_sizes, 1];
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        let mut sorted: Vec<_> = counts.to_vec();
        sorted.sort();
        for (_, count) in sorted {
            data.extend_from_slice(&count.to_le_bytes());
        }
        data.resize(data.len() + body, 0);
        data
    }

    #[test]
    fn test_coded_index_decode() {
        // TypeDefOrRef: tag 1 is TypeRef, row 3.
        assert_eq!(
            CodedIndex::TypeDefOrRef.decode((3 << 2) | 1).unwrap(),
            Some((TableId::TypeRef, 3))
        );
        assert_eq!(CodedIndex::TypeDefOrRef.decode(2).unwrap(), None);
        assert_eq!(
            CodedIndex::CustomAttributeType.decode((7 << 3) | 3).unwrap(),
            Some((TableId::MemberRef, 7))
        );
        assert!(CodedIndex::CustomAttributeType.decode((1 << 3) | 1).is_err());
    }

    #[test]
    fn test_row_sizes_follow_heap_and_table_sizes() {
        let data = stream_with_rows(0, &[(TableId::TypeDef, 1)], 64);
        let stream = TableStream::parse(&data).unwrap();
        // Flags(4) + 2 strings + TypeDefOrRef + Field + MethodDef indexes.
        assert_eq!(stream.row_sizes[TableId::TypeDef.index()], 14);

        let data = stream_with_rows(HEAP_STRINGS_WIDE, &[(TableId::TypeDef, 1)], 64);
        let stream = TableStream::parse(&data).unwrap();
        assert_eq!(stream.row_sizes[TableId::TypeDef.index()], 18);
    }

    #[test]
    fn test_coded_index_widens_with_large_targets() {
        // HasCustomAttribute has 5 tag bits: more than 2^11 rows widens it.
        let data = stream_with_rows(0, &[(TableId::MethodDef, 1 << 11)], 1 << 20);
        let stream = TableStream::parse(&data).unwrap();
        assert_eq!(
            stream.column_width(Column::Coded(CodedIndex::HasCustomAttribute)),
            4
        );
        assert_eq!(stream.column_width(Column::Coded(CodedIndex::TypeDefOrRef)), 2);
        assert_eq!(stream.column_width(Column::Table(TableId::MethodDef)), 2);
    }

    #[test]
    fn test_pointer_tables_are_rejected() {
        let data = stream_with_rows(0, &[(TableId::MethodPtr, 1)], 16);
        assert!(matches!(
            TableStream::parse(&data),
            Err(MetadataError::Unsupported(_))
        ));
    }

    #[test]
    fn test_row_bounds() {
        let data = stream_with_rows(0, &[(TableId::ModuleRef, 2)], 4);
        let stream = TableStream::parse(&data).unwrap();
        assert!(stream.read_row(TableId::ModuleRef, 2).is_ok());
        assert_eq!(
            stream.read_row(TableId::ModuleRef, 3),
            Err(MetadataError::BadIndex {
                table: TableId::ModuleRef,
                row: 3
            })
        );
        assert!(stream.read_row(TableId::ModuleRef, 0).is_err());
    }

    #[test]
    fn test_truncated_table_data() {
        let data = stream_with_rows(0, &[(TableId::TypeDef, 10)], 8);
        assert!(matches!(
            TableStream::parse(&data),
            Err(MetadataError::Truncated { .. })
        ));
    }
}
