//! The concrete field layout of the WebAssembly binary module format.
//!
//! One [`StructKind`] per structure in the on-disk encoding, each with a
//! declaration-order field table and, where the structure carries derived
//! count/length fields, a `fix` hook that recomputes them from the current
//! state of their dependent fields.

use crate::schema::{FieldDef, FieldTy, StructValue, Value};
use crate::{Error, Result};

/// Section ids of the module format. An id outside this set decodes as an
/// opaque byte run.
pub const SEC_CUSTOM: u64 = 0;
const SEC_TYPE: u64 = 1;
const SEC_IMPORT: u64 = 2;
const SEC_FUNCTION: u64 = 3;
const SEC_TABLE: u64 = 4;
const SEC_MEMORY: u64 = 5;
const SEC_GLOBAL: u64 = 6;
const SEC_EXPORT: u64 = 7;
const SEC_START: u64 = 8;
const SEC_ELEMENT: u64 = 9;
const SEC_CODE: u64 = 10;
const SEC_DATA: u64 = 11;
const SEC_DATA_COUNT: u64 = 12;

/// Name-section subsection ids.
const NAME_SUBSEC_FUNCTION: u64 = 1;
const NAME_SUBSEC_LOCAL: u64 = 2;

const VAR_U32: FieldTy = FieldTy::VarU(32);
const VALUE_TYPE: FieldTy = FieldTy::VarS(7);

/// Every structure type in the module schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    /// Module magic and version.
    ModuleHeader,
    /// One section record: id, payload length, optional name, payload.
    Section,
    /// Id 1.
    TypeSection,
    /// One function signature.
    FuncType,
    /// Id 2.
    ImportSection,
    /// One import record.
    ImportEntry,
    /// Import payload for kind 0.
    FunctionImport,
    /// Table element type plus limits.
    TableType,
    /// Flags, initial size, optional maximum.
    ResizableLimits,
    /// Memory limits.
    MemoryType,
    /// Global content type and mutability.
    GlobalType,
    /// Id 3.
    FunctionSection,
    /// Id 4.
    TableSection,
    /// Id 5.
    MemorySection,
    /// Id 6.
    GlobalSection,
    /// One global definition: type plus init expression.
    GlobalEntry,
    /// Id 7.
    ExportSection,
    /// One export record.
    ExportEntry,
    /// Id 8.
    StartSection,
    /// Id 9.
    ElementSection,
    /// One element segment.
    ElementSegment,
    /// Id 10.
    CodeSection,
    /// One function body.
    FunctionBody,
    /// A run-length local declaration.
    LocalEntry,
    /// Id 11.
    DataSection,
    /// One data segment.
    DataSegment,
    /// Id 12.
    DataCountSection,
    /// One subsection of the custom name section.
    NameSubSection,
    /// An index-to-name assoc list.
    NameMap,
    /// One name assignment.
    Naming,
    /// Per-function local name maps.
    LocalNameMap,
    /// Local names of one function.
    LocalNames,
}

const MODULE_HEADER: &[FieldDef] = &[
    FieldDef {
        name: "magic",
        ty: FieldTy::UIntN(32),
    },
    FieldDef {
        name: "version",
        ty: FieldTy::UIntN(32),
    },
];

const SECTION: &[FieldDef] = &[
    FieldDef {
        name: "id",
        ty: FieldTy::VarU(7),
    },
    FieldDef {
        name: "payload_len",
        ty: VAR_U32,
    },
    FieldDef {
        name: "name_len",
        ty: FieldTy::Cond {
            inner: &VAR_U32,
            present: |v| v.u64("id") == SEC_CUSTOM,
        },
    },
    FieldDef {
        name: "name",
        ty: FieldTy::Cond {
            inner: &FieldTy::Bytes {
                len: |v| v.u64("name_len"),
                utf8: true,
            },
            present: |v| v.u64("id") == SEC_CUSTOM,
        },
    },
    FieldDef {
        name: "payload",
        ty: FieldTy::Choice {
            tag: |v| v.u64("id"),
            arms: &[
                (SEC_TYPE, FieldTy::Struct(StructKind::TypeSection)),
                (SEC_IMPORT, FieldTy::Struct(StructKind::ImportSection)),
                (SEC_FUNCTION, FieldTy::Struct(StructKind::FunctionSection)),
                (SEC_TABLE, FieldTy::Struct(StructKind::TableSection)),
                (SEC_MEMORY, FieldTy::Struct(StructKind::MemorySection)),
                (SEC_GLOBAL, FieldTy::Struct(StructKind::GlobalSection)),
                (SEC_EXPORT, FieldTy::Struct(StructKind::ExportSection)),
                (SEC_START, FieldTy::Struct(StructKind::StartSection)),
                (SEC_ELEMENT, FieldTy::Struct(StructKind::ElementSection)),
                (SEC_CODE, FieldTy::Struct(StructKind::CodeSection)),
                (SEC_DATA, FieldTy::Struct(StructKind::DataSection)),
                (SEC_DATA_COUNT, FieldTy::Struct(StructKind::DataCountSection)),
            ],
            // Unknown and custom sections keep their payload as an opaque
            // byte run sized by the declared payload length minus the name
            // prefix, preserving forward compatibility.
            default: Some(&FieldTy::Bytes {
                len: |v| {
                    v.u64("payload_len")
                        .saturating_sub((v.len_of("name_len") + v.len_of("name")) as u64)
                },
                utf8: false,
            }),
        },
    },
    FieldDef {
        name: "overhang",
        ty: FieldTy::Bytes {
            len: |v| {
                v.u64("payload_len").saturating_sub(
                    (v.len_of("name_len") + v.len_of("name") + v.len_of("payload")) as u64,
                )
            },
            utf8: false,
        },
    },
];

const TYPE_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::FuncType),
            count: |v| v.u64("count"),
        },
    },
];

const FUNC_TYPE: &[FieldDef] = &[
    FieldDef {
        name: "form",
        ty: FieldTy::VarS(7),
    },
    FieldDef {
        name: "param_count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "param_types",
        ty: FieldTy::Repeat {
            elem: &VALUE_TYPE,
            count: |v| v.u64("param_count"),
        },
    },
    FieldDef {
        name: "return_count",
        ty: FieldTy::VarU(1),
    },
    FieldDef {
        name: "return_type",
        ty: FieldTy::Cond {
            inner: &VALUE_TYPE,
            present: |v| v.u64("return_count") != 0,
        },
    },
];

const IMPORT_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::ImportEntry),
            count: |v| v.u64("count"),
        },
    },
];

const IMPORT_ENTRY: &[FieldDef] = &[
    FieldDef {
        name: "module_len",
        ty: VAR_U32,
    },
    FieldDef {
        name: "module_str",
        ty: FieldTy::Bytes {
            len: |v| v.u64("module_len"),
            utf8: true,
        },
    },
    FieldDef {
        name: "field_len",
        ty: VAR_U32,
    },
    FieldDef {
        name: "field_str",
        ty: FieldTy::Bytes {
            len: |v| v.u64("field_len"),
            utf8: true,
        },
    },
    FieldDef {
        name: "kind",
        ty: FieldTy::UIntN(8),
    },
    FieldDef {
        name: "type",
        ty: FieldTy::Choice {
            tag: |v| v.u64("kind"),
            arms: &[
                (0, FieldTy::Struct(StructKind::FunctionImport)),
                (1, FieldTy::Struct(StructKind::TableType)),
                (2, FieldTy::Struct(StructKind::MemoryType)),
                (3, FieldTy::Struct(StructKind::GlobalType)),
            ],
            default: None,
        },
    },
];

const FUNCTION_IMPORT: &[FieldDef] = &[FieldDef {
    name: "type",
    ty: VAR_U32,
}];

const TABLE_TYPE: &[FieldDef] = &[
    FieldDef {
        name: "element_type",
        ty: FieldTy::VarS(7),
    },
    FieldDef {
        name: "limits",
        ty: FieldTy::Struct(StructKind::ResizableLimits),
    },
];

const RESIZABLE_LIMITS: &[FieldDef] = &[
    FieldDef {
        name: "flags",
        ty: VAR_U32,
    },
    FieldDef {
        name: "initial",
        ty: VAR_U32,
    },
    FieldDef {
        name: "maximum",
        ty: FieldTy::Cond {
            inner: &VAR_U32,
            present: |v| v.u64("flags") & 1 != 0,
        },
    },
];

const MEMORY_TYPE: &[FieldDef] = &[FieldDef {
    name: "limits",
    ty: FieldTy::Struct(StructKind::ResizableLimits),
}];

const GLOBAL_TYPE: &[FieldDef] = &[
    FieldDef {
        name: "content_type",
        ty: FieldTy::VarS(7),
    },
    FieldDef {
        name: "mutability",
        ty: FieldTy::VarU(1),
    },
];

const FUNCTION_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "types",
        ty: FieldTy::Repeat {
            elem: &VAR_U32,
            count: |v| v.u64("count"),
        },
    },
];

const TABLE_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::TableType),
            count: |v| v.u64("count"),
        },
    },
];

const MEMORY_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::MemoryType),
            count: |v| v.u64("count"),
        },
    },
];

const GLOBAL_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "globals",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::GlobalEntry),
            count: |v| v.u64("count"),
        },
    },
];

const GLOBAL_ENTRY: &[FieldDef] = &[
    FieldDef {
        name: "type",
        ty: FieldTy::Struct(StructKind::GlobalType),
    },
    FieldDef {
        name: "init",
        ty: FieldTy::Expr,
    },
];

const EXPORT_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::ExportEntry),
            count: |v| v.u64("count"),
        },
    },
];

const EXPORT_ENTRY: &[FieldDef] = &[
    FieldDef {
        name: "field_len",
        ty: VAR_U32,
    },
    FieldDef {
        name: "field_str",
        ty: FieldTy::Bytes {
            len: |v| v.u64("field_len"),
            utf8: true,
        },
    },
    FieldDef {
        name: "kind",
        ty: FieldTy::UIntN(8),
    },
    FieldDef {
        name: "index",
        ty: VAR_U32,
    },
];

const START_SECTION: &[FieldDef] = &[FieldDef {
    name: "index",
    ty: VAR_U32,
}];

const ELEMENT_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::ElementSegment),
            count: |v| v.u64("count"),
        },
    },
];

const ELEMENT_SEGMENT: &[FieldDef] = &[
    FieldDef {
        name: "index",
        ty: VAR_U32,
    },
    FieldDef {
        name: "offset",
        ty: FieldTy::Expr,
    },
    FieldDef {
        name: "num_elem",
        ty: VAR_U32,
    },
    FieldDef {
        name: "elems",
        ty: FieldTy::Repeat {
            elem: &VAR_U32,
            count: |v| v.u64("num_elem"),
        },
    },
];

const CODE_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "bodies",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::FunctionBody),
            count: |v| v.u64("count"),
        },
    },
];

const FUNCTION_BODY: &[FieldDef] = &[
    FieldDef {
        name: "body_size",
        ty: VAR_U32,
    },
    FieldDef {
        name: "local_count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "locals",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::LocalEntry),
            count: |v| v.u64("local_count"),
        },
    },
    FieldDef {
        name: "code",
        ty: FieldTy::Bytes {
            len: |v| {
                v.u64("body_size")
                    .saturating_sub((v.len_of("local_count") + v.len_of("locals")) as u64)
            },
            utf8: false,
        },
    },
];

const LOCAL_ENTRY: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "type",
        ty: VALUE_TYPE,
    },
];

const DATA_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "entries",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::DataSegment),
            count: |v| v.u64("count"),
        },
    },
];

const DATA_SEGMENT: &[FieldDef] = &[
    FieldDef {
        name: "index",
        ty: VAR_U32,
    },
    FieldDef {
        name: "offset",
        ty: FieldTy::Expr,
    },
    FieldDef {
        name: "size",
        ty: VAR_U32,
    },
    FieldDef {
        name: "data",
        ty: FieldTy::Bytes {
            len: |v| v.u64("size"),
            utf8: false,
        },
    },
];

const DATA_COUNT_SECTION: &[FieldDef] = &[FieldDef {
    name: "count",
    ty: VAR_U32,
}];

const NAME_SUB_SECTION: &[FieldDef] = &[
    FieldDef {
        name: "name_type",
        ty: FieldTy::VarU(7),
    },
    FieldDef {
        name: "payload_len",
        ty: VAR_U32,
    },
    FieldDef {
        name: "payload",
        ty: FieldTy::Choice {
            tag: |v| v.u64("name_type"),
            arms: &[
                (NAME_SUBSEC_FUNCTION, FieldTy::Struct(StructKind::NameMap)),
                (NAME_SUBSEC_LOCAL, FieldTy::Struct(StructKind::LocalNameMap)),
            ],
            default: None,
        },
    },
];

const NAME_MAP: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "names",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::Naming),
            count: |v| v.u64("count"),
        },
    },
];

const NAMING: &[FieldDef] = &[
    FieldDef {
        name: "index",
        ty: VAR_U32,
    },
    FieldDef {
        name: "name_len",
        ty: VAR_U32,
    },
    FieldDef {
        name: "name_str",
        ty: FieldTy::Bytes {
            len: |v| v.u64("name_len"),
            utf8: true,
        },
    },
];

const LOCAL_NAME_MAP: &[FieldDef] = &[
    FieldDef {
        name: "count",
        ty: VAR_U32,
    },
    FieldDef {
        name: "funcs",
        ty: FieldTy::Repeat {
            elem: &FieldTy::Struct(StructKind::LocalNames),
            count: |v| v.u64("count"),
        },
    },
];

const LOCAL_NAMES: &[FieldDef] = &[
    FieldDef {
        name: "index",
        ty: VAR_U32,
    },
    FieldDef {
        name: "local_map",
        ty: FieldTy::Struct(StructKind::NameMap),
    },
];

impl StructKind {
    /// The declaration-order field table of this structure.
    pub fn fields(self) -> &'static [FieldDef] {
        match self {
            StructKind::ModuleHeader => MODULE_HEADER,
            StructKind::Section => SECTION,
            StructKind::TypeSection => TYPE_SECTION,
            StructKind::FuncType => FUNC_TYPE,
            StructKind::ImportSection => IMPORT_SECTION,
            StructKind::ImportEntry => IMPORT_ENTRY,
            StructKind::FunctionImport => FUNCTION_IMPORT,
            StructKind::TableType => TABLE_TYPE,
            StructKind::ResizableLimits => RESIZABLE_LIMITS,
            StructKind::MemoryType => MEMORY_TYPE,
            StructKind::GlobalType => GLOBAL_TYPE,
            StructKind::FunctionSection => FUNCTION_SECTION,
            StructKind::TableSection => TABLE_SECTION,
            StructKind::MemorySection => MEMORY_SECTION,
            StructKind::GlobalSection => GLOBAL_SECTION,
            StructKind::GlobalEntry => GLOBAL_ENTRY,
            StructKind::ExportSection => EXPORT_SECTION,
            StructKind::ExportEntry => EXPORT_ENTRY,
            StructKind::StartSection => START_SECTION,
            StructKind::ElementSection => ELEMENT_SECTION,
            StructKind::ElementSegment => ELEMENT_SEGMENT,
            StructKind::CodeSection => CODE_SECTION,
            StructKind::FunctionBody => FUNCTION_BODY,
            StructKind::LocalEntry => LOCAL_ENTRY,
            StructKind::DataSection => DATA_SECTION,
            StructKind::DataSegment => DATA_SEGMENT,
            StructKind::DataCountSection => DATA_COUNT_SECTION,
            StructKind::NameSubSection => NAME_SUB_SECTION,
            StructKind::NameMap => NAME_MAP,
            StructKind::Naming => NAMING,
            StructKind::LocalNameMap => LOCAL_NAME_MAP,
            StructKind::LocalNames => LOCAL_NAMES,
        }
    }

    /// Recompute this structure's derived count/length fields from the
    /// current cardinality and byte length of their dependent fields.
    ///
    /// Returns the length delta the recomputation itself introduced (a
    /// derived scalar whose varint encoding grew or shrank), so the fix-up
    /// propagator can carry it into the ancestors above.
    pub(crate) fn fix(self, v: &mut StructValue) -> Result<isize> {
        match self {
            StructKind::Section => {
                let mut delta = 0;
                if v.u64("id") == SEC_CUSTOM {
                    delta += v.set_scalar("name_len", v.cardinality("name") as u64)?;
                }
                let payload_len = v.len_of("name_len")
                    + v.len_of("name")
                    + v.len_of("payload")
                    + v.len_of("overhang");
                delta += v.set_scalar("payload_len", payload_len as u64)?;
                Ok(delta)
            }
            StructKind::TypeSection
            | StructKind::ImportSection
            | StructKind::TableSection
            | StructKind::MemorySection
            | StructKind::ExportSection
            | StructKind::ElementSection
            | StructKind::DataSection => fix_count(v, "entries"),
            StructKind::FunctionSection => fix_count(v, "types"),
            StructKind::GlobalSection => fix_count(v, "globals"),
            StructKind::CodeSection => fix_count(v, "bodies"),
            StructKind::NameMap => fix_count(v, "names"),
            StructKind::LocalNameMap => fix_count(v, "funcs"),
            StructKind::FuncType => {
                let count = v.cardinality("param_types") as u64;
                v.set_scalar("param_count", count)
            }
            StructKind::ImportEntry => {
                let mut delta = v.set_scalar("module_len", v.cardinality("module_str") as u64)?;
                delta += v.set_scalar("field_len", v.cardinality("field_str") as u64)?;
                Ok(delta)
            }
            StructKind::ExportEntry => {
                let count = v.cardinality("field_str") as u64;
                v.set_scalar("field_len", count)
            }
            StructKind::ElementSegment => {
                let count = v.cardinality("elems") as u64;
                v.set_scalar("num_elem", count)
            }
            StructKind::FunctionBody => {
                // Refresh local_count first; its re-encoded length feeds the
                // body_size sum below.
                let mut delta = v.set_scalar("local_count", v.cardinality("locals") as u64)?;
                let body_size = v.len_of("local_count") + v.len_of("locals") + v.len_of("code");
                delta += v.set_scalar("body_size", body_size as u64)?;
                Ok(delta)
            }
            StructKind::DataSegment => {
                let size = v.cardinality("data") as u64;
                v.set_scalar("size", size)
            }
            StructKind::Naming => {
                let len = v.cardinality("name_str") as u64;
                v.set_scalar("name_len", len)
            }
            StructKind::NameSubSection => {
                let len = v.len_of("payload") as u64;
                v.set_scalar("payload_len", len)
            }
            _ => Ok(0),
        }
    }
}

fn fix_count(v: &mut StructValue, list: &str) -> Result<isize> {
    let count = v.cardinality(list) as u64;
    v.set_scalar("count", count)
}

/// Skip one LEB128 operand, capped at the 64-bit group count.
fn skip_leb(buf: &[u8], offset: &mut usize, pos: usize) -> Result<()> {
    for _ in 0..10 {
        let byte = *buf
            .get(*offset)
            .ok_or_else(|| Error::truncated(pos + *offset))?;
        *offset += 1;
        if byte & 0x80 == 0 {
            return Ok(());
        }
    }
    Err(Error::malformed_varint(pos + *offset))
}

/// Scan an init expression: instructions up to and including the terminator
/// opcode. Returns the byte length of the run.
///
/// The scan only needs operand awareness for the opcodes that legally occur
/// in offset/init expressions; anything else is treated as operand-free.
pub(crate) fn scan_expr(buf: &[u8], pos: usize) -> Result<usize> {
    let mut offset = 0;
    loop {
        let opcode = *buf
            .get(offset)
            .ok_or_else(|| Error::truncated(pos + offset))?;
        offset += 1;
        match opcode {
            // end
            0x0b => return Ok(offset),
            // i32.const / i64.const / global.get / ref.func
            0x41 | 0x42 | 0x23 | 0xd2 => skip_leb(buf, &mut offset, pos)?,
            // f32.const
            0x43 => {
                buf.get(offset..offset + 4)
                    .ok_or_else(|| Error::truncated(pos + buf.len()))?;
                offset += 4;
            }
            // f64.const
            0x44 => {
                buf.get(offset..offset + 8)
                    .ok_or_else(|| Error::truncated(pos + buf.len()))?;
                offset += 8;
            }
            // ref.null heap type
            0xd0 => {
                buf.get(offset)
                    .ok_or_else(|| Error::truncated(pos + offset))?;
                offset += 1;
            }
            _ => {}
        }
    }
}

/// A fully decoded module: header plus the section records in file order.
#[derive(Debug, Clone)]
pub struct ModuleValue {
    /// The decoded module header.
    pub header: StructValue,
    /// Decoded section records, in file order.
    pub sections: Vec<StructValue>,
}

impl ModuleValue {
    /// Decode a whole module buffer: the header, then section records until
    /// the buffer is exhausted.
    pub fn decode(buf: &[u8]) -> Result<ModuleValue> {
        let (mut offset, header) = StructValue::decode(StructKind::ModuleHeader, buf)?;
        let mut sections = Vec::new();
        while offset < buf.len() {
            let (len, section) = StructValue::decode_at(StructKind::Section, &buf[offset..], offset)?;
            sections.push(section);
            offset += len;
        }
        Ok(ModuleValue { header, sections })
    }

    /// Re-serialize the module, header first, sections in order.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut sink = Vec::new();
        self.header.encode(&mut sink)?;
        for section in &self.sections {
            section.encode(&mut sink)?;
        }
        Ok(sink)
    }
}

/// Decode the payload of a custom "name" section into its subsections.
pub fn decode_name_section(payload: &[u8]) -> Result<Vec<StructValue>> {
    let mut offset = 0;
    let mut subsections = Vec::new();
    while offset < payload.len() {
        let (len, sub) =
            StructValue::decode_at(StructKind::NameSubSection, &payload[offset..], offset)?;
        subsections.push(sub);
        offset += len;
    }
    Ok(subsections)
}

/// True when this section record is the custom name section.
pub fn is_name_section(section: &StructValue) -> bool {
    section.u64("id") == SEC_CUSTOM
        && matches!(section.value("name"), Some(Value::Bytes(b)) if b == b"name")
}
