//! Binary FBX node-record reader.
//!
//! Layout: a 27-byte header (`"Kaydara FBX Binary  \0"`, `0x1A 0x00`, u32
//! version) followed by nested node records. Record headers use u32 fields
//! before version 7500 and u64 fields from 7500 on. A record whose header is
//! all zero terminates a child list.

use std::io::Read;

use flate2::read::ZlibDecoder;

pub(crate) const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const HEADER_LEN: usize = 27;
const WIDE_HEADER_VERSION: u32 = 7500;
/// Deepest record nesting accepted; real exporters stay in single digits.
pub(crate) const MAX_RECORD_DEPTH: usize = 128;

/// One typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Property::I16(v) => Some(v.into()),
            Property::I32(v) => Some(v.into()),
            Property::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Property::F32(v) => Some(v.into()),
            Property::F64(v) => Some(v),
            Property::I16(v) => Some(v.into()),
            Property::I32(v) => Some(v.into()),
            Property::I64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    /// Float array widened to f64.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Property::F64Array(v) => Some(v.clone()),
            Property::F32Array(v) => Some(v.iter().map(|&x| x.into()).collect()),
            _ => None,
        }
    }

    /// Integer array widened to i64.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Property::I32Array(v) => Some(v.iter().map(|&x| x.into()).collect()),
            Property::I64Array(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// A node record with its properties and nested records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }
}

/// A whole binary FBX file.
#[derive(Debug, Clone, Default)]
pub struct FbxDocument {
    pub version: u32,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    pub fn node(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Parse a binary FBX file into its node tree.
pub fn parse_binary(bytes: &[u8]) -> Result<FbxDocument, String> {
    if !is_binary(bytes) {
        return Err("missing binary FBX signature".into());
    }
    let mut cursor = Cursor::new(bytes);
    cursor.seek(MAGIC.len() + 2)?;
    let version = cursor.u32()?;
    debug_assert_eq!(cursor.pos, HEADER_LEN);

    let file_end = bytes.len();
    let mut nodes = Vec::new();
    while cursor.remaining() > 0 {
        match read_node(&mut cursor, version, file_end, 0)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }
    Ok(FbxDocument { version, nodes })
}

fn read_node(
    cursor: &mut Cursor<'_>,
    version: u32,
    parent_end: usize,
    depth: usize,
) -> Result<Option<FbxNode>, String> {
    let start = cursor.pos;
    if depth > MAX_RECORD_DEPTH {
        return Err(format!(
            "node records nested deeper than {MAX_RECORD_DEPTH} at offset {start}"
        ));
    }
    let (end, property_count, property_len) = if version >= WIDE_HEADER_VERSION {
        (cursor.u64()?, cursor.u64()?, cursor.u64()?)
    } else {
        (
            u64::from(cursor.u32()?),
            u64::from(cursor.u32()?),
            u64::from(cursor.u32()?),
        )
    };
    let name_len = usize::from(cursor.u8()?);

    if end == 0 && property_count == 0 && property_len == 0 && name_len == 0 {
        return Ok(None);
    }

    let end = usize::try_from(end).map_err(|_| "node end offset overflows".to_string())?;
    if end > parent_end || end <= start {
        return Err(format!("node record at offset {start} has invalid end offset {end}"));
    }

    let name = String::from_utf8_lossy(cursor.take(name_len)?).into_owned();
    let properties_start = cursor.pos;
    let mut properties = Vec::new();
    for _ in 0..property_count {
        properties.push(read_property(cursor)?);
    }
    let properties_end = properties_start
        .checked_add(usize::try_from(property_len).map_err(|_| "property length overflows")?)
        .ok_or("property length overflows")?;
    if properties_end > end {
        return Err(format!("properties of {name:?} overrun their record"));
    }
    cursor.seek(properties_end)?;

    let mut children = Vec::new();
    while cursor.pos < end {
        match read_node(cursor, version, end, depth + 1)? {
            Some(child) => children.push(child),
            None => break,
        }
    }
    cursor.seek(end)?;

    Ok(Some(FbxNode {
        name,
        properties,
        children,
    }))
}

fn read_property(cursor: &mut Cursor<'_>) -> Result<Property, String> {
    let type_code = cursor.u8()?;
    Ok(match type_code {
        b'C' => Property::Bool(cursor.u8()? != 0),
        b'Y' => Property::I16(i16::from_le_bytes(cursor.array()?)),
        b'I' => Property::I32(i32::from_le_bytes(cursor.array()?)),
        b'L' => Property::I64(i64::from_le_bytes(cursor.array()?)),
        b'F' => Property::F32(f32::from_le_bytes(cursor.array()?)),
        b'D' => Property::F64(f64::from_le_bytes(cursor.array()?)),
        b'S' => {
            let len = cursor.u32()? as usize;
            Property::String(String::from_utf8_lossy(cursor.take(len)?).into_owned())
        }
        b'R' => {
            let len = cursor.u32()? as usize;
            Property::Raw(cursor.take(len)?.to_vec())
        }
        b'b' => Property::BoolArray(read_array(cursor, 1)?.iter().map(|&b| b != 0).collect()),
        b'i' => Property::I32Array(decode_le(&read_array(cursor, 4)?, i32::from_le_bytes)),
        b'l' => Property::I64Array(decode_le(&read_array(cursor, 8)?, i64::from_le_bytes)),
        b'f' => Property::F32Array(decode_le(&read_array(cursor, 4)?, f32::from_le_bytes)),
        b'd' => Property::F64Array(decode_le(&read_array(cursor, 8)?, f64::from_le_bytes)),
        other => {
            return Err(format!(
                "unknown property type {:?} at offset {}",
                char::from(other),
                cursor.pos - 1
            ))
        }
    })
}

/// Array payload bytes, inflating zlib-compressed arrays.
fn read_array(cursor: &mut Cursor<'_>, element_size: usize) -> Result<Vec<u8>, String> {
    let count = cursor.u32()? as usize;
    let encoding = cursor.u32()?;
    let stored_len = cursor.u32()? as usize;
    let expected = count
        .checked_mul(element_size)
        .ok_or("array length overflows")?;
    let stored = cursor.take(stored_len)?;

    let bytes = match encoding {
        0 => stored.to_vec(),
        1 => {
            let mut out = Vec::with_capacity(expected.min(stored_len.saturating_mul(16)));
            ZlibDecoder::new(stored)
                .take(expected as u64)
                .read_to_end(&mut out)
                .map_err(|e| format!("cannot inflate array: {e}"))?;
            out
        }
        other => return Err(format!("unknown array encoding {other}")),
    };
    if bytes.len() != expected {
        return Err(format!(
            "array holds {} bytes, expected {expected}",
            bytes.len()
        ));
    }
    Ok(bytes)
}

fn decode_le<T, const N: usize>(bytes: &[u8], f: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0_u8; N];
            buf.copy_from_slice(chunk);
            f(buf)
        })
        .collect()
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn seek(&mut self, pos: usize) -> Result<(), String> {
        if pos > self.data.len() {
            return Err(format!("offset {pos} is past the end of the file"));
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| format!("unexpected end of file at offset {}", self.pos))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut buf = [0_u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FbxNode> {
        vec![
            FbxNode {
                name: "FBXHeaderExtension".into(),
                properties: vec![],
                children: vec![FbxNode {
                    name: "FBXVersion".into(),
                    properties: vec![Property::I32(7400)],
                    children: vec![],
                }],
            },
            FbxNode {
                name: "Geometry".into(),
                properties: vec![
                    Property::I64(42),
                    Property::String("Cube\0\u{1}Geometry".into()),
                    Property::F64Array(vec![0.0, 1.5, -2.0]),
                    Property::I32Array(vec![0, 1, -3]),
                ],
                children: vec![],
            },
        ]
    }

    #[test]
    fn reads_narrow_headers_before_7500() {
        let doc = parse_binary(&writer::encode(7400, &sample())).expect("parse");
        assert_eq!(doc.version, 7400);
        assert_eq!(doc.nodes, sample());
    }

    #[test]
    fn reads_wide_headers_from_7500() {
        let doc = parse_binary(&writer::encode(7500, &sample())).expect("parse");
        assert_eq!(doc.version, 7500);
        assert_eq!(doc.nodes, sample());
    }

    #[test]
    fn compressed_double_arrays_are_inflated() {
        let doc = parse_binary(&writer::encode(7400, &sample())).expect("parse");
        let geometry = doc.node("Geometry").expect("geometry");
        assert_eq!(
            geometry.property(2).and_then(Property::to_f64_vec),
            Some(vec![0.0, 1.5, -2.0])
        );
    }

    /// Header plus `depth` empty records, each claiming to end at EOF.
    fn nested_empty_records(depth: usize) -> Vec<u8> {
        let total = HEADER_LEN + depth * 13;
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0x1A, 0x00]);
        bytes.extend_from_slice(&7400_u32.to_le_bytes());
        for _ in 0..depth {
            bytes.extend_from_slice(&(total as u32).to_le_bytes());
            bytes.extend_from_slice(&[0; 9]);
        }
        bytes
    }

    #[test]
    fn deeply_nested_records_are_rejected() {
        let err = parse_binary(&nested_empty_records(100_000)).expect_err("too deep");
        assert!(err.contains("nested deeper"), "got {err}");
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let doc = parse_binary(&nested_empty_records(MAX_RECORD_DEPTH)).expect("parse");
        assert_eq!(doc.nodes.len(), 1);
    }

    #[test]
    fn child_record_may_not_outrun_its_parent() {
        let mut bytes = writer::encode(7400, &sample());
        // FBXVersion is the first child of the first record; its end field
        // sits right after the parent's 13-byte header and 18-byte name.
        let child_end_at = HEADER_LEN + 13 + "FBXHeaderExtension".len();
        let file_len = bytes.len() as u32;
        bytes[child_end_at..child_end_at + 4].copy_from_slice(&file_len.to_le_bytes());
        let err = parse_binary(&bytes).expect_err("child overruns parent");
        assert!(err.contains("invalid end offset"), "got {err}");
    }

    #[test]
    fn ascii_text_is_not_binary() {
        assert!(!is_binary(b"; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n"));
        assert!(parse_binary(b"; FBX 7.4.0 project file").is_err());
    }

    #[test]
    fn truncated_files_are_rejected() {
        let mut bytes = writer::encode(7400, &sample());
        bytes.truncate(bytes.len() - 40);
        assert!(parse_binary(&bytes).is_err());
    }
}
