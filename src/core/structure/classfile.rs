// src/core/structure/classfile.rs
//! Minimal class-file header decoder.
//!
//! Only the parts needed for the class graph are read: the constant pool (to
//! resolve names), access flags, this/super class and the interface list.
//! Fields, methods and attributes are never touched.

use crate::error::{Result, StrataError};

const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;

/// Header of one compiled class; names use `/` as the package separator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
}

impl ClassHeader {
    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags & ACC_ANNOTATION != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }

    /// `Outer$1` style classes
    pub fn is_anonymous(&self) -> bool {
        self.this_class
            .rsplit_once('$')
            .map(|(_, tail)| !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    Other,
    /// Second slot of a Long or Double
    Unusable,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len()).ok_or_else(|| {
            StrataError::ClasspathScanFailed(format!("class file truncated at byte {}", self.pos))
        })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode the header of a class file
pub fn parse(bytes: &[u8]) -> Result<ClassHeader> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.u32()?;
    if magic != MAGIC {
        return Err(StrataError::ClasspathScanFailed(format!("bad magic 0x{:08X}", magic)));
    }
    cursor.take(4)?; // minor, major

    let pool = read_constant_pool(&mut cursor)?;

    let access_flags = cursor.u16()?;
    let this_class = class_name(&pool, cursor.u16()?)?;
    let super_index = cursor.u16()?;
    let super_class = if super_index == 0 {
        None
    } else {
        Some(class_name(&pool, super_index)?)
    };

    let count = cursor.u16()?;
    let mut interfaces = Vec::with_capacity(count as usize);
    for _ in 0..count {
        interfaces.push(class_name(&pool, cursor.u16()?)?);
    }

    Ok(ClassHeader {
        access_flags,
        this_class,
        super_class,
        interfaces,
    })
}

fn read_constant_pool(cursor: &mut Cursor) -> Result<Vec<Constant>> {
    let count = cursor.u16()? as usize;
    // Index 0 is unused
    let mut pool = vec![Constant::Unusable];

    while pool.len() < count {
        let tag = cursor.u8()?;
        match tag {
            1 => {
                let len = cursor.u16()? as usize;
                let raw = cursor.take(len)?;
                pool.push(Constant::Utf8(String::from_utf8_lossy(raw).into_owned()));
            }
            7 => pool.push(Constant::Class(cursor.u16()?)),
            3 | 4 => {
                cursor.take(4)?;
                pool.push(Constant::Other);
            }
            5 | 6 => {
                cursor.take(8)?;
                pool.push(Constant::Other);
                pool.push(Constant::Unusable);
            }
            8 | 16 | 19 | 20 => {
                cursor.take(2)?;
                pool.push(Constant::Other);
            }
            9 | 10 | 11 | 12 | 17 | 18 => {
                cursor.take(4)?;
                pool.push(Constant::Other);
            }
            15 => {
                cursor.take(3)?;
                pool.push(Constant::Other);
            }
            other => {
                return Err(StrataError::ClasspathScanFailed(format!(
                    "unknown constant pool tag {} at entry {}",
                    other,
                    pool.len()
                )))
            }
        }
    }

    Ok(pool)
}

fn class_name(pool: &[Constant], index: u16) -> Result<String> {
    let name_index = match pool.get(index as usize) {
        Some(Constant::Class(name_index)) => *name_index,
        _ => {
            return Err(StrataError::ClasspathScanFailed(format!(
                "constant {} is not a class reference",
                index
            )))
        }
    };

    match pool.get(name_index as usize) {
        Some(Constant::Utf8(name)) => Ok(name.clone()),
        _ => Err(StrataError::ClasspathScanFailed(format!(
            "constant {} is not a UTF-8 name",
            name_index
        ))),
    }
}

/// Builds class-file headers byte by byte for tests
#[cfg(test)]
pub(crate) fn synthesize(access_flags: u16, this: &str, superclass: Option<&str>, interfaces: &[&str]) -> Vec<u8> {
    let mut pool: Vec<Vec<u8>> = Vec::new();
    let add_class = |pool: &mut Vec<Vec<u8>>, name: &str| -> u16 {
        let mut utf8 = vec![1u8];
        utf8.extend((name.len() as u16).to_be_bytes());
        utf8.extend(name.as_bytes());
        pool.push(utf8);
        let name_index = pool.len() as u16;
        let mut class = vec![7u8];
        class.extend(name_index.to_be_bytes());
        pool.push(class);
        pool.len() as u16
    };

    // A Long constant first, so the two-slot rule is exercised
    let mut long = vec![5u8];
    long.extend(42u64.to_be_bytes());
    pool.push(long);
    pool.push(Vec::new());

    let this_index = add_class(&mut pool, this);
    let super_index = superclass.map(|s| add_class(&mut pool, s)).unwrap_or(0);
    let interface_indexes: Vec<u16> = interfaces.iter().map(|i| add_class(&mut pool, *i)).collect();

    let mut bytes: Vec<u8> = Vec::new();
    bytes.extend(MAGIC.to_be_bytes());
    bytes.extend([0u8, 0, 0, 52]);
    bytes.extend(((pool.len() + 1) as u16).to_be_bytes());
    for entry in &pool {
        bytes.extend(entry);
    }
    bytes.extend(access_flags.to_be_bytes());
    bytes.extend(this_index.to_be_bytes());
    bytes.extend(super_index.to_be_bytes());
    bytes.extend((interface_indexes.len() as u16).to_be_bytes());
    for index in interface_indexes {
        bytes.extend(index.to_be_bytes());
    }
    // fields, methods, attributes
    bytes.extend([0u8; 6]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let bytes = synthesize(
            0x0021,
            "com/acme/OrderService",
            Some("com/acme/BaseService"),
            &["com/acme/Auditable", "java/io/Serializable"],
        );

        let header = parse(&bytes).unwrap();
        assert_eq!(header.this_class, "com/acme/OrderService");
        assert_eq!(header.super_class.as_deref(), Some("com/acme/BaseService"));
        assert_eq!(header.interfaces, vec!["com/acme/Auditable", "java/io/Serializable"]);
        assert!(!header.is_interface());
    }

    #[test]
    fn test_flags() {
        let header = parse(&synthesize(0x0601, "com/acme/Port", Some("java/lang/Object"), &[])).unwrap();
        assert!(header.is_interface());

        let anon = parse(&synthesize(0x0020, "com/acme/Outer$1", Some("java/lang/Object"), &[])).unwrap();
        assert!(anon.is_anonymous());

        let inner = parse(&synthesize(0x0020, "com/acme/Outer$Inner", Some("java/lang/Object"), &[])).unwrap();
        assert!(!inner.is_anonymous());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = synthesize(0x0021, "A", None, &[]);
        bytes[0] = 0xDE;
        assert!(matches!(parse(&bytes), Err(StrataError::ClasspathScanFailed(_))));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let bytes = synthesize(0x0021, "com/acme/A", Some("java/lang/Object"), &[]);
        assert!(parse(&bytes[..bytes.len() / 2]).is_err());
    }
}
