//! The QB binary container decoder.
//!
//! QB files are a heterogeneous tree whose structure items cross-reference
//! each other by file-absolute byte offsets. The reader therefore keeps a
//! cursor into the whole file and seeks absolutely when following a
//! pointer; after any value read the cursor snaps to four-byte alignment
//! relative to the file start. Item and struct information words are
//! always little-endian, while every other scalar follows the configured
//! endianness.

use crate::bytes::ByteCursor;
use crate::error::ParseError;

/// Byte order of the scalar fields in a QB file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Little-endian scalars (the PS2 dialect).
    LittleEndian,
    /// Big-endian scalars.
    BigEndian,
}

/// The 28-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QbHeader {
    /// The header flags word.
    pub flags: u32,
    /// The declared file size.
    pub file_size: u32,
}

/// The closed alphabet of QB item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QbItemType {
    /// An array sentinel with no payload.
    StructFlag,
    /// A 32-bit integer.
    Integer,
    /// A 32-bit float.
    Float,
    /// A NUL-terminated byte string.
    String,
    /// A NUL-terminated string of 16-bit units.
    WideString,
    /// A pointer to struct data.
    Struct,
    /// A pointer (or count plus pointer) to array data.
    Array,
    /// A 32-bit checksum key.
    QbKey,
    /// A 32-bit offset.
    Pointer,
}

impl QbItemType {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::StructFlag),
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::String),
            4 => Some(Self::WideString),
            10 => Some(Self::Struct),
            12 => Some(Self::Array),
            13 => Some(Self::QbKey),
            26 => Some(Self::Pointer),
            _ => None,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::StructFlag => 0,
            Self::Integer => 1,
            Self::Float => 2,
            Self::String => 3,
            Self::WideString => 4,
            Self::Struct => 10,
            Self::Array => 12,
            Self::QbKey => 13,
            Self::Pointer => 26,
        }
    }
}

/// The flags and type carried by an item's information word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QbItemInfo {
    /// The flags byte.
    pub flags: u8,
    /// The item type.
    pub kind: QbItemType,
}

/// A decoded QB value.
#[derive(Debug, Clone, PartialEq)]
pub enum QbValue {
    /// A 32-bit integer.
    Int(i32),
    /// A 32-bit float.
    Float(f32),
    /// A checksum key.
    Key(u32),
    /// A raw offset.
    Pointer(u32),
    /// A byte string.
    String(String),
    /// A wide string.
    WideString(String),
    /// Struct data.
    Struct(QbStructData),
    /// An array of values.
    Array(Vec<QbValue>),
}

/// One top-level item: shared header plus its decoded array.
#[derive(Debug, Clone, PartialEq)]
pub struct QbItem {
    /// The information word contents.
    pub info: QbItemInfo,
    /// The item's checksum id.
    pub id: u32,
    /// The checksum of the file the item belongs to.
    pub qb_name: u32,
    /// The decoded payload.
    pub data: QbValue,
}

/// One item inside struct data.
#[derive(Debug, Clone, PartialEq)]
pub struct QbStructItem {
    /// The flags byte of the information word.
    pub flags: u8,
    /// The item type.
    pub kind: QbItemType,
    /// The item's checksum id.
    pub id: u32,
    /// The decoded payload.
    pub data: QbValue,
}

/// Decoded struct data: a marker word plus its chained items.
#[derive(Debug, Clone, PartialEq)]
pub struct QbStructData {
    /// The header marker word.
    pub header_marker: u32,
    /// The items of the struct, in chain order.
    pub items: Vec<QbStructItem>,
}

/// A decoded QB file.
#[derive(Debug, Clone, PartialEq)]
pub struct QbMidi {
    /// The file header.
    pub header: QbHeader,
    /// The top-level items, in file order.
    pub items: Vec<QbItem>,
}

struct QbReader<'a> {
    endianness: Endianness,
    cursor: ByteCursor<'a>,
}

impl QbReader<'_> {
    fn read_u32(&mut self) -> Result<u32, ParseError> {
        match self.endianness {
            Endianness::BigEndian => self.cursor.read_u32_be(),
            Endianness::LittleEndian => self.cursor.read_u32_le(),
        }
    }

    fn read_i32(&mut self) -> Result<i32, ParseError> {
        match self.endianness {
            Endianness::BigEndian => self.cursor.read_i32_be(),
            Endianness::LittleEndian => self.cursor.read_i32_le(),
        }
    }

    fn read_f32(&mut self) -> Result<f32, ParseError> {
        match self.endianness {
            Endianness::BigEndian => self.cursor.read_f32_be(),
            Endianness::LittleEndian => self.cursor.read_f32_le(),
        }
    }

    fn read_u16(&mut self) -> Result<u16, ParseError> {
        match self.endianness {
            Endianness::BigEndian => self.cursor.read_u16_be(),
            Endianness::LittleEndian => self.cursor.read_u16_le(),
        }
    }

    /// The information words are little-endian in both dialects.
    fn read_le_u32(&mut self) -> Result<u32, ParseError> {
        self.cursor.read_u32_le()
    }

    fn struct_item_type(&self, code: u8) -> Result<QbItemType, ParseError> {
        if self.endianness == Endianness::BigEndian {
            return QbItemType::from_code(code)
                .ok_or(ParseError::UnexpectedQbItemType { code });
        }
        match code {
            3 => Ok(QbItemType::Integer),
            5 => Ok(QbItemType::Float),
            7 => Ok(QbItemType::String),
            21 => Ok(QbItemType::Struct),
            27 => Ok(QbItemType::QbKey),
            53 => Ok(QbItemType::Pointer),
            _ => Err(ParseError::UnexpectedQbStructItemType { code }),
        }
    }

    fn read_header(&mut self) -> Result<QbHeader, ParseError> {
        const REST_OF_HEADER_SIZE: usize = 20;

        let flags = self.read_u32()?;
        let file_size = self.read_u32()?;
        self.cursor.skip(REST_OF_HEADER_SIZE)?;
        Ok(QbHeader { flags, file_size })
    }

    fn read_item_info(&mut self) -> Result<QbItemInfo, ParseError> {
        let info = self.read_le_u32()?;
        let flags = (info >> 8) as u8;
        let code = ((info >> 16) & 0x7F) as u8;
        let kind =
            QbItemType::from_code(code).ok_or(ParseError::UnexpectedQbItemType { code })?;
        Ok(QbItemInfo { flags, kind })
    }

    fn read_item(&mut self) -> Result<QbItem, ParseError> {
        let info = self.read_item_info()?;
        let id = self.read_u32()?;
        let qb_name = self.read_u32()?;
        // Only arrays carry an item-level value; everything else cannot
        // head a top-level item.
        if info.kind != QbItemType::Array {
            return Err(ParseError::UnexpectedQbTopLevelItem {
                code: info.kind.code(),
            });
        }
        let _array_pointer = self.read_u32()?;
        self.cursor.skip(4)?;
        let data = self.read_value(info.kind, None)?;
        Ok(QbItem {
            info,
            id,
            qb_name,
            data,
        })
    }

    fn read_simple_value(&mut self, kind: QbItemType) -> Result<QbValue, ParseError> {
        match kind {
            QbItemType::Integer => Ok(QbValue::Int(self.read_i32()?)),
            QbItemType::Float => Ok(QbValue::Float(self.read_f32()?)),
            QbItemType::QbKey => Ok(QbValue::Key(self.read_u32()?)),
            QbItemType::Pointer
            | QbItemType::String
            | QbItemType::Struct
            | QbItemType::WideString => Ok(QbValue::Pointer(self.read_u32()?)),
            QbItemType::Array | QbItemType::StructFlag => Err(ParseError::UnexpectedQbValue {
                code: kind.code(),
            }),
        }
    }

    fn read_value(
        &mut self,
        kind: QbItemType,
        simple_value: Option<QbValue>,
    ) -> Result<QbValue, ParseError> {
        let value = match kind {
            QbItemType::Float | QbItemType::Integer | QbItemType::Pointer | QbItemType::QbKey => {
                simple_value.ok_or(ParseError::UnexpectedQbValue { code: kind.code() })?
            }
            QbItemType::Array => QbValue::Array(self.read_array_node()?),
            QbItemType::String => QbValue::String(self.read_string()?),
            QbItemType::Struct => QbValue::Struct(self.read_struct_data()?),
            QbItemType::WideString => QbValue::WideString(self.read_widestring()?),
            QbItemType::StructFlag => {
                return Err(ParseError::UnexpectedQbValue { code: kind.code() });
            }
        };
        self.cursor.align_to_four();
        Ok(value)
    }

    fn read_string(&mut self) -> Result<String, ParseError> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.cursor.pop()?;
            if byte == 0 {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.push(byte);
        }
    }

    fn read_widestring(&mut self) -> Result<String, ParseError> {
        let mut units = Vec::new();
        loop {
            let unit = self.read_u16()?;
            if unit == 0 {
                return Ok(String::from_utf16_lossy(&units));
            }
            units.push(unit);
        }
    }

    fn read_struct_data(&mut self) -> Result<QbStructData, ParseError> {
        let header_marker = self.read_u32()?;
        let item_offset = self.read_u32()?;

        let mut items = Vec::new();
        let mut next_item = item_offset;
        while next_item != 0 {
            self.cursor.seek(next_item as usize);
            let (item, next) = self.read_struct_item()?;
            items.push(item);
            next_item = next;
        }

        Ok(QbStructData {
            header_marker,
            items,
        })
    }

    fn read_struct_info(&mut self) -> Result<(u8, QbItemType), ParseError> {
        let info = self.read_le_u32()?;
        let flags = (info >> 8) as u8;
        let mut info_byte = flags;
        let second_info_byte = (info >> 16) as u8;
        if info_byte == 1 && second_info_byte != 0 {
            info_byte = second_info_byte;
        }
        let kind = self.struct_item_type(info_byte & 0x7F)?;
        Ok((flags, kind))
    }

    fn read_struct_item(&mut self) -> Result<(QbStructItem, u32), ParseError> {
        let (flags, kind) = self.read_struct_info()?;
        let id = self.read_u32()?;
        let simple_value = self.read_simple_value(kind)?;
        let next_item = self.read_u32()?;
        let data = self.read_value(kind, Some(simple_value))?;
        Ok((
            QbStructItem {
                flags,
                kind,
                id,
                data,
            },
            next_item,
        ))
    }

    fn read_array_node(&mut self) -> Result<Vec<QbValue>, ParseError> {
        let first_item = self.read_item_info()?;
        let item_count = self.read_u32()? as usize;
        let mut array = Vec::with_capacity(item_count);

        match first_item.kind {
            QbItemType::StructFlag => {
                self.cursor.skip(4)?;
            }
            QbItemType::Integer => {
                if item_count > 1 {
                    let list_start = self.read_u32()?;
                    self.cursor.seek(list_start as usize);
                }
                for _ in 0..item_count {
                    array.push(QbValue::Int(self.read_i32()?));
                }
            }
            QbItemType::Struct => {
                let start_list = self.read_pointer_list(item_count)?;
                for start in start_list {
                    self.cursor.seek(start as usize);
                    array.push(QbValue::Struct(self.read_struct_data()?));
                }
            }
            QbItemType::Array => {
                let start_list = self.read_pointer_list(item_count)?;
                for start in start_list {
                    self.cursor.seek(start as usize);
                    array.push(QbValue::Array(self.read_array_node()?));
                }
            }
            QbItemType::Float
            | QbItemType::Pointer
            | QbItemType::QbKey
            | QbItemType::String
            | QbItemType::WideString => {
                return Err(ParseError::UnexpectedQbArrayElement {
                    code: first_item.kind.code(),
                });
            }
        }

        Ok(array)
    }

    /// Reads the element-offset list of a struct or array node: a single
    /// element's body offset when `item_count` is one, otherwise a pointer
    /// to `item_count` further offsets.
    fn read_pointer_list(&mut self, item_count: usize) -> Result<Vec<u32>, ParseError> {
        let list_start = self.read_u32()?;
        self.cursor.seek(list_start as usize);
        if item_count == 1 {
            return Ok(vec![list_start]);
        }
        let mut starts = Vec::with_capacity(item_count);
        for _ in 0..item_count {
            starts.push(self.read_u32()?);
        }
        Ok(starts)
    }
}

/// Decodes a QB file with the given endianness.
///
/// # Errors
///
/// Fails with a [`ParseError`] on truncated input, type codes outside the
/// closed alphabet, or trailing bytes that cannot form an item.
pub fn parse_qb(data: &[u8], endianness: Endianness) -> Result<QbMidi, ParseError> {
    let mut reader = QbReader {
        endianness,
        cursor: ByteCursor::new(data),
    };
    let header = reader.read_header()?;
    let mut items = Vec::new();
    while !reader.cursor.is_at_end() {
        items.push(reader.read_item()?);
    }
    Ok(QbMidi { header, items })
}
