//! Typed binary arrays inside block payloads.
//!
//! A datatype code is one character selecting width and signedness, optionally followed
//! by `<` (little-endian) or `>` (big-endian). Without a suffix, big-endian (network
//! order) is used.
//!
//! | code | element |
//! |------|---------|
//! | `b` / `B` | 8-bit signed / unsigned |
//! | `h` / `H` | 16-bit signed / unsigned |
//! | `i` / `I` | 32-bit signed / unsigned |
//! | `f` | 32-bit float (default) |
//! | `d` | 64-bit float |
use std::{fmt::Display, str::FromStr};

use crate::error::FormatError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        !matches!(self, ElementType::U8 | ElementType::U16 | ElementType::U32)
    }

    fn code(&self) -> char {
        match self {
            ElementType::I8 => 'b',
            ElementType::U8 => 'B',
            ElementType::I16 => 'h',
            ElementType::U16 => 'H',
            ElementType::I32 => 'i',
            ElementType::U32 => 'I',
            ElementType::F32 => 'f',
            ElementType::F64 => 'd',
        }
    }
}

/// Element type plus byte order. Parsed from codes such as `"h<"` or `"d"`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BinaryFormat {
    element: ElementType,
    endianness: Endianness,
}

impl Default for BinaryFormat {
    fn default() -> Self {
        BinaryFormat::new(ElementType::F32, Endianness::Big)
    }
}

impl BinaryFormat {
    pub const fn new(element: ElementType, endianness: Endianness) -> BinaryFormat {
        BinaryFormat {
            element,
            endianness,
        }
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Decodes as many whole elements as `bytes` holds. Trailing bytes are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Vec<f64> {
        let size = self.element.size();
        bytes
            .chunks_exact(size)
            .map(|chunk| self.decode_element(chunk))
            .collect()
    }

    /// Encodes `values`. Integer formats truncate toward zero and saturate at the
    /// bounds of the element type.
    pub fn encode(&self, values: &[f64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(values.len() * self.element.size());
        for value in values {
            self.encode_element(*value, &mut out);
        }
        out
    }

    fn decode_element(&self, chunk: &[u8]) -> f64 {
        macro_rules! decode {
            ($ty:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(chunk);
                match self.endianness {
                    Endianness::Big => <$ty>::from_be_bytes(raw) as f64,
                    Endianness::Little => <$ty>::from_le_bytes(raw) as f64,
                }
            }};
        }
        match self.element {
            ElementType::I8 => decode!(i8),
            ElementType::U8 => decode!(u8),
            ElementType::I16 => decode!(i16),
            ElementType::U16 => decode!(u16),
            ElementType::I32 => decode!(i32),
            ElementType::U32 => decode!(u32),
            ElementType::F32 => decode!(f32),
            ElementType::F64 => decode!(f64),
        }
    }

    fn encode_element(&self, value: f64, out: &mut Vec<u8>) {
        macro_rules! encode {
            ($ty:ty) => {{
                let value = value as $ty;
                match self.endianness {
                    Endianness::Big => out.extend_from_slice(&value.to_be_bytes()),
                    Endianness::Little => out.extend_from_slice(&value.to_le_bytes()),
                }
            }};
        }
        match self.element {
            ElementType::I8 => encode!(i8),
            ElementType::U8 => encode!(u8),
            ElementType::I16 => encode!(i16),
            ElementType::U16 => encode!(u16),
            ElementType::I32 => encode!(i32),
            ElementType::U32 => encode!(u32),
            ElementType::F32 => encode!(f32),
            ElementType::F64 => encode!(f64),
        }
    }
}

impl FromStr for BinaryFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || FormatError::UnknownDatatype(s.to_string());
        let mut chars = s.chars();
        let element = match chars.next().ok_or_else(unknown)? {
            'b' => ElementType::I8,
            'B' => ElementType::U8,
            'h' => ElementType::I16,
            'H' => ElementType::U16,
            'i' => ElementType::I32,
            'I' => ElementType::U32,
            'f' => ElementType::F32,
            'd' => ElementType::F64,
            _ => return Err(unknown()),
        };
        let endianness = match chars.next() {
            None | Some('>') => Endianness::Big,
            Some('<') => Endianness::Little,
            Some(_) => return Err(unknown()),
        };
        if chars.next().is_some() {
            return Err(unknown());
        }
        Ok(BinaryFormat::new(element, endianness))
    }
}

impl Display for BinaryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.endianness {
            Endianness::Big => write!(f, "{}", self.element.code()),
            Endianness::Little => write!(f, "{}<", self.element.code()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn format(code: &str) -> BinaryFormat {
        code.parse().unwrap()
    }

    #[test]
    fn parse_codes() {
        assert_eq!(format("h<").element(), ElementType::I16);
        assert_eq!(format("h<").endianness(), Endianness::Little);
        assert_eq!(format("H").endianness(), Endianness::Big);
        assert_eq!(format("I>").element(), ElementType::U32);
        assert_eq!(BinaryFormat::default(), format("f"));
        for bad in ["", "x", "h<<", "q", "f!"] {
            assert!(bad.parse::<BinaryFormat>().is_err(), "{bad}");
        }
    }

    #[test]
    fn display_is_code() {
        for code in ["b", "B", "h", "H<", "i<", "I", "f<", "d"] {
            assert_eq!(format(code).to_string(), code);
        }
    }

    #[test]
    fn decode_byte_order() {
        assert_eq!(format("h").decode(&[0x01, 0x02]), vec![258.0]);
        assert_eq!(format("h<").decode(&[0x01, 0x02]), vec![513.0]);
        assert_eq!(format("b").decode(&[0xFF]), vec![-1.0]);
        assert_eq!(format("B").decode(&[0xFF]), vec![255.0]);
        assert_eq!(
            format("f").decode(&1.5f32.to_be_bytes()),
            vec![1.5]
        );
    }

    #[test]
    fn decode_truncates_partial_element() {
        assert_eq!(format("H<").decode(&[0x01, 0x00, 0x02]), vec![1.0]);
        assert!(format("d").decode(&[0; 7]).is_empty());
    }

    #[test]
    fn encode_then_decode_preserves_values() {
        let integers = [-3.0, 0.0, 7.0, 100.0];
        for code in ["b", "h", "h<", "i", "i<"] {
            assert_eq!(format(code).decode(&format(code).encode(&integers)), integers);
        }
        let unsigned = [0.0, 1.0, 200.0];
        for code in ["B", "H", "H<", "I", "I<"] {
            assert_eq!(format(code).decode(&format(code).encode(&unsigned)), unsigned);
        }
        let floats = [-1.25, 0.1, 3.5e3];
        for code in ["f", "f<", "d", "d<"] {
            let decoded = format(code).decode(&format(code).encode(&floats));
            for (a, b) in decoded.iter().zip(floats) {
                assert!((a - b).abs() < 1e-6, "{code}: {a} != {b}");
            }
        }
    }

    #[test]
    fn encode_saturates_integers() {
        assert_eq!(format("B").encode(&[300.0, -5.0]), vec![255, 0]);
    }
}
