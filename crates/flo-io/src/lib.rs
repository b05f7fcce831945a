#![forbid(unsafe_code)]

//! `.npy` container codec for fixture vectors.
//!
//! Only the subset the fixture pipeline needs is supported: little-endian
//! numeric payloads (integer pivots, real and complex floats), C or Fortran
//! order flags, and header versions 1.0 through 3.0.

use core::fmt;
use num_complex::Complex;
use std::path::Path;

pub const NPY_MAGIC_PREFIX: [u8; 6] = [0x93, b'N', b'U', b'M', b'P', b'Y'];
pub const NPY_HEADER_ALIGNMENT: usize = 64;
pub const MAX_HEADER_BYTES: usize = 65_536;
pub const MAX_SHAPE_RANK: usize = 32;

pub const IO_REASON_CODES: [&str; 7] = [
    "io_magic_invalid",
    "io_header_schema_invalid",
    "io_dtype_descriptor_invalid",
    "io_write_contract_violation",
    "io_read_payload_incomplete",
    "io_element_type_mismatch",
    "io_file_access_failed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NpyDType {
    I32,
    I64,
    F32,
    F64,
    C64,
    C128,
}

impl NpyDType {
    #[must_use]
    pub const fn descr(self) -> &'static str {
        match self {
            Self::I32 => "<i4",
            Self::I64 => "<i8",
            Self::F32 => "<f4",
            Self::F64 => "<f8",
            Self::C64 => "<c8",
            Self::C128 => "<c16",
        }
    }

    pub fn decode(descr: &str) -> Result<Self, IOError> {
        match descr {
            "<i4" => Ok(Self::I32),
            "<i8" => Ok(Self::I64),
            "<f4" => Ok(Self::F32),
            "<f8" => Ok(Self::F64),
            "<c8" => Ok(Self::C64),
            "<c16" => Ok(Self::C128),
            _ => Err(IOError::DTypeDescriptorInvalid),
        }
    }

    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 | Self::C64 => 8,
            Self::C128 => 16,
        }
    }

    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::C64 | Self::C128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IOError {
    MagicInvalid,
    HeaderSchemaInvalid(&'static str),
    DTypeDescriptorInvalid,
    WriteContractViolation(&'static str),
    ReadPayloadIncomplete(&'static str),
    ElementTypeMismatch {
        expected: NpyDType,
        found: NpyDType,
    },
    FileAccessFailed(&'static str),
}

impl IOError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MagicInvalid => "io_magic_invalid",
            Self::HeaderSchemaInvalid(_) => "io_header_schema_invalid",
            Self::DTypeDescriptorInvalid => "io_dtype_descriptor_invalid",
            Self::WriteContractViolation(_) => "io_write_contract_violation",
            Self::ReadPayloadIncomplete(_) => "io_read_payload_incomplete",
            Self::ElementTypeMismatch { .. } => "io_element_type_mismatch",
            Self::FileAccessFailed(_) => "io_file_access_failed",
        }
    }
}

impl fmt::Display for IOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MagicInvalid => write!(f, "invalid or unsupported npy magic/version"),
            Self::HeaderSchemaInvalid(msg) => write!(f, "{msg}"),
            Self::DTypeDescriptorInvalid => write!(f, "dtype descriptor is invalid or unsupported"),
            Self::WriteContractViolation(msg) => write!(f, "{msg}"),
            Self::ReadPayloadIncomplete(msg) => write!(f, "{msg}"),
            Self::ElementTypeMismatch { expected, found } => write!(
                f,
                "element type mismatch: expected {} found {}",
                expected.descr(),
                found.descr()
            ),
            Self::FileAccessFailed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for IOError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    pub descr: NpyDType,
}

impl NpyHeader {
    #[must_use]
    pub fn c_order(shape: &[usize], descr: NpyDType) -> Self {
        Self {
            shape: shape.to_vec(),
            fortran_order: false,
            descr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyArrayBytes {
    pub version: (u8, u8),
    pub header: NpyHeader,
    /// Elements described by the header, checked against the payload length.
    pub element_count: usize,
    pub payload: Vec<u8>,
}

/// Scalar types with a fixed little-endian `.npy` encoding.
pub trait NpyElement: Copy {
    const DTYPE: NpyDType;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` holds exactly `DTYPE.item_size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_npy_primitive {
    ($ty:ty, $dtype:expr, $width:literal) => {
        impl NpyElement for $ty {
            const DTYPE: NpyDType = $dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $width];
                raw.copy_from_slice(&bytes[..$width]);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

impl_npy_primitive!(i32, NpyDType::I32, 4);
impl_npy_primitive!(i64, NpyDType::I64, 8);
impl_npy_primitive!(f32, NpyDType::F32, 4);
impl_npy_primitive!(f64, NpyDType::F64, 8);

impl NpyElement for Complex<f32> {
    const DTYPE: NpyDType = NpyDType::C64;

    fn write_le(self, out: &mut Vec<u8>) {
        self.re.write_le(out);
        self.im.write_le(out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        Complex::new(f32::read_le(&bytes[..4]), f32::read_le(&bytes[4..8]))
    }
}

impl NpyElement for Complex<f64> {
    const DTYPE: NpyDType = NpyDType::C128;

    fn write_le(self, out: &mut Vec<u8>) {
        self.re.write_le(out);
        self.im.write_le(out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        Complex::new(f64::read_le(&bytes[..8]), f64::read_le(&bytes[8..16]))
    }
}

fn element_count(shape: &[usize]) -> Result<usize, IOError> {
    shape
        .iter()
        .copied()
        .try_fold(1usize, |acc, dim| acc.checked_mul(dim))
        .ok_or(IOError::HeaderSchemaInvalid(
            "shape element-count overflowed",
        ))
}

/// Width of the little-endian header length field for a format version.
fn length_field_width(version: (u8, u8)) -> Result<usize, IOError> {
    match version {
        (1, 0) => Ok(2),
        (2, 0) | (3, 0) => Ok(4),
        _ => Err(IOError::MagicInvalid),
    }
}

/// Magic string, version pair and header length: everything in front of
/// the header dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Preamble {
    version: (u8, u8),
    width: usize,
    header_len: usize,
}

impl Preamble {
    fn new(version: (u8, u8), header_len: usize) -> Result<Self, IOError> {
        Ok(Self {
            version,
            width: length_field_width(version)?,
            header_len,
        })
    }

    fn header_start(self) -> usize {
        NPY_MAGIC_PREFIX.len() + 2 + self.width
    }

    fn header_end(self) -> usize {
        self.header_start() + self.header_len
    }

    fn write(self, out: &mut Vec<u8>) -> Result<(), IOError> {
        let too_long =
            || IOError::HeaderSchemaInvalid("header length does not fit the version's length field");
        out.extend_from_slice(&NPY_MAGIC_PREFIX);
        out.extend_from_slice(&[self.version.0, self.version.1]);
        if self.width == 2 {
            let len = u16::try_from(self.header_len).map_err(|_| too_long())?;
            out.extend_from_slice(&len.to_le_bytes());
        } else {
            let len = u32::try_from(self.header_len).map_err(|_| too_long())?;
            out.extend_from_slice(&len.to_le_bytes());
        }
        Ok(())
    }

    fn read(bytes: &[u8]) -> Result<Self, IOError> {
        let version = validate_magic_version(bytes)?;
        let width = length_field_width(version)?;
        let field = bytes
            .get(8..8 + width)
            .ok_or(IOError::HeaderSchemaInvalid(
                "payload truncated inside the header length field",
            ))?;
        let header_len = field
            .iter()
            .rev()
            .fold(0usize, |acc, &byte| (acc << 8) | usize::from(byte));
        if header_len == 0 || header_len > MAX_HEADER_BYTES {
            return Err(IOError::HeaderSchemaInvalid(
                "header bytes must be within bounded budget",
            ));
        }
        let preamble = Self {
            version,
            width,
            header_len,
        };
        if bytes.len() < preamble.header_end() {
            return Err(IOError::HeaderSchemaInvalid(
                "payload truncated before declared header bytes",
            ));
        }
        Ok(preamble)
    }
}

/// Python `repr` of a tuple: `()`, `(n,)`, `(a, b)`.
fn format_shape_tuple(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        _ => {
            let joined = shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({joined})")
        }
    }
}

/// Dictionary text, space padding and trailing newline, sized so the data
/// that follows starts on a 64-byte boundary.
fn encode_header_block(header: &NpyHeader, version: (u8, u8)) -> Result<Vec<u8>, IOError> {
    let dictionary = format!(
        "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
        header.descr.descr(),
        if header.fortran_order { "True" } else { "False" },
        format_shape_tuple(&header.shape),
    );
    let start = Preamble::new(version, 0)?.header_start();
    let unpadded = start + dictionary.len() + 1;
    let padding = unpadded.next_multiple_of(NPY_HEADER_ALIGNMENT) - unpadded;
    let header_len = dictionary.len() + padding + 1;
    if header_len > MAX_HEADER_BYTES {
        return Err(IOError::HeaderSchemaInvalid(
            "header bytes must be within bounded budget",
        ));
    }

    let mut block = dictionary.into_bytes();
    block.resize(header_len - 1, b' ');
    block.push(b'\n');
    Ok(block)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Quoted(&'a str),
    Bare(&'a str),
    Open(char),
    Close(char),
    Colon,
    Comma,
}

/// Splits the Python-literal header dictionary into tokens.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, IOError>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        let rest = &text[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        let first = trimmed.chars().next()?;
        let (token, width) = match first {
            '{' | '(' => (Token::Open(first), 1),
            '}' | ')' => (Token::Close(first), 1),
            ':' => (Token::Colon, 1),
            ',' => (Token::Comma, 1),
            '\'' | '"' => match trimmed[1..].find(first) {
                Some(end) => (Token::Quoted(&trimmed[1..=end]), end + 2),
                None => {
                    return Some(Err(IOError::HeaderSchemaInvalid(
                        "header string literal is not terminated",
                    )));
                }
            },
            _ => {
                let width = trimmed
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(trimmed.len());
                if width == 0 {
                    return Some(Err(IOError::HeaderSchemaInvalid(
                        "unexpected character in header dictionary",
                    )));
                }
                (Token::Bare(&trimmed[..width]), width)
            }
        };
        self.pos += width;
        Some(Ok(token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderValue<'a> {
    Text(&'a str),
    Word(&'a str),
    Tuple {
        items: Vec<&'a str>,
        trailing_comma: bool,
    },
}

struct DictParser<'a> {
    tokens: Vec<Token<'a>>,
    cursor: usize,
}

impl<'a> DictParser<'a> {
    fn new(text: &'a str) -> Result<Self, IOError> {
        let tokens = Lexer { text, pos: 0 }.collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens, cursor: 0 })
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.cursor).copied()
    }

    fn bump(&mut self) -> Result<Token<'a>, IOError> {
        let token = self.peek().ok_or(IOError::HeaderSchemaInvalid(
            "header dictionary ended early",
        ))?;
        self.cursor += 1;
        Ok(token)
    }

    fn expect(&mut self, want: Token<'a>, message: &'static str) -> Result<(), IOError> {
        if self.bump()? == want {
            Ok(())
        } else {
            Err(IOError::HeaderSchemaInvalid(message))
        }
    }

    /// `'{' (key ':' value),* '}'` with an optional trailing comma.
    fn entries(mut self) -> Result<Vec<(&'a str, HeaderValue<'a>)>, IOError> {
        self.expect(Token::Open('{'), "header dictionary must be wrapped in braces")?;
        let mut entries = Vec::new();
        loop {
            let key = match self.bump()? {
                Token::Close('}') => break,
                Token::Quoted(key) => key,
                _ => return Err(IOError::HeaderSchemaInvalid("header keys must be quoted")),
            };
            self.expect(Token::Colon, "header field is missing ':' separator")?;
            entries.push((key, self.value()?));
            match self.bump()? {
                Token::Comma => {}
                Token::Close('}') => break,
                _ => {
                    return Err(IOError::HeaderSchemaInvalid(
                        "header entries must be separated by commas",
                    ));
                }
            }
        }
        if self.peek().is_some() {
            return Err(IOError::HeaderSchemaInvalid(
                "unexpected text after header dictionary",
            ));
        }
        Ok(entries)
    }

    fn value(&mut self) -> Result<HeaderValue<'a>, IOError> {
        match self.bump()? {
            Token::Quoted(text) => Ok(HeaderValue::Text(text)),
            Token::Bare(word) => Ok(HeaderValue::Word(word)),
            Token::Open('(') => {
                let mut items = Vec::new();
                let mut trailing_comma = false;
                loop {
                    match self.bump()? {
                        Token::Close(')') => break,
                        Token::Bare(item) if items.is_empty() || trailing_comma => {
                            items.push(item);
                            trailing_comma = false;
                        }
                        Token::Comma if !items.is_empty() && !trailing_comma => {
                            trailing_comma = true;
                        }
                        _ => return Err(IOError::HeaderSchemaInvalid("malformed shape tuple")),
                    }
                }
                Ok(HeaderValue::Tuple {
                    items,
                    trailing_comma,
                })
            }
            _ => Err(IOError::HeaderSchemaInvalid("unsupported header value")),
        }
    }
}

fn shape_from_tuple(items: &[&str], trailing_comma: bool) -> Result<Vec<usize>, IOError> {
    if items.len() == 1 && !trailing_comma {
        return Err(IOError::HeaderSchemaInvalid(
            "singleton shape tuples must include trailing comma",
        ));
    }
    items
        .iter()
        .map(|item| {
            item.parse::<usize>()
                .map_err(|_| IOError::HeaderSchemaInvalid("shape tuple entries must be usize"))
        })
        .collect()
}

fn parse_header_dictionary(header_bytes: &[u8]) -> Result<NpyHeader, IOError> {
    let text = std::str::from_utf8(header_bytes).map_err(|_| {
        IOError::HeaderSchemaInvalid("header bytes must decode as utf-8/ascii dictionary")
    })?;

    let mut descr = None;
    let mut fortran_order = None;
    let mut shape = None;
    for (key, value) in DictParser::new(text)?.entries()? {
        let already_set = match (key, value) {
            ("descr", HeaderValue::Text(text)) => descr.replace(text).is_some(),
            ("fortran_order", HeaderValue::Word(word)) => {
                let flag = match word {
                    "True" => true,
                    "False" => false,
                    _ => {
                        return Err(IOError::HeaderSchemaInvalid(
                            "fortran_order field must be True or False",
                        ));
                    }
                };
                fortran_order.replace(flag).is_some()
            }
            ("shape", HeaderValue::Tuple {
                items,
                trailing_comma,
            }) => shape
                .replace(shape_from_tuple(&items, trailing_comma)?)
                .is_some(),
            ("descr" | "fortran_order" | "shape", _) => {
                return Err(IOError::HeaderSchemaInvalid(
                    "header field has the wrong value type",
                ));
            }
            _ => {
                return Err(IOError::HeaderSchemaInvalid(
                    "header dictionary must contain exactly descr/fortran_order/shape keys",
                ));
            }
        };
        if already_set {
            return Err(IOError::HeaderSchemaInvalid(
                "header dictionary contains duplicate keys",
            ));
        }
    }

    let (Some(descr), Some(fortran_order), Some(shape)) = (descr, fortran_order, shape) else {
        return Err(IOError::HeaderSchemaInvalid(
            "header dictionary must contain exactly descr/fortran_order/shape keys",
        ));
    };
    validate_header_schema(&shape, fortran_order, descr, header_bytes.len())
}

pub fn write_npy_bytes(header: &NpyHeader, payload: &[u8]) -> Result<Vec<u8>, IOError> {
    write_npy_bytes_with_version(header, payload, (1, 0))
}

pub fn write_npy_bytes_with_version(
    header: &NpyHeader,
    payload: &[u8],
    version: (u8, u8),
) -> Result<Vec<u8>, IOError> {
    let value_count = payload.len() / header.descr.item_size();
    let byte_count = validate_write_contract(&header.shape, value_count, header.descr)?;
    if byte_count != payload.len() {
        return Err(IOError::WriteContractViolation(
            "payload bytes must align with dtype item size",
        ));
    }

    let block = encode_header_block(header, version)?;
    let preamble = Preamble::new(version, block.len())?;
    let mut encoded = Vec::with_capacity(preamble.header_end() + byte_count);
    preamble.write(&mut encoded)?;
    encoded.extend_from_slice(&block);
    encoded.extend_from_slice(payload);
    Ok(encoded)
}

pub fn read_npy_bytes(payload: &[u8]) -> Result<NpyArrayBytes, IOError> {
    let preamble = Preamble::read(payload)?;
    let header =
        parse_header_dictionary(&payload[preamble.header_start()..preamble.header_end()])?;
    let body = &payload[preamble.header_end()..];
    let element_count = validate_read_payload(&header.shape, body.len(), header.descr)?;

    Ok(NpyArrayBytes {
        version: preamble.version,
        header,
        element_count,
        payload: body.to_vec(),
    })
}

pub fn validate_magic_version(payload: &[u8]) -> Result<(u8, u8), IOError> {
    if payload.len() < 8 {
        return Err(IOError::MagicInvalid);
    }
    if payload[..6] != NPY_MAGIC_PREFIX {
        return Err(IOError::MagicInvalid);
    }

    let version = (payload[6], payload[7]);
    length_field_width(version)?;
    Ok(version)
}

pub fn validate_header_schema(
    shape: &[usize],
    fortran_order: bool,
    descr: &str,
    header_len: usize,
) -> Result<NpyHeader, IOError> {
    if header_len == 0 || header_len > MAX_HEADER_BYTES {
        return Err(IOError::HeaderSchemaInvalid(
            "header bytes must be within bounded budget",
        ));
    }
    if shape.len() > MAX_SHAPE_RANK {
        return Err(IOError::HeaderSchemaInvalid(
            "shape rank exceeds validation budget",
        ));
    }

    element_count(shape)?;
    let descr = NpyDType::decode(descr)?;

    Ok(NpyHeader {
        shape: shape.to_vec(),
        fortran_order,
        descr,
    })
}

pub fn validate_write_contract(
    shape: &[usize],
    value_count: usize,
    dtype: NpyDType,
) -> Result<usize, IOError> {
    let expected_count = element_count(shape).map_err(|_| {
        IOError::WriteContractViolation("failed to compute element count for write path")
    })?;
    if value_count != expected_count {
        return Err(IOError::WriteContractViolation(
            "value_count does not match shape element count",
        ));
    }

    expected_count
        .checked_mul(dtype.item_size())
        .ok_or(IOError::WriteContractViolation(
            "write byte count overflowed",
        ))
}

pub fn validate_read_payload(
    shape: &[usize],
    payload_len_bytes: usize,
    dtype: NpyDType,
) -> Result<usize, IOError> {
    let expected_count = element_count(shape)
        .map_err(|_| IOError::ReadPayloadIncomplete("failed to compute expected element count"))?;
    let expected_bytes =
        expected_count
            .checked_mul(dtype.item_size())
            .ok_or(IOError::ReadPayloadIncomplete(
                "expected payload bytes overflowed",
            ))?;

    if payload_len_bytes != expected_bytes {
        return Err(IOError::ReadPayloadIncomplete(
            "payload bytes must exactly match expected shape/dtype footprint",
        ));
    }

    Ok(expected_count)
}

#[must_use]
pub fn encode_elements<T: NpyElement>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.item_size());
    for &value in values {
        value.write_le(&mut out);
    }
    out
}

pub fn decode_elements<T: NpyElement>(array: &NpyArrayBytes) -> Result<Vec<T>, IOError> {
    if array.header.descr != T::DTYPE {
        return Err(IOError::ElementTypeMismatch {
            expected: T::DTYPE,
            found: array.header.descr,
        });
    }
    let mut values = Vec::with_capacity(array.element_count);
    values.extend(array.payload.chunks_exact(T::DTYPE.item_size()).map(T::read_le));
    if values.len() != array.element_count {
        return Err(IOError::ReadPayloadIncomplete(
            "payload bytes must exactly match expected shape/dtype footprint",
        ));
    }
    Ok(values)
}

/// Encode a C-ordered array of any rank.
pub fn encode_array<T: NpyElement>(shape: &[usize], values: &[T]) -> Result<Vec<u8>, IOError> {
    let header = NpyHeader::c_order(shape, T::DTYPE);
    write_npy_bytes(&header, &encode_elements(values))
}

pub fn save_array<T: NpyElement>(path: &Path, shape: &[usize], values: &[T]) -> Result<(), IOError> {
    let encoded = encode_array(shape, values)?;
    std::fs::write(path, encoded).map_err(|_| IOError::FileAccessFailed("failed writing npy file"))
}

pub fn save_vec<T: NpyElement>(path: &Path, values: &[T]) -> Result<(), IOError> {
    save_array(path, &[values.len()], values)
}

pub fn load_array<T: NpyElement>(path: &Path) -> Result<(Vec<usize>, Vec<T>), IOError> {
    let raw =
        std::fs::read(path).map_err(|_| IOError::FileAccessFailed("failed reading npy file"))?;
    let array = read_npy_bytes(&raw)?;
    let values = decode_elements::<T>(&array)?;
    Ok((array.header.shape, values))
}

/// Load an array as its C-order flattening. Fortran-ordered payloads of
/// rank > 1 are rejected since their flat order differs.
pub fn load_vec<T: NpyElement>(path: &Path) -> Result<Vec<T>, IOError> {
    let raw =
        std::fs::read(path).map_err(|_| IOError::FileAccessFailed("failed reading npy file"))?;
    let array = read_npy_bytes(&raw)?;
    if array.header.fortran_order && array.header.shape.len() > 1 {
        return Err(IOError::HeaderSchemaInvalid(
            "fortran-ordered arrays cannot be flattened in C order",
        ));
    }
    decode_elements::<T>(&array)
}

#[cfg(test)]
mod tests {
    use super::{
        IO_REASON_CODES, IOError, MAX_HEADER_BYTES, NPY_HEADER_ALIGNMENT, NPY_MAGIC_PREFIX,
        NpyDType, NpyHeader, Preamble, decode_elements, encode_array, encode_elements,
        encode_header_block, load_array, load_vec, read_npy_bytes, save_array, save_vec,
        validate_header_schema, validate_magic_version, validate_read_payload,
        validate_write_contract, write_npy_bytes, write_npy_bytes_with_version,
    };
    use num_complex::Complex;
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("flo_io_{name}_{ts}.npy"))
    }

    fn make_manual_npy_payload(header_literal: &str, body: &[u8]) -> Vec<u8> {
        let mut header_bytes = header_literal.as_bytes().to_vec();
        if !header_bytes.ends_with(b"\n") {
            header_bytes.push(b'\n');
        }
        let mut encoded = Vec::new();
        Preamble::new((1, 0), header_bytes.len())
            .expect("v1")
            .write(&mut encoded)
            .expect("preamble");
        encoded.extend_from_slice(&header_bytes);
        encoded.extend_from_slice(body);
        encoded
    }

    #[test]
    fn reason_code_registry_is_stable() {
        assert_eq!(
            IO_REASON_CODES,
            [
                "io_magic_invalid",
                "io_header_schema_invalid",
                "io_dtype_descriptor_invalid",
                "io_write_contract_violation",
                "io_read_payload_incomplete",
                "io_element_type_mismatch",
                "io_file_access_failed",
            ]
        );
    }

    #[test]
    fn magic_version_accepts_supported_tuples() {
        let mut payload = [0u8; 8];
        payload[..6].copy_from_slice(&NPY_MAGIC_PREFIX);

        for version in [(1, 0), (2, 0), (3, 0)] {
            payload[6] = version.0;
            payload[7] = version.1;
            assert_eq!(
                validate_magic_version(&payload).expect("supported tuple"),
                version
            );
        }
    }

    #[test]
    fn magic_version_rejects_corrupt_prefix_and_unknown_tuple() {
        let err = validate_magic_version(&[0u8; 4]).expect_err("short payload");
        assert_eq!(err.reason_code(), "io_magic_invalid");

        let mut payload = [0u8; 8];
        payload[..6].copy_from_slice(&NPY_MAGIC_PREFIX);
        payload[6] = 9;
        payload[7] = 9;
        let err = validate_magic_version(&payload).expect_err("unsupported tuple");
        assert_eq!(err.reason_code(), "io_magic_invalid");
    }

    #[test]
    fn header_schema_accepts_valid_and_rejects_invalid_budget() {
        let header = validate_header_schema(&[2, 3], false, "<c16", 128).expect("valid header");
        assert_eq!(header.shape, vec![2, 3]);
        assert_eq!(header.descr, NpyDType::C128);

        let err = validate_header_schema(&[2, 3], true, "<f8", MAX_HEADER_BYTES + 1)
            .expect_err("oversized header");
        assert_eq!(err.reason_code(), "io_header_schema_invalid");

        let err = validate_header_schema(&[2], false, ">f8", 64).expect_err("big endian");
        assert_eq!(err.reason_code(), "io_dtype_descriptor_invalid");
    }

    #[test]
    fn descriptor_roundtrip_covers_all_supported_dtypes() {
        for dtype in [
            NpyDType::I32,
            NpyDType::I64,
            NpyDType::F32,
            NpyDType::F64,
            NpyDType::C64,
            NpyDType::C128,
        ] {
            assert_eq!(NpyDType::decode(dtype.descr()).expect("decode"), dtype);
        }
        assert!(NpyDType::C64.is_complex());
        assert!(!NpyDType::F64.is_complex());
        assert_eq!(NpyDType::C128.item_size(), 16);
    }

    #[test]
    fn header_matches_numpy_layout_for_1d_f64() {
        // np.save of np.zeros(3) produces a 118-byte v1.0 header.
        let header = NpyHeader::c_order(&[3], NpyDType::F64);
        let bytes = encode_header_block(&header, (1, 0)).expect("header");
        assert_eq!(bytes.len(), 118);
        assert_eq!((10 + bytes.len()) % NPY_HEADER_ALIGNMENT, 0);
        let text = std::str::from_utf8(&bytes).expect("ascii");
        assert!(text.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (3,), }"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn two_dimensional_shape_is_written_as_python_tuple() {
        let encoded = encode_array(&[2, 2], &[1.0f64, 2.0, 3.0, 4.0]).expect("encode");
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.contains("'shape': (2, 2), }"));
    }

    #[test]
    fn write_then_read_preserves_complex_payload() {
        let values = vec![Complex::new(1.5f64, -2.0), Complex::new(0.0, 3.25)];
        let encoded = encode_array(&[2], &values).expect("encode");
        let decoded = read_npy_bytes(&encoded).expect("decode");
        assert_eq!(decoded.header.descr, NpyDType::C128);
        assert_eq!(decode_elements::<Complex<f64>>(&decoded).expect("typed"), values);
    }

    #[test]
    fn version_two_header_uses_four_byte_length() {
        let header = NpyHeader::c_order(&[2], NpyDType::F32);
        let payload = encode_elements(&[1.0f32, 2.0]);
        let encoded = write_npy_bytes_with_version(&header, &payload, (2, 0)).expect("v2");
        assert_eq!(encoded[6], 2);
        let decoded = read_npy_bytes(&encoded).expect("decode");
        assert_eq!(decoded.version, (2, 0));
        assert_eq!(decode_elements::<f32>(&decoded).expect("typed"), vec![1.0, 2.0]);
    }

    #[test]
    fn read_rejects_truncated_payload_and_duplicate_keys() {
        let header = NpyHeader::c_order(&[4], NpyDType::F64);
        let mut encoded =
            write_npy_bytes(&header, &encode_elements(&[1.0f64, 2.0, 3.0, 4.0])).expect("encode");
        encoded.truncate(encoded.len() - 3);
        let err = read_npy_bytes(&encoded).expect_err("truncated");
        assert_eq!(err.reason_code(), "io_read_payload_incomplete");

        let duplicated = make_manual_npy_payload(
            "{'descr': '<f8', 'descr': '<f8', 'fortran_order': False, 'shape': (1,), }",
            &1.0f64.to_le_bytes(),
        );
        let err = read_npy_bytes(&duplicated).expect_err("duplicate keys");
        assert_eq!(err.reason_code(), "io_header_schema_invalid");

        let no_comma = make_manual_npy_payload(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1), }",
            &1.0f64.to_le_bytes(),
        );
        let err = read_npy_bytes(&no_comma).expect_err("singleton without comma");
        assert_eq!(err.reason_code(), "io_header_schema_invalid");
    }

    #[test]
    fn header_dictionary_tolerates_numpy_spellings() {
        let double_quoted = make_manual_npy_payload(
            "{\"descr\":\"<f4\",\"shape\":( 2 , 1 ),\"fortran_order\":True}",
            &encode_elements(&[1.0f32, 2.0]),
        );
        let decoded = read_npy_bytes(&double_quoted).expect("double quotes, reordered keys");
        assert_eq!(decoded.header.shape, vec![2, 1]);
        assert!(decoded.header.fortran_order);
        assert_eq!(decoded.element_count, 2);

        let scalar = make_manual_npy_payload(
            "{'descr': '<i8', 'fortran_order': False, 'shape': (), }",
            &7i64.to_le_bytes(),
        );
        let decoded = read_npy_bytes(&scalar).expect("rank zero");
        assert!(decoded.header.shape.is_empty());
        assert_eq!(decode_elements::<i64>(&decoded).expect("typed"), vec![7]);
    }

    #[test]
    fn header_dictionary_rejects_malformed_entries() {
        for literal in [
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1,), 'extra': 1, }",
            "{'descr': '<f8', 'fortran_order': False, }",
            "{'descr': '<f8', 'fortran_order': 'no', 'shape': (1,), }",
            "{'descr': '<f8', 'fortran_order': Maybe, 'shape': (1,), }",
            "{'descr': '<f8' 'fortran_order': False, 'shape': (1,), }",
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1,,), }",
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1,), } trailing",
            "{'descr: '<f8', 'fortran_order': False, 'shape': (1,), }",
            "['descr', '<f8']",
        ] {
            let payload = make_manual_npy_payload(literal, &1.0f64.to_le_bytes());
            let err = read_npy_bytes(&payload).expect_err(literal);
            assert_eq!(err.reason_code(), "io_header_schema_invalid", "{literal}");
        }
    }

    #[test]
    fn preamble_reports_truncated_length_field() {
        let mut payload = NPY_MAGIC_PREFIX.to_vec();
        payload.extend_from_slice(&[2, 0, 64]);
        let err = read_npy_bytes(&payload).expect_err("three bytes of a four-byte field");
        assert_eq!(err.reason_code(), "io_header_schema_invalid");

        let mut oversized = Vec::new();
        let err = Preamble::new((1, 0), usize::from(u16::MAX) + 1)
            .expect("v1")
            .write(&mut oversized)
            .expect_err("u16 overflow");
        assert_eq!(err.reason_code(), "io_header_schema_invalid");
    }

    #[test]
    fn write_contract_rejects_misaligned_or_mismatched_payload() {
        let header = NpyHeader::c_order(&[2], NpyDType::F64);
        let err = write_npy_bytes(&header, &[0u8; 9]).expect_err("misaligned");
        assert_eq!(err.reason_code(), "io_write_contract_violation");

        let single = NpyHeader::c_order(&[1], NpyDType::F64);
        let err = write_npy_bytes(&single, &[0u8; 9]).expect_err("stray byte");
        assert_eq!(err.reason_code(), "io_write_contract_violation");

        let err = validate_write_contract(&[3], 2, NpyDType::F64).expect_err("count mismatch");
        assert_eq!(err.reason_code(), "io_write_contract_violation");

        let err =
            validate_read_payload(&[usize::MAX, 2], 0, NpyDType::F64).expect_err("overflow");
        assert_eq!(err.reason_code(), "io_read_payload_incomplete");
    }

    #[test]
    fn decode_rejects_wrong_element_type() {
        let encoded = encode_array(&[1], &[1.0f32]).expect("encode");
        let decoded = read_npy_bytes(&encoded).expect("decode");
        let err = decode_elements::<f64>(&decoded).expect_err("type mismatch");
        assert_eq!(
            err,
            IOError::ElementTypeMismatch {
                expected: NpyDType::F64,
                found: NpyDType::F32
            }
        );
    }

    #[test]
    fn file_roundtrip_and_fortran_policy() {
        let path = temp_file("vec");
        save_vec(&path, &[3i64, 1, 2]).expect("save");
        assert_eq!(load_vec::<i64>(&path).expect("load"), vec![3, 1, 2]);
        let _ = std::fs::remove_file(&path);

        let path = temp_file("matrix");
        save_array(&path, &[2, 3], &[Complex::new(1.0f32, 0.5); 6]).expect("save");
        let (shape, values) = load_array::<Complex<f32>>(&path).expect("load");
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(values.len(), 6);
        let _ = std::fs::remove_file(&path);

        let path = temp_file("fortran");
        let header = NpyHeader {
            shape: vec![2, 2],
            fortran_order: true,
            descr: NpyDType::F64,
        };
        let encoded =
            write_npy_bytes(&header, &encode_elements(&[1.0f64, 2.0, 3.0, 4.0])).expect("encode");
        std::fs::write(&path, encoded).expect("write");
        let err = load_vec::<f64>(&path).expect_err("fortran order");
        assert_eq!(err.reason_code(), "io_header_schema_invalid");
        let _ = std::fs::remove_file(&path);

        let err = load_vec::<f64>(&temp_file("missing")).expect_err("missing file");
        assert_eq!(err.reason_code(), "io_file_access_failed");
    }
}
