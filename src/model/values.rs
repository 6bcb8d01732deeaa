/*! Typed CONTROL descriptor values.

A CONTROL carries `number_of_values` values whose shape is given by the
control_value_type field (clause 7.3.5).  The static half of a value
describes its range and unit; the dynamic half is the current setting.
Both halves live in [`ControlValues`], a variant per value type, so a
value read off the wire stays typed instead of hiding behind a
type-erased blob.
*/

use super::LocalizedStringReference;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// control_value_type codes (clause 7.3.5, table 7.17).  Only the code
/// is kept for types we don't decode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ControlValueType(pub u16);

impl ControlValueType {
    pub const LINEAR_INT8: ControlValueType = ControlValueType(0x0000);
    pub const LINEAR_UINT8: ControlValueType = ControlValueType(0x0001);
    pub const LINEAR_INT16: ControlValueType = ControlValueType(0x0002);
    pub const LINEAR_UINT16: ControlValueType = ControlValueType(0x0003);
    pub const LINEAR_INT32: ControlValueType = ControlValueType(0x0004);
    pub const LINEAR_UINT32: ControlValueType = ControlValueType(0x0005);
    pub const LINEAR_INT64: ControlValueType = ControlValueType(0x0006);
    pub const LINEAR_UINT64: ControlValueType = ControlValueType(0x0007);
    pub const LINEAR_FLOAT: ControlValueType = ControlValueType(0x0008);
    pub const LINEAR_DOUBLE: ControlValueType = ControlValueType(0x0009);
    pub const SELECTOR_INT8: ControlValueType = ControlValueType(0x000A);
    pub const SELECTOR_UINT8: ControlValueType = ControlValueType(0x000B);
    pub const SELECTOR_INT16: ControlValueType = ControlValueType(0x000C);
    pub const SELECTOR_UINT16: ControlValueType = ControlValueType(0x000D);
    pub const SELECTOR_INT32: ControlValueType = ControlValueType(0x000E);
    pub const SELECTOR_UINT32: ControlValueType = ControlValueType(0x000F);
    pub const SELECTOR_INT64: ControlValueType = ControlValueType(0x0010);
    pub const SELECTOR_UINT64: ControlValueType = ControlValueType(0x0011);
    pub const SELECTOR_FLOAT: ControlValueType = ControlValueType(0x0012);
    pub const SELECTOR_DOUBLE: ControlValueType = ControlValueType(0x0013);
    pub const SELECTOR_STRING: ControlValueType = ControlValueType(0x0014);
    pub const ARRAY_INT8: ControlValueType = ControlValueType(0x0015);
    pub const ARRAY_UINT8: ControlValueType = ControlValueType(0x0016);
    pub const ARRAY_INT16: ControlValueType = ControlValueType(0x0017);
    pub const ARRAY_UINT16: ControlValueType = ControlValueType(0x0018);
    pub const ARRAY_INT32: ControlValueType = ControlValueType(0x0019);
    pub const ARRAY_UINT32: ControlValueType = ControlValueType(0x001A);
    pub const ARRAY_INT64: ControlValueType = ControlValueType(0x001B);
    pub const ARRAY_UINT64: ControlValueType = ControlValueType(0x001C);
    pub const ARRAY_FLOAT: ControlValueType = ControlValueType(0x001D);
    pub const ARRAY_DOUBLE: ControlValueType = ControlValueType(0x001E);
    pub const UTF8: ControlValueType = ControlValueType(0x001F);
}

/// The static description of one linear value (clause 7.3.5.2.1).
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct LinearValueStatic<T> {
    pub minimum: T,
    pub maximum: T,
    pub step: T,
    pub default: T,
    /// Unit code with its multiplier exponent (clause 7.3.3).
    pub unit: u16,
    pub string_reference: LocalizedStringReference,
}

/// A linear value: the static range plus the live setting.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct LinearValue<T> {
    pub traits: LinearValueStatic<T>,
    pub current: T,
}

/// The typed payload of a CONTROL's values.
///
/// `Unsupported` keeps the raw bytes so an unrecognised control still
/// round-trips through serialization.
#[derive(Clone, PartialEq, Debug)]
pub enum ControlValues {
    LinearInt8(Vec<LinearValue<i8>>),
    LinearUint8(Vec<LinearValue<u8>>),
    LinearInt16(Vec<LinearValue<i16>>),
    LinearUint16(Vec<LinearValue<u16>>),
    LinearInt32(Vec<LinearValue<i32>>),
    LinearUint32(Vec<LinearValue<u32>>),
    LinearInt64(Vec<LinearValue<i64>>),
    LinearUint64(Vec<LinearValue<u64>>),
    LinearFloat(Vec<LinearValue<f32>>),
    LinearDouble(Vec<LinearValue<f64>>),
    /// A UTF-8 payload, NUL terminated on the wire.
    Utf8(Bytes),
    /// A value type we carry but do not interpret.
    Unsupported {
        value_type: ControlValueType,
        data: Bytes,
    },
}

impl Default for ControlValues {
    fn default() -> Self {
        ControlValues::Unsupported {
            value_type: ControlValueType(0xFFFF),
            data: Bytes::new(),
        }
    }
}

macro_rules! linear_codec {
    ($put:ident, $get:ident, $ty:ty) => {
        impl LinearValue<$ty> {
            fn serialize(&self, buf: &mut BytesMut) {
                buf.$put(self.traits.minimum);
                buf.$put(self.traits.maximum);
                buf.$put(self.traits.step);
                buf.$put(self.traits.default);
                buf.$put(self.current);
                buf.put_u16(self.traits.unit);
                buf.put_u16(self.traits.string_reference.0);
            }

            fn parse<T: Buf>(buf: &mut T) -> Option<LinearValue<$ty>> {
                if buf.remaining() < 5 * std::mem::size_of::<$ty>() + 4 {
                    return None;
                }
                let minimum = buf.$get();
                let maximum = buf.$get();
                let step = buf.$get();
                let default = buf.$get();
                let current = buf.$get();
                let unit = buf.get_u16();
                let string_reference = LocalizedStringReference(buf.get_u16());
                Some(LinearValue {
                    traits: LinearValueStatic {
                        minimum,
                        maximum,
                        step,
                        default,
                        unit,
                        string_reference,
                    },
                    current,
                })
            }
        }
    };
}

linear_codec!(put_i8, get_i8, i8);
linear_codec!(put_u8, get_u8, u8);
linear_codec!(put_i16, get_i16, i16);
linear_codec!(put_u16, get_u16, u16);
linear_codec!(put_i32, get_i32, i32);
linear_codec!(put_u32, get_u32, u32);
linear_codec!(put_i64, get_i64, i64);
linear_codec!(put_u64, get_u64, u64);
linear_codec!(put_f32, get_f32, f32);
linear_codec!(put_f64, get_f64, f64);

macro_rules! parse_linear_list {
    ($buf:expr, $count:expr, $ty:ty, $variant:ident) => {{
        let mut values = Vec::with_capacity(usize::from($count));
        for _ in 0..$count {
            values.push(LinearValue::<$ty>::parse($buf)?);
        }
        ControlValues::$variant(values)
    }};
}

impl ControlValues {
    pub fn value_type(&self) -> ControlValueType {
        match self {
            ControlValues::LinearInt8(_) => ControlValueType::LINEAR_INT8,
            ControlValues::LinearUint8(_) => ControlValueType::LINEAR_UINT8,
            ControlValues::LinearInt16(_) => ControlValueType::LINEAR_INT16,
            ControlValues::LinearUint16(_) => ControlValueType::LINEAR_UINT16,
            ControlValues::LinearInt32(_) => ControlValueType::LINEAR_INT32,
            ControlValues::LinearUint32(_) => ControlValueType::LINEAR_UINT32,
            ControlValues::LinearInt64(_) => ControlValueType::LINEAR_INT64,
            ControlValues::LinearUint64(_) => ControlValueType::LINEAR_UINT64,
            ControlValues::LinearFloat(_) => ControlValueType::LINEAR_FLOAT,
            ControlValues::LinearDouble(_) => ControlValueType::LINEAR_DOUBLE,
            ControlValues::Utf8(_) => ControlValueType::UTF8,
            ControlValues::Unsupported { value_type, .. } => *value_type,
        }
    }

    pub fn number_of_values(&self) -> u16 {
        match self {
            ControlValues::LinearInt8(v) => v.len() as u16,
            ControlValues::LinearUint8(v) => v.len() as u16,
            ControlValues::LinearInt16(v) => v.len() as u16,
            ControlValues::LinearUint16(v) => v.len() as u16,
            ControlValues::LinearInt32(v) => v.len() as u16,
            ControlValues::LinearUint32(v) => v.len() as u16,
            ControlValues::LinearInt64(v) => v.len() as u16,
            ControlValues::LinearUint64(v) => v.len() as u16,
            ControlValues::LinearFloat(v) => v.len() as u16,
            ControlValues::LinearDouble(v) => v.len() as u16,
            ControlValues::Utf8(_) => 1,
            ControlValues::Unsupported { .. } => 0,
        }
    }

    /// Serialize in descriptor layout (statics interleaved with the
    /// current value, per clause 7.3.5.2.1).
    pub fn serialize(&self, buf: &mut BytesMut) {
        match self {
            ControlValues::LinearInt8(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearUint8(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearInt16(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearUint16(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearInt32(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearUint32(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearInt64(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearUint64(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearFloat(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::LinearDouble(v) => v.iter().for_each(|x| x.serialize(buf)),
            ControlValues::Utf8(data) => buf.put_slice(data),
            ControlValues::Unsupported { data, .. } => buf.put_slice(data),
        }
    }

    /// Parse `count` values of the given type from descriptor layout.
    /// Unknown types are kept raw.
    pub fn parse<T: Buf>(
        value_type: ControlValueType,
        count: u16,
        buf: &mut T,
    ) -> Option<ControlValues> {
        Some(match value_type {
            ControlValueType::LINEAR_INT8 => parse_linear_list!(buf, count, i8, LinearInt8),
            ControlValueType::LINEAR_UINT8 => parse_linear_list!(buf, count, u8, LinearUint8),
            ControlValueType::LINEAR_INT16 => parse_linear_list!(buf, count, i16, LinearInt16),
            ControlValueType::LINEAR_UINT16 => parse_linear_list!(buf, count, u16, LinearUint16),
            ControlValueType::LINEAR_INT32 => parse_linear_list!(buf, count, i32, LinearInt32),
            ControlValueType::LINEAR_UINT32 => parse_linear_list!(buf, count, u32, LinearUint32),
            ControlValueType::LINEAR_INT64 => parse_linear_list!(buf, count, i64, LinearInt64),
            ControlValueType::LINEAR_UINT64 => parse_linear_list!(buf, count, u64, LinearUint64),
            ControlValueType::LINEAR_FLOAT => parse_linear_list!(buf, count, f32, LinearFloat),
            ControlValueType::LINEAR_DOUBLE => parse_linear_list!(buf, count, f64, LinearDouble),
            ControlValueType::UTF8 => {
                ControlValues::Utf8(buf.copy_to_bytes(buf.remaining()))
            }
            other => ControlValues::Unsupported {
                value_type: other,
                data: buf.copy_to_bytes(buf.remaining()),
            },
        })
    }
}
