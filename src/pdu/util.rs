use crate::types::{MacAddress, UniqueIdentifier};
use bytes::{Buf, BufMut};
use thiserror::Error;

/// A frame failed to serialize or deserialize.
///
/// Decode errors are recoverable: the dispatcher logs and drops the frame
/// and keeps reading from the wire.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum PduError {
    /// The frame ended before the PDU did.
    #[error("not enough bytes")]
    ShortFrame,
    /// A field holds a value the standard does not allow.
    #[error("malformed frame")]
    BadFrame,
    /// Serializing would exceed the maximum Ethernet payload.
    #[error("over maximum frame length")]
    OverMaxLength,
}

macro_rules! ensure_remaining {
    ($buf:expr, $len:expr) => {
        if $buf.remaining() < $len {
            return Err($crate::pdu::PduError::ShortFrame);
        }
    };
}
pub(crate) use ensure_remaining;

pub(crate) fn read_mac<T: Buf>(buf: &mut T) -> MacAddress {
    let mut mac = [0u8; 6];
    buf.copy_to_slice(&mut mac);
    MacAddress(mac)
}

pub(crate) fn put_mac<T: BufMut>(buf: &mut T, mac: MacAddress) {
    buf.put_slice(&mac.0);
}

pub(crate) fn read_eui64<T: Buf>(buf: &mut T) -> UniqueIdentifier {
    UniqueIdentifier::new(buf.get_u64())
}

pub(crate) fn put_eui64<T: BufMut>(buf: &mut T, eui: UniqueIdentifier) {
    buf.put_u64(eui.as_u64());
}
