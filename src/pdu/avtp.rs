use crate::pdu::util::ensure_remaining;
use crate::pdu::PduError;
use bytes::{Buf, BufMut, BytesMut};

/// AVTP subtype values of the AVDECC control protocols (IEEE 1722,
/// with the `cd` bit stripped).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AvtpSubtype {
    /// Discovery protocol (0x7A).
    Adp,
    /// Enumeration and control protocol (0x7B).
    Aecp,
    /// Connection management protocol (0x7C).
    Acmp,
    /// Vendor-experimental control frames (0x7F).
    Experimental,
    /// A control subtype we didn't recognise.
    Unknown(u8),
}

impl AvtpSubtype {
    pub fn from_u8(value: u8) -> AvtpSubtype {
        match value {
            0x7A => AvtpSubtype::Adp,
            0x7B => AvtpSubtype::Aecp,
            0x7C => AvtpSubtype::Acmp,
            0x7F => AvtpSubtype::Experimental,
            n => AvtpSubtype::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AvtpSubtype::Adp => 0x7A,
            AvtpSubtype::Aecp => 0x7B,
            AvtpSubtype::Acmp => 0x7C,
            AvtpSubtype::Experimental => 0x7F,
            AvtpSubtype::Unknown(n) => n,
        }
    }
}

/// The 4-byte AVTP control header that fronts every AVDECC PDU.
///
/// Layout (clause 5 of IEEE 1722):
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |c|   subtype   |s| ver |control|     status    |control_data   |
/// |d|             |v|     |_data  |   (5 bits)  ...  _length (11)  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The `cd` bit is always 1 for control frames; the `sv` (stream valid)
/// bit is always 0.  The meaning of `control_data` (4 bits) and `status`
/// (5 bits) depends on the subtype: for ADP they hold the message type
/// and valid_time, for AECP/ACMP the message type and the status code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AvtpHeader {
    pub subtype: AvtpSubtype,
    pub version: u8,
    pub control_data: u8,
    pub status: u8,
    pub control_data_length: u16,
}

const CD_BIT: u8 = 0x80;
const SV_BIT: u8 = 0x80;

impl AvtpHeader {
    pub const LENGTH: usize = 4;

    pub fn new(subtype: AvtpSubtype, control_data: u8, status: u8, length: u16) -> AvtpHeader {
        AvtpHeader {
            subtype,
            version: 0,
            control_data,
            status,
            control_data_length: length,
        }
    }

    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(CD_BIT | (self.subtype.as_u8() & 0x7F));
        buf.put_u8(((self.version & 0x07) << 4) | (self.control_data & 0x0F));
        buf.put_u16(
            (u16::from(self.status & 0x1F) << 11) | (self.control_data_length & 0x07FF),
        );
    }

    /// Parse the header.  Returns `Ok(None)` for a non-control frame
    /// (`cd` bit clear), which the dispatcher silently ignores.
    pub fn parse<T: Buf>(buf: &mut T) -> Result<Option<AvtpHeader>, PduError> {
        ensure_remaining!(buf, Self::LENGTH);
        let b0 = buf.get_u8();
        let b1 = buf.get_u8();
        let w = buf.get_u16();
        if b0 & CD_BIT == 0 {
            return Ok(None);
        }
        if b1 & SV_BIT != 0 {
            return Err(PduError::BadFrame);
        }
        Ok(Some(AvtpHeader {
            subtype: AvtpSubtype::from_u8(b0 & 0x7F),
            version: (b1 >> 4) & 0x07,
            control_data: b1 & 0x0F,
            status: (w >> 11) as u8,
            control_data_length: w & 0x07FF,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hdr = AvtpHeader::new(AvtpSubtype::Aecp, 1, 9, 24);
        let mut buf = BytesMut::new();
        hdr.serialize(&mut buf);
        assert_eq!(buf.len(), AvtpHeader::LENGTH);
        let parsed = AvtpHeader::parse(&mut buf.freeze()).unwrap().unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn adp_header_bytes() {
        // ADP EntityAvailable, valid_time 31, payload 56 bytes.
        let hdr = AvtpHeader::new(AvtpSubtype::Adp, 0, 31, 56);
        let mut buf = BytesMut::new();
        hdr.serialize(&mut buf);
        assert_eq!(&buf[..], &[0xFA, 0x00, 0xF8, 0x38]);
    }

    #[test]
    fn data_frame_ignored() {
        // cd bit clear: not a control frame.
        let mut buf = &[0x02u8, 0x00, 0x00, 0x18][..];
        assert_eq!(AvtpHeader::parse(&mut buf).unwrap(), None);
    }
}
