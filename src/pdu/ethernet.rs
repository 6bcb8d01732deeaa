use crate::pdu::util::*;
use crate::pdu::PduError;
use crate::types::MacAddress;
use bytes::{Buf, BufMut, BytesMut};

/// EtherType carried by every AVTP frame.
pub const ETHERTYPE_AVTP: u16 = 0x22F0;

/// Maximum length of a frame we will put on the wire (1522 octets,
/// including the 802.1Q tag the hardware may insert).
pub const ETHERNET_MAX_FRAME_SIZE: usize = 1522;

/// Minimum length of an Ethernet frame, FCS excluded.  Shorter frames are
/// padded with zeroes before transmission.
pub const ETHERNET_MIN_FRAME_SIZE: usize = 60;

/// Maximum AVTP payload a single frame can carry.
pub const AVTP_MAX_PAYLOAD_LENGTH: usize = 1500;

/// The 14-byte Ethernet II header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EtherHeader {
    pub dest_address: MacAddress,
    pub src_address: MacAddress,
    pub ether_type: u16,
}

impl EtherHeader {
    pub const LENGTH: usize = 14;

    pub fn avtp(dest_address: MacAddress, src_address: MacAddress) -> EtherHeader {
        EtherHeader {
            dest_address,
            src_address,
            ether_type: ETHERTYPE_AVTP,
        }
    }

    pub fn serialize(&self, buf: &mut BytesMut) {
        put_mac(buf, self.dest_address);
        put_mac(buf, self.src_address);
        buf.put_u16(self.ether_type);
    }

    pub fn parse<T: Buf>(buf: &mut T) -> Result<EtherHeader, PduError> {
        ensure_remaining!(buf, Self::LENGTH);
        Ok(EtherHeader {
            dest_address: read_mac(buf),
            src_address: read_mac(buf),
            ether_type: buf.get_u16(),
        })
    }
}

/// Zero-pad a serialized frame up to the Ethernet minimum.
pub(crate) fn pad_frame(buf: &mut BytesMut) {
    while buf.len() < ETHERNET_MIN_FRAME_SIZE {
        buf.put_u8(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hdr = EtherHeader::avtp(
            MacAddress::ADP_ACMP_MULTICAST,
            MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        );
        let mut buf = BytesMut::new();
        hdr.serialize(&mut buf);
        assert_eq!(buf.len(), EtherHeader::LENGTH);
        let parsed = EtherHeader::parse(&mut buf.freeze()).unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn short_frame() {
        let mut buf = &[0u8; 13][..];
        assert_eq!(EtherHeader::parse(&mut buf), Err(PduError::ShortFrame));
    }
}
