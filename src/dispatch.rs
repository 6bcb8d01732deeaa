/*! Demultiplexing of inbound Ethernet frames into AVDECC messages. */

use crate::pdu::*;
use crate::types::MacAddress;
use bytes::{Buf, Bytes};
use tracing::*;

/// Destination filter applied to every inbound frame: only frames for
/// the local station, the AVDECC multicast or the Identify multicast
/// are delivered.
pub fn accepts_destination(dest: MacAddress, local_mac: MacAddress) -> bool {
    dest == local_mac
        || dest == MacAddress::ADP_ACMP_MULTICAST
        || dest == MacAddress::IDENTIFY_MULTICAST
}

/// Decode one inbound frame.
///
/// `Ok(None)` means the frame is not for us (wrong EtherType, a
/// non-control AVTP frame, or a subtype we don't speak) and is
/// silently ignored.  `Err` means the frame claimed to be AVDECC but
/// didn't parse; the caller logs and drops it.
pub fn parse_message(frame: &Bytes) -> Result<Option<Message>, PduError> {
    let mut buf = frame.clone();
    let eth = EtherHeader::parse(&mut buf)?;
    if eth.ether_type != ETHERTYPE_AVTP {
        return Ok(None);
    }
    if buf.remaining() < 1 {
        return Err(PduError::ShortFrame);
    }
    let subtype_byte = buf.chunk()[0];
    if subtype_byte & 0x80 == 0 {
        // Stream data frame: not ours.
        return Ok(None);
    }
    match AvtpSubtype::from_u8(subtype_byte & 0x7F) {
        AvtpSubtype::Adp => Ok(Some(Adpdu::parse(&eth, &mut buf)?.into())),
        AvtpSubtype::Aecp => Ok(Some(Aecpdu::parse(&eth, &mut buf)?.into())),
        AvtpSubtype::Acmp => Ok(Some(Acmpdu::parse(&eth, &mut buf)?.into())),
        AvtpSubtype::Experimental => Ok(None),
        AvtpSubtype::Unknown(n) => {
            trace!("ignoring AVTP subtype {n:#04x}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UniqueIdentifier;

    #[test]
    fn destination_filter() {
        let local = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let other = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x66]);
        assert!(accepts_destination(local, local));
        assert!(accepts_destination(MacAddress::ADP_ACMP_MULTICAST, local));
        assert!(accepts_destination(MacAddress::IDENTIFY_MULTICAST, local));
        assert!(!accepts_destination(other, local));
    }

    #[test]
    fn dispatches_by_subtype() {
        let adp = Adpdu {
            entity_id: UniqueIdentifier::new(0x1122334455667788),
            ..Default::default()
        };
        match parse_message(&adp.serialize().unwrap()).unwrap() {
            Some(Message::Adp(pdu)) => assert_eq!(pdu.entity_id.as_u64(), 0x1122334455667788),
            other => panic!("unexpected: {other:?}"),
        }

        let acmp = Acmpdu::default();
        assert!(matches!(
            parse_message(&acmp.serialize().unwrap()).unwrap(),
            Some(Message::Acmp(_))
        ));
    }

    #[test]
    fn foreign_ethertype_is_ignored() {
        let mut frame = Adpdu::default().serialize().unwrap().to_vec();
        frame[12] = 0x08;
        frame[13] = 0x00; // IPv4
        assert_eq!(parse_message(&Bytes::from(frame)).unwrap(), None);
    }

    #[test]
    fn data_subtype_is_ignored() {
        let mut frame = Adpdu::default().serialize().unwrap().to_vec();
        frame[14] = 0x02; // cd bit clear
        assert_eq!(parse_message(&Bytes::from(frame)).unwrap(), None);
    }

    #[test]
    fn truncated_avdecc_frame_is_an_error() {
        let frame = Adpdu::default().serialize().unwrap();
        let truncated = frame.slice(..30);
        assert!(parse_message(&truncated).is_err());
    }
}
