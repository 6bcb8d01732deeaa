/*! Wire codecs for the three AVDECC PDU families.

Every PDU serializes to a complete Ethernet frame (header, AVTP control
header, payload, zero padding up to the 60-byte wire minimum) and parses
back bit-for-bit, reserved fields included.
*/

mod acmp;
mod adp;
mod aecp;
mod avtp;
mod ethernet;
mod util;

pub use self::acmp::*;
pub use self::adp::*;
pub use self::aecp::*;
pub use self::avtp::*;
pub use self::ethernet::*;
pub use self::util::PduError;

pub(crate) use self::util::ensure_remaining;

/// A decoded AVDECC message of any family.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Message {
    Adp(Adpdu),
    Aecp(Aecpdu),
    Acmp(Acmpdu),
}

impl From<Adpdu> for Message {
    fn from(pdu: Adpdu) -> Self {
        Message::Adp(pdu)
    }
}

impl From<Aecpdu> for Message {
    fn from(pdu: Aecpdu) -> Self {
        Message::Aecp(pdu)
    }
}

impl From<Acmpdu> for Message {
    fn from(pdu: Acmpdu) -> Self {
        Message::Acmp(pdu)
    }
}

impl Message {
    pub fn serialize(&self) -> Result<bytes::Bytes, PduError> {
        match self {
            Message::Adp(pdu) => pdu.serialize(),
            Message::Aecp(pdu) => pdu.serialize(),
            Message::Acmp(pdu) => pdu.serialize(),
        }
    }
}
