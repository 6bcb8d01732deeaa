/*! The 64-bit packed stream format descriptor.

Three families are understood: IEC 61883-6 (AM824 audio over 1394-style
framing), AAF (AVTP audio) and CRF (clock reference).  Formats are kept
packed; [`StreamFormat::info`] unpacks the fields we reason about and
the builders pack them back bit-exactly.
*/

use std::fmt;

/// A packed stream format, as carried in STREAM descriptors and
/// SET/GET_STREAM_FORMAT commands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamFormat(u64);

/// AAF sample container (IEEE 1722 table 11).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SampleFormat {
    Float32,
    Int32,
    Int24,
    Int16,
}

impl SampleFormat {
    fn aaf_code(self) -> u8 {
        match self {
            SampleFormat::Float32 => 1,
            SampleFormat::Int32 => 2,
            SampleFormat::Int24 => 3,
            SampleFormat::Int16 => 4,
        }
    }

    fn from_aaf_code(code: u8) -> Option<SampleFormat> {
        Some(match code {
            1 => SampleFormat::Float32,
            2 => SampleFormat::Int32,
            3 => SampleFormat::Int24,
            4 => SampleFormat::Int16,
            _ => return None,
        })
    }
}

/// The unpacked fields of a format we know how to reason about.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StreamFormatInfo {
    Iec61883_6 {
        /// Channel count, or the maximum when `up_to_channels` is set.
        channels: u16,
        up_to_channels: bool,
        sample_rate_hz: u32,
        /// Talker's media clock is synchronous to the gPTP domain.
        synchronous_clock: bool,
    },
    Aaf {
        channels: u16,
        up_to_channels: bool,
        sample_rate_hz: u32,
        sample_format: SampleFormat,
        bit_depth: u8,
        samples_per_frame: u16,
    },
    Crf {
        sample_rate_hz: u32,
        timestamp_interval: u16,
        timestamps_per_pdu: u8,
    },
}

const SUBTYPE_61883: u8 = 0x00;
const SUBTYPE_AAF: u8 = 0x02;
const SUBTYPE_CRF: u8 = 0x04;

fn sfc_from_rate(rate_hz: u32) -> Option<u8> {
    Some(match rate_hz {
        32_000 => 0,
        44_100 => 1,
        48_000 => 2,
        88_200 => 3,
        96_000 => 4,
        176_400 => 5,
        192_000 => 6,
        _ => return None,
    })
}

fn rate_from_sfc(sfc: u8) -> Option<u32> {
    Some(match sfc {
        0 => 32_000,
        1 => 44_100,
        2 => 48_000,
        3 => 88_200,
        4 => 96_000,
        5 => 176_400,
        6 => 192_000,
        _ => return None,
    })
}

fn nsr_from_rate(rate_hz: u32) -> Option<u8> {
    Some(match rate_hz {
        8_000 => 1,
        16_000 => 2,
        32_000 => 3,
        44_100 => 4,
        48_000 => 5,
        88_200 => 6,
        96_000 => 7,
        176_400 => 8,
        192_000 => 9,
        24_000 => 10,
        _ => return None,
    })
}

fn rate_from_nsr(nsr: u8) -> Option<u32> {
    Some(match nsr {
        1 => 8_000,
        2 => 16_000,
        3 => 32_000,
        4 => 44_100,
        5 => 48_000,
        6 => 88_200,
        7 => 96_000,
        8 => 176_400,
        9 => 192_000,
        10 => 24_000,
        _ => return None,
    })
}

impl StreamFormat {
    pub const fn new(value: u64) -> StreamFormat {
        StreamFormat(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Pack an IEC 61883-6 AM824 format.  Only 24-bit MBLA audio is
    /// representable; any other sample format returns `None`.
    pub fn iec_61883_6(
        channels: u16,
        up_to_channels: bool,
        sample_rate_hz: u32,
        sample_format: SampleFormat,
        synchronous_clock: bool,
    ) -> Option<StreamFormat> {
        if sample_format != SampleFormat::Int24 || channels == 0 || channels > 0xFF {
            return None;
        }
        let sfc = sfc_from_rate(sample_rate_hz)?;
        let mut b4 = 0x40u64; // nb: non-blocking transmission
        if up_to_channels {
            b4 |= 0x20;
        }
        if synchronous_clock {
            b4 |= 0x10;
        }
        let value = (u64::from(SUBTYPE_61883) << 56)
            | (0xA0u64 << 48) // sf=1, fmt=61883-6
            | (u64::from(sfc) << 40)
            | (u64::from(channels as u8) << 32) // dbs
            | (b4 << 24)
            | (u64::from(channels as u8) << 8); // label_mbla_cnt
        Some(StreamFormat(value))
    }

    /// Pack an AAF PCM format.
    pub fn aaf(
        channels: u16,
        up_to_channels: bool,
        sample_rate_hz: u32,
        sample_format: SampleFormat,
        bit_depth: u8,
        samples_per_frame: u16,
    ) -> Option<StreamFormat> {
        if channels == 0 || channels > 0x3FF || samples_per_frame > 0x3FF {
            return None;
        }
        let nsr = nsr_from_rate(sample_rate_hz)?;
        let mut b1 = nsr & 0x0F;
        if up_to_channels {
            b1 |= 0x40;
        }
        let value = (u64::from(SUBTYPE_AAF) << 56)
            | (u64::from(b1) << 48)
            | (u64::from(sample_format.aaf_code()) << 40)
            | (u64::from(bit_depth) << 32)
            | (u64::from(channels >> 2) << 24)
            | (u64::from((((channels & 0x3) as u8) << 6) | ((samples_per_frame >> 4) as u8)) << 16)
            | (u64::from(((samples_per_frame & 0xF) as u8) << 4) << 8);
        Some(StreamFormat(value))
    }

    /// Pack a CRF AUDIO_SAMPLE format.
    pub fn crf_audio_sample(
        sample_rate_hz: u32,
        timestamp_interval: u16,
        timestamps_per_pdu: u8,
    ) -> Option<StreamFormat> {
        if timestamp_interval > 0x0FFF || sample_rate_hz > 0x1FFF_FFFF {
            return None;
        }
        let value = (u64::from(SUBTYPE_CRF) << 56)
            | (0x1u64 << 52) // type: audio sample
            | (u64::from(timestamp_interval) << 40)
            | (u64::from(timestamps_per_pdu) << 32)
            | u64::from(sample_rate_hz); // pull = 1x
        Some(StreamFormat(value))
    }

    /// Unpack the fields, or `None` for a family we don't model.
    pub fn info(self) -> Option<StreamFormatInfo> {
        let b = self.0.to_be_bytes();
        match b[0] {
            SUBTYPE_61883 => {
                // sf=1, fmt=61883-6 is the only layout we speak
                if b[1] != 0xA0 {
                    return None;
                }
                Some(StreamFormatInfo::Iec61883_6 {
                    channels: u16::from(b[3]),
                    up_to_channels: b[4] & 0x20 != 0,
                    sample_rate_hz: rate_from_sfc(b[2] & 0x07)?,
                    synchronous_clock: b[4] & 0x10 != 0,
                })
            }
            SUBTYPE_AAF => Some(StreamFormatInfo::Aaf {
                channels: (u16::from(b[4]) << 2) | u16::from(b[5] >> 6),
                up_to_channels: b[1] & 0x40 != 0,
                sample_rate_hz: rate_from_nsr(b[1] & 0x0F)?,
                sample_format: SampleFormat::from_aaf_code(b[2])?,
                bit_depth: b[3],
                samples_per_frame: (u16::from(b[5] & 0x3F) << 4) | u16::from(b[6] >> 4),
            }),
            SUBTYPE_CRF => {
                if b[1] >> 4 != 0x1 {
                    return None;
                }
                Some(StreamFormatInfo::Crf {
                    sample_rate_hz: (u32::from_be_bytes([b[4], b[5], b[6], b[7]])) & 0x1FFF_FFFF,
                    timestamp_interval: (u16::from(b[1] & 0x0F) << 8) | u16::from(b[2]),
                    timestamps_per_pdu: b[3],
                })
            }
            _ => None,
        }
    }

    /// Turn an up-to format into the concrete format with `channels`
    /// channels.  Fails if the count exceeds the declared maximum, or
    /// differs from a fixed format's channel count.
    pub fn adapt_to_channel_count(self, channels: u16) -> Option<StreamFormat> {
        match self.info()? {
            StreamFormatInfo::Iec61883_6 {
                channels: max,
                up_to_channels,
                sample_rate_hz,
                synchronous_clock,
            } => {
                if up_to_channels {
                    if channels == 0 || channels > max {
                        return None;
                    }
                    StreamFormat::iec_61883_6(
                        channels,
                        false,
                        sample_rate_hz,
                        SampleFormat::Int24,
                        synchronous_clock,
                    )
                } else if channels == max {
                    Some(self)
                } else {
                    None
                }
            }
            StreamFormatInfo::Aaf {
                channels: max,
                up_to_channels,
                sample_rate_hz,
                sample_format,
                bit_depth,
                samples_per_frame,
            } => {
                if up_to_channels {
                    if channels == 0 || channels > max {
                        return None;
                    }
                    StreamFormat::aaf(
                        channels,
                        false,
                        sample_rate_hz,
                        sample_format,
                        bit_depth,
                        samples_per_frame,
                    )
                } else if channels == max {
                    Some(self)
                } else {
                    None
                }
            }
            StreamFormatInfo::Crf { .. } => None,
        }
    }

    /// Whether a listener using `listener` can consume the stream a
    /// talker produces as `talker`.
    pub fn are_compatible(listener: StreamFormat, talker: StreamFormat) -> bool {
        listener == talker || Self::adapted_compatible_pair(listener, talker).is_some()
    }

    /// Intersect two possibly up-to formats into the concrete pair both
    /// ends can run (lowest common channel count).  Returns
    /// `(listener, talker)` or `None` when incompatible.
    pub fn adapted_compatible_pair(
        listener: StreamFormat,
        talker: StreamFormat,
    ) -> Option<(StreamFormat, StreamFormat)> {
        use StreamFormatInfo::*;
        match (listener.info()?, talker.info()?) {
            (
                Iec61883_6 {
                    channels: lch,
                    up_to_channels: lut,
                    sample_rate_hz: lrate,
                    synchronous_clock: lsync,
                },
                Iec61883_6 {
                    channels: tch,
                    up_to_channels: tut,
                    sample_rate_hz: trate,
                    synchronous_clock: tsync,
                },
            ) => {
                if lrate != trate {
                    return None;
                }
                // An asynchronous talker cannot feed a listener that
                // requires a synchronous media clock.
                if lsync && !tsync {
                    return None;
                }
                let channels = common_channel_count(lch, lut, tch, tut)?;
                Some((
                    listener.adapt_to_channel_count(channels)?,
                    talker.adapt_to_channel_count(channels)?,
                ))
            }
            (
                Aaf {
                    channels: lch,
                    up_to_channels: lut,
                    sample_rate_hz: lrate,
                    sample_format: lfmt,
                    samples_per_frame: lspf,
                    ..
                },
                Aaf {
                    channels: tch,
                    up_to_channels: tut,
                    sample_rate_hz: trate,
                    sample_format: tfmt,
                    samples_per_frame: tspf,
                    ..
                },
            ) => {
                // Bit depth may differ inside the same container.
                if lrate != trate || lfmt != tfmt || lspf != tspf {
                    return None;
                }
                let channels = common_channel_count(lch, lut, tch, tut)?;
                Some((
                    listener.adapt_to_channel_count(channels)?,
                    talker.adapt_to_channel_count(channels)?,
                ))
            }
            (Crf { .. }, Crf { .. }) => {
                if listener == talker {
                    Some((listener, talker))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn common_channel_count(lch: u16, lut: bool, tch: u16, tut: bool) -> Option<u16> {
    match (lut, tut) {
        (true, true) => Some(lch.min(tch)),
        (true, false) => (tch <= lch).then_some(tch),
        (false, true) => (lch <= tch).then_some(lch),
        (false, false) => (lch == tch).then_some(lch),
    }
}

impl fmt::Debug for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamFormat({:#018x})", self.0)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_iec_61883_6() {
        let fmt = StreamFormat::iec_61883_6(1, false, 48_000, SampleFormat::Int24, false).unwrap();
        assert_eq!(fmt.as_u64(), 0x00A0020140000100);
        let fmt = StreamFormat::iec_61883_6(8, false, 48_000, SampleFormat::Int24, true).unwrap();
        assert_eq!(fmt.as_u64(), 0x00A0020850000800);
    }

    #[test]
    fn pack_aaf() {
        let fmt = StreamFormat::aaf(8, false, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        assert_eq!(fmt.as_u64(), 0x0205041002040000);
    }

    #[test]
    fn pack_crf() {
        let fmt = StreamFormat::crf_audio_sample(48_000, 6, 1).unwrap();
        assert_eq!(fmt.as_u64(), 0x041006010000bb80);
    }

    #[test]
    fn unpack_inverts_pack() {
        let fmt = StreamFormat::iec_61883_6(4, true, 96_000, SampleFormat::Int24, true).unwrap();
        assert_eq!(
            fmt.info(),
            Some(StreamFormatInfo::Iec61883_6 {
                channels: 4,
                up_to_channels: true,
                sample_rate_hz: 96_000,
                synchronous_clock: true,
            })
        );
        let fmt = StreamFormat::aaf(6, true, 44_100, SampleFormat::Int32, 24, 12).unwrap();
        assert_eq!(
            fmt.info(),
            Some(StreamFormatInfo::Aaf {
                channels: 6,
                up_to_channels: true,
                sample_rate_hz: 44_100,
                sample_format: SampleFormat::Int32,
                bit_depth: 24,
                samples_per_frame: 12,
            })
        );
        let fmt = StreamFormat::crf_audio_sample(48_000, 6, 1).unwrap();
        assert_eq!(
            fmt.info(),
            Some(StreamFormatInfo::Crf {
                sample_rate_hz: 48_000,
                timestamp_interval: 6,
                timestamps_per_pdu: 1,
            })
        );
    }

    #[test]
    fn incompatible_families_and_rates() {
        let iec = StreamFormat::iec_61883_6(2, false, 48_000, SampleFormat::Int24, false).unwrap();
        let aaf = StreamFormat::aaf(2, false, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        assert!(!StreamFormat::are_compatible(iec, aaf));

        let rate_a = StreamFormat::aaf(2, false, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        let rate_b = StreamFormat::aaf(2, false, 96_000, SampleFormat::Int16, 16, 64).unwrap();
        assert!(!StreamFormat::are_compatible(rate_a, rate_b));
    }

    #[test]
    fn async_talker_cannot_feed_sync_listener() {
        let listener =
            StreamFormat::iec_61883_6(2, false, 48_000, SampleFormat::Int24, true).unwrap();
        let talker =
            StreamFormat::iec_61883_6(2, false, 48_000, SampleFormat::Int24, false).unwrap();
        assert!(!StreamFormat::are_compatible(listener, talker));
        // The other direction is fine.
        assert!(StreamFormat::are_compatible(talker, listener));
    }

    #[test]
    fn bit_depth_may_differ_within_container() {
        let listener = StreamFormat::aaf(2, false, 48_000, SampleFormat::Int32, 32, 6).unwrap();
        let talker = StreamFormat::aaf(2, false, 48_000, SampleFormat::Int32, 24, 6).unwrap();
        assert!(StreamFormat::are_compatible(listener, talker));
    }

    #[test]
    fn same_format_is_compatible() {
        let fmt = StreamFormat::aaf(8, false, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        assert!(StreamFormat::are_compatible(fmt, fmt));
    }

    #[test]
    fn adapted_pair_picks_lowest_common_count() {
        let listener = StreamFormat::aaf(8, true, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        let talker = StreamFormat::aaf(6, true, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        let (l, t) = StreamFormat::adapted_compatible_pair(listener, talker).unwrap();
        for info in [l.info().unwrap(), t.info().unwrap()] {
            match info {
                StreamFormatInfo::Aaf {
                    channels,
                    up_to_channels,
                    ..
                } => {
                    assert_eq!(channels, 6);
                    assert!(!up_to_channels);
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn adapted_pair_rejects_disjoint_counts() {
        let listener = StreamFormat::aaf(2, false, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        let talker = StreamFormat::aaf(8, false, 48_000, SampleFormat::Int16, 16, 64).unwrap();
        assert!(StreamFormat::adapted_compatible_pair(listener, talker).is_none());
    }

    #[test]
    fn adapt_to_channel_count() {
        let up_to = StreamFormat::iec_61883_6(8, true, 48_000, SampleFormat::Int24, false).unwrap();
        let adapted = up_to.adapt_to_channel_count(3).unwrap();
        assert_eq!(
            adapted.info(),
            Some(StreamFormatInfo::Iec61883_6 {
                channels: 3,
                up_to_channels: false,
                sample_rate_hz: 48_000,
                synchronous_clock: false,
            })
        );
        assert!(up_to.adapt_to_channel_count(9).is_none());

        let fixed = StreamFormat::iec_61883_6(2, false, 48_000, SampleFormat::Int24, false).unwrap();
        assert_eq!(fixed.adapt_to_channel_count(2), Some(fixed));
        assert!(fixed.adapt_to_channel_count(1).is_none());
    }
}
