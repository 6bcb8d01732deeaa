/*! The frame endpoint seam.

The state machines never touch packet capture directly: they hand
serialized frames to a [`FrameEndpoint`] and get inbound frames back
through an [`EndpointSink`].  Two endpoints ship with the crate: the
in-process [`LoopbackEndpoint`] used by tests and virtual setups, and a
libpcap-backed capture endpoint behind the `capture` feature.
*/

#[cfg(feature = "capture")]
mod capture;
mod loopback;

#[cfg(feature = "capture")]
pub use self::capture::CaptureEndpoint;
pub use self::loopback::LoopbackEndpoint;

use crate::error::TransportError;
use crate::types::MacAddress;
use bytes::Bytes;
use std::sync::Weak;

/// Receives what the endpoint reads off the wire.
///
/// `on_frame` is called from the endpoint's own thread, in arrival
/// order, only for frames that pass the destination filter.
/// `on_transport_error` signals terminal endpoint failure and is
/// delivered at most once.
pub trait EndpointSink: Send + Sync {
    fn on_frame(&self, frame: Bytes);
    fn on_transport_error(&self);
}

/// A bidirectional layer-2 frame pipe bound to one network interface.
pub trait FrameEndpoint: Send + Sync {
    /// The MAC address frames are sent from (and filtered against).
    fn mac_address(&self) -> MacAddress;

    /// Enqueue one serialized frame for transmission.
    fn send_frame(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Register the inbound sink.  Frames arriving before a sink is
    /// registered are dropped.
    fn register_sink(&self, sink: Weak<dyn EndpointSink>);

    /// False once the endpoint has failed terminally.
    fn is_available(&self) -> bool;
}
