/*! A libpcap-backed endpoint (`capture` feature).

Two pcap handles are opened on the same interface: one owned by the
capture thread for reading, one behind a mutex for injection, so sends
never wait on the read timeout.
*/

use crate::dispatch::accepts_destination;
use crate::endpoint::{EndpointSink, FrameEndpoint};
use crate::error::TransportError;
use crate::pdu::ETHERTYPE_AVTP;
use crate::types::MacAddress;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::*;

pub struct CaptureEndpoint {
    mac: MacAddress,
    tx: Mutex<pcap::Capture<pcap::Active>>,
    sink: Arc<SinkSlot>,
    available: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct SinkSlot(Mutex<Option<Weak<dyn EndpointSink>>>);

impl SinkSlot {
    fn get(&self) -> Option<Arc<dyn EndpointSink>> {
        self.0.lock().clone().and_then(|weak| weak.upgrade())
    }
}

fn open_capture(device: &str) -> Result<pcap::Capture<pcap::Active>, pcap::Error> {
    let mut cap = pcap::Capture::from_device(device)?
        .promisc(true)
        .snaplen(2048)
        .timeout(10)
        .immediate_mode(true)
        .open()?;
    cap.filter(&format!("ether proto {ETHERTYPE_AVTP:#06x}"), true)?;
    Ok(cap)
}

impl CaptureEndpoint {
    /// Open `device` for AVDECC traffic.  The local MAC must be the
    /// device's address; it seeds the destination filter.
    pub fn open(device: &str, mac: MacAddress) -> Result<Arc<CaptureEndpoint>, pcap::Error> {
        let mut rx = open_capture(device)?;
        let tx = open_capture(device)?;

        let sink = Arc::new(SinkSlot::default());
        let available = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));

        let sink2 = sink.clone();
        let available2 = available.clone();
        let stop2 = stop.clone();
        let device_name = device.to_owned();
        let thread = std::thread::Builder::new()
            .name(format!("avdecc-capture-{device}"))
            .spawn(move || {
                loop {
                    if stop2.load(Ordering::SeqCst) {
                        break;
                    }
                    match rx.next_packet() {
                        Ok(packet) => {
                            if packet.data.len() < 14 {
                                continue;
                            }
                            let mut dest = [0u8; 6];
                            dest.copy_from_slice(&packet.data[..6]);
                            if !accepts_destination(MacAddress(dest), mac) {
                                continue;
                            }
                            if let Some(sink) = sink2.get() {
                                sink.on_frame(Bytes::copy_from_slice(packet.data));
                            }
                        }
                        Err(pcap::Error::TimeoutExpired) => continue,
                        Err(e) => {
                            warn!("capture on {device_name} failed: {e}");
                            available2.store(false, Ordering::SeqCst);
                            if let Some(sink) = sink2.get() {
                                sink.on_transport_error();
                            }
                            break;
                        }
                    }
                }
            })
            .map_err(|_| pcap::Error::PcapError("failed to spawn capture thread".into()))?;

        Ok(Arc::new(CaptureEndpoint {
            mac,
            tx: Mutex::new(tx),
            sink,
            available,
            stop,
            thread: Mutex::new(Some(thread)),
        }))
    }
}

impl FrameEndpoint for CaptureEndpoint {
    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn send_frame(&self, frame: Bytes) -> Result<(), TransportError> {
        if !self.is_available() {
            return Err(TransportError::NotAvailable);
        }
        self.tx
            .lock()
            .sendpacket(&frame[..])
            .map_err(|_| TransportError::SendFailed)
    }

    fn register_sink(&self, sink: Weak<dyn EndpointSink>) {
        *self.sink.0.lock() = Some(sink);
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureEndpoint {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}
