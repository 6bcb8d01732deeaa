/*! An in-process endpoint: every endpoint attached to the same virtual
interface name sees every frame any of them sends.

Frames pass through one FIFO per interface, drained by a dispatch
thread, so delivery order equals send order regardless of which
endpoint sent.  Tearing the interface down (or
[`LoopbackEndpoint::force_transport_error`]) signals
`on_transport_error` exactly once to every sink still attached.
*/

use crate::dispatch::accepts_destination;
use crate::endpoint::{EndpointSink, FrameEndpoint};
use crate::error::TransportError;
use crate::pdu::EtherHeader;
use crate::types::MacAddress;
use bytes::{Buf, Bytes};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::JoinHandle;
use tracing::*;

enum HubEvent {
    Frame(Bytes),
    /// Terminal failure of the whole virtual interface.
    Fail,
}

struct Subscriber {
    id: usize,
    mac: MacAddress,
    sink: Mutex<Option<Weak<dyn EndpointSink>>>,
}

struct Hub {
    name: String,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    failed: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Hub {
    fn dispatch_loop(self: &Arc<Hub>, rx: Receiver<HubEvent>) {
        for event in rx.iter() {
            match event {
                HubEvent::Frame(frame) => {
                    if frame.len() < EtherHeader::LENGTH {
                        continue;
                    }
                    let dest = {
                        let mut buf = frame.clone();
                        let mut mac = [0u8; 6];
                        buf.copy_to_slice(&mut mac);
                        MacAddress(mac)
                    };
                    let subscribers = self.subscribers.lock().clone();
                    for sub in subscribers {
                        if !accepts_destination(dest, sub.mac) {
                            continue;
                        }
                        let sink = sub.sink.lock().clone();
                        if let Some(sink) = sink.and_then(|weak| weak.upgrade()) {
                            sink.on_frame(frame.clone());
                        }
                    }
                }
                HubEvent::Fail => {
                    if self.failed.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    warn!("virtual interface {} failed, notifying sinks", self.name);
                    let subscribers = self.subscribers.lock().clone();
                    for sub in subscribers {
                        let sink = sub.sink.lock().clone();
                        if let Some(sink) = sink.and_then(|weak| weak.upgrade()) {
                            sink.on_transport_error();
                        }
                    }
                }
            }
        }
    }
}

type HubRegistry = Mutex<HashMap<String, (Arc<Hub>, Sender<HubEvent>)>>;

fn hubs() -> &'static HubRegistry {
    static HUBS: OnceLock<HubRegistry> = OnceLock::new();
    HUBS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn hub_for(name: &str) -> (Arc<Hub>, Sender<HubEvent>) {
    let mut map = hubs().lock();
    if let Some((hub, tx)) = map.get(name) {
        return (hub.clone(), tx.clone());
    }
    let (tx, rx) = unbounded();
    let hub = Arc::new(Hub {
        name: name.to_owned(),
        subscribers: Mutex::new(Vec::new()),
        failed: AtomicBool::new(false),
        thread: Mutex::new(None),
    });
    let hub2 = hub.clone();
    let handle = std::thread::Builder::new()
        .name(format!("avdecc-loopback-{name}"))
        .spawn(move || hub2.dispatch_loop(rx))
        .expect("failed to spawn loopback dispatch thread");
    *hub.thread.lock() = Some(handle);
    map.insert(name.to_owned(), (hub.clone(), tx.clone()));
    (hub, tx)
}

/// One station on a named virtual interface.
pub struct LoopbackEndpoint {
    hub: Arc<Hub>,
    subscriber: Arc<Subscriber>,
    /// Dropped before the dispatch thread is joined.
    tx: Option<Sender<HubEvent>>,
}

static NEXT_SUBSCRIBER_ID: AtomicUsize = AtomicUsize::new(0);

impl LoopbackEndpoint {
    /// Attach a new station with the given MAC to `interface_name`,
    /// creating the virtual interface on first use.
    pub fn attach(interface_name: &str, mac: MacAddress) -> Arc<LoopbackEndpoint> {
        let (hub, tx) = hub_for(interface_name);
        let subscriber = Arc::new(Subscriber {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            mac,
            sink: Mutex::new(None),
        });
        hub.subscribers.lock().push(subscriber.clone());
        debug!("attached {mac} to virtual interface {interface_name}");
        Arc::new(LoopbackEndpoint {
            hub,
            subscriber,
            tx: Some(tx),
        })
    }

    /// Fail the whole virtual interface, as if the cable was pulled.
    /// Every attached sink gets `on_transport_error` exactly once.
    pub fn force_transport_error(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(HubEvent::Fail);
        }
    }
}

impl FrameEndpoint for LoopbackEndpoint {
    fn mac_address(&self) -> MacAddress {
        self.subscriber.mac
    }

    fn send_frame(&self, frame: Bytes) -> Result<(), TransportError> {
        if self.hub.failed.load(Ordering::SeqCst) {
            return Err(TransportError::NotAvailable);
        }
        match &self.tx {
            Some(tx) => tx
                .send(HubEvent::Frame(frame))
                .map_err(|_| TransportError::SendFailed),
            None => Err(TransportError::NotAvailable),
        }
    }

    fn register_sink(&self, sink: Weak<dyn EndpointSink>) {
        *self.subscriber.sink.lock() = Some(sink);
    }

    fn is_available(&self) -> bool {
        !self.hub.failed.load(Ordering::SeqCst)
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        let last = {
            let mut subs = self.hub.subscribers.lock();
            subs.retain(|s| s.id != self.subscriber.id);
            subs.is_empty()
        };
        if !last {
            return;
        }
        // Tear the interface down.  Dropping the registry's sender and
        // ours disconnects the channel; the dispatch thread drains the
        // queue and exits.
        {
            let mut map = hubs().lock();
            if map
                .get(&self.hub.name)
                .is_some_and(|(h, _)| Arc::ptr_eq(h, &self.hub))
            {
                map.remove(&self.hub.name);
            }
        }
        self.tx = None;
        if let Some(handle) = self.hub.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    struct RecordingSink {
        frames: PlMutex<Vec<Bytes>>,
        errors: AtomicUsize,
    }

    impl RecordingSink {
        fn new() -> Arc<RecordingSink> {
            Arc::new(RecordingSink {
                frames: PlMutex::new(Vec::new()),
                errors: AtomicUsize::new(0),
            })
        }
    }

    impl EndpointSink for RecordingSink {
        fn on_frame(&self, frame: Bytes) {
            self.frames.lock().push(frame);
        }

        fn on_transport_error(&self) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame_to(dest: MacAddress, src: MacAddress, tag: u8) -> Bytes {
        let mut buf = bytes::BytesMut::new();
        EtherHeader::avtp(dest, src).serialize(&mut buf);
        buf.extend_from_slice(&[tag; 46]);
        buf.freeze()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn fanout_respects_destination_filter() {
        let mac_a = MacAddress([0x02, 0, 0, 0, 0, 0x0A]);
        let mac_b = MacAddress([0x02, 0, 0, 0, 0, 0x0B]);
        let a = LoopbackEndpoint::attach("fanout-test", mac_a);
        let b = LoopbackEndpoint::attach("fanout-test", mac_b);
        let sink_a = RecordingSink::new();
        let sink_b = RecordingSink::new();
        a.register_sink(Arc::downgrade(&sink_a) as Weak<dyn EndpointSink>);
        b.register_sink(Arc::downgrade(&sink_b) as Weak<dyn EndpointSink>);

        // Unicast to B: only B sees it.
        a.send_frame(frame_to(mac_b, mac_a, 1)).unwrap();
        // Multicast: both see it.
        a.send_frame(frame_to(MacAddress::ADP_ACMP_MULTICAST, mac_a, 2))
            .unwrap();

        wait_until(|| sink_b.frames.lock().len() == 2);
        wait_until(|| sink_a.frames.lock().len() == 1);
    }

    #[test]
    fn delivery_preserves_send_order() {
        let mac_a = MacAddress([0x02, 0, 0, 0, 0, 0x1A]);
        let mac_b = MacAddress([0x02, 0, 0, 0, 0, 0x1B]);
        let a = LoopbackEndpoint::attach("order-test", mac_a);
        let b = LoopbackEndpoint::attach("order-test", mac_b);
        let sink_b = RecordingSink::new();
        b.register_sink(Arc::downgrade(&sink_b) as Weak<dyn EndpointSink>);

        for tag in 0..32u8 {
            a.send_frame(frame_to(mac_b, mac_a, tag)).unwrap();
        }
        wait_until(|| sink_b.frames.lock().len() == 32);
        let frames = sink_b.frames.lock();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame[EtherHeader::LENGTH], i as u8);
        }
    }

    #[test]
    fn forced_error_reaches_every_sink_once() {
        let mac_a = MacAddress([0x02, 0, 0, 0, 0, 0x2A]);
        let mac_b = MacAddress([0x02, 0, 0, 0, 0, 0x2B]);
        let a = LoopbackEndpoint::attach("error-test", mac_a);
        let b = LoopbackEndpoint::attach("error-test", mac_b);
        let sink_a = RecordingSink::new();
        let sink_b = RecordingSink::new();
        a.register_sink(Arc::downgrade(&sink_a) as Weak<dyn EndpointSink>);
        b.register_sink(Arc::downgrade(&sink_b) as Weak<dyn EndpointSink>);

        a.force_transport_error();
        a.force_transport_error();
        wait_until(|| sink_a.errors.load(Ordering::SeqCst) == 1);
        wait_until(|| sink_b.errors.load(Ordering::SeqCst) == 1);
        assert!(!a.is_available());
        assert_eq!(
            a.send_frame(frame_to(mac_b, mac_a, 0)),
            Err(TransportError::NotAvailable)
        );
    }
}
