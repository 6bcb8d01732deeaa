//! Shared scaffolding for the state machine tests: an event-recording
//! observer, a frame sniffer and a scriptable AEM responder, all
//! talking over loopback interfaces.

use super::*;
use crate::endpoint::{EndpointSink, FrameEndpoint, LoopbackEndpoint};
use crate::entity::LocalEntityBuilder;
use bytes::{BufMut, BytesMut};
use parking_lot::Mutex as PlMutex;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

pub(crate) const CONTROLLER_MAC: MacAddress = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
pub(crate) const CONTROLLER_EID: u64 = 0x0011223355667788;
pub(crate) const TARGET_MAC: MacAddress = MacAddress([0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
pub(crate) const TARGET_EID: u64 = 0xAABBCCDDEEFF0011;

/// Observer that records every callback as a line in a log.
#[derive(Default)]
pub(crate) struct Recorder {
    pub log: PlMutex<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Recorder> {
        Arc::new(Recorder::default())
    }

    pub fn push(&self, line: impl Into<String>) {
        self.log.lock().push(line.into());
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    pub fn wait_for(&self, prefix: &str, want: usize, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.count(prefix) >= want {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl ManagerObserver for Recorder {
    fn on_local_entity_online(&self, id: UniqueIdentifier) {
        self.push(format!("local-online {id}"));
    }

    fn on_local_entity_offline(&self, id: UniqueIdentifier) {
        self.push(format!("local-offline {id}"));
    }

    fn on_remote_entity_online(&self, entity: &Entity) {
        self.push(format!("remote-online {}", entity.entity_id()));
    }

    fn on_remote_entity_updated(&self, entity: &Entity) {
        self.push(format!("remote-updated {}", entity.entity_id()));
    }

    fn on_remote_entity_offline(&self, id: UniqueIdentifier) {
        self.push(format!("remote-offline {id}"));
    }

    fn on_aecp_retry(&self, id: UniqueIdentifier) {
        self.push(format!("aecp-retry {id}"));
    }

    fn on_aecp_timeout(&self, id: UniqueIdentifier) {
        self.push(format!("aecp-timeout {id}"));
    }

    fn on_aecp_unexpected_response(&self, id: UniqueIdentifier) {
        self.push(format!("aecp-unexpected {id}"));
    }

    fn on_aecp_response_time(&self, id: UniqueIdentifier, _elapsed: Duration) {
        self.push(format!("aecp-response-time {id}"));
    }

    fn on_aecp_unsolicited_response(&self, id: UniqueIdentifier, _pdu: &Aecpdu) {
        self.push(format!("aecp-unsolicited {id}"));
    }

    fn on_aecp_aem_identify_notification(&self, pdu: &Aecpdu) {
        self.push(format!("aecp-identify {}", pdu.target_entity_id));
    }

    fn on_acmp_command(&self, pdu: &Acmpdu) {
        self.push(format!("acmp-command {}", pdu.sequence_id));
    }

    fn on_acmp_response(&self, pdu: &Acmpdu) {
        self.push(format!("acmp-sniffed {}", pdu.sequence_id));
    }

    fn on_transport_error(&self) {
        self.push("transport-error");
    }
}

/// A controller manager on a fresh loopback interface, with a recorder
/// attached.  Returns the endpoint so tests can attach peers.
pub(crate) fn controller_setup(
    interface: &str,
    config: ManagerConfig,
) -> (Arc<Manager>, Arc<LoopbackEndpoint>, Arc<Recorder>) {
    let endpoint = LoopbackEndpoint::attach(interface, CONTROLLER_MAC);
    let manager = Manager::new(endpoint.clone(), config);
    let recorder = Recorder::new();
    manager.add_observer(Arc::downgrade(&recorder) as Weak<dyn ManagerObserver>);
    let entity = LocalEntityBuilder::controller(UniqueIdentifier::new(CONTROLLER_EID), CONTROLLER_MAC)
        .build();
    manager.register_local_entity(entity).unwrap();
    (manager, endpoint, recorder)
}

/// How the scripted responder answers AEM commands.
pub(crate) enum ReplyMode {
    /// Never answer.
    Silent,
    /// Answer after `delay` with the given status and body.
    Reply {
        status: AemStatus,
        body: Bytes,
        delay: Duration,
    },
    /// Keep answering IN_PROGRESS every 150 ms, then send the real
    /// answer once, `after` the first command.
    InProgressThen {
        status: AemStatus,
        body: Bytes,
        after: Duration,
    },
}

/// A fake AEM target on the loopback interface: records the commands
/// it receives and answers per [`ReplyMode`].
pub(crate) struct Responder {
    pub endpoint: Arc<LoopbackEndpoint>,
    pub entity_id: UniqueIdentifier,
    pub mode: PlMutex<ReplyMode>,
    pub received: PlMutex<Vec<Aecpdu>>,
    pub final_sent: AtomicUsize,
}

impl Responder {
    pub fn attach(interface: &str, mode: ReplyMode) -> Arc<Responder> {
        let endpoint = LoopbackEndpoint::attach(interface, TARGET_MAC);
        let responder = Arc::new(Responder {
            endpoint: endpoint.clone(),
            entity_id: UniqueIdentifier::new(TARGET_EID),
            mode: PlMutex::new(mode),
            received: PlMutex::new(Vec::new()),
            final_sent: AtomicUsize::new(0),
        });
        endpoint.register_sink(Arc::downgrade(&responder) as Weak<dyn EndpointSink>);
        responder
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().len()
    }

    /// Announce this entity with the given advertised fields.
    pub fn announce(&self, valid_time: u8, available_index: u32) {
        let pdu = Adpdu {
            src_address: self.endpoint.mac_address(),
            message_type: AdpMessageType::EntityAvailable,
            valid_time,
            entity_id: self.entity_id,
            entity_model_id: UniqueIdentifier::new(0x0000_1122_3344_5566),
            available_index,
            ..Default::default()
        };
        self.endpoint.send_frame(pdu.serialize().unwrap()).unwrap();
    }

    fn reply(&self, command: &Aecpdu, status: AemStatus, body: Bytes) -> Aecpdu {
        let (command_type, _) = match &command.payload {
            AecpPayload::Aem { command_type, body, .. } => (*command_type, body.clone()),
            _ => (AemCommandType::GetConfiguration, Bytes::new()),
        };
        Aecpdu {
            dest_address: command.src_address,
            src_address: self.endpoint.mac_address(),
            message_type: AecpMessageType::AemResponse,
            status: status.as_u8(),
            target_entity_id: command.target_entity_id,
            controller_entity_id: command.controller_entity_id,
            sequence_id: command.sequence_id,
            payload: AecpPayload::Aem {
                unsolicited: false,
                command_type,
                body,
            },
        }
    }

    fn send_later(endpoint: Arc<LoopbackEndpoint>, frame: Bytes, delay: Duration) {
        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let _ = endpoint.send_frame(frame);
        });
    }
}

impl EndpointSink for Responder {
    fn on_frame(&self, frame: Bytes) {
        let Ok(Some(Message::Aecp(command))) = crate::dispatch::parse_message(&frame) else {
            return;
        };
        if command.message_type.is_response() || command.target_entity_id != self.entity_id {
            return;
        }
        self.received.lock().push(command.clone());
        match &*self.mode.lock() {
            ReplyMode::Silent => {}
            ReplyMode::Reply {
                status,
                body,
                delay,
            } => {
                let response = self.reply(&command, *status, body.clone());
                Self::send_later(
                    self.endpoint.clone(),
                    response.serialize().unwrap(),
                    *delay,
                );
            }
            ReplyMode::InProgressThen {
                status,
                body,
                after,
            } => {
                if self.final_sent.fetch_add(1, Ordering::SeqCst) == 0 {
                    let endpoint = self.endpoint.clone();
                    let in_progress = self
                        .reply(&command, AemStatus::InProgress, Bytes::new())
                        .serialize()
                        .unwrap();
                    let final_frame = self
                        .reply(&command, *status, body.clone())
                        .serialize()
                        .unwrap();
                    let after = *after;
                    std::thread::spawn(move || {
                        let started = Instant::now();
                        loop {
                            std::thread::sleep(Duration::from_millis(150));
                            if started.elapsed() >= after {
                                break;
                            }
                            let _ = endpoint.send_frame(in_progress.clone());
                        }
                        let _ = endpoint.send_frame(final_frame);
                    });
                } else {
                    // A lost IN_PROGRESS provoked a retry; keep the
                    // timer armed on that one too.
                    let in_progress = self.reply(&command, AemStatus::InProgress, Bytes::new());
                    Self::send_later(
                        self.endpoint.clone(),
                        in_progress.serialize().unwrap(),
                        Duration::ZERO,
                    );
                }
            }
        }
    }

    fn on_transport_error(&self) {}
}
