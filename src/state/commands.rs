/*! The command state machine.

Every AECP/ACMP command a local entity sends is tracked in an inflight
table until its response arrives or its timeout (with one retry) runs
out.  AECP inflight is capped per target; the overflow queues and is
promoted as slots free up.  ACMP matches responses by sequence id and
the command/response pairing, because talkers answer listener-side
commands from a different source address.
*/

use super::{Action, LocalEntityState, ManagerConfig, ManagerState, Notify, Outbox};
use crate::endpoint::FrameEndpoint;
use crate::error::{CommandStatus, RegistrationError};
use crate::pdu::*;
use crate::types::*;
use std::time::{Duration, Instant};
use tracing::*;

/// Completion callback of an AECP command: the response (when one
/// arrived) and the outcome.  Called exactly once, with the manager
/// lock held.
pub type AecpResultHandler = Box<dyn FnOnce(Option<&Aecpdu>, CommandStatus) + Send>;
/// Completion callback of an ACMP command.
pub type AcmpResultHandler = Box<dyn FnOnce(Option<&Acmpdu>, CommandStatus) + Send>;

pub(crate) struct AecpCommandEntry {
    pub sequence_id: AecpSequenceId,
    pub pdu: Aecpdu,
    pub deadline: Instant,
    pub sent_at: Instant,
    pub retried: bool,
    pub handler: Option<AecpResultHandler>,
}

pub(crate) struct AcmpCommandEntry {
    pub pdu: Acmpdu,
    pub deadline: Instant,
    pub retried: bool,
    pub handler: Option<AcmpResultHandler>,
}

/// AECP command timeouts (clause 9.2.1).  Vendor Unique protocols may
/// override the default through the manager config.
const AECP_COMMAND_TIMEOUT: Duration = Duration::from_millis(250);

fn aecp_timeout(pdu: &Aecpdu, config: &ManagerConfig) -> Duration {
    match pdu.message_type {
        AecpMessageType::VendorUniqueCommand => pdu
            .vendor_protocol_id()
            .and_then(|pid| config.vu_timeouts.get(&pid).copied())
            .unwrap_or(AECP_COMMAND_TIMEOUT),
        _ => AECP_COMMAND_TIMEOUT,
    }
}

/// ACMP command timeouts (clause 8.2.2).
fn acmp_timeout(message_type: AcmpMessageType) -> Duration {
    use AcmpMessageType::*;
    Duration::from_millis(match message_type {
        ConnectTxCommand => 2000,
        DisconnectTxCommand => 200,
        GetTxStateCommand => 200,
        ConnectRxCommand => 4500,
        DisconnectRxCommand => 500,
        GetRxStateCommand => 200,
        GetTxConnectionCommand => 200,
        _ => 250,
    })
}

/// Map a response PDU's 5-bit status onto the handler-visible outcome.
fn aecp_response_status(pdu: &Aecpdu) -> CommandStatus {
    match pdu.message_type {
        AecpMessageType::AemResponse => match AemStatus::from_u8(pdu.status) {
            AemStatus::Success => CommandStatus::Success,
            status => CommandStatus::Aem(status),
        },
        AecpMessageType::AddressAccessResponse => match AaStatus::from_u8(pdu.status) {
            AaStatus::Success => CommandStatus::Success,
            status => CommandStatus::Aa(status),
        },
        AecpMessageType::VendorUniqueResponse => match MvuStatus::from_u8(pdu.status) {
            MvuStatus::Success => CommandStatus::Success,
            status => CommandStatus::Mvu(status),
        },
        _ => {
            if pdu.status == 0 {
                CommandStatus::Success
            } else {
                CommandStatus::InternalError
            }
        }
    }
}

/// Serialize and transmit; a failure schedules the handler for the
/// next tick instead of completing synchronously, so the submitter
/// never sees its own callback re-enter it.
fn dispatch_aecp(
    local: &mut LocalEntityState,
    mut entry: AecpCommandEntry,
    now: Instant,
    endpoint: &dyn FrameEndpoint,
    config: &ManagerConfig,
) {
    let target = entry.pdu.target_entity_id;
    let outcome = entry
        .pdu
        .serialize()
        .map_err(|_| CommandStatus::InternalError)
        .and_then(|frame| {
            endpoint
                .send_frame(frame)
                .map_err(CommandStatus::TransportError)
        });
    match outcome {
        Ok(()) => {
            entry.sent_at = now;
            entry.deadline = now + aecp_timeout(&entry.pdu, config);
            local.inflight_aecp.entry(target).or_default().push_back(entry);
        }
        Err(status) => {
            debug!("failed to send AECP command to {target}: {status:?}");
            if let Some(handler) = entry.handler.take() {
                local
                    .scheduled_errors
                    .push(Action::CompleteAecp(handler, None, status));
            }
        }
    }
}

/// Move queued commands into freed inflight slots.
fn promote_queued(
    local: &mut LocalEntityState,
    target: UniqueIdentifier,
    now: Instant,
    endpoint: &dyn FrameEndpoint,
    config: &ManagerConfig,
) {
    loop {
        let inflight_len = local.inflight_aecp.get(&target).map_or(0, |q| q.len());
        if inflight_len >= config.max_inflight_aecp {
            return;
        }
        let Some(entry) = local
            .queued_aecp
            .get_mut(&target)
            .and_then(|q| q.pop_front())
        else {
            return;
        };
        dispatch_aecp(local, entry, now, endpoint, config);
    }
}

impl ManagerState {
    pub(crate) fn send_aecp_command(
        &mut self,
        mut pdu: Aecpdu,
        handler: AecpResultHandler,
        now: Instant,
        endpoint: &dyn FrameEndpoint,
        config: &ManagerConfig,
    ) -> Result<(), RegistrationError> {
        // Address the frame: source is always ours; an unset
        // destination resolves to the target's discovered MAC, or the
        // multicast as a last resort.
        pdu.src_address = endpoint.mac_address();
        if pdu.dest_address == MacAddress::default() {
            pdu.dest_address = self
                .discovered
                .get(&pdu.target_entity_id)
                .and_then(|known| known.entity.interfaces().values().next())
                .map(|itf| itf.mac_address)
                .unwrap_or(MacAddress::ADP_ACMP_MULTICAST);
        }

        let local = self
            .locals
            .get_mut(&pdu.controller_entity_id)
            .ok_or(RegistrationError::UnknownLocalEntity)?;
        if !local.entity.has_controller_capabilities() {
            return Err(RegistrationError::InvalidEntityType);
        }

        let sequence_id = local.next_aecp_sequence_id;
        local.next_aecp_sequence_id = local.next_aecp_sequence_id.wrapping_add(1);
        pdu.sequence_id = sequence_id;
        let target = pdu.target_entity_id;

        let entry = AecpCommandEntry {
            sequence_id,
            pdu,
            deadline: now,
            sent_at: now,
            retried: false,
            handler: Some(handler),
        };

        let inflight_len = local.inflight_aecp.get(&target).map_or(0, |q| q.len());
        if inflight_len >= config.max_inflight_aecp {
            local.queued_aecp.entry(target).or_default().push_back(entry);
        } else {
            dispatch_aecp(local, entry, now, endpoint, config);
        }
        Ok(())
    }

    pub(crate) fn send_acmp_command(
        &mut self,
        mut pdu: Acmpdu,
        handler: AcmpResultHandler,
        now: Instant,
        endpoint: &dyn FrameEndpoint,
    ) -> Result<(), RegistrationError> {
        pdu.src_address = endpoint.mac_address();
        pdu.dest_address = MacAddress::ADP_ACMP_MULTICAST;

        let local = self
            .locals
            .get_mut(&pdu.controller_entity_id)
            .ok_or(RegistrationError::UnknownLocalEntity)?;
        if !local.entity.has_controller_capabilities() {
            return Err(RegistrationError::InvalidEntityType);
        }

        let sequence_id = local.next_acmp_sequence_id;
        local.next_acmp_sequence_id = local.next_acmp_sequence_id.wrapping_add(1);
        pdu.sequence_id = sequence_id;

        let mut entry = AcmpCommandEntry {
            pdu,
            deadline: now,
            retried: false,
            handler: Some(handler),
        };
        let outcome = entry
            .pdu
            .serialize()
            .map_err(|_| CommandStatus::InternalError)
            .and_then(|frame| {
                endpoint
                    .send_frame(frame)
                    .map_err(CommandStatus::TransportError)
            });
        match outcome {
            Ok(()) => {
                entry.deadline = now + acmp_timeout(entry.pdu.message_type);
                local.inflight_acmp.insert(sequence_id, entry);
            }
            Err(status) => {
                if let Some(handler) = entry.handler.take() {
                    local
                        .scheduled_errors
                        .push(Action::CompleteAcmp(handler, None, status));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn handle_aecp_response(
        &mut self,
        pdu: Aecpdu,
        now: Instant,
        endpoint: &dyn FrameEndpoint,
        config: &ManagerConfig,
        out: &mut Outbox,
    ) {
        let controller = pdu.controller_entity_id;
        let target = pdu.target_entity_id;

        if pdu.is_unsolicited_response() {
            // Unsolicited notifications bypass inflight matching.
            if self.locals.contains_key(&controller) {
                out.notify(Notify::AecpUnsolicitedResponse(controller, pdu));
            }
            return;
        }

        let Some(local) = self.locals.get_mut(&controller) else {
            return;
        };
        let position = local.inflight_aecp.get(&target).and_then(|inflight| {
            inflight
                .iter()
                .position(|entry| entry.sequence_id == pdu.sequence_id)
        });
        let Some(position) = position else {
            // Too late (already timed out) or never ours.
            debug!(
                "unexpected AECP response from {target} with sequence {}",
                pdu.sequence_id
            );
            out.notify(Notify::AecpUnexpectedResponse(target));
            return;
        };

        // An IN_PROGRESS status re-arms the timeout; the real answer
        // is still coming (clause 9.2.1.2.5).
        if pdu.message_type == AecpMessageType::AemResponse
            && AemStatus::from_u8(pdu.status) == AemStatus::InProgress
        {
            let inflight = local.inflight_aecp.get_mut(&target).expect("just found");
            let entry = &mut inflight[position];
            entry.deadline = now + aecp_timeout(&entry.pdu, config);
            return;
        }

        let inflight = local.inflight_aecp.get_mut(&target).expect("just found");
        let mut entry = inflight.remove(position).expect("just found");
        let elapsed = now.saturating_duration_since(entry.sent_at);
        promote_queued(local, target, now, endpoint, config);

        out.notify(Notify::AecpResponseTime(target, elapsed));
        if let Some(handler) = entry.handler.take() {
            let status = aecp_response_status(&pdu);
            out.push(Action::CompleteAecp(handler, Some(pdu), status));
        }
    }

    pub(crate) fn handle_acmp_response(&mut self, pdu: Acmpdu, _now: Instant, out: &mut Outbox) {
        let mut processed = false;
        if let Some(local) = self.locals.get_mut(&pdu.controller_entity_id) {
            // Match by sequence id *and* command/response pairing: the
            // talker-listener leg of a connection reuses our
            // controller id and may reuse our sequence id.
            let matches = local
                .inflight_acmp
                .get(&pdu.sequence_id)
                .is_some_and(|entry| {
                    entry.pdu.message_type.expected_response() == pdu.message_type
                });
            if matches {
                let mut entry = local
                    .inflight_acmp
                    .remove(&pdu.sequence_id)
                    .expect("just found");
                if let Some(handler) = entry.handler.take() {
                    let status = match pdu.status {
                        AcmpStatus::Success => CommandStatus::Success,
                        other => CommandStatus::Acmp(other),
                    };
                    out.push(Action::CompleteAcmp(handler, Some(pdu.clone()), status));
                }
                processed = true;
            }
        }
        if !processed {
            // Someone else's exchange: hand it to observers as sniffed
            // traffic.
            out.notify(Notify::AcmpResponse(pdu));
        }
    }

    /// Ticker entry: expire deadlines, retry once, then fail; promote
    /// queued commands; deliver completions scheduled by failed sends.
    pub(crate) fn command_tick(
        &mut self,
        now: Instant,
        endpoint: &dyn FrameEndpoint,
        config: &ManagerConfig,
        out: &mut Outbox,
    ) {
        for local in self.locals.values_mut() {
            // AECP inflight
            let targets: Vec<UniqueIdentifier> = local.inflight_aecp.keys().copied().collect();
            for target in targets {
                let inflight = local.inflight_aecp.get_mut(&target).expect("key just read");
                let mut index = 0;
                while index < inflight.len() {
                    if now <= inflight[index].deadline {
                        index += 1;
                        continue;
                    }
                    if !inflight[index].retried {
                        let entry = &mut inflight[index];
                        entry.retried = true;
                        let resend = entry
                            .pdu
                            .serialize()
                            .map_err(|_| CommandStatus::InternalError)
                            .and_then(|frame| {
                                endpoint
                                    .send_frame(frame)
                                    .map_err(CommandStatus::TransportError)
                            });
                        match resend {
                            Ok(()) => {
                                trace!(
                                    "AECP command {} to {target} timed out, retrying",
                                    entry.sequence_id
                                );
                                entry.deadline = now + aecp_timeout(&entry.pdu, config);
                                out.notify(Notify::AecpRetry(target));
                                index += 1;
                            }
                            Err(status) => {
                                let mut entry = inflight.remove(index).expect("index in range");
                                if let Some(handler) = entry.handler.take() {
                                    out.push(Action::CompleteAecp(handler, None, status));
                                }
                            }
                        }
                    } else {
                        trace!(
                            "AECP command {} to {target} timed out twice",
                            inflight[index].sequence_id
                        );
                        let mut entry = inflight.remove(index).expect("index in range");
                        out.notify(Notify::AecpTimeout(target));
                        if let Some(handler) = entry.handler.take() {
                            out.push(Action::CompleteAecp(handler, None, CommandStatus::Timeout));
                        }
                    }
                }
                promote_queued(local, target, now, endpoint, config);
            }

            // ACMP inflight
            let sequences: Vec<AcmpSequenceId> = local.inflight_acmp.keys().copied().collect();
            for sequence_id in sequences {
                let entry = local.inflight_acmp.get_mut(&sequence_id).expect("key just read");
                if now <= entry.deadline {
                    continue;
                }
                if !entry.retried {
                    entry.retried = true;
                    let resend = entry
                        .pdu
                        .serialize()
                        .map_err(|_| CommandStatus::InternalError)
                        .and_then(|frame| {
                            endpoint
                                .send_frame(frame)
                                .map_err(CommandStatus::TransportError)
                        });
                    match resend {
                        Ok(()) => {
                            entry.deadline = now + acmp_timeout(entry.pdu.message_type);
                        }
                        Err(status) => {
                            let mut entry =
                                local.inflight_acmp.remove(&sequence_id).expect("just read");
                            if let Some(handler) = entry.handler.take() {
                                out.push(Action::CompleteAcmp(handler, None, status));
                            }
                        }
                    }
                } else {
                    let mut entry = local.inflight_acmp.remove(&sequence_id).expect("just read");
                    if let Some(handler) = entry.handler.take() {
                        out.push(Action::CompleteAcmp(handler, None, CommandStatus::Timeout));
                    }
                }
            }

            // Completions for sends that failed at submission time.
            out.actions.extend(local.scheduled_errors.drain(..));
        }
    }

    /// A remote entity disappeared: fail everything addressed to it.
    pub(crate) fn flush_commands_for_entity(
        &mut self,
        entity_id: UniqueIdentifier,
        out: &mut Outbox,
    ) {
        for local in self.locals.values_mut() {
            for queue in [
                local.inflight_aecp.remove(&entity_id),
                local.queued_aecp.remove(&entity_id),
            ]
            .into_iter()
            .flatten()
            {
                for mut entry in queue {
                    if let Some(handler) = entry.handler.take() {
                        out.push(Action::CompleteAecp(
                            handler,
                            None,
                            CommandStatus::UnknownEntity,
                        ));
                    }
                }
            }
            let gone: Vec<AcmpSequenceId> = local
                .inflight_acmp
                .iter()
                .filter(|(_, entry)| {
                    entry.pdu.talker_entity_id == entity_id
                        || entry.pdu.listener_entity_id == entity_id
                })
                .map(|(sequence_id, _)| *sequence_id)
                .collect();
            for sequence_id in gone {
                let mut entry = local.inflight_acmp.remove(&sequence_id).expect("just read");
                if let Some(handler) = entry.handler.take() {
                    out.push(Action::CompleteAcmp(
                        handler,
                        None,
                        CommandStatus::UnknownEntity,
                    ));
                }
            }
        }
    }

    /// The transport died: fail every pending command.
    pub(crate) fn flush_all_commands(&mut self, status: CommandStatus, out: &mut Outbox) {
        for local in self.locals.values_mut() {
            for (_, queue) in local
                .inflight_aecp
                .drain()
                .chain(local.queued_aecp.drain())
            {
                for mut entry in queue {
                    if let Some(handler) = entry.handler.take() {
                        out.push(Action::CompleteAecp(handler, None, status));
                    }
                }
            }
            for (_, mut entry) in local.inflight_acmp.drain() {
                if let Some(handler) = entry.handler.take() {
                    out.push(Action::CompleteAcmp(handler, None, status));
                }
            }
            out.actions.extend(local.scheduled_errors.drain(..));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::super::*;
    use crate::error::CommandStatus;
    use parking_lot::Mutex as PlMutex;

    fn get_configuration_pdu() -> Aecpdu {
        let mut pdu = Aecpdu::aem_command(
            UniqueIdentifier::new(TARGET_EID),
            UniqueIdentifier::new(CONTROLLER_EID),
            AemCommandType::GetConfiguration,
            Bytes::new(),
        );
        pdu.dest_address = TARGET_MAC;
        pdu
    }

    /// A handler writing its single outcome into a shared slot.
    fn outcome_handler(
        slot: &Arc<PlMutex<Vec<(Option<Aecpdu>, CommandStatus)>>>,
    ) -> AecpResultHandler {
        let slot = slot.clone();
        Box::new(move |pdu, status| {
            slot.lock().push((pdu.cloned(), status));
        })
    }

    fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn response_resolves_the_command() {
        let (manager, _endpoint, _recorder) =
            controller_setup("cmd-success", ManagerConfig::default());
        let _responder = Responder::attach(
            "cmd-success",
            ReplyMode::Reply {
                status: AemStatus::Success,
                body: Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]),
                delay: Duration::from_millis(20),
            },
        );

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        manager
            .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
            .unwrap();

        assert!(wait_until(
            || !outcomes.lock().is_empty(),
            Duration::from_millis(200)
        ));
        std::thread::sleep(Duration::from_millis(50));
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1, "handler must fire exactly once");
        let (pdu, status) = &outcomes[0];
        assert_eq!(*status, CommandStatus::Success);
        let pdu = pdu.as_ref().unwrap();
        assert_eq!(
            crate::controller::parse_get_configuration_response(pdu),
            Some(2)
        );
        assert_eq!(
            manager.pending_aecp_commands(
                UniqueIdentifier::new(CONTROLLER_EID),
                UniqueIdentifier::new(TARGET_EID)
            ),
            0
        );
    }

    #[test]
    fn silence_retries_once_then_times_out() {
        let (manager, _endpoint, recorder) =
            controller_setup("cmd-timeout", ManagerConfig::default());
        let responder = Responder::attach("cmd-timeout", ReplyMode::Silent);

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        manager
            .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
            .unwrap();

        // 250 ms initial + 250 ms retry, plus scheduling slack.
        assert!(wait_until(
            || !outcomes.lock().is_empty(),
            Duration::from_millis(900)
        ));
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].0.is_none());
        assert_eq!(outcomes[0].1, CommandStatus::Timeout);
        assert_eq!(recorder.count("aecp-retry"), 1);
        assert_eq!(recorder.count("aecp-timeout"), 1);
        // The command went on the wire twice.
        assert_eq!(responder.received_count(), 2);
    }

    #[test]
    fn target_expiry_fails_inflight_with_unknown_entity() {
        let (manager, _endpoint, recorder) =
            controller_setup("cmd-expiry", ManagerConfig::default());
        let responder = Responder::attach("cmd-expiry", ReplyMode::Silent);

        // Discover the target with the shortest validity (2 s).
        responder.announce(1, 1);
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));

        // An ACMP connect has a 4.5 s timeout, far past the expiry.
        let ordered: Arc<PlMutex<Vec<String>>> = Arc::new(PlMutex::new(Vec::new()));
        let ordered2 = ordered.clone();
        let handler: AcmpResultHandler = Box::new(move |pdu, status| {
            assert!(pdu.is_none());
            assert_eq!(status, CommandStatus::UnknownEntity);
            ordered2.lock().push("handler".into());
        });
        let pdu = Acmpdu {
            message_type: AcmpMessageType::ConnectRxCommand,
            controller_entity_id: UniqueIdentifier::new(CONTROLLER_EID),
            talker_entity_id: UniqueIdentifier::new(0x1111_1111_1111_1111),
            listener_entity_id: UniqueIdentifier::new(TARGET_EID),
            ..Default::default()
        };
        manager.send_acmp_command(pdu, handler).unwrap();

        assert!(wait_until(
            || !ordered.lock().is_empty(),
            Duration::from_secs(4)
        ));
        // The offline notification must precede the completion.
        assert_eq!(recorder.count("remote-offline"), 1);
        assert_eq!(ordered.lock().as_slice(), ["handler"]);
    }

    #[test]
    fn in_progress_rearms_the_timeout() {
        let (manager, _endpoint, recorder) =
            controller_setup("cmd-inprogress", ManagerConfig::default());
        let _responder = Responder::attach(
            "cmd-inprogress",
            ReplyMode::InProgressThen {
                status: AemStatus::Success,
                body: Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]),
                after: Duration::from_millis(900),
            },
        );

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        manager
            .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
            .unwrap();

        // Without the IN_PROGRESS re-arms this would have timed out at
        // ~500 ms; the real response lands at ~900 ms.
        assert!(wait_until(
            || !outcomes.lock().is_empty(),
            Duration::from_secs(2)
        ));
        std::thread::sleep(Duration::from_millis(100));
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1, "single completion");
        assert_eq!(outcomes[0].1, CommandStatus::Success);
        assert_eq!(recorder.count("aecp-retry"), 0);
        assert_eq!(recorder.count("aecp-timeout"), 0);
    }

    #[test]
    fn overflow_queues_and_promotes_in_order() {
        let config = ManagerConfig {
            max_inflight_aecp: 1,
            ..Default::default()
        };
        let (manager, _endpoint, _recorder) = controller_setup("cmd-queue", config);
        let responder = Responder::attach(
            "cmd-queue",
            ReplyMode::Reply {
                status: AemStatus::Success,
                body: Bytes::new(),
                delay: Duration::from_millis(120),
            },
        );

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        for _ in 0..3 {
            manager
                .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
                .unwrap();
        }

        // Only the first command may be on the wire before its
        // response arrives.
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(responder.received_count(), 1);

        assert!(wait_until(
            || outcomes.lock().len() == 3,
            Duration::from_secs(2)
        ));
        // Wire order matches submission order (sequence ids 0, 1, 2).
        let received = responder.received.lock();
        let sequences: Vec<u16> = received.iter().map(|pdu| pdu.sequence_id).collect();
        assert_eq!(sequences, [0, 1, 2]);
        for (_, status) in outcomes.lock().iter() {
            assert_eq!(*status, CommandStatus::Success);
        }
    }

    #[test]
    fn transport_teardown_fails_pending_commands() {
        let (manager, endpoint, recorder) =
            controller_setup("cmd-teardown", ManagerConfig::default());
        let _responder = Responder::attach("cmd-teardown", ReplyMode::Silent);

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        manager
            .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
            .unwrap();

        endpoint.force_transport_error();

        assert!(wait_until(
            || !outcomes.lock().is_empty(),
            Duration::from_millis(500)
        ));
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0].1,
            CommandStatus::TransportError(_) | CommandStatus::UnknownEntity
        ));
        assert_eq!(recorder.count("transport-error"), 1);
    }

    #[test]
    fn late_response_is_reported_as_unexpected() {
        let (manager, _endpoint, recorder) =
            controller_setup("cmd-late", ManagerConfig::default());
        let responder = Responder::attach(
            "cmd-late",
            ReplyMode::Reply {
                status: AemStatus::Success,
                body: Bytes::new(),
                // Past both timeouts.
                delay: Duration::from_millis(700),
            },
        );

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        manager
            .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
            .unwrap();

        assert!(wait_until(
            || !outcomes.lock().is_empty(),
            Duration::from_millis(900)
        ));
        assert_eq!(outcomes.lock()[0].1, CommandStatus::Timeout);
        // The late responses (to the original and the retry) arrive
        // after the entry is gone.
        assert!(recorder.wait_for("aecp-unexpected", 1, Duration::from_secs(2)));
        assert!(responder.received_count() >= 1);
    }

    #[test]
    fn sequence_ids_increase_per_submission() {
        let (manager, _endpoint, _recorder) =
            controller_setup("cmd-sequence", ManagerConfig::default());
        let responder = Responder::attach(
            "cmd-sequence",
            ReplyMode::Reply {
                status: AemStatus::Success,
                body: Bytes::new(),
                delay: Duration::ZERO,
            },
        );

        let outcomes = Arc::new(PlMutex::new(Vec::new()));
        for _ in 0..3 {
            manager
                .send_aecp_command(get_configuration_pdu(), outcome_handler(&outcomes))
                .unwrap();
            assert!(wait_until(
                || responder.received_count() > 0,
                Duration::from_millis(300)
            ));
        }
        assert!(wait_until(
            || outcomes.lock().len() == 3,
            Duration::from_secs(1)
        ));
        let received = responder.received.lock();
        let sequences: Vec<u16> = received.iter().map(|pdu| pdu.sequence_id).collect();
        assert_eq!(sequences, [0, 1, 2]);
    }
}
