use crate::pdu::{AaStatus, AcmpStatus, AemStatus, MvuStatus, PduError};
use thiserror::Error;

/// The endpoint could not move a frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum TransportError {
    /// The endpoint has gone away for good.
    #[error("transport is not available")]
    NotAvailable,
    /// The outbound channel rejected the frame.
    #[error("transport failed to send the frame")]
    SendFailed,
    /// The message kind cannot be carried by this endpoint.
    #[error("message not supported by this transport")]
    MessageNotSupported,
    #[error("internal transport error")]
    Internal,
}

/// Registering or unregistering a local entity failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum RegistrationError {
    #[error("an entity with the same EntityID is already registered")]
    DuplicateLocalEntityId,
    #[error("no such local entity")]
    UnknownLocalEntity,
    /// The entity lacks the capability the operation requires (e.g.
    /// sending commands without controller capabilities).
    #[error("entity type is not valid for this operation")]
    InvalidEntityType,
    #[error("invalid parameters")]
    InvalidParameters,
}

/// The outcome delivered to a command's result handler.
///
/// `Success` and the protocol-status variants mean the target answered;
/// everything else means it did not (or could not be reached).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CommandStatus {
    Success,
    /// No response after the retry.
    Timeout,
    /// The target went offline while the command was inflight.
    UnknownEntity,
    /// A response arrived that matches no inflight command.
    UnexpectedResponse,
    TransportError(TransportError),
    InternalError,
    /// Non-success AEM status from the response PDU.
    Aem(AemStatus),
    /// Non-success Address Access status from the response PDU.
    Aa(AaStatus),
    /// Non-success Milan Vendor Unique status from the response PDU.
    Mvu(MvuStatus),
    /// Non-success ACMP status from the response PDU.
    Acmp(AcmpStatus),
}

impl CommandStatus {
    pub fn is_success(self) -> bool {
        self == CommandStatus::Success
    }
}

/// Errors surfaced by the named-executor registry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ExecutorError {
    #[error("an executor with the same name is already registered")]
    DuplicateExecutorName,
    #[error("no such executor")]
    UnknownExecutor,
    #[error("the job did not complete in time")]
    Timeout,
}

impl From<PduError> for CommandStatus {
    fn from(_: PduError) -> Self {
        CommandStatus::InternalError
    }
}

impl From<TransportError> for CommandStatus {
    fn from(e: TransportError) -> Self {
        CommandStatus::TransportError(e)
    }
}
