//! Error types for reader-core.

use thiserror::Error;

use gen2_events::StopReason;

use crate::device::{DeviceError, DeviceErrorKind};

/// Errors surfaced by the session layer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    /// A caller-supplied parameter was rejected before any state changed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A device call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The outbound event queue was full when a packet had to be published.
    #[error("event queue full")]
    EventFifoFull,

    /// The device rejected the round configuration mid-session.
    #[error("round configuration rejected by device")]
    InvalidParam,

    /// Tag traffic exceeded the device's processing capacity.
    #[error("lower MAC overloaded")]
    LmacOverload,

    /// A round summary carried an unrecognized reason byte.
    #[error("unrecognized round summary reason")]
    SummaryReasonInvalid,

    /// The background service thread is gone.
    #[error("reader service stopped")]
    ServiceStopped,
}

impl ReaderError {
    /// The stop reason this error maps to when it ends a session.
    pub fn stop_reason(&self) -> StopReason {
        match self {
            ReaderError::InvalidParameter(_) => StopReason::None,
            ReaderError::Device(err) => match err.kind {
                DeviceErrorKind::Op => StopReason::OpError,
                DeviceErrorKind::OpTimeout => StopReason::SdkTimeoutError,
                DeviceErrorKind::CommandNoResponse
                | DeviceErrorKind::CommandWithResponse => StopReason::DeviceCommandError,
            },
            ReaderError::EventFifoFull => StopReason::EventFifoFull,
            ReaderError::InvalidParam => StopReason::InvalidParam,
            ReaderError::LmacOverload => StopReason::LmacOverload,
            ReaderError::SummaryReasonInvalid => StopReason::SummaryReasonInvalid,
            ReaderError::ServiceStopped => StopReason::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{OpError, OpId};

    #[test]
    fn device_errors_map_to_stop_reasons() {
        let err = ReaderError::from(DeviceError::op(OpId::StartInventoryRound, OpError::Overflow));
        assert_eq!(err.stop_reason(), StopReason::OpError);

        let err = ReaderError::from(DeviceError::op_timeout(OpId::TxRampUp));
        assert_eq!(err.stop_reason(), StopReason::SdkTimeoutError);

        assert_eq!(
            ReaderError::EventFifoFull.stop_reason(),
            StopReason::EventFifoFull
        );
    }
}
