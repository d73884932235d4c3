//! Composite SoHal error codes.
//!
//! Every failure is reported as a 64-bit value. The low 32 bits hold the
//! error marker, the facility that raised the error and the error kind:
//!
//! ```text
//! 63            32 31   29 28     16 15          0
//! +---------------+-------+---------+-------------+
//! |  origin data  | 0b001 | facility|    kind     |
//! +---------------+-------+---------+-------------+
//! ```
//!
//! The origin data is zero for errors raised by this SDK and carries the
//! service-side location for errors reported by SoHal. A zero code means
//! success.

use std::fmt;

const ERROR_MARKER: u64 = 0x2000_0000;
const FACILITY_MASK: u64 = 0x7ff;
const KIND_MASK: u64 = 0xffff;

/// Subsystem that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Facility {
    Device = 0x13b,
    Desklamp = 0x13c,
    SButtons = 0x13d,
    TouchMat = 0x13e,
    Projector = 0x13f,
    HiResCamera = 0x140,
    DepthCamera = 0x141,
    CaptureStage = 0x142,
    UvcCamera = 0x143,
    SoHal = 0x160,
    System = 0x161,
    Ws = 0x162,
    SwDevice = 0x163,
}

impl Facility {
    pub const ALL: [Facility; 13] = [
        Facility::Device,
        Facility::Desklamp,
        Facility::SButtons,
        Facility::TouchMat,
        Facility::Projector,
        Facility::HiResCamera,
        Facility::DepthCamera,
        Facility::CaptureStage,
        Facility::UvcCamera,
        Facility::SoHal,
        Facility::System,
        Facility::Ws,
        Facility::SwDevice,
    ];

    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| *f as u16 == code)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Facility::Device => "hippo_device",
            Facility::Desklamp => "desklamp",
            Facility::SButtons => "sbuttons",
            Facility::TouchMat => "touchmat",
            Facility::Projector => "projector",
            Facility::HiResCamera => "hirescamera",
            Facility::DepthCamera => "depthcamera",
            Facility::CaptureStage => "capturestage",
            Facility::UvcCamera => "uvccamera",
            Facility::SoHal => "sohal",
            Facility::System => "system",
            Facility::Ws => "hippo_ws",
            Facility::SwDevice => "swdevice",
        }
    }
}

/// Specific error kind, stored in the low 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorKind {
    /// Generic error with no more specific classification
    Error = 0x200,
    Timeout = 0x201,
    FuncNotAvailable = 0x202,
    /// Wire payload present but with the wrong shape or type
    MessageError = 0x203,
    ParamOutOfRange = 0x204,
    CmdLen = 0x205,
    MemAlloc = 0x206,
    StdError = 0x207,
    DevNotFound = 0x208,
    DevInterfaceNotFound = 0x209,
    DevInUse = 0x20a,
    /// The service could not be reached
    Open = 0x20b,
    Close = 0x20c,
    Write = 0x20d,
    Read = 0x20e,
    GetFeature = 0x20f,
    SetFeature = 0x210,
    FlashError = 0x211,
    MessageProcessingError = 0x212,
    DeviceBusy = 0x213,
    Cancel = 0x214,
    ReadLenError = 0x215,
    WriteLenError = 0x216,
    HwFault = 0x217,
    WrongState = 0x218,
    InvalidParam = 0x219,
    Overcurrent = 0x21a,
    Stuck = 0x21b,
    BrokenStop = 0x21c,
    NoOptoSensor = 0x21d,
    NotCalibrated = 0x21e,
    NotStreaming = 0x21f,
}

impl ErrorKind {
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        use ErrorKind::{
            BrokenStop, Cancel, Close, CmdLen, DevInUse, DevInterfaceNotFound, DevNotFound,
            DeviceBusy, Error, FlashError, FuncNotAvailable, GetFeature, HwFault,
            InvalidParam, MemAlloc, MessageError, MessageProcessingError, NoOptoSensor,
            NotCalibrated, NotStreaming, Open, Overcurrent, ParamOutOfRange, Read,
            ReadLenError, SetFeature, StdError, Stuck, Timeout, Write, WriteLenError,
            WrongState,
        };
        const KINDS: [ErrorKind; 32] = [
            Error,
            Timeout,
            FuncNotAvailable,
            MessageError,
            ParamOutOfRange,
            CmdLen,
            MemAlloc,
            StdError,
            DevNotFound,
            DevInterfaceNotFound,
            DevInUse,
            Open,
            Close,
            Write,
            Read,
            GetFeature,
            SetFeature,
            FlashError,
            MessageProcessingError,
            DeviceBusy,
            Cancel,
            ReadLenError,
            WriteLenError,
            HwFault,
            WrongState,
            InvalidParam,
            Overcurrent,
            Stuck,
            BrokenStop,
            NoOptoSensor,
            NotCalibrated,
            NotStreaming,
        ];
        code.checked_sub(Error as u16)
            .and_then(|offset| KINDS.get(usize::from(offset)))
            .copied()
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Error => "Generic Error",
            ErrorKind::Timeout => "Timeout error",
            ErrorKind::FuncNotAvailable => "Functionality not available",
            ErrorKind::MessageError => "Message error",
            ErrorKind::ParamOutOfRange => "Out of Range Parameter",
            ErrorKind::CmdLen => "Command with unexpected length",
            ErrorKind::MemAlloc => "Memory error",
            ErrorKind::StdError => "Generic std::exception",
            ErrorKind::DevNotFound => "Device not found",
            ErrorKind::DevInterfaceNotFound => "Device interface not found",
            ErrorKind::DevInUse => "Device in use",
            ErrorKind::Open => "Error opening device",
            ErrorKind::Close => "Error closing device",
            ErrorKind::Write => "Error writing to device",
            ErrorKind::Read => "Error reading from device",
            ErrorKind::GetFeature => "Error getting feature from device",
            ErrorKind::SetFeature => "Error setting feature from device",
            ErrorKind::FlashError => "Error when triggering flash",
            ErrorKind::MessageProcessingError => "The device was not able to complete the request",
            ErrorKind::DeviceBusy => "Device is busy",
            ErrorKind::Cancel => "Operation cancelled",
            ErrorKind::ReadLenError => "Received incorrect number of bytes from the device",
            ErrorKind::WriteLenError => "Wrote incorrect number of bytes to the device",
            ErrorKind::HwFault => "hardware fault",
            ErrorKind::WrongState => "Device is in the wrong state",
            ErrorKind::InvalidParam => "Invalid parameter",
            ErrorKind::Overcurrent => "Device is using too much power",
            ErrorKind::Stuck => "Device is unable to move",
            ErrorKind::BrokenStop => "Device's hard stop has broken off",
            ErrorKind::NoOptoSensor => "Optical sensor is not responding",
            ErrorKind::NotCalibrated => "Device is not calibrated. Please home the device",
            ErrorKind::NotStreaming => "The camera is not streaming",
        }
    }
}

/// A non-zero SoHal error code plus the message the service sent with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HippoError {
    code: u64,
    message: Option<String>,
}

impl HippoError {
    #[must_use]
    pub fn new(facility: Facility, kind: ErrorKind) -> Self {
        Self {
            code: ERROR_MARKER | (u64::from(facility as u16) << 16) | u64::from(kind as u16),
            message: None,
        }
    }

    /// Rebuild an error from its raw 64-bit code.
    ///
    /// Returns `None` for zero, which means success.
    #[must_use]
    pub fn from_raw(code: u64) -> Option<Self> {
        (code != 0).then_some(Self {
            code,
            message: None,
        })
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Parse the `data` string of a JSON-RPC error object.
    ///
    /// The format is `<file>:<HIGH32>:<LOW32>` with both numbers in hex. Only
    /// the last two segments are used.
    #[must_use]
    pub fn from_wire_data(data: &str) -> Option<Self> {
        let mut segments = data.rsplit(':');
        let low = u32::from_str_radix(segments.next()?, 16).ok()?;
        let high = u32::from_str_radix(segments.next()?, 16).ok()?;
        Self::from_raw((u64::from(high) << 32) | u64::from(low))
    }

    /// Format the code the way SoHal expects in the `data` field.
    #[must_use]
    pub fn to_wire_data(&self) -> String {
        format!(
            "unknown:{:04x}{:04x}:{:08x}",
            (self.code >> 48) & 0xffff,
            (self.code >> 32) & 0xffff,
            self.code & 0xffff_ffff
        )
    }

    #[must_use]
    pub fn raw(&self) -> u64 {
        self.code
    }

    /// Low 16 bits of the code.
    #[must_use]
    pub fn kind_code(&self) -> u16 {
        // masked to 16 bits
        #[allow(clippy::cast_possible_truncation)]
        let code = (self.code & KIND_MASK) as u16;
        code
    }

    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.kind_code())
    }

    #[must_use]
    pub fn facility(&self) -> Option<Facility> {
        // masked to 11 bits
        #[allow(clippy::cast_possible_truncation)]
        let code = ((self.code >> 16) & FACILITY_MASK) as u16;
        Facility::from_code(code)
    }

    #[must_use]
    pub fn facility_name(&self) -> &'static str {
        self.facility().map_or("unknown device", Facility::name)
    }

    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// The server message if one was received, otherwise the kind's description.
    #[must_use]
    pub fn message(&self) -> &str {
        match (&self.message, self.kind()) {
            (Some(message), _) => message,
            (None, Some(kind)) => kind.message(),
            (None, None) => "Unknown hiPPo error code",
        }
    }

    /// Collapse a result into the raw code, zero for success.
    #[must_use]
    pub fn code_of<T>(result: &std::result::Result<T, HippoError>) -> u64 {
        result.as_ref().map_or_else(HippoError::raw, |_| 0)
    }
}

impl fmt::Display for HippoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error {:#x}: {}",
            self.facility_name(),
            self.kind_code(),
            self.message()
        )
    }
}

impl std::error::Error for HippoError {}

pub type Result<T> = std::result::Result<T, HippoError>;
