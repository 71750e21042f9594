//! Error types for the LinkHub system

use thiserror::Error;

/// Status codes the device returns when it rejects an operation
///
/// The status byte of a reply is mapped by exact value. Codes 13 and 55 are
/// sentinels the firmware emits even though the value was applied, so they
/// never produce a `DeviceError`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The value written is outside of what the device accepts (status 1)
    #[error("invalid value")]
    InvalidValue,

    /// The operation failed on the device, usually an endpoint error (status 3)
    #[error("operation failed")]
    OperationFailed,

    /// The property is read only (status 9)
    #[error("property is read only")]
    ReadOnly,

    /// Any other non-zero status
    #[error("unknown device error code {0}")]
    Unknown(u8),
}

impl DeviceError {
    /// Map a reply status byte to an error, `None` meaning success
    ///
    /// # Examples
    ///
    /// ```
    /// use linkhub_core::DeviceError;
    ///
    /// assert_eq!(DeviceError::from_status(0), None);
    /// assert_eq!(DeviceError::from_status(1), Some(DeviceError::InvalidValue));
    /// assert_eq!(DeviceError::from_status(13), None);
    /// assert_eq!(DeviceError::from_status(42), Some(DeviceError::Unknown(42)));
    /// ```
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            0 | 13 | 55 => None,
            1 => Some(DeviceError::InvalidValue),
            3 => Some(DeviceError::OperationFailed),
            9 => Some(DeviceError::ReadOnly),
            other => Some(DeviceError::Unknown(other)),
        }
    }

    /// The raw status code this error was built from
    pub fn code(&self) -> u8 {
        match self {
            DeviceError::InvalidValue => 1,
            DeviceError::OperationFailed => 3,
            DeviceError::ReadOnly => 9,
            DeviceError::Unknown(code) => *code,
        }
    }
}

/// Core error type for LinkHub operations
#[derive(Error, Debug)]
pub enum LinkHubError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HID transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport returned no usable bytes
    #[error("Transport returned an empty reply")]
    TransportEmpty,

    /// The device explicitly rejected the operation
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// A property or endpoint probe came back empty
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A tag or type byte at a fixed offset did not match
    #[error("Parse mismatch in {context}: expected {expected:#04x}, found {found:#04x}")]
    ParseMismatch {
        context: &'static str,
        expected: u8,
        found: u8,
    },

    /// Internal LED geometry or catalog contract violation
    #[error("Layout contract violated: {0}")]
    LayoutContract(String),

    /// Device not found
    #[error("Device not found")]
    DeviceNotFound,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for LinkHub operations
pub type Result<T> = std::result::Result<T, LinkHubError>;

impl From<serde_json::Error> for LinkHubError {
    fn from(err: serde_json::Error) -> Self {
        LinkHubError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(DeviceError::from_status(0), None);
        assert_eq!(DeviceError::from_status(1), Some(DeviceError::InvalidValue));
        assert_eq!(
            DeviceError::from_status(3),
            Some(DeviceError::OperationFailed)
        );
        assert_eq!(DeviceError::from_status(9), Some(DeviceError::ReadOnly));
        assert_eq!(DeviceError::from_status(5), Some(DeviceError::Unknown(5)));
    }

    #[test]
    fn test_sentinel_codes_are_not_errors() {
        assert_eq!(DeviceError::from_status(13), None);
        assert_eq!(DeviceError::from_status(55), None);
    }

    #[test]
    fn test_code_roundtrip() {
        for status in [1u8, 3, 9, 42, 200] {
            let err = DeviceError::from_status(status).unwrap();
            assert_eq!(err.code(), status);
        }
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: LinkHubError = json_err.into();

        match err {
            LinkHubError::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LinkHubError = io_err.into();

        match err {
            LinkHubError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = LinkHubError::Config("bad colour".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad colour");

        let err = LinkHubError::Device(DeviceError::ReadOnly);
        assert_eq!(format!("{}", err), "Device error: property is read only");

        let err = LinkHubError::ParseMismatch {
            context: "fan rpm",
            expected: 0x06,
            found: 0x09,
        };
        assert_eq!(
            format!("{}", err),
            "Parse mismatch in fan rpm: expected 0x06, found 0x09"
        );

        let err = LinkHubError::DeviceNotFound;
        assert_eq!(format!("{}", err), "Device not found");
    }
}
