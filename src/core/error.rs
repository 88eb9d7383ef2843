use std::fmt;
use thiserror::Error;

/// Native status codes returned by the filtering engine.
///
/// Win32 errors are small positive values, WFP errors are `FWP_E_*` HRESULTs
/// in the `0x8032_xxxx` range.
pub mod status {
    pub const ACCESS_DENIED: u32 = 5;
    pub const INVALID_HANDLE: u32 = 6;
    pub const INVALID_PARAMETER: u32 = 87;
    pub const RPC_SERVER_UNAVAILABLE: u32 = 0x6BA;
    pub const EPT_NOT_REGISTERED: u32 = 0x6D9;

    pub const FWP_PROVIDER_NOT_FOUND: u32 = 0x8032_0005;
    pub const FWP_SUBLAYER_NOT_FOUND: u32 = 0x8032_0007;
    pub const FWP_ALREADY_EXISTS: u32 = 0x8032_0009;
    pub const FWP_SESSION_ABORTED: u32 = 0x8032_0010;
    pub const FWP_TIMEOUT: u32 = 0x8032_0012;
    pub const FWP_INVALID_NET_MASK: u32 = 0x8032_001F;
    pub const FWP_NULL_DISPLAY_NAME: u32 = 0x8032_0023;
    pub const FWP_INVALID_WEIGHT: u32 = 0x8032_0025;
}

/// A status code reported by the filtering engine for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineStatus(pub u32);

impl EngineStatus {
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Symbolic name of the code, when it is one we know.
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            status::ACCESS_DENIED => Some("ERROR_ACCESS_DENIED"),
            status::INVALID_HANDLE => Some("ERROR_INVALID_HANDLE"),
            status::INVALID_PARAMETER => Some("ERROR_INVALID_PARAMETER"),
            status::RPC_SERVER_UNAVAILABLE => Some("RPC_S_SERVER_UNAVAILABLE"),
            status::EPT_NOT_REGISTERED => Some("EPT_S_NOT_REGISTERED"),
            status::FWP_PROVIDER_NOT_FOUND => Some("FWP_E_PROVIDER_NOT_FOUND"),
            status::FWP_SUBLAYER_NOT_FOUND => Some("FWP_E_SUBLAYER_NOT_FOUND"),
            status::FWP_ALREADY_EXISTS => Some("FWP_E_ALREADY_EXISTS"),
            status::FWP_SESSION_ABORTED => Some("FWP_E_SESSION_ABORTED"),
            status::FWP_TIMEOUT => Some("FWP_E_TIMEOUT"),
            status::FWP_INVALID_NET_MASK => Some("FWP_E_INVALID_NET_MASK"),
            status::FWP_NULL_DISPLAY_NAME => Some("FWP_E_NULL_DISPLAY_NAME"),
            status::FWP_INVALID_WEIGHT => Some("FWP_E_INVALID_WEIGHT"),
            _ => None,
        }
    }

    /// Maps the code to a user-facing explanation with suggestions.
    pub fn translate(self) -> ErrorTranslation {
        match self.0 {
            status::ACCESS_DENIED => {
                ErrorTranslation::new("Insufficient privileges to modify filtering rules")
                    .with_suggestion("Run the command from an elevated (Administrator) prompt")
                    .with_suggestion("Check that no group policy restricts WFP management")
                    .with_help("https://learn.microsoft.com/en-us/windows/win32/fwp/access-control")
            }
            status::RPC_SERVER_UNAVAILABLE | status::EPT_NOT_REGISTERED => {
                ErrorTranslation::new("The Base Filtering Engine service is not reachable")
                    .with_suggestion("Check the service state: sc query BFE")
                    .with_suggestion("Start it with: sc start BFE")
                    .with_help("https://learn.microsoft.com/en-us/windows/win32/fwp/about-windows-filtering-platform")
            }
            status::INVALID_HANDLE | status::FWP_SESSION_ABORTED => {
                ErrorTranslation::new("The filtering session is no longer valid")
                    .with_suggestion("The session was closed or aborted by the engine")
                    .with_suggestion("Filters created under it have already been removed")
            }
            status::FWP_ALREADY_EXISTS => {
                ErrorTranslation::new("An object with the same key is already registered")
                    .with_suggestion("Provider, sublayer and filter keys are generated per run")
                    .with_suggestion("Re-run the command to get fresh keys")
            }
            status::FWP_PROVIDER_NOT_FOUND | status::FWP_SUBLAYER_NOT_FOUND => {
                ErrorTranslation::new("The provider or sublayer referenced by the rule is missing")
                    .with_suggestion("Register the base objects in the same session before adding filters")
            }
            status::FWP_INVALID_NET_MASK => {
                ErrorTranslation::new("The engine rejected the network mask")
                    .with_suggestion("Use CIDR notation with a prefix between 0 and 32, e.g. 10.0.0.0/24")
                    .with_help("https://en.wikipedia.org/wiki/Classless_Inter-Domain_Routing")
            }
            status::FWP_INVALID_WEIGHT => ErrorTranslation::new("The engine rejected the filter weight")
                .with_suggestion("Pick a lower --weight base"),
            status::FWP_TIMEOUT => ErrorTranslation::new("Timed out waiting for the filtering engine")
                .with_suggestion("Another process may hold a long-running WFP transaction")
                .with_suggestion("Try again when the system is less busy"),
            _ => ErrorTranslation::new(format!("Filtering engine error: {self}"))
                .with_suggestion("Look the code up in the WFP error reference")
                .with_help("https://learn.microsoft.com/en-us/windows/win32/fwp/wfp-error-codes"),
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

/// Base object whose registration failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BaseObject {
    #[strum(serialize = "provider")]
    Provider,
    #[strum(serialize = "sublayer")]
    Sublayer,
}

/// Core error types for wfprules
#[derive(Debug, Error)]
pub enum Error {
    /// CIDR text could not be compiled into a condition
    #[error("Invalid network '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// The engine refused to open a session
    #[error("Failed to open filtering engine session: {0}")]
    EngineConnect(EngineStatus),

    /// Provider or sublayer registration failed
    #[error("Failed to register {object}: {status}")]
    Registration {
        object: BaseObject,
        status: EngineStatus,
    },

    /// Filter add failed
    #[error("Failed to install filter '{label}': {status}")]
    Install { label: String, status: EngineStatus },

    /// Session close failed (non-fatal)
    #[error("Failed to close filtering engine session: {0}")]
    Close(EngineStatus),

    /// `weight_base + index` does not fit in a filter weight
    #[error("Filter weight overflow: base {base} + index {index}")]
    WeightOverflow { base: u64, index: usize },

    /// No native engine on this platform
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The engine status wrapped by this error, if it came from an engine call.
    pub fn status(&self) -> Option<EngineStatus> {
        match self {
            Error::EngineConnect(status) | Error::Close(status) => Some(*status),
            Error::Registration { status, .. } | Error::Install { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the CLI should abort on this error.
    ///
    /// Close failures are only warnings: the dynamic session reclaims every
    /// object regardless.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Close(_))
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;
