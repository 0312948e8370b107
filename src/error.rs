use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Service '{role}' is already registered")]
    DuplicateService { role: String },

    #[error("Service '{role}' is not registered")]
    UnknownService { role: String },

    #[error("Service '{service}' depends on '{dependency}', which is not registered")]
    MissingDependency { service: String, dependency: String },

    #[error("Dependency cycle between services: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Service '{role}' is not of the requested type")]
    ServiceType { role: String },

    #[error("Service '{role}' used before it was {stage}")]
    ServiceNotReady { role: String, stage: String },

    #[error("Unknown service implementation '{implementation}' for role '{role}'")]
    UnknownImplementation { role: String, implementation: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate_limited")]
    RateLimited,

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected JSON-RPC response: {message}")]
    InvalidResponse { message: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ABI error: {message}")]
    Abi { message: String },

    #[error("ABI decoding failed: {0}")]
    AbiDecode(#[from] alloy_sol_types::Error),

    #[error("Invalid amount '{value}': {message}")]
    Amount { value: String, message: String },

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: String },

    #[error("Connected to network {actual}, expected {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("No account available")]
    NoAccount,

    #[error("No address configured for contract '{name}'")]
    UnknownContract { name: String },

    #[error("Unknown token '{symbol}'")]
    UnknownToken { symbol: String },

    #[error("'{symbol}' is not an ERC-20 token")]
    NotErc20 { symbol: String },

    #[error("That CDP doesn't exist--try opening a new one.")]
    CdpNotFound { id: u64 },

    #[error("Transaction {hash} was reverted")]
    TransactionFailed { hash: String },

    #[error("Transaction {hash} was not mined after {polls} polls")]
    Timeout { hash: String, polls: u32 },

    #[error("Missing event '{event}' in receipt of {hash}")]
    MissingEvent { event: String, hash: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn abi(message: impl Into<String>) -> Self {
        Error::Abi {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
