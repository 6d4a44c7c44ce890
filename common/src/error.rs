use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid target: {0}")]
    Invalid(String),
    #[error("invalid range '{spec}': {reason}")]
    Range { spec: String, reason: String },
    #[error("{spec} expands to {len} addresses (max {max})")]
    TooLarge { spec: String, len: u64, max: u64 },
    #[error("cannot resolve hostname '{0}'")]
    Unresolved(String),
    #[error("cannot read hosts file '{path}': {reason}")]
    HostsFile { path: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortSpecError {
    #[error("invalid port '{0}'")]
    Invalid(String),
    #[error("invalid port range '{0}'")]
    Range(String),
    #[error("port specification is empty")]
    Empty,
}
