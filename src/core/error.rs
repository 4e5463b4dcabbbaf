// Copyright @yucwang 2026

use std::fmt;

/// Failure taxonomy shared by every stage of the photon pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TracerError {
    /// Missing or invalid light source, sample generator, geometry or setting.
    InvalidConfiguration(String),
    /// The named kernel program has not finished building; nothing was done.
    CompilationPending(String),
    /// A kernel failed while executing; its output was discarded.
    DeviceExecution { kernel: String, message: String },
    /// A buffer was requested while another context still owns it.
    SynchronizationViolation(String),
}

impl TracerError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        TracerError::InvalidConfiguration(message.into())
    }

    pub fn device<K: Into<String>, M: Into<String>>(kernel: K, message: M) -> Self {
        TracerError::DeviceExecution { kernel: kernel.into(), message: message.into() }
    }

    /// Device and pending-build errors are recovered locally; configuration
    /// and synchronization errors go straight back to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TracerError::CompilationPending(_) | TracerError::DeviceExecution { .. })
    }
}

impl fmt::Display for TracerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracerError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            TracerError::CompilationPending(kernel) => write!(f, "kernel '{}' is still compiling", kernel),
            TracerError::DeviceExecution { kernel, message } => {
                write!(f, "kernel '{}' failed: {}", kernel, message)
            }
            TracerError::SynchronizationViolation(msg) => write!(f, "synchronization violation: {}", msg),
        }
    }
}

impl std::error::Error for TracerError {}
