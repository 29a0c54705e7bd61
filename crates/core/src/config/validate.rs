use super::{types::Config, ConfigError};
use crate::target::is_known_arch;

/// Validate configuration
/// Currently validates:
/// - Control server port is not 0
/// - At least one architecture is enabled and all are known
/// - Timeouts are non-zero and the install budget fits in the session
/// - Disk size is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.architectures.is_empty() {
        return Err(ConfigError::ValidationError(
            "architectures cannot be empty".to_string(),
        ));
    }

    if let Some(unknown) = config.architectures.iter().find(|a| !is_known_arch(a)) {
        return Err(ConfigError::ValidationError(format!(
            "unknown architecture: {}",
            unknown
        )));
    }

    let emulator = &config.emulator;
    if emulator.session_timeout_secs == 0 || emulator.install_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "emulator timeouts cannot be 0".to_string(),
        ));
    }

    if emulator.install_timeout_secs > emulator.session_timeout_secs {
        return Err(ConfigError::ValidationError(format!(
            "emulator.install_timeout_secs ({}) exceeds emulator.session_timeout_secs ({})",
            emulator.install_timeout_secs, emulator.session_timeout_secs
        )));
    }

    if config.disk.size_mb == 0 {
        return Err(ConfigError::ValidationError(
            "disk.size_mb cannot be 0".to_string(),
        ));
    }

    Ok(())
}
