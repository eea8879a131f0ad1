//! Utility module for WatchRoom
//!
//! This module provides common utilities used throughout the application:
//! - Error handling with custom error types
//! - Configuration management
//! - Common helper functions

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, GeneralConfig, PlayerConfig, ServerConfig, SyncConfig};
pub use error::{IntoRoomError, Result, WatchRoomError};

/// Initialize the application configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Format a position in seconds for display
///
/// Returns `m:ss`; minutes are not wrapped into hours. Negative, zero and
/// non-finite inputs render as `0:00`.
pub fn format_time(total_seconds: f64) -> String {
    if !total_seconds.is_finite() || total_seconds <= 0.0 {
        return "0:00".to_string();
    }

    let secs = total_seconds.floor() as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(59.9), "0:59");
        assert_eq!(format_time(60.0), "1:00");
        assert_eq!(format_time(754.25), "12:34");
        assert_eq!(format_time(3725.0), "62:05");
    }
}
