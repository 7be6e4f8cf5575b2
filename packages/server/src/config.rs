//! Server configuration (command line flags with environment fallbacks).

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("store timeout must be greater than zero")]
    ZeroStoreTimeout,
    #[error("host must not be empty")]
    EmptyHost,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "biblioteca-server")]
#[command(about = "Real-time private messaging server", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "BIBLIOTECA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "BIBLIOTECA_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the conversation database. Conversations are kept in memory when omitted
    #[arg(long, env = "BIBLIOTECA_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Upper bound for a single conversation store call, in milliseconds
    #[arg(long, env = "BIBLIOTECA_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    /// Mirror each persisted message back to the sender's connection
    #[arg(
        long,
        env = "BIBLIOTECA_ECHO_TO_SENDER",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub echo_to_sender: bool,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::ZeroStoreTimeout);
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_flags_are_parsed() {
        // テスト項目: フラグで全ての設定を指定できる
        // given (前提条件):
        let args = [
            "biblioteca-server",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--db-path",
            "/tmp/biblioteca.redb",
            "--store-timeout-ms",
            "250",
            "--echo-to-sender",
            "false",
        ];

        // when (操作):
        let config = ServerConfig::try_parse_from(args).unwrap();

        // then (期待する結果):
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/biblioteca.redb")));
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        assert!(!config.echo_to_sender);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        // テスト項目: タイムアウト 0 は設定エラー
        // given (前提条件):
        let config =
            ServerConfig::try_parse_from(["biblioteca-server", "--store-timeout-ms", "0"]).unwrap();

        // when (操作):
        let result = config.validate();

        // then (期待する結果):
        assert_eq!(result, Err(ConfigError::ZeroStoreTimeout));
    }

    #[test]
    fn test_blank_host_is_rejected() {
        // テスト項目: 空のホストは設定エラー
        // given (前提条件):
        let config = ServerConfig::try_parse_from(["biblioteca-server", "--host", " "]).unwrap();

        // when (操作) / then (期待する結果):
        assert_eq!(config.validate(), Err(ConfigError::EmptyHost));
    }
}
