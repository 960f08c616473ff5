//! アプリケーション設定
//!
//! 環境変数からサーバー・データベース・再試行・ブレーカーの設定を読み込む。
//! 未設定の項目はデフォルト値を使用する。

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// リッスンアドレス環境変数名
pub const BIND_ADDR_ENV: &str = "BIND_ADDR";
/// データベースパス環境変数名
pub const DB_PATH_ENV: &str = "DB_PATH";
/// 最大試行回数環境変数名
pub const RETRY_MAX_ATTEMPTS_ENV: &str = "RETRY_MAX_ATTEMPTS";
/// 再試行待機時間（ミリ秒）環境変数名
pub const RETRY_WAIT_MS_ENV: &str = "RETRY_WAIT_MS";
/// ブレーカー閾値環境変数名
pub const CIRCUIT_FAILURE_THRESHOLD_ENV: &str = "CIRCUIT_FAILURE_THRESHOLD";
/// ブレーカークールダウン（秒）環境変数名
pub const CIRCUIT_COOLDOWN_SECS_ENV: &str = "CIRCUIT_COOLDOWN_SECS";

/// デフォルトのリッスンアドレス
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
/// デフォルトのデータベースパス
pub const DEFAULT_DB_PATH: &str = "books.db";

/// 設定エラー
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// 環境変数の値が不正
    #[error("環境変数 {name} の値が不正です: {value}")]
    InvalidValue {
        /// 環境変数名
        name: String,
        /// 設定されていた値
        value: String,
    },
}

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: String,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: DEFAULT_DB_PATH.to_string(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// 環境変数を読み込んでパースする（未設定ならNone）
fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// 1以上の整数として読み込む
fn parse_positive_env(name: &str) -> Result<Option<u32>, ConfigError> {
    match parse_env::<u32>(name)? {
        Some(0) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: "0".to_string(),
        }),
        other => Ok(other),
    }
}

impl AppConfig {
    /// 環境変数から設定を読み込み
    ///
    /// # 環境変数
    /// - `BIND_ADDR`: リッスンアドレス（デフォルト: 127.0.0.1:8080）
    /// - `DB_PATH`: データベースファイルのパス（デフォルト: books.db）
    /// - `RETRY_MAX_ATTEMPTS`: 最大試行回数（デフォルト: 3、1以上）
    /// - `RETRY_WAIT_MS`: 再試行の待機時間（デフォルト: 500）
    /// - `CIRCUIT_FAILURE_THRESHOLD`: ブレーカーを開く連続失敗回数（デフォルト: 5、1以上）
    /// - `CIRCUIT_COOLDOWN_SECS`: ブレーカーのクールダウン秒数（デフォルト: 60）
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = parse_env(BIND_ADDR_ENV)?.unwrap_or(defaults.bind_addr);
        let db_path = std::env::var(DB_PATH_ENV).unwrap_or(defaults.db_path);

        let retry = RetryPolicy {
            max_attempts: parse_positive_env(RETRY_MAX_ATTEMPTS_ENV)?
                .unwrap_or(defaults.retry.max_attempts),
            wait: parse_env(RETRY_WAIT_MS_ENV)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.wait),
        };

        let circuit_breaker = CircuitBreakerConfig {
            failure_threshold: parse_positive_env(CIRCUIT_FAILURE_THRESHOLD_ENV)?
                .unwrap_or(defaults.circuit_breaker.failure_threshold),
            cooldown: parse_env(CIRCUIT_COOLDOWN_SECS_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.circuit_breaker.cooldown),
        };

        Ok(Self {
            bind_addr,
            db_path,
            retry,
            circuit_breaker,
        })
    }
}
