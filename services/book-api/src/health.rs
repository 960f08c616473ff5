//! ヘルスチェック
//!
//! ストレージへの疎通を確認するレディネスプローブ。
//! 書籍のCRUD処理とは独立しており、接続を1本取得して検証クエリを実行するだけ。

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_sqlite::Pool;
use serde::{Deserialize, Serialize};

use crate::repository::RepositoryError;

/// 検証クエリの制限時間
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(1);

/// ヘルス状態
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

/// ヘルスチェック結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub status: HealthStatus,
    pub details: BTreeMap<String, String>,
}

impl Health {
    pub fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            details: BTreeMap::new(),
        }
    }

    pub fn down() -> Self {
        Self {
            status: HealthStatus::Down,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

/// ヘルスチェックを行うトレイト
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    async fn health(&self) -> Health;
}

/// データベースのヘルスチェック
///
/// 読み取りプールから接続を取得し、`SELECT 1`で有効性を確認する。
/// - 成功: UP（`Database: Available`）
/// - 想定外の結果・制限時間超過: DOWN（`Database: Not available`）
/// - 接続・クエリエラー: DOWN（`error: <メッセージ>`）
pub struct DatabaseHealthIndicator {
    pool: Pool,
}

impl DatabaseHealthIndicator {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// 接続を取得して検証クエリを実行する（内部用）
    async fn probe(&self) -> Result<bool, RepositoryError> {
        let conn = self.pool.get().await?;
        let value = conn
            .interact(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await??;
        Ok(value == 1)
    }
}

#[async_trait]
impl HealthIndicator for DatabaseHealthIndicator {
    async fn health(&self) -> Health {
        match tokio::time::timeout(VALIDATION_TIMEOUT, self.probe()).await {
            Ok(Ok(true)) => Health::up().with_detail("Database", "Available"),
            Ok(Ok(false)) => Health::down().with_detail("Database", "Not available"),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "データベースのヘルスチェックに失敗");
                Health::down().with_detail("error", e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = VALIDATION_TIMEOUT.as_millis() as u64,
                    "データベースのヘルスチェックがタイムアウト"
                );
                Health::down().with_detail("Database", "Not available")
            }
        }
    }
}
