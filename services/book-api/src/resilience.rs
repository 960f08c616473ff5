//! 再試行とサーキットブレーカー
//!
//! リポジトリ呼び出しを包むラッパー。
//! - 再試行: 固定回数・固定待機（指数バックオフなし）
//! - サーキットブレーカー: 連続失敗で開き、クールダウン後に1回だけ試行する
//!
//! 各試行はブレーカーを通過する。再試行を使い切った場合やブレーカーが
//! 開いている場合は`ResilienceError`を返し、フォールバックは呼び出し側が決める。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::repository::RepositoryError;

/// 再試行・ブレーカーのエラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResilienceError {
    /// 再試行回数を使い切った
    #[error("再試行回数超過（{attempts}回）: {source}")]
    Exhausted {
        /// 実行した試行回数
        attempts: u32,
        /// 最後の試行のエラー
        source: RepositoryError,
    },

    /// ブレーカーが開いているため呼び出しを行わなかった
    #[error("サーキットブレーカーが開いています")]
    CircuitOpen,
}

/// 再試行ポリシー
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大試行回数（初回を含む、1以上）
    pub max_attempts: u32,
    /// 試行間の待機時間
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_millis(500),
        }
    }
}

/// サーキットブレーカー設定
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// ブレーカーを開く連続失敗回数
    pub failure_threshold: u32,
    /// 開いてから試行を再開するまでの時間
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// サーキットブレーカーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 通常状態
    Closed,
    /// 遮断中（`until`以降に半開へ移行）
    Open { until: Instant },
    /// 回復確認中
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
}

/// サーキットブレーカー
///
/// クローンは同じ状態を共有する。
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
            })),
        }
    }

    /// 現在の状態
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// 呼び出しを許可するか判定する
    ///
    /// 開いている間は拒否し、クールダウン経過後は半開に移行して許可する。
    async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open { until } if Instant::now() >= until => {
                tracing::info!("サーキットブレーカーを半開に移行");
                state.state = CircuitState::HalfOpen;
                true
            }
            CircuitState::Open { .. } => false,
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;
        if state.state == CircuitState::HalfOpen {
            tracing::info!("サーキットブレーカーを閉じました");
        }
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
    }

    async fn on_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        let should_open = state.state == CircuitState::HalfOpen
            || state.consecutive_failures >= self.config.failure_threshold;
        if should_open && !matches!(state.state, CircuitState::Open { .. }) {
            tracing::warn!(
                consecutive_failures = state.consecutive_failures,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "サーキットブレーカーを開きました"
            );
            state.state = CircuitState::Open {
                until: Instant::now() + self.config.cooldown,
            };
        }
    }
}

/// 再試行とブレーカーを組み合わせた実行器
#[derive(Debug, Clone)]
pub struct Resilience {
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl Resilience {
    pub fn new(retry: RetryPolicy, breaker: CircuitBreaker) -> Self {
        Self { retry, breaker }
    }

    /// 再試行もブレーカーも実質無効な実行器（1回だけ試行）
    pub fn none() -> Self {
        Self::new(
            RetryPolicy {
                max_attempts: 1,
                wait: Duration::ZERO,
            },
            CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: u32::MAX,
                cooldown: Duration::ZERO,
            }),
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// 操作を実行する
    ///
    /// 失敗時は`max_attempts`に達するまで`wait`だけ待って再試行する。
    ///
    /// # Arguments
    /// * `operation` - ログ用の操作名
    /// * `op` - 試行ごとに呼ばれる操作
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            if !self.breaker.try_acquire().await {
                tracing::warn!(operation, attempt, "サーキットブレーカーにより呼び出しを遮断");
                return Err(ResilienceError::CircuitOpen);
            }

            match op().await {
                Ok(value) => {
                    self.breaker.on_success().await;
                    return Ok(value);
                }
                Err(e) => {
                    self.breaker.on_failure().await;

                    if attempt >= max_attempts {
                        tracing::error!(operation, attempts = attempt, error = %e, "再試行回数を超過");
                        return Err(ResilienceError::Exhausted {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    tracing::warn!(operation, attempt, error = %e, "操作に失敗したため再試行します");
                    if !self.retry.wait.is_zero() {
                        tokio::time::sleep(self.retry.wait).await;
                    }
                }
            }
        }
    }
}
