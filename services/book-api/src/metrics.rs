//! メトリクスレジストリ
//!
//! 名前付きカウンターと名前付きタイマー（所要時間ヒストグラム）を保持する。
//! 実体はprometheusのコレクターで、`GET /metrics`でテキスト形式を出力する。
//!
//! 名前はドット区切り（例: `book.getAllBooks.calls`）で扱い、
//! Prometheus上ではドットをアンダースコアに置換した名前で登録する。

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use thiserror::Error;

/// メトリクス出力エラー
#[derive(Debug, Error)]
pub enum MetricsError {
    /// エンコードエラー
    #[error("メトリクスのエンコードに失敗: {0}")]
    Encode(#[from] prometheus::Error),

    /// UTF-8変換エラー
    #[error("メトリクスのUTF-8変換に失敗: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// メトリクスレジストリ
///
/// 複数リクエストからの同時記録に対応する（prometheusのコレクターはアトミック）。
/// 初回参照時にコレクターを作成・登録する。
#[derive(Default)]
pub struct MeterRegistry {
    registry: Registry,
    counters: Mutex<HashMap<String, Counter>>,
    timers: Mutex<HashMap<String, Histogram>>,
}

/// ドット区切りの名前をPrometheusのメトリクス名に変換
///
/// 使用可能文字は`[a-zA-Z0-9_:]`で、先頭は数字以外。
fn exposition_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

impl MeterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 名前付きカウンターを取得（なければ作成）
    pub fn counter(&self, name: &str) -> Counter {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = counters.get(name) {
            return counter.clone();
        }

        let counter = match Counter::with_opts(Opts::new(exposition_name(name), name)) {
            Ok(counter) => counter,
            Err(e) => {
                tracing::warn!(metric = name, error = %e, "カウンターの作成に失敗");
                return Self::detached_counter();
            }
        };
        if let Err(e) = self.registry.register(Box::new(counter.clone())) {
            // 置換後の名前が衝突した場合も計測自体は継続する
            tracing::warn!(metric = name, error = %e, "カウンターの登録に失敗");
        }
        counters.insert(name.to_string(), counter.clone());
        counter
    }

    /// 名前付きタイマーを取得（なければ作成）
    pub fn timer(&self, name: &str) -> Histogram {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = timers.get(name) {
            return timer.clone();
        }

        let timer = match Histogram::with_opts(HistogramOpts::new(exposition_name(name), name)) {
            Ok(timer) => timer,
            Err(e) => {
                tracing::warn!(metric = name, error = %e, "タイマーの作成に失敗");
                return Self::detached_timer();
            }
        };
        if let Err(e) = self.registry.register(Box::new(timer.clone())) {
            tracing::warn!(metric = name, error = %e, "タイマーの登録に失敗");
        }
        timers.insert(name.to_string(), timer.clone());
        timer
    }

    /// カウンターを1増やす
    pub fn increment(&self, name: &str) {
        self.counter(name).inc();
    }

    /// 所要時間を記録する
    pub fn record_duration(&self, name: &str, duration: Duration) {
        self.timer(name).observe(duration.as_secs_f64());
    }

    /// カウンターの現在値（未作成なら0）
    pub fn counter_value(&self, name: &str) -> f64 {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.get(name).map_or(0.0, Counter::get)
    }

    /// タイマーの記録回数（未作成なら0）
    pub fn timer_count(&self, name: &str) -> u64 {
        let timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.get(name).map_or(0, Histogram::get_sample_count)
    }

    /// タイマーの合計秒数（未作成なら0）
    pub fn timer_sum_seconds(&self, name: &str) -> f64 {
        let timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.get(name).map_or(0.0, Histogram::get_sample_sum)
    }

    /// Prometheusテキスト形式で出力
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// レジストリに登録しないカウンター（作成失敗時の代替）
    fn detached_counter() -> Counter {
        Counter::with_opts(Opts::new("detached_counter", "detached")).unwrap_or_else(|_| {
            unreachable!("固定名のカウンター作成は失敗しない")
        })
    }

    /// レジストリに登録しないタイマー（作成失敗時の代替）
    fn detached_timer() -> Histogram {
        Histogram::with_opts(HistogramOpts::new("detached_timer", "detached")).unwrap_or_else(
            |_| unreachable!("固定名のタイマー作成は失敗しない"),
        )
    }
}
