//! 書籍管理用HTTP APIサーバーのエントリーポイント

use std::sync::Arc;

use book_api::config::AppConfig;
use book_api::health::DatabaseHealthIndicator;
use book_api::logging::init_logging;
use book_api::metrics::MeterRegistry;
use book_api::resilience::{CircuitBreaker, Resilience};
use book_api::service::BookService;
use book_api::store::SqliteBookRepository;
use book_api::{AppState, create_router};
use tokio::signal;

/// シャットダウンシグナルを待機する
///
/// SIGTERMまたはCtrl+C (SIGINT) を待機し、いずれかを受信したらリターンする。
/// axum::serve の with_graceful_shutdown() と組み合わせて使用することで、
/// 新規リクエストの受付停止と処理中リクエストの完了待機を実現する。
///
/// # Panics
/// シグナルハンドラーの登録に失敗した場合はパニックする。
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Ctrl+C シグナルハンドラーの登録に失敗しました");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM シグナルハンドラーの登録に失敗しました")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C (SIGINT) を受信しました。graceful shutdownを開始します");
        }
        _ = terminate => {
            tracing::info!("SIGTERM を受信しました。graceful shutdownを開始します");
        }
    }
}

/// メイン関数
///
/// 設定を読み込み、ストア・サービスを組み立ててHTTPサーバーを起動する。
/// SIGTERMまたはCtrl+Cを受信するとgraceful shutdownを実行する。
///
/// # 環境変数
/// - `BIND_ADDR`: リッスンアドレス（デフォルト: 127.0.0.1:8080）
/// - `DB_PATH`: データベースファイルのパス（デフォルト: books.db）
/// - `RETRY_MAX_ATTEMPTS` / `RETRY_WAIT_MS`: 再試行の設定
/// - `CIRCUIT_FAILURE_THRESHOLD` / `CIRCUIT_COOLDOWN_SECS`: サーキットブレーカーの設定
/// - `RUST_LOG`: ログレベル（デフォルト: info）
#[tokio::main]
async fn main() {
    init_logging();

    tracing::info!("書籍APIサーバーを起動します");

    let config = AppConfig::from_env().expect("設定の読み込みに失敗しました");
    tracing::info!(
        bind_addr = %config.bind_addr,
        db_path = %config.db_path,
        retry_max_attempts = config.retry.max_attempts,
        circuit_failure_threshold = config.circuit_breaker.failure_threshold,
        "設定を読み込みました"
    );

    let repository = SqliteBookRepository::new(&config.db_path)
        .await
        .expect("SQLiteストアの初期化に失敗しました");
    tracing::info!("SQLiteストアを初期化しました");

    let health = DatabaseHealthIndicator::new(repository.read_pool().clone());
    let meters = Arc::new(MeterRegistry::new());
    let resilience = Resilience::new(
        config.retry.clone(),
        CircuitBreaker::new(config.circuit_breaker.clone()),
    );
    let service = BookService::new(Arc::new(repository), meters.clone(), resilience);

    let app = create_router(AppState::new(
        Arc::new(service),
        meters,
        Arc::new(health),
    ));

    tracing::info!("リッスン開始: {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("アドレスのバインドに失敗しました");

    // shutdown_signal()がシグナルを受信すると新規コネクションの受付を停止し、
    // 処理中のリクエストの完了を待ってからSQLiteコネクションをドロップする
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("サーバーの起動に失敗しました");

    tracing::info!("サーバーが正常に停止しました");
}
