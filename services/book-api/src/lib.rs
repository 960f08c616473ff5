//! 書籍管理用HTTP APIサーバー
//!
//! 本クレートは以下の機能を提供する:
//! - 書籍のCRUD (/api/v1/books)
//! - 書籍の検索 (GET /api/v1/books/search)
//! - ヘルスチェック (GET /health)
//! - メトリクス (GET /metrics)
//!
//! ストレージ呼び出しは再試行とサーキットブレーカーで包み、
//! 失敗時は操作ごとのフォールバックを返す。

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod mapper;
pub mod metrics;
pub mod model;
pub mod repository;
pub mod resilience;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::health::HealthIndicator;
use crate::metrics::MeterRegistry;
use crate::service::BookService;

/// アプリケーション状態
///
/// ルーター全体で共有される状態を保持する。
#[derive(Clone)]
pub struct AppState {
    /// 書籍サービス
    pub service: Arc<BookService>,
    /// メトリクスレジストリ（サービスと共有）
    pub meters: Arc<MeterRegistry>,
    /// ヘルスチェック
    pub health: Arc<dyn HealthIndicator>,
}

impl AppState {
    pub fn new(
        service: Arc<BookService>,
        meters: Arc<MeterRegistry>,
        health: Arc<dyn HealthIndicator>,
    ) -> Self {
        Self {
            service,
            meters,
            health,
        }
    }
}

/// ルーターを構築する
///
/// 全エンドポイントのルーティングを定義する。
/// TraceLayerによりリクエスト/レスポンスの構造化ログを自動記録する。
pub fn create_router(state: AppState) -> Router {
    let books = Router::new()
        .route(
            "/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route("/books/search", get(handlers::search_books))
        .route(
            "/books/{id}",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1", books)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod api_endpoint_tests {
    use super::*;
    use crate::health::DatabaseHealthIndicator;
    use crate::resilience::Resilience;
    use crate::store::SqliteBookRepository;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tempfile::tempdir;
    use tower::ServiceExt;

    /// SQLiteストア付きのテスト用ルーターを作成
    async fn create_test_app() -> (Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db").to_string_lossy().to_string();
        let repo = SqliteBookRepository::new(&db_path).await.unwrap();
        let health = DatabaseHealthIndicator::new(repo.read_pool().clone());
        let meters = Arc::new(MeterRegistry::new());
        let service = BookService::new(Arc::new(repo), meters.clone(), Resilience::none());
        let state = AppState::new(Arc::new(service), meters, Arc::new(health));
        (create_router(state), dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// 作成から削除までの一連の操作を確認
    #[tokio::test]
    async fn test_book_lifecycle() {
        let (app, _dir) = create_test_app().await;

        // 作成: 最初の書籍はID 1
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/books",
            Some(json!({"title": "Book A", "description": "Desc A"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["data"],
            json!({"id": 1, "title": "Book A", "description": "Desc A"})
        );

        // 取得
        let (status, body) = send(&app, "GET", "/api/v1/books/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Book found");

        // 更新
        let (status, body) = send(
            &app,
            "PUT",
            "/api/v1/books/1",
            Some(json!({"title": "Book B", "description": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({"id": 1, "title": "Book B", "description": null})
        );

        // 一覧
        let (status, body) = send(&app, "GET", "/api/v1/books", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalElements"], 1);
        assert_eq!(body["data"]["totalPages"], 1);

        // 削除
        let (status, body) = send(&app, "DELETE", "/api/v1/books/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], Value::Null);

        // 削除後は見つからない
        let (status, body) = send(&app, "GET", "/api/v1/books/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Book not found");
    }

    #[tokio::test]
    async fn test_get_unknown_book_returns_404() {
        let (app, _dir) = create_test_app().await;

        let (status, body) = send(&app, "GET", "/api/v1/books/999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"success": false, "message": "Book not found", "data": null})
        );
    }

    /// ページングが件数・総ページ数を返すことを確認
    #[tokio::test]
    async fn test_list_books_pagination() {
        let (app, _dir) = create_test_app().await;
        for i in 1..=3 {
            let (status, _) = send(
                &app,
                "POST",
                "/api/v1/books",
                Some(json!({"title": format!("Book {}", i)})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", "/api/v1/books?page=1&size=2", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["content"][0]["title"], "Book 3");
        assert_eq!(body["data"]["totalElements"], 3);
        assert_eq!(body["data"]["totalPages"], 2);
    }

    /// 最大のページ番号・サイズでも200と空ページを返すことを確認
    #[tokio::test]
    async fn test_list_books_max_paging_returns_empty_page() {
        let (app, _dir) = create_test_app().await;
        send(&app, "POST", "/api/v1/books", Some(json!({"title": "Book A"}))).await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/v1/books?page=4294967295&size=4294967295",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"], json!([]));
        assert_eq!(body["data"]["number"], 4294967295u64);
        assert_eq!(body["data"]["totalElements"], 1);
    }

    #[tokio::test]
    async fn test_search_books_by_title_case_insensitive() {
        let (app, _dir) = create_test_app().await;
        for title in ["Rust in Action", "Go Basics"] {
            send(&app, "POST", "/api/v1/books", Some(json!({"title": title}))).await;
        }

        let (status, body) = send(&app, "GET", "/api/v1/books/search?title=RUST", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["title"], "Rust in Action");
    }

    #[tokio::test]
    async fn test_health_reports_database_available() {
        let (app, _dir) = create_test_app().await;

        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "UP", "details": {"Database": "Available"}})
        );
    }

    #[tokio::test]
    async fn test_unknown_endpoint_returns_not_found() {
        let (app, _dir) = create_test_app().await;

        let request = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
