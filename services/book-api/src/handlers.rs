//! HTTPハンドラー
//!
//! - 書籍の一覧 (GET /api/v1/books)
//! - 書籍の取得 (GET /api/v1/books/{id})
//! - 書籍の作成 (POST /api/v1/books)
//! - 書籍の更新 (PUT /api/v1/books/{id})
//! - 書籍の削除 (DELETE /api/v1/books/{id})
//! - 書籍の検索 (GET /api/v1/books/search)
//! - ヘルスチェック (GET /health)
//! - メトリクス (GET /metrics)

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::dto::{ApiResponse, BookRequest, PageParams, SearchParams};
use crate::error::ApiError;
use crate::mapper;
use crate::model::BookId;

const BOOKS_RETRIEVED: &str = "Books retrieved successfully";
const BOOK_FOUND: &str = "Book found";
const BOOK_CREATED: &str = "Book created successfully";
const BOOK_UPDATED: &str = "Book updated successfully";
const BOOK_DELETED: &str = "Book deleted successfully";

/// Prometheusテキスト形式のContent-Type
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// パスのIDを取り出す（数値でなければ400）
fn book_id(path: Result<Path<BookId>, PathRejection>) -> Result<BookId, ApiError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(error = %rejection, "不正な書籍ID");
        ApiError::bad_request(format!("Invalid book id: {}", rejection.body_text()))
    })
}

/// JSONボディを取り出して検証する
///
/// 不正なJSONと検証違反はいずれも400として返す。
fn validated_request(
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Result<BookRequest, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "リクエストボディが不正");
        ApiError::bad_request(format!("Malformed request body: {}", rejection.body_text()))
    })?;

    if let Err(violations) = request.validate() {
        tracing::debug!(?violations, "リクエストの検証に失敗");
        return Err(ApiError::bad_request(format!(
            "Validation failed: {}",
            violations.join("; ")
        )));
    }

    Ok(request)
}

/// 書籍一覧エンドポイント (GET /api/v1/books?page=&size=)
///
/// # Returns
/// - 200 OK: ページ（ストレージ障害時は空ページ）
/// - 400 Bad Request: ページ指定が不正、またはsizeが0
pub async fn list_books(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return ApiError::bad_request(format!(
                "Invalid paging parameters: {}",
                rejection.body_text()
            ))
            .into_response();
        }
    };
    if params.size == 0 {
        return ApiError::bad_request("Page size must be at least 1").into_response();
    }

    tracing::info!(page = params.page, size = params.size, "書籍一覧リクエストを受信");

    let page = state.service.list_books(params.page, params.size).await;
    Json(ApiResponse::success(
        BOOKS_RETRIEVED,
        mapper::to_page_response(page),
    ))
    .into_response()
}

/// 書籍取得エンドポイント (GET /api/v1/books/{id})
///
/// # Returns
/// - 200 OK: 書籍
/// - 404 Not Found: 書籍が存在しない（ストレージ障害時も同じ）
pub async fn get_book(
    State(state): State<AppState>,
    path: Result<Path<BookId>, PathRejection>,
) -> Response {
    let id = match book_id(path) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.service.get_book(id).await {
        Some(book) => {
            Json(ApiResponse::success(BOOK_FOUND, mapper::to_response(book))).into_response()
        }
        None => ApiError::book_not_found().into_response(),
    }
}

/// 書籍作成エンドポイント (POST /api/v1/books)
///
/// # Returns
/// - 201 Created: 採番済みの書籍
/// - 400 Bad Request: リクエストボディが不正
/// - 503 Service Unavailable: ストレージが利用できない
pub async fn create_book(
    State(state): State<AppState>,
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Response {
    let request = match validated_request(body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    tracing::info!(title = %request.title, "書籍作成リクエストを受信");

    match state.service.create_book(mapper::to_entity(request)).await {
        Ok(book) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(BOOK_CREATED, mapper::to_response(book))),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "書籍作成エラー");
            ApiError::service_unavailable(e.to_string()).into_response()
        }
    }
}

/// 書籍更新エンドポイント (PUT /api/v1/books/{id})
///
/// # Returns
/// - 200 OK: 更新後の書籍
/// - 400 Bad Request: IDまたはリクエストボディが不正
/// - 404 Not Found: 書籍が存在しない（ストレージ障害時も同じ）
pub async fn update_book(
    State(state): State<AppState>,
    path: Result<Path<BookId>, PathRejection>,
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Response {
    let id = match book_id(path) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let request = match validated_request(body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    tracing::info!(book_id = id, "書籍更新リクエストを受信");

    match state
        .service
        .update_book(id, mapper::to_entity(request))
        .await
    {
        Some(book) => {
            Json(ApiResponse::success(BOOK_UPDATED, mapper::to_response(book))).into_response()
        }
        None => ApiError::book_not_found().into_response(),
    }
}

/// 書籍削除エンドポイント (DELETE /api/v1/books/{id})
///
/// # Returns
/// - 200 OK: 削除した（dataはnull）
/// - 404 Not Found: 書籍が存在しない（ストレージ障害時も同じ）
pub async fn delete_book(
    State(state): State<AppState>,
    path: Result<Path<BookId>, PathRejection>,
) -> Response {
    let id = match book_id(path) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    tracing::info!(book_id = id, "書籍削除リクエストを受信");

    if state.service.delete_book(id).await {
        Json(ApiResponse::<()>::success_without_data(BOOK_DELETED)).into_response()
    } else {
        ApiError::book_not_found().into_response()
    }
}

/// 書籍検索エンドポイント (GET /api/v1/books/search?title=&description=)
///
/// # Returns
/// - 200 OK: 一致した書籍（ストレージ障害時は空リスト）
/// - 400 Bad Request: 検索条件が1つもない、またはクエリが不正
pub async fn search_books(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return ApiError::bad_request(format!(
                "Invalid search parameters: {}",
                rejection.body_text()
            ))
            .into_response();
        }
    };
    let title = params.title.as_deref().filter(|s| !s.is_empty());
    let description = params.description.as_deref().filter(|s| !s.is_empty());
    if title.is_none() && description.is_none() {
        return ApiError::bad_request("At least one of title or description is required")
            .into_response();
    }

    tracing::info!(?title, ?description, "書籍検索リクエストを受信");

    let books = state.service.search_books(title, description).await;
    tracing::info!(count = books.len(), "検索結果を返却");

    let books: Vec<_> = books.into_iter().map(mapper::to_response).collect();
    Json(ApiResponse::success(BOOKS_RETRIEVED, books)).into_response()
}

/// ヘルスチェックエンドポイント (GET /health)
///
/// # Returns
/// - 200 OK: UP
/// - 503 Service Unavailable: DOWN
pub async fn health(State(state): State<AppState>) -> Response {
    let health = state.health.health().await;
    let status = if health.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

/// メトリクスエンドポイント (GET /metrics)
///
/// Prometheusのテキスト形式で出力する。
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.meters.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "メトリクス出力エラー");
            ApiError::internal_error(format!("Failed to render metrics: {}", e)).into_response()
        }
    }
}
