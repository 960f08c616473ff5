//! 書籍サービス
//!
//! リポジトリ呼び出しを計測（呼び出し回数・所要時間）し、
//! 再試行とサーキットブレーカーで包む。失敗時は操作ごとのフォールバックを返す。
//!
//! | 操作 | フォールバック |
//! |---|---|
//! | 一覧 | 空ページ（要求されたページ番号・サイズを保持） |
//! | 取得 | 見つからない扱い |
//! | 作成 | `ServiceError::Unavailable` |
//! | 更新 | 見つからない扱い |
//! | 削除 | 削除なし（false） |
//! | 検索 | 空リスト |

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::metrics::MeterRegistry;
use crate::model::{Book, BookId, NewBook, Page};
use crate::repository::{BookRepository, RepositoryError};
use crate::resilience::{Resilience, ResilienceError};

/// メトリクス名の先頭に付けるエンティティ名
const ENTITY: &str = "book";

const OP_LIST: &str = "getAllBooks";
const OP_GET: &str = "getBookById";
const OP_CREATE: &str = "createBook";
const OP_UPDATE: &str = "updateBook";
const OP_DELETE: &str = "deleteBook";
const OP_SEARCH: &str = "searchBooks";

/// サービスエラー
///
/// 安全な空結果がない操作（作成）のみが返す。
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// ストレージが利用できない
    #[error("Unable to create book at this time")]
    Unavailable(#[source] ResilienceError),
}

/// 呼び出し回数のメトリクス名
pub fn calls_metric(operation: &str) -> String {
    format!("{}.{}.calls", ENTITY, operation)
}

/// 所要時間のメトリクス名
pub fn duration_metric(operation: &str) -> String {
    format!("{}.{}.duration", ENTITY, operation)
}

/// フォールバック適用回数のメトリクス名
pub fn fallbacks_metric(operation: &str) -> String {
    format!("{}.{}.fallbacks", ENTITY, operation)
}

/// 書籍サービス
///
/// 呼び出しをまたいだキャッシュは持たない。
pub struct BookService {
    repository: Arc<dyn BookRepository>,
    meters: Arc<MeterRegistry>,
    resilience: Resilience,
}

impl BookService {
    pub fn new(
        repository: Arc<dyn BookRepository>,
        meters: Arc<MeterRegistry>,
        resilience: Resilience,
    ) -> Self {
        Self {
            repository,
            meters,
            resilience,
        }
    }

    /// 呼び出し回数と所要時間を記録しながら実行する
    ///
    /// 成否にかかわらず記録する。再試行は1回の呼び出しとして数える。
    async fn instrumented<T>(&self, operation: &str, fut: impl Future<Output = T>) -> T {
        self.meters.increment(&calls_metric(operation));
        let started = Instant::now();
        let result = fut.await;
        self.meters
            .record_duration(&duration_metric(operation), started.elapsed());
        result
    }

    /// フォールバック適用を記録する
    fn record_fallback(&self, operation: &str, error: &ResilienceError) {
        self.meters.increment(&fallbacks_metric(operation));
        tracing::warn!(operation, error = %error, "フォールバックを適用");
    }

    /// 書籍一覧をページ単位で取得
    ///
    /// # Arguments
    /// * `page` - ページ番号（0始まり）
    /// * `size` - ページサイズ（1以上、境界で検証済み）
    pub async fn list_books(&self, page: u32, size: u32) -> Page<Book> {
        let repository = &self.repository;
        let result = self
            .instrumented(
                OP_LIST,
                self.resilience
                    .execute(OP_LIST, || repository.find_all(page, size)),
            )
            .await;

        match result {
            Ok(books) => books,
            Err(e) => {
                self.record_fallback(OP_LIST, &e);
                Page::empty(page, size)
            }
        }
    }

    /// IDで書籍を取得
    pub async fn get_book(&self, id: BookId) -> Option<Book> {
        let repository = &self.repository;
        let result = self
            .instrumented(
                OP_GET,
                self.resilience
                    .execute(OP_GET, || repository.find_by_id(id)),
            )
            .await;

        match result {
            Ok(book) => book,
            Err(e) => {
                self.record_fallback(OP_GET, &e);
                None
            }
        }
    }

    /// 書籍を作成
    ///
    /// # Returns
    /// * `Ok(Book)` - 採番済みの書籍
    /// * `Err(ServiceError::Unavailable)` - 再試行を使い切った、またはブレーカーが開いている
    pub async fn create_book(&self, book: NewBook) -> Result<Book, ServiceError> {
        let repository = &self.repository;
        let result = self
            .instrumented(
                OP_CREATE,
                self.resilience
                    .execute(OP_CREATE, || repository.insert(&book)),
            )
            .await;

        match result {
            Ok(saved) => {
                tracing::info!(book_id = saved.id, "書籍を作成");
                Ok(saved)
            }
            Err(e) => {
                self.record_fallback(OP_CREATE, &e);
                Err(ServiceError::Unavailable(e))
            }
        }
    }

    /// 書籍を更新
    ///
    /// 既存レコードにタイトル・説明を適用して保存する。IDは変わらない。
    /// 存在しない場合は保存せずに`None`を返す。
    pub async fn update_book(&self, id: BookId, changes: NewBook) -> Option<Book> {
        let repository = &self.repository;
        let result = self
            .instrumented(
                OP_UPDATE,
                self.resilience.execute(OP_UPDATE, || {
                    let changes = changes.clone();
                    async move {
                        let Some(mut book) = repository.find_by_id(id).await? else {
                            return Ok(None);
                        };
                        book.apply(changes);
                        repository.save(&book).await.map(Some)
                    }
                }),
            )
            .await;

        match result {
            Ok(Some(updated)) => {
                tracing::info!(book_id = id, "書籍を更新");
                Some(updated)
            }
            Ok(None) => {
                tracing::info!(book_id = id, "更新対象の書籍が見つからない");
                None
            }
            Err(e) => {
                // 呼び出し元には見つからない場合と同じ結果を返す
                self.record_fallback(OP_UPDATE, &e);
                None
            }
        }
    }

    /// 書籍を削除
    ///
    /// # Returns
    /// * `true` - 削除した
    /// * `false` - 存在しなかった、またはストレージ障害
    pub async fn delete_book(&self, id: BookId) -> bool {
        let repository = &self.repository;
        let result = self
            .instrumented(
                OP_DELETE,
                self.resilience.execute(OP_DELETE, || async move {
                    if repository.find_by_id(id).await?.is_none() {
                        return Ok(false);
                    }
                    repository.delete_by_id(id).await?;
                    Ok::<_, RepositoryError>(true)
                }),
            )
            .await;

        match result {
            Ok(deleted) => {
                if deleted {
                    tracing::info!(book_id = id, "書籍を削除");
                } else {
                    tracing::info!(book_id = id, "削除対象の書籍が見つからない");
                }
                deleted
            }
            Err(e) => {
                self.record_fallback(OP_DELETE, &e);
                false
            }
        }
    }

    /// 書籍を検索
    ///
    /// タイトルは大文字小文字を区別しない部分一致、説明は完全一致。
    /// 両方指定した場合は両方を満たすものを返す。
    pub async fn search_books(&self, title: Option<&str>, description: Option<&str>) -> Vec<Book> {
        let repository = &self.repository;
        let result = self
            .instrumented(
                OP_SEARCH,
                self.resilience
                    .execute(OP_SEARCH, || async move {
                        match (title, description) {
                            (Some(title), Some(description)) => {
                                let books = repository.find_by_title(title).await?;
                                Ok(books
                                    .into_iter()
                                    .filter(|b| b.description.as_deref() == Some(description))
                                    .collect())
                            }
                            (Some(title), None) => repository.find_by_title(title).await,
                            (None, Some(description)) => {
                                repository.find_by_description(description).await
                            }
                            (None, None) => Ok(Vec::new()),
                        }
                    }),
            )
            .await;

        match result {
            Ok(books) => books,
            Err(e) => {
                self.record_fallback(OP_SEARCH, &e);
                Vec::new()
            }
        }
    }
}
