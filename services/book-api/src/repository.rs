//! 書籍リポジトリ（永続化ゲートウェイ）
//!
//! ストレージ実装を抽象化するトレイト。
//! 本番はSQLite実装（`store::SqliteBookRepository`）、テストはモック実装を使う。

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Book, BookId, NewBook, Page};

/// リポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// プール取得エラー
    #[error("プールエラー: {0}")]
    Pool(String),

    /// 接続構築エラー
    #[error("接続構築エラー: {0}")]
    Build(String),
}

/// 書籍永続化用トレイト
///
/// 異なる実装を可能にする（実際のSQLite、テスト用モック）。
/// 存在確認は`find_by_id`で行う。
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// ページ単位で全件取得
    ///
    /// # 引数
    /// * `page` - ページ番号（0始まり）
    /// * `size` - ページサイズ（1以上）
    ///
    /// # 戻り値
    /// * `Ok(Page<Book>)` - id昇順の当該ページと全件数
    async fn find_all(&self, page: u32, size: u32) -> Result<Page<Book>, RepositoryError>;

    /// IDで取得
    ///
    /// # 戻り値
    /// * 見つかった場合は`Ok(Some(Book))`
    /// * 見つからなかった場合は`Ok(None)`
    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, RepositoryError>;

    /// 新規挿入（IDを採番して返す）
    async fn insert(&self, book: &NewBook) -> Result<Book, RepositoryError>;

    /// 既存レコードを上書き保存
    async fn save(&self, book: &Book) -> Result<Book, RepositoryError>;

    /// IDで削除
    async fn delete_by_id(&self, id: BookId) -> Result<(), RepositoryError>;

    /// タイトルの部分一致検索（大文字小文字を区別しない）
    async fn find_by_title(&self, keyword: &str) -> Result<Vec<Book>, RepositoryError>;

    /// 説明の完全一致検索
    async fn find_by_description(&self, description: &str)
    -> Result<Vec<Book>, RepositoryError>;
}
