//! SQLite書籍リポジトリ
//!
//! `BookRepository`のSQLite実装。
//! - 書き込み: 専用の単一接続（Arc<Mutex<Connection>>）
//! - 読み取り: deadpool-sqliteによるasync接続プール

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{Book, BookId, NewBook, Page};
use crate::repository::{BookRepository, RepositoryError};

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<deadpool_sqlite::BuildError> for RepositoryError {
    fn from(err: deadpool_sqlite::BuildError) -> Self {
        RepositoryError::Build(err.to_string())
    }
}

impl From<deadpool_sqlite::PoolError> for RepositoryError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        RepositoryError::Pool(err.to_string())
    }
}

impl From<deadpool_sqlite::InteractError> for RepositoryError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

/// 読み取りプールの最大接続数
const READ_POOL_MAX_SIZE: usize = 4;

/// SQLiteデータベースのスキーマを定義するSQL
const SCHEMA_SQL: &str = r#"
-- WALモード設定
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

-- 書籍テーブル
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(title) <= 100),
    description TEXT CHECK (description IS NULL OR length(description) <= 100)
);

CREATE INDEX IF NOT EXISTS idx_books_description ON books(description);
"#;

const SELECT_COLUMNS: &str = "SELECT id, title, description FROM books";

/// SQLite書籍リポジトリ
pub struct SqliteBookRepository {
    /// 書き込み専用接続（SQLiteは書き込みを直列化するため単一接続）
    write_conn: Arc<Mutex<Connection>>,
    /// 読み取り用async接続プール
    read_pool: Pool,
}

impl SqliteBookRepository {
    /// 新しいSqliteBookRepositoryを作成
    ///
    /// データベースファイルを開き、スキーマを初期化する。
    /// WALモードを有効にし、書き込み用単一接続と読み取り用プールを構成する。
    ///
    /// # Arguments
    /// * `db_path` - データベースファイルのパス
    pub async fn new(db_path: &str) -> Result<Self, RepositoryError> {
        let write_conn = Connection::open(db_path)?;
        write_conn.execute_batch(SCHEMA_SQL)?;

        let read_pool = Config::new(db_path)
            .builder(Runtime::Tokio1)
            .map_err(|e| RepositoryError::Build(e.to_string()))?
            .max_size(READ_POOL_MAX_SIZE)
            .build()?;

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
        })
    }

    /// 読み取り用プールを取得
    ///
    /// ヘルスチェックが接続の疎通確認に使う。
    pub fn read_pool(&self) -> &Pool {
        &self.read_pool
    }

    /// 書き込み専用接続でクロージャを実行する（内部用）
    ///
    /// ブロッキング処理のため`spawn_blocking`で実行する。
    async fn with_write_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.write_conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| {
                RepositoryError::Database(
                    "書き込み接続のロック取得に失敗（Mutex poisoned）".to_string(),
                )
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| RepositoryError::Database(format!("タスク実行エラー: {}", e)))?
    }

    /// 読み取りプールの接続でクロージャを実行する（内部用）
    async fn with_read_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.read_pool.get().await?;
        conn.interact(f).await?
    }
}

/// 行を書籍に変換
fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
    })
}

/// LIKE句のワイルドカード文字をエスケープ
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// 複数行のクエリを実行して書籍リストを返す（内部用）
fn query_books(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Book>, RepositoryError> {
    let mut stmt = conn.prepare(sql)?;
    let books = stmt
        .query_map(params, row_to_book)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn find_all(&self, page: u32, size: u32) -> Result<Page<Book>, RepositoryError> {
        // i64に収まらないオフセットは全件数を超えるため、行を読まずに空ページとする
        let offset = i64::from(page).checked_mul(i64::from(size));

        self.with_read_conn(move |conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
            let content = match offset {
                Some(offset) if offset < total => query_books(
                    conn,
                    &format!("{} ORDER BY id LIMIT ?1 OFFSET ?2", SELECT_COLUMNS),
                    rusqlite::params![i64::from(size), offset],
                )?,
                _ => Vec::new(),
            };
            Ok(Page::new(content, page, size, total.max(0) as u64))
        })
        .await
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, RepositoryError> {
        self.with_read_conn(move |conn| {
            let book = conn
                .query_row(
                    &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                    [id],
                    row_to_book,
                )
                .optional()?;
            Ok(book)
        })
        .await
    }

    async fn insert(&self, book: &NewBook) -> Result<Book, RepositoryError> {
        let book = book.clone();

        self.with_write_conn(move |conn| {
            conn.execute(
                "INSERT INTO books (title, description) VALUES (?1, ?2)",
                rusqlite::params![&book.title, &book.description],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Book::from_new(id, book))
        })
        .await
    }

    async fn save(&self, book: &Book) -> Result<Book, RepositoryError> {
        let book = book.clone();

        self.with_write_conn(move |conn| {
            // 存在しないIDの場合は挿入になる（insert-or-update）
            conn.execute(
                "INSERT INTO books (id, title, description) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET title = excluded.title, description = excluded.description",
                rusqlite::params![book.id, &book.title, &book.description],
            )?;
            Ok(book)
        })
        .await
    }

    async fn delete_by_id(&self, id: BookId) -> Result<(), RepositoryError> {
        self.with_write_conn(move |conn| {
            conn.execute("DELETE FROM books WHERE id = ?1", [id])?;
            Ok(())
        })
        .await
    }

    async fn find_by_title(&self, keyword: &str) -> Result<Vec<Book>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(&keyword.to_lowercase()));

        self.with_read_conn(move |conn| {
            query_books(
                conn,
                &format!(
                    "{} WHERE LOWER(title) LIKE ?1 ESCAPE '\\' ORDER BY id",
                    SELECT_COLUMNS
                ),
                [&pattern],
            )
        })
        .await
    }

    async fn find_by_description(
        &self,
        description: &str,
    ) -> Result<Vec<Book>, RepositoryError> {
        let description = description.to_string();

        self.with_read_conn(move |conn| {
            query_books(
                conn,
                &format!("{} WHERE description = ?1 ORDER BY id", SELECT_COLUMNS),
                [&description],
            )
        })
        .await
    }
}
