//! テスト用のモックリポジトリ
//!
//! インメモリで書籍を保持し、指定回数だけ失敗を注入できる。

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::model::{Book, BookId, NewBook, Page};
use crate::repository::{BookRepository, RepositoryError};

#[derive(Default)]
struct MockState {
    books: BTreeMap<BookId, Book>,
    next_id: BookId,
}

/// インメモリのモックリポジトリ
#[derive(Default)]
pub struct MockBookRepository {
    state: Mutex<MockState>,
    /// 残りの失敗回数（呼び出しごとに1減る）
    failures_remaining: AtomicU32,
    /// 呼び出し回数（全メソッド）
    pub calls: AtomicU32,
    pub insert_calls: AtomicU32,
    pub save_calls: AtomicU32,
    pub delete_calls: AtomicU32,
}

impl MockBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存データ付きで作成
    pub fn with_books(books: Vec<Book>) -> Self {
        let repo = Self::new();
        {
            let mut state = repo.state.lock().unwrap();
            for book in books {
                state.next_id = state.next_id.max(book.id);
                state.books.insert(book.id, book);
            }
        }
        repo
    }

    /// 常に失敗するモック
    pub fn failing() -> Self {
        let repo = Self::new();
        repo.fail_next(u32::MAX);
        repo
    }

    /// 次のn回の呼び出しを失敗させる
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().books.len()
    }

    fn check_failure(&self) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        if remaining != u32::MAX {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
        }
        Err(RepositoryError::Database("模擬的なストレージ障害".to_string()))
    }
}

#[async_trait]
impl BookRepository for MockBookRepository {
    async fn find_all(&self, page: u32, size: u32) -> Result<Page<Book>, RepositoryError> {
        self.check_failure()?;
        let state = self.state.lock().unwrap();
        let content = state
            .books
            .values()
            .skip((page as usize).saturating_mul(size as usize))
            .take(size as usize)
            .cloned()
            .collect();
        Ok(Page::new(content, page, size, state.books.len() as u64))
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, RepositoryError> {
        self.check_failure()?;
        Ok(self.state.lock().unwrap().books.get(&id).cloned())
    }

    async fn insert(&self, book: &NewBook) -> Result<Book, RepositoryError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let saved = Book::from_new(state.next_id, book.clone());
        state.books.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn save(&self, book: &Book) -> Result<Book, RepositoryError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.books.insert(book.id, book.clone());
        Ok(book.clone())
    }

    async fn delete_by_id(&self, id: BookId) -> Result<(), RepositoryError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.state.lock().unwrap().books.remove(&id);
        Ok(())
    }

    async fn find_by_title(&self, keyword: &str) -> Result<Vec<Book>, RepositoryError> {
        self.check_failure()?;
        let keyword = keyword.to_lowercase();
        let state = self.state.lock().unwrap();
        Ok(state
            .books
            .values()
            .filter(|b| b.title.to_lowercase().contains(&keyword))
            .cloned()
            .collect())
    }

    async fn find_by_description(
        &self,
        description: &str,
    ) -> Result<Vec<Book>, RepositoryError> {
        self.check_failure()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .books
            .values()
            .filter(|b| b.description.as_deref() == Some(description))
            .cloned()
            .collect())
    }
}
