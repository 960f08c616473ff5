//! 書籍エンティティ
//!
//! `books`テーブルの1行に対応するインメモリ表現。
//! 永続化済みの`Book`と、ID未採番の`NewBook`を型で区別する。

use serde::{Deserialize, Serialize};

/// 書籍IDの型（SQLiteのINTEGER PRIMARY KEY）
pub type BookId = i64;

/// タイトル・説明の最大文字数
pub const MAX_FIELD_LENGTH: usize = 100;

/// 永続化済みの書籍
///
/// `id`はストレージが採番し、以後変更されない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    /// 書籍ID（ストレージが採番）
    pub id: BookId,
    /// タイトル（必須）
    pub title: String,
    /// 説明（任意）
    pub description: Option<String>,
}

/// 未保存の書籍（ID未採番）
///
/// 作成リクエストと更新内容の両方に使用する。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub description: Option<String>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
        }
    }
}

impl Book {
    /// 採番済みIDを付与して永続化済みの書籍にする
    pub fn from_new(id: BookId, book: NewBook) -> Self {
        Self {
            id,
            title: book.title,
            description: book.description,
        }
    }

    /// 更新内容を既存レコードに適用する（IDは保持）
    pub fn apply(&mut self, changes: NewBook) {
        self.title = changes.title;
        self.description = changes.description;
    }
}

/// ページ単位の検索結果
///
/// `content`は`size`件以下、`total_elements`は全件数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// 当該ページの要素
    pub content: Vec<T>,
    /// ページ番号（0始まり）
    pub number: u32,
    /// ページサイズ（要求値）
    pub size: u32,
    /// 全件数
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, number: u32, size: u32, total_elements: u64) -> Self {
        Self {
            content,
            number,
            size,
            total_elements,
        }
    }

    /// 空ページ（要求されたページ番号・サイズは保持）
    pub fn empty(number: u32, size: u32) -> Self {
        Self::new(Vec::new(), number, size, 0)
    }

    /// 総ページ数
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 1;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    /// 要素を変換した新しいページを返す
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_id() {
        let mut book = Book {
            id: 7,
            title: "Book A".to_string(),
            description: Some("Desc A".to_string()),
        };

        book.apply(NewBook::new("Updated", None));

        assert_eq!(book.id, 7);
        assert_eq!(book.title, "Updated");
        assert_eq!(book.description, None);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<Book> = Page::new(vec![], 0, 10, 21);
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_total_pages_exact_multiple() {
        let page: Page<Book> = Page::new(vec![], 0, 10, 20);
        assert_eq!(page.total_pages(), 2);
    }

    #[test]
    fn test_empty_page_preserves_request() {
        let page: Page<Book> = Page::empty(3, 25);
        assert!(page.content.is_empty());
        assert_eq!(page.number, 3);
        assert_eq!(page.size, 25);
        assert_eq!(page.total_elements, 0);
        assert_eq!(page.total_pages(), 0);
    }

    #[test]
    fn test_map_preserves_metadata() {
        let page = Page::new(vec![1, 2], 1, 2, 5);
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.content, vec![10, 20]);
        assert_eq!(mapped.number, 1);
        assert_eq!(mapped.size, 2);
        assert_eq!(mapped.total_elements, 5);
        assert_eq!(mapped.total_pages(), 3);
    }
}
