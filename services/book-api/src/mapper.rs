//! リクエスト/レスポンスとエンティティの相互変換
//!
//! 検証は境界（ハンドラー）で済ませてから呼ぶ。

use crate::dto::{BookRequest, BookResponse, PageResponse};
use crate::model::{Book, NewBook, Page};

/// リクエストを未保存の書籍に変換
pub fn to_entity(request: BookRequest) -> NewBook {
    NewBook {
        title: request.title,
        description: request.description,
    }
}

/// 書籍をレスポンスに変換
pub fn to_response(book: Book) -> BookResponse {
    BookResponse {
        id: book.id,
        title: book.title,
        description: book.description,
    }
}

/// 書籍ページをレスポンスに変換
pub fn to_page_response(page: Page<Book>) -> PageResponse<BookResponse> {
    let total_pages = page.total_pages();
    let page = page.map(to_response);

    PageResponse {
        content: page.content,
        total_elements: page.total_elements,
        total_pages,
        number: page.number,
        size: page.size,
    }
}
