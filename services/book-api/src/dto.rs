//! HTTP APIのリクエスト/レスポンス形式
//!
//! すべてのレスポンスは`{success, message, data}`のエンベロープで包む。

use serde::{Deserialize, Serialize};

use crate::model::MAX_FIELD_LENGTH;

/// レスポンスエンベロープ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResponse<T> {
    /// 成功したか
    pub success: bool,
    /// 結果メッセージ
    pub message: String,
    /// 結果データ（失敗時や削除時はnull）
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 成功レスポンス
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// データなしの成功レスポンス
    pub fn success_without_data(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// 失敗レスポンス
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// 書籍の作成・更新リクエスト
///
/// `title`が欠けている場合は空文字列として受け取り、検証で拒否する。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl BookRequest {
    /// 入力を検証する
    ///
    /// # Returns
    /// * `Ok(())` - 検証成功
    /// * `Err(Vec<String>)` - フィールドごとの違反メッセージ
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        if self.title.trim().is_empty() {
            violations.push("title: must not be blank".to_string());
        } else if self.title.chars().count() > MAX_FIELD_LENGTH {
            violations.push(format!(
                "title: size must be at most {} characters",
                MAX_FIELD_LENGTH
            ));
        }

        if let Some(description) = &self.description
            && description.chars().count() > MAX_FIELD_LENGTH
        {
            violations.push(format!(
                "description: size must be at most {} characters",
                MAX_FIELD_LENGTH
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// 書籍レスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
}

/// ページレスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    /// 当該ページの要素
    pub content: Vec<T>,
    /// 全件数
    pub total_elements: u64,
    /// 総ページ数
    pub total_pages: u64,
    /// ページ番号（0始まり）
    pub number: u32,
    /// ページサイズ
    pub size: u32,
}

/// 一覧取得のクエリパラメータ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    10
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_page_size(),
        }
    }
}

/// 検索のクエリパラメータ
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SearchParams {
    /// タイトルの部分一致キーワード
    pub title: Option<String>,
    /// 説明の完全一致
    pub description: Option<String>,
}
