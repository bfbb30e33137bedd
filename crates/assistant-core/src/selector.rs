//! Provider Selection
//!
//! Chooses which backend answers a request from the message content and the
//! requester's market. Chinese or Japanese script, or an APAC/China context,
//! goes to Kimi; everything else goes to Claude.

use crate::provider::ProviderId;
use crate::task::{Task, TaskSource};

/// Market keywords that route a request to Kimi when a context is present
const APAC_KEYWORDS: &[&str] = &[
    "china",
    "chinese",
    "mainland",
    "beijing",
    "shanghai",
    "shenzhen",
    "guangzhou",
    "hong kong",
    "taiwan",
    "apac",
    "asia pacific",
    "asia-pacific",
    "wechat",
    "alipay",
    "alibaba",
    "taobao",
    "tmall",
    "jd.com",
    "douyin",
    "weibo",
    "baidu",
    "rmb",
    "cny",
    "yuan",
];

const APAC_DEPARTMENTS: &[&str] = &["apac", "china", "asia"];

/// Optional request context consulted after the script check
#[derive(Clone, Debug, Default)]
pub struct SelectionContext {
    pub department: Option<String>,
    pub source: Option<TaskSource>,
}

impl From<&Task> for SelectionContext {
    fn from(task: &Task) -> Self {
        Self {
            department: task.department.clone(),
            source: Some(task.source),
        }
    }
}

/// CJK ideographs (incl. extension A and compatibility block), Hiragana, Katakana
const fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{309F}'
        | '\u{30A0}'..='\u{30FF}')
}

/// Whether the text contains any Chinese or Japanese script character
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Pick the provider for one top-level call
pub fn select_provider(message: &str, context: Option<&SelectionContext>) -> ProviderId {
    if contains_cjk(message) {
        return ProviderId::Kimi;
    }

    if let Some(ctx) = context {
        let lowered = message.to_lowercase();
        if APAC_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return ProviderId::Kimi;
        }
        let apac_department = ctx
            .department
            .as_deref()
            .is_some_and(|d| APAC_DEPARTMENTS.contains(&d.trim().to_lowercase().as_str()));
        if apac_department {
            return ProviderId::Kimi;
        }
    }

    ProviderId::Claude
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(department: &str) -> SelectionContext {
        SelectionContext {
            department: Some(department.into()),
            source: Some(TaskSource::Mobile),
        }
    }

    #[test]
    fn test_chinese_text_selects_kimi() {
        assert_eq!(select_provider("请生成报告", None), ProviderId::Kimi);
        assert_eq!(select_provider("Summarize 第三季度 numbers", None), ProviderId::Kimi);
    }

    #[test]
    fn test_japanese_kana_selects_kimi() {
        assert_eq!(select_provider("レポートを作成して", None), ProviderId::Kimi);
        assert_eq!(select_provider("ありがとう", None), ProviderId::Kimi);
    }

    #[test]
    fn test_english_defaults_to_claude() {
        assert_eq!(select_provider("Generate a report", None), ProviderId::Claude);
        assert_eq!(select_provider("Generate a report", Some(&ctx("finance"))), ProviderId::Claude);
    }

    #[test]
    fn test_apac_department_selects_kimi() {
        assert_eq!(select_provider("", Some(&ctx("apac"))), ProviderId::Kimi);
        assert_eq!(select_provider("Weekly numbers", Some(&ctx("China"))), ProviderId::Kimi);
    }

    #[test]
    fn test_market_keyword_requires_context() {
        assert_eq!(select_provider("Plan our WeChat campaign", None), ProviderId::Claude);
        assert_eq!(
            select_provider("Plan our WeChat campaign", Some(&ctx("marketing"))),
            ProviderId::Kimi
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let context = ctx("sales");
        let first = select_provider("Update the Shanghai pipeline", Some(&context));
        for _ in 0..10 {
            assert_eq!(select_provider("Update the Shanghai pipeline", Some(&context)), first);
        }
    }
}
