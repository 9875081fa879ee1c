use crate::domain::port::LogLevel;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// ログエントリ
/// 構造化ログの基本構造を定義
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub correlation_id: Option<Uuid>,
    pub component: String,
    pub execution_time: Option<Duration>,
    pub additional_context: HashMap<String, String>,
}

impl LogEntry {
    /// 新しいログエントリを作成
    pub fn new(level: LogLevel, message: String, component: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message,
            correlation_id: None,
            component,
            execution_time: None,
            additional_context: HashMap::new(),
        }
    }

    /// 相関IDを設定
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// 実行時間を設定
    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = Some(execution_time);
        self
    }

    /// 追加コンテキストを設定
    pub fn with_context(mut self, key: String, value: String) -> Self {
        self.additional_context.insert(key, value);
        self
    }

    /// ログエントリを文字列として出力
    pub fn format(&self) -> String {
        let level_str = match self.level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };

        let mut parts = vec![
            format!("[{}]", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("[{}]", level_str),
            format!("[{}]", self.component),
        ];

        if let Some(correlation_id) = self.correlation_id {
            parts.push(format!("[correlation_id: {}]", correlation_id));
        }

        if let Some(execution_time) = self.execution_time {
            parts.push(format!("[execution_time: {:?}]", execution_time));
        }

        parts.push(self.message.clone());

        if !self.additional_context.is_empty() {
            let context_str = self
                .additional_context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("[{}]", context_str));
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_contains_level_and_component() {
        let entry = LogEntry::new(
            LogLevel::Info,
            "stock applied".to_string(),
            "StockMutationService".to_string(),
        );
        let formatted = entry.format();
        assert!(formatted.contains("[INFO]"));
        assert!(formatted.contains("[StockMutationService]"));
        assert!(formatted.contains("stock applied"));
    }

    #[test]
    fn test_format_contains_correlation_id() {
        let correlation_id = Uuid::new_v4();
        let entry = LogEntry::new(
            LogLevel::Debug,
            "message".to_string(),
            "Component".to_string(),
        )
        .with_correlation_id(correlation_id);
        assert!(entry.format().contains(&correlation_id.to_string()));
    }

    #[test]
    fn test_format_contains_context() {
        let entry = LogEntry::new(
            LogLevel::Warning,
            "message".to_string(),
            "Component".to_string(),
        )
        .with_context("order_id".to_string(), "abc".to_string());
        assert!(entry.format().contains("order_id=abc"));
    }
}
