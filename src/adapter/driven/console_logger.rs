use crate::domain::logging::LogEntry;
use crate::domain::port::{LogLevel, Logger};
use std::collections::HashMap;
use uuid::Uuid;

/// コンソールログ実装
/// 標準出力・標準エラー出力にログを出力する
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }

    fn log(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        let mut entry = LogEntry::new(level, message.to_string(), component.to_string());
        if let Some(correlation_id) = correlation_id {
            entry = entry.with_correlation_id(correlation_id);
        }
        if let Some(context) = context {
            for (key, value) in context {
                entry = entry.with_context(key, value);
            }
        }

        let formatted = entry.format();
        match level {
            LogLevel::Error => eprintln!("{}", formatted),
            _ => println!("{}", formatted),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for ConsoleLogger {
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.log(LogLevel::Debug, component, message, correlation_id, context);
    }

    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.log(LogLevel::Info, component, message, correlation_id, context);
    }

    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.log(
            LogLevel::Warning,
            component,
            message,
            correlation_id,
            context,
        );
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.log(LogLevel::Error, component, message, correlation_id, context);
    }
}
