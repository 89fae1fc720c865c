//! JS 执行器 - 基础设施层
//!
//! 持有会话的 page 资源，只暴露"执行 JS"和"按选择器取元素"的能力

use chromiumoxide::{Element, Page};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::BrowserError;

/// JS 执行器
///
/// 职责：
/// - 持有会话唯一的 Page
/// - 暴露 eval() 能力
/// - 不认识 Job / 下载记录
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, BrowserError> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    pub async fn find_element(&self, selector: &str) -> Result<Element, BrowserError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::Element(format!("找不到元素 {}: {}", selector, e)))
    }
}
