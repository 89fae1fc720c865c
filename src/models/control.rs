//! 下载按钮定位规则
//!
//! 按固定优先级依次尝试，第一个有匹配的规则胜出，取其第一个匹配元素

use std::fmt;

use serde::Deserialize;
use serde_json::json;

/// 写在被选中元素上的标记属性
pub const CONTROL_MARKER_ATTR: &str = "data-pdf-control";

/// 页面上可点击的"下载"控件的定位规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPattern {
    /// 可见文本包含指定字符串（区分大小写）
    TextContains(&'static str),
    /// 链接 href 包含指定字符串（不区分大小写）
    HrefContains(&'static str),
}

/// 定位规则优先级列表
pub const DOWNLOAD_CONTROL_PATTERNS: [ControlPattern; 5] = [
    ControlPattern::TextContains("Download PDF"),
    ControlPattern::TextContains("PDF"),
    ControlPattern::TextContains("Disclosure"),
    ControlPattern::TextContains("Download"),
    ControlPattern::HrefContains("pdf"),
];

const CLICKABLE_SELECTOR: &str =
    "a, button, [role='button'], input[type='button'], input[type='submit']";

impl ControlPattern {
    /// 生成定位脚本
    ///
    /// 脚本在页面中查找所有匹配元素，给第一个打上 `marker` 标记，
    /// 返回 `{ count, text }`；没有匹配时 count 为 0
    pub fn locate_script(&self, marker: &str) -> String {
        let (selector, predicate, needle) = match self {
            ControlPattern::TextContains(text) => (
                CLICKABLE_SELECTOR,
                "(el.innerText || el.value || el.textContent || '').includes(needle)",
                *text,
            ),
            ControlPattern::HrefContains(fragment) => (
                "a[href]",
                "(el.getAttribute('href') || '').toLowerCase().includes(needle.toLowerCase())",
                *fragment,
            ),
        };

        format!(
            r#"
            (() => {{
                const needle = {needle};
                const matches = Array.from(document.querySelectorAll({selector}))
                    .filter(el => {predicate});
                if (matches.length === 0) {{
                    return {{ count: 0, text: '' }};
                }}
                const target = matches[0];
                target.setAttribute({attr}, {marker});
                const label = (target.innerText || target.value || target.getAttribute('href') || '').trim();
                return {{ count: matches.length, text: label.slice(0, 120) }};
            }})()
            "#,
            needle = json!(needle),
            selector = json!(selector),
            predicate = predicate,
            attr = json!(CONTROL_MARKER_ATTR),
            marker = json!(marker),
        )
    }

    /// 选中元素的 CSS 选择器
    pub fn marker_selector(marker: &str) -> String {
        format!("[{}=\"{}\"]", CONTROL_MARKER_ATTR, marker)
    }
}

impl fmt::Display for ControlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlPattern::TextContains(text) => write!(f, "文本包含 \"{}\"", text),
            ControlPattern::HrefContains(fragment) => write!(f, "链接包含 \"{}\"", fragment),
        }
    }
}

/// 定位脚本的返回值
#[derive(Debug, Clone, Deserialize)]
pub struct LocatedControl {
    pub count: usize,
    #[serde(default)]
    pub text: String,
}

impl LocatedControl {
    /// 有匹配时转换为 [`FoundControl`]
    pub fn into_found(self, pattern: ControlPattern, marker: String) -> Option<FoundControl> {
        (self.count > 0).then(|| FoundControl {
            pattern,
            marker,
            match_count: self.count,
            text: self.text,
        })
    }
}

/// 已定位的下载控件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundControl {
    pub pattern: ControlPattern,
    /// 标记值，用于再次选中该元素
    pub marker: String,
    pub match_count: usize,
    pub text: String,
}

impl FoundControl {
    pub fn selector(&self) -> String {
        ControlPattern::marker_selector(&self.marker)
    }
}
