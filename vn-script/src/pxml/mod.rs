//! # PXml 模块
//!
//! 对话文本内嵌标记迷你语言的解析。
//!
//! ## 设计原则
//!
//! - 独立于主语法：输入是一个字符串标量，由对话内建消费
//! - **宽容解析**：永不失败。畸形标签按字面文本处理，
//!   未知标签透明展开（丢弃标签、保留内部文本）
//! - 树形结构，子节点独占持有，与主语法树同一纪律
//!
//! ## 支持的元素
//!
//! `font`（size/incolor/outcolor）、`span`（size）、`ruby`（text）、
//! `i`、`br`、`voice`（name/src/mode）、`halt`、`pre`（禁止自动换行）。
//! 标签名与属性名不区分大小写；`voice`/`halt`/`pre`/`br` 是空元素。

pub mod flatten;

use serde::{Deserialize, Serialize};

pub use flatten::{
    MarkerKind, MarkerSegment, TextBuffer, TextBufferSegment, TextRun, TextSegment, VoiceSegment,
};

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    /// 解析颜色：`#RRGGBB`、`RRGGBB` 或颜色名
    pub fn parse(text: &str) -> Option<Color> {
        let text = text.trim();
        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color { r, g, b });
        }
        match text.to_ascii_lowercase().as_str() {
            "black" => Some(Color::BLACK),
            "white" => Some(Color::WHITE),
            "red" => Some(Color { r: 255, g: 0, b: 0 }),
            "green" => Some(Color { r: 0, g: 128, b: 0 }),
            "blue" => Some(Color { r: 0, g: 0, b: 255 }),
            _ => None,
        }
    }
}

/// 语音动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceAction {
    /// 播放（默认）
    #[default]
    Play,
    /// 停止
    Stop,
}

/// PXml 节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PXmlNode {
    /// 子节点序列（根节点即一个 Content）
    Content(Vec<PXmlNode>),
    /// 纯文本
    Text(String),
    /// 字体覆盖
    Font(FontElement),
    /// 字号覆盖
    Span(SpanElement),
    /// 注音
    Ruby(RubyElement),
    /// 斜体
    Italic(ItalicElement),
    /// 换行
    Linebreak,
    /// 语音提示
    Voice(VoiceElement),
    /// 停顿标记
    Halt,
    /// 禁止自动换行标记
    NoLinebreaks,
}

/// `<font>` 元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontElement {
    pub size: Option<u32>,
    pub color: Option<Color>,
    pub outline_color: Option<Color>,
    pub content: Vec<PXmlNode>,
}

/// `<span>` 元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanElement {
    pub size: Option<u32>,
    pub content: Vec<PXmlNode>,
}

/// `<ruby>` 元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubyElement {
    /// 注音文本
    pub ruby_text: String,
    /// 被注音的基文本
    pub base: Vec<PXmlNode>,
}

/// `<i>` 元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItalicElement {
    pub content: Vec<PXmlNode>,
}

/// `<voice>` 元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceElement {
    /// 角色名
    pub character_name: String,
    /// 语音文件名
    pub file_name: String,
    pub action: VoiceAction,
}

/// 解析 PXml 字符串，返回 Content 根节点
pub fn parse_pxml(text: &str) -> PXmlNode {
    let mut scanner = Scanner { text, pos: 0 };
    PXmlNode::Content(scanner.parse_content(None))
}

/// 标签扫描结果
enum Tag {
    /// 开始标签（含自闭合）
    Open {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    /// 结束标签
    Close(String),
    /// 不是合法标签，`<` 按字面处理
    NotATag,
}

/// 手写标签扫描器
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl Scanner<'_> {
    /// 解析子节点序列，直到匹配的结束标签或文本结束
    fn parse_content(&mut self, closing: Option<&str>) -> Vec<PXmlNode> {
        let mut children = Vec::new();
        let mut text_buf = String::new();

        loop {
            let Some(c) = self.peek() else {
                // 结束标签缺失：宽容收尾
                flush_text(&mut text_buf, &mut children);
                return children;
            };

            if c != '<' {
                text_buf.push(c);
                self.pos += c.len_utf8();
                continue;
            }

            match self.scan_tag() {
                Tag::NotATag => {
                    text_buf.push('<');
                    self.pos += 1;
                }
                Tag::Close(name) => {
                    if closing.is_some_and(|c| c.eq_ignore_ascii_case(&name)) {
                        flush_text(&mut text_buf, &mut children);
                        return children;
                    }
                    // 不匹配的结束标签：忽略
                }
                Tag::Open {
                    name,
                    attributes,
                    self_closing,
                } => {
                    flush_text(&mut text_buf, &mut children);
                    self.parse_element(&name, &attributes, self_closing, &mut children);
                }
            }
        }
    }

    /// 根据标签名构造元素节点
    fn parse_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
        self_closing: bool,
        children: &mut Vec<PXmlNode>,
    ) {
        fn attr<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
            attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
        }
        let content = |scanner: &mut Self| -> Vec<PXmlNode> {
            if self_closing {
                Vec::new()
            } else {
                scanner.parse_content(Some(name))
            }
        };

        match name.to_ascii_lowercase().as_str() {
            "font" => {
                let element = FontElement {
                    size: attr(attributes, "size").and_then(|v| v.parse().ok()),
                    color: attr(attributes, "incolor").and_then(Color::parse),
                    outline_color: attr(attributes, "outcolor").and_then(Color::parse),
                    content: content(self),
                };
                children.push(PXmlNode::Font(element));
            }
            "span" => {
                let element = SpanElement {
                    size: attr(attributes, "size").and_then(|v| v.parse().ok()),
                    content: content(self),
                };
                children.push(PXmlNode::Span(element));
            }
            "ruby" => {
                let element = RubyElement {
                    ruby_text: attr(attributes, "text").unwrap_or_default().to_string(),
                    base: content(self),
                };
                children.push(PXmlNode::Ruby(element));
            }
            "i" | "italic" => {
                children.push(PXmlNode::Italic(ItalicElement {
                    content: content(self),
                }));
            }
            // 空元素：无论是否写成自闭合都不收集内容
            "br" => children.push(PXmlNode::Linebreak),
            "halt" => children.push(PXmlNode::Halt),
            "pre" => children.push(PXmlNode::NoLinebreaks),
            "voice" => {
                let action = match attr(attributes, "mode") {
                    Some(mode) if mode.eq_ignore_ascii_case("off")
                        || mode.eq_ignore_ascii_case("stop") =>
                    {
                        VoiceAction::Stop
                    }
                    _ => VoiceAction::Play,
                };
                children.push(PXmlNode::Voice(VoiceElement {
                    character_name: attr(attributes, "name").unwrap_or_default().to_string(),
                    file_name: attr(attributes, "src").unwrap_or_default().to_string(),
                    action,
                }));
            }
            // 未知标签：透明展开，保留内部内容
            _ => {
                children.extend(content(self));
            }
        }
    }

    /// 在 `<` 处扫描一个标签；不合法时不消费任何输入
    fn scan_tag(&mut self) -> Tag {
        let rest = &self.text[self.pos..];
        let Some(end) = rest.find('>') else {
            return Tag::NotATag;
        };
        let inner = &rest[1..end];
        if inner.is_empty() {
            return Tag::NotATag;
        }

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Tag::NotATag;
            }
            self.pos += end + 1;
            return Tag::Close(name.to_string());
        }

        let (inner, self_closing) = match inner.strip_suffix('/') {
            Some(stripped) => (stripped, true),
            None => (inner, false),
        };

        let mut chars = inner.char_indices().peekable();
        let mut name_end = 0;
        for (offset, c) in chars.by_ref() {
            if c.is_ascii_alphanumeric() {
                name_end = offset + c.len_utf8();
            } else {
                break;
            }
        }
        if name_end == 0 {
            return Tag::NotATag;
        }
        let name = inner[..name_end].to_string();
        let attributes = parse_attributes(&inner[name_end..]);

        self.pos += end + 1;
        Tag::Open {
            name,
            attributes,
            self_closing,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }
}

fn flush_text(text_buf: &mut String, children: &mut Vec<PXmlNode>) {
    if !text_buf.is_empty() {
        children.push(PXmlNode::Text(std::mem::take(text_buf)));
    }
}

/// 解析属性串：`name=value`，值可加单/双引号，也可不加
fn parse_attributes(text: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        // 跳过空白
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        // 属性名
        let name_start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        if pos == name_start {
            break;
        }
        let name = text[name_start..pos].to_string();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            // 无值属性
            attributes.push((name, String::new()));
            continue;
        }
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        // 属性值
        let value = if pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
            let quote = bytes[pos];
            pos += 1;
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != quote {
                pos += 1;
            }
            let value = text[value_start..pos].to_string();
            if pos < bytes.len() {
                pos += 1;
            }
            value
        } else {
            let value_start = pos;
            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            text[value_start..pos].to_string()
        };
        attributes.push((name, value));
    }
    attributes
}
