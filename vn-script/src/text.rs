//! # 源文本模块
//!
//! 定义编译单元的源文本缓冲。
//!
//! ## 设计原则
//!
//! - 源文本**不可变**，由单个编译独占
//! - 所有位置信息都是指向该缓冲的 `TextRange` 偏移
//! - 行号/列号按需从偏移计算（1 开始），仅用于面向用户的报告

use text_size::{TextRange, TextSize};

/// 源文本
///
/// 不可变的字符缓冲，附带预计算的行起始偏移表。
/// 词法器、解析器和诊断共享同一个 `SourceText`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    text: String,
    /// 每一行的起始偏移（第一项恒为 0）
    line_starts: Vec<TextSize>,
}

impl SourceText {
    /// 从字符串创建源文本
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![TextSize::new(0)];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(TextSize::new(offset as u32 + 1));
            }
        }
        Self { text, line_starts }
    }

    /// 获取完整文本
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 文本长度（字节）
    pub fn len(&self) -> TextSize {
        TextSize::new(self.text.len() as u32)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// 覆盖整个文本的范围
    pub fn full_span(&self) -> TextRange {
        TextRange::new(TextSize::new(0), self.len())
    }

    /// 截取范围内的文本
    pub fn slice(&self, span: TextRange) -> &str {
        &self.text[std::ops::Range::<usize>::from(span)]
    }

    /// 偏移所在的行索引（从 0 开始）
    pub fn line_index(&self, offset: TextSize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// 偏移对应的 (行, 列)（均从 1 开始，列按字节计）
    pub fn line_col(&self, offset: TextSize) -> (usize, usize) {
        let line = self.line_index(offset);
        let col = u32::from(offset) - u32::from(self.line_starts[line]);
        (line + 1, col as usize + 1)
    }
}
