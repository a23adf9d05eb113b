//! # 文本平铺模块
//!
//! 把 PXml 树降级为有序的呈现段序列。
//!
//! ## 设计说明
//!
//! - 单次深度优先遍历，环境“当前文本行样式”在每次进入元素时
//!   保存、覆盖，退出时恢复（显式栈纪律，不用全局可变状态）
//! - 文本行在遇到纯文本、注音基文本结束、或任何非文本元素时定稿
//! - `voice`/`halt`/`pre` 会关闭当前文本段，追加各自的段；
//!   其后的文本懒式开启新的文本段
//! - **停顿恒分段**：`halt` 总是强制段边界，任何文本行都不会跨越它；
//!   `<br>` 则作为行内 `"\n"` 字符留在段内
//! - 输出顺序有意义：标记段是位置敏感的，消费方必须按序处理

use serde::{Deserialize, Serialize};

use crate::pxml::{parse_pxml, Color, PXmlNode, VoiceAction};

/// 文本行：一段样式一致的文字
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// 注音文本（有注音的行整体被注音）
    pub ruby_text: Option<String>,
    /// 字号覆盖（pt；None 表示用默认配置）
    pub font_size: Option<u32>,
    pub color: Option<Color>,
    pub outline_color: Option<Color>,
    pub italic: bool,
}

/// 文本段：有序的文本行列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub runs: Vec<TextRun>,
}

/// 语音段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSegment {
    pub character_name: String,
    pub file_name: String,
    pub action: VoiceAction,
}

/// 标记类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    /// 停顿（等待用户确认后再继续呈现）
    Halt,
    /// 禁止自动换行
    NoLinebreaks,
}

/// 标记段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSegment {
    pub kind: MarkerKind,
}

/// 平铺输出的段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextBufferSegment {
    Text(TextSegment),
    Voice(VoiceSegment),
    Marker(MarkerSegment),
}

/// 一个对话块平铺后的全部输出
///
/// 构造后不可变，由渲染协作方按段顺序消费。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextBuffer {
    pub segments: Vec<TextBufferSegment>,
    /// 块内最后出现的语音（便于宿主直接取对白配音）
    pub voice: Option<VoiceSegment>,
}

impl TextBuffer {
    /// 解析 PXml 字符串并平铺
    pub fn from_pxml(pxml: &str) -> TextBuffer {
        Self::from_tree(&parse_pxml(pxml))
    }

    /// 平铺已解析的 PXml 树
    pub fn from_tree(root: &PXmlNode) -> TextBuffer {
        let mut flattener = Flattener::default();
        flattener.visit(root);
        flattener.finish()
    }

    /// 是否没有任何段
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 全部文本行的字符总数
    pub fn text_len(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                TextBufferSegment::Text(text) => Some(text),
                _ => None,
            })
            .flat_map(|text| &text.runs)
            .map(|run| run.text.chars().count())
            .sum()
    }

    /// 拼接出的纯文本（测试与日志用）
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            if let TextBufferSegment::Text(text) = segment {
                for run in &text.runs {
                    out.push_str(&run.text);
                }
            }
        }
        out
    }
}

/// 环境文本行样式
///
/// 元素进入时整体保存、退出时整体恢复的快照。
#[derive(Debug, Clone, Default)]
struct RunStyle {
    text: Option<String>,
    ruby_text: Option<String>,
    font_size: Option<u32>,
    color: Option<Color>,
    outline_color: Option<Color>,
    italic: bool,
}

/// 平铺器
#[derive(Default)]
struct Flattener {
    segments: Vec<TextBufferSegment>,
    runs: Vec<TextRun>,
    style: RunStyle,
    voice: Option<VoiceSegment>,
}

impl Flattener {
    fn visit(&mut self, node: &PXmlNode) {
        match node {
            PXmlNode::Content(children) => {
                for child in children {
                    self.visit(child);
                    self.finalize_run();
                }
            }

            PXmlNode::Text(text) => {
                if !text.is_empty() {
                    self.style.text = Some(text.clone());
                }
            }

            PXmlNode::Linebreak => {
                self.style.text = Some("\n".to_string());
            }

            PXmlNode::Font(font) => {
                let saved = self.style.clone();
                if font.size.is_some() {
                    self.style.font_size = font.size;
                }
                if font.color.is_some() {
                    self.style.color = font.color;
                }
                if font.outline_color.is_some() {
                    self.style.outline_color = font.outline_color;
                }
                self.visit_children(&font.content);
                self.style = saved;
            }

            PXmlNode::Span(span) => {
                let saved = self.style.clone();
                if span.size.is_some() {
                    self.style.font_size = span.size;
                }
                self.visit_children(&span.content);
                self.style = saved;
            }

            PXmlNode::Italic(italic) => {
                let saved = self.style.italic;
                self.style.italic = true;
                self.visit_children(&italic.content);
                self.style.italic = saved;
            }

            PXmlNode::Ruby(ruby) => {
                let saved = self.style.clone();
                self.style.ruby_text = Some(ruby.ruby_text.clone());
                self.visit_children(&ruby.base);
                self.style = saved;
            }

            PXmlNode::Voice(voice) => {
                self.finalize_segment();
                let segment = VoiceSegment {
                    character_name: voice.character_name.clone(),
                    file_name: voice.file_name.clone(),
                    action: voice.action,
                };
                self.voice = Some(segment.clone());
                self.segments.push(TextBufferSegment::Voice(segment));
            }

            PXmlNode::Halt => {
                self.finalize_segment();
                self.segments.push(TextBufferSegment::Marker(MarkerSegment {
                    kind: MarkerKind::Halt,
                }));
            }

            PXmlNode::NoLinebreaks => {
                self.finalize_segment();
                self.segments.push(TextBufferSegment::Marker(MarkerSegment {
                    kind: MarkerKind::NoLinebreaks,
                }));
            }
        }
    }

    fn visit_children(&mut self, children: &[PXmlNode]) {
        for child in children {
            self.visit(child);
            self.finalize_run();
        }
    }

    /// 把环境样式里挂起的文本定稿为一个文本行
    fn finalize_run(&mut self) {
        let Some(text) = self.style.text.take() else {
            return;
        };
        self.runs.push(TextRun {
            text,
            ruby_text: self.style.ruby_text.take(),
            font_size: self.style.font_size,
            color: self.style.color,
            outline_color: self.style.outline_color,
            italic: self.style.italic,
        });
    }

    /// 关闭当前文本段（若有内容），保证任何文本行不跨段
    fn finalize_segment(&mut self) {
        self.finalize_run();
        if !self.runs.is_empty() {
            self.segments.push(TextBufferSegment::Text(TextSegment {
                runs: std::mem::take(&mut self.runs),
            }));
        }
    }

    fn finish(mut self) -> TextBuffer {
        self.finalize_segment();
        TextBuffer {
            segments: self.segments,
            voice: self.voice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_segment(segment: &TextBufferSegment) -> &TextSegment {
        match segment {
            TextBufferSegment::Text(text) => text,
            other => panic!("期望文本段，实际是 {:?}", other),
        }
    }

    #[test]
    fn test_linebreak_stays_in_run() {
        // <br> 作为行内换行字符，不拆段
        let buffer = TextBuffer::from_pxml("<font size=24>Hi<br/>there</font>");
        assert_eq!(buffer.segments.len(), 1);

        let segment = text_segment(&buffer.segments[0]);
        assert_eq!(segment.runs.len(), 3);
        assert_eq!(segment.runs[0].text, "Hi");
        assert_eq!(segment.runs[1].text, "\n");
        assert_eq!(segment.runs[2].text, "there");
        // font 的覆盖对整个内容生效
        assert!(segment.runs.iter().all(|run| run.font_size == Some(24)));
    }

    #[test]
    fn test_halt_always_breaks_segment() {
        let buffer = TextBuffer::from_pxml("前半<halt/>后半");
        assert_eq!(buffer.segments.len(), 3);
        assert_eq!(text_segment(&buffer.segments[0]).runs[0].text, "前半");
        assert!(matches!(
            buffer.segments[1],
            TextBufferSegment::Marker(MarkerSegment {
                kind: MarkerKind::Halt
            })
        ));
        assert_eq!(text_segment(&buffer.segments[2]).runs[0].text, "后半");
    }

    #[test]
    fn test_halt_inside_styled_text_still_breaks() {
        // 任何文本行都不允许跨越 halt，即使在同一个 font 元素内
        let buffer = TextBuffer::from_pxml("<font size=20>甲<halt/>乙</font>");
        assert_eq!(buffer.segments.len(), 3);
        let first = text_segment(&buffer.segments[0]);
        let last = text_segment(&buffer.segments[2]);
        assert_eq!(first.runs.len(), 1);
        assert_eq!(last.runs.len(), 1);
        assert_eq!(first.runs[0].font_size, Some(20));
        assert_eq!(last.runs[0].font_size, Some(20));
    }

    #[test]
    fn test_style_restores_after_element_exit() {
        let buffer = TextBuffer::from_pxml("外1<font size=30 incolor=red>内</font>外2");
        let segment = text_segment(&buffer.segments[0]);
        assert_eq!(segment.runs.len(), 3);

        assert_eq!(segment.runs[0].font_size, None);
        assert_eq!(segment.runs[1].font_size, Some(30));
        assert_eq!(segment.runs[1].color, Some(Color { r: 255, g: 0, b: 0 }));
        // 退出元素后恢复环境样式
        assert_eq!(segment.runs[2].font_size, None);
        assert_eq!(segment.runs[2].color, None);
    }

    #[test]
    fn test_italic_nesting() {
        let buffer = TextBuffer::from_pxml("<i>斜<font size=18>嵌套</font></i>正");
        let segment = text_segment(&buffer.segments[0]);
        assert_eq!(segment.runs.len(), 3);
        assert!(segment.runs[0].italic);
        assert!(segment.runs[1].italic);
        assert_eq!(segment.runs[1].font_size, Some(18));
        assert!(!segment.runs[2].italic);
    }

    #[test]
    fn test_ruby_attaches_to_base_run() {
        let buffer = TextBuffer::from_pxml(r#"<ruby text="ほし">星</ruby>空"#);
        let segment = text_segment(&buffer.segments[0]);
        assert_eq!(segment.runs.len(), 2);
        assert_eq!(segment.runs[0].text, "星");
        assert_eq!(segment.runs[0].ruby_text.as_deref(), Some("ほし"));
        assert_eq!(segment.runs[1].text, "空");
        assert_eq!(segment.runs[1].ruby_text, None);
    }

    #[test]
    fn test_voice_closes_segment_and_is_exposed() {
        let buffer = TextBuffer::from_pxml(r#"开场<voice name="红" src="v001"/>台词"#);
        assert_eq!(buffer.segments.len(), 3);
        assert!(matches!(&buffer.segments[1], TextBufferSegment::Voice(_)));

        let voice = buffer.voice.as_ref().unwrap();
        assert_eq!(voice.character_name, "红");
        assert_eq!(voice.file_name, "v001");
        assert_eq!(voice.action, VoiceAction::Play);
    }

    #[test]
    fn test_no_linebreaks_marker_order_is_preserved() {
        let buffer = TextBuffer::from_pxml("<pre/>一<halt/>二");
        assert!(matches!(
            buffer.segments[0],
            TextBufferSegment::Marker(MarkerSegment {
                kind: MarkerKind::NoLinebreaks
            })
        ));
        assert!(matches!(&buffer.segments[1], TextBufferSegment::Text(_)));
        assert!(matches!(
            buffer.segments[2],
            TextBufferSegment::Marker(MarkerSegment {
                kind: MarkerKind::Halt
            })
        ));
        assert!(matches!(&buffer.segments[3], TextBufferSegment::Text(_)));
    }

    #[test]
    fn test_empty_input() {
        let buffer = TextBuffer::from_pxml("");
        assert!(buffer.is_empty());
        assert_eq!(buffer.text_len(), 0);
    }

    #[test]
    fn test_text_len_and_plain_text() {
        let buffer = TextBuffer::from_pxml("你好<br/>世界<halt/>完");
        assert_eq!(buffer.plain_text(), "你好\n世界完");
        assert_eq!(buffer.text_len(), 6);
    }
}
