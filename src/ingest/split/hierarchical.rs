//! Title-tree splitting for documents with chapter structure.

use super::super::chunk::{ChunkMetadata, SplitConfig, TextChunk};
use super::super::error::ProcessingError;
use super::{CJK_CHAPTER, MD_HEADER, PARAGRAPH_BREAK, Splitter, clean_text, make_chunk};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

static NUM_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.\s+").expect("numeric title regex"));
static SUB_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\s+").expect("sub-title regex"));

/// Look-ahead for a natural break when subdividing long section content.
const LONG_CONTENT_LOOKAHEAD: usize = 100;

/// Title tree kept in an arena; children refer to their nodes by index.
struct Tree {
    nodes: Vec<Node>,
}

struct Node {
    title: Option<String>,
    content: String,
    level: u8,
    children: Vec<usize>,
}

impl Tree {
    fn build(text: &str) -> Self {
        let mut nodes = vec![Node {
            title: None,
            content: String::new(),
            level: 0,
            children: Vec::new(),
        }];
        // Chain of open sections, root first.
        let mut stack: Vec<usize> = vec![0];

        for paragraph in PARAGRAPH_BREAK.split(text) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            let level = detect_header_level(paragraph);
            if level > 0 {
                let mut lines = paragraph.lines();
                let title = lines.next().unwrap_or("").trim().to_string();
                let content = lines.collect::<Vec<_>>().join("\n").trim().to_string();

                while stack.len() > 1 && nodes[*stack.last().unwrap()].level >= level {
                    stack.pop();
                }

                let id = nodes.len();
                nodes.push(Node {
                    title: Some(title),
                    content,
                    level,
                    children: Vec::new(),
                });
                let parent = *stack.last().unwrap();
                nodes[parent].children.push(id);
                stack.push(id);
            } else {
                let current = &mut nodes[*stack.last().unwrap()];
                if current.content.is_empty() {
                    current.content = paragraph.to_string();
                } else {
                    current.content.push_str("\n\n");
                    current.content.push_str(paragraph);
                }
            }
        }

        Self { nodes }
    }
}

fn detect_header_level(paragraph: &str) -> u8 {
    let first_line = paragraph.lines().next().unwrap_or("").trim();

    if let Some(caps) = MD_HEADER.captures(first_line) {
        return caps[1].len() as u8;
    }
    let short = first_line.chars().count() < 100;
    if short && SUB_TITLE.is_match(first_line) {
        return 2;
    }
    if short && NUM_TITLE.is_match(first_line) {
        return 1;
    }
    if CJK_CHAPTER.is_match(first_line) {
        return 1;
    }
    0
}

/// Builds an in-memory title tree (markdown, numeric, and CJK chapter
/// markers) and emits one chunk per leaf-with-content, recursively
/// subdividing any content longer than `chunk_size`.
pub struct HierarchicalSplitter {
    config: SplitConfig,
}

impl HierarchicalSplitter {
    /// A hierarchical splitter over `config`.
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    fn split_long_content(&self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        let total = chars.len();
        if total <= self.config.chunk_size {
            return vec![content.to_string()];
        }

        let mut parts = Vec::new();
        let mut start = 0usize;
        while start < total {
            // Unclamped nominal end keeps the overlap advance moving on the
            // last window.
            let mut end = start + self.config.chunk_size;
            if end < total {
                let lookahead = LONG_CONTENT_LOOKAHEAD.min(total - end);
                for offset in 0..lookahead {
                    if matches!(chars[end + offset], '.' | '。' | '\n') {
                        end = end + offset + 1;
                        break;
                    }
                }
            }

            let part: String = chars[start..end.min(total)].iter().collect();
            let part = part.trim().to_string();
            if !part.is_empty() {
                parts.push(part);
            }
            start = (end.saturating_sub(self.config.chunk_overlap)).max(start + 1);
        }
        parts
    }

    fn emit_node(
        &self,
        tree: &Tree,
        node_id: usize,
        path: &[String],
        document_id: Uuid,
        chunks: &mut Vec<TextChunk>,
    ) -> Result<(), ProcessingError> {
        let node = &tree.nodes[node_id];

        let content = node.content.trim();
        if !content.is_empty() && content.chars().count() >= self.config.min_chunk_size {
            let parts = if content.chars().count() > self.config.chunk_size {
                self.split_long_content(content)
            } else {
                vec![content.to_string()]
            };
            let total_parts = parts.len();

            for (part_idx, part) in parts.into_iter().enumerate() {
                if part.chars().count() < self.config.min_chunk_size && total_parts > 1 {
                    continue;
                }

                let mut metadata =
                    ChunkMetadata::for_strategy("HierarchicalSplitter", "hierarchical", 0);
                metadata.hierarchy_path = Some(path.to_vec());
                metadata.level = Some(node.level);
                metadata.section_title = node.title.clone();
                if total_parts > 1 {
                    metadata.extra.insert(
                        "sub_chunk_index".to_string(),
                        serde_json::Value::from(part_idx),
                    );
                    metadata.extra.insert(
                        "total_sub_chunks".to_string(),
                        serde_json::Value::from(total_parts),
                    );
                }

                let index = chunks.len();
                chunks.push(make_chunk(&self.config, &part, document_id, index, metadata)?);
            }
        }

        for &child_id in &node.children {
            let child = &tree.nodes[child_id];
            let mut child_path = path.to_vec();
            child_path.push(
                child
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("Section_{}", path.len())),
            );
            self.emit_node(tree, child_id, &child_path, document_id, chunks)?;
        }
        Ok(())
    }
}

impl Splitter for HierarchicalSplitter {
    fn split(&self, text: &str, document_id: Uuid) -> Result<Vec<TextChunk>, ProcessingError> {
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyText);
        }

        let text = clean_text(text);
        let tree = Tree::build(&text);

        let mut chunks = Vec::new();
        self.emit_node(&tree, 0, &[], document_id, &mut chunks)?;
        Ok(chunks)
    }
}
