use super::super::chunk::SplitConfig;
use super::*;
use uuid::Uuid;

fn config() -> SplitConfig {
    SplitConfig::default()
}

fn small_config() -> SplitConfig {
    SplitConfig {
        chunk_size: 100,
        chunk_overlap: 20,
        min_chunk_size: 10,
        max_chunk_size: 200,
        ..SplitConfig::default()
    }
}

fn long_prose(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Sentence number {i} talks about a slightly different matter."))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn fixed_split_produces_dense_indices_and_positions() {
    let splitter = FixedSizeSplitter::new(small_config());
    let chunks = splitter.split(&long_prose(30), Uuid::new_v4()).unwrap();

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(!chunk.content.trim().is_empty());
        assert_eq!(chunk.metadata.split_method, "fixed_size");
        assert!(chunk.metadata.start_pos.is_some());
        assert!(chunk.metadata.end_pos.is_some());
        assert_eq!(chunk.metadata.length, chunk.char_len());
    }
}

#[test]
fn fixed_split_respects_size_and_lookahead_bounds() {
    let cfg = small_config();
    let splitter = FixedSizeSplitter::new(cfg.clone());
    let chunks = splitter.split(&long_prose(30), Uuid::new_v4()).unwrap();

    // A cut may advance past the nominal size only as far as the break
    // look-ahead reaches.
    for chunk in &chunks {
        assert!(chunk.char_len() <= cfg.chunk_size + 50);
    }
    // Consecutive windows overlap: the next start position sits before the
    // previous end position.
    for window in chunks.windows(2) {
        let prev_end = window[0].metadata.end_pos.unwrap();
        let next_start = window[1].metadata.start_pos.unwrap();
        assert!(next_start < prev_end);
    }
}

#[test]
fn structure_split_starts_new_chunks_at_headers() {
    let text = "# Introduction\n\nIntro paragraph with some words in it.\n\n\
                # Methods\n\nMethods paragraph describing the approach taken.\n\n\
                More methods discussion continues in this paragraph.";
    let splitter = StructureSplitter::new(config());
    let chunks = splitter.split(text, Uuid::new_v4()).unwrap();

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].content.contains("Introduction"));
    assert!(chunks[1].content.contains("Methods"));
    assert_eq!(chunks[0].metadata.has_header, Some(true));
    assert_eq!(chunks[0].metadata.header_level, Some(1));
    assert!(chunks[0].metadata.paragraphs.is_some());
}

#[test]
fn structure_split_flushes_on_size_with_overlap() {
    let mut cfg = small_config();
    cfg.chunk_overlap = 30;
    let paragraphs: Vec<String> = (0..6)
        .map(|i| format!("Paragraph {i} carries roughly sixty characters of content here."))
        .collect();
    let text = paragraphs.join("\n\n");

    let splitter = StructureSplitter::new(cfg);
    let chunks = splitter.split(&text, Uuid::new_v4()).unwrap();

    assert!(chunks.len() > 1);
    // Overlap carries the tail of the previous chunk forward.
    let first_tail: String = chunks[0].content.chars().rev().take(10).collect();
    let reversed_tail: String = first_tail.chars().rev().collect();
    assert!(chunks[1].content.contains(&reversed_tail));
}

#[test]
fn hierarchical_split_records_section_paths() {
    let body = "内容段落，关于本章的详细说明文字，足够长以满足最小块大小要求的文本内容。";
    let text = format!(
        "第一章 概述\n\n{body}\n\n第二章 设计\n\n{body}\n\n2.1 模块划分\n\n{body}"
    );

    let mut cfg = config();
    cfg.min_chunk_size = 10;
    let splitter = HierarchicalSplitter::new(cfg);
    let chunks = splitter.split(&text, Uuid::new_v4()).unwrap();

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].metadata.section_title.as_deref(), Some("第一章 概述"));
    assert_eq!(chunks[0].metadata.split_method, "hierarchical");
    assert_eq!(
        chunks[0].metadata.hierarchy_path.as_deref(),
        Some(["第一章 概述".to_string()].as_slice())
    );
    // The subsection nests under its chapter.
    let sub = &chunks[2];
    let path = sub.metadata.hierarchy_path.as_ref().unwrap();
    assert_eq!(path.len(), 2);
    assert!(path[1].contains("2.1"));
}

#[test]
fn semantic_split_breaks_on_discourse_markers() {
    let mut cfg = config();
    cfg.chunk_overlap = 0;
    let text = "The model performs well on the benchmark suite we chose. \
                It generalizes to unseen inputs with stable accuracy overall. \
                However the latency profile tells a different story entirely. \
                Inference cost grows quickly with longer input sequences here.";

    let splitter = SemanticSplitter::new(cfg);
    let chunks = splitter.split(text, Uuid::new_v4()).unwrap();

    assert_eq!(chunks.len(), 2);
    assert!(chunks[1].content.starts_with("However"));
    assert_eq!(chunks[0].metadata.sentence_count, Some(2));
    assert_eq!(chunks[1].metadata.semantic_group, Some(1));
}

#[test]
fn semantic_split_of_single_sentence_returns_one_chunk() {
    let splitter = SemanticSplitter::new(config());
    let chunks = splitter
        .split("Just one meaningful sentence lives here.", Uuid::new_v4())
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_index, 0);
}

#[test]
fn recursive_selects_by_document_shape() {
    let splitter = RecursiveSplitter::new(SplitConfig {
        semantic_split: true,
        ..config()
    });

    let chaptered = format!("第一章 绪论\n\n{}", "正文。".repeat(1200));
    assert_eq!(splitter.select_strategy(&chaptered), Strategy::Hierarchical);

    let headed = "# A\n\np1\n\np2\n\np3\n\np4\n\np5\n\np6";
    assert_eq!(splitter.select_strategy(headed), Strategy::Structure);

    let plain_long = long_prose(40);
    assert_eq!(splitter.select_strategy(&plain_long), Strategy::Semantic);

    assert_eq!(splitter.select_strategy("short plain text"), Strategy::Fixed);
}

#[test]
fn short_text_still_produces_exactly_one_chunk() {
    let splitter = RecursiveSplitter::new(config());
    let chunks = splitter.split("tiny", Uuid::new_v4()).unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].content, "tiny");
}

#[test]
fn oversized_chunks_are_resplit_with_parent_links() {
    let cfg = SplitConfig {
        chunk_size: 200,
        chunk_overlap: 20,
        min_chunk_size: 10,
        max_chunk_size: 250,
        ..SplitConfig::default()
    };
    let splitter = RecursiveSplitter::new(cfg);

    // Structure strategy keeps a single huge paragraph whole, pushing it
    // above max_chunk_size; post-processing re-splits it with the
    // fixed-size strategy.
    let huge_paragraph = long_prose(10).replace('\n', " ");
    let text = format!(
        "# Heading\n\n{huge_paragraph}\n\nshort one\n\nshort two\n\nshort three\n\nshort four\n\nshort five"
    );
    assert_eq!(splitter.select_strategy(&text), Strategy::Structure);

    let chunks = splitter.split(&text, Uuid::new_v4()).unwrap();

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.char_len() <= 250));
    let children: Vec<_> = chunks
        .iter()
        .filter(|c| c.metadata.parent_chunk_id.is_some())
        .collect();
    assert!(!children.is_empty());
    assert!(children.iter().all(|c| {
        c.metadata.extra.get("original_split_method")
            == Some(&serde_json::Value::String("structure".to_string()))
    }));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
    }
}

#[test]
fn undersized_chunks_merge_into_their_predecessor() {
    let mut cfg = config();
    cfg.chunk_size = 120;
    cfg.chunk_overlap = 0;
    cfg.min_chunk_size = 60;
    cfg.max_chunk_size = 400;
    let splitter = RecursiveSplitter::new(cfg);

    // Structure strategy: tiny trailing paragraph under a second header
    // falls below min_chunk_size and merges backwards.
    let text = "# One\n\nFirst section body that is comfortably over the minimum chunk size limit.\n\n\
                p2\n\np3\n\np4\n\np5\n\n# Two\n\ntiny";
    let chunks = splitter.split(text, Uuid::new_v4()).unwrap();

    let last = chunks.last().unwrap();
    assert!(last.content.contains("tiny"));
    assert!(chunks.iter().any(|c| c.metadata.merged_chunks.is_some()));
}

#[test]
fn empty_text_is_rejected() {
    let splitter = RecursiveSplitter::new(config());
    assert!(matches!(
        splitter.split("   \n\n  ", Uuid::new_v4()).unwrap_err(),
        ProcessingError::EmptyText
    ));
}

#[test]
fn derived_summary_and_questions_are_populated_on_request() {
    let mut cfg = small_config();
    cfg.generate_summary = true;
    cfg.generate_questions = true;
    let splitter = RecursiveSplitter::new(cfg);

    let text = "What is retrieval augmented generation? It grounds answers in indexed text. \
                The approach reduces hallucination in practice for many workloads today.";
    let chunks = splitter.split(text, Uuid::new_v4()).unwrap();

    let metadata = &chunks[0].metadata;
    assert!(metadata.summary.is_some());
    let questions = metadata.questions.as_ref().unwrap();
    assert!(!questions.is_empty() && questions.len() <= 3);
}
