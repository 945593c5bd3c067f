use dqa_ai::chunking::TextSplitter;
use dqa_core::domain::{Document, DocumentKind, SourceMetadata};
use dqa_core::normalize::normalize_documents;
use pretty_assertions::assert_eq;

fn meta(source: &str) -> SourceMetadata {
    SourceMetadata::new(source, DocumentKind::Text)
}

fn sample_text() -> String {
    let mut paras = Vec::new();
    for i in 0..40 {
        paras.push(format!(
            "Paragraph {i}. Sakura Kimura spends her afternoons painting cherry trees.\nShe also hikes on weekends and writes short poems about the seasons."
        ));
    }
    paras.join("\n\n")
}

#[test]
fn chunks_never_exceed_max_size() {
    let splitter = TextSplitter::new(120, 0).unwrap();
    let text = sample_text();
    let chunks = splitter.split_text(&text);
    assert!(chunks.len() > 1);
    for c in &chunks {
        assert!(c.chars().count() <= 120, "chunk too long: {}", c.chars().count());
        assert!(!c.trim().is_empty());
    }
}

#[test]
fn overlap_never_pushes_a_chunk_over_max_size() {
    let text = sample_text();
    for size in (20..=140).step_by(15) {
        for overlap in (1..size).step_by(7) {
            let splitter = TextSplitter::new(size, overlap).unwrap();
            for c in splitter.split_text(&text) {
                assert!(
                    c.chars().count() <= size,
                    "size={size} overlap={overlap}: chunk has {} chars",
                    c.chars().count()
                );
            }
        }
    }
}

#[test]
fn chunks_reconstruct_the_text_modulo_whitespace() {
    let splitter = TextSplitter::new(100, 0).unwrap();
    let text = sample_text();
    let joined: String = splitter.split_text(&text).concat();
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    assert_eq!(strip(&joined), strip(&text));
}

#[test]
fn spans_point_back_into_the_source_in_order() {
    let splitter = TextSplitter::new(80, 0).unwrap();
    let text = sample_text();
    let spans = splitter.split_spans(&text);
    let mut prev_end = 0;
    for s in spans {
        assert!(s.start >= prev_end);
        assert_eq!(&text[s.clone()], text[s.clone()].trim());
        prev_end = s.end;
    }
}

#[test]
fn unbreakable_run_is_hard_cut() {
    let splitter = TextSplitter::new(50, 0).unwrap();
    let text = "x".repeat(175);
    let chunks = splitter.split_text(&text);
    assert_eq!(
        chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
        vec![50, 50, 50, 25]
    );
}

#[test]
fn documents_are_chunked_in_order_with_metadata() {
    let docs = vec![
        Document::text("first doc", meta("documents/a.txt")),
        Document::lines(
            vec!["name: Sakura".to_string(), "hobby: painting".to_string()],
            meta("documents/b.csv").with_line(1),
        ),
        Document::text("   ", meta("documents/blank.txt")),
    ];
    let chunks = TextSplitter::default().chunk_documents(&docs);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "first doc");
    assert_eq!(chunks[0].document_ordinal, 0);
    assert_eq!(chunks[1].text, "name: Sakura\nhobby: painting");
    assert_eq!(chunks[1].document_ordinal, 1);
    assert_eq!(chunks[1].metadata.line, Some(1));
    assert_eq!(chunks[1].source(), "documents/b.csv");
}

#[test]
fn crlf_spans_index_the_normalized_text() {
    let docs = vec![Document::text("alpha\r\nbeta gamma", meta("documents/crlf.txt"))];
    let normalized = normalize_documents(&docs);
    let chunks = TextSplitter::new(10, 0).unwrap().chunk_documents(&docs);

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha", "beta gamma"]);
    assert_eq!((chunks[1].start, chunks[1].end), (7, 17));
    for c in &chunks {
        assert_eq!(&normalized[0][c.start..c.end], c.text);
    }
}
