use std::fs;
use tempfile::TempDir;

use ragchat_core::config::ChunkingSettings;
use ragchat_core::error::Error;
use ragchat_core::loader::DocumentLoader;

fn loader() -> DocumentLoader {
    DocumentLoader::new(ChunkingSettings { chunk_size: 1000, chunk_overlap: 200 }).expect("loader")
}

#[test]
fn two_short_records_become_two_identical_chunks() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("faq.json");
    fs::write(
        &path,
        r#"[{"text": "Opening hours are 9 to 5.", "topic": "hours"},
            {"content": "Returns are accepted within 30 days."}]"#,
    )
    .unwrap();

    let corpus = loader().process_path(&path).expect("process");
    assert_eq!(corpus.sources, 1);
    assert_eq!(corpus.chunks.len(), 2);
    assert_eq!(corpus.chunks[0].content, "Opening hours are 9 to 5.");
    assert_eq!(corpus.chunks[0].id, "faq#0:0");
    assert_eq!(corpus.chunks[0].metadata.get("topic").map(String::as_str), Some("hours"));
    assert_eq!(corpus.chunks[1].content, "Returns are accepted within 30 days.");
    assert_eq!(corpus.chunks[1].doc_id, "faq#1");
}

#[test]
fn single_object_is_wrapped_into_a_list() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("one.json");
    fs::write(&path, r#"{"text": "only record"}"#).unwrap();

    let records = loader().load(&path).expect("load");
    assert_eq!(records.len(), 1);
}

#[test]
fn record_without_text_falls_back_to_json_rendering() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("misc.json");
    fs::write(&path, r#"[{"question": "Where?", "answer": "Here"}]"#).unwrap();

    let corpus = loader().process_path(&path).expect("process");
    assert_eq!(corpus.chunks.len(), 1);
    let content = &corpus.chunks[0].content;
    let reparsed: serde_json::Value = serde_json::from_str(content).expect("content is JSON");
    assert_eq!(reparsed["question"], "Where?");
    assert_eq!(reparsed["answer"], "Here");
}

#[test]
fn non_object_records_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mixed.json");
    fs::write(&path, r#"["stray string", {"text": "kept"}, 7]"#).unwrap();

    let corpus = loader().process_path(&path).expect("process");
    assert_eq!(corpus.documents.len(), 1);
    assert_eq!(corpus.documents[0].doc_id, "mixed#1");
}

#[test]
fn missing_and_invalid_sources_are_malformed_input() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.json");
    assert!(matches!(loader().load(&missing), Err(Error::MalformedInput { .. })));

    let broken = tmp.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(matches!(loader().load(&broken), Err(Error::MalformedInput { .. })));

    let scalar = tmp.path().join("scalar.json");
    fs::write(&scalar, "\"just a string\"").unwrap();
    assert!(matches!(loader().load(&scalar), Err(Error::MalformedInput { .. })));
}

#[test]
fn directory_sources_are_loaded_in_sorted_order() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("nested")).unwrap();
    fs::write(tmp.path().join("b.json"), r#"{"text": "bravo"}"#).unwrap();
    fs::write(tmp.path().join("a.json"), r#"{"text": "alpha"}"#).unwrap();
    fs::write(tmp.path().join("nested/c.json"), r#"{"text": "charlie"}"#).unwrap();
    fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

    let corpus = loader().process_path(tmp.path()).expect("process");
    assert_eq!(corpus.sources, 3);
    let ids: Vec<_> = corpus.chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a#0:0", "b#0:0", "nested/c#0:0"]);
}

#[test]
fn long_record_is_split_with_overlap() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("long.json");
    let body = "Sentence number one is here. ".repeat(20);
    fs::write(&path, serde_json::json!({"text": body}).to_string()).unwrap();

    let loader = DocumentLoader::new(ChunkingSettings { chunk_size: 120, chunk_overlap: 30 }).unwrap();
    let corpus = loader.process_path(&path).expect("process");
    assert!(corpus.chunks.len() > 1);
    for c in &corpus.chunks {
        assert!(c.content.chars().count() <= 120);
        assert_eq!(c.total_chunks, corpus.chunks.len());
    }
    for pair in corpus.chunks.windows(2) {
        let prev: Vec<char> = pair[0].content.chars().collect();
        let tail: String = prev[prev.len() - 30..].iter().collect();
        assert!(pair[1].content.starts_with(&tail));
    }
}
