use super::*;
use chrono::Utc;
use uuid::Uuid;

async fn db() -> Database {
    Database::in_memory().await.unwrap()
}

fn turn(session_id: Uuid, question: &str) -> QaTurn {
    QaTurn {
        id: Uuid::new_v4(),
        session_id,
        question: question.to_string(),
        answer: format!("answer to {question}"),
        sources: vec![SourceAttribution {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            document_name: "doc.txt".to_string(),
            similarity_score: 0.8,
            content_preview: "preview".to_string(),
            rerank_score: None,
        }],
        confidence_score: 0.7,
        processing_time_ms: 42,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn document_lifecycle_round_trip() {
    let db = db().await;
    let doc = Document::new_pending("report.pdf", "application/pdf", 1024);
    db.insert_document(&doc).await.unwrap();

    let loaded = db.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(loaded.filename, "report.pdf");
    assert_eq!(loaded.status, DocumentStatus::Pending);

    db.mark_document_processing(doc.id).await.unwrap();
    db.mark_document_ready(doc.id, 5, 5).await.unwrap();

    let ready = db.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(ready.status, DocumentStatus::Ready);
    assert_eq!(ready.chunk_count, 5);
    assert_eq!(ready.vector_count, 5);

    // Reprocess clears the derived counts before the pipeline reruns.
    db.mark_document_processing(doc.id).await.unwrap();
    let reprocessing = db.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(reprocessing.status, DocumentStatus::Processing);
    assert_eq!(reprocessing.chunk_count, 0);
}

#[tokio::test]
async fn document_error_records_the_message() {
    let db = db().await;
    let doc = Document::new_pending("bad.docx", "application/vnd.ms-word", 10);
    db.insert_document(&doc).await.unwrap();

    db.mark_document_error(doc.id, "no extractable text")
        .await
        .unwrap();
    let failed = db.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DocumentStatus::Error);
    assert_eq!(failed.error_message.as_deref(), Some("no extractable text"));
}

#[tokio::test]
async fn overview_tallies_statuses() {
    let db = db().await;
    for (name, target) in [
        ("a.txt", Some(DocumentStatus::Ready)),
        ("b.txt", Some(DocumentStatus::Error)),
        ("c.txt", None),
    ] {
        let doc = Document::new_pending(name, "text/plain", 1);
        db.insert_document(&doc).await.unwrap();
        match target {
            Some(DocumentStatus::Ready) => db.mark_document_ready(doc.id, 1, 1).await.unwrap(),
            Some(DocumentStatus::Error) => db.mark_document_error(doc.id, "x").await.unwrap(),
            _ => {}
        }
    }

    let overview = db.document_overview().await.unwrap();
    assert_eq!(overview.total_count, 3);
    assert_eq!(overview.ready_count, 1);
    assert_eq!(overview.error_count, 1);
    assert_eq!(overview.processing_count, 0);
}

#[tokio::test]
async fn duplicate_upload_gets_an_independent_record() {
    let db = db().await;
    let first = Document::new_pending("same.txt", "text/plain", 9);
    let second = Document::new_pending("same.txt", "text/plain", 9);
    db.insert_document(&first).await.unwrap();
    db.insert_document(&second).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(db.document_overview().await.unwrap().total_count, 2);
}

#[tokio::test]
async fn append_turn_bumps_session_counters() {
    let db = db().await;
    let session = db.create_session(None, Some("chat".to_string())).await.unwrap();
    assert_eq!(session.qa_count, 0);

    db.append_turn(&turn(session.id, "q1")).await.unwrap();
    db.append_turn(&turn(session.id, "q2")).await.unwrap();

    let reloaded = db.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(reloaded.qa_count, 2);
    assert!(reloaded.updated_at >= session.updated_at);

    let history = db.get_session_history(session.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].question, "q1");
    assert_eq!(history[1].question, "q2");
    assert_eq!(history[0].sources.len(), 1);
}

#[tokio::test]
async fn append_to_unknown_session_is_an_error() {
    let db = db().await;
    let err = db.append_turn(&turn(Uuid::new_v4(), "q")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "session", .. }));
}

#[tokio::test]
async fn delete_session_cascades_to_turns() {
    let db = db().await;
    let session = db.create_session(Some("u1".to_string()), None).await.unwrap();
    db.append_turn(&turn(session.id, "q1")).await.unwrap();

    assert!(db.delete_session(session.id).await.unwrap());
    assert!(db.get_session(session.id).await.unwrap().is_none());
    assert!(matches!(
        db.get_session_history(session.id).await.unwrap_err(),
        StorageError::NotFound { .. }
    ));

    // Second delete reports absence rather than failing.
    assert!(!db.delete_session(session.id).await.unwrap());
}

#[tokio::test]
async fn recent_sessions_are_ordered_by_activity() {
    let db = db().await;
    let s1 = db.create_session(None, Some("one".to_string())).await.unwrap();
    let _s2 = db.create_session(None, Some("two".to_string())).await.unwrap();

    // Touch s1 so it becomes the most recent.
    db.append_turn(&turn(s1.id, "q")).await.unwrap();

    let recent = db.list_recent_sessions(10).await.unwrap();
    assert_eq!(recent[0].id, s1.id);

    let limited = db.list_recent_sessions(1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn stats_cover_totals_and_recency() {
    let db = db().await;
    let stats = db.stats_summary().await.unwrap();
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.avg_qa_per_session, 0.0);

    let s1 = db.create_session(None, None).await.unwrap();
    let s2 = db.create_session(None, None).await.unwrap();
    db.append_turn(&turn(s1.id, "q1")).await.unwrap();
    db.append_turn(&turn(s1.id, "q2")).await.unwrap();
    db.append_turn(&turn(s2.id, "q3")).await.unwrap();

    let stats = db.stats_summary().await.unwrap();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_qa_pairs, 3);
    assert!((stats.avg_qa_per_session - 1.5).abs() < 1e-9);
    assert_eq!(stats.active_sessions_last_24h, 2);
}

#[tokio::test]
async fn cleanup_twice_is_a_noop() {
    let db = db().await;
    db.cleanup().await;
    db.cleanup().await;
}
