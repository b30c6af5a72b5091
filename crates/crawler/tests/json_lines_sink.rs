use anyhow::Result;
use chrono::{TimeZone, Utc};
use gerrit_crawler::{DocumentSink, JsonLinesSink};
use normalizer::{ChangeExtractor, Document};
use serde_json::{json, Value};

fn documents(project: &str, number: i64, updated: &str) -> Vec<Document> {
    let raw = json!({
        "id": format!("{project}~master~I{number}"),
        "_number": number,
        "project": project,
        "branch": "master",
        "subject": "Subject",
        "status": "NEW",
        "owner": {"_account_id": 1},
        "created": "2020-04-01 00:00:00.000000000",
        "updated": updated,
        "insertions": 0,
        "deletions": 0,
        "revisions": {"sha": {"commit": {"message": "Subject"}}}
    });
    ChangeExtractor::new("https://review.example.org")
        .extract_one(&raw)
        .unwrap()
}

#[tokio::test]
async fn missing_file_has_no_watermark() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = JsonLinesSink::new(dir.path().join("absent.jsonl"));
    assert_eq!(sink.last_updated("zuul/zuul").await?, None);
    Ok(())
}

#[tokio::test]
async fn writes_one_document_per_line() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = JsonLinesSink::new(dir.path().join("out.jsonl"));
    sink.update(&documents("zuul/zuul", 1, "2020-04-08 10:00:00.000000000"))
        .await?;
    sink.update(&[]).await?;

    let data = tokio::fs::read_to_string(sink.path()).await?;
    let lines: Vec<Value> = data
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type"], json!("Change"));
    assert_eq!(lines[0]["updated_at"], json!("2020-04-08T10:00:00Z"));
    assert_eq!(lines[1]["type"], json!("ChangeCreatedEvent"));
    assert_eq!(lines[1]["id"], json!("CCEzuul/zuul~master~I1"));
    Ok(())
}

#[tokio::test]
async fn watermark_is_newest_change_of_repository() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = JsonLinesSink::new(dir.path().join("out.jsonl"));
    sink.update(&documents("zuul/zuul", 1, "2020-04-08 10:00:00.000000000"))
        .await?;
    sink.update(&documents("zuul/zuul", 2, "2020-04-09 08:30:00.000000000"))
        .await?;
    sink.update(&documents("zuul/nodepool", 3, "2020-05-01 00:00:00.000000000"))
        .await?;
    sink.update(&documents("zuul/zuul", 1, "2020-04-08 12:00:00.000000000"))
        .await?;

    assert_eq!(
        sink.last_updated("zuul/zuul").await?,
        Some(Utc.with_ymd_and_hms(2020, 4, 9, 8, 30, 0).unwrap())
    );
    assert_eq!(
        sink.last_updated("zuul/nodepool").await?,
        Some(Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(sink.last_updated("other/repo").await?, None);
    Ok(())
}

#[tokio::test]
async fn written_documents_read_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = JsonLinesSink::new(dir.path().join("out.jsonl"));
    let written = documents("zuul/zuul", 7, "2020-04-08 10:00:00.000000000");
    sink.update(&written).await?;

    let data = tokio::fs::read_to_string(sink.path()).await?;
    let read: Vec<Document> = data
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(read, written);
    Ok(())
}

#[tokio::test]
async fn repeated_update_replaces_documents_by_id() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = JsonLinesSink::new(dir.path().join("out.jsonl"));
    let first = documents("zuul/zuul", 1, "2020-04-08 10:00:00.000000000");
    let second = documents("zuul/zuul", 2, "2020-04-08 11:00:00.000000000");
    sink.update(&first).await?;
    sink.update(&second).await?;
    sink.update(&first).await?;
    sink.update(&second).await?;

    let data = tokio::fs::read_to_string(sink.path()).await?;
    assert_eq!(data.lines().count(), 4);

    let updated = documents("zuul/zuul", 1, "2020-04-08 15:00:00.000000000");
    sink.update(&updated).await?;
    let data = tokio::fs::read_to_string(sink.path()).await?;
    let lines: Vec<Value> = data
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["id"], json!("zuul/zuul~master~I1"));
    assert_eq!(lines[0]["updated_at"], json!("2020-04-08T15:00:00Z"));
    assert_eq!(lines[2]["id"], json!("zuul/zuul~master~I2"));
    Ok(())
}

#[tokio::test]
async fn unreadable_lines_do_not_block_the_watermark() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out.jsonl");
    let lines = [
        r#"{"type":"Change","id":"a","repository_fullname":"zuul/zuul","updated_at":"yesterday"}"#,
        "not json",
        r#"{"type":"Change","id":"b","repository_fullname":"zuul/zuul","updated_at":"2020-04-08T10:00:00Z"}"#,
    ];
    tokio::fs::write(&path, lines.join("\n")).await?;
    let sink = JsonLinesSink::new(path);

    assert_eq!(
        sink.last_updated("zuul/zuul").await?,
        Some(Utc.with_ymd_and_hms(2020, 4, 8, 10, 0, 0).unwrap())
    );
    Ok(())
}

#[tokio::test]
async fn regex_repository_watermark_spans_matching_projects() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = JsonLinesSink::new(dir.path().join("out.jsonl"));
    sink.update(&documents("zuul/zuul", 1, "2020-04-08 10:00:00.000000000"))
        .await?;
    sink.update(&documents("zuul/nodepool", 2, "2020-04-09 10:00:00.000000000"))
        .await?;
    sink.update(&documents("opendev/system-config", 3, "2020-05-01 00:00:00.000000000"))
        .await?;

    assert_eq!(
        sink.last_updated("^zuul/.*").await?,
        Some(Utc.with_ymd_and_hms(2020, 4, 9, 10, 0, 0).unwrap())
    );
    assert_eq!(sink.last_updated("^openstack/.*").await?, None);
    Ok(())
}
