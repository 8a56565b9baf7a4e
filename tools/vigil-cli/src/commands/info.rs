//! Show exam information.

use std::path::PathBuf;

use uuid::Uuid;
use vigil_session::{JsonFileStore, RecordStore};

pub async fn run(store: PathBuf, test_id: Uuid, origin: String, json: bool) -> anyhow::Result<()> {
    let store = JsonFileStore::open(store).await?;
    let exam = store
        .exam(test_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No test with id {test_id}"))?;
    let questions = store.questions(test_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&exam)?);
        return Ok(());
    }

    println!("Exam: {}", exam.title);
    println!("{}", "=".repeat(50));
    println!("  Id:        {}", exam.test_id);
    if let Some(batch) = &exam.batch_name {
        println!("  Batch:     {batch}");
    }
    println!("  Active:    {}", exam.is_active);
    println!("  Duration:  {}s", exam.duration_seconds);
    println!("  Opens:     {}", exam.availability_window.start.to_rfc3339());
    println!("  Closes:    {}", exam.availability_window.end.to_rfc3339());
    println!("  Questions: {}", questions.len());
    println!("  URL:       {}", exam.test_url(&origin));

    let now = chrono::Utc::now();
    println!();
    match exam.check_available(now) {
        Ok(()) => println!("[OK] Open for attempts"),
        Err(reason) => println!("[WARN] {reason}"),
    }

    Ok(())
}
