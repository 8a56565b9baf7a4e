//! Write a sample record store.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use uuid::Uuid;
use vigil_exam_model::{AvailabilityWindow, ExamDescriptor, OptionId, Question, Student};
use vigil_session::{JsonFileStore, StoreSnapshot};

pub async fn run(store: PathBuf, duration_seconds: u64) -> anyhow::Result<()> {
    if store.exists() {
        anyhow::bail!("{} already exists, refusing to overwrite", store.display());
    }

    let now = Utc::now();
    let test_id = Uuid::new_v4();
    let exam = ExamDescriptor {
        test_id,
        title: "Sample Aptitude Test".to_string(),
        batch_name: Some("Sample batch".to_string()),
        duration_seconds,
        availability_window: AvailabilityWindow::new(now - Duration::hours(1), now + Duration::days(7)),
        is_active: true,
    };

    let question = |text: &str, options: [&str; 4], correct: OptionId| Question {
        id: Uuid::new_v4(),
        test_id,
        text: text.to_string(),
        options: options.map(str::to_string),
        correct,
    };
    let questions = vec![
        question("2 + 2 = ?", ["3", "4", "5", "22"], OptionId::B),
        question(
            "Which planet is closest to the sun?",
            ["Venus", "Earth", "Mercury", "Mars"],
            OptionId::C,
        ),
        question(
            "Next in the sequence 1, 1, 2, 3, 5, ?",
            ["8", "7", "6", "9"],
            OptionId::A,
        ),
    ];

    let student = |name: &str, email: &str, password: &str| Student {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        has_taken_test: false,
    };
    let students = vec![
        student("Ada Sample", "ada@example.com", "otp-1001"),
        student("Sam Sample", "sam@example.com", "otp-1002"),
    ];

    let snapshot = StoreSnapshot {
        exams: vec![exam],
        questions,
        students,
        ..Default::default()
    };
    let created = JsonFileStore::create(&store, snapshot.clone()).await?;

    println!("Store created at {}", created.path().display());
    println!("  Test id: {test_id}");
    println!("  Duration: {duration_seconds}s");
    println!();
    println!("Questions:");
    for q in &snapshot.questions {
        println!("  {}  {}", q.id, q.text);
    }
    println!();
    println!("Students:");
    for s in &snapshot.students {
        println!("  {} <{}>  password: {}", s.name, s.email, s.password);
    }

    Ok(())
}
