//! Send exam credentials to every student in the store.

use std::path::PathBuf;

use uuid::Uuid;
use vigil_invitations::{dispatch_invitations, DispatchOptions, LogMailer, Mailer, OutboxMailer, Recipient};
use vigil_session::{JsonFileStore, RecordStore};

pub async fn run(
    store: PathBuf,
    test_id: Uuid,
    origin: String,
    outbox: Option<PathBuf>,
    company: Option<String>,
) -> anyhow::Result<()> {
    let store = JsonFileStore::open(store).await?;
    let exam = store
        .exam(test_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No test with id {test_id}"))?;
    let recipients: Vec<Recipient> = store.students().await?.iter().map(Recipient::from).collect();
    let test_link = exam.test_url(&origin);

    let mailer: Box<dyn Mailer> = match outbox {
        Some(path) => Box::new(OutboxMailer::open(path)?),
        None => Box::new(LogMailer),
    };

    let mut options = DispatchOptions::default();
    if let Some(company) = company {
        options.company_name = company;
    }

    println!("Sending {} invitations for '{}'", recipients.len(), exam.title);
    println!("  Link:   {test_link}");
    println!("  Mailer: {}", mailer.name());
    println!();

    let report = dispatch_invitations(mailer.as_ref(), &recipients, &test_link, &options).await;

    for email in &report.sent {
        println!("[OK]   {email}");
    }
    for failed in &report.failed {
        println!("[FAIL] {}: {}", failed.email, failed.reason);
    }
    println!();
    println!(
        "{} sent, {} failed",
        report.success_count(),
        report.failed_count()
    );

    if !report.all_sent() {
        anyhow::bail!("{} invitation(s) could not be sent", report.failed_count());
    }
    Ok(())
}
