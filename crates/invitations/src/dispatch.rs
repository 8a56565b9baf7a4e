//! Bulk invitation dispatch.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use vigil_exam_model::Student;

use crate::mailer::{Invitation, Mailer};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email pattern")
});

/// Whether `email` looks deliverable (`local@domain.tld`, no whitespace).
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Who to invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl From<&Student> for Recipient {
    fn from(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            email: student.email.clone(),
            password: student.password.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Sender name shown in the message.
    pub company_name: String,
    /// Pause between consecutive sends, to stay under provider rate limits.
    pub pacing: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            company_name: "Vigil Exams".to_string(),
            pacing: Duration::from_millis(250),
        }
    }
}

/// A recipient that was not sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInvitation {
    pub email: String,
    pub reason: String,
}

/// Per-recipient result of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<String>,
    pub failed: Vec<FailedInvitation>,
}

impl DispatchReport {
    pub fn success_count(&self) -> usize {
        self.sent.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn all_sent(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send one invitation per recipient.
///
/// Invalid addresses are reported without contacting the mailer. A failed
/// send never stops the batch.
pub async fn dispatch_invitations(
    mailer: &dyn Mailer,
    recipients: &[Recipient],
    test_link: &str,
    options: &DispatchOptions,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    let mut first = true;

    for recipient in recipients {
        let email = recipient.email.trim();
        if !is_valid_email(email) {
            tracing::warn!(email = %recipient.email, "Invalid email address skipped");
            report.failed.push(FailedInvitation {
                email: recipient.email.clone(),
                reason: "invalid email address".to_string(),
            });
            continue;
        }

        if !first && !options.pacing.is_zero() {
            tokio::time::sleep(options.pacing).await;
        }
        first = false;

        let invitation = Invitation {
            name: recipient.name.clone(),
            email: email.to_string(),
            otp: recipient.password.clone(),
            company_name: options.company_name.clone(),
            test_link: test_link.to_string(),
        };
        match mailer.send(&invitation).await {
            Ok(()) => {
                tracing::debug!(mailer = mailer.name(), %email, "Invitation sent");
                report.sent.push(email.to_string());
            }
            Err(e) => {
                tracing::warn!(mailer = mailer.name(), %email, error = %e, "Invitation failed");
                report.failed.push(FailedInvitation {
                    email: email.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        sent = report.success_count(),
        failed = report.failed_count(),
        "Invitation dispatch finished"
    );
    report
}
