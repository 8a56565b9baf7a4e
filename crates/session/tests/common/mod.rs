#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;
use vigil_common::clock::{to_chrono, ManualClock};
use vigil_common::config::AppConfig;
use vigil_common::error::VigilResult;
use vigil_exam_model::{
    AvailabilityWindow, ExamDescriptor, OptionId, Question, SessionToken, Student,
};
use vigil_monitor::{MemoryListener, MemoryPeer, MemoryTransport};
use vigil_platform::synthetic::{HeadlessDisplay, SyntheticDevices};
use vigil_session::{login, ExamSession, InMemoryRecordStore, SessionDeps, StoreSnapshot};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub struct World {
    pub store: Arc<InMemoryRecordStore>,
    pub clock: ManualClock,
    pub devices: SyntheticDevices,
    pub display: Arc<HeadlessDisplay>,
    pub transport: MemoryTransport,
    pub listener: MemoryListener,
    pub exam: ExamDescriptor,
    pub questions: Vec<Question>,
    pub student: Student,
}

pub fn question(test_id: Uuid, n: usize, correct: OptionId) -> Question {
    Question {
        id: Uuid::new_v4(),
        test_id,
        text: format!("Question {n}"),
        options: ["a".into(), "b".into(), "c".into(), "d".into()],
        correct,
    }
}

pub fn world(duration_seconds: u64) -> World {
    let test_id = Uuid::new_v4();
    let exam = ExamDescriptor {
        test_id,
        title: "Systems Design Midterm".to_string(),
        batch_name: Some("2026-spring".to_string()),
        duration_seconds,
        availability_window: AvailabilityWindow::new(
            t0() - to_chrono(Duration::from_secs(3600)),
            t0() + to_chrono(Duration::from_secs(2 * 3600)),
        ),
        is_active: true,
    };
    let questions = vec![
        question(test_id, 1, OptionId::A),
        question(test_id, 2, OptionId::B),
        question(test_id, 3, OptionId::C),
        question(test_id, 4, OptionId::D),
    ];
    let student = Student {
        id: Uuid::new_v4(),
        name: "Lin".to_string(),
        email: "lin@example.com".to_string(),
        password: "otp-4821".to_string(),
        has_taken_test: false,
    };
    let store = Arc::new(InMemoryRecordStore::from_snapshot(StoreSnapshot {
        exams: vec![exam.clone()],
        questions: questions.clone(),
        students: vec![student.clone()],
        ..Default::default()
    }));
    let (transport, listener) = MemoryTransport::new();

    World {
        store,
        clock: ManualClock::new(t0()),
        devices: SyntheticDevices::default(),
        display: Arc::new(HeadlessDisplay::new()),
        transport,
        listener,
        exam,
        questions,
        student,
    }
}

impl World {
    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            store: self.store.clone(),
            clock: Arc::new(self.clock.clone()),
            devices: Arc::new(self.devices.clone()),
            display: self.display.clone(),
            transport: Arc::new(self.transport.clone()),
        }
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.monitoring.url = "memory://proctor".to_string();
        config
    }

    pub async fn login(&self) -> VigilResult<SessionToken> {
        login(
            self.store.as_ref(),
            &self.clock,
            self.exam.test_id,
            &self.student.email,
            &self.student.password,
        )
        .await
    }

    pub async fn prepared(&self) -> ExamSession {
        let token = self.login().await.unwrap();
        ExamSession::prepare(token, self.deps(), self.config())
            .await
            .unwrap()
    }

    /// A session that went through setup and is Active, plus the proctor's
    /// end of the monitoring connection.
    pub async fn active(&mut self) -> (ExamSession, MemoryPeer) {
        let mut session = self.prepared().await;
        session.enable_camera().await.unwrap();
        session.enter_fullscreen().unwrap();
        session.confirm_environment().unwrap();
        let peer = self.listener.accept().await.unwrap();
        (session, peer)
    }

    pub async fn student_row(&self) -> Student {
        self.store
            .snapshot()
            .await
            .students
            .into_iter()
            .find(|s| s.id == self.student.id)
            .unwrap()
    }
}

/// Let spawned tasks run without moving the wall clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
