// Composition tests — verifying that the detector and the intake path chain
// together correctly.
//
// These tests exercise the data flow between modules:
//   Rules -> Classifier gate -> Verdict -> Suspect record -> Moderation prompt
// with a fake classifier, an in-memory database, and a recording transport.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use warden::classifier::{
    ClassifierError, Label, MemoryModelStore, NoopClassifier, Prediction, StatisticalClassifier,
    TextClassifier, TrainingReport,
};
use warden::db::models::{
    NewSuspect, SuspectCounts, SuspectRecord, SuspectStatus, TrainingExample, TrainingStats,
};
use warden::db::{Database, SqliteDatabase};
use warden::message::{AuthorInfo, IncomingMessage};
use warden::moderation::{ModerationMachine, ModerationPrompt, Transition, Transport};
use warden::output::truncate_chars;
use warden::pipeline::intake::{Intake, ScreenOutcome};
use warden::rules::RuleEngine;
use warden::scoring::{Detector, VerdictSource, CONFIDENCE_THRESHOLD};

const CHANNEL: i64 = -100300;
const MOD_CHAT: i64 = -100400;

/// A sentence no rule fires on, so only the classifier can flag it.
const NEUTRAL: &str = "интересная мысль про архитектуру сервиса";

// ============================================================
// Fakes
// ============================================================

/// Classifier with a fixed answer.
struct FixedClassifier {
    trained: bool,
    answer: Result<Prediction, String>,
}

impl FixedClassifier {
    fn says(label: Label, confidence: f64) -> Self {
        Self {
            trained: true,
            answer: Ok(Prediction::new(label, confidence)),
        }
    }

    fn broken() -> Self {
        Self {
            trained: true,
            answer: Err("model lock poisoned".to_string()),
        }
    }
}

#[async_trait]
impl TextClassifier for FixedClassifier {
    async fn is_trained(&self) -> bool {
        self.trained
    }

    async fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
        self.answer.clone().map_err(ClassifierError::Worker)
    }

    async fn incremental_train(
        &self,
        _texts: &[String],
        _labels: &[i64],
    ) -> Result<TrainingReport, ClassifierError> {
        Ok(TrainingReport::Rejected {
            reason: "fixed".to_string(),
        })
    }
}

/// Transport that records prompts and checks each one has a pending record
/// behind it at the moment it is sent.
struct PromptRecorder {
    db: Arc<dyn Database>,
    fail: bool,
    prompts: Mutex<Vec<ModerationPrompt>>,
    unbacked: Mutex<usize>,
}

impl PromptRecorder {
    fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            fail: false,
            prompts: Mutex::new(Vec::new()),
            unbacked: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Transport for PromptRecorder {
    async fn send_moderation_prompt(&self, prompt: &ModerationPrompt) -> Result<()> {
        let backed = self
            .db
            .get_pending_suspect(prompt.message_id)
            .await?
            .is_some();
        if !backed {
            *self.unbacked.lock().unwrap() += 1;
        }
        self.prompts.lock().unwrap().push(prompt.clone());
        if self.fail {
            anyhow::bail!("chat unreachable");
        }
        Ok(())
    }

    async fn ban_user(&self, _chat_id: i64, _user_id: i64) -> Result<()> {
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, _message_id: i64) -> Result<()> {
        Ok(())
    }
}

/// Database whose suspect writes fail; everything else is delegated.
struct ReadOnlySuspects(SqliteDatabase);

#[async_trait]
impl Database for ReadOnlySuspects {
    async fn table_count(&self) -> Result<i64> {
        self.0.table_count().await
    }

    async fn is_trusted(&self, user_id: i64) -> Result<bool> {
        self.0.is_trusted(user_id).await
    }

    async fn add_trusted_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<()> {
        self.0.add_trusted_user(user_id, username, full_name).await
    }

    async fn add_suspect_record(&self, _suspect: &NewSuspect) -> Result<bool> {
        anyhow::bail!("database is locked")
    }

    async fn get_pending_suspect(&self, message_id: i64) -> Result<Option<SuspectRecord>> {
        self.0.get_pending_suspect(message_id).await
    }

    async fn get_suspect_record(&self, message_id: i64) -> Result<Option<SuspectRecord>> {
        self.0.get_suspect_record(message_id).await
    }

    async fn update_suspect_status(&self, message_id: i64, status: SuspectStatus) -> Result<()> {
        self.0.update_suspect_status(message_id, status).await
    }

    async fn transition_suspect(&self, message_id: i64, status: SuspectStatus) -> Result<bool> {
        self.0.transition_suspect(message_id, status).await
    }

    async fn get_suspect_counts(&self) -> Result<SuspectCounts> {
        self.0.get_suspect_counts().await
    }

    async fn add_training_example(
        &self,
        text: &str,
        label: i64,
        moderator_id: i64,
    ) -> Result<i64> {
        self.0.add_training_example(text, label, moderator_id).await
    }

    async fn get_unprocessed_training_examples(&self) -> Result<Vec<TrainingExample>> {
        self.0.get_unprocessed_training_examples().await
    }

    async fn mark_training_examples_processed(&self, ids: &[i64]) -> Result<()> {
        self.0.mark_training_examples_processed(ids).await
    }

    async fn get_training_stats(&self) -> Result<TrainingStats> {
        self.0.get_training_stats().await
    }
}

fn detector(classifier: impl TextClassifier + 'static) -> Detector {
    Detector::new(RuleEngine::new(Some("home".to_string())), Arc::new(classifier))
}

fn author(id: i64) -> AuthorInfo {
    AuthorInfo {
        id,
        username: Some(format!("user{id}")),
        first_name: Some("Пётр".to_string()),
        last_name: None,
    }
}

fn message(message_id: i64, user_id: i64, text: Option<&str>) -> IncomingMessage {
    IncomingMessage {
        chat_id: CHANNEL,
        message_id,
        author: author(user_id),
        text: text.map(String::from),
        caption: None,
    }
}

// ============================================================
// Chain: Rules -> Classifier gate -> Verdict
// ============================================================

#[tokio::test]
async fn classifier_verdict_is_gated_at_the_threshold() {
    let at = detector(FixedClassifier::says(Label::Suspicious, CONFIDENCE_THRESHOLD))
        .decide(NEUTRAL, &author(1))
        .await;
    assert!(at.suspicious);
    assert_eq!(at.source, VerdictSource::Classifier);
    assert_eq!(at.confidence, Some(CONFIDENCE_THRESHOLD));

    let below = detector(FixedClassifier::says(Label::Suspicious, 0.6999))
        .decide(NEUTRAL, &author(1))
        .await;
    assert!(!below.suspicious);
    assert_eq!(below.confidence, Some(0.6999));
}

#[tokio::test]
async fn confident_benign_prediction_is_not_suspicious() {
    let v = detector(FixedClassifier::says(Label::Benign, 0.99))
        .decide(NEUTRAL, &author(1))
        .await;
    assert!(!v.suspicious);
    assert_eq!(v.source, VerdictSource::Classifier);
}

#[tokio::test]
async fn rule_hit_reports_no_confidence() {
    let v = detector(FixedClassifier::says(Label::Benign, 0.99))
        .decide("подпишись на канал", &author(1))
        .await;
    assert!(v.suspicious);
    assert_eq!(v.source, VerdictSource::Rule);
    assert_eq!(v.confidence, None);
    assert_eq!(v.reason.as_deref(), Some("heuristic:call_to_action"));
}

#[tokio::test]
async fn exclusion_overrides_a_confident_classifier() {
    let v = detector(FixedClassifier::says(Label::Suspicious, 0.99))
        .decide("Спасибо большое!", &author(1))
        .await;
    assert!(!v.suspicious);
    assert_eq!(v.source, VerdictSource::Exclusion);
    assert_eq!(v.confidence, None);
}

#[tokio::test]
async fn classifier_failure_degrades_to_rules_only() {
    let d = detector(FixedClassifier::broken());
    let v = d.decide(NEUTRAL, &author(1)).await;
    assert!(!v.suspicious);
    assert_eq!(v.source, VerdictSource::Default);

    // Rules still work with a broken classifier
    assert!(d.decide("забери подарок", &author(1)).await.suspicious);
}

#[tokio::test]
async fn untrained_classifier_is_never_consulted() {
    let v = detector(NoopClassifier).decide(NEUTRAL, &author(1)).await;
    assert!(!v.suspicious);
    assert_eq!(v.source, VerdictSource::Default);
    assert_eq!(v.confidence, None);

    let fresh = StatisticalClassifier::new(Arc::new(MemoryModelStore::new()));
    let v = detector(fresh).decide(NEUTRAL, &author(1)).await;
    assert_eq!(v.source, VerdictSource::Default);
}

#[tokio::test]
async fn empty_text_is_never_suspicious() {
    let d = detector(FixedClassifier::says(Label::Suspicious, 1.0));
    for text in ["", "   ", "\n\t"] {
        let v = d.decide(text, &author(1)).await;
        assert!(!v.suspicious);
        assert_eq!(v.source, VerdictSource::EmptyText);
    }
}

// ============================================================
// Chain: Verdict -> Suspect record -> Prompt
// ============================================================

fn intake_with(
    db: Arc<dyn Database>,
    classifier: impl TextClassifier + 'static,
) -> (Intake, Arc<PromptRecorder>) {
    let transport = Arc::new(PromptRecorder::new(db.clone()));
    let intake = Intake::new(
        db,
        Arc::new(detector(classifier)),
        transport.clone(),
        MOD_CHAT,
    );
    (intake, transport)
}

#[tokio::test]
async fn suspicious_message_is_recorded_before_the_prompt() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, transport) = intake_with(db.clone(), NoopClassifier);

    let outcome = intake
        .screen_message(&message(50, 900, Some("забери подарок бесплатно")))
        .await;

    assert!(matches!(outcome, ScreenOutcome::Queued(_)));
    assert_eq!(*transport.unbacked.lock().unwrap(), 0);

    let prompts = transport.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].moderation_chat_id, MOD_CHAT);
    assert_eq!(prompts[0].buttons()[1].1, "ban:50:900");

    let record = db.get_pending_suspect(50).await.unwrap().unwrap();
    assert_eq!(record.user_id, 900);
    assert_eq!(record.chat_id, CHANNEL);
    assert_eq!(record.suspect_message.as_deref(), Some("забери подарок бесплатно"));
    assert_eq!(record.full_name.as_deref(), Some("Пётр"));
}

#[tokio::test]
async fn classifier_confidence_is_stored_on_the_record() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, _transport) =
        intake_with(db.clone(), FixedClassifier::says(Label::Suspicious, 0.85));

    let outcome = intake.screen_message(&message(51, 901, Some(NEUTRAL))).await;

    assert!(matches!(outcome, ScreenOutcome::Queued(_)));
    let record = db.get_pending_suspect(51).await.unwrap().unwrap();
    assert_eq!(record.confidence, Some(0.85));
}

#[tokio::test]
async fn empty_message_creates_no_record() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, transport) = intake_with(db.clone(), FixedClassifier::says(Label::Suspicious, 1.0));

    let outcome = intake.screen_message(&message(52, 902, None)).await;

    match outcome {
        ScreenOutcome::Clean(v) => assert_eq!(v.source, VerdictSource::EmptyText),
        other => panic!("expected clean, got {other:?}"),
    }
    assert_eq!(db.get_suspect_counts().await.unwrap(), SuspectCounts::default());
    assert!(transport.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn trusted_authors_skip_detection() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    db.add_trusted_user(903, Some("user903"), None).await.unwrap();
    let (intake, transport) = intake_with(db.clone(), NoopClassifier);

    let outcome = intake
        .screen_message(&message(53, 903, Some("забери подарок бесплатно")))
        .await;

    assert_eq!(outcome, ScreenOutcome::Trusted);
    assert!(transport.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_screening_does_not_duplicate_the_record() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, transport) = intake_with(db.clone(), NoopClassifier);
    let msg = message(54, 904, Some("забери подарок бесплатно"));

    assert!(matches!(intake.screen_message(&msg).await, ScreenOutcome::Queued(_)));
    assert!(matches!(
        intake.screen_message(&msg).await,
        ScreenOutcome::AlreadyQueued(_)
    ));
    assert_eq!(transport.prompts.lock().unwrap().len(), 1);
    assert_eq!(db.get_suspect_counts().await.unwrap().pending, 1);
}

#[tokio::test]
async fn unrecorded_suspect_is_not_prompted() {
    let db: Arc<dyn Database> = Arc::new(ReadOnlySuspects(SqliteDatabase::in_memory().unwrap()));
    let (intake, transport) = intake_with(db, NoopClassifier);

    let outcome = intake
        .screen_message(&message(55, 905, Some("забери подарок бесплатно")))
        .await;

    assert!(matches!(outcome, ScreenOutcome::NotRecorded(_)));
    assert!(transport.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prompt_failure_keeps_the_record_for_later() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let transport = Arc::new(PromptRecorder {
        fail: true,
        ..PromptRecorder::new(db.clone())
    });
    let intake = Intake::new(
        db.clone(),
        Arc::new(detector(NoopClassifier)),
        transport,
        MOD_CHAT,
    );

    let outcome = intake
        .screen_message(&message(56, 906, Some("забери подарок бесплатно")))
        .await;

    assert!(matches!(outcome, ScreenOutcome::PromptFailed(_)));
    assert!(db.get_pending_suspect(56).await.unwrap().is_some());
}

#[tokio::test]
async fn batch_results_keep_input_order() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, _transport) = intake_with(db, NoopClassifier);
    let messages = vec![
        message(60, 1, Some("забери подарок бесплатно")),
        message(61, 2, Some(NEUTRAL)),
        message(62, 3, Some("подпишись на канал")),
        message(63, 4, None),
    ];

    let outcomes = intake.screen_batch(&messages, 3).await;

    assert_eq!(outcomes.len(), 4);
    assert!(matches!(outcomes[0], ScreenOutcome::Queued(_)));
    assert!(matches!(outcomes[1], ScreenOutcome::Clean(_)));
    assert!(matches!(outcomes[2], ScreenOutcome::Queued(_)));
    assert!(matches!(outcomes[3], ScreenOutcome::Clean(_)));
}

// ============================================================
// Full loop: screen -> moderate
// ============================================================

#[tokio::test]
async fn queued_message_can_be_banned_from_its_prompt() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, transport) = intake_with(db.clone(), NoopClassifier);
    intake
        .screen_message(&message(70, 950, Some("забери подарок бесплатно")))
        .await;

    let callback = transport.prompts.lock().unwrap()[0].buttons()[1].1.clone();
    let machine = ModerationMachine::new(db.clone(), transport.clone(), CHANNEL);
    let outcome = machine.handle_callback(&callback, 1).await.unwrap();

    assert_eq!(outcome.transition, Transition::Applied(SuspectStatus::Banned));
    let stats = db.get_training_stats().await.unwrap();
    assert_eq!((stats.total, stats.bad), (1, 1));
}

#[tokio::test]
async fn long_messages_are_quoted_truncated_in_the_prompt() {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let (intake, transport) = intake_with(db.clone(), NoopClassifier);
    let long = format!("забери подарок бесплатно {}", "подарок ".repeat(200));
    intake.screen_message(&message(71, 951, Some(&long))).await;

    let rendered = transport.prompts.lock().unwrap()[0].render();
    assert!(rendered.contains(&truncate_chars(&long, 700)));
    assert!(!rendered.contains(long.trim_end()));

    // The record keeps the full text for training
    let record = db.get_pending_suspect(71).await.unwrap().unwrap();
    assert_eq!(record.suspect_message.as_deref(), Some(long.as_str()));
}
