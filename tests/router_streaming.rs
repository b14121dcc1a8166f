use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use web_gpt_rs::llm::{
    AnswerEvent, ChatBackend, Content, LlmError, ModelClient, Role, Transcript,
};
use web_gpt_rs::router::SessionRouter;

const SYSTEM: &str = "You are an AI assistant that helps people find information.";

/// Emits the scripted fragments as growing cumulative deltas, mimicking
/// the standard path's transcript handling.
struct ScriptedBackend {
    fragments: Vec<&'static str>,
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn run(
        &self,
        transcript: &Mutex<Transcript>,
        question: &str,
        _max_tokens: u32,
        _image: Option<&Path>,
        updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError> {
        transcript.lock().await.push_user_text(question);

        let mut answer = String::new();
        for fragment in &self.fragments {
            answer.push_str(fragment);
            let _ = updates.send(AnswerEvent::Delta(answer.clone())).await;
        }

        transcript.lock().await.push_assistant(&answer);
        Ok(answer)
    }
}

/// Emits exactly one delta carrying the whole answer, like the vision path.
struct SingleShotBackend {
    answer: &'static str,
}

#[async_trait]
impl ChatBackend for SingleShotBackend {
    async fn run(
        &self,
        _transcript: &Mutex<Transcript>,
        _question: &str,
        _max_tokens: u32,
        _image: Option<&Path>,
        updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError> {
        let _ = updates
            .send(AnswerEvent::Delta(self.answer.to_string()))
            .await;
        Ok(self.answer.to_string())
    }
}

/// Fails without emitting any delta, like a provider outage.
struct FailingBackend;

#[async_trait]
impl ChatBackend for FailingBackend {
    async fn run(
        &self,
        _transcript: &Mutex<Transcript>,
        _question: &str,
        _max_tokens: u32,
        _image: Option<&Path>,
        _updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError> {
        Err(LlmError::NetworkError("connection refused".to_string()))
    }
}

fn hello_router() -> SessionRouter {
    let backend = Arc::new(ScriptedBackend {
        fragments: vec!["He", "llo", " there"],
    });
    SessionRouter::from_clients(vec![(
        "GPT4".to_string(),
        ModelClient::with_backend(backend, SYSTEM),
    )])
}

async fn collect(
    mut receiver: mpsc::Receiver<AnswerEvent>,
) -> (Vec<String>, Option<AnswerEvent>) {
    let mut deltas = Vec::new();
    let mut terminal = None;
    while let Some(event) = receiver.recv().await {
        match event {
            AnswerEvent::Delta(answer) => deltas.push(answer),
            other => terminal = Some(other),
        }
    }
    (deltas, terminal)
}

#[tokio::test]
async fn test_hello_roundtrip_updates_transcript_and_history() -> Result<()> {
    let router = hello_router();

    let receiver = router.route("GPT4", "hello", 800, "", None, None).await?;
    let (deltas, terminal) = collect(receiver).await;

    assert_eq!(deltas, vec!["He", "Hello", "Hello there"]);
    match terminal {
        Some(AnswerEvent::Done(answer)) => assert_eq!(answer, "Hello there"),
        other => panic!("expected Done terminal, got {other:?}"),
    }

    let transcript = router.transcript("GPT4").expect("transcript handle");
    let transcript = transcript.lock().await;
    let messages = transcript.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(
        messages.first().expect("system entry").content,
        Content::Text(SYSTEM.to_string())
    );
    let user = messages.get(1).expect("user entry");
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, Content::Text("hello".to_string()));
    drop(transcript);

    let history = router.history("GPT4").await?;
    assert_eq!(history.len(), 1);
    let record = history.first().expect("history record");
    assert_eq!(record.message, "hello");
    assert_eq!(record.answer, "Hello there");

    Ok(())
}

#[tokio::test]
async fn test_unknown_model_fails_and_leaves_transcripts_unchanged() -> Result<()> {
    let router = hello_router();

    let err = router
        .route("unknown-model", "hi", 800, "", None, None)
        .await
        .expect_err("unknown model must fail");
    assert!(err.to_string().contains("unknown model"));

    let transcript = router.transcript("GPT4").expect("transcript handle");
    assert_eq!(transcript.lock().await.len(), 1);
    assert!(router.history("GPT4").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_deltas_are_prefix_extensions() -> Result<()> {
    let backend = Arc::new(ScriptedBackend {
        fragments: vec!["a", "b", "c", "d", "e"],
    });
    let router = SessionRouter::from_clients(vec![(
        "GPT4".to_string(),
        ModelClient::with_backend(backend, SYSTEM),
    )]);

    let receiver = router.route("GPT4", "count", 800, "", None, None).await?;
    let (deltas, _) = collect(receiver).await;

    assert!(!deltas.is_empty());
    for pair in deltas.windows(2) {
        let [previous, next] = pair else {
            panic!("windows(2) yields pairs");
        };
        assert!(
            next.starts_with(previous.as_str()),
            "{next:?} does not extend {previous:?}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_empty_override_keeps_configured_system_message() -> Result<()> {
    let router = hello_router();

    let receiver = router.route("GPT4", "hi", 800, "", None, None).await?;
    collect(receiver).await;

    let transcript = router.transcript("GPT4").expect("transcript handle");
    assert_eq!(
        transcript
            .lock()
            .await
            .messages()
            .first()
            .expect("system entry")
            .content,
        Content::Text(SYSTEM.to_string())
    );

    Ok(())
}

#[tokio::test]
async fn test_override_replaces_only_system_entry() -> Result<()> {
    let router = hello_router();

    let receiver = router.route("GPT4", "first", 800, "", None, None).await?;
    collect(receiver).await;

    let receiver = router
        .route("GPT4", "second", 800, "Answer briefly.", None, None)
        .await?;
    collect(receiver).await;

    let transcript = router.transcript("GPT4").expect("transcript handle");
    let transcript = transcript.lock().await;
    let messages = transcript.messages();

    assert_eq!(
        messages.first().expect("system entry").content,
        Content::Text("Answer briefly.".to_string())
    );
    // The earlier exchange behind the system entry is untouched
    assert_eq!(
        messages.get(1).expect("first user entry").content,
        Content::Text("first".to_string())
    );

    Ok(())
}

#[tokio::test]
async fn test_single_shot_backend_yields_exactly_one_delta() -> Result<()> {
    let backend = Arc::new(SingleShotBackend {
        answer: "a red apple",
    });
    let router = SessionRouter::from_clients(vec![(
        "GPT4 Vision".to_string(),
        ModelClient::with_backend(backend, SYSTEM),
    )]);

    let receiver = router
        .route("GPT4 Vision", "what is this?", 800, "", None, None)
        .await?;
    let (deltas, terminal) = collect(receiver).await;

    assert_eq!(deltas, vec!["a red apple"]);
    assert!(matches!(terminal, Some(AnswerEvent::Done(_))));

    Ok(())
}

#[tokio::test]
async fn test_file_content_is_appended_to_the_message() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(b" and the attached notes")?;

    // Echo the question back so the dispatched text is observable
    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn run(
            &self,
            _transcript: &Mutex<Transcript>,
            question: &str,
            _max_tokens: u32,
            _image: Option<&Path>,
            updates: &mpsc::Sender<AnswerEvent>,
        ) -> Result<String, LlmError> {
            let _ = updates
                .send(AnswerEvent::Delta(question.to_string()))
                .await;
            Ok(question.to_string())
        }
    }

    let router = SessionRouter::from_clients(vec![(
        "GPT4".to_string(),
        ModelClient::with_backend(Arc::new(EchoBackend), SYSTEM),
    )]);

    let receiver = router
        .route(
            "GPT4",
            "summarize this",
            800,
            "",
            None,
            Some(file.path().to_path_buf()),
        )
        .await?;
    let (_, terminal) = collect(receiver).await;

    match terminal {
        Some(AnswerEvent::Done(answer)) => {
            assert_eq!(answer, "summarize this and the attached notes");
        }
        other => panic!("expected Done terminal, got {other:?}"),
    }

    // The history records the bare message, not the concatenation
    let history = router.history("GPT4").await?;
    assert_eq!(history.first().expect("record").message, "summarize this");

    Ok(())
}

#[tokio::test]
async fn test_missing_attachment_surfaces_before_dispatch() -> Result<()> {
    let router = hello_router();

    let err = router
        .route(
            "GPT4",
            "hi",
            800,
            "",
            None,
            Some(std::path::PathBuf::from("no-such-attachment.txt")),
        )
        .await
        .expect_err("missing attachment must fail");
    assert!(err.to_string().contains("no-such-attachment.txt"));

    // Nothing reached the client
    let transcript = router.transcript("GPT4").expect("transcript handle");
    assert_eq!(transcript.lock().await.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_provider_failure_is_forwarded_and_skips_history() -> Result<()> {
    let router = SessionRouter::from_clients(vec![(
        "GPT4".to_string(),
        ModelClient::with_backend(Arc::new(FailingBackend), SYSTEM),
    )]);

    let receiver = router.route("GPT4", "hi", 800, "", None, None).await?;
    let (deltas, terminal) = collect(receiver).await;

    assert!(deltas.is_empty());
    match terminal {
        Some(AnswerEvent::Failed(error)) => {
            assert!(error.to_string().contains("connection refused"));
        }
        other => panic!("expected Failed terminal, got {other:?}"),
    }

    assert!(router.history("GPT4").await?.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reset_inputs_waits_the_fixed_delay() {
    let router = hello_router();

    let before = tokio::time::Instant::now();
    router.reset_inputs().await;
    let elapsed = before.elapsed();

    assert!(elapsed >= web_gpt_rs::config::RESET_INPUT_DELAY);
}
