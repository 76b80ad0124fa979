//! Application entry point: a terminal front end for the loan assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run), apply env overrides.
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the HTTP orchestrator client, the JSON session store and the
//!    cpal audio source, and hand them to [`ConversationEngine`].
//! 5. Spawn the event printer and the voice pump.
//! 6. Bootstrap the conversation, then read commands from stdin until
//!    `/quit` or EOF.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use loan_chat_client::{
    audio::CpalAudioSource,
    config::{AppConfig, AppPaths},
    engine::{CaptureState, ConversationEngine, EngineEvent, UploadState},
    orchestrator::HttpOrchestrator,
    session::{ConversationSession, JsonFileStore, Language, Message, Sender},
};

const HELP: &str = "\
commands:
  <text>           send a message
  /upload <path>   upload a salary slip (PDF)
  /voice           start recording, or stop and send
  /cancel          discard the current recording
  /sanction        generate the sanction letter
  /accept          accept the sanction letter
  /status          show progress and loan terms
  /reset           start a new conversation
  /lang en|ta      switch language
  /help            show this help
  /quit            exit";

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Text(String),
    Upload(String),
    Voice,
    Cancel,
    Sanction,
    Accept,
    Status,
    Reset,
    Lang(Option<Language>),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Text(line.to_string()));
    }

    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };
    Some(match cmd {
        "/upload" if !arg.is_empty() => Command::Upload(arg.to_string()),
        "/voice" => Command::Voice,
        "/cancel" => Command::Cancel,
        "/sanction" => Command::Sanction,
        "/accept" => Command::Accept,
        "/status" => Command::Status,
        "/reset" => Command::Reset,
        "/lang" => Command::Lang(Language::parse(arg)),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_message(m: &Message) -> String {
    let who = match (m.sender, m.agent.as_deref()) {
        (Sender::User, _) => "you".to_string(),
        (Sender::Assistant, Some(agent)) => format!("assistant/{agent}"),
        (Sender::Assistant, None) => "assistant".to_string(),
    };
    let mut line = format!("[{}] {who}: {}", m.timestamp.format("%H:%M"), m.content);
    if let Some(status) = m.status {
        line.push_str(&format!("  <{status:?}>"));
    }
    line
}

fn render_event(event: &EngineEvent) -> Option<String> {
    Some(match event {
        EngineEvent::MessageAppended(m) => render_message(m),
        EngineEvent::MessageUpdated(m) => format!("{} (updated)", render_message(m)),
        EngineEvent::ModeChanged { to, .. } => format!("-- {} --", to.label()),
        EngineEvent::UploadProgress {
            file_name,
            state,
            progress,
        } => match state {
            UploadState::Uploading => format!("   uploading {file_name}: {:.0}%", progress * 100.0),
            UploadState::Succeeded => format!("   uploaded {file_name}"),
            UploadState::Failed => format!("   upload of {file_name} failed"),
            UploadState::Selected => return None,
        },
        EngineEvent::Processing(step) => format!("   {}...", step.label()),
        EngineEvent::Explainability(panel) => {
            let mut out = format!(
                "   decision: {}",
                panel.decision.as_deref().unwrap_or("pending")
            );
            if let Some(score) = panel.credit_score {
                out.push_str(&format!(", credit score {score:.0}"));
            }
            for reason in &panel.reasoning {
                out.push_str(&format!("\n     - {reason}"));
            }
            out
        }
        EngineEvent::SanctionReference(number) => format!("   sanction reference {number}"),
        EngineEvent::SanctionLetter(letter) => format!(
            "   sanction letter {}: {:.0} over {} months at {}% (EMI {:.0}), valid until {}\n     {}",
            letter.sanction_number,
            letter.amount,
            letter.tenure_months,
            letter.rate_percent,
            letter.emi,
            letter.valid_until,
            letter.pdf_url
        ),
        EngineEvent::Disbursed(receipt) => format!(
            "   {} {:.0} (fee {:.0}), transaction {}",
            receipt.status, receipt.net_disbursed, receipt.processing_fee, receipt.transaction_id
        ),
        EngineEvent::Voice(CaptureState::Recording) => "   recording... (/voice to send)".into(),
        EngineEvent::Voice(_) => return None,
        EngineEvent::Notice(text) => format!("   {text}"),
        EngineEvent::SessionReset { session_id } => format!("-- new session {session_id} --"),
    })
}

fn render_status(session: &ConversationSession, busy: bool) -> String {
    let mut out = format!(
        "   session {} ({}), stage {}, mode {}, {} messages{}",
        session.id,
        session.wire_id(),
        session.stage().unwrap_or("-"),
        session.mode.label(),
        session.transcript.len(),
        if busy { ", waiting for reply" } else { "" }
    );
    let state = &session.state;
    if let Some(amount) = state.loan_amount() {
        out.push_str(&format!("\n   loan {amount:.0}"));
        if let Some(months) = state.tenure_months() {
            out.push_str(&format!(" over {months} months"));
        }
        if let Some(rate) = state.personalized_rate() {
            out.push_str(&format!(" at {rate}%"));
        }
        if let Some(emi) = state.emi() {
            out.push_str(&format!(" (EMI {emi:.0})"));
        }
    }
    match state.kyc_verified() {
        Some(true) => out.push_str("\n   KYC verified"),
        Some(false) => out.push_str("\n   KYC pending"),
        None => {}
    }
    if let Some(score) = state.credit_score() {
        out.push_str(&format!("\n   credit score {score:.0}"));
    }
    out
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run `command`.  Exchanges are spawned so the prompt stays responsive and
/// a second submission sees the engine busy.  Returns `false` on quit.
fn dispatch(engine: &Arc<ConversationEngine>, command: Command) -> bool {
    let engine = Arc::clone(engine);
    match command {
        Command::Text(text) => {
            tokio::spawn(async move {
                if let Err(e) = engine.send_text(&text).await {
                    println!("   {e}");
                }
            });
        }
        Command::Upload(path) => {
            tokio::spawn(async move {
                if let Err(e) = engine.upload_document(Path::new(&path)).await {
                    println!("   {e}");
                }
            });
        }
        Command::Voice if engine.voice_state() == CaptureState::Recording => {
            tokio::spawn(async move {
                if let Err(e) = engine.stop_voice().await {
                    println!("   {e}");
                }
            });
        }
        Command::Voice => {
            if let Err(e) = engine.start_voice() {
                println!("   {e}");
            }
        }
        Command::Cancel => {
            if engine.cancel_voice() {
                println!("   recording discarded");
            }
        }
        Command::Sanction => {
            tokio::spawn(async move {
                if let Err(e) = engine.generate_sanction_letter().await {
                    println!("   {e}");
                }
            });
        }
        Command::Accept => {
            tokio::spawn(async move {
                if let Err(e) = engine.accept_sanction().await {
                    println!("   {e}");
                }
            });
        }
        Command::Status => println!("{}", render_status(&engine.session(), engine.is_busy())),
        Command::Reset => {
            engine.reset();
            tokio::spawn(async move {
                if let Err(e) = engine.bootstrap().await {
                    println!("   {e}");
                }
            });
        }
        Command::Lang(Some(language)) => {
            engine.set_language(language);
            println!("   language set to {}", language.code());
        }
        Command::Lang(None) => println!("   usage: /lang en|ta"),
        Command::Help => println!("{HELP}"),
        Command::Unknown(line) => println!("   unknown command {line:?}; /help for help"),
        Command::Quit => return false,
    }
    true
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store_path = AppPaths::new().session_file(&config.session.file_name);
    log::info!("Session file: {}", store_path.display());
    log::info!("Orchestrator: {}", config.orchestrator.base_url);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(
        ConversationEngine::new(
            Arc::new(HttpOrchestrator::from_config(&config.orchestrator)),
            Arc::new(JsonFileStore::new(store_path)),
            Arc::new(CpalAudioSource::new()),
            config,
        )
        .with_events(event_tx),
    );

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Some(line) = render_event(&event) {
                println!("{line}");
            }
        }
    });

    // Voice pump: move captured audio into the recording buffer.
    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                ticker.tick().await;
                if engine.voice_state() == CaptureState::Recording {
                    let _ = engine.poll_voice();
                }
            }
        });
    }

    for message in &engine.session().transcript {
        println!("{}", render_message(message));
    }
    if let Err(e) = engine.bootstrap().await {
        println!("   {e}");
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            continue;
        };
        if !dispatch(&engine, command) {
            break;
        }
    }

    engine.cancel_voice();
    log::info!("Loan chat client shutting down");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Loan chat client starting up");

    // 2. Configuration
    let config = AppConfig::load()
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        })
        .with_env_overrides();

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(run(config))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse_command("  I need a loan  "),
            Some(Command::Text("I need a loan".into()))
        );
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(
            parse_command("/upload  ~/slips/june.pdf"),
            Some(Command::Upload("~/slips/june.pdf".into()))
        );
        assert_eq!(parse_command("/voice"), Some(Command::Voice));
        assert_eq!(parse_command("/lang ta"), Some(Command::Lang(Some(Language::Ta))));
        assert_eq!(parse_command("/lang xx"), Some(Command::Lang(None)));
        assert_eq!(parse_command("/exit"), Some(Command::Quit));
    }

    #[test]
    fn upload_without_path_is_unknown() {
        assert!(matches!(parse_command("/upload"), Some(Command::Unknown(_))));
    }

    #[test]
    fn assistant_messages_show_agent_and_status() {
        let msg = Message::assistant("Approved")
            .with_agent(Some("underwriting".into()))
            .with_status(Some(loan_chat_client::session::StatusTag::Approved));
        let line = render_message(&msg);
        assert!(line.contains("assistant/underwriting: Approved"));
        assert!(line.ends_with("<Approved>"));
    }

    #[test]
    fn status_lists_known_loan_terms() {
        let mut session = ConversationSession::new();
        let state = serde_json::json!({
            "stage": "UNDERWRITING",
            "loan_amount": 500000,
            "tenure": 60,
            "offer": { "personalized_rate": 10.5, "emi": 10747.0 },
            "kyc": { "verified": true }
        });
        session.state = loan_chat_client::orchestrator::OrchestratorState::from_map(
            state.as_object().unwrap().clone(),
        );

        let out = render_status(&session, true);
        assert!(out.contains("stage UNDERWRITING"));
        assert!(out.contains("waiting for reply"));
        assert!(out.contains("loan 500000 over 60 months at 10.5% (EMI 10747)"));
        assert!(out.contains("KYC verified"));
        assert!(!out.contains("credit score"));
    }

    #[test]
    fn status_of_a_fresh_session_has_no_terms() {
        let out = render_status(&ConversationSession::new(), false);
        assert!(out.contains("stage -"));
        assert!(!out.contains("loan"));
        assert!(!out.contains("KYC"));
    }
}
