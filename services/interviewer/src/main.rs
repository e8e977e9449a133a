use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use interview_audio::{AudioConfig, AudioError, AudioSession, RecognitionBackend, SynthesisBackend};
use interviewer_service::audio_in::CpalInput;
use interviewer_service::audio_out::CpalOutput;
use interviewer_service::config::Config;
use interviewer_service::deepgram_adapter::{DeepgramRecognition, DeepgramSynthesis};
use interviewer_service::fillers;
use tracing_subscriber::fmt::time::ChronoLocal;

const CHECK_PHRASE: &str = "Audio check. If you can hear this, the speaker works.";
/// Pause between filler synthesis requests.
const CACHE_REQUEST_PAUSE: Duration = Duration::from_millis(1500);

#[derive(Parser)]
#[command(version, about = "Voice interview audio service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available audio input and output devices.
    Devices,
    /// Speak a test phrase, then start and stop recognition.
    Check,
    /// Speak a prompt, listen for the answer and repeat it back.
    Converse {
        /// How many question/answer turns to run.
        #[arg(long, default_value_t = 3)]
        turns: usize,
        /// The opening question.
        #[arg(long, default_value = "Hi! Could you start by telling me a little about yourself?")]
        prompt: String,
    },
    /// Synthesize the filler clips into the audio cache directory.
    CacheFillers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting interviewer service...");

    // --- 3. Parse Command-Line Arguments ---
    let cli = Cli::parse();
    let audio = config.audio_config();

    match cli.command {
        Command::Devices => list_devices(),
        Command::Check => run_check(&config, audio).await,
        Command::Converse { turns, prompt } => run_converse(&config, audio, turns, prompt).await,
        Command::CacheFillers => {
            let backend = DeepgramSynthesis::new(&config.deepgram_api_key, &audio.synthesis);
            let report = fillers::cache_fillers(
                &backend,
                &config.audio_cache_dir,
                audio.synthesis.sample_rate,
                CACHE_REQUEST_PAUSE,
            )
            .await?;
            tracing::info!(
                "Audio cache generation complete: {} created, {} skipped, {} failed",
                report.created.len(),
                report.skipped,
                report.failed
            );
            Ok(())
        }
    }
}

fn list_devices() -> Result<()> {
    println!("Input devices:");
    println!("{}", interview_native_utils::device::get_available_inputs()?);
    println!("Output devices:");
    println!("{}", interview_native_utils::device::get_available_outputs()?);
    Ok(())
}

async fn open_session(config: &Config, audio: AudioConfig) -> Result<AudioSession> {
    let output = CpalOutput::new(config.output_device.clone(), audio.playback.sample_rate);
    let input = CpalInput::new(
        config.input_device.clone(),
        audio.recognition.sample_rate,
        audio.recognizer.frame_samples,
    );
    let synthesis: Arc<dyn SynthesisBackend> = Arc::new(DeepgramSynthesis::new(
        &config.deepgram_api_key,
        &audio.synthesis,
    ));
    let recognition: Arc<dyn RecognitionBackend> = Arc::new(DeepgramRecognition::new(
        &config.deepgram_api_key,
        &audio.recognition,
    ));

    AudioSession::start(
        audio,
        Box::new(output),
        Box::new(input),
        synthesis,
        recognition,
    )
    .await
    .context("Failed to start audio session")
}

async fn run_check(config: &Config, audio: AudioConfig) -> Result<()> {
    let session = open_session(config, audio).await?;

    let result = async {
        session
            .speak(CHECK_PHRASE, false)
            .await
            .context("Failed to speak test phrase")?;
        session.wait_for_drain().await;
        let heard = session.listen(Some(Duration::from_secs(2))).await?;
        tracing::debug!("Heard during check: {:?}", heard);
        anyhow::Ok(())
    }
    .await;

    session.close().await;
    result?;

    let stats = session.playback_stats();
    tracing::info!(
        "Audio check passed: {} jobs played, {} failed",
        stats.completed,
        stats.failed
    );
    println!("Audio check passed.");
    Ok(())
}

/// Lets the conversation carry on past a failed utterance. Only a closed
/// session ends it.
fn tolerate_speech_failure(result: Result<(), AudioError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(AudioError::Closed) => Err(AudioError::Closed).context("Audio session closed"),
        Err(e) if e.is_retryable() => {
            tracing::warn!("Speech failed, continuing with the next turn: {}", e);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Speech failed: {}", e);
            Ok(())
        }
    }
}

async fn run_converse(
    config: &Config,
    audio: AudioConfig,
    turns: usize,
    prompt: String,
) -> Result<()> {
    let session = open_session(config, audio).await?;

    let mut transcripts = session.subscribe_transcripts();
    let interims = tokio::spawn(async move {
        while let Ok(transcript) = transcripts.recv().await {
            if !transcript.is_final && !transcript.text.is_empty() {
                tracing::debug!("Interim: {}", transcript.text);
            }
        }
    });

    let conversation = async {
        let mut question = prompt;
        for turn in 1..=turns {
            tracing::info!("Turn {}/{}", turn, turns);
            tolerate_speech_failure(session.speak(&question, turn > 1).await)?;
            session.wait_for_drain().await;

            let answer = session.listen(Some(config.listening_window)).await?;
            if answer.is_empty() {
                tracing::warn!("No answer heard within {:?}", config.listening_window);
                tolerate_speech_failure(session.notify().await)?;
                question = "Sorry, I didn't catch that. Could you say it again?".to_string();
            } else {
                println!("Candidate: {answer}");
                question = format!("You said: {answer}. Tell me more.");
            }
        }
        tolerate_speech_failure(session.speak("Thanks, that's all for today.", false).await)?;
        session.wait_for_drain().await;
        anyhow::Ok(())
    };

    let result = tokio::select! {
        result = conversation => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    };

    session.close().await;
    interims.abort();
    result
}
