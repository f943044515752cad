use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parley_gateway::api::{ApiServer, ApiState};
use parley_gateway::attachments::VisionClient;
use parley_gateway::dialogue::VoiceflowClient;
use parley_gateway::voice::{SpeechToText, TextToSpeech};
use parley_gateway::{Config, Services, SessionRegistry, TurnOrchestrator};

/// Parley - Voice and text chat gateway for a hosted dialogue agent
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Directory with the web UI to serve
    #[arg(long, env = "PARLEY_STATIC_DIR")]
    static_dir: Option<std::path::PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Values in .env do not override variables already set
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley_gateway=info",
        1 => "info,parley_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let transcriber =
        SpeechToText::new(config.api_keys.openai.clone(), config.voice.stt_model.clone())?
            .with_base_url(config.voice.stt_base_url.clone());
    let synthesizer = TextToSpeech::new(config.api_keys.elevenlabs.clone(), &config.voice)?;
    let dialogue = VoiceflowClient::new(config.api_keys.voiceflow.clone(), &config.dialogue)?;
    let captioner = VisionClient::new(config.api_keys.openai.clone(), &config.vision)?;

    let services = Services {
        transcriber: Arc::new(transcriber),
        dialogue: Arc::new(dialogue),
        synthesizer: Arc::new(synthesizer),
        captioner: Arc::new(captioner),
    };

    let sessions = Arc::new(SessionRegistry::new());
    let orchestrator = Arc::new(TurnOrchestrator::new(services, sessions));
    let state = Arc::new(ApiState::new(
        orchestrator,
        config.auth.clone(),
        config.server.upload_dir.clone(),
    ));

    let port = cli.port.unwrap_or(config.server.port);
    let static_dir = cli.static_dir.or_else(|| config.server.static_dir.clone());

    tracing::info!(
        port,
        stt_model = %config.voice.stt_model,
        tts_model = %config.voice.tts_model,
        vision_model = %config.vision.model,
        upload_dir = %config.server.upload_dir.display(),
        "starting parley gateway"
    );
    if let Some(url) = &config.server.public_url {
        tracing::info!(url = %url, "public URL");
    }

    ApiServer::new(state, port)
        .static_dir(static_dir)
        .session_grace(config.server.session_grace)
        .run()
        .await?;

    Ok(())
}
