//! SceneCast command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scast_models::{EncodingConfig, IdentityRole, QualityPreset, VideoBackend};
use scast_providers::{
    AnthropicClient, ElevenLabsClient, FalClient, FalVideoEngine, GeminiClient, LanguageModel,
    LanguageModelKind, LumaClient, VideoEngine,
};
use scast_pipeline::{
    EnvironmentSource, FfmpegEditor, GenerationRequest, IdentityRegistry, Pipeline,
    PipelineConfig, PipelineError, Services, TrainingFlow,
};

#[derive(Debug, Parser)]
#[command(name = "scenecast", version, about = "Turn a script and a few photos into a short video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train an identity model from a zip archive of photos
    Train(TrainArgs),
    /// List trained identity models
    Identities {
        /// Only show one role
        #[arg(long)]
        role: Option<IdentityRole>,
    },
    /// Generate a video from a script
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Zip archive of training images
    #[arg(long)]
    images: PathBuf,
    #[arg(long)]
    trigger_word: String,
    #[arg(long, default_value = "character")]
    role: IdentityRole,
    #[arg(long)]
    steps: Option<u32>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// File containing the script
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    script: Option<PathBuf>,
    /// Script text given inline
    #[arg(long)]
    text: Option<String>,
    /// Character trigger word
    #[arg(long)]
    character: String,
    /// Environment trigger word
    #[arg(long)]
    environment: Option<String>,
    /// Object trigger word
    #[arg(long)]
    object: Option<String>,
    /// "N scenes", "up to N scenes" or "auto"
    #[arg(long, default_value = "auto")]
    preset: QualityPreset,
    #[arg(long, default_value = "engine_a")]
    backend: VideoBackend,
    #[arg(long, default_value = "gemini")]
    llm: LanguageModelKind,
    /// Generate per-scene sound effects
    #[arg(long)]
    audio: bool,
    /// Add a voice-over narration
    #[arg(long)]
    narration: bool,
    /// Plan the scenes and stop
    #[arg(long)]
    metadata_only: bool,
    /// Custom prompt for the environment palette
    #[arg(long, conflicts_with = "no_environments")]
    environment_prompt: Option<String>,
    /// Plan without an environment palette
    #[arg(long)]
    no_environments: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let result = match cli.command {
        Command::Train(args) => train(config, args).await,
        Command::Identities { role } => identities(config, role).await,
        Command::Generate(args) => generate(config, args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn train(config: PipelineConfig, args: TrainArgs) -> anyhow::Result<()> {
    let mut registry = IdentityRegistry::load(&config.registry_dir).await?;
    let fal = Arc::new(FalClient::from_env()?);

    let flow = TrainingFlow::new(fal.clone(), fal)
        .with_steps(args.steps.unwrap_or(config.training_steps))
        .with_upload_timeout(config.call_timeout);

    let model = flow
        .train(&mut registry, &args.images, &args.trigger_word, args.role)
        .await
        .context("training failed")?;

    info!(
        trigger_word = %model.trigger_word,
        role = %model.role,
        weights = %model.remote_handle,
        "Identity model ready"
    );
    Ok(())
}

async fn identities(config: PipelineConfig, role: Option<IdentityRole>) -> anyhow::Result<()> {
    let registry = IdentityRegistry::load(&config.registry_dir).await?;
    for model in registry.all().filter(|m| role.map_or(true, |r| m.role == r)) {
        info!(
            role = %model.role,
            trigger_word = %model.trigger_word,
            created_at = %model.created_at,
            "Identity model"
        );
    }
    info!(count = registry.len(), dir = %registry.dir().display(), "Identity registry");
    Ok(())
}

async fn generate(config: PipelineConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let script = match (&args.script, &args.text) {
        (Some(path), _) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading script {}", path.display()))?,
        (None, Some(text)) => text.clone(),
        (None, None) => bail!("either --script or --text is required"),
    };

    // Loaded once; generation only reads it.
    let registry = IdentityRegistry::load(&config.registry_dir).await?;
    let selection = registry.select(
        &args.character,
        args.environment.as_deref(),
        args.object.as_deref(),
    )?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling run");
            cancel_tx.send(true).ok();
        }
    });

    let services = build_services(&config, &args, cancel_rx.clone())?;
    let pipeline = Pipeline::new(config, services);

    let environments = if args.no_environments {
        EnvironmentSource::Disabled
    } else if let Some(prompt) = args.environment_prompt.clone() {
        EnvironmentSource::CustomPrompt(prompt)
    } else {
        EnvironmentSource::Generate
    };

    let mut request = GenerationRequest::new(script, selection)
        .with_preset(args.preset)
        .with_environments(environments)
        .with_audio(args.audio)
        .with_narration(args.narration);
    if args.metadata_only {
        request = request.metadata_only();
    }

    match pipeline.run(&request, cancel_rx).await {
        Ok(output) => {
            match (&output.manifest, &output.video) {
                (Some(manifest), Some(video)) => info!(
                    run_id = %output.run_id,
                    included = ?manifest.included(),
                    excluded = ?manifest.excluded(),
                    output = %video.output_reference.display(),
                    "Video ready"
                ),
                _ => info!(
                    run_id = %output.run_id,
                    scenes = output.scenes.len(),
                    run_dir = %output.run_dir.display(),
                    "Scene plan written"
                ),
            }
            Ok(())
        }
        Err(e) => {
            if let Some(manifest) = e.manifest() {
                warn!(excluded = ?manifest.excluded(), "Run ended without a video");
            }
            if matches!(e, PipelineError::Cancelled { .. }) {
                warn!("Run cancelled");
            }
            Err(e.into())
        }
    }
}

fn build_services(
    config: &PipelineConfig,
    args: &GenerateArgs,
    cancel_rx: watch::Receiver<bool>,
) -> anyhow::Result<Services> {
    let llm: Arc<dyn LanguageModel> = match args.llm {
        LanguageModelKind::Gemini => Arc::new(GeminiClient::from_env()?),
        LanguageModelKind::Claude => Arc::new(AnthropicClient::from_env()?),
    };

    let fal = FalClient::from_env()?;
    let video: Arc<dyn VideoEngine> = match args.backend {
        VideoBackend::EngineA => Arc::new(LumaClient::from_env()?),
        backend => Arc::new(FalVideoEngine::new(fal.clone(), backend)?),
    };

    let (sound, speech) = if args.audio || args.narration {
        let eleven = Arc::new(ElevenLabsClient::from_env()?);
        (
            args.audio.then(|| eleven.clone() as Arc<dyn scast_providers::SoundEffects>),
            args.narration
                .then(|| eleven as Arc<dyn scast_providers::SpeechSynthesizer>),
        )
    } else {
        (None, None)
    };

    let encoding = EncodingConfig::default()
        .with_height(args.backend.capabilities().max_resolution.height());
    let editor = FfmpegEditor::new(encoding)
        .with_timeout(config.ffmpeg_timeout_secs)
        .with_cancel(cancel_rx);

    let fal = Arc::new(fal);
    Ok(Services {
        llm,
        frames: fal.clone(),
        video,
        store: fal,
        sound,
        speech,
        editor: Arc::new(editor),
    })
}
