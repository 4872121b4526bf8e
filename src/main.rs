use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ser_capture::audio::{encode_wav, AudioFile, FileBackend, LevelMeter};
use ser_capture::client::HEALTH_PATH;
use ser_capture::config::DEFAULT_CONFIG_PATH;
use ser_capture::{
    relay, report, AnalysisSession, AppState, AudioBackend, AudioBackendConfig,
    AudioBackendFactory, AudioSource, CaptureController, Config, InferenceClient, Upload,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ser-capture", version, about = "Record or upload speech and report its emotions")]
struct Cli {
    /// Config file path (extension optional)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pass-through relay in front of the inference service
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Record a clip, show the live level meter, then analyze it
    Record {
        /// Stop after this many seconds instead of waiting for Enter
        #[arg(long)]
        seconds: Option<f64>,
        /// Replay a WAV file instead of the microphone
        #[arg(long)]
        from: Option<PathBuf>,
        /// Also write the encoded WAV here
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Upload an existing audio file for analysis
    Analyze { file: PathBuf },
    /// Re-encode a WAV file as 16-bit mono PCM without uploading
    Encode {
        #[arg(long)]
        from: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Backend: {}", cfg.backend.base_url);

    match cli.command {
        Command::Serve { bind, port } => serve(cfg, bind, port).await,
        Command::Record { seconds, from, save } => record(&cfg, seconds, from, save).await,
        Command::Analyze { file } => analyze(&cfg, &file).await,
        Command::Encode { from, out } => encode(&from, &out),
        Command::Devices => devices(),
    }
}

async fn serve(mut cfg: Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(bind) = bind {
        cfg.relay.http.bind = bind;
    }
    if let Some(port) = port {
        cfg.relay.http.port = port;
    }
    check_backend(&InferenceClient::new(&cfg.backend)?).await;
    let state = AppState::from_config(&cfg)?;
    relay::serve(&cfg.relay_addr(), state).await
}

/// Warn early when the inference service is not answering
async fn check_backend(client: &InferenceClient) {
    if client.health(HEALTH_PATH).await {
        info!("Inference backend {} is up", client.base_url());
    } else {
        warn!(
            "Inference backend {} is not answering; uploads will fail until it is up",
            client.base_url()
        );
    }
}

/// Redraw the level meter on a fixed cadence from the latest captured block
fn spawn_meter(mut feed: watch::Receiver<Vec<f32>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut meter = LevelMeter::new();
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let block = feed.borrow_and_update().clone();
            meter.tick(&block);
            let mut err = std::io::stderr();
            let _ = write!(err, "\r{}", meter.render());
            let _ = err.flush();
        }
    })
}

async fn wait_for_stop(limit: Option<Duration>) -> Result<()> {
    match limit {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            eprintln!("Recording... press Enter to stop");
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            tokio::select! {
                line = lines.next_line() => { line.context("Failed to read stdin")?; }
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
    Ok(())
}

async fn record(
    cfg: &Config,
    seconds: Option<f64>,
    from: Option<PathBuf>,
    save: Option<PathBuf>,
) -> Result<()> {
    let backend_config = AudioBackendConfig {
        block_size: cfg.audio.block_size,
        realtime: true,
    };

    let (backend, mut limit): (Box<dyn AudioBackend>, Option<Duration>) = match from {
        Some(path) => {
            let file = FileBackend::open(&path, backend_config)?;
            let duration = file.duration();
            (Box::new(file), Some(duration))
        }
        None => (AudioBackendFactory::create(AudioSource::Microphone, backend_config)?, None),
    };
    if let Some(secs) = seconds {
        limit = Some(Duration::from_secs_f64(secs.max(0.0)));
    }

    let client = InferenceClient::new(&cfg.backend)?;
    check_backend(&client).await;

    let mut controller = CaptureController::new(backend);
    controller.start().await?;

    let meter = spawn_meter(
        controller.level_feed(),
        Duration::from_millis(cfg.audio.meter_interval_ms.max(1)),
    );
    let waited = wait_for_stop(limit).await;
    meter.abort();
    eprintln!();

    let output = controller.stop().await?;
    waited?;
    let output = output.context("Recording never started")?;

    eprintln!(
        "Captured {:.1}s ({} samples at {}Hz)",
        output.summary.duration.as_secs_f64(),
        output.summary.sample_count,
        output.summary.sample_rate
    );

    if let Some(path) = save {
        std::fs::write(&path, output.wav.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved recording to {}", path.display());
    }

    submit(client, Upload::recording(output.wav)).await
}

async fn analyze(cfg: &Config, file: &Path) -> Result<()> {
    let upload = Upload::from_path(file)?;
    submit(InferenceClient::new(&cfg.backend)?, upload).await
}

async fn submit(client: InferenceClient, upload: Upload) -> Result<()> {
    let session = AnalysisSession::new(client);
    match session.submit(upload).await {
        Ok(result) => {
            print!("{}", report::render(&result));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
    }
}

fn encode(from: &Path, out: &Path) -> Result<()> {
    let audio = AudioFile::open(from)?;
    let wav = encode_wav(&audio.samples, audio.sample_rate)?;
    std::fs::write(out, wav.as_bytes()).with_context(|| format!("Failed to write {}", out.display()))?;
    info!(
        "Encoded {} samples at {}Hz into {} ({} bytes)",
        wav.sample_count(),
        wav.sample_rate(),
        out.display(),
        wav.len()
    );
    Ok(())
}

fn devices() -> Result<()> {
    #[cfg(feature = "microphone")]
    {
        for name in ser_capture::audio::microphone::list_input_devices() {
            println!("{}", name);
        }
        Ok(())
    }

    #[cfg(not(feature = "microphone"))]
    {
        anyhow::bail!("built without the `microphone` feature")
    }
}
