//! maskwatch - classify mask wearing on a streamed tensor feed.
//!
//! This binary:
//! 1. Loads configuration (file, environment, then flags)
//! 2. Loads the classifier once and shares it with the pipeline
//! 3. Opens the HTTP frame stream (or a captured replay)
//! 4. Runs every frame through crop, classify, vote
//! 5. Renders the annotated frame to a window or the log

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use maskwatch::config::MaskwatchConfig;
use maskwatch::ingest::{FrameStream, ReplaySource};
use maskwatch::{
    request_stop, run_stream, run_stream_queued, AnnotationSink, Classifier, LogSink, ModelArch,
    Pipeline, StopReason, StubClassifier,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// ONNX model executed with tract.
    Tract,
    /// Fixed-class classifier for dry runs.
    Stub,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Classify mask wearing on a streamed tensor feed"
)]
struct Args {
    /// Config file (.toml or .json); defaults to MASKWATCH_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame stream endpoint.
    #[arg(long)]
    url: Option<String>,

    /// Milliseconds between frames requested from the server.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of frames requested from the server.
    #[arg(long)]
    count: Option<u64>,

    /// Classifier architecture (resnet34 or mobilenet_v3_small).
    #[arg(long)]
    arch: Option<ModelArch>,

    /// ONNX model file; defaults to the architecture's model path.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Inference backend.
    #[arg(long, value_enum, env = "MASKWATCH_BACKEND", default_value = "tract")]
    backend: Backend,

    /// Class index returned by the stub backend.
    #[arg(long, default_value = "0")]
    stub_class: usize,

    /// Replay a captured stream from a file ("-" for stdin) instead of HTTP.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Bounded queue depth between reader and inference (0 = synchronous).
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Log verdicts instead of opening a window.
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match args.config.as_deref() {
        Some(path) => MaskwatchConfig::load_from(Some(path))?,
        None => MaskwatchConfig::load()?,
    };
    apply_args(&mut cfg, &args);
    cfg.validate()?;

    let classifier = load_classifier(&cfg, &args)?;
    let pipeline = Pipeline::new(classifier);
    log::info!(
        "classifier {} ready ({}x{} input)",
        pipeline.classifier().name(),
        pipeline.classifier().input_size(),
        pipeline.classifier().input_size()
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        if request_stop(&handler_stop) {
            log::warn!("second interrupt; exiting without waiting for the stream");
            std::process::exit(130);
        }
        log::info!("stopping after the current frame; press Ctrl-C again to exit now");
    })?;

    let frames = open_frames(&cfg, &args)?;
    let mut sink = open_sink(&cfg)?;

    let result = if cfg.queue_capacity == 0 {
        run_stream(frames, &pipeline, sink.as_mut(), &stop)
    } else {
        log::info!("bounded queue enabled (capacity {})", cfg.queue_capacity);
        run_stream_queued(frames, &pipeline, sink.as_mut(), stop, cfg.queue_capacity)
    };

    match result {
        Ok((summary, reason)) => {
            let why = match reason {
                StopReason::StreamEnded => "stream ended",
                StopReason::Interrupted => "interrupted",
                StopReason::SinkClosed => "display closed",
            };
            log::info!(
                "maskwatch stopped ({}): {} frames, {} correct, {} incorrect",
                why,
                summary.frames,
                summary.correct,
                summary.incorrect
            );
            Ok(())
        }
        Err(err) => Err(anyhow!("frame stream failed: {}", err)),
    }
}

fn apply_args(cfg: &mut MaskwatchConfig, args: &Args) {
    if let Some(url) = &args.url {
        cfg.stream.url = url.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        cfg.stream.interval_ms = interval_ms;
    }
    if let Some(count) = args.count {
        cfg.stream.count = count;
    }
    if let Some(arch) = args.arch {
        cfg.model.arch = arch;
    }
    if let Some(model) = &args.model {
        cfg.model.path = Some(model.clone());
    }
    if let Some(capacity) = args.queue_capacity {
        cfg.queue_capacity = capacity;
    }
    if args.headless {
        cfg.display.enabled = false;
    }
}

fn load_classifier(cfg: &MaskwatchConfig, args: &Args) -> Result<Arc<dyn Classifier>> {
    match args.backend {
        Backend::Stub => {
            log::warn!(
                "using stub classifier (every region is class {})",
                args.stub_class
            );
            Ok(Arc::new(
                StubClassifier::new(args.stub_class).with_input_size(cfg.model.arch.input_size()),
            ))
        }
        Backend::Tract => load_tract(cfg),
    }
}

#[cfg(feature = "backend-tract")]
fn load_tract(cfg: &MaskwatchConfig) -> Result<Arc<dyn Classifier>> {
    let path = cfg.model.resolved_path();
    let classifier = maskwatch::detect::TractClassifier::load(&path, cfg.model.arch)?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_cfg: &MaskwatchConfig) -> Result<Arc<dyn Classifier>> {
    Err(anyhow!(
        "tract backend not compiled in; rebuild with --features backend-tract or use --backend stub"
    ))
}

fn open_frames(cfg: &MaskwatchConfig, args: &Args) -> Result<FrameStream<Box<dyn BufRead + Send>>> {
    if let Some(input) = &args.input {
        return ReplaySource::new(input)?.open();
    }
    open_http(cfg)
}

#[cfg(feature = "http-stream")]
fn open_http(cfg: &MaskwatchConfig) -> Result<FrameStream<Box<dyn BufRead + Send>>> {
    use maskwatch::ingest::{HttpStreamConfig, HttpStreamSource};

    let source = HttpStreamSource::new(HttpStreamConfig {
        url: cfg.stream.url.clone(),
        interval_ms: cfg.stream.interval_ms,
        count: cfg.stream.count,
    })?;
    source.connect()
}

#[cfg(not(feature = "http-stream"))]
fn open_http(_cfg: &MaskwatchConfig) -> Result<FrameStream<Box<dyn BufRead + Send>>> {
    Err(anyhow!(
        "http source not compiled in; rebuild with --features http-stream or use --input"
    ))
}

fn open_sink(cfg: &MaskwatchConfig) -> Result<Box<dyn AnnotationSink>> {
    if cfg.display.enabled {
        #[cfg(feature = "display")]
        {
            log::info!("rendering to window '{}'", cfg.display.window_title);
            return Ok(Box::new(maskwatch::annotate::WindowSink::new(
                cfg.display.window_title.clone(),
            )));
        }
        #[cfg(not(feature = "display"))]
        log::info!("display support not compiled in; logging verdicts instead");
    }
    Ok(Box::new(LogSink::new()))
}
