mod classifier;
mod simulator;

use anyhow::Result;
use clap::Parser;
use classifier::MotionHeuristic;
use repsense_config::AppConfig;
use repsense_imu::ImuSample;
use repsense_pipeline::{Classifier, Pipeline};
use repsense_session::{ExerciseLabels, ExerciseState, SessionEvent};
use simulator::SquatSimulator;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Run a repetition-counting session against a simulated sensor.
#[derive(Parser, Debug)]
#[command(name = "repsense", version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults to the per-user config.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the simulated session length in seconds.
    #[arg(long)]
    duration: Option<f32>,

    /// Playback speed relative to real time.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Seed for the simulated sensor noise.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Write the effective config to the per-user config file and exit.
    #[arg(long, default_value_t = false)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "repsense=info,repsense_imu=info,repsense_session=info,repsense_pipeline=info".into()
            }),
        )
        .init();

    info!("repsense starting");

    // Load config.
    let mut config = match &args.config {
        Some(path) => repsense_config::load_config_from(path)?,
        None => repsense_config::load_config().unwrap_or_else(|e| {
            warn!(?e, "Failed to load config, using defaults");
            AppConfig::default()
        }),
    };
    if let Some(duration) = args.duration {
        config.simulation.duration_s = duration;
    }
    config.validate()?;

    if args.save_config {
        let path = repsense_config::save_config(&config)?;
        info!(?path, "Config written");
        return Ok(());
    }

    info!(
        sample_rate_hz = config.sensor.sample_rate_hz,
        algorithm = ?config.fusion.algorithm,
        layout = ?config.features.layout,
        "Config loaded"
    );

    let simulator = SquatSimulator::new(&config.sensor, &config.simulation, args.seed);
    info!(samples = simulator.total_samples(), "Simulated sensor ready");

    let burst = config.simulation.burst;
    let wake_period = Duration::from_secs_f64(
        burst as f64 / config.sensor.sample_rate_hz as f64 / args.speed.max(1e-3),
    );
    let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
    let source = tokio::spawn(play_source(simulator, sample_tx, burst, wake_period));

    let labels = config.session.labels.clone();
    let classifier = MotionHeuristic::new(
        &labels,
        Duration::from_millis(config.simulation.classifier_latency_ms),
    );
    let mut pipeline = Pipeline::new(&config.tracker(), classifier);
    pipeline.start();

    run_session(&mut pipeline, &mut sample_rx, tokio::signal::ctrl_c(), &labels).await;
    source.abort();

    if let Some(event) = pipeline.stop() {
        log_event(&event, &labels);
    }
    let stats = pipeline.stats();
    info!(
        samples = stats.samples,
        dropped_ticks = stats.dropped_ticks,
        vectors = stats.vectors,
        classified = stats.classified,
        stale = stats.stale,
        classifier_failures = stats.classifier_failures,
        "Pipeline stats"
    );

    Ok(())
}

/// Feed received samples to the pipeline until the source closes or
/// `shutdown` resolves.
async fn run_session<C, F>(
    pipeline: &mut Pipeline<C>,
    sample_rx: &mut mpsc::UnboundedReceiver<ImuSample>,
    shutdown: F,
    labels: &ExerciseLabels,
) where
    C: Classifier,
    F: Future,
{
    // Pinned once so a signal that lands mid-batch is not lost.
    tokio::pin!(shutdown);

    let mut batch: Vec<ImuSample> = Vec::new();
    loop {
        tokio::select! {
            received = sample_rx.recv() => {
                let Some(sample) = received else {
                    info!("Sample source finished");
                    break;
                };
                batch.push(sample);

                // Drain all available samples.
                while let Ok(sample) = sample_rx.try_recv() {
                    batch.push(sample);
                }
                if batch.len() > 1 {
                    debug!(batch = batch.len(), "Processing backlog");
                }

                // Inference blocks; let other tasks move off this worker.
                let events = tokio::task::block_in_place(|| pipeline.process_batch(&batch));
                for event in events {
                    log_event(&event, labels);
                }
                batch.clear();
            }
            _ = &mut shutdown => {
                warn!("Interrupted");
                break;
            }
        }
    }
}

/// Background task: play the simulator in bursts of `burst` samples.
async fn play_source(
    mut simulator: SquatSimulator,
    sample_tx: mpsc::UnboundedSender<ImuSample>,
    burst: usize,
    wake_period: Duration,
) {
    let mut interval = tokio::time::interval(wake_period);
    loop {
        interval.tick().await;
        for _ in 0..burst {
            let Some(sample) = simulator.next() else {
                return;
            };
            if sample_tx.send(sample).is_err() {
                debug!("Sample receiver closed");
                return;
            }
        }
    }
}

fn log_event(event: &SessionEvent, labels: &ExerciseLabels) {
    match event {
        SessionEvent::ExerciseChanged(ExerciseState::InExercise(class_id)) => {
            info!(exercise = labels.name(*class_id), "Exercise detected");
        }
        SessionEvent::ExerciseChanged(ExerciseState::Resting) => info!("Resting"),
        SessionEvent::ExerciseChanged(ExerciseState::Idle) => info!("Idle"),
        SessionEvent::RepCounted { class_id, count } => {
            info!(exercise = labels.name(*class_id), count, "Rep");
        }
        SessionEvent::SessionEnded { final_count } => info!(final_count, "Session finished"),
        SessionEvent::PredictionDiscarded(reason) => debug!(?reason, "Prediction discarded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use repsense_imu::STANDARD_GRAVITY;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_interrupts_slow_inference() {
        let config = AppConfig::default();
        let labels = config.session.labels.clone();
        let classifier = MotionHeuristic::new(&labels, Duration::from_millis(50));
        let mut pipeline = Pipeline::new(&config.tracker(), classifier);
        pipeline.start();

        // The source never closes; only the shutdown signal can end the loop.
        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
        let period = 1.0 / config.sensor.sample_rate_hz as f64;
        let feeder = tokio::spawn(async move {
            for i in 0u32.. {
                let sample = ImuSample::new(
                    Vec3::Z * STANDARD_GRAVITY,
                    Vec3::ZERO,
                    i as f64 * period,
                );
                if sample_tx.send(sample).is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = stop_tx.send(());
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            run_session(&mut pipeline, &mut sample_rx, stop_rx, &labels),
        )
        .await
        .expect("session loop ignored shutdown");
        feeder.abort();

        assert!(pipeline.stats().samples > 0);
    }
}
