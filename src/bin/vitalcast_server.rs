// src/bin/vitalcast_server.rs
//! Vitals broadcast server: producers stream camera frames in, viewers
//! receive per-frame vitals and alerts as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use vitalcast::config::ServiceConfig;
use vitalcast::hub::BroadcastHub;
use vitalcast::network::VitalsServer;
use vitalcast::session::{LogAlertSink, SessionContext, StaticBaselineProvider};
use vitalcast::vision::StaticLandmarkDetector;

#[derive(Parser, Debug)]
#[command(author, version, about = "Contactless vitals broadcast server", long_about = None)]
struct Args {
    /// Address to accept producer and consumer connections on
    #[arg(short, long, default_value = "0.0.0.0:7878")]
    listen: String,

    /// JSON service configuration; defaults apply to missing fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON map of source id to baseline
    #[arg(short, long)]
    baselines: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServiceConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    let baselines = match &args.baselines {
        Some(path) => StaticBaselineProvider::from_json_file(path)
            .with_context(|| format!("loading baselines from {}", path.display()))?,
        None => StaticBaselineProvider::new(),
    };
    log::info!("Loaded {} baseline(s)", baselines.len());

    let hub = BroadcastHub::new(config.hub.clone()).context("creating broadcast hub")?;
    let detector = StaticLandmarkDetector::new(config.landmarks.keypoints()?);
    let context = SessionContext {
        pipeline: config.pipeline.clone(),
        session: config.session.clone(),
        detector: Arc::new(detector),
        hub,
        baselines: Arc::new(baselines),
        alerts: Arc::new(LogAlertSink),
    };

    let server = VitalsServer::new(context)?;
    let mut serving = tokio::spawn(server.clone().listen(args.listen.clone()));

    tokio::select! {
        finished = &mut serving => {
            // The listener only returns on its own when binding or accepting fails.
            finished.context("server task panicked")??;
            return Ok(());
        }
        interrupted = tokio::signal::ctrl_c() => {
            interrupted.context("waiting for ctrl-c")?;
            log::info!("Interrupt received, shutting down");
        }
    }

    server.shutdown().await;
    serving.await.context("server task panicked")??;
    Ok(())
}
