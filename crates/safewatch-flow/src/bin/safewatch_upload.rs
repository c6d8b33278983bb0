//! Submit one image, video or camera frame for detection and print the result.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use safewatch_client::{DetectionProfile, InferenceClient, NotificationClient};
use safewatch_flow::{FrameFileCamera, UploadFlow};
use safewatch_models::{DetectionResult, FlowEvent};

/// Upload media to the SafeWatch detection backend
#[derive(Parser, Debug)]
#[command(name = "safewatch-upload")]
#[command(version, about)]
struct Args {
    /// Image or video file to submit
    #[arg(required_unless_present = "snapshot", conflicts_with = "snapshot")]
    input: Option<PathBuf>,

    /// Frame file kept current by a camera grabber; submits one snapshot
    #[arg(long, env = "SAFEWATCH_CAMERA_FRAME")]
    snapshot: Option<PathBuf>,

    /// Detector to run (ppe or machine)
    #[arg(short, long, default_value = "ppe", env = "SAFEWATCH_PROFILE")]
    profile: DetectionProfile,

    /// Skip the backend health check
    #[arg(long)]
    no_health_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let args = Args::parse();

    let client = InferenceClient::from_env().context("Failed to build inference client")?;
    let notifier = NotificationClient::from_env().context("Failed to build notification client")?;
    info!(
        backend = %client.base_url(),
        profile = %args.profile,
        "Starting safewatch-upload"
    );

    if !args.no_health_check && !client.health_check().await {
        warn!("Backend health check failed, submitting anyway");
    }

    let flow = UploadFlow::new(client, notifier, args.profile);

    let mut events = flow.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(FlowEvent::Progress { value, .. }) => eprintln!("upload: {}%", value),
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let asset = match (&args.input, &args.snapshot) {
        (Some(path), _) => flow.choose_path(path).await?,
        (None, Some(frame)) => flow.capture(&FrameFileCamera::new(frame)).await?,
        (None, None) => bail!("nothing to submit"),
    };
    info!(filename = %asset.filename, kind = %asset.kind, bytes = asset.len(), "Media ready");

    let outcome = flow.submit().await?;
    print_result(&outcome.result);

    if let Some(notification) = outcome.notification {
        if let Err(e) = notification.await {
            warn!("Notification task failed: {}", e);
        }
    }

    drop(flow);
    printer.abort();
    Ok(())
}

fn init_tracing() -> Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("safewatch=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }

    Ok(())
}

fn print_result(result: &DetectionResult) {
    match result {
        DetectionResult::Media {
            original_url,
            annotated_url,
            is_video,
        } => {
            println!("original:  {}", original_url);
            println!(
                "annotated: {} ({})",
                annotated_url,
                if *is_video { "video" } else { "image" }
            );
        }
        DetectionResult::Structured {
            detections,
            summary,
            checkpoints,
            original_url,
            annotated_url,
        } => {
            if let Some(url) = original_url {
                println!("original:  {}", url);
            }
            if let Some(url) = annotated_url {
                println!("annotated: {}", url);
            }
            if detections.is_empty() {
                println!("no detections");
            }
            for detection in detections {
                println!("{}", detection.display_row());
            }
            for checkpoint in checkpoints {
                println!(
                    "checkpoint {}: {}",
                    checkpoint.name,
                    if checkpoint.passed { "passed" } else { "failed" }
                );
            }
            if summary.has_violations() {
                println!("violations: {}", summary.total());
                for (label, count) in summary.iter() {
                    println!("  {}: {}", label, count);
                }
            }
        }
    }
}
