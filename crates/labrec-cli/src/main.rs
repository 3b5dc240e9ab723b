//! labrec-demo - sample training run recorded with labrec

use std::time::Duration;

use labrec_args::ArgsError;
use labrec_cli::build_training_parser;
use labrec_core::{outln, CoreError, Experiment};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut parser = build_training_parser();
    let experiment = match Experiment::from_parser(&mut parser, None) {
        Ok(experiment) => experiment,
        // --help and --version are parse errors to clap; let it render them.
        Err(CoreError::Args(ArgsError::Parse(e))) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        experiment = %experiment.id(),
        dir = %experiment.curexpdir().display(),
        "recording training run"
    );

    let args = experiment.args();
    let epochs = args.get("epochs").and_then(|v| v.as_i64()).unwrap_or(1);
    let log_interval = args
        .get("log-interval")
        .and_then(|v| v.as_i64())
        .unwrap_or(10);
    let dry_run = args
        .get("dry-run")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut val_loss = 1.0_f64;
    for epoch in 1..=epochs {
        // Stand-in for a real training epoch.
        std::thread::sleep(Duration::from_millis(25));
        val_loss *= 0.5 + rand::random::<f64>() / 2.0;
        if epoch % log_interval == 0 || epoch == epochs || dry_run {
            outln!("epoch {epoch}: val_loss {val_loss:.6}");
        }
        if dry_run {
            break;
        }
    }

    experiment.summary(serde_json::json!({ "val_loss": val_loss }))?;
    experiment.finish()?;
    Ok(())
}
