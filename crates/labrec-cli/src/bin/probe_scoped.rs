//! Probe binary: three termination paths in sequence. A scoped
//! experiment, an explicitly finished one, and one left live until the
//! process exits, with a delay before the last so the end times differ.

use std::time::Duration;

use labrec_cli::build_training_parser;
use labrec_core::Experiment;

fn main() -> anyhow::Result<()> {
    let mut parser = build_training_parser();
    {
        let _scoped = Experiment::from_parser(&mut parser, None)?;
    }
    let explicit = Experiment::from_parser(&mut parser, None)?;
    explicit.finish()?;

    std::thread::sleep(Duration::from_secs(2));
    let _lingering = Experiment::from_parser(&mut parser, None)?;
    Ok(())
}
