//! Probe binary: forced process exit with the experiment still live.

use labrec_cli::build_training_parser;
use labrec_core::Experiment;

fn main() -> anyhow::Result<()> {
    let mut parser = build_training_parser();
    let _experiment = Experiment::from_parser(&mut parser, None)?;
    labrec_core::exit(1);
}
