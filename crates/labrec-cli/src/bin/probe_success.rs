//! Probe binary: the experiment is never finished explicitly; the handle
//! drops when main returns and the run records SUCCESS.

use labrec_cli::build_training_parser;
use labrec_core::Experiment;

fn main() -> anyhow::Result<()> {
    let mut parser = build_training_parser();
    let _experiment = Experiment::from_parser(&mut parser, None)?;
    Ok(())
}
