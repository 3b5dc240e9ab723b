//! Probe binary: nested stream capture. Writes land in the outer
//! experiment's files for its whole lifetime and in the inner one's only
//! while it is live.

use labrec_cli::build_training_parser;
use labrec_core::{errln, outln, Experiment};

fn main() -> anyhow::Result<()> {
    let mut parser = build_training_parser();

    let outer = Experiment::from_parser(&mut parser, None)?;
    outln!("a");
    errln!("x");
    {
        let _inner = Experiment::from_parser(&mut parser, None)?;
        outln!("b");
        errln!("y");
    }
    outln!("c");
    errln!("z");
    outer.finish()?;
    Ok(())
}
