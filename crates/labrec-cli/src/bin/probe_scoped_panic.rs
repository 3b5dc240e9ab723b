//! Probe binary: a caught panic finalizes only the experiment scoped
//! inside it; a later uncaught panic takes the lingering experiment down
//! with the process.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use labrec_cli::build_training_parser;
use labrec_core::Experiment;

fn main() -> anyhow::Result<()> {
    let mut parser = build_training_parser();

    let caught = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let _scoped = Experiment::from_parser(&mut parser, None)
            .expect("create scoped experiment");
        panic!("loss exploded");
    }));
    assert!(caught.is_err());

    std::thread::sleep(Duration::from_secs(2));
    let _lingering = Experiment::from_parser(&mut parser, None)?;
    panic!("loss exploded again");
}
