//! Shared parser builders for the labrec binaries
//!
//! The demo driver and the probe binaries all parse the options of a
//! typical image-classification training script. The recording option
//! group is already attached.

use clap::{Arg, ArgAction, Command};

/// Build the demo training parser.
pub fn build_training_parser() -> Command {
    let cmd = Command::new("labrec-demo")
        .about("Sample training run recorded with labrec")
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_name("N")
                .default_value("64")
                .help("Input batch size for training"),
        )
        .arg(
            Arg::new("test-batch-size")
                .long("test-batch-size")
                .value_name("N")
                .default_value("1000")
                .help("Input batch size for testing"),
        )
        .arg(
            Arg::new("epochs")
                .long("epochs")
                .value_name("N")
                .default_value("14")
                .help("Number of epochs to train"),
        )
        .arg(
            Arg::new("lr")
                .long("lr")
                .value_name("LR")
                .default_value("1.0")
                .help("Learning rate"),
        )
        .arg(
            Arg::new("gamma")
                .long("gamma")
                .value_name("M")
                .default_value("0.7")
                .help("Learning rate step gamma"),
        )
        .arg(
            Arg::new("no-cuda")
                .long("no-cuda")
                .action(ArgAction::SetTrue)
                .help("Disable CUDA training"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Quickly check a single pass"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("S")
                .default_value("1")
                .help("Random seed"),
        )
        .arg(
            Arg::new("log-interval")
                .long("log-interval")
                .value_name("N")
                .default_value("10")
                .help("Batches to wait between progress lines"),
        )
        .arg(
            Arg::new("save-model")
                .long("save-model")
                .action(ArgAction::SetTrue)
                .help("Save the final model"),
        );
    labrec_args::add_argument_group(cmd, None)
}

/// Training parser variant with a required positional batch size, for
/// exercising default-argument handling.
pub fn build_required_args_parser() -> Command {
    let cmd = Command::new("labrec-demo")
        .arg(
            Arg::new("batchsize")
                .required(true)
                .value_name("N")
                .help("Input batch size for training"),
        )
        .arg(
            Arg::new("test-batch-size")
                .long("test-batch-size")
                .value_name("N")
                .default_value("1000")
                .help("Input batch size for testing"),
        );
    labrec_args::add_argument_group(cmd, None)
}
