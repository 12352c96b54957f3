use clap::Parser;
use model_sidecar::logging::{self, LogFormat};
use model_sidecar::models::{DEFAULT_CONTEXT_LENGTH, context_length_or};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "model-context",
    about = "Print the context length declared in a GGUF model file"
)]
struct Args {
    /// Path to the GGUF model file
    model_path: PathBuf,

    /// Value printed when the model does not declare a context length
    #[clap(default_value_t = DEFAULT_CONTEXT_LENGTH)]
    default_context_length: u64,

    /// Log level for diagnostics on stderr
    #[clap(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level, LogFormat::Pretty);

    println!(
        "{}",
        context_length_or(&args.model_path, args.default_context_length)
    );
}
