use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use u2net_burn::{backend, registry, PretrainedModel, Session};

#[derive(Parser)]
#[command(author, version, about = "Salient-object segmentation with U²-Net")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict a saliency mask for an image.
    Infer {
        /// Input image path.
        input: PathBuf,
        /// Output mask path.
        output: PathBuf,
        /// Pretrained model to use.
        #[arg(short, long, default_value = "u2net")]
        model: PretrainedModel,
    },
    /// List the available pretrained models.
    ListModels,
    /// Show backend and cache information.
    Info,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Infer {
            input,
            output,
            model,
        } => {
            let session = Session::<backend::SelectedBackend>::open(model, backend::create_device())
                .with_context(|| format!("loading model '{model}'"))?;
            let mask = session
                .predict_file(&input)
                .with_context(|| format!("predicting mask for {}", input.display()))?;
            mask.save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!(output = %output.display(), "mask written");
        }
        Command::ListModels => {
            for model in PretrainedModel::ALL {
                println!("{model}");
            }
        }
        Command::Info => {
            println!("backend: {}", backend::backend_name());
            println!("cache:   {}", registry::cache_dir()?.display());
        }
    }

    Ok(())
}
