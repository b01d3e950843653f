use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use covid_forecast::{
    config::Config,
    pipeline,
    report::Report,
};

/// Forecasts the daily COVID positive test rate of US states from survey indicators.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// A JSON configuration file, the defaults are used when missing.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Trains a model and saves the best checkpoint.
    Train,
    /// Predicts the test set with the saved checkpoint.
    Predict,
    /// Grades a loss against the baselines, the checkpoint's validation loss by default.
    Grade { loss: Option<f32> },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Train => {
            let outcome = pipeline::train(&config).context("training failed")?;
            info!(
                "ran {} steps, best model at step {}",
                outcome.summary.steps_run, outcome.summary.best.step
            );
            println!("{}", outcome.report);
        }
        Command::Predict => {
            let rows = pipeline::predict(&config).context("prediction failed")?;
            println!(
                "{rows} predictions written to {}",
                config.output.predictions_path.display()
            );
        }
        Command::Grade { loss: Some(loss) } => {
            println!("{}", Report::new(loss));
        }
        Command::Grade { loss: None } => {
            let path = &config.output.checkpoint_path;
            let report = pipeline::grade_checkpoint(path)
                .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
            println!("{report}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_takes_an_optional_loss() {
        let cli = Cli::try_parse_from(["covid-forecast", "grade", "0.9"]).unwrap();
        assert!(matches!(cli.command, Command::Grade { loss: Some(l) } if l == 0.9));
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["covid-forecast", "-c", "run.json", "grade"]).unwrap();
        assert!(matches!(cli.command, Command::Grade { loss: None }));
        assert_eq!(cli.config, Some(PathBuf::from("run.json")));
    }

    #[test]
    fn train_and_predict_take_no_arguments() {
        let cli = Cli::try_parse_from(["covid-forecast", "--config", "a.json", "train"]).unwrap();
        assert!(matches!(cli.command, Command::Train));

        let cli = Cli::try_parse_from(["covid-forecast", "predict"]).unwrap();
        assert!(matches!(cli.command, Command::Predict));

        assert!(Cli::try_parse_from(["covid-forecast", "predict", "extra"]).is_err());
        assert!(Cli::try_parse_from(["covid-forecast", "grade", "low"]).is_err());
        assert!(Cli::try_parse_from(["covid-forecast"]).is_err());
    }
}
