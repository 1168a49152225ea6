//! dialect-norm CLI - frequency-based normalization and POS-tagging evaluation

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::io::{stdout, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use norm_core::persistence::{self, derive_output_path};
use norm_core::scoring::{capitalize, render_report, report_sections, Report};
use norm_core::tagging::tag_conditions;
use norm_core::{
    score, LexiconTagger, ModelBuilder, NormalizationEngine, PipelineConfig, StrategyCounts, VERSION,
};

/// File name ending cut from a corpus file before the normalization suffix.
const CORPUS_TRAILING: &str = ".txt";
/// File name ending cut from a normalization output before the POS suffix.
const NORMALIZED_TRAILING: &str = "_out.txt";

/// dialect-norm - normalize dialect tokens and measure the effect on POS tagging
#[derive(Parser, Debug)]
#[command(name = "dialect-norm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file overriding the default pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the normalization model from TRAIN and normalize DEV and TEST
    Normalize {
        train: PathBuf,
        dev: PathBuf,
        test: PathBuf,

        /// Seed for tie-breaking between equally frequent normalizations
        #[arg(long)]
        seed: Option<u64>,

        /// Directory for the output files (default: next to each input)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Also write the built model as a binary snapshot
        #[arg(long)]
        save_model: Option<PathBuf>,
    },

    /// Tag both normalization outputs under three conditions and report accuracy
    Evaluate {
        dev: PathBuf,
        test: PathBuf,

        /// Annotated corpus (usually the training file) the built-in tagger learns from
        #[arg(short, long)]
        lexicon: PathBuf,

        /// Report path (default: eval_report.txt next to DEV)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Print the report as JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Directory for the tagging output files (default: next to each input)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Re-score existing tagging output files
    Score {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the report as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('_').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("data")
        .to_string()
}

fn normalize(
    config: &PipelineConfig,
    train: &Path,
    inputs: [&Path; 2],
    out_dir: Option<&Path>,
    save_model: Option<&Path>,
) -> Result<()> {
    let training = persistence::read_corpus(train)
        .with_context(|| format!("Failed to read training corpus {}", train.display()))?;
    let documents = inputs
        .iter()
        .map(|input| {
            persistence::read_corpus(input).with_context(|| format!("Failed to read {}", input.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let model = ModelBuilder::build(&training.messages).context("Failed to build normalization model")?;
    info!(
        "Model: {} distinct tokens ({} ambiguous) from {} training tokens",
        model.len(),
        model.ambiguous_count(),
        model.token_count()
    );

    if let Some(path) = save_model {
        persistence::save_model(&model, path)
            .with_context(|| format!("Failed to save model to {}", path.display()))?;
        info!("Model snapshot written to {}", path.display());
    }

    let engine = NormalizationEngine::with_model(model, config.seed)?;
    let predictions = documents
        .iter()
        .map(|document| engine.predict_all(&document.messages))
        .collect::<norm_core::Result<Vec<_>>>()?;

    for ((input, document), predicted) in inputs.iter().zip(&documents).zip(&predictions) {
        let counts = StrategyCounts::tally(predicted);
        let output = derive_output_path(input, CORPUS_TRAILING, &config.norm_suffix, out_dir);
        persistence::write_normalized(&output, predicted, &document.layout)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!(
            "{}: {} tokens (unique {}, ambiguous {}, new {}) -> {}",
            input.display(),
            counts.total(),
            counts.unique,
            counts.ambiguous,
            counts.new,
            output.display()
        );
    }
    Ok(())
}

fn print_report(datasets: &[(String, Report)], json: bool) -> Result<()> {
    let mut out = stdout();
    if json {
        let mut map = serde_json::Map::new();
        for (name, report) in datasets {
            map.insert(name.clone(), serde_json::to_value(report)?);
        }
        writeln!(out, "{}", serde_json::to_string_pretty(&map)?)?;
        return Ok(());
    }

    let styled = out.is_terminal();
    for section in report_sections(datasets) {
        if styled {
            writeln!(out, "{}\n", section.title.clone().bold())?;
        } else {
            writeln!(out, "{}\n", section.title)?;
        }
        writeln!(out, "{}", section.table)?;
    }
    Ok(())
}

fn evaluate(
    config: &PipelineConfig,
    inputs: [&Path; 2],
    lexicon: &Path,
    report_path: Option<&Path>,
    json: bool,
    out_dir: Option<&Path>,
) -> Result<()> {
    let lexicon_corpus = persistence::read_corpus(lexicon)
        .with_context(|| format!("Failed to read tagger lexicon {}", lexicon.display()))?;
    let documents = inputs
        .iter()
        .map(|input| {
            persistence::read_normalized(input).with_context(|| format!("Failed to read {}", input.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let tagger = LexiconTagger::from_corpus(&lexicon_corpus.messages, config.fallback_tag.as_str());
    info!("Tagger lexicon: {} word forms", tagger.vocabulary_size());

    let mut tagged_files = Vec::new();
    let mut datasets = Vec::new();
    for (input, document) in inputs.iter().zip(&documents) {
        let tagged = tag_conditions(&tagger, &document.messages)
            .with_context(|| format!("Failed to tag {}", input.display()))?;
        let report = score(&tagged).with_context(|| format!("Failed to score {}", input.display()))?;
        datasets.push((capitalize(&dataset_name(input)), report));
        tagged_files.push(tagged);
    }

    for ((input, document), tagged) in inputs.iter().zip(&documents).zip(&tagged_files) {
        let output = derive_output_path(input, NORMALIZED_TRAILING, &config.pos_suffix, out_dir);
        persistence::write_tagged(&output, tagged, &document.layout)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("{} -> {}", input.display(), output.display());
    }

    let report_path = match report_path {
        Some(path) => path.to_path_buf(),
        None => inputs[0]
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(&config.report_name),
    };
    persistence::write_atomic(&report_path, &render_report(&datasets))
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    info!("Evaluation report written to {}", report_path.display());

    print_report(&datasets, json)
}

fn rescore(files: &[PathBuf], json: bool) -> Result<()> {
    let mut datasets = Vec::new();
    for file in files {
        let tagged = persistence::read_tagged(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
            .messages;
        if tagged.is_empty() {
            warn!("{} contains no tokens", file.display());
        }
        let report = score(&tagged).with_context(|| format!("Failed to score {}", file.display()))?;
        datasets.push((capitalize(&dataset_name(file)), report));
    }
    print_report(&datasets, json)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("dialect-norm v{}", VERSION);
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalize {
            train,
            dev,
            test,
            seed,
            out_dir,
            save_model,
        } => {
            if let Some(seed) = seed {
                config.seed = seed;
            }
            normalize(
                &config,
                &train,
                [dev.as_path(), test.as_path()],
                out_dir.as_deref(),
                save_model.as_deref(),
            )
        }

        Commands::Evaluate {
            dev,
            test,
            lexicon,
            report,
            json,
            out_dir,
        } => {
            if dev == test {
                bail!("DEV and TEST must be different files");
            }
            evaluate(
                &config,
                [dev.as_path(), test.as_path()],
                &lexicon,
                report.as_deref(),
                json,
                out_dir.as_deref(),
            )
        }

        Commands::Score { files, json } => rescore(&files, json),
    }
}
