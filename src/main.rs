//! qrledger command-line front end

use clap::{Parser, Subcommand};
use qrledger::{
    Error, FieldLabels, FieldSet, LedgerConfig, QrDecoder, Result, SubmissionQueue, SubmitOutcome,
    Workflow, logging,
};
use serde_json::json;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "qrledger",
    version,
    about = "Turn form values into QR codes and collect them in an xlsx ledger"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to qrledger.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Output results as formatted JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit one record; values are given in field order, use "" for blanks
    Submit {
        /// One value per field
        #[arg(value_name = "VALUE", num_args = 0..)]
        values: Vec<String>,
    },
    /// Prompt for each field and submit records until EOF or ":q"
    Interactive,
    /// Show field labels, or change them with `labels set KEY=LABEL ...`
    Labels {
        #[command(subcommand)]
        action: Option<LabelsAction>,
    },
    /// Print the workbook the next record will be appended to
    Path,
    /// Decode a QR image and print its payload
    Decode {
        /// PNG or other image file holding a QR code
        image: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum LabelsAction {
    /// Rename fields; a changed label set starts a new workbook
    Set {
        /// KEY=LABEL assignments
        #[arg(value_name = "KEY=LABEL", required = true)]
        assignments: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = LedgerConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    if let Command::Decode { image } = &cli.command {
        return decode(image, cli.json);
    }

    let workflow = Workflow::new(&config)?;
    let (queue, worker) = SubmissionQueue::spawn(workflow);
    info!(fields = config.fields.keys.len(), "qrledger ready");

    let code = match cli.command {
        Command::Submit { values } => {
            let outcome = queue.submit(values).await;
            emit_outcome(&outcome, cli.json)?;
            exit_code(outcome.ok)
        }
        Command::Interactive => interactive(&queue, cli.json).await?,
        Command::Labels { action: None } => {
            emit_labels(&queue.labels().await?, cli.json)?;
            ExitCode::SUCCESS
        }
        Command::Labels {
            action: Some(LabelsAction::Set { assignments }),
        } => {
            let mut labels = queue.labels().await?;
            for assignment in &assignments {
                let (key, label) = parse_assignment(assignment)?;
                labels.set_label(key, label)?;
            }
            let path = queue.relabel(labels.clone()).await?;
            emit_labels(&labels, cli.json)?;
            emit_path(&path, cli.json)?;
            ExitCode::SUCCESS
        }
        Command::Path => {
            emit_path(&queue.workbook_path().await?, cli.json)?;
            ExitCode::SUCCESS
        }
        Command::Decode { .. } => unreachable!("handled before the worker starts"),
    };

    queue.shutdown(worker).await?;
    Ok(code)
}

async fn interactive(queue: &SubmissionQueue, json: bool) -> Result<ExitCode> {
    let mut form = FieldSet::new(queue.labels().await?);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Enter a value for each field (blank to skip, :q to quit).");
    loop {
        let keys: Vec<(String, String)> = form
            .labels()
            .fields()
            .iter()
            .map(|f| (f.key.clone(), f.label.clone()))
            .collect();

        for (key, label) in &keys {
            print!("{label}: ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                return Ok(ExitCode::SUCCESS);
            };
            if line.trim() == ":q" {
                return Ok(ExitCode::SUCCESS);
            }
            form.set_value(key, line)?;
        }

        let outcome = queue.submit(form.values().to_vec()).await;
        emit_outcome(&outcome, json)?;
        if outcome.ok {
            form.clear_values();
        }
    }
}

fn decode(image: &Path, json: bool) -> Result<ExitCode> {
    let payload = QrDecoder::new().decode_file(image)?;
    let text = payload.as_str().unwrap_or_default();
    if json {
        let value = json!({
            "image": image,
            "text": payload.as_str(),
            "byte_length": payload.as_bytes().len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    assignment
        .split_once('=')
        .map(|(key, label)| (key.trim(), label.trim()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| Error::Config(format!("expected KEY=LABEL, got '{assignment}'")))
}

fn emit_outcome(outcome: &SubmitOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else if outcome.ok {
        println!("{}", outcome.message);
    } else {
        println!("Error: {}", outcome.message);
        if let Some(image) = &outcome.image_path {
            println!("  QR image kept at {}", image.display());
        }
    }
    Ok(())
}

fn emit_labels(labels: &FieldLabels, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&labels.to_json())?);
    } else {
        for field in labels.fields() {
            println!("{}: {}", field.key, field.label);
        }
    }
    Ok(())
}

fn emit_path(path: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&json!({ "workbook": path }))?);
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
