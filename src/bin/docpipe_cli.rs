use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use docpipe::{
    config, logging,
    extraction::UploadedFile,
    processing::{NlpService, PipelineRequest, SummaryStyle, TranslationRequest},
};
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "docpipe-cli",
    about = "Run the document pipeline against local files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, detect, summarize and optionally translate a PDF or image.
    Process {
        path: PathBuf,
        #[arg(long, default_value = "medium")]
        length: String,
        #[arg(long, default_value = "normal")]
        mode: String,
        #[arg(long, default_value = "")]
        target_lang: String,
    },
    /// Summarize text.
    Summarize {
        #[command(flatten)]
        input: TextInput,
        #[arg(long, default_value = "medium")]
        length: String,
        #[arg(long, default_value = "normal")]
        mode: String,
    },
    /// Translate text between two language tags.
    Translate {
        #[command(flatten)]
        input: TextInput,
        #[arg(long)]
        source_lang: String,
        #[arg(long)]
        target_lang: String,
    },
    /// Detect the language of text.
    Detect {
        #[command(flatten)]
        input: TextInput,
    },
}

/// Text passed inline, read from a file, or read from stdin when neither is given.
#[derive(Args)]
struct TextInput {
    #[arg(long, conflicts_with = "input")]
    text: Option<String>,
    #[arg(long)]
    input: Option<PathBuf>,
}

impl TextInput {
    fn read(self) -> Result<String> {
        if let Some(text) = self.text {
            return Ok(text);
        }
        if let Some(path) = self.input {
            return fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        Ok(text)
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::try_init_config().context("failed to load configuration")?;
    logging::init_tracing(config.log_file.as_deref());
    let service =
        NlpService::from_config(config).context("failed to initialize processing service")?;

    let output = match cli.command {
        Command::Process {
            path,
            length,
            mode,
            target_lang,
        } => {
            let style = SummaryStyle::parse(&length, &mode)?;
            let file = load_upload(&path)?;
            let result = service
                .process_file(PipelineRequest::new(file, style, &target_lang))
                .await?;
            serde_json::to_value(result)?
        }
        Command::Summarize {
            input,
            length,
            mode,
        } => {
            let style = SummaryStyle::parse(&length, &mode)?;
            let summary = service.summarize(&input.read()?, style).await?;
            json!({ "summary": summary })
        }
        Command::Translate {
            input,
            source_lang,
            target_lang,
        } => {
            let translation = service
                .translate(TranslationRequest {
                    text: input.read()?,
                    source_lang,
                    target_lang,
                })
                .await?;
            json!({ "translation": translation })
        }
        Command::Detect { input } => {
            let text = input.read()?;
            if text.trim().is_empty() {
                bail!("no text to detect");
            }
            let language = service.detect_language(&text).await?;
            json!({ "detected_language": language })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile {
        content_type: content_type_for(path).map(str::to_string),
        file_name,
        bytes,
    })
}

/// Content type for local files, standing in for the header a browser would send.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
