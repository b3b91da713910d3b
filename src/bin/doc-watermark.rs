//! doc-watermark CLI tool
//!
//! Burns a two-line identity watermark into images and PDFs.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::GenericImageView;

use doc_watermark::font::{FontResource, SYSTEM_FONT_CANDIDATES};
use doc_watermark::pdf::extract_metadata;
use doc_watermark::raster::decode;
use doc_watermark::wire::handle_json;
use doc_watermark::{split_lines, FileType, WatermarkRequest, Watermarker};

/// doc-watermark - Stamp identity watermarks onto images and PDFs
#[derive(Parser)]
#[command(name = "doc-watermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Watermark a PDF
    doc-watermark apply contract.pdf -o contract-marked.pdf --text \"Jane Doe, 555-123-4567\"

    # Watermark a photo, forcing the type
    doc-watermark apply upload.bin -o marked.bin --type image --text \"Jane Doe | Sales\"

    # Show how text will be split
    doc-watermark lines \"John Smith 555 123 4567\"

    # Serve one JSON request from stdin
    doc-watermark request < request.json")]
struct Cli {
    /// Font file to try before the built-in candidates (repeatable)
    #[arg(long = "font", global = true, env = "DOC_WATERMARK_FONTS", value_delimiter = ',')]
    fonts: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watermark an image or PDF file
    Apply {
        /// Input file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Identity text, split into two lines automatically
        #[arg(short, long)]
        text: String,

        /// Document type ("image" or "pdf"); guessed from the extension if omitted
        #[arg(long = "type")]
        file_type: Option<String>,
    },

    /// Print the two lines derived from TEXT
    Lines {
        text: String,
    },

    /// Handle a JSON request read from FILE (or stdin) and print the JSON response
    Request {
        file: Option<PathBuf>,
    },

    /// Show information about an image or PDF file
    Info {
        /// File to inspect
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply {
            input,
            output,
            text,
            file_type,
        } => cmd_apply(&cli.fonts, input, output, text, file_type),
        Commands::Lines { text } => cmd_lines(&text),
        Commands::Request { file } => cmd_request(&cli.fonts, file),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Resolve the watermark font: user fonts first, then the built-in list
fn load_watermarker(user_fonts: &[PathBuf]) -> Result<Watermarker> {
    let candidates: Vec<PathBuf> = user_fonts
        .iter()
        .cloned()
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from))
        .collect();

    let font = FontResource::resolve(&candidates).context("no usable watermark font")?;
    Ok(Watermarker::new(font))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        bail!("Input file not found: {}", path.display());
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn detect_type(path: &Path, explicit: Option<&str>) -> Result<FileType> {
    let file_type = match explicit {
        Some(name) => name.parse::<FileType>()?,
        None => FileType::from_path(path)
            .with_context(|| format!("cannot tell the type of {}, pass --type", path.display()))?,
    };
    Ok(file_type)
}

/// Watermark one file
fn cmd_apply(
    fonts: &[PathBuf],
    input: PathBuf,
    output: PathBuf,
    text: String,
    file_type: Option<String>,
) -> Result<()> {
    let file_type = detect_type(&input, file_type.as_deref())?;
    let document = read_input(&input)?;
    let watermarker = load_watermarker(fonts)?;

    let request = WatermarkRequest {
        document,
        file_type,
        raw_text: text,
    };
    let response = watermarker
        .apply(&request)
        .with_context(|| format!("failed to watermark {}", input.display()))?;

    std::fs::write(&output, &response.document)
        .with_context(|| format!("failed to write {}", output.display()))?;

    eprintln!("Line 1: {}", response.lines.first);
    eprintln!("Line 2: {}", response.lines.second);
    if response.watermark_applied {
        eprintln!("Output: {}", output.display());
    } else {
        eprintln!("Output: {} (unchanged, watermark could not be applied)", output.display());
    }

    Ok(())
}

/// Print the derived lines, one per line
fn cmd_lines(text: &str) -> Result<()> {
    let lines = split_lines(text);
    println!("{}", lines.first);
    println!("{}", lines.second);
    Ok(())
}

/// Serve one wire-format request
fn cmd_request(fonts: &[PathBuf], file: Option<PathBuf>) -> Result<()> {
    let body = match file {
        Some(path) => String::from_utf8(read_input(&path)?)
            .with_context(|| format!("{} is not UTF-8", path.display()))?,
        None => {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .context("failed to read request from stdin")?;
            body
        }
    };

    let watermarker = load_watermarker(fonts)?;
    let (status, json) = handle_json(&watermarker, &body);
    println!("{}", json);

    if status != 200 {
        bail!("request failed with status {}", status);
    }
    Ok(())
}

/// Show information about a file
fn cmd_info(input: PathBuf) -> Result<()> {
    let file_type = FileType::from_path(&input)?;
    let bytes = read_input(&input)?;

    println!("File: {}", input.display());
    println!("Type: {}", file_type.as_str());

    match file_type {
        FileType::Pdf => {
            let metadata = extract_metadata(&bytes)?;
            println!("Pages: {}", metadata.page_count);
            if let Some(title) = metadata.title {
                println!("Title: {}", title);
            }
            if let Some(author) = metadata.author {
                println!("Author: {}", author);
            }
            for (i, page_box) in metadata.page_boxes.iter().enumerate() {
                println!("Page {}: {} x {} pt", i + 1, page_box.width(), page_box.height());
            }
        }
        FileType::Image => {
            let (decoded, format) = decode(&bytes).context("failed to decode image")?;
            let (width, height) = decoded.dimensions();
            println!("Format: {:?}", format);
            println!("Size: {} x {} px", width, height);
        }
    }

    Ok(())
}
