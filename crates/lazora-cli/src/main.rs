use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use lazora_contracts::events::{ConvertedEntry, SessionEvent, SessionLog};
use lazora_contracts::messages::{Language, Message};
use lazora_contracts::payload::{ImagePayload, SourceFile};
use lazora_engine::session::new_session_id;
use lazora_engine::{
    convert_batch, remote_orchestrator, ConvertOptions, EditClient, EditTransport, EngineConfig,
    EnhancementSession, Orchestrator, OrchestratorConfig, ProcessingState, Progress, TargetFormat,
};

const RESULT_FILE_STEM: &str = "enhanced-product-image";

#[derive(Debug, Parser)]
#[command(name = "lazora", version, about = "AI product photo enhancer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Enhance(EnhanceArgs),
    Convert(ConvertArgs),
}

#[derive(Debug, Parser)]
struct EnhanceArgs {
    #[arg(long)]
    product: PathBuf,
    /// Style reference whose scene is transferred onto the product.
    #[arg(long)]
    style: Option<PathBuf>,
    /// Second product placed on the background of the first result.
    #[arg(long, conflicts_with = "style")]
    reuse_with: Option<PathBuf>,
    #[arg(long)]
    upscale: bool,
    #[arg(long)]
    no_retry: bool,
    /// Also save each result as a `data:` URI text file.
    #[arg(long)]
    data_uri: bool,
    #[arg(long, default_value = "ar", value_parser = parse_language)]
    lang: Language,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ConvertArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(long, default_value = "webp", value_parser = parse_target_format)]
    format: TargetFormat,
    #[arg(long, default_value_t = 90)]
    quality: u8,
    #[arg(long, default_value = "ar", value_parser = parse_language)]
    lang: Language,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn parse_language(raw: &str) -> Result<Language, String> {
    Language::parse(raw).ok_or_else(|| format!("unsupported language: {raw} (expected en or ar)"))
}

fn parse_target_format(raw: &str) -> Result<TargetFormat, String> {
    TargetFormat::parse(raw)
        .ok_or_else(|| format!("unsupported format: {raw} (expected webp, jpeg or png)"))
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lazora error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;
    match cli.command {
        Command::Enhance(args) => run_enhance(&config, args),
        Command::Convert(args) => run_convert(args),
    }
}

fn run_enhance(config: &EngineConfig, args: EnhanceArgs) -> Result<i32> {
    let product = load_image(&args.product)?;
    let style = args.style.as_deref().map(load_image).transpose()?;
    let next_product = args.reuse_with.as_deref().map(load_image).transpose()?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed creating {}", args.out.display()))?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let mut orchestrator_config = OrchestratorConfig::default();
    if args.no_retry {
        orchestrator_config.supports_retry = false;
    }
    let orchestrator = remote_orchestrator(config, orchestrator_config)
        .with_events(SessionLog::new(&events_path, new_session_id()));
    let client = orchestrator.client();
    println!("Model {} via {}", client.model(), client.transport().name());
    let mut session = orchestrator.start_session();
    let lang = args.lang;

    orchestrator.select_product_image(&mut session, product);
    if let Some(style) = style {
        orchestrator.select_style_reference(&mut session, style);
    }

    if !run_edit(&orchestrator, &mut session, lang)? {
        return Ok(1);
    }
    write_result(&session, &args, RESULT_FILE_STEM)?;

    if args.upscale {
        orchestrator
            .upscale(&mut session)
            .context("upscale rejected")?;
        match session.error() {
            Some(error) => println!("{}", localize(error, lang)),
            None => {
                let stem = format!("{RESULT_FILE_STEM}-upscaled");
                write_result(&session, &args, &stem)?;
            }
        }
    }

    if let Some(next_product) = next_product {
        orchestrator
            .use_background(&mut session)
            .context("background reuse rejected")?;
        orchestrator.select_product_image(&mut session, next_product);
        if !run_edit(&orchestrator, &mut session, lang)? {
            return Ok(1);
        }
        write_result(&session, &args, &format!("{RESULT_FILE_STEM}-reused"))?;
    }

    println!("Events: {}", events_path.display());
    Ok(0)
}

/// Runs one submission with the remote call on a worker thread. Returns false
/// when the session ended in `Error`.
fn run_edit<C: EditClient>(
    orchestrator: &Orchestrator<C>,
    session: &mut EnhancementSession,
    lang: Language,
) -> Result<bool> {
    let pending = match orchestrator.begin_submit(session) {
        Ok(pending) => pending,
        Err(rejected) => {
            if let Some(error) = session.error() {
                println!("{}", localize(error, lang));
            }
            return Err(rejected).context("submission rejected");
        }
    };
    println!("Processing {}…", pending.operation().name());
    let result = thread::scope(|scope| {
        scope
            .spawn(|| {
                orchestrator.execute(&pending, &mut |progress: &Progress| {
                    println!("{}", pick_language_line(&progress.message, lang));
                })
            })
            .join()
    })
    .map_err(|_| anyhow!("edit worker panicked"))?;
    orchestrator.apply(session, pending, result);

    if session.processing_state() == ProcessingState::Error {
        let error = session
            .error()
            .map(|error| localize(error, lang))
            .unwrap_or_else(|| Message::NoImageFromAi.localized(lang).to_string());
        println!("{error}");
        return Ok(false);
    }
    Ok(true)
}

fn run_convert(args: ConvertArgs) -> Result<i32> {
    let mut files = Vec::new();
    for path in &args.files {
        let file = load_file(path)?;
        if !file.is_image() {
            println!("Skipping {} ({})", file.name, file.mime_type);
            continue;
        }
        files.push(file);
    }
    let options = ConvertOptions {
        format: args.format,
        quality: args.quality,
    };
    let converted = match convert_batch(&files, &options) {
        Ok(converted) => converted,
        Err(err) => {
            println!("{}", localize(&err.to_string(), args.lang));
            return Ok(1);
        }
    };

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed creating {}", args.out.display()))?;
    for file in &converted {
        let path = args.out.join(&file.name);
        fs::write(&path, &file.bytes)
            .with_context(|| format!("failed writing {}", path.display()))?;
        println!(
            "{}  {} -> {}  (-{:.1}%)",
            file.name,
            lazora_engine::converter::format_file_size(file.original_size as u64),
            lazora_engine::converter::format_file_size(file.new_size as u64),
            file.size_reduction_pct()
        );
    }

    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let files = converted
        .iter()
        .map(|file| ConvertedEntry {
            name: file.name.clone(),
            original_size: file.original_size,
            new_size: file.new_size,
        })
        .collect();
    SessionLog::new(&events_path, new_session_id()).record(
        0,
        &SessionEvent::ConversionFinished {
            format: args.format.extension(),
            files,
        },
    )?;
    Ok(0)
}

fn load_file(path: &Path) -> Result<SourceFile> {
    if !path.exists() {
        bail!("file not found ({})", path.display());
    }
    SourceFile::from_path(path)
}

/// Enhancer inputs must be images; anything else is refused before upload.
fn load_image(path: &Path) -> Result<SourceFile> {
    let file = load_file(path)?;
    if !file.is_image() {
        bail!("{} is not an image ({})", file.name, file.mime_type);
    }
    Ok(file)
}

fn write_result(session: &EnhancementSession, args: &EnhanceArgs, stem: &str) -> Result<()> {
    let image = session
        .result_image()
        .ok_or_else(|| anyhow!("session has no result image"))?;
    let path = write_payload(image, &args.out, stem)?;
    println!("Saved {}", path.display());
    if args.data_uri {
        let path = write_data_uri(image, &args.out, stem)?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn write_payload(image: &ImagePayload, out_dir: &Path, stem: &str) -> Result<PathBuf> {
    let path = out_dir.join(format!("{stem}.{}", image.file_extension()));
    let bytes = image.decode_bytes()?;
    fs::write(&path, bytes).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

fn write_data_uri(image: &ImagePayload, out_dir: &Path, stem: &str) -> Result<PathBuf> {
    let path = out_dir.join(format!("{stem}.datauri.txt"));
    fs::write(&path, image.to_data_uri())
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

/// Known messages print in the chosen language; model-provided text as is.
fn localize(text: &str, lang: Language) -> String {
    Message::ALL
        .iter()
        .find(|message| message.text() == text)
        .map(|message| message.localized(lang).to_string())
        .unwrap_or_else(|| text.to_string())
}

fn pick_language_line(text: &str, lang: Language) -> &str {
    let index = match lang {
        Language::En => 0,
        Language::Ar => 1,
    };
    text.lines().nth(index).unwrap_or(text)
}
