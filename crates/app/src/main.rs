use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use media_editor_core::{
    codec, geometry, waveform, AdjustmentState, AudioEditor, AudioEffect, CropSelection,
    EditorConfig, FlipAxis, ImageAssist, ImageEditor, MediaEditError, MemorySink,
    PlaybackScheduler, Style, WavFileSink,
};
use tracing_subscriber::EnvFilter;

fn main() -> media_editor_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Commands::Image(args) => run_image(&config, args),
        Commands::Audio {
            input,
            output,
            effects,
        } => run_audio(&config, &input, &output, &effects),
        Commands::Waveform {
            input,
            width,
            height,
        } => run_waveform(&config, &input, width, height),
        Commands::Info { input } => run_info(&input),
        Commands::Play {
            input,
            output,
            chunk_size,
        } => run_play(&config, &input, &output, chunk_size),
    }
}

fn run_image(config: &EditorConfig, args: ImageArgs) -> media_editor_core::Result<()> {
    tracing::info!(input = ?args.input, output = ?args.output, "editing image");

    let mut editor = ImageEditor::new(config.display.clone());
    editor.load(codec::load_image(&args.input)?)?;

    if let Some(degrees) = args.rotate {
        editor.rotate(degrees)?;
    }
    if let Some(axis) = args.flip {
        editor.flip(axis.into())?;
    }
    if let Some(selection) = args.crop {
        editor.crop_selection(selection)?;
    }
    if let Some((width, height)) = args.resize {
        editor.resize(width, height)?;
    }
    if let Some(tool) = args.assist {
        editor.apply_assist(tool.into())?;
    }
    if let Some(recipe) = &args.recipe {
        editor.set_adjustments(load_recipe(recipe)?)?;
    }

    codec::save_image(editor.current()?, &args.output)
}

fn run_audio(
    config: &EditorConfig,
    input: &Path,
    output: &Path,
    effects: &[EffectArg],
) -> media_editor_core::Result<()> {
    let mut editor = AudioEditor::new(MemorySink::new(), config);
    editor.load(codec::load_audio(input)?)?;
    for effect in effects {
        editor.apply((*effect).into())?;
    }
    codec::save_audio(editor.working()?, output)
}

fn run_waveform(
    config: &EditorConfig,
    input: &Path,
    width: Option<u32>,
    height: Option<u32>,
) -> media_editor_core::Result<()> {
    let mut view = config.waveform.clone();
    view.width = width.unwrap_or(view.width);
    view.height = height.unwrap_or(view.height);

    let buffer = codec::load_audio(input)?;
    let points: Vec<_> = waveform::render(buffer.samples(), &view).points().collect();
    println!("{}", to_json(&points)?);
    Ok(())
}

fn run_info(input: &Path) -> media_editor_core::Result<()> {
    let summary = media_editor_core::analyze(&codec::load_audio(input)?)?;
    println!("{}", to_json(&summary)?);
    Ok(())
}

fn run_play(
    config: &EditorConfig,
    input: &Path,
    output: &Path,
    chunk_size: Option<usize>,
) -> media_editor_core::Result<()> {
    let buffer = codec::load_audio(input)?;
    let mut scheduler = PlaybackScheduler::new(WavFileSink::new(output), &config.playback);
    let chunk_size = chunk_size.unwrap_or(config.playback.chunk_size);

    scheduler.start(&buffer, chunk_size)?;
    let chunks = scheduler.run_to_end(&buffer, std::thread::sleep)?;
    tracing::info!(chunks, position = scheduler.position(), "playback finished");
    Ok(())
}

fn load_recipe(path: &Path) -> media_editor_core::Result<AdjustmentState> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|err| MediaEditError::invalid_input(format!("recipe {}: {err}", path.display())))
}

fn to_json<T: serde::Serialize>(value: &T) -> media_editor_core::Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| MediaEditError::msg(err.to_string()))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Image and audio editing engine", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply geometric edits, an assistant tool and an adjustment recipe.
    Image(ImageArgs),
    /// Apply audio effects in the given order.
    Audio {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long = "effect", value_enum)]
        effects: Vec<EffectArg>,
    },
    /// Print the waveform points of an audio file as JSON.
    Waveform {
        input: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
    /// Print level and spectral figures of an audio file as JSON.
    Info { input: PathBuf },
    /// Stream an audio file through the playback scheduler into a WAV file.
    Play {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
struct ImageArgs {
    input: PathBuf,
    output: PathBuf,
    /// Adjustment recipe, a JSON `AdjustmentState`.
    #[arg(long)]
    recipe: Option<PathBuf>,
    /// Counter-clockwise rotation in degrees.
    #[arg(long, allow_hyphen_values = true)]
    rotate: Option<f32>,
    #[arg(long, value_enum)]
    flip: Option<FlipArg>,
    /// Selection `X1,Y1,X2,Y2` on the display canvas.
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropSelection>,
    /// Target size `WIDTHxHEIGHT`.
    #[arg(long, value_parser = parse_size)]
    resize: Option<(i64, i64)>,
    #[arg(long, value_enum)]
    assist: Option<AssistArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FlipArg {
    Horizontal,
    Vertical,
}

impl From<FlipArg> for FlipAxis {
    fn from(value: FlipArg) -> Self {
        match value {
            FlipArg::Horizontal => FlipAxis::Horizontal,
            FlipArg::Vertical => FlipAxis::Vertical,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AssistArg {
    AutoEnhance,
    RemoveBackground,
    VanGogh,
    Picasso,
    Watercolor,
    UkiyoE,
    Abstract,
    SuperResolution,
}

impl From<AssistArg> for ImageAssist {
    fn from(value: AssistArg) -> Self {
        match value {
            AssistArg::AutoEnhance => ImageAssist::AutoEnhance,
            AssistArg::RemoveBackground => ImageAssist::RemoveBackground,
            AssistArg::VanGogh => ImageAssist::StyleTransfer(Style::VanGogh),
            AssistArg::Picasso => ImageAssist::StyleTransfer(Style::Picasso),
            AssistArg::Watercolor => ImageAssist::StyleTransfer(Style::Watercolor),
            AssistArg::UkiyoE => ImageAssist::StyleTransfer(Style::UkiyoE),
            AssistArg::Abstract => ImageAssist::StyleTransfer(Style::Abstract),
            AssistArg::SuperResolution => ImageAssist::SuperResolution,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EffectArg {
    Normalize,
    FadeIn,
    FadeOut,
    Reverse,
    Echo,
    Reverb,
    NoiseReduction,
    VoiceEnhancement,
    Enhance,
}

impl From<EffectArg> for AudioEffect {
    fn from(value: EffectArg) -> Self {
        match value {
            EffectArg::Normalize => AudioEffect::Normalize,
            EffectArg::FadeIn => AudioEffect::FadeIn,
            EffectArg::FadeOut => AudioEffect::FadeOut,
            EffectArg::Reverse => AudioEffect::Reverse,
            EffectArg::Echo => AudioEffect::Echo,
            EffectArg::Reverb => AudioEffect::Reverb,
            EffectArg::NoiseReduction => AudioEffect::NoiseReduction,
            EffectArg::VoiceEnhancement => AudioEffect::VoiceEnhancement,
            EffectArg::Enhance => AudioEffect::Enhance,
        }
    }
}

fn parse_crop(text: &str) -> Result<CropSelection, String> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("crop coordinates: {err}"))?;
    match values.as_slice() {
        &[x1, y1, x2, y2] => Ok(CropSelection::new((x1, y1), (x2, y2))),
        _ => Err("crop needs four comma separated numbers".into()),
    }
}

fn parse_size(text: &str) -> Result<(i64, i64), String> {
    let (width, height) = text
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| "size must look like WIDTHxHEIGHT".to_string())?;
    let width = geometry::parse_dimension(width).map_err(|err| err.to_string())?;
    let height = geometry::parse_dimension(height).map_err(|err| err.to_string())?;
    Ok((width, height))
}
