use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdfmark::{
    Compression, Coordinate, FlatInputPolicy, ImageIoSize, ImageWatermark, OutputFormat,
    OutputOptions, TextStyle, TextWatermark, WatermarkJob, WatermarkOptions, WatermarkSource,
    WatermarkStyle,
};

#[derive(Parser, Debug)]
#[command(name = "pdfmark", version)]
struct Cli {
    /// Print progress diagnostics (paths, sizes, scale factors).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watermark with an image file.
    Image(ImageArgs),
    /// Watermark with rendered text.
    Text(TextArgs),
    /// Run a JSON job file.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Source document.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Destination file.
    #[arg(long)]
    out: PathBuf,

    /// Clockwise rotation of the watermark in degrees.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    degrees: f64,

    /// Scale the watermark to the page width and center it vertically.
    #[arg(long)]
    autofit: bool,

    /// Left offset of the watermark in pixels (ignored with --autofit).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    x: f64,

    /// Top offset of the watermark in pixels (ignored with --autofit).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    y: f64,

    /// Watermark opacity multiplier, 0..=1.
    #[arg(long, default_value_t = 1.0)]
    opacity: f64,

    /// Uniform output scale factor.
    #[arg(long, default_value_t = 1.0)]
    out_scale: f64,

    /// Rasterization density for PDF input, in dots per inch.
    #[arg(long)]
    resolution: Option<f64>,

    /// Output container.
    #[arg(long, value_enum, default_value_t = FormatChoice::Pdf)]
    format: FormatChoice,

    /// Page compression inside PDF output.
    #[arg(long, value_enum, default_value_t = CompressionChoice::Jpeg)]
    compression: CompressionChoice,

    /// JPEG quality, 1..=100.
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Write only the first page.
    #[arg(long)]
    first_page_only: bool,

    /// Watermark single-page sources (flat images, one-page PDFs) instead of rejecting them.
    #[arg(long)]
    allow_flat: bool,
}

#[derive(Args, Debug)]
struct ImageArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Watermark image.
    #[arg(long)]
    watermark: PathBuf,
}

#[derive(Args, Debug)]
struct TextArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Watermark text.
    #[arg(long)]
    text: String,

    /// Font family, generic family, or font file.
    #[arg(long, default_value = "sans-serif")]
    font: String,

    /// Font size in points.
    #[arg(long, default_value_t = 48.0)]
    point_size: f64,

    /// Font weight (100..=900; 0 for regular).
    #[arg(long, default_value_t = 0)]
    weight: u16,

    /// Fill color, named or hex.
    #[arg(long, default_value = "black")]
    color: String,

    /// Fill opacity, 0..=1.
    #[arg(long, default_value_t = 0.3)]
    text_opacity: f64,

    /// Text canvas width in pixels.
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Text canvas height in pixels.
    #[arg(long, default_value_t = 120.0)]
    height: f64,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Job JSON file.
    #[arg(long)]
    job: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Pdf,
    Jpeg,
    Png,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompressionChoice {
    Jpeg,
    Lossless,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut job = match cli.cmd {
        Command::Image(args) => {
            let style = style_from(&args.common);
            job_from(
                &args.common,
                WatermarkSource::Image(ImageWatermark {
                    style,
                    file: args.watermark,
                }),
            )
        }
        Command::Text(args) => {
            let style = style_from(&args.common);
            let text_style = TextStyle {
                size: Coordinate::new(args.width, args.height),
                font: args.font,
                point_size: args.point_size,
                weight: args.weight,
                color: args.color,
                opacity: args.text_opacity,
            };
            job_from(
                &args.common,
                WatermarkSource::Text(TextWatermark {
                    style,
                    text_style,
                    text: args.text,
                }),
            )
        }
        Command::Run(args) => WatermarkJob::load(&args.job)?,
    };
    job.options.debug |= cli.debug;

    let created = ensure_parent_dir(&job.destination)?;
    if let Err(err) = job.run() {
        remove_created_dirs(&created);
        return Err(anyhow::Error::new(err).context(format!(
            "watermark '{}' -> '{}'",
            job.source.display(),
            job.destination.display()
        )));
    }

    eprintln!("wrote {}", job.destination.display());
    Ok(())
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn style_from(args: &CommonArgs) -> WatermarkStyle {
    WatermarkStyle {
        opacity: args.opacity,
        degrees: args.degrees,
        autofit: args.autofit,
        position: Coordinate::new(args.x, args.y),
    }
}

fn job_from(args: &CommonArgs, watermark: WatermarkSource) -> WatermarkJob {
    let format = match args.format {
        FormatChoice::Pdf => OutputFormat::Pdf,
        FormatChoice::Jpeg => OutputFormat::Jpeg,
        FormatChoice::Png => OutputFormat::Png,
    };
    let compression = match args.compression {
        CompressionChoice::Jpeg => Compression::Jpeg,
        CompressionChoice::Lossless => Compression::Lossless,
    };

    WatermarkJob {
        source: args.in_path.clone(),
        destination: args.out.clone(),
        watermark,
        io: ImageIoSize {
            in_resolution: args.resolution.map(|dpi| Coordinate::new(dpi, dpi)),
            out_scale: args.out_scale,
        },
        options: WatermarkOptions {
            debug: false,
            output: OutputOptions {
                format,
                compression,
                quality: args.quality,
                write_all_pages: !args.first_page_only,
            },
            flat_input: if args.allow_flat {
                FlatInputPolicy::SinglePage
            } else {
                FlatInputPolicy::Reject
            },
        },
    }
}

/// Create the destination's parent directory. Returns the directories that did not exist before,
/// deepest first.
fn ensure_parent_dir(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(Vec::new());
    };
    let missing: Vec<PathBuf> = parent
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| !p.exists())
        .map(Path::to_path_buf)
        .collect();
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create output dir '{}'", parent.display()))?;
    Ok(missing)
}

fn remove_created_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        // Stops at the first directory that is no longer empty.
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
    }
}
