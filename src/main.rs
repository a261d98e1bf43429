use clap::Parser;
use image_resize::{config, logging, pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "image-resize")]
#[command(about = "Resize a single image to exact or bounding dimensions")]
#[command(long_about = "\
Resize a single image to exact or bounding dimensions

Size constraints (0 or absent = not set):

  --maxwidth/--maxheight   fit inside a box, keep aspect ratio, never upscale
  --width/--height         exact size; with only one given, keep aspect ratio

If any max bound is set it takes precedence over --width/--height.

The output container is chosen from the output extension (case-insensitive):
  .gif  .png  .tif/.tiff  .bmp  anything else -> JPEG

JPEG input is rotated upright from its EXIF orientation tag when the tag is
read before decoding finishes. Transparent images are flattened onto white
unless the output is PNG or --nofill is given.

Run 'image-resize --print-config' for a documented config file.")]
#[command(version)]
struct Cli {
    /// Exact output width
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Exact output height
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// Maximum output width
    #[arg(long, default_value_t = 0)]
    maxwidth: u32,

    /// Maximum output height
    #[arg(long, default_value_t = 0)]
    maxheight: u32,

    /// Input image
    #[arg(long, required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// Output image; the extension selects the container
    #[arg(long, required_unless_present = "print_config")]
    output: Option<PathBuf>,

    /// Center-crop to a square before resizing
    #[arg(long)]
    square: bool,

    /// Keep transparency instead of flattening onto white
    #[arg(long)]
    nofill: bool,

    /// JPEG quality, 1-100 (out of range uses the configured default)
    #[arg(short = 'q', long = "q", allow_negative_numbers = true)]
    quality: Option<i64>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every pipeline decision to stderr
    #[arg(long)]
    verbose: bool,

    /// Print a stock config file with all options documented
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("image-resize: {}", single_line(&err.to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), pipeline::Error> {
    if cli.print_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose);

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        return Err(pipeline::Error::Input(
            "--input and --output are required".into(),
        ));
    };

    let job = pipeline::Job {
        input,
        output,
        width: cli.width,
        height: cli.height,
        max_width: cli.maxwidth,
        max_height: cli.maxheight,
        quality: cli.quality,
        square: cli.square,
        nofill: cli.nofill,
    };
    let outcome = pipeline::run(&job, &config)?;
    debug!(?outcome, "done");
    Ok(())
}

/// Some error sources (TOML parse errors) render over several lines.
fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
