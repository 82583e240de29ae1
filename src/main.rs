use bitfont::{load, save, LoadOptions, Location, Operation, SaveOptions, Stream};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};

#[derive(Parser)]
#[command(name = "bitfont", version, about = "Convert and transform bitmap fonts")]
struct Cli {
    /// File, directory or bundle to read; stdin if omitted
    #[arg(short, long, default_value = "")]
    infile: String,
    /// File, directory or bundle to write; stdout if omitted
    #[arg(short, long, default_value = "")]
    outfile: String,
    /// Replace an existing output file
    #[arg(long)]
    overwrite: bool,
    /// Log debug messages
    #[arg(long)]
    debug: bool,
    /// Input format; identified from the file if omitted
    #[arg(short, long, default_value = "")]
    from: String,
    /// Output format; chosen by extension if omitted
    #[arg(short, long, default_value = "")]
    to: String,
    /// Loader option, repeatable
    #[arg(long = "load-option", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    load_options: Vec<(String, String)>,
    /// Saver option, repeatable
    #[arg(long = "save-option", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    save_options: Vec<(String, String)>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct Margins {
    #[arg(long, default_value = "0")]
    left: usize,
    #[arg(long, default_value = "0")]
    top: usize,
    #[arg(long, default_value = "0")]
    right: usize,
    #[arg(long, default_value = "0")]
    bottom: usize,
}

#[derive(Args, Clone, Copy)]
struct Factors {
    #[arg(long, default_value = "1")]
    factor_x: usize,
    #[arg(long, default_value = "1")]
    factor_y: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert without changing glyphs
    Convert,
    /// Reverse glyphs horizontally
    Mirror,
    /// Reverse glyphs vertically
    Flip,
    /// Swap glyph rows and columns
    Transpose,
    /// Rotate glyphs by quarter turns, clockwise
    Rotate {
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        turns: i32,
    },
    /// Swap ink and paper
    Invert,
    /// Remove pixels from the glyph edges
    Crop(Margins),
    /// Add blank pixels at the glyph edges
    Expand(Margins),
    /// Scale glyphs up by whole factors
    Stretch(Factors),
    /// Scale glyphs down by whole factors
    Shrink {
        #[command(flatten)]
        factors: Factors,
        /// Shrink even if pixels are lost
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    fn operation(&self) -> Operation {
        match *self {
            Commands::Convert           => Operation::Convert,
            Commands::Mirror            => Operation::Mirror,
            Commands::Flip              => Operation::Flip,
            Commands::Transpose         => Operation::Transpose,
            Commands::Rotate { turns }  => Operation::Rotate { turns },
            Commands::Invert            => Operation::Invert,
            Commands::Crop(m)           => Operation::Crop { left: m.left, top: m.top, right: m.right, bottom: m.bottom },
            Commands::Expand(m)         => Operation::Expand { left: m.left, top: m.top, right: m.right, bottom: m.bottom },
            Commands::Stretch(f)        => Operation::Stretch { factor_x: f.factor_x, factor_y: f.factor_y },
            Commands::Shrink { factors: f, force } => Operation::Shrink { factor_x: f.factor_x, factor_y: f.factor_y, force },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let operation = cli.command.operation();
    let load_opts = LoadOptions { format: cli.from, options: cli.load_options };
    let save_opts = SaveOptions { format: cli.to, options: cli.save_options, overwrite: cli.overwrite };

    // ── Load ─────────────────────────────────────────────────────────────────
    let pack = if cli.infile.is_empty() {
        let mut stdin = Stream::stdin()?;
        load(Location::Stream(&mut stdin), Location::Empty, &load_opts)?
    } else {
        load(Location::from(cli.infile.as_str()), Location::Empty, &load_opts)?
    };
    info!("Loaded {} font(s).", pack.len());

    // ── Transform ────────────────────────────────────────────────────────────
    debug!("Applying {}.", operation.name());
    let pack = operation.apply_pack(&pack)?;

    // ── Save ─────────────────────────────────────────────────────────────────
    if cli.outfile.is_empty() {
        let mut stdout = Stream::stdout()?;
        match save(&pack, Location::Stream(&mut stdout), Location::Empty, &save_opts) {
            Err(e) if e.is_broken_pipe() => return Ok(()),
            other => other?,
        }
        stdout.close()?;
    } else {
        save(&pack, Location::from(cli.outfile.as_str()), Location::Empty, &save_opts)?;
    }
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    Ok((key.trim().to_owned(), value.to_owned()))
}
