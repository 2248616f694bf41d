use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use cgm_calibration::{CalibrationSample, FitParameters, GlucoseUnits, RegressionEngine};

fn main() -> ExitCode {
    cgm_calibration::init_logging();

    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cal-diag error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cal-diag", about = "Calibration diagnostics CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        match self.command {
            Command::Fit(args) => fit_command(args),
            Command::Apply(args) => apply_command(args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute slope/intercept from a JSON sample file.
    Fit(FitArgs),
    /// Map raw sensor values through the fit from a JSON sample file.
    Apply(ApplyArgs),
}

#[derive(Args, Debug, Clone)]
struct FitArgs {
    /// Path to a JSON array of calibration samples.
    #[arg(long)]
    input: PathBuf,
    /// Output format for the fit summary.
    #[arg(long, value_enum, default_value_t = FitFormat::Table)]
    format: FitFormat,
    /// Destination file for the fit output (JSON only).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ApplyArgs {
    /// Path to a JSON array of calibration samples.
    #[arg(long)]
    input: PathBuf,
    /// Raw sensor values to map through the fit.
    #[arg(long = "raw", required = true)]
    raw: Vec<f64>,
    /// Units used when printing calibrated values.
    #[arg(long, value_enum, default_value_t = UnitsArg::Mgdl)]
    units: UnitsArg,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum FitFormat {
    Table,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum UnitsArg {
    Mgdl,
    Mmol,
}

impl From<UnitsArg> for GlucoseUnits {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::Mgdl => GlucoseUnits::MgDl,
            UnitsArg::Mmol => GlucoseUnits::MmolL,
        }
    }
}

fn load_samples(path: &Path) -> Result<Vec<CalibrationSample>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading sample file {}", path.display()))?;
    let samples: Vec<CalibrationSample> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing sample file {}", path.display()))?;
    if samples.is_empty() {
        bail!("sample file {} contains no samples", path.display());
    }
    Ok(samples)
}

fn fit_command(args: FitArgs) -> Result<()> {
    let samples = load_samples(&args.input)?;
    let fit = RegressionEngine::fit(&samples);

    if args.out.is_some() && args.format != FitFormat::Json {
        bail!("--out requires --format json");
    }

    match args.format {
        FitFormat::Table => print_fit_table(&samples, &fit),
        FitFormat::Json => {
            let json = serde_json::to_string_pretty(&fit)?;
            match &args.out {
                Some(path) => fs::write(path, json)
                    .with_context(|| format!("writing fit to {}", path.display()))?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn print_fit_table(samples: &[CalibrationSample], fit: &FitParameters) {
    println!("samples    {}", samples.len());
    println!("slope      {:.2}", fit.slope);
    println!("intercept  {:.2}", fit.intercept);
    if fit.is_identity() {
        println!("note       degenerate sample set, identity fit");
    }
}

fn apply_command(args: ApplyArgs) -> Result<()> {
    let samples = load_samples(&args.input)?;
    let fit = RegressionEngine::fit(&samples);
    let units = GlucoseUnits::from(args.units);

    for raw in &args.raw {
        if !raw.is_finite() {
            bail!("raw value {raw} is not finite");
        }
        let calibrated = units.from_mgdl(fit.apply(*raw));
        println!("{raw} -> {calibrated:.2} {units}");
    }

    Ok(())
}
