use crate::config::{LayoutDirection, load_config};
use crate::layout_dump::LayoutDump;
use crate::persist::parse_document;
use crate::registry::default_registry;
use crate::render::{render_svg, write_output_svg};
use crate::service::{DiagramService, InlineRunner};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "fge",
    version,
    about = "Workflow graph editor core: lay out and export flow documents"
)]
pub struct Args {
    /// Input document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for svg/layout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (json5 accepted)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout direction override
    #[arg(short = 'd', long = "direction", value_enum)]
    pub direction: Option<DirectionArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    /// Geometry as JSON, for debugging and golden comparisons
    Layout,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DirectionArg {
    Lr,
    Td,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(direction) = args.direction {
        config.layout.direction = match direction {
            DirectionArg::Lr => LayoutDirection::LeftRight,
            DirectionArg::Td => LayoutDirection::TopDown,
        };
    }

    let input = read_input(args.input.as_deref())?;
    let document = parse_document(default_registry(), &input)?;

    let mut service = DiagramService::with_runner(
        document,
        config.theme.clone(),
        config.layout.clone(),
        InlineRunner::default(),
    );
    service.refresh();
    service.settle()?;
    let layout = service
        .current_layout()
        .ok_or_else(|| anyhow::anyhow!("layout did not settle"))?;

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(layout, &config.theme, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            #[cfg(feature = "png")]
            {
                let svg = render_svg(layout, &config.theme, &config.render);
                let output = ensure_output(&args.output, "png")?;
                crate::render::write_output_png(&svg, &output, &config.render)?;
            }
            #[cfg(not(feature = "png"))]
            return Err(anyhow::anyhow!(
                "png output requires building with the 'png' feature"
            ));
        }
        OutputFormat::Layout => match &args.output {
            Some(path) => {
                crate::layout_dump::write_layout_dump(path, layout, &config.layout)?;
            }
            None => {
                let dump = LayoutDump::from_layout(layout, &config.layout);
                println!("{}", serde_json::to_string_pretty(&dump)?);
            }
        },
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return Ok(std::fs::read_to_string(path)?);
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(feature = "png")]
fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
