use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use voxedit_benchmark::EditMetrics;
use voxedit_storage::{ChunkStorage, DirStorage};
use voxedit_world::{
    BlockTypeSet, BoundingBox, CancelToken, Channel, CopyOptions, Coords, Dimension, DimensionConfig, FillOptions,
    FnProgress, LightUpdate, Replacement, Selection, Shape, ShapedSelection, Vector, copy_blocks, copy_within,
    get_blocks, relight_selection, replace_blocks,
};

#[derive(Parser)]
#[command(name = "voxedit", about = "Fill, copy and relight regions of a chunked voxel world")]
pub struct Args {
    /// World directory holding one file per chunk
    #[arg(short, long, env = "VOXEDIT_WORLD", default_value = "world")]
    pub world: PathBuf,

    /// Number of decoded chunks kept in memory
    #[arg(long, env = "VOXEDIT_CACHE", default_value = "256")]
    pub cache: usize,

    /// JSON block palette; the built-in classic palette when omitted
    #[arg(long, env = "VOXEDIT_PALETTE")]
    pub palette: Option<PathBuf>,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub min_y: i32,

    #[arg(long, default_value = "256", allow_hyphen_values = true)]
    pub max_y: i32,

    #[command(subcommand)]
    pub command: Command,
}

/// Corners of the edited region, both inclusive, plus an optional brush shape.
#[derive(clap::Args, Clone)]
pub struct Region {
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    pub from: Vector<i32>,

    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    pub to: Vector<i32>,

    /// sphere, box, square, diamond or cylinder; the plain box when omitted
    #[arg(long)]
    pub shape: Option<Shape>,

    #[arg(long)]
    pub hollow: bool,

    /// Percentage of shell cells kept
    #[arg(long, default_value = "100")]
    pub chance: f64,

    #[arg(long, default_value = "0")]
    pub seed: u64,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum Lights {
    None,
    Deferred,
    Immediate,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fill a region with one block
    Fill {
        #[command(flatten)]
        region: Region,
        #[arg(long)]
        block: String,
        /// Only overwrite these blocks
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Allocate chunks that do not exist yet
        #[arg(long)]
        create: bool,
        #[arg(long)]
        no_lights: bool,
    },
    /// Replace blocks inside a region, `old=new` per pair
    Replace {
        #[command(flatten)]
        region: Region,
        #[arg(required = true)]
        pairs: Vec<String>,
        #[arg(long)]
        no_lights: bool,
    },
    /// Copy a region to another place, optionally from another world
    Copy {
        #[command(flatten)]
        region: Region,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        dest: Vector<i32>,
        /// Read from this world instead of the edited one
        #[arg(long)]
        source_world: Option<PathBuf>,
        #[arg(long)]
        no_air: bool,
        #[arg(long)]
        no_entities: bool,
        #[arg(long)]
        biomes: bool,
        /// Only copy these blocks
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Block used for source blocks the palette does not know
        #[arg(long)]
        unknown: Option<String>,
        #[arg(long, value_enum, default_value = "deferred")]
        lights: Lights,
    },
    /// Recompute height maps and light in a region
    Relight {
        #[command(flatten)]
        region: Region,
    },
    /// Print what is stored at one position
    Get {
        #[arg(value_parser = parse_point, allow_hyphen_values = true)]
        at: Vector<i32>,
    },
    /// Print dimension and palette details
    Info,
}

fn parse_point(text: &str) -> std::result::Result<Vector<i32>, String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z but got '{}'", text));
    };
    let parse = |s: &str| s.parse::<i32>().map_err(|e| format!("bad coordinate '{}': {}", s, e));
    Ok(Vector::new(parse(x)?, parse(y)?, parse(z)?))
}

impl Region {
    fn bounds(&self) -> BoundingBox {
        let min = self.from.min_elem(self.to);
        let max = self.from.max_elem(self.to) + Vector::new(1, 1, 1);
        BoundingBox::from_min_max(min, max)
    }

    fn selection(&self) -> Box<dyn Selection + Send> {
        let bounds = self.bounds();
        match self.shape {
            None if !self.hollow && self.chance >= 100.0 => Box::new(bounds),
            shape => Box::new(
                ShapedSelection::new(bounds, shape.unwrap_or(Shape::Square))
                    .hollow(self.hollow)
                    .chance(self.chance, self.seed),
            ),
        }
    }
}

fn load_palette(path: Option<&Path>) -> Result<Arc<BlockTypeSet>> {
    let Some(path) = path else {
        return Ok(Arc::new(BlockTypeSet::classic()));
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read palette {}", path.display()))?;
    let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "custom".to_string());
    Ok(Arc::new(BlockTypeSet::from_json(name, &json)?))
}

fn open_dimension(args: &Args, root: &Path, blocktypes: Arc<BlockTypeSet>, metrics: Arc<EditMetrics>) -> Result<Dimension> {
    let storage: Arc<dyn ChunkStorage> = Arc::new(DirStorage::new(root)?);
    let config = DimensionConfig {
        name: root.display().to_string(),
        min_y: args.min_y,
        max_y: args.max_y,
        cache_capacity: args.cache,
        ..Default::default()
    };
    Ok(Dimension::new(config, blocktypes, storage, metrics))
}

fn block_key(blocktypes: &BlockTypeSet, text: &str) -> Result<(u16, u8)> {
    Ok(blocktypes.parse(text)?.key())
}

type ProgressSender = mpsc::UnboundedSender<(usize, usize, String)>;

/// Runs one command to completion on the calling thread.
fn run(args: Args, metrics: Arc<EditMetrics>, token: CancelToken, progress_tx: ProgressSender) -> Result<String> {
    let blocktypes = load_palette(args.palette.as_deref())?;
    let mut dim = open_dimension(&args, &args.world, blocktypes.clone(), metrics.clone())?;
    let mut progress = FnProgress::with_token(
        move |done, total, status: &str| {
            let _ = progress_tx.send((done, total, status.to_string()));
        },
        token,
    );

    let summary = match &args.command {
        Command::Fill { region, block, only, create, no_lights } => {
            let target = block_key(&blocktypes, block)?;
            let replacement = if only.is_empty() {
                Replacement::fill(target.0, target.1)
            } else {
                let only = only.iter().map(|b| block_key(&blocktypes, b)).collect::<Result<Vec<_>>>()?;
                Replacement::fill_only(target.0, target.1, only)
            };
            let options = FillOptions { update_lights: !no_lights, create: *create };
            let report = replace_blocks(&mut dim, region.selection().as_ref(), &replacement, options, &mut progress)?;
            format!("{:#?}", report)
        }
        Command::Replace { region, pairs, no_lights } => {
            let mut table = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let Some((from, to)) = pair.split_once('=') else {
                    bail!("Replacement '{}' is not of the form old=new", pair);
                };
                table.push((vec![block_key(&blocktypes, from)?], block_key(&blocktypes, to)?));
            }
            let options = FillOptions { update_lights: !no_lights, create: false };
            let report =
                replace_blocks(&mut dim, region.selection().as_ref(), &Replacement::Table(table), options, &mut progress)?;
            format!("{:#?}", report)
        }
        Command::Copy { region, dest, source_world, no_air, no_entities, biomes, only, unknown, lights } => {
            let only = only.iter().map(|b| block_key(&blocktypes, b).map(|k| k.0)).collect::<Result<Vec<_>>>()?;
            let options = CopyOptions {
                blocks_to_copy: (!only.is_empty()).then_some(only),
                entities: !no_entities,
                biomes: *biomes,
                create: true,
                update_lights: match lights {
                    Lights::None => LightUpdate::None,
                    Lights::Deferred => LightUpdate::Deferred,
                    Lights::Immediate => LightUpdate::Immediate,
                },
                replace_unknown_with: unknown.as_deref().map(|b| blocktypes.parse(b)).transpose()?,
                copy_air: !no_air,
            };
            let selection = region.selection();
            let report = match source_world {
                Some(root) => {
                    let mut source = open_dimension(&args, root, blocktypes.clone(), metrics.clone())?;
                    copy_blocks(&mut dim, &mut source, selection.as_ref(), *dest, &options, &mut progress)?
                }
                None => copy_within(&mut dim, selection.as_ref(), *dest, &options, &mut progress)?,
            };
            format!("{:#?}", report)
        }
        Command::Relight { region } => {
            let report = relight_selection(&mut dim, region.selection().as_ref(), &mut progress)?;
            format!("{:#?}", report)
        }
        Command::Get { at } => {
            let coords = Coords::from_points(&[*at]);
            let values = get_blocks(&mut dim, &coords, &Channel::ALL)?;
            if !values.present[0] {
                format!("{} is not in a stored chunk", at)
            } else {
                let pick = |v: &Option<Vec<u8>>| v.as_ref().map_or(0, |v| v[0]);
                let id = values.blocks.as_ref().map_or(0, |v| v[0]);
                let meta = pick(&values.data);
                let name = blocktypes.get(id, meta).map_or_else(|| format!("{}:{}", id, meta), |t| t.to_string());
                format!(
                    "{}: {}\n  block light {}, sky light {}, biome {}",
                    at,
                    name,
                    pick(&values.block_light),
                    pick(&values.sky_light),
                    pick(&values.biomes)
                )
            }
        }
        Command::Info => {
            let positions = dim.chunk_positions()?;
            format!(
                "Dimension {} bounds {}\nPalette {:?}\nStored chunks: {}",
                dim.name(),
                dim.bounds(),
                dim.blocktypes(),
                positions.len()
            )
        }
    };

    let written = dim.flush()?;
    log::info!("Wrote {} chunks to {}", written, args.world.display());
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.max_y <= args.min_y {
        bail!("--max-y ({}) must be above --min-y ({})", args.max_y, args.min_y);
    }

    let summary = format!("world {} (cache {} chunks)", args.world.display(), args.cache);
    let metrics = Arc::new(EditMetrics::new(summary));
    let token = CancelToken::new();

    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping at the next chunk");
            ctrl_c_token.cancel();
        }
    });

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(usize, usize, String)>();
    let printer = tokio::spawn(async move {
        let mut last = None;
        while let Some((done, total, status)) = progress_rx.recv().await {
            let percent = if total > 0 { done * 100 / total } else { 100 };
            if last != Some((percent, status.clone())) {
                eprintln!("{}: {}% ({}/{})", status, percent, done, total);
                last = Some((percent, status));
            }
        }
    });

    let worker_metrics = metrics.clone();
    let result = tokio::task::spawn_blocking(move || run(args, worker_metrics, token, progress_tx))
        .await
        .context("Edit task panicked")?;
    let _ = printer.await;

    let report = result?;
    println!("{}", report);
    println!("{}", metrics.generate_report());
    Ok(())
}
