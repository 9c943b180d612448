use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use splat_import::{LayoutVariant, ReadOptions, SplatCloud, write_ply};

#[derive(Parser)]
#[command(author, version, about = "Inspect and normalize Gaussian splat files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header information without reading the body.
    Info {
        /// Splat file to inspect.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Run the full ingestion pipeline and print summary stats.
    Ingest {
        /// Splat file to ingest.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Produce the layout variant carrying per-point integer ids.
        #[arg(long)]
        point_ids: bool,

        /// Per-channel SH coefficient sets stored in the file.
        #[arg(long, default_value_t = 8)]
        sh_coeffs: usize,

        /// Re-export the canonical records to a binary ply.
        #[arg(long, value_name = "OUT")]
        export: Option<PathBuf>,

        /// SH degree to write when exporting.
        #[arg(long, default_value_t = 3)]
        export_degree: u32,
    },
}

fn info(path: &Path) -> anyhow::Result<()> {
    let header = splat_import::read_ply_header(path)
        .with_context(|| format!("reading header of {}", path.display()))?;

    println!("vertices: {}", header.count);
    println!("stride:   {} bytes", header.stride);
    println!("fields:");
    for (name, ty) in &header.fields {
        println!("  {name} ({ty:?})");
    }
    for comment in &header.comments {
        println!("comment: {comment}");
    }
    Ok(())
}

fn summarize(cloud: &SplatCloud) {
    if cloud.is_empty() {
        println!("0 splats");
        return;
    }

    let mut min = cloud.position(0);
    let mut max = min;
    let mut opacity_sum = 0.0f64;
    for i in 0..cloud.count() {
        let p = cloud.position(i);
        min = min.min(p);
        max = max.max(p);
        opacity_sum += f64::from(cloud.opacity(i));
    }

    println!("splats:   {}", cloud.count());
    println!("bytes:    {}", cloud.as_bytes().len());
    println!("bounds:   {min:.3} .. {max:.3}");
    println!(
        "opacity:  {:.4} mean",
        opacity_sum / cloud.count() as f64
    );
}

fn ingest(
    path: &Path,
    point_ids: bool,
    sh_coeffs: usize,
    export: Option<&Path>,
    export_degree: u32,
) -> anyhow::Result<()> {
    let options = ReadOptions {
        variant: if point_ids {
            LayoutVariant::WithPointIds
        } else {
            LayoutVariant::Standard
        },
        sh_coeffs_per_channel: sh_coeffs,
    };

    let start = Instant::now();
    let cloud = splat_import::read_file(path, &options)
        .with_context(|| format!("ingesting {}", path.display()))?;
    log::info!("Ingested in {:.1?}", start.elapsed());

    summarize(&cloud);

    if let Some(out) = export {
        let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
        write_ply(&cloud, export_degree, &mut BufWriter::new(file))
            .with_context(|| format!("exporting to {}", out.display()))?;
        println!("exported: {}", out.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { path } => info(&path),
        Commands::Ingest {
            path,
            point_ids,
            sh_coeffs,
            export,
            export_degree,
        } => ingest(&path, point_ids, sh_coeffs, export.as_deref(), export_degree),
    }
}
