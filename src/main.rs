use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_htslib::bam::{self, Read as BamRead};
use tracing_subscriber::EnvFilter;

use moray::alleles::{AlleleType, DirectionType};
use moray::calling::ChromosomeProcessor;
use moray::config::CallerConfig;
use moray::io::{decode_alignment, load_reference, write_vcf};
use moray::reference::ChrReference;
use moray::region::RegionStateManager;

#[derive(Parser, Debug)]
#[command(name = "moray", about = "Streaming somatic small-variant caller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call variants on one chromosome from a coordinate-sorted BAM.
    Call {
        /// Aligned reads (BAM).
        bam: PathBuf,
        /// Reference sequence (FASTA or raw sequence file).
        reference: PathBuf,
        /// Chromosome to process.
        #[arg(long, default_value = "chr1")]
        chrom: String,
        /// Positions per cache block.
        #[arg(long, default_value_t = 1000)]
        block_size: u32,
        /// Minimum base quality for an observation to count.
        #[arg(long, default_value_t = 20)]
        min_base_quality: u8,
        /// Minimum Phred variant quality for an unfiltered call.
        #[arg(long, default_value_t = 20.0)]
        min_quality: f64,
        /// Minimum depth for an unfiltered call.
        #[arg(long, default_value_t = 10)]
        min_coverage: u32,
        /// Minimum allele frequency for an unfiltered call.
        #[arg(long, default_value_t = 0.01)]
        min_frequency: f64,
        /// Also emit reference calls.
        #[arg(long)]
        reference_calls: bool,
        /// Output VCF path (stdout if omitted).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a per-position count table for a region of a BAM.
    Pileup {
        /// Aligned reads (BAM).
        bam: PathBuf,
        /// Reference sequence (FASTA or raw sequence file).
        reference: PathBuf,
        /// Chromosome to inspect.
        #[arg(long, default_value = "chr1")]
        chrom: String,
        /// First position (1-based).
        #[arg(long)]
        start: u32,
        /// Last position (1-based).
        #[arg(long)]
        end: u32,
        /// Minimum base quality for an observation to count.
        #[arg(long, default_value_t = 20)]
        min_base_quality: u8,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Call {
            bam,
            reference,
            chrom,
            block_size,
            min_base_quality,
            min_quality,
            min_coverage,
            min_frequency,
            reference_calls,
            output,
        } => {
            let config = CallerConfig {
                block_size,
                min_base_quality,
                ..CallerConfig::default()
            }
            .with_min_variant_quality(min_quality)
            .with_min_coverage(min_coverage)
            .with_min_frequency(min_frequency)
            .with_reference_calls(reference_calls);
            run_call(bam, reference, chrom, config, output)
        }
        Commands::Pileup {
            bam,
            reference,
            chrom,
            start,
            end,
            min_base_quality,
        } => run_pileup(bam, reference, chrom, start, end, min_base_quality),
    }
}

fn open_chromosome(
    bam_path: &PathBuf,
    reference_path: &PathBuf,
    chrom: &str,
) -> Result<(bam::Reader, i32, ChrReference)> {
    let reference = load_reference(reference_path, chrom)?;
    let reader = bam::Reader::from_path(bam_path)
        .with_context(|| format!("failed to open BAM {}", bam_path.display()))?;
    let tid = reader
        .header()
        .tid(chrom.as_bytes())
        .with_context(|| format!("chromosome '{}' not found in BAM header", chrom))?;
    Ok((reader, tid as i32, reference))
}

fn run_call(
    bam_path: PathBuf,
    reference_path: PathBuf,
    chrom: String,
    config: CallerConfig,
    output: Option<PathBuf>,
) -> Result<()> {
    let (mut reader, tid, reference) = open_chromosome(&bam_path, &reference_path, &chrom)?;
    let min_base_quality = config.min_base_quality;
    let mut processor = ChromosomeProcessor::new(chrom.clone(), config, Some(reference.clone()))
        .context("failed to initialize pipeline")?;

    let mut calls = Vec::new();
    let mut frontier = 0u32;
    for result in reader.records() {
        let record = result?;
        if record.tid() != tid || record.is_unmapped() {
            continue;
        }
        let position = (record.pos() + 1) as u32;
        let (observations, candidates) = decode_alignment(&record, &reference, min_base_quality);
        processor
            .add_alignment(&observations, candidates)
            .context("failed to record alignment")?;
        if position > frontier {
            frontier = position;
            calls.extend(processor.process_up_to(frontier)?);
        }
    }
    calls.extend(processor.finish()?);

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_vcf(&mut writer, &calls)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            write_vcf(&mut writer, &calls)?;
        }
    }
    Ok(())
}

fn run_pileup(
    bam_path: PathBuf,
    reference_path: PathBuf,
    chrom: String,
    start: u32,
    end: u32,
    min_base_quality: u8,
) -> Result<()> {
    anyhow::ensure!(start >= 1 && end >= start, "invalid region {start}-{end}");
    let (mut reader, tid, reference) = open_chromosome(&bam_path, &reference_path, &chrom)?;
    let mut state = RegionStateManager::new(chrom.as_str(), 1000)
        .context("failed to initialize state")?;

    for result in reader.records() {
        let record = result?;
        if record.tid() != tid || record.is_unmapped() {
            continue;
        }
        let (observations, _) = decode_alignment(&record, &reference, min_base_quality);
        state.add_allele_counts(&observations)?;
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "chrom\tpos\tdepth\tA\tC\tG\tT\tN\tdel")?;
    for position in start..=end {
        let depth = state.get_depth(position);
        if depth == 0 {
            continue;
        }
        let count = |allele: AlleleType| -> u32 {
            [
                DirectionType::Forward,
                DirectionType::Reverse,
                DirectionType::Stitched,
            ]
            .into_iter()
            .map(|direction| state.get_allele_count(position, allele, direction))
            .sum()
        };
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            chrom,
            position,
            depth,
            count(AlleleType::A),
            count(AlleleType::C),
            count(AlleleType::G),
            count(AlleleType::T),
            count(AlleleType::N),
            count(AlleleType::Deletion),
        )?;
    }
    Ok(())
}
