// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for building and querying Sequence Bloom Trees.

use clap::{Parser, Subcommand};
use howdesbt::bitvector::Compressor;
use howdesbt::bloom::HashParams;
use howdesbt::build::{self, BuildKind};
use howdesbt::config::{Config, CullingThreshold};
use howdesbt::container::{self, file_manager::FileManager};
use howdesbt::query::{self, Query};
use howdesbt::tree::Tree;
use howdesbt::Error;
use std::path::{Path, PathBuf};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("HOWDESBT_LOG")
        .init();
}

/// CLI tool for building and querying Sequence Bloom Trees
#[derive(Parser, Debug)]
#[command(name = "howdesbt")]
#[command(about = "Sequence Bloom Tree construction and query engine")]
struct ToolArgs {
    /// Suppress all output except for errors. Overrides -v.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Cluster a list of leaf filters into a tree topology
    Cluster {
        /// File listing one leaf filter path per line
        #[arg(long = "list")]
        list_file: PathBuf,

        /// Where to write the resulting topology file
        #[arg(long = "tree")]
        tree_path: PathBuf,

        /// Template for internal node names; must contain "{number}"
        #[arg(long = "node-template", default_value = "node{number}.bf")]
        node_template: String,

        /// Culling ratio in [0, 1]: internal nodes below it are pruned
        #[arg(long = "cull", conflicts_with = "cull_zscore")]
        cull: Option<f64>,

        /// Culling threshold as mean - z * stdev over observed ratios
        #[arg(long = "cullzscore", conflicts_with = "cull")]
        cull_zscore: Option<f64>,

        /// Clustering window as "start:end" bit offsets
        #[arg(long = "window")]
        window: Option<String>,
    },

    /// Materialize a topology's internal-node filters
    Build {
        /// Topology file to build
        topology: PathBuf,

        /// Build Simple-kind filters (leaf union, no pruning)
        #[arg(long, conflicts_with_all = ["allsome", "determined", "determined_brief", "howde", "intersection"])]
        simple: bool,

        /// Build AllSome-kind filters
        #[arg(long, conflicts_with_all = ["simple", "determined", "determined_brief", "howde", "intersection"])]
        allsome: bool,

        /// Build Determined-kind filters
        #[arg(long, conflicts_with_all = ["simple", "allsome", "determined_brief", "howde", "intersection"])]
        determined: bool,

        /// Build DeterminedBrief-kind filters (squeezed B_how)
        #[arg(long = "determined-brief", conflicts_with_all = ["simple", "allsome", "determined", "howde", "intersection"])]
        determined_brief: bool,

        /// DeterminedBrief filters saved with RRR compression (the default production kind)
        #[arg(long, conflicts_with_all = ["simple", "allsome", "determined", "determined_brief", "intersection"])]
        howde: bool,

        /// Build the debug Intersection-kind filters instead of a production kind
        #[arg(long)]
        intersection: bool,

        /// Save filters uncompressed (plain bit vectors)
        #[arg(long, conflicts_with_all = ["rrr", "roar"])]
        uncompressed: bool,

        /// Save filters RRR-compressed (default)
        #[arg(long, conflicts_with_all = ["uncompressed", "roar"])]
        rrr: bool,

        /// Save filters Roaring-compressed
        #[arg(long, conflicts_with_all = ["uncompressed", "rrr"])]
        roar: bool,

        /// Don't replace constant vectors with AllZeros/AllOnes on save
        #[arg(long = "no-simplify")]
        no_simplify: bool,
    },

    /// Query a built tree with one or more FASTA files
    Query {
        /// Topology file of an already-built tree
        topology: PathBuf,

        /// Query FASTA file(s), optionally suffixed with ":threshold"
        queries: Vec<String>,

        /// Default threshold for files with no per-file override
        #[arg(long = "threshold", default_value_t = 0.9)]
        threshold: f64,

        /// Descend every subtree to report exact per-leaf passed counts
        #[arg(long)]
        counted: bool,

        /// Deduplicate each query's hash positions before traversal
        #[arg(long)]
        dedupe: bool,

        /// Print a false-positive-adjusted k-mer count alongside each match
        #[arg(long = "adjust-counts")]
        adjust_counts: bool,

        /// Print each match's estimated false-positive rate
        #[arg(long = "report-fp-rate")]
        report_fp_rate: bool,

        /// Skip internal-node pruning; evaluate every leaf directly (Simple trees only)
        #[arg(long = "leaf-only")]
        leaf_only: bool,
    },

    /// Print version information, or introspect a container file's components
    Version {
        /// List the named components stored in a container file without decoding them
        #[arg(long = "list-file")]
        list_file: Option<PathBuf>,
    },
}

fn parse_window(spec: &str) -> Result<(u64, u64), String> {
    let (start, end) = spec
        .split_once(':')
        .ok_or_else(|| format!("expected \"start:end\", got {spec:?}"))?;
    let start: u64 = start.parse().map_err(|_| format!("bad window start {start:?}"))?;
    let end: u64 = end.parse().map_err(|_| format!("bad window end {end:?}"))?;
    Ok((start, end))
}

/// Reads a leaf-list file (one filter path per line, blanks and `#`
/// comments ignored) into `(node name, path)` pairs, deriving each
/// node's name from its filename (spec.md §1's "cluster command's
/// leaf-discovery file list").
fn read_leaf_list(path: &Path) -> howdesbt::Result<Vec<(String, PathBuf)>> {
    let text = std::fs::read_to_string(path)?;
    let mut leaves = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let leaf_path = PathBuf::from(line);
        let name = leaf_path
            .file_stem()
            .map_or_else(|| line.to_string(), |s| s.to_string_lossy().into_owned());
        leaves.push((name, leaf_path));
    }
    Ok(leaves)
}

/// Finds the first leaf in the tree and loads its filter just to read
/// off the shared `HashParams` every filter in the tree agrees on
/// (spec.md §3: hash parameters are shared across a whole tree).
fn tree_hash_params(tree: &Tree) -> howdesbt::Result<HashParams> {
    let mut first_leaf: Option<(String, PathBuf)> = None;
    tree.root.walk_preorder(&mut |n| {
        if !n.is_dummy && n.is_leaf() && first_leaf.is_none() {
            first_leaf = Some((n.name.clone(), n.filename.clone()));
        }
    });
    let (name, path) = first_leaf.ok_or_else(|| Error::Structure("tree has no leaves".to_string()))?;
    let mut fm = FileManager::new();
    fm.register_node(&path, &name);
    let filter = howdesbt::tree::io::load_filter(&path, &name, &mut fm)?;
    Ok(*filter.params())
}

/// A minimal FASTA reader: concatenates every sequence line under a
/// `>` header into one byte string per record. FASTA parsing proper is
/// out of scope for the library (spec.md §1); this is just enough to
/// turn query files into raw sequence bytes for the CLI.
fn read_fasta(path: &Path) -> std::io::Result<Vec<(String, Vec<u8>)>> {
    let text = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_seq = Vec::new();
    for line in text.lines() {
        if let Some(header) = line.strip_prefix('>') {
            if let Some(name) = current_name.take() {
                records.push((name, std::mem::take(&mut current_seq)));
            }
            current_name = Some(header.split_whitespace().next().unwrap_or(header).to_string());
        } else {
            current_seq.extend(line.trim().bytes());
        }
    }
    if let Some(name) = current_name {
        records.push((name, current_seq));
    }
    Ok(records)
}

fn run_cluster(
    list_file: PathBuf,
    tree_path: PathBuf,
    node_template: String,
    cull: Option<f64>,
    cull_zscore: Option<f64>,
    window: Option<String>,
) -> howdesbt::Result<()> {
    if !node_template.contains("{number}") {
        die!("--node-template must contain the literal substring \"{{number}}\"");
    }
    let leaves = read_leaf_list(&list_file)?;
    log::info!("clustering {} leaves from {}", leaves.len(), list_file.display());

    let mut config = Config::new();
    config.culling = match (cull, cull_zscore) {
        (Some(ratio), None) => CullingThreshold::Explicit(ratio),
        (None, Some(z)) => CullingThreshold::ZScore(z),
        (None, None) => CullingThreshold::Disabled,
        (Some(_), Some(_)) => unreachable!("clap rejects --cull with --cullzscore"),
    };
    if let Some(spec) = window {
        let (start, end) = parse_window(&spec).unwrap_or_else(|e| die!("{}", e));
        config.cluster_window = Some((start, end));
    }

    let base_dir = tree_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let tree = howdesbt::cluster::cluster(&leaves, &config, &base_dir, &node_template)?;
    tree.save_topology(&tree_path)?;
    log::info!("wrote topology to {}", tree_path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_build(
    topology: PathBuf,
    simple: bool,
    allsome: bool,
    determined: bool,
    _determined_brief: bool,
    howde: bool,
    intersection: bool,
    uncompressed: bool,
    _rrr: bool,
    roar: bool,
    no_simplify: bool,
) -> howdesbt::Result<()> {
    let kind = if intersection {
        BuildKind::Intersection
    } else if simple {
        BuildKind::Simple
    } else if allsome {
        BuildKind::AllSome
    } else if determined {
        BuildKind::Determined
    } else {
        // determined-brief and howde (determined-brief + RRR) share a
        // kind; howde only additionally pins the compressor below.
        BuildKind::DeterminedBrief
    };

    let compressor = if howde {
        Compressor::Rrr
    } else if uncompressed {
        Compressor::Plain
    } else if roar {
        Compressor::Roaring
    } else {
        Compressor::Rrr
    };

    let config = Config::new().with_compressor(compressor).with_simplify(!no_simplify);

    let mut tree = Tree::load_topology(&topology)?;
    log::info!("building {kind:?} tree from {}", topology.display());
    build::build(&mut tree, kind, &config)?;
    tree.save_topology(&topology)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_query(
    topology: PathBuf,
    queries: Vec<String>,
    default_threshold: f64,
    counted: bool,
    dedupe: bool,
    adjust_counts: bool,
    report_fp_rate: bool,
    leaf_only: bool,
) -> howdesbt::Result<()> {
    if queries.is_empty() {
        die!("query requires at least one FASTA file");
    }
    let mut tree = Tree::load_topology(&topology)?;
    let params = tree_hash_params(&tree)?;
    let config = Config::new().with_counted_mode(counted);

    for spec in queries {
        let (path_str, threshold) = match spec.rsplit_once(':') {
            Some((p, t)) if t.parse::<f64>().is_ok() => (p, t.parse().expect("just checked")),
            _ => (spec.as_str(), default_threshold),
        };
        let path = Path::new(path_str);
        let records = read_fasta(path)?;
        log::info!("querying {} sequences from {}", records.len(), path.display());

        let mut prep_config = Config::new();
        prep_config.dedupe_query_positions = dedupe;
        let mut batch: Vec<Query> = records
            .iter()
            .filter_map(|(name, seq)| Query::prepare(name.clone(), seq, threshold, &params, &prep_config))
            .collect();

        if leaf_only {
            query::run_leaf_only(&mut tree, &mut batch)?;
        } else {
            query::run_batch(&mut tree, &mut batch, &config)?;
        }

        for q in &batch {
            println!("*{} {} {}", q.name, q.matches.len(), q.num_positions());
            for m in &q.matches {
                print!("{} {} {}", m.leaf_name, m.num_passed, m.num_positions);
                if adjust_counts {
                    if let Some(adjusted) = m.adjusted_count {
                        print!(" adjusted={adjusted}");
                    }
                }
                if report_fp_rate {
                    print!(" fpr={:.6}", params.false_positive_rate());
                }
                println!();
            }
        }
    }
    Ok(())
}

fn run_version(list_file: Option<PathBuf>) -> howdesbt::Result<()> {
    if let Some(path) = list_file {
        let mut file = std::fs::File::open(&path)?;
        let components = container::probe_components(&mut file).map_err(Error::from)?;
        println!("{}: {} component(s)", path.display(), components.len());
        for c in components {
            println!(
                "  {} kind={:?} compressor={:?}{} bytes={}",
                c.name.as_deref().unwrap_or("<unnamed>"),
                c.kind,
                c.compressor,
                if c.stored_as_plain { " (stored as plain)" } else { "" },
                c.num_bytes
            );
        }
    } else {
        println!("howdesbt {}", env!("CARGO_PKG_VERSION"));
    }
    Ok(())
}

fn main() {
    let args = ToolArgs::parse();
    init_logging(args.quiet, args.verbose);

    let result = match args.command {
        ToolCommand::Cluster {
            list_file,
            tree_path,
            node_template,
            cull,
            cull_zscore,
            window,
        } => run_cluster(list_file, tree_path, node_template, cull, cull_zscore, window),
        ToolCommand::Build {
            topology,
            simple,
            allsome,
            determined,
            determined_brief,
            howde,
            intersection,
            uncompressed,
            rrr,
            roar,
            no_simplify,
        } => run_build(
            topology,
            simple,
            allsome,
            determined,
            determined_brief,
            howde,
            intersection,
            uncompressed,
            rrr,
            roar,
            no_simplify,
        ),
        ToolCommand::Query {
            topology,
            queries,
            threshold,
            counted,
            dedupe,
            adjust_counts,
            report_fp_rate,
            leaf_only,
        } => run_query(topology, queries, threshold, counted, dedupe, adjust_counts, report_fp_rate, leaf_only),
        ToolCommand::Version { list_file } => run_version(list_file),
    };

    if let Err(e) = result {
        die!("error: {}", e);
    }
}
