use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam_channel::unbounded;
use padgen::config::CoreConfig;
use padgen::driver::{process_chart, ConversionContext};
use padgen::events::{ChartId, InputChart};
use padgen::pad::PadDescriptor;
use padgen::performed_chart::SubstitutionCache;
use padgen::seed::rng_for;
use padgen::sm::bpm::normalize_and_tidy_bpms;
use padgen::sm::notes::{events_from_note_data, render_note_data};
use padgen::sm::parse::{decode_bytes, extract_sections};
use padgen::sm::simfile::open as open_simfile;
use padgen::step_graph::{BodyOrientation, NodeId, StepGraph};
use padgen::step_types::{Foot, FootPortion, ALL_FEET};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Converts StepMania `.sm`/`.ssc` simfiles from one pad layout to another
/// by re-expressing and re-performing their step charts.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of simfiles to convert (searched recursively).
    input_dir: PathBuf,

    /// Directory converted simfiles are written to.
    output_dir: PathBuf,

    /// Pad layout charts are read from ("dance-single" or "dance-double").
    #[arg(long, default_value = "dance-single")]
    from: String,

    /// Pad layout charts are converted to ("dance-single" or "dance-double").
    #[arg(long, default_value = "dance-double")]
    to: String,

    /// Path to a TOML configuration file; defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker thread count for the song-conversion pool.
    #[arg(long, default_value_t = 4)]
    jobs: usize,
}

fn pad_for_name(name: &str) -> Option<PadDescriptor> {
    match name {
        "dance-single" => Some(PadDescriptor::dance_single()),
        "dance-double" => Some(PadDescriptor::dance_double()),
        _ => None,
    }
}

fn version_tag() -> String {
    format!("[FG v{}] ", padgen::PADGEN_VERSION)
}

fn find_simfiles(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else { return out };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(find_simfiles(&path));
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("sm" | "ssc")) {
            out.push(path);
        }
    }
    out
}

/// Reads, converts every chart matching `from_pad`'s layout, and writes a
/// reconstructed simfile containing the converted charts under `to_pad`.
fn convert_one_file(
    path: &Path,
    output_dir: &Path,
    context: &ConversionContext<'_>,
) -> anyhow::Result<()> {
    let opened = open_simfile(path)?;
    let sections = extract_sections(&opened.data, opened.extension)?;

    let title = sections.title.map(decode_bytes).unwrap_or_default().into_owned();
    let artist = sections.artist.map(decode_bytes).unwrap_or_default().into_owned();
    let bpms = sections.bpms.map(decode_bytes).map(|b| normalize_and_tidy_bpms(&b)).unwrap_or_default();
    let offset = sections.offset.map(decode_bytes).unwrap_or_default().into_owned();

    let mut rendered_charts = Vec::new();
    for entry in &sections.notes_list {
        if entry.field_count < 5 {
            continue;
        }
        let steps_type = decode_bytes(entry.fields[0]).into_owned();
        if steps_type != context.input_pad.name {
            continue;
        }
        let difficulty = decode_bytes(entry.fields[2]).into_owned();
        let chart_id = ChartId { title: title.clone(), steps_type: steps_type.clone(), difficulty: difficulty.clone() };

        let events = events_from_note_data(entry.note_data, context.input_pad.num_arrows);
        let total_rows = events.iter().map(|e| e.position().row).max().unwrap_or(0) as usize + 1;
        let input = InputChart { events };

        let seed_source = format!("{}:{}:{}", path.display(), steps_type, difficulty);
        let mut rng = rng_for(&seed_source, 0);

        match process_chart(context, &chart_id, &input, &mut rng) {
            Ok(output) => {
                let note_data = render_note_data(&output.events, context.output_pad.num_arrows, total_rows);
                rendered_charts.push((difficulty, note_data));
            }
            Err(err) => {
                error!(chart = %chart_id, error = %err, "failed to convert chart, skipping");
            }
        }
    }

    if rendered_charts.is_empty() {
        warn!(file = %path.display(), "no charts matched the requested source layout, skipping file");
        return Ok(());
    }

    let tag = version_tag();
    let mut out = String::new();
    out.push_str(&format!("#TITLE:{title};\n"));
    out.push_str(&format!("#ARTIST:{tag}{artist};\n"));
    out.push_str(&format!("#OFFSET:{offset};\n"));
    out.push_str(&format!("#BPMS:{bpms};\n"));
    for (difficulty, note_data) in rendered_charts {
        out.push_str("#NOTES:\n");
        out.push_str(&format!("     {}:\n", context.output_pad.name));
        out.push_str(&format!("     {tag}converted from {}:\n", context.input_pad.name));
        out.push_str(&format!("     {difficulty}:\n"));
        out.push_str("     1:\n");
        out.push_str("     0,0,0,0,0:\n");
        out.push_str(&note_data);
        out.push_str(";\n");
    }

    fs::create_dir_all(output_dir)?;
    let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("converted.sm"));
    fs::write(output_dir.join(file_name), out)?;
    info!(file = %path.display(), "converted simfile written");
    Ok(())
}

/// Groups the output graph's plausible starting stances into ordered
/// equivalence-class tiers for the root-tier fallback search: the literal
/// root first, then every other simple (non-bracketed, non-held, normal
/// orientation) stance grouped by its total arrow-distance from the root's
/// feet, closest first. This is what lets a singles-to-doubles conversion
/// fall back from a failed centre-centre start to progressively
/// further-out two-footed stances instead of giving up on tier 0 alone.
fn build_root_tiers(graph: &StepGraph) -> Vec<Vec<NodeId>> {
    let root_node = graph.node(graph.root);
    let root_left = root_node.portion(Foot::Left, FootPortion::Heel).arrow;
    let root_right = root_node.portion(Foot::Right, FootPortion::Heel).arrow;
    let (Some(root_left), Some(root_right)) = (root_left, root_right) else {
        return vec![vec![graph.root]];
    };

    let mut by_distance: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for index in 0..graph.len() {
        let id = NodeId(index as u32);
        if id == graph.root {
            continue;
        }
        let node = graph.node(id);
        if node.orientation != BodyOrientation::Normal {
            continue;
        }
        if ALL_FEET.iter().any(|&foot| {
            node.foot_is_holding(foot) || node.portion(foot, FootPortion::Toe).is_valid()
        }) {
            continue;
        }
        let left = node.portion(Foot::Left, FootPortion::Heel).arrow;
        let right = node.portion(Foot::Right, FootPortion::Heel).arrow;
        let (Some(left), Some(right)) = (left, right) else {
            continue;
        };
        if left == right {
            continue;
        }
        let distance = root_left.abs_diff(left) + root_right.abs_diff(right);
        by_distance.entry(distance).or_default().push(id);
    }

    let mut tiers = vec![vec![graph.root]];
    tiers.extend(by_distance.into_values());
    tiers
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let input_pad = pad_for_name(&args.from).ok_or_else(|| anyhow::anyhow!("unknown pad layout {:?}", args.from))?;
    let output_pad = pad_for_name(&args.to).ok_or_else(|| anyhow::anyhow!("unknown pad layout {:?}", args.to))?;
    input_pad.assert_mirror_symmetric()?;
    output_pad.assert_mirror_symmetric()?;

    let config = match &args.config {
        Some(path) => CoreConfig::from_file(path, output_pad.num_arrows)?,
        None => CoreConfig::default_for(output_pad.num_arrows),
    };

    // Build both StepGraphs in parallel, per the concurrency model: graph
    // construction is pure and independent of the song corpus.
    let (input_graph, output_graph) = thread::scope(|scope| {
        let input_handle = scope.spawn(|| StepGraph::build(&input_pad, config.max_bracket_separation));
        let output_handle = scope.spawn(|| StepGraph::build(&output_pad, config.max_bracket_separation));
        (input_handle.join().unwrap(), output_handle.join().unwrap())
    });

    let substitution_cache = SubstitutionCache::build(&output_graph, &config);
    let root_node_tiers = build_root_tiers(&output_graph);

    let context = Arc::new(ConversionContext {
        input_pad: &input_pad,
        input_graph: &input_graph,
        output_pad: &output_pad,
        output_graph: &output_graph,
        substitution_cache: &substitution_cache,
        config: &config,
        root_node_tiers: &root_node_tiers,
    });

    let files = find_simfiles(&args.input_dir);
    info!(count = files.len(), "discovered simfiles to convert");

    let (sender, receiver) = unbounded::<PathBuf>();
    for file in files {
        sender.send(file)?;
    }
    drop(sender);

    thread::scope(|scope| {
        for _ in 0..args.jobs.max(1) {
            let receiver = receiver.clone();
            let context = Arc::clone(&context);
            let output_dir = args.output_dir.clone();
            scope.spawn(move || {
                while let Ok(path) = receiver.recv() {
                    if let Err(err) = convert_one_file(&path, &output_dir, &context) {
                        error!(file = %path.display(), error = %err, "failed to convert file");
                    }
                }
            });
        }
    });

    Ok(())
}
