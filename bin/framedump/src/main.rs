mod error;
mod listing;

use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use error::{DumpError, DumpOutcome};
use jvm_frames::jvm;
use jvm_frames::jvm::class_graph::ClassHierarchy;
use jvm_frames::jvm::code::Node;
use jvm_frames::jvm::verifier::{
    Analyzer, AnalyzerSettings, BasicVerifier, FrameInserter, FrameTracker, TrackerSettings,
};
use jvm_frames::jvm::BinaryName;
use listing::{render_handlers, render_method_header, render_node, render_state, Method};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::{fs, io};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use walkdir::WalkDir;

/// How frames get computed
#[derive(Copy, Clone, Debug)]
enum Mode {
    /// Fixed point over the control flow graph
    Analyze,

    /// Single forward pass, with no merging at control flow joins
    Track,
}

struct Options {
    mode: Mode,
    insert_frames: bool,
    subroutines: bool,
}

fn main() -> io::Result<()> {
    env_logger::init();

    let matches = Command::new("JVM stack map frame dumper")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Compute the frames of the methods in textual JVM method listings")
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("MODE")
                .value_parser(["analyze", "track"])
                .default_value("analyze")
                .help("Sets how frames are computed"),
        )
        .arg(
            Arg::new("insert-frames")
                .long("insert-frames")
                .action(ArgAction::SetTrue)
                .help("Prints listings with frame markers inserted at branch targets"),
        )
        .arg(
            Arg::new("no-subroutines")
                .long("no-subroutines")
                .action(ArgAction::SetTrue)
                .help("Rejects `jsr` and `ret` instructions"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input file or folder")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .get_matches();

    let input_path: PathBuf = match matches.get_one::<PathBuf>("INPUT") {
        Some(path) => path.clone(),
        None => {
            eprintln!("Missing input file or folder");
            exit(2);
        }
    };
    let mode = match matches.get_one::<String>("mode").map(String::as_str) {
        Some("track") => Mode::Track,
        _ => Mode::Analyze,
    };
    let options = Options {
        mode,
        insert_frames: matches.get_flag("insert-frames"),
        subroutines: !matches.get_flag("no-subroutines"),
    };

    // Find all of the listings
    let listings: Vec<PathBuf> = if input_path.is_file() {
        vec![input_path]
    } else {
        WalkDir::new(input_path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|e| {
                e.is_file() && e.extension().map_or(false, |ex| ex == "j" || ex == "jasm")
            })
            .collect()
    };

    // Classes declared in one listing are visible from the ones that follow
    let hierarchy = ClassHierarchy::with_java_library_types();

    let mut count_fail = 0;
    let mut count_error = 0;
    let stdout = StandardStream::stdout(ColorChoice::Auto);
    for listing in listings {
        log::debug!("Dumping frames for {:?}", listing);

        let mut lines = vec![];
        let outcome: DumpOutcome = dump_file(&listing, &options, &hierarchy, &mut lines)
            .map_or_else(DumpOutcome::from, |_| DumpOutcome::Ok);

        let (color, summary, message) = match outcome {
            DumpOutcome::Ok => (Color::Green, b"OK".as_ref(), None),
            DumpOutcome::Fail(msg) => {
                count_fail += 1;
                (Color::Red, b"FAILED".as_ref(), Some(msg))
            }
            DumpOutcome::Error(msg) => {
                count_error += 1;
                (Color::Yellow, b"ERROR".as_ref(), Some(msg))
            }
        };

        let mut s = stdout.lock();
        for line in &lines {
            writeln!(s, "{}", line)?;
        }
        if let Some(message) = message {
            log::error!("{}", message);
            writeln!(s, "; {}", message)?;
        }

        // Print out the listing status
        s.write_all(b" - ")?;
        s.set_color(ColorSpec::new().set_bold(true))?;
        s.write_all(listing.to_string_lossy().as_bytes())?;
        s.set_color(ColorSpec::new().set_dimmed(true))?;
        s.write_all(b" [")?;
        s.set_color(ColorSpec::new().set_fg(Some(color)))?;
        s.write_all(summary)?;
        s.set_color(ColorSpec::new().set_dimmed(true))?;
        s.write_all(b"]\n")?;
        s.reset()?;
    }

    // Exit code
    exit(if count_fail > 0 || count_error > 0 {
        1
    } else {
        0
    })
}

/// Parse a listing and render the frames of each of its methods
///
/// Lines are pushed as methods get processed, so a failure part way through still leaves the
/// output of the methods before it.
fn dump_file(
    path: &Path,
    options: &Options,
    hierarchy: &ClassHierarchy,
    lines: &mut Vec<String>,
) -> Result<(), DumpError> {
    let source = fs::read_to_string(path)?;
    let methods = listing::parse(&source)?;
    let verifier = BasicVerifier::new(hierarchy);

    for method in &methods {
        let this_class = &method.context.this_class;
        if hierarchy.lookup_class(this_class).is_none() {
            log::debug!("Adding {} to the class hierarchy", this_class);
            hierarchy.add_simple_class(this_class.clone(), BinaryName::OBJECT);
        }

        lines.push(format!(".class {}", this_class));
        lines.push(render_method_header(&method.context));
        let dumped = match options.mode {
            Mode::Analyze => analyze_method(method, &verifier, options, lines),
            Mode::Track => track_method(method, &verifier, options, lines),
        };
        dumped.map_err(|error| DumpError::Analysis {
            method: method.context.to_string(),
            error,
        })?;
        lines.push(String::from(".end method"));
        lines.push(String::new());
    }
    Ok(())
}

/// Column at which frame states get printed
const STATE_COLUMN: usize = 40;

fn analyze_method(
    method: &Method,
    verifier: &BasicVerifier<ClassHierarchy>,
    options: &Options,
    lines: &mut Vec<String>,
) -> Result<(), jvm::Error> {
    let settings = if options.subroutines {
        AnalyzerSettings::new()
    } else {
        AnalyzerSettings::without_subroutines()
    };
    let analysis = Analyzer::new(verifier)
        .with_settings(settings)
        .analyze(&method.context, &method.code)?;
    log::info!(
        "Analysis of {} converged after {} iterations",
        method.context,
        analysis.iterations()
    );

    lines.push(format!(".limit stack {}", analysis.max_stack()));
    lines.push(format!(".limit locals {}", analysis.max_locals()));
    lines.extend(render_handlers(method));

    if options.insert_frames {
        let nodes = analysis.insert_frames(&method.code);
        lines.extend(nodes.iter().map(|node| render_node(method, node)));
        return Ok(());
    }

    for (position, node) in method.code.nodes.iter().enumerate() {
        let rendered = render_node(method, node);
        let line = match (node, analysis.frame(position)) {
            (Node::Instruction(_), Some(frame)) => {
                format!("{:<width$} ; {}", rendered, render_state(frame), width = STATE_COLUMN)
            }
            (Node::Instruction(_), None) => {
                format!("{:<width$} ; unreachable", rendered, width = STATE_COLUMN)
            }
            _ => rendered,
        };
        lines.push(line);
    }
    Ok(())
}

fn track_method(
    method: &Method,
    verifier: &BasicVerifier<ClassHierarchy>,
    options: &Options,
    lines: &mut Vec<String>,
) -> Result<(), jvm::Error> {
    let mut tracker = FrameTracker::new(method.context.clone(), verifier, TrackerSettings::new())?;
    lines.extend(render_handlers(method));

    if options.insert_frames {
        let mut inserter = FrameInserter::new(
            tracker,
            method.code.nodes.iter().cloned(),
            method.branch_targets(),
        );
        for node in inserter.by_ref() {
            lines.push(render_node(method, &node?));
        }
        tracker = inserter.into_tracker();
    } else {
        for node in &method.code.nodes {
            let rendered = render_node(method, node);
            let line = match node {
                Node::Instruction(_) => format!(
                    "{:<width$} ; {}",
                    rendered,
                    render_state(tracker.frame()),
                    width = STATE_COLUMN
                ),
                _ => rendered,
            };
            lines.push(line);
            tracker.visit(node)?;
        }
    }

    lines.push(format!(
        "    ; max stack {}, max locals {}",
        tracker.max_stack(),
        tracker.max_locals()
    ));
    Ok(())
}
