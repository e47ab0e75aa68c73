use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use write_in_adjudication::*;

use std::fs;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::review::election_file::*;

pub mod election_file;
pub mod output;

#[derive(Debug, Snafu)]
pub enum ReviewError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the output"))]
    SerializingJson { source: serde_json::Error },

    #[snafu(display("{} error: {}", source.kind().as_str(), source))]
    Adjudication { source: AdjudicationError },

    #[snafu(display("Invalid viewport {viewport:?}, expected WIDTHxHEIGHT"))]
    InvalidViewport { viewport: String },

    #[snafu(display("{message}"))]
    InvalidZoom { message: String },

    #[snafu(display("Write-in {write_in_id} not adjudicated: {kind}. Pass --confirm to commit anyway"))]
    NeedsConfirmation { write_in_id: String, kind: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReviewResult<T> = Result<T, ReviewError>;

/// The printed result of a command, and whether the election changed.
#[derive(PartialEq, Debug, Clone)]
pub struct CommandOutput {
    pub js: JSValue,
    pub changed: bool,
    /// A double vote left unconfirmed. The command fails after printing.
    pub unconfirmed: Option<DoubleVote>,
}

impl CommandOutput {
    fn query(js: JSValue) -> CommandOutput {
        CommandOutput {
            js,
            changed: false,
            unconfirmed: None,
        }
    }
}

fn parse_viewport(viewport: &str) -> ReviewResult<Viewport> {
    let parsed = viewport
        .split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse::<f64>().ok()?, h.trim().parse::<f64>().ok()?)));
    match parsed {
        Some((width, height)) if width > 0.0 && height > 0.0 => Ok(Viewport { width, height }),
        _ => InvalidViewportSnafu { viewport }.fail(),
    }
}

fn adjudicate(
    engine: &AdjudicationEngine,
    write_in_id: &str,
    adjudication_type: &str,
    candidate: &Option<String>,
    expected_version: Option<u64>,
    confirm: bool,
) -> ReviewResult<CommandOutput> {
    let adjudication_type: AdjudicationType =
        adjudication_type.parse().context(AdjudicationSnafu {})?;
    let adjudication = Adjudication::from_parts(adjudication_type, candidate.clone())
        .context(AdjudicationSnafu {})?;

    // The double vote check runs before anything is written.
    let mut advisory = None;
    if let Some(target) = adjudication.target() {
        match engine.precheck(write_in_id, &target).context(AdjudicationSnafu {})? {
            PreCheck::Advisory(dv) if !confirm => {
                warn!(
                    "adjudicate: {} -> {}: {}",
                    write_in_id,
                    target,
                    dv.kind.as_str()
                );
                return Ok(CommandOutput {
                    js: output::needs_confirmation_js(write_in_id, &dv)?,
                    changed: false,
                    unconfirmed: Some(dv),
                });
            }
            PreCheck::Advisory(dv) => advisory = Some(dv),
            PreCheck::Unchanged | PreCheck::Clear => {}
        }
    }

    let mut request = AdjudicationRequest::new(write_in_id, adjudication_type, candidate.as_deref());
    request.expected_version = expected_version;
    let outcome = engine.adjudicate(&request).context(AdjudicationSnafu {})?;
    Ok(CommandOutput {
        js: output::outcome_js(&outcome, advisory.as_ref())?,
        changed: outcome.is_applied(),
        unconfirmed: None,
    })
}

/// Runs one command against the engine.
pub fn run_command(engine: &AdjudicationEngine, command: &Command) -> ReviewResult<CommandOutput> {
    debug!("run_command: {:?}", command);
    let res = match command {
        Command::Metadata { contest } => {
            let metadata = engine
                .queue_metadata(contest.as_deref())
                .context(AdjudicationSnafu {})?;
            CommandOutput::query(output::metadata_js(&metadata)?)
        }
        Command::Queue { contest } => {
            let queue = engine.queue(contest).context(AdjudicationSnafu {})?;
            CommandOutput::query(output::queue_js(contest, &queue))
        }
        Command::FirstPending { contest } => {
            let first = engine.first_pending_id(contest).context(AdjudicationSnafu {})?;
            CommandOutput::query(output::first_pending_js(contest, &first))
        }
        Command::Context { write_in } => {
            let ctx = engine
                .adjudication_context(write_in)
                .context(AdjudicationSnafu {})?;
            CommandOutput::query(output::context_js(&ctx)?)
        }
        Command::Candidates { contest } => {
            let listing = engine.list_candidates(contest).context(AdjudicationSnafu {})?;
            CommandOutput::query(output::candidates_js(&listing)?)
        }
        Command::Records {
            contest,
            cvr,
            write_in,
        } => {
            let filter = WriteInFilter {
                contest_id: contest.clone(),
                cvr_id: cvr.clone(),
                write_in_id: write_in.clone(),
            };
            CommandOutput::query(output::records_js(&engine.write_in_records(&filter))?)
        }
        Command::AddCandidate { contest, name } => {
            let candidate = engine
                .add_candidate(contest, name)
                .context(AdjudicationSnafu {})?;
            CommandOutput {
                js: output::new_candidate_js(&candidate)?,
                changed: true,
                unconfirmed: None,
            }
        }
        Command::Adjudicate {
            write_in,
            adjudication_type,
            candidate,
            expected_version,
            confirm,
        } => adjudicate(
            engine,
            write_in,
            adjudication_type,
            candidate,
            *expected_version,
            *confirm,
        )?,
        Command::View {
            write_in,
            zoom,
            viewport,
        } => {
            let zoom_level: ZoomLevel = zoom
                .parse()
                .map_err(|message| ReviewError::InvalidZoom { message })?;
            let viewport = match viewport {
                Some(v) => Some(parse_viewport(v)?),
                None => None,
            };
            let view = engine.image_view(write_in).context(AdjudicationSnafu {})?;
            let transform = engine
                .focus_transform(write_in, zoom_level, viewport)
                .context(AdjudicationSnafu {})?;
            CommandOutput::query(output::view_js(&view, &transform)?)
        }
    };
    Ok(res)
}

fn read_reference(path: &str) -> ReviewResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Loads the election, runs the command, prints its result and writes the
/// election back if it changed.
pub fn run(args: &Args) -> ReviewResult<CommandOutput> {
    let election = read_election_file(&args.election)?;
    let (engine, settings) = election.into_engine()?;

    let res = run_command(&engine, &args.command)?;
    let pretty_js = serde_json::to_string_pretty(&res.js).context(SerializingJsonSnafu {})?;
    println!("{}", pretty_js);

    match &args.out {
        Some(out) if res.changed => {
            write_election_file(&ElectionFile::from_engine(&engine, settings), out)?;
        }
        Some(out) if !args.command.is_mutation() => {
            warn!("{} is not written: the command does not change the election", out);
        }
        Some(out) => info!("{} is not written: nothing changed", out),
        None => {}
    }

    // The reference output, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let reference = read_reference(reference_p)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {})?;
        if pretty_js_reference != pretty_js {
            warn!("Found differences with the reference output");
            print_diff(pretty_js_reference.as_str(), pretty_js.as_ref(), "\n");
            whatever!("Difference detected between the output and the reference output")
        }
    }

    if let Some(dv) = &res.unconfirmed {
        return NeedsConfirmationSnafu {
            write_in_id: res.js["writeInId"].as_str().unwrap_or_default(),
            kind: dv.kind.as_str(),
        }
        .fail();
    }
    Ok(res)
}
