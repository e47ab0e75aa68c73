use clap::{Parser, Subcommand};

/// Review of ballot write-ins: queues, double vote checks and ballot image focus.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the election: contests, cast vote records, write-ins
    /// and ballot image layouts. See the manual of the library for the format.
    #[clap(short, long, value_parser)]
    pub election: String,

    /// (file path, 'stdout' or empty) If specified and the command changed the election, the
    /// updated election is written in JSON format to the given location. Pass the path of the
    /// election file to update it in place.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the expected output in JSON format. If provided,
    /// wiadj will check that the output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Total and pending write-ins, for one contest or for all of them.
    Metadata {
        #[clap(long, value_parser)]
        contest: Option<String>,
    },
    /// The write-ins of a contest, in review order.
    Queue {
        #[clap(long, value_parser)]
        contest: String,
    },
    /// The first write-in of a contest that is not adjudicated yet.
    FirstPending {
        #[clap(long, value_parser)]
        contest: String,
    },
    /// A write-in with the rest of its ballot.
    Context {
        #[clap(long, value_parser)]
        write_in: String,
    },
    /// The official and write-in candidates of a contest.
    Candidates {
        #[clap(long, value_parser)]
        contest: String,
    },
    /// The stored write-ins, ordered by ballot. Filters are combined.
    Records {
        #[clap(long, value_parser)]
        contest: Option<String>,
        #[clap(long, value_parser)]
        cvr: Option<String>,
        #[clap(long, value_parser)]
        write_in: Option<String>,
    },
    /// Registers a write-in candidate.
    AddCandidate {
        #[clap(long, value_parser)]
        contest: String,
        #[clap(long, value_parser)]
        name: String,
    },
    /// Resolves a write-in.
    Adjudicate {
        #[clap(long, value_parser)]
        write_in: String,
        /// One of official-candidate, write-in-candidate, invalid.
        #[clap(long = "type", value_parser)]
        adjudication_type: String,
        /// The candidate id, for the official-candidate and write-in-candidate types.
        #[clap(long, value_parser)]
        candidate: Option<String>,
        /// Reject the command if the write-in is no longer at this version.
        #[clap(long, value_parser)]
        expected_version: Option<u64>,
        /// Commit even if the ballot would be counted twice for the candidate.
        #[clap(long, takes_value = false)]
        confirm: bool,
    },
    /// Where to draw the ballot image of a write-in.
    View {
        #[clap(long, value_parser)]
        write_in: String,
        /// 'in' (the default) centers the write-in, 'out' shows the whole ballot.
        #[clap(long, value_parser, default_value = "in")]
        zoom: String,
        /// (WIDTHxHEIGHT, optional) Overrides the viewport of the election settings.
        #[clap(long, value_parser)]
        viewport: Option<String>,
    },
}

impl Command {
    /// True for the commands that may change the election.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Command::AddCandidate { .. } | Command::Adjudicate { .. })
    }
}
