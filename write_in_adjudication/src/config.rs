// ********* Input data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type ElectionId = String;
pub type ContestId = String;
pub type CandidateId = String;
pub type OptionId = String;
pub type CvrId = String;
pub type WriteInId = String;

/// A bounding box inside a ballot image, in image pixels.
#[derive(PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// An entry of the official roster of a contest.
///
/// Rosters usually carry placeholder entries for the write-in slots
/// themselves. Those are flagged with `is_write_in` and are never valid
/// adjudication targets.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(rename = "isWriteIn", default)]
    pub is_write_in: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    #[serde(default)]
    pub title: String,
    pub candidates: Vec<Candidate>,
}

/// The bubble-marked selections of one cast ballot, per contest.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRecord {
    pub id: CvrId,
    #[serde(default)]
    pub votes: BTreeMap<ContestId, Vec<OptionId>>,
}

/// A write-in slot as reported by ballot ingestion, before it is stored.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NewWriteIn {
    /// Generated when not provided.
    pub id: Option<WriteInId>,
    pub cvr_id: CvrId,
    pub contest_id: ContestId,
    pub option_id: OptionId,
    pub is_unmarked: bool,
}

// ********* Adjudication outcome ***********

/// The three ways a write-in can be resolved, without their payload.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjudicationType {
    OfficialCandidate,
    WriteInCandidate,
    Invalid,
}

impl AdjudicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjudicationType::OfficialCandidate => "official-candidate",
            AdjudicationType::WriteInCandidate => "write-in-candidate",
            AdjudicationType::Invalid => "invalid",
        }
    }
}

impl FromStr for AdjudicationType {
    type Err = AdjudicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "official-candidate" => Ok(AdjudicationType::OfficialCandidate),
            "write-in-candidate" => Ok(AdjudicationType::WriteInCandidate),
            "invalid" => Ok(AdjudicationType::Invalid),
            x => Err(AdjudicationError::UnknownAdjudicationType(x.to_string())),
        }
    }
}

impl Display for AdjudicationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The resolution of a write-in, with the payload each variant requires.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(tag = "adjudicationType", rename_all = "kebab-case")]
pub enum Adjudication {
    OfficialCandidate {
        #[serde(rename = "candidateId")]
        candidate_id: CandidateId,
    },
    WriteInCandidate {
        #[serde(rename = "candidateId")]
        candidate_id: CandidateId,
    },
    Invalid,
}

impl Adjudication {
    /// Builds an adjudication out of the loose request fields.
    ///
    /// The two candidate variants need a non-empty candidate id, `invalid`
    /// must not carry one.
    pub fn from_parts(
        adjudication_type: AdjudicationType,
        candidate_id: Option<CandidateId>,
    ) -> Result<Adjudication, AdjudicationError> {
        match (adjudication_type, candidate_id) {
            (AdjudicationType::OfficialCandidate, Some(cid)) if !cid.is_empty() => {
                Ok(Adjudication::OfficialCandidate { candidate_id: cid })
            }
            (AdjudicationType::WriteInCandidate, Some(cid)) if !cid.is_empty() => {
                Ok(Adjudication::WriteInCandidate { candidate_id: cid })
            }
            (AdjudicationType::Invalid, None) => Ok(Adjudication::Invalid),
            (AdjudicationType::Invalid, Some(cid)) => Err(AdjudicationError::UnexpectedCandidateId {
                candidate_id: cid,
            }),
            (t, _) => Err(AdjudicationError::MissingCandidateId {
                adjudication_type: t,
            }),
        }
    }

    pub fn adjudication_type(&self) -> AdjudicationType {
        match self {
            Adjudication::OfficialCandidate { .. } => AdjudicationType::OfficialCandidate,
            Adjudication::WriteInCandidate { .. } => AdjudicationType::WriteInCandidate,
            Adjudication::Invalid => AdjudicationType::Invalid,
        }
    }

    pub fn candidate_id(&self) -> Option<&str> {
        match self {
            Adjudication::OfficialCandidate { candidate_id }
            | Adjudication::WriteInCandidate { candidate_id } => Some(candidate_id.as_str()),
            Adjudication::Invalid => None,
        }
    }

    /// The candidate this adjudication credits, if any.
    pub fn target(&self) -> Option<CandidateTarget> {
        match self {
            Adjudication::OfficialCandidate { candidate_id } => {
                Some(CandidateTarget::OfficialCandidate(candidate_id.clone()))
            }
            Adjudication::WriteInCandidate { candidate_id } => {
                Some(CandidateTarget::WriteInCandidate(candidate_id.clone()))
            }
            Adjudication::Invalid => None,
        }
    }
}

/// A candidate a write-in may be credited to.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum CandidateTarget {
    OfficialCandidate(CandidateId),
    WriteInCandidate(CandidateId),
}

impl CandidateTarget {
    pub fn candidate_id(&self) -> &str {
        match self {
            CandidateTarget::OfficialCandidate(cid) | CandidateTarget::WriteInCandidate(cid) => {
                cid.as_str()
            }
        }
    }
}

impl From<CandidateTarget> for Adjudication {
    fn from(target: CandidateTarget) -> Adjudication {
        match target {
            CandidateTarget::OfficialCandidate(candidate_id) => {
                Adjudication::OfficialCandidate { candidate_id }
            }
            CandidateTarget::WriteInCandidate(candidate_id) => {
                Adjudication::WriteInCandidate { candidate_id }
            }
        }
    }
}

impl Display for CandidateTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateTarget::OfficialCandidate(cid) => write!(f, "official-candidate:{}", cid),
            CandidateTarget::WriteInCandidate(cid) => write!(f, "write-in-candidate:{}", cid),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteInStatus {
    Pending,
    Adjudicated(Adjudication),
}

impl WriteInStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, WriteInStatus::Pending)
    }
}

// ******** Stored records *********

/// One handwritten selection slot on a cast ballot.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WriteIn {
    pub id: WriteInId,
    #[serde(rename = "electionId")]
    pub election_id: ElectionId,
    #[serde(rename = "contestId")]
    pub contest_id: ContestId,
    #[serde(rename = "optionId")]
    pub option_id: OptionId,
    #[serde(rename = "cvrId")]
    pub cvr_id: CvrId,
    #[serde(rename = "isUnmarked", default)]
    pub is_unmarked: bool,
    pub status: WriteInStatus,
    /// Ingestion order. The adjudication queue is sorted on it.
    pub sequence: u64,
    /// Bumped by every persisted transition.
    #[serde(default)]
    pub version: u64,
}

impl WriteIn {
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn adjudication(&self) -> Option<&Adjudication> {
        match &self.status {
            WriteInStatus::Pending => None,
            WriteInStatus::Adjudicated(adj) => Some(adj),
        }
    }
}

/// A candidate discovered during adjudication. Scoped to one contest.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WriteInCandidate {
    pub id: CandidateId,
    #[serde(rename = "electionId")]
    pub election_id: ElectionId,
    #[serde(rename = "contestId")]
    pub contest_id: ContestId,
    pub name: String,
}

/// Where a write-in sits on the scanned ballot image.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ImageView {
    #[serde(rename = "writeInId")]
    pub write_in_id: WriteInId,
    #[serde(rename = "cvrId")]
    pub cvr_id: CvrId,
    /// Opaque handle (url or path) understood by whoever renders the image.
    pub image: String,
    #[serde(rename = "ballotBounds")]
    pub ballot_bounds: Rect,
    #[serde(rename = "contestBounds")]
    pub contest_bounds: Rect,
    #[serde(rename = "writeInBounds")]
    pub write_in_bounds: Rect,
}

// ******** Query results *********

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QueueMetadata {
    #[serde(rename = "contestId")]
    pub contest_id: ContestId,
    #[serde(rename = "totalTally")]
    pub total_tally: u64,
    #[serde(rename = "pendingTally")]
    pub pending_tally: u64,
}

/// Everything needed to check a write-in for double votes.
///
/// Related write-ins are the other write-ins of the same ballot.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AdjudicationContext {
    #[serde(rename = "writeIn")]
    pub write_in: WriteIn,
    #[serde(rename = "relatedWriteIns")]
    pub related_write_ins: Vec<WriteIn>,
    #[serde(rename = "cvrId")]
    pub cvr_id: CvrId,
    #[serde(rename = "cvrVotes")]
    pub cvr_votes: BTreeMap<ContestId, BTreeSet<OptionId>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateListing {
    #[serde(rename = "contestId")]
    pub contest_id: ContestId,
    pub official: Vec<Candidate>,
    #[serde(rename = "writeIn")]
    pub write_in: Vec<WriteInCandidate>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Hash)]
pub struct WriteInFilter {
    pub contest_id: Option<ContestId>,
    pub cvr_id: Option<CvrId>,
    pub write_in_id: Option<WriteInId>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AdjudicationRequest {
    pub write_in_id: WriteInId,
    pub adjudication_type: AdjudicationType,
    pub candidate_id: Option<CandidateId>,
    /// When set, the command is rejected if the stored version differs.
    pub expected_version: Option<u64>,
}

impl AdjudicationRequest {
    pub fn new(
        write_in_id: &str,
        adjudication_type: AdjudicationType,
        candidate_id: Option<&str>,
    ) -> AdjudicationRequest {
        AdjudicationRequest {
            write_in_id: write_in_id.to_string(),
            adjudication_type,
            candidate_id: candidate_id.map(|s| s.to_string()),
            expected_version: None,
        }
    }

    pub fn with_expected_version(self, version: u64) -> AdjudicationRequest {
        AdjudicationRequest {
            expected_version: Some(version),
            ..self
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AdjudicationOutcome {
    /// The write-in already had the requested adjudication. Nothing was written.
    Unchanged(WriteIn),
    Applied {
        previous: WriteInStatus,
        write_in: WriteIn,
        /// A write-in candidate removed because nothing references it any more.
        pruned_candidate: Option<CandidateId>,
    },
}

impl AdjudicationOutcome {
    pub fn write_in(&self) -> &WriteIn {
        match self {
            AdjudicationOutcome::Unchanged(w) => w,
            AdjudicationOutcome::Applied { write_in, .. } => write_in,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, AdjudicationOutcome::Applied { .. })
    }
}

// ******** Errors *********

/// Machine readable category of an [AdjudicationError].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ErrorKind {
    /// Rejected before any mutation was attempted.
    Validation,
    NotFound,
    /// A stale write, detected through the write-in version.
    Conflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
        }
    }
}

/// Errors returned by the queries and commands of the engine.
///
/// None of them is fatal: a failed command leaves the store untouched.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AdjudicationError {
    EmptyCandidateName,
    DuplicateCandidateName {
        contest_id: ContestId,
        name: String,
    },
    UnknownAdjudicationType(String),
    MissingCandidateId {
        adjudication_type: AdjudicationType,
    },
    UnexpectedCandidateId {
        candidate_id: CandidateId,
    },
    UnknownCandidate {
        contest_id: ContestId,
        target: CandidateTarget,
    },
    DuplicateWriteIn(WriteInId),
    WriteInNotFound(WriteInId),
    ContestNotFound(ContestId),
    CvrNotFound(CvrId),
    ImageNotFound(WriteInId),
    /// The contest has no write-in to act on.
    EmptyQueue(ContestId),
    StaleWrite {
        write_in_id: WriteInId,
        expected: u64,
        actual: u64,
    },
}

impl AdjudicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdjudicationError::EmptyCandidateName
            | AdjudicationError::DuplicateCandidateName { .. }
            | AdjudicationError::UnknownAdjudicationType(_)
            | AdjudicationError::MissingCandidateId { .. }
            | AdjudicationError::UnexpectedCandidateId { .. }
            | AdjudicationError::UnknownCandidate { .. }
            | AdjudicationError::DuplicateWriteIn(_) => ErrorKind::Validation,
            AdjudicationError::WriteInNotFound(_)
            | AdjudicationError::ContestNotFound(_)
            | AdjudicationError::CvrNotFound(_)
            | AdjudicationError::ImageNotFound(_)
            | AdjudicationError::EmptyQueue(_) => ErrorKind::NotFound,
            AdjudicationError::StaleWrite { .. } => ErrorKind::Conflict,
        }
    }
}

impl Error for AdjudicationError {}

impl Display for AdjudicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjudicationError::EmptyCandidateName => write!(f, "candidate name is empty"),
            AdjudicationError::DuplicateCandidateName { contest_id, name } => write!(
                f,
                "a candidate named {:?} already exists in contest {}",
                name, contest_id
            ),
            AdjudicationError::UnknownAdjudicationType(t) => {
                write!(f, "unknown adjudication type {:?}", t)
            }
            AdjudicationError::MissingCandidateId { adjudication_type } => {
                write!(f, "adjudication type {} requires a candidate id", adjudication_type)
            }
            AdjudicationError::UnexpectedCandidateId { candidate_id } => write!(
                f,
                "adjudication type invalid does not take a candidate id (got {})",
                candidate_id
            ),
            AdjudicationError::UnknownCandidate { contest_id, target } => {
                write!(f, "{} is not a candidate of contest {}", target, contest_id)
            }
            AdjudicationError::DuplicateWriteIn(id) => write!(f, "write-in {} already exists", id),
            AdjudicationError::WriteInNotFound(id) => write!(f, "write-in {} not found", id),
            AdjudicationError::ContestNotFound(id) => write!(f, "contest {} not found", id),
            AdjudicationError::CvrNotFound(id) => write!(f, "cast vote record {} not found", id),
            AdjudicationError::ImageNotFound(id) => {
                write!(f, "no ballot image for write-in {}", id)
            }
            AdjudicationError::EmptyQueue(id) => {
                write!(f, "contest {} has no write-ins to review", id)
            }
            AdjudicationError::StaleWrite {
                write_in_id,
                expected,
                actual,
            } => write!(
                f,
                "write-in {} is at version {}, expected {}",
                write_in_id, actual, expected
            ),
        }
    }
}

pub type AdjudicationResult<T> = Result<T, AdjudicationError>;

// ********* Configuration **********

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct EngineConfig {
    /// Ratio between the stored ballot images and the coordinate system of
    /// the bounds. Exported images are stored at half resolution.
    pub image_scale: f64,
    pub viewport: Viewport,
    /// Drop a write-in candidate once the last write-in adjudicated for it
    /// is moved to another target.
    pub prune_unreferenced_candidates: bool,
}

impl EngineConfig {
    pub const DEFAULT: EngineConfig = EngineConfig {
        image_scale: 0.5,
        viewport: Viewport {
            width: 1200.0,
            height: 800.0,
        },
        prune_unreferenced_candidates: true,
    };
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::DEFAULT
    }
}
