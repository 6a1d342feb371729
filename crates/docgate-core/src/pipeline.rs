//! The relevance-gated question-answering pipeline.
//!
//! A run moves through a fixed state machine:
//!
//! ```text
//! START -> RETRIEVING -> CLASSIFYING -> { DRAFTING | REFUSED }
//! DRAFTING -> { VERIFYING | REFUSED }
//! VERIFYING -> { ACCEPTED | REJECTED }
//! ```
//!
//! `REFUSED`, `ACCEPTED` and `REJECTED` are terminal. In [`Mode::Lenient`]
//! verification is skipped and a drafted answer ends the run in `UNVERIFIED`
//! with its confidence tag. A rejected answer is surfaced with its report
//! and never retried.
//!
//! Provider failures that exhaust their retries end the run in `REFUSED`
//! with [`RefusalReason::ProviderUnavailable`]. An unparsable verifier reply
//! is returned as [`Error::UnparsableVerification`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::completion::{CompletionOptions, CompletionProvider};
use crate::draft::{is_refusal, AnswerDrafter};
use crate::error::{Error, Result};
use crate::models::{Answer, Confidence, RelevanceLabel, VerificationReport};
use crate::relevance::{RelevanceClassifier, DEFAULT_MAX_PASSAGES};
use crate::search::Retriever;
use crate::verify::Verifier;

/// Number of chunks retrieved per question by default.
pub const DEFAULT_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Start,
    Retrieving,
    Classifying,
    Drafting,
    Verifying,
    Accepted,
    Rejected,
    Refused,
    Unverified,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Accepted
                | PipelineState::Rejected
                | PipelineState::Refused
                | PipelineState::Unverified
        )
    }
}

/// Whether drafted answers must be verified before they are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Strict,
    Lenient,
}

/// Why a run ended in `REFUSED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefusalReason {
    /// Retrieval returned nothing.
    NoContext,
    /// The classifier judged the context irrelevant.
    NoMatch,
    /// The drafter replied with the refusal sentinel.
    DrafterDeclined,
    ProviderUnavailable { provider: String, message: String },
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Accepted {
        answer: Answer,
        report: VerificationReport,
    },
    Rejected {
        answer: Answer,
        report: VerificationReport,
    },
    Refused {
        reason: RefusalReason,
    },
    /// Lenient mode only: the answer was not verified.
    Unverified {
        answer: Answer,
    },
}

impl Outcome {
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Outcome::Accepted { answer, .. }
            | Outcome::Rejected { answer, .. }
            | Outcome::Unverified { answer } => Some(answer),
            Outcome::Refused { .. } => None,
        }
    }

    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            Outcome::Accepted { report, .. } | Outcome::Rejected { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Record of one question's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub question: String,
    /// Visited states in order, starting with `START`.
    pub states: Vec<PipelineState>,
    pub label: Option<RelevanceLabel>,
    pub outcome: Outcome,
}

impl PipelineRun {
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Start)
    }
}

struct Trace {
    question: String,
    states: Vec<PipelineState>,
    label: Option<RelevanceLabel>,
}

impl Trace {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            states: vec![PipelineState::Start],
            label: None,
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(?state, "pipeline transition");
        self.states.push(state);
    }

    fn finish(mut self, state: PipelineState, outcome: Outcome) -> PipelineRun {
        self.enter(state);
        info!(
            final_state = ?state,
            label = ?self.label,
            "pipeline finished"
        );
        PipelineRun {
            question: self.question,
            states: self.states,
            label: self.label,
            outcome,
        }
    }

    fn refuse(self, reason: RefusalReason) -> PipelineRun {
        self.finish(PipelineState::Refused, Outcome::Refused { reason })
    }
}

/// Map provider exhaustion to a refusal; other errors propagate.
fn refusal_for(err: Error) -> Result<RefusalReason> {
    match err {
        Error::ProviderUnavailable { provider, message } => {
            Ok(RefusalReason::ProviderUnavailable { provider, message })
        }
        other => Err(other),
    }
}

/// Sequences retrieval, classification, drafting and verification.
///
/// Construct via [`Pipeline::builder()`].
pub struct Pipeline {
    retriever: Arc<dyn Retriever>,
    classifier: RelevanceClassifier,
    drafter: AnswerDrafter,
    verifier: Verifier,
    mode: Mode,
    k: usize,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Run `question` through the pipeline.
    pub async fn ask(&self, question: &str) -> Result<PipelineRun> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }

        let mut trace = Trace::new(question);

        trace.enter(PipelineState::Retrieving);
        let retrieved = match self.retriever.retrieve(question, self.k).await {
            Ok(r) => r,
            Err(e) => return Ok(trace.refuse(refusal_for(e)?)),
        };
        if retrieved.is_empty() {
            return Ok(trace.refuse(RefusalReason::NoContext));
        }
        let context = retrieved.chunks();

        trace.enter(PipelineState::Classifying);
        let label = match self.classifier.classify(question, &context).await {
            Ok(label) => label,
            Err(e) => return Ok(trace.refuse(refusal_for(e)?)),
        };
        trace.label = Some(label);
        let confidence = match label {
            RelevanceLabel::CanAnswer => Confidence::Normal,
            RelevanceLabel::Partial => Confidence::Low,
            RelevanceLabel::NoMatch => return Ok(trace.refuse(RefusalReason::NoMatch)),
        };

        trace.enter(PipelineState::Drafting);
        let answer = match self.drafter.draft(question, &context, confidence).await {
            Ok(answer) => answer,
            Err(e) => return Ok(trace.refuse(refusal_for(e)?)),
        };
        if is_refusal(&answer.text) {
            return Ok(trace.refuse(RefusalReason::DrafterDeclined));
        }

        if self.mode == Mode::Lenient {
            return Ok(trace.finish(PipelineState::Unverified, Outcome::Unverified { answer }));
        }

        trace.enter(PipelineState::Verifying);
        let report = match self.verifier.verify(question, &answer).await {
            Ok(report) => report,
            Err(e) => return Ok(trace.refuse(refusal_for(e)?)),
        };

        Ok(finish_verified(trace, answer, report))
    }
}

fn finish_verified(trace: Trace, answer: Answer, report: VerificationReport) -> PipelineRun {
    if report.is_acceptable() {
        trace.finish(PipelineState::Accepted, Outcome::Accepted { answer, report })
    } else {
        trace.finish(PipelineState::Rejected, Outcome::Rejected { answer, report })
    }
}

/// Builder for a [`Pipeline`]. The retriever and completion provider are
/// required.
#[derive(Default)]
pub struct PipelineBuilder {
    retriever: Option<Arc<dyn Retriever>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    options: CompletionOptions,
    mode: Mode,
    k: Option<usize>,
    classify_passages: Option<usize>,
}

impl PipelineBuilder {
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    pub fn completion_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn classify_passages(mut self, n: usize) -> Self {
        self.classify_passages = Some(n);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let retriever = self
            .retriever
            .ok_or_else(|| Error::InvalidArgument("retriever is required".to_string()))?;
        let completion = self
            .completion
            .ok_or_else(|| Error::InvalidArgument("completion provider is required".to_string()))?;
        let k = self.k.unwrap_or(DEFAULT_K);
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        let classify_passages = self.classify_passages.unwrap_or(DEFAULT_MAX_PASSAGES);
        if classify_passages == 0 {
            return Err(Error::InvalidArgument(
                "classify_passages must be at least 1".to_string(),
            ));
        }

        Ok(Pipeline {
            retriever,
            classifier: RelevanceClassifier::new(completion.clone(), self.options.clone())
                .with_max_passages(classify_passages),
            drafter: AnswerDrafter::new(completion.clone(), self.options.clone()),
            verifier: Verifier::new(completion, self.options),
            mode: self.mode,
            k,
        })
    }
}
