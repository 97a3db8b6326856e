//! Answer synthesis: grounded prompting, one model call, citation parsing.
//!
//! The prompt labels every candidate chunk with a `[S{n}]` reference tag
//! and asks the model to repeat the tags of the sources it used. Tag
//! extraction is a deterministic string-pattern match, kept as an isolated
//! function — a small explicit mini-protocol, not free-form parsing.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{error, info};

use crate::document::{Answer, Citation, ScoredChunk};
use crate::error::Result;
use crate::model::ChatModel;

/// Fixed answer returned without a model call when no candidate survived
/// the similarity floor.
pub const NO_CONTEXT_ANSWER: &str = "No relevant information was found in the uploaded documents. \
     Try rephrasing the question or uploading a related document.";

/// Maximum excerpt length attached to a citation, in characters.
const EXCERPT_CHARS: usize = 200;

/// Builds a grounded prompt from candidate chunks, calls the language
/// model once, and attaches citations to the parsed answer.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl AnswerSynthesizer {
    /// Create a synthesizer over the given model.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Answer `question` from the candidate chunks.
    ///
    /// An empty candidate list short-circuits to [`NO_CONTEXT_ANSWER`]
    /// without calling the remote model. A model failure surfaces as
    /// [`RagError::Synthesis`](crate::RagError::Synthesis) and is not
    /// retried here.
    pub async fn answer(&self, question: &str, candidates: &[ScoredChunk]) -> Result<Answer> {
        if candidates.is_empty() {
            info!("no candidates above the floor, skipping model call");
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
                used_chunk_keys: Vec::new(),
                attribution_confirmed: true,
            });
        }

        let prompt = build_prompt(question, candidates);
        let raw = self.model.complete(&prompt).await.inspect_err(|e| {
            error!(model = self.model.model_id(), error = %e, "model call failed");
        })?;

        let used = extract_source_tags(&raw, candidates.len());
        let attribution_confirmed = !used.is_empty();
        // No tags emitted: list every provided candidate as a potential
        // source and mark the attribution unconfirmed.
        let cited: Vec<usize> =
            if attribution_confirmed { used } else { (0..candidates.len()).collect() };

        let citations: Vec<Citation> = {
            let mut ordered = cited.clone();
            ordered.sort_unstable(); // feed order, not mention order
            ordered.iter().map(|&i| citation_for(&candidates[i])).collect()
        };
        let used_chunk_keys: Vec<String> =
            cited.iter().map(|&i| candidates[i].chunk.key.clone()).collect();

        info!(
            model = self.model.model_id(),
            citations = citations.len(),
            attribution_confirmed,
            "answer synthesized"
        );

        Ok(Answer { text: raw, citations, used_chunk_keys, attribution_confirmed })
    }
}

/// Build the single grounded prompt sent to the model.
///
/// Each candidate is labeled `[S{n}]` with its document, page, and
/// similarity score; the instructions ask the model to answer only from
/// the provided context, tag used sources, and decline explicitly when
/// nothing is relevant.
pub fn build_prompt(question: &str, candidates: &[ScoredChunk]) -> String {
    let mut context = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let chunk = &candidate.chunk;
        let pages = match chunk.page_end {
            Some(end) => format!("pages {}-{}", chunk.page, end),
            None => format!("page {}", chunk.page),
        };
        context.push_str(&format!(
            "[S{}] {}, {}, similarity {:.2}\n{}\n\n",
            i + 1,
            chunk.document,
            pages,
            candidate.score,
            chunk.text
        ));
    }

    format!(
        "You are a document-grounded question answering assistant. Answer the question \
using ONLY the document chunks provided below.\n\
\n\
Rules:\n\
1. Judge relevance yourself: use a chunk only if its content actually bears on the \
question, even when its similarity score is low (a paraphrase may score lower than an \
irrelevant near-duplicate).\n\
2. Ignore chunks that are unrelated to the question; never let them leak into the answer.\n\
3. Synthesize across chunks: combine related information into a structured answer, \
numbering items when there are several.\n\
4. Tag every source you draw from with its reference tag, e.g. [S1] or [S3], inline \
where the information is used.\n\
5. If none of the chunks contain relevant information, reply exactly: \
\"The provided documents do not contain information relevant to this question.\"\n\
\n\
Document chunks:\n\
{context}\
Question: {question}\n\
\n\
Answer:"
    )
}

/// Extract the `[S{n}]` reference tags from model output.
///
/// Returns 0-based candidate indices in order of first mention, deduplicated,
/// with out-of-range tags ignored. `candidate_count` bounds the valid range.
pub fn extract_source_tags(answer: &str, candidate_count: usize) -> Vec<usize> {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let re = TAG.get_or_init(|| Regex::new(r"\[S(\d+)\]").expect("valid tag pattern"));

    let mut seen = Vec::new();
    for cap in re.captures_iter(answer) {
        let Ok(number) = cap[1].parse::<usize>() else { continue };
        if number == 0 || number > candidate_count {
            continue;
        }
        let index = number - 1;
        if !seen.contains(&index) {
            seen.push(index);
        }
    }
    seen
}

/// Build a citation for one candidate, excerpt truncated to a fixed
/// character budget.
fn citation_for(candidate: &ScoredChunk) -> Citation {
    let chunk = &candidate.chunk;
    let excerpt = if chunk.text.chars().count() > EXCERPT_CHARS {
        let cut: String = chunk.text.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        chunk.text.clone()
    };
    Citation { document: chunk.document.clone(), page: chunk.page, score: candidate.score, excerpt }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::document::{Chunk, chunk_key};
    use crate::error::RagError;

    struct CannedModel(String);

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        fn model_id(&self) -> &str {
            "canned"
        }
    }

    /// Fails the test if the remote model is ever invoked.
    struct UnreachableModel;

    #[async_trait]
    impl ChatModel for UnreachableModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            panic!("model must not be called without candidates");
        }

        fn model_id(&self) -> &str {
            "unreachable"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(RagError::Synthesis("service unavailable".to_string()))
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    fn candidate(ordinal: usize, document: &str, page: u32, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                key: chunk_key(document, ordinal),
                document: document.to_string(),
                page,
                page_end: None,
                ordinal,
                text: format!("content of chunk {ordinal} in {document}"),
                embedding: Vec::new(),
                created_at: Utc::now(),
            },
            score,
        }
    }

    #[test]
    fn tags_parse_in_first_mention_order_and_dedup() {
        let answer = "Per [S2] the grade is split [S1], see also [S2] again.";
        assert_eq!(extract_source_tags(answer, 3), vec![1, 0]);
    }

    #[test]
    fn out_of_range_and_zero_tags_are_ignored() {
        let answer = "[S0] invalid, [S4] beyond range, [S3] fine.";
        assert_eq!(extract_source_tags(answer, 3), vec![2]);
    }

    #[test]
    fn untagged_answer_yields_no_tags() {
        assert!(extract_source_tags("An answer with no references.", 5).is_empty());
    }

    #[test]
    fn prompt_labels_candidates_with_provenance() {
        let candidates = vec![
            candidate(0, "policy.pdf", 3, 0.82),
            candidate(1, "notes.txt", 1, 0.44),
        ];
        let prompt = build_prompt("How is the score calculated?", &candidates);
        assert!(prompt.contains("[S1] policy.pdf, page 3, similarity 0.82"));
        assert!(prompt.contains("[S2] notes.txt, page 1, similarity 0.44"));
        assert!(prompt.contains("Question: How is the score calculated?"));
    }

    #[tokio::test]
    async fn empty_candidates_short_circuit_without_model_call() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(UnreachableModel));
        let answer = synthesizer.answer("anything", &[]).await.unwrap();
        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert!(answer.citations.is_empty());
        assert!(answer.used_chunk_keys.is_empty());
    }

    #[tokio::test]
    async fn tagged_answer_cites_only_used_chunks() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(CannedModel(
            "The grading criteria are listed [S2].".to_string(),
        )));
        let candidates = vec![
            candidate(0, "policy.pdf", 1, 0.9),
            candidate(1, "policy.pdf", 5, 0.6),
        ];
        let answer = synthesizer.answer("question", &candidates).await.unwrap();
        assert!(answer.attribution_confirmed);
        assert_eq!(answer.used_chunk_keys, vec!["policy.pdf_chunk_1"]);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].page, 5);
    }

    #[tokio::test]
    async fn untagged_answer_lists_all_candidates_as_potential_sources() {
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(CannedModel("An answer without tags.".to_string())));
        let candidates = vec![
            candidate(0, "a.pdf", 1, 0.9),
            candidate(1, "b.pdf", 2, 0.5),
        ];
        let answer = synthesizer.answer("question", &candidates).await.unwrap();
        assert!(!answer.attribution_confirmed);
        assert_eq!(answer.citations.len(), 2);
        // Citations follow candidate feed order.
        assert_eq!(answer.citations[0].document, "a.pdf");
        assert_eq!(answer.citations[1].document, "b.pdf");
    }

    #[tokio::test]
    async fn model_failure_surfaces_as_synthesis_error() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(FailingModel));
        let err = synthesizer.answer("q", &[candidate(0, "a.pdf", 1, 0.9)]).await.unwrap_err();
        assert!(matches!(err, RagError::Synthesis(_)));
    }
}
