//! Turn a `generateContent` response into an answer with citations.

use super::types::{CandidateDto, GenerateContentResponse, SourceRef};
use crate::processing::{AnswerError, Citation, QueryAnswer};

const BLOCKING_REASONS: [&str; 3] = ["SAFETY", "BLOCK", "OTHER"];

/// Extract the first candidate's text and its grounding sources.
///
/// Text parts are concatenated in order. Grounding chunks come first in the citation list,
/// followed by citation metadata; exact duplicates are dropped.
pub(crate) fn into_answer(response: GenerateContentResponse) -> Result<QueryAnswer, AnswerError> {
    let blocked_prompt = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(match blocked_prompt {
            Some(reason) => AnswerError::Blocked { reason },
            None => AnswerError::NoCandidates,
        });
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        let upper = reason.to_ascii_uppercase();
        if BLOCKING_REASONS.iter().any(|blocked| upper.contains(blocked)) {
            return Err(AnswerError::Blocked {
                reason: reason.to_string(),
            });
        }
    }

    let text = candidate_text(&candidate)?;
    Ok(QueryAnswer {
        text,
        citations: citations(candidate),
    })
}

fn candidate_text(candidate: &CandidateDto) -> Result<String, AnswerError> {
    let parts = match &candidate.content {
        Some(content) if !content.parts.is_empty() => &content.parts,
        _ => return Err(AnswerError::NoContent),
    };
    let text: String = parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();
    if text.trim().is_empty() {
        Err(AnswerError::NoText)
    } else {
        Ok(text)
    }
}

fn citations(candidate: CandidateDto) -> Vec<Citation> {
    let grounding = candidate
        .grounding_metadata
        .into_iter()
        .flat_map(|metadata| metadata.grounding_chunks)
        .filter_map(|chunk| chunk.retrieved_context)
        .map(|context| citation(context, true));
    let cited = candidate
        .citation_metadata
        .into_iter()
        .flat_map(|metadata| metadata.citations)
        .map(|source| citation(source, false));

    let mut out: Vec<Citation> = Vec::new();
    for item in grounding.chain(cited) {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn citation(source: SourceRef, keep_snippet: bool) -> Citation {
    let label = source
        .title
        .clone()
        .filter(|title| !title.is_empty())
        .or_else(|| source.uri.clone().filter(|uri| !uri.is_empty()))
        .unwrap_or_else(|| "Source".to_string());
    Citation {
        source: label,
        snippet: if keep_snippet {
            source.text.filter(|text| !text.trim().is_empty())
        } else {
            None
        },
        uri: source.uri.filter(|uri| !uri.is_empty()),
    }
}
