//! Prompt templates for the classifier, drafter, verifier and summarizer.

/// Separator placed between context chunks in drafting prompts.
pub const BOUNDARY_MARKER: &str = "\n\n---\n\n";

/// Separator used when passages are shown to the classifier and verifier.
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// The drafter's designed refusal.
pub const REFUSAL_SENTINEL: &str = "I cannot answer this question based on the provided documents.";

pub fn relevance(question: &str, passages: &str) -> String {
    format!(
        r#"You are given a user question and some passages from uploaded documents.

Classify how well these passages address the user's question.
Choose exactly one of the following responses (respond ONLY with that label):

1) "CAN_ANSWER": The passages contain enough explicit info to fully answer the question.
2) "PARTIAL": The passages mention or discuss the question's topic (e.g., relevant years, facility names)
but do not provide all the data or details needed for a complete answer.
3) "NO_MATCH": The passages do not discuss or mention the question's topic at all.

Important: If the passages mention or reference the topic or timeframe of the question in ANY way,
even if incomplete, you should respond "PARTIAL", not "NO_MATCH".

Question: {question}
Passages: {passages}

Respond ONLY with "CAN_ANSWER", "PARTIAL", or "NO_MATCH"."#
    )
}

pub fn draft(question: &str, context: &str) -> String {
    format!(
        r#"Answer the following question based on the provided context. Be precise and factual.

Question: {question}

Context:
{context}

If the context is insufficient, respond with: "{REFUSAL_SENTINEL}""#
    )
}

pub fn verify(question: &str, answer: &str, context: &str) -> String {
    format!(
        r#"Verify the following answer against the provided context. Check for:
1. Direct factual support (YES/NO)
2. Unsupported claims (list)
3. Contradictions (list)
4. Relevance to the question (YES/NO)

Respond in this format:
Supported: YES/NO
Unsupported Claims: [items]
Contradictions: [items]
Relevant: YES/NO

Question: {question}
Answer: {answer}
Context: {context}"#
    )
}

pub fn summarize(text: &str) -> String {
    format!(
        r#"You are tasked with summarizing video transcripts. Provide a concise, informative summary that captures the main points.

Instructions:
1. Summarize the transcript in a single concise paragraph.
2. Ignore any timestamps in your summary.
3. Focus on the spoken content (Text).

In the transcript, "Text" is the spoken words and "Start" is the timestamp where that part begins.

Transcript:
{text}"#
    )
}
