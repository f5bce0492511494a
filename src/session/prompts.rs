//! Instructions sent with each analysis.

/// Instruction for the initial summary of a file or pasted text.
pub const SUMMARY_PROMPT: &str = "\
Summarize the provided content thoroughly, writing the whole response in Chinese. This is an important task that may inform major decisions. \
Complete each of the following steps in order and present each result separately:

1. Structured summary
Goal: a logically organized, information-rich summary.
- Give each topic its own section with a bold second-level heading (##)
- Develop each section in one or two paragraphs, keeping depth and coherence
- Bold key sentences and core ideas
- Use clear, professional language, like a high-quality popular-science article
- Quote complete examples or stories from the source, keeping the key details
- Introduce people by their full names as given in the source
- Use an appropriate Markdown hierarchy
- Write in the first person plural, e.g. \"Reading this, we can see that...\", staying modest and careful

2. Key points and insights
Goal: distill the essence of the content.
- List the 3-5 most important points or conclusions, grounded directly in the source
- Offer one original, deep insight that is new yet closely tied to the source";

/// System instruction for follow-up questions.
pub const FOLLOW_UP_INSTRUCTION: &str = "Answer the question accurately and concisely based on the provided content. \
If the question falls outside the content, say so explicitly.";

/// Builds the user message for a follow-up question over cached content.
pub fn follow_up(content: &str, question: &str) -> String {
    format!("Answer strictly from the following content:\n\n{content}\n\nQuestion: {question}")
}

/// Bot reply used when a follow-up question fails.
pub fn apology(message: &str) -> String {
    format!("Sorry, an error occurred while processing your question: {message}")
}
