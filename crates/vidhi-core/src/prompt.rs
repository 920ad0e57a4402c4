//! Legal answer prompt.

use vidhi_index::RetrievedChunk;

const CONTEXT_SEPARATOR: &str = "\n\n";

const PREAMBLE: &str = "\
You are a legal assistant specialised in Indian law. Give accurate, structured \
guidance based only on the context supplied below.
If the user's role is unclear, give general information.
Be clear and precise, avoid repetition, and concentrate on the provisions most \
relevant to the query.
Use only information stated explicitly in the context. If something is not in \
the context, do not invent it.";

const INSTRUCTIONS: &str = "\
1. **Identify the offences**: determine which offences under the IPC, CrPC or \
other acts in the context may apply to the situation.
2. **Cite sections**: quote the relevant sections exactly as they appear in the \
context (for example \"Section 378 of IPC\").
3. **Explain applicability**: say why each section applies to the user's situation.
4. **Next steps**: give step-by-step practical guidance, such as how to file an \
FIR or which evidence to preserve.
5. **Disclaimer**: finish with a note that this answer is AI-generated and is \
not a substitute for advice from a qualified lawyer.";

const FORMAT: &str = "\
*   **Offences Identified**: [sections]
*   **Detailed Analysis**: [explanation]
*   **Next Steps**: [procedure]
*   **Punishment**: [if stated in the context]";

/// Join chunk texts in retrieval order, separated by a blank line.
#[must_use]
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(RetrievedChunk::text)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render the generation prompt. Pure: equal inputs give equal output.
///
/// An empty `context` still renders; the model is left to say it has nothing
/// to cite.
#[must_use]
pub fn render(context: &str, question: &str) -> String {
    format!(
        "{PREAMBLE}\n\n\
         CONTEXT FROM KNOWLEDGE BASE:\n{context}\n\n\
         USER QUERY:\n{question}\n\n\
         INSTRUCTIONS:\n{INSTRUCTIONS}\n\n\
         FORMAT YOUR RESPONSE IN MARKDOWN:\n{FORMAT}\n\n\
         ANSWER:\n"
    )
}
