//! Instruction templates for rewriting and reranking calls.

use handlebars::Handlebars;
use recall_core::{AppError, AppResult};
use serde::Serialize;

pub const EXPANSION: &str = "Generate 3-5 alternative search queries for the query below. \
Use synonyms, related terms, and closely related concepts so that a document search \
finds relevant material even when it uses different wording.\n\
Return only a JSON array of strings.\n\n\
Query: {{query}}";

pub const REFINEMENT: &str = "Rewrite the search query below so that it is specific, \
unambiguous, and self-contained. Resolve pronouns and references using the context \
when it is given. Return only the rewritten query, without quotes or explanation.\n\n\
{{#if context}}Context:\n{{context}}\n\n{{/if}}\
Query: {{query}}";

pub const DECOMPOSITION: &str = "Break the question below into 2-4 independent \
sub-questions that can each be answered by a separate document search.\n\
Return only a JSON array of strings.\n\n\
Question: {{query}}";

pub const MULTI_PERSPECTIVE: &str = "Rephrase the question below from 3-4 different \
perspectives, for example a beginner, a domain expert, and someone troubleshooting a \
problem. Each rephrasing must ask for the same information.\n\
Return only a JSON array of strings.\n\n\
Question: {{query}}";

pub const HYPOTHETICAL_DOCUMENT: &str = "Write a 2-3 paragraph passage that would \
perfectly answer the question below, in the style of a reference document. \
Return only the passage.\n\n\
Question: {{query}}";

pub const SEMANTIC_RERANK: &str = "Rank the documents below by how relevant they are \
to the query. Respond with a JSON object of the form {\"ranking\": [2, 0, 1]} listing \
document indices from most to least relevant.\n\n\
Query: {{query}}\n\n\
{{#each documents}}[{{@index}}] {{this}}\n\n{{/each}}";

pub const CROSS_ENCODER: &str = "On a scale from 0 to 100, how relevant is the document \
to the query? Respond with the number only.\n\n\
Query: {{query}}\n\n\
Document:\n{{document}}";

/// Render a template with the given variables.
///
/// HTML escaping is disabled; templates produce plain text.
pub fn render<T: Serialize>(template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("instruction", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("instruction", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
