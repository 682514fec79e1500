//! System prompts for the two generation branches.

use faqrag_core::config::PersonaSettings;

fn persona_line(persona: &PersonaSettings) -> String {
    format!(
        "You are a helpful customer support assistant for {} ({}), {}.",
        persona.company_name, persona.legal_entity, persona.description
    )
}

/// Persona plus the retrieved passages the answer must be based on.
pub fn grounded(persona: &PersonaSettings, context: &str) -> String {
    format!(
        "{}\n\n\
         Answer the user's question using the following context from our FAQ documentation.\n\
         Be concise, helpful and professional. Use bullet points for lists when appropriate.\n\n\
         Context:\n{}",
        persona_line(persona),
        context
    )
}

/// Persona plus instructions for answering without any retrieved context.
pub fn fallback(persona: &PersonaSettings) -> String {
    format!(
        "{}\n\n\
         No specific context was found in our FAQ documentation for this question.\n\
         Answer from your general knowledge and make it clear that you are giving general information.\n\
         For questions about {}'s specific policies, recommend contacting {} support.",
        persona_line(persona),
        persona.company_name,
        persona.company_name
    )
}

/// User-facing text returned when a run fails. Names no internal detail.
pub fn apology(persona: &PersonaSettings) -> String {
    format!(
        "I'm sorry, I couldn't answer that right now. Please try again in a moment, \
         or contact {} support if the problem persists.",
        persona.company_name
    )
}
