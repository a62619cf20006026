use crate::llm::Message;

/// Instruction appended to the system prompt while themes are enforced.
pub(crate) fn theme_instruction(themes: &[String]) -> String {
    format!(
        "CRITICAL SAFETY RULE: only discuss topics related to: {}. \
         Politely decline anything else.",
        themes.join(", ")
    )
}

/// Union of theme lists, first spelling wins, compared case-insensitively.
pub(crate) fn merge_themes<'a>(sources: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for theme in sources.into_iter().flatten() {
        let theme = theme.trim();
        if theme.is_empty() {
            continue;
        }
        if !merged.iter().any(|t| t.eq_ignore_ascii_case(theme)) {
            merged.push(theme.to_string());
        }
    }
    merged
}

/// Base prompt, theme rule and retrieved context joined into one system
/// prompt. `None` when all three are absent.
pub(crate) fn build_system_prompt(
    base: Option<&str>,
    themes: &[String],
    context: Option<&str>,
) -> Option<String> {
    let mut sections = Vec::new();

    if let Some(base) = base.map(str::trim).filter(|b| !b.is_empty()) {
        sections.push(base.to_string());
    }
    if !themes.is_empty() {
        sections.push(theme_instruction(themes));
    }
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        sections.push(format!("Use the following context to answer:\n{context}"));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

/// System prompt first, then history, then the new user message.
pub(crate) fn build_messages(
    system: Option<String>,
    history: Vec<Message>,
    user_message: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.extend(history);
    messages.push(Message::user(user_message));
    messages
}
