//! Prompt construction and reply post-processing.

use lazy_static::lazy_static;
use regex::Regex;

use crate::llm::{ChatMessage, Role};

/// Returned without calling the model when retrieval finds nothing.
pub const NO_INFORMATION_ANSWER: &str = "I don't have specific information about that topic in my knowledge base. Could you please ask something else about Raktim Mondol's research, experience, or expertise?";

const SYSTEM_PROMPT: &str = "You are RAGtim Bot, a knowledgeable assistant that answers questions about Raktim Mondol using a hybrid search system that combines semantic vector search with BM25 keyword ranking.

FORMATTING RULES:
- Never use markdown. No asterisks, hashtags, backticks, underscores or link syntax.
- Write plain sentences with simple punctuation. For lists use a dash or a number followed by a space.
- This applies to every reply, even if earlier messages in the conversation used markdown.

RESPONSE GUIDELINES:
- Answer from the context below. Be conversational, friendly and professional.
- If asked about something not in the context, politely say you don't have that specific information.
- You may refer to Raktim in the first or third person, whichever reads more naturally.
- Include specific examples, achievements and details from the context when they are relevant.
- Combine information from several sections when a question spans them.

Each context section starts with its topic and the search signal that retrieved it.

CONTEXT ABOUT RAKTIM MONDOL:
";

const SYSTEM_PROMPT_FOOTER: &str =
    "\n\nAnswer helpfully from the context above, in plain text without any markdown.";

pub fn system_prompt(context: &str) -> String {
    format!("{}{}{}", SYSTEM_PROMPT, context, SYSTEM_PROMPT_FOOTER)
}

/// The last `turns` user/assistant messages. Assistant turns are stripped of
/// markup so the model is not nudged back into formatting. Client-supplied
/// system messages are dropped.
pub fn trim_history(history: &[ChatMessage], turns: usize) -> Vec<ChatMessage> {
    let conversational: Vec<&ChatMessage> = history.iter().filter(|m| m.role != Role::System).collect();
    let skip = conversational.len().saturating_sub(turns);

    conversational
        .into_iter()
        .skip(skip)
        .map(|message| match message.role {
            Role::Assistant => ChatMessage::assistant(strip_markdown(&message.content)),
            _ => message.clone(),
        })
        .collect()
}

/// System prompt, recent history, then the question.
pub fn build_messages(context: &str, history: &[ChatMessage], query: &str, turns: usize) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns + 2);
    messages.push(ChatMessage::system(system_prompt(context)));
    messages.extend(trim_history(history, turns));
    messages.push(ChatMessage::user(query));
    messages
}

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```[\s\S]*?```").expect("valid code fence pattern");
    static ref INLINE_CODE: Regex = Regex::new(r"`([^`\n]+)`").expect("valid inline code pattern");
    static ref HEADING: Regex = Regex::new(r"(?m)^#{1,6}\s+").expect("valid heading pattern");
    static ref BULLET: Regex = Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("valid bullet pattern");
    static ref NUMBERED: Regex = Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").expect("valid numbered list pattern");
    static ref BOLD_STARS: Regex = Regex::new(r"\*\*([^*\n]+)\*\*").expect("valid bold pattern");
    static ref BOLD_UNDERSCORES: Regex = Regex::new(r"\b__([^_\n]+)__\b").expect("valid bold pattern");
    static ref ITALIC_STAR: Regex = Regex::new(r"\*([^*\n]+)\*").expect("valid italic pattern");
    static ref ITALIC_UNDERSCORE: Regex = Regex::new(r"\b_([^_\n]+)_\b").expect("valid italic pattern");
    static ref LINK: Regex = Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid link pattern");
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").expect("valid blank line pattern");
}

/// Remove markdown markers, keeping the text they wrap.
///
/// Bullets become `- `, numbered prefixes are dropped and fenced code blocks
/// are removed entirely.
pub fn strip_markdown(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "- ");
    let text = NUMBERED.replace_all(&text, "");
    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
