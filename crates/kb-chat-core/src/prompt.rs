//! Prompt assembly: persona selection, context injection, and output cleanup.

use crate::markdown::normalize_markdown;
use crate::models::{ChatMessage, Role};
use crate::persona::AgentType;
use crate::rank::Retrieval;

/// Header placed between the persona text and the retrieved context.
pub const CONTEXT_HEADER: &str = "\n\nContext from Knowledge Base:\n";

/// Persona text for `agent_type`, with the retrieval context appended when
/// something matched.
pub fn system_prompt(agent_type: AgentType, retrieval: &Retrieval) -> String {
    let mut prompt = agent_type.persona().system_prompt.to_string();
    if retrieval.matched {
        prompt.push_str(CONTEXT_HEADER);
        prompt.push_str(&retrieval.context);
    }
    prompt
}

/// Builds the provider message list for a RAG request.
///
/// The persona is always the first (and only) `system` message; request
/// `system` messages are dropped, all others keep their order and roles.
pub fn assemble_messages(
    agent_type: AgentType,
    history: &[ChatMessage],
    retrieval: &Retrieval,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt(agent_type, retrieval)));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    messages
}

/// Applies the persona's output policy to the model's reply.
pub fn finalize_output(agent_type: AgentType, content: &str) -> String {
    if agent_type.persona().plain_text_output {
        normalize_markdown(content)
    } else {
        content.to_string()
    }
}

/// The last `user` message, used as the retrieval query.
pub fn last_user_message(history: &[ChatMessage]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

/// Substitutes `{query}` and `{context}` in a template body.
///
/// `{{` and `}}` render as literal braces. Any other `{...}` run is copied
/// through verbatim.
pub fn render_template(template: &str, query: &str, context: &str) -> String {
    let mut out = String::with_capacity(template.len() + query.len() + context.len());
    let mut rest = template;

    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if let Some(after) = tail.strip_prefix("{query}") {
            out.push_str(query);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else {
            out.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(context: &str) -> Retrieval {
        Retrieval {
            context: context.to_string(),
            matched: true,
        }
    }

    #[test]
    fn generic_persona_without_context() {
        let history = vec![ChatMessage::user("hello")];
        let msgs = assemble_messages(AgentType::parse(None), &history, &Retrieval::none());
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], ChatMessage::system("You are a helpful AI assistant."));
        assert_eq!(msgs[1], ChatMessage::user("hello"));
    }

    #[test]
    fn context_suffix_only_when_matched() {
        let with = system_prompt(AgentType::Generic, &matched("[Pricing] Starter $999/mo"));
        assert_eq!(
            with,
            "You are a helpful AI assistant.\n\nContext from Knowledge Base:\n[Pricing] Starter $999/mo"
        );

        let unmatched = Retrieval {
            context: "ignored".into(),
            matched: false,
        };
        assert_eq!(
            system_prompt(AgentType::Generic, &unmatched),
            "You are a helpful AI assistant."
        );
    }

    #[test]
    fn request_system_messages_are_dropped_and_order_kept() {
        let history = vec![
            ChatMessage::system("caller system prompt"),
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::system("another"),
            ChatMessage::user("q2"),
        ];
        let msgs = assemble_messages(AgentType::RegulatoryAdvisor, &history, &Retrieval::none());
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(msgs[0]
            .content
            .starts_with("You are an expert DFSA Regulatory Advisor"));
        assert_eq!(msgs[1].content, "q1");
        assert_eq!(msgs[3].content, "q2");
    }

    #[test]
    fn output_normalized_only_for_license_persona() {
        let raw = "**RECOMMENDED LICENSE:** Category 3A";
        assert_eq!(
            finalize_output(AgentType::LicenseRecommendation, raw),
            "RECOMMENDED LICENSE: Category 3A"
        );
        assert_eq!(finalize_output(AgentType::RegulatoryAdvisor, raw), raw);
        assert_eq!(finalize_output(AgentType::Generic, raw), raw);
    }

    #[test]
    fn last_user_message_skips_other_roles() {
        let history = vec![
            ChatMessage::user("first"),
            ChatMessage::user("second"),
            ChatMessage::assistant("reply"),
        ];
        assert_eq!(last_user_message(&history), Some("second"));
        assert_eq!(last_user_message(&[ChatMessage::assistant("x")]), None);
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let t = "Answer {query} using:\n{context}\nJSON: {{\"k\": 1}} keep {other}";
        assert_eq!(
            render_template(t, "what fee?", "[Fees] 10k"),
            "Answer what fee? using:\n[Fees] 10k\nJSON: {\"k\": 1} keep {other}"
        );
        assert_eq!(render_template("no vars", "q", "c"), "no vars");
        assert_eq!(render_template("{context}", "q", ""), "");
    }
}
