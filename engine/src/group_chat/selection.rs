//! Speaker selection
//!
//! Selection is a pure function of the history and the roster, evaluated as
//! an ordered rule list where the first rule that yields an agent wins:
//!
//! 1. Start of turn: empty history or the user spoke last, so the PM opens.
//! 2. Explicit handoff: a `NEXT: <name>` line in the last message.
//! 3. Structured routing: a JSON object carrying `"next_speaker"`.
//! 4. Default chain: after SA comes PG; PM and PG hand back to the user.
//!
//! If no rule yields an agent the turn is over.

use sdk::{ChatRole, Message};
use std::sync::Arc;
use tracing::debug;

use crate::agent::Agent;

/// Literal handoff marker agents write on their last line
pub const HANDOFF_MARKER: &str = "NEXT: ";

const NEXT_SPEAKER_KEY: &str = "\"next_speaker\"";

/// Which rule produced a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    StartOfTurn,
    ExplicitHandoff,
    StructuredRouting,
    DefaultChain,
}

/// Pick the agent that speaks next, or `None` when the turn is over.
pub fn select_next_speaker(
    history: &[Message],
    roster: &[Arc<dyn Agent>],
) -> Option<Arc<dyn Agent>> {
    select_with_rule(history, roster).map(|(_, agent)| agent)
}

/// Like [`select_next_speaker`], also reporting which rule fired.
pub fn select_with_rule(
    history: &[Message],
    roster: &[Arc<dyn Agent>],
) -> Option<(SelectionRule, Arc<dyn Agent>)> {
    if roster.is_empty() {
        return None;
    }

    let last = match history.last() {
        Some(last) if last.role != ChatRole::User => last,
        _ => return start_of_turn(roster).map(|a| (SelectionRule::StartOfTurn, a)),
    };

    let selected = explicit_handoff(&last.text, roster)
        .map(|a| (SelectionRule::ExplicitHandoff, a))
        .or_else(|| {
            structured_routing(&last.text, roster).map(|a| (SelectionRule::StructuredRouting, a))
        })
        .or_else(|| default_chain(last.author(), roster).map(|a| (SelectionRule::DefaultChain, a)));

    match &selected {
        Some((rule, agent)) => debug!("Selected {} via {:?}", agent.name(), rule),
        None => debug!(
            "No next speaker after {}; waiting for user",
            last.author().unwrap_or("anonymous message")
        ),
    }

    selected
}

/// Rule 1: the member whose name contains `PM`, else the first member.
pub fn start_of_turn(roster: &[Arc<dyn Agent>]) -> Option<Arc<dyn Agent>> {
    roster
        .iter()
        .find(|a| a.name().contains("PM"))
        .or_else(|| roster.first())
        .cloned()
}

/// Rule 2: resolve the name after the last `NEXT: ` marker.
pub fn explicit_handoff(text: &str, roster: &[Arc<dyn Agent>]) -> Option<Arc<dyn Agent>> {
    let candidate = handoff_target(text)?;
    find_agent_by_name(roster, candidate)
}

/// Name following the last handoff marker, up to the first whitespace
pub fn handoff_target(text: &str) -> Option<&str> {
    let (_, tail) = text.rsplit_once(HANDOFF_MARKER)?;
    tail.split_whitespace().next()
}

/// Rule 3: resolve the `next_speaker` value of a trailing JSON decision.
pub fn structured_routing(text: &str, roster: &[Arc<dyn Agent>]) -> Option<Arc<dyn Agent>> {
    if !(text.trim_end().ends_with('}') || text.contains("```json")) {
        return None;
    }
    let candidate = next_speaker_value(text)?;
    find_agent_by_name(roster, candidate)
}

/// Value of the first `"next_speaker"` key, found by plain substring search.
///
/// Tolerates unquoted values, single quotes and trailing commas. Returns
/// `None` on anything it cannot make sense of.
pub fn next_speaker_value(text: &str) -> Option<&str> {
    let (_, after_key) = text.split_once(NEXT_SPEAKER_KEY)?;
    let after_colon = after_key.trim_start().strip_prefix(':')?.trim_start();

    let raw = match after_colon.chars().next()? {
        quote @ ('"' | '\'') => {
            let body = &after_colon[1..];
            body.split(quote).next()?
        }
        _ => after_colon
            .split(|c: char| c == ',' || c == '}' || c.is_whitespace())
            .next()?,
    };

    let value = raw.trim_matches(|c: char| c == '"' || c == '\'' || c == ',' || c.is_whitespace());
    (!value.is_empty()).then_some(value)
}

/// Rule 4: fixed three-role chain keyed on the last author.
pub fn default_chain(author: Option<&str>, roster: &[Arc<dyn Agent>]) -> Option<Arc<dyn Agent>> {
    let author = author?;
    if has_role_tag(author, "SA") {
        return roster.iter().find(|a| a.name().contains("PG")).cloned();
    }
    // PM without a handoff waits for the user; PG ends the turn.
    None
}

/// Whether `author` carries a role tag: exactly `tag`, or `tag_` anywhere
/// (as in `SA_Bob`). Case-sensitive.
pub fn has_role_tag(author: &str, tag: &str) -> bool {
    author == tag || author.contains(&format!("{}_", tag))
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Fuzzy name lookup.
///
/// Underscores and spaces are ignored and case is folded; a roster member
/// matches when either normalized name equals or contains the other. The
/// first match in roster order wins. An empty candidate matches nothing.
pub fn find_agent_by_name(roster: &[Arc<dyn Agent>], candidate: &str) -> Option<Arc<dyn Agent>> {
    let wanted = normalize(candidate);
    if wanted.is_empty() {
        return None;
    }

    roster
        .iter()
        .find(|agent| {
            let name = normalize(agent.name());
            !name.is_empty() && (name == wanted || name.contains(&wanted) || wanted.contains(&name))
        })
        .cloned()
}
