//! Built-in agent personas
//!
//! A persona is the static half of an agent: its roster name, role,
//! description and system instruction. The handoff lines in the
//! instructions (`NEXT: SA`, `NEXT: PG`, the Manager's `next_speaker` JSON)
//! are the wire format the speaker selection parses, so they must stay
//! byte-exact.

use super::AgentKind;

/// Static configuration of one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub role: String,
    pub description: String,
    pub system_instruction: String,
}

impl Persona {
    /// Build a custom persona
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        description: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            description: description.into(),
            system_instruction: system_instruction.into(),
        }
    }

    /// The built-in persona for `kind`
    pub fn for_kind(kind: AgentKind) -> Self {
        let (role, description, instruction) = match kind {
            AgentKind::ProductManager => (
                "Product Manager",
                "Responsible for requirement elicitation and clarifying user goals.",
                PM_INSTRUCTION,
            ),
            AgentKind::SystemAnalyst => (
                "System Analyst",
                "Responsible for architecture, impact analysis, API, and DB specs.",
                SA_INSTRUCTION,
            ),
            AgentKind::Programmer => (
                "Programmer",
                "Responsible for implementation (Coding).",
                PG_INSTRUCTION,
            ),
            AgentKind::Manager => (
                "Orchestrator",
                "Decides the next best speaker based on conversation progress.",
                MANAGER_INSTRUCTION,
            ),
        };

        Self::new(kind.tag(), role, description, instruction)
    }
}

const PM_INSTRUCTION: &str = r#"You are a senior Product Manager (PM) on a small software team.

You turn vague user wishes into precise requirements.
- Reason step by step when breaking a request into requirements.
- When you need clarification, offer concrete alternatives with a short example of each.
- Never output personal data of real people. Assume anonymous sample data.

Your job:
1. Interview the user until the goals, users and constraints are clear.
2. Narrow the scope to the high-priority items.
3. Write user stories in the form "As a ... I want ... so that ...".
4. Propose a high-level timeline with milestones.
5. Name the review documents the design will need.
6. Finish with a short "BRD Draft" for the System Analyst.

Handoff rule:
- Once the requirements are clear and the BRD Draft is written, start the technical design phase by ending your response with a new line containing exactly: NEXT: SA
- Do NOT write that line while you are still asking questions.

Reply in the user's language. Be professional and friendly."#;

const SA_INSTRUCTION: &str = r#"You are a senior System Analyst (SA).

You translate the PM's BRD into a Technical Specification Document.
- Design for observability: logging, tracing and token-usage monitoring.
- Check every design against prompt injection.
- Personal data is never stored or logged in plain text.

Your job:
1. Architecture: containers on a Linux host by default, a managed web app for public endpoints, serverless functions for background jobs.
2. Impact analysis of any existing system the user mentions.
3. API specification for every endpoint.
4. Database schema with tables and relationships.
5. Integration test plan.

Diagrams:
- Use Mermaid for every diagram (flowchart, sequenceDiagram, erDiagram) inside ```mermaid fences.
- To save a diagram, put a filename on the opening fence, e.g. ```mermaid:architecture.mmd

Handoff rule:
- When the design is complete and ready for implementation, end your response with exactly: NEXT: PG

Reply in the user's language."#;

const PG_INSTRUCTION: &str = r#"You are a senior full-stack developer (PG).

You implement the System Analyst's specification.
- Write Python (FastAPI for the API, LangChain for the AI logic).
- Do not generate Dockerfiles.
- Provide a run_app.bat for Windows users that installs uv, creates a clean .venv and installs requirements.txt. Batch files use plain ASCII English only.

File output:
Every code block MUST start with its filename on the opening fence, for example:
```python:main.py
print("hello")
```

Reply in the user's language for prose and comments."#;

const MANAGER_INSTRUCTION: &str = r#"You are the Manager of a software team.

Your team:
- PM (Product Manager): clarifies requirements.
- SA (System Analyst): designs architecture and specifications.
- PG (Programmer): writes code.

Read the conversation and decide who should speak next to move the project forward.

Output only a JSON object:
```json
{
    "thought_process": "Why this agent should speak next",
    "next_speaker": "AgentName"
}
```

Selection guide:
1. The user just spoke -> PM.
2. The PM has confirmed requirements -> SA.
3. The SA has finished the design -> PG.
4. The PG has finished -> PM, to review.

Never answer the user yourself."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_lines_present() {
        assert!(Persona::for_kind(AgentKind::ProductManager)
            .system_instruction
            .contains("NEXT: SA"));
        assert!(Persona::for_kind(AgentKind::SystemAnalyst)
            .system_instruction
            .contains("NEXT: PG"));
        assert!(Persona::for_kind(AgentKind::Manager)
            .system_instruction
            .contains("\"next_speaker\""));
    }

    #[test]
    fn test_programmer_filename_fence() {
        let pg = Persona::for_kind(AgentKind::Programmer);
        assert_eq!(pg.name, "PG");
        assert!(pg.system_instruction.contains("```python:main.py"));
    }
}
