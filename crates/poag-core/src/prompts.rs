//! Prompt text handed to the agent and the classifier.

use std::fmt::Write as _;

use crate::agent::{ExplorationRequest, RelevanceRequest};
use crate::contracts::ContractSet;
use crate::node::Node;

/// Contract excerpts in the planning prompt are cut to this many characters.
pub const SNIPPET_CHARS: usize = 200;

fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_CHARS {
        let cut: String = text.chars().take(SNIPPET_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Phase 1: explore the node and describe what it needs from each
/// dependency. The answer must be a single JSON object.
pub fn exploration_prompt(request: &ExplorationRequest) -> String {
    let mut prompt = format!(
        "You are exploring the `{}` component to learn its role and its dependencies.\n\n",
        request.node
    );
    if let Some(description) = &request.description {
        let _ = writeln!(prompt, "Declared description: {description}\n");
    }
    prompt.push_str(
        "1. Read the README and build files, then survey the code. Work out what the \
         component does, how it is laid out, and how its tests are run.\n",
    );
    if request.dependencies.is_empty() {
        prompt.push_str("2. This component declares no dependencies.\n");
    } else {
        let _ = writeln!(
            prompt,
            "2. This component depends on: {}. For each one, find where it is used \
             (quote the relevant code) and state precisely what this component expects \
             from it.",
            request.dependencies.join(", ")
        );
    }
    if !request.dependents.is_empty() {
        let _ = writeln!(
            prompt,
            "   For context, these components consume it: {}.",
            request.dependents.join(", ")
        );
    }
    prompt.push_str(
        "\nReply with one JSON object and nothing else:\n\
         {\"self_summary\": \"<two or three sentences>\", \
         \"dependencies\": {\"<dependency name>\": \"<markdown: how we use it, what we need from it>\"}}\n\
         Use exactly the dependency names listed above as keys.\n",
    );
    prompt
}

/// Phase 2: answer a dependent's input contract with a provider contract.
pub fn provider_contract_prompt(provider: &str, dependent: &str, their_needs: &str) -> String {
    format!(
        "You maintain the `{provider}` component.\n\n\
         The downstream component `{dependent}` wrote down what it needs from you:\n\n\
         {their_needs}\n\n\
         Study your code and write a provider contract in markdown with these sections:\n\n\
         # Provider Contract: {provider} for {dependent}\n\n\
         ## Current Implementation\n\
         How the code meets each requirement today, with file references.\n\n\
         ## API Stability\n\
         Which parts are stable and which may change.\n\n\
         ## Breaking Change Protocol\n\
         How `{dependent}` will hear about breaking changes.\n\n\
         ## Testing\n\
         Which tests keep this contract honest.\n\n\
         Be brief and concrete."
    )
}

/// Per-node planning prompt: role, neighbor contract excerpts, task.
pub fn planning_prompt(node: &Node, instruction: &str, contracts: &ContractSet) -> String {
    let mut prompt = format!(
        "You are the product owner and test consultant for the `{}` component at `{}`.\n",
        node.name,
        node.path.display()
    );
    let _ = writeln!(
        prompt,
        "Description: {}",
        node.description.as_deref().unwrap_or("none recorded")
    );
    prompt.push_str(
        "You produce a development plan. You do not implement it.\n",
    );

    if !contracts.inputs.is_empty() {
        prompt.push_str("\nUpstream dependencies (you may ask them for changes):\n");
        for (dep, text) in &contracts.inputs {
            let _ = writeln!(prompt, "  - {dep}: what you need from them");
            let _ = writeln!(prompt, "    excerpt: {}", snippet(text));
        }
    }
    if !contracts.outputs.is_empty() {
        prompt.push_str("\nDownstream consumers (they rely on your outputs):\n");
        for (dep, text) in &contracts.outputs {
            let _ = writeln!(prompt, "  - {dep}: what you provide to them");
            let _ = writeln!(prompt, "    excerpt: {}", snippet(text));
        }
    }

    prompt.push_str(
        "\nTools for learning about neighbors:\n\
         - `poag ls --neighbors` lists this component with its dependencies and dependents\n\
         - `poag describe <name>` prints a component's README, flake.nix, neighbors and contracts\n\n\
         The developer is skilled but forgetful. Your plan must name:\n\
         - the files to change and why\n\
         - the tests that will pass once the work is done, with exact commands\n\
         - any requests for upstream components\n\
         - when to run the tests (before implementing they should fail)\n\
         Give hints and test strategy, not a full implementation.\n\n",
    );
    let _ = write!(prompt, "Task:\n{instruction}\n");
    prompt
}

/// Relevance routing prompt for the classifier.
pub fn relevance_prompt(request: &RelevanceRequest) -> String {
    let mut nodes = String::new();
    for node in &request.nodes {
        let _ = writeln!(nodes, "- {}: {} component ({})", node.name, node.language, node.summary);
    }
    format!(
        "You coordinate planning for a project made of independently versioned components.\n\n\
         Components:\n{nodes}\n\
         Project README (excerpt):\n{}\n\n\
         Request: {}\n\n\
         Pick the components directly responsible for this request, judging by what their \
         contracts say they provide and need. Route to several only when the request truly \
         spans independent components. The `root` component holds acceptance and \
         integration requirements. Each component can run `poag ls --neighbors` and \
         `poag describe <name>` to learn about its neighbors.\n\n\
         For each chosen component write an instruction tailored to its role.\n\
         Reply with only a JSON object mapping component name to instruction.",
        request.project_context, request.user_request
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn node() -> Node {
        Node {
            name: "svc".to_string(),
            path: PathBuf::from("svc"),
            dependencies: vec!["lib".to_string()],
            language: "rust".to_string(),
            description: None,
            content_revision: None,
        }
    }

    #[test]
    fn planning_prompt_truncates_contract_excerpts() {
        let mut contracts = ContractSet::default();
        contracts.inputs.insert("lib".to_string(), "x".repeat(500));
        let prompt = planning_prompt(&node(), "add a flag", &contracts);
        assert!(prompt.contains(&format!("{}...", "x".repeat(SNIPPET_CHARS))));
        assert!(!prompt.contains(&"x".repeat(SNIPPET_CHARS + 1)));
        assert!(prompt.ends_with("add a flag\n"));
    }

    #[test]
    fn short_excerpts_are_kept_whole() {
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn provider_prompt_has_required_sections() {
        let prompt = provider_contract_prompt("lib", "svc", "need parse()");
        for section in [
            "## Current Implementation",
            "## API Stability",
            "## Breaking Change Protocol",
            "## Testing",
        ] {
            assert!(prompt.contains(section), "missing {section}");
        }
        assert!(prompt.contains("need parse()"));
    }

    #[test]
    fn exploration_prompt_names_dependencies() {
        let request = ExplorationRequest {
            node: "svc".to_string(),
            workdir: PathBuf::from("/p/svc"),
            language: "rust".to_string(),
            description: None,
            dependencies: vec!["lib".to_string(), "util".to_string()],
            dependents: vec!["root".to_string()],
        };
        let prompt = exploration_prompt(&request);
        assert!(prompt.contains("lib, util"));
        assert!(prompt.contains("\"self_summary\""));
    }
}
