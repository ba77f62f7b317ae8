use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PlannerConfig;
use crate::errors::TrigWatchResult;
use crate::executor::script::{self, ScriptStep};
use crate::library::types::CommandKind;
use crate::library::{SharedLibrary, SharedVariables};
use crate::llm::registry::{ProviderRegistry, ROLE_KEYWORDS, ROLE_SELECTOR};
use crate::llm::retry::{with_retries, RetryPolicy};
use crate::llm::types::{ChatMessage, Selection};
use crate::perception::types::TextFragment;
use crate::planner::aim;
use crate::planner::inject::inject;
use crate::planner::inline::split_goal;
use crate::planner::keywords::{self, Candidate};
use crate::planner::parse::parse_selection;
use crate::planner::state::{Instruction, PlanResult, PlanSource};

const SELECTOR_PROMPT: &str = "You are a Command Selector. Match the GOAL to the best Command ID.\n\
If the goal implies content (e.g. 'type hello'), extract it into 'var'.\n\
Return JSON: {\"id\": <number>, \"var\": \"content\"}\n\
COMMANDS:\n";

/// Resolves goal text into an instruction: reflexes first, then keyword
/// filtering and model selection over the command library.
pub struct CommandPlanner {
    library: SharedLibrary,
    variables: SharedVariables,
    registry: Arc<ProviderRegistry>,
    config: PlannerConfig,
}

impl CommandPlanner {
    pub fn new(
        library: SharedLibrary,
        variables: SharedVariables,
        registry: Arc<ProviderRegistry>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            library,
            variables,
            registry,
            config,
        }
    }

    /// Never fails: unusable outcomes come back as `Noop` or `Failed`.
    pub async fn plan(&self, raw_goal: &str, fragments: &[TextFragment]) -> PlanResult {
        let parsed = {
            let variables = self.variables.lock().await;
            split_goal(raw_goal, &self.config.separator_verbs, &variables)
        };
        let goal = parsed.goal;
        tracing::info!(goal = %goal, variable = %parsed.variable, "planning");

        if let Some(result) = self.reflex(&goal) {
            return result;
        }

        let candidates = match self.candidates(&goal).await {
            Some(c) => c,
            None => return PlanResult::unresolved(Instruction::failed("command library is empty")),
        };
        if candidates.is_empty() {
            return PlanResult::unresolved(Instruction::failed(format!("no candidate commands for '{goal}'")));
        }
        tracing::debug!(count = candidates.len(), "candidate commands");

        let selection = match self.select(&goal, &candidates).await {
            Ok(sel) => sel,
            Err(e) => {
                tracing::error!(goal = %goal, error = %e, "command selection failed");
                return PlanResult::unresolved(Instruction::failed(format!(
                    "selection failed after {} retries: {e}",
                    self.config.max_retries
                )));
            }
        };

        let variable = if parsed.variable.is_empty() {
            selection.var
        } else {
            parsed.variable
        };

        let entry = {
            let library = self.library.lock().await;
            library.get_by_id(selection.id).cloned()
        };
        let Some(entry) = entry else {
            return PlanResult::unresolved(Instruction::failed(format!(
                "command {} disappeared from the library",
                selection.id
            )));
        };
        tracing::info!(id = entry.id, name = %entry.name, variable = %variable, "command selected");

        if !variable.is_empty() && !entry.kind.has_placeholder() && entry.name.contains("click") {
            return self.auto_aim(&entry.name, &variable, fragments);
        }

        let kind = {
            let variables = self.variables.lock().await;
            inject(&entry.kind, &variable, &variables)
        };
        PlanResult::new(directive(kind), true, PlanSource::Library)
    }

    fn reflex(&self, goal: &str) -> Option<PlanResult> {
        let lower = goal.to_lowercase();
        if !self.config.reflex_verbs.iter().any(|v| lower.starts_with(&v.to_lowercase())) {
            return None;
        }
        tracing::info!(goal = %goal, "reflex: spawning directly");
        let kind = CommandKind::Script {
            code: format!("spawn {}", script::quote(goal)),
        };
        Some(PlanResult::new(Instruction::run(kind), false, PlanSource::Reflex))
    }

    /// `None` when the library is empty.
    async fn candidates(&self, goal: &str) -> Option<Vec<Candidate>> {
        let goal_words = keywords::goal_keywords(goal);
        let ranked = {
            let library = self.library.lock().await;
            if library.is_empty() {
                return None;
            }
            keywords::rank(library.entries(), &goal_words)
        };
        if !ranked.is_empty() {
            return Some(keywords::cap(ranked, self.config.max_candidates));
        }

        tracing::info!(goal = %goal, "no keyword matches, asking for keywords");
        match self.suggest_keywords(goal).await {
            Ok(suggested) => {
                tracing::info!(keywords = ?suggested, "suggested keywords");
                let library = self.library.lock().await;
                let ranked = keywords::rank(library.entries(), &suggested);
                if !ranked.is_empty() {
                    return Some(keywords::cap(ranked, self.config.max_candidates));
                }
            }
            Err(e) => tracing::warn!(error = %e, "keyword suggestion failed"),
        }

        tracing::info!(threshold = self.config.core_id_threshold, "falling back to core commands");
        let library = self.library.lock().await;
        let core = keywords::core_fallback(library.entries(), self.config.core_id_threshold);
        Some(keywords::cap(core, self.config.max_candidates))
    }

    async fn suggest_keywords(&self, goal: &str) -> TrigWatchResult<HashSet<String>> {
        let (provider, call) = self.registry.call_config_for_role(ROLE_KEYWORDS)?;
        let messages = vec![
            ChatMessage::system(keywords::KEYWORD_PROMPT),
            ChatMessage::user(format!("GOAL: {goal}")),
        ];
        let response = provider.chat(messages, &call).await?;
        keywords::parse_suggestion(&response.content)
    }

    async fn select(&self, goal: &str, candidates: &[Candidate]) -> TrigWatchResult<Selection> {
        let (provider, call) = self.registry.call_config_for_role(ROLE_SELECTOR)?;
        let listing = candidates
            .iter()
            .map(|c| format!("ID {}: {}", c.id, c.name))
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!("{SELECTOR_PROMPT}{listing}");
        let offered: HashSet<u32> = candidates.iter().map(|c| c.id).collect();
        let policy = RetryPolicy::new(
            self.config.max_retries,
            Duration::from_millis(self.config.retry_pause_ms),
        );

        with_retries(policy, "command selection", |attempt| {
            let provider = Arc::clone(&provider);
            let call = call.clone();
            let messages = vec![ChatMessage::system(system.clone()), ChatMessage::user(format!("GOAL: {goal}"))];
            let offered = &offered;
            async move {
                tracing::debug!(attempt, provider = provider.name(), "asking selector");
                let response = provider.chat(messages, &call).await?;
                parse_selection(&response.content, offered)
            }
        })
        .await
    }

    fn auto_aim(&self, name: &str, target: &str, fragments: &[TextFragment]) -> PlanResult {
        match aim::find_target(target, fragments, self.config.aim_similarity_floor) {
            Some(point) => {
                let kind = aim::click_script(aim::click_kind_for(name), point);
                tracing::info!(target = %target, x = point.0, y = point.1, "auto-aim hit");
                PlanResult::new(Instruction::run(kind), false, PlanSource::AutoAim)
            }
            None => {
                tracing::warn!(target = %target, "auto-aim found nothing on screen");
                PlanResult::unresolved(Instruction::noop(format!("'{target}' is not visible")))
            }
        }
    }
}

/// Scripts whose first line is a loop directive become pseudo-instructions.
fn directive(kind: CommandKind) -> Instruction {
    let CommandKind::Script { code } = &kind else {
        return Instruction::run(kind);
    };
    match script::first_step(code) {
        Some(ScriptStep::WaitForText(text)) => Instruction::WaitForText { text },
        Some(ScriptStep::Batch(content)) => Instruction::Batch {
            goals: split_batch(&content),
        },
        _ => Instruction::run(kind),
    }
}

/// Batch content is split on `;;` when present, otherwise on `|`. Line
/// breaks always separate goals.
pub fn split_batch(content: &str) -> Vec<String> {
    let separator = if content.contains(";;") { ";;" } else { "|" };
    content
        .replace(separator, "\n")
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::TrigWatchError;
    use crate::library::store::CommandLibrary;
    use crate::library::types::CommandEntry;
    use crate::library::variables::VariableStore;
    use crate::llm::provider::LlmProvider;
    use crate::llm::types::{CallConfig, LlmResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    /// Replies with queued contents in order; records every system prompt.
    pub struct ScriptedLlm {
        replies: StdMutex<VecDeque<TrigWatchResult<String>>>,
        prompts: StdMutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new(replies: Vec<TrigWatchResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(replies.into()),
                prompts: StdMutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        pub fn prompt(&self, idx: usize) -> String {
            self.prompts.lock().unwrap()[idx].clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> TrigWatchResult<LlmResponse> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TrigWatchError::LlmProvider("no reply queued".into())));
            next.map(|content| LlmResponse { content })
        }
    }

    fn ok(s: &str) -> TrigWatchResult<String> {
        Ok(s.to_string())
    }

    fn planner_with(entries: Vec<CommandEntry>, llm: Arc<ScriptedLlm>, vars: VariableStore) -> CommandPlanner {
        let mut library = CommandLibrary::in_memory();
        for e in entries {
            library.insert(e).unwrap();
        }
        let mut registry = ProviderRegistry::new("scripted".into());
        registry.register(llm);
        let config = PlannerConfig {
            retry_pause_ms: 0,
            ..PlannerConfig::default()
        };
        CommandPlanner::new(
            Arc::new(Mutex::new(library)),
            Arc::new(Mutex::new(vars)),
            Arc::new(registry),
            config,
        )
    }

    fn seeded_planner(llm: Arc<ScriptedLlm>) -> CommandPlanner {
        let planner = planner_with(vec![], llm, VariableStore::new());
        planner.library.try_lock().unwrap().seed_defaults();
        planner
    }

    fn script(code: &str) -> CommandKind {
        CommandKind::Script { code: code.into() }
    }

    #[tokio::test]
    async fn keyword_match_skips_keyword_suggestion() {
        let llm = ScriptedLlm::new(vec![ok("{\"id\": 1, \"var\": \"\"}")]);
        let planner = planner_with(
            vec![
                CommandEntry::new("open browser", 1, CommandKind::Url { url: "https://example.com".into() })
                    .with_description("web"),
                CommandEntry::new("open notepad", 2, script("spawn \"notepad\"")).with_description("editor"),
            ],
            llm.clone(),
            VariableStore::new(),
        );

        let result = planner.plan("open browser", &[]).await;
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompt(0).starts_with("You are a Command Selector"));
        let listing = llm.prompt(0);
        assert!(listing.find("ID 1: open browser").unwrap() < listing.find("ID 2: open notepad").unwrap());
        assert_eq!(
            result,
            PlanResult::new(
                Instruction::run(CommandKind::Url { url: "https://example.com".into() }),
                true,
                PlanSource::Library
            )
        );
    }

    #[tokio::test]
    async fn malformed_selection_is_retried_twice() {
        let llm = ScriptedLlm::new(vec![ok("I think 102"), ok("{\"id\": 555}"), ok("{\"id\": \"102\"}")]);
        let planner = seeded_planner(llm.clone());

        let result = planner.plan("type text | hello", &[]).await;
        assert_eq!(llm.calls(), 3);
        assert_eq!(result.instruction, Instruction::run(script("type \"hello\"")));
        assert!(result.is_cached);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_without_side_effects() {
        let llm = ScriptedLlm::new(vec![ok("nope"), ok("nope"), ok("nope"), ok("{\"id\": 102}")]);
        let planner = seeded_planner(llm.clone());

        let result = planner.plan("type text | hello", &[]).await;
        assert_eq!(llm.calls(), 3);
        assert!(matches!(result.instruction, Instruction::Failed { .. }));
        assert!(!result.is_cached);
        assert!(result.learnable().is_none());
    }

    #[tokio::test]
    async fn auto_aim_clicks_visible_text() {
        let llm = ScriptedLlm::new(vec![ok("{\"id\": 103, \"var\": \"\"}")]);
        let planner = seeded_planner(llm);
        let fragments = vec![TextFragment::new("Cancel", 100, 300), TextFragment::new("Submit", 500, 300)];

        let result = planner.plan("click | Submit", &fragments).await;
        assert_eq!(result.instruction, Instruction::run(script("click 500 300")));
        assert_eq!(result.source, PlanSource::AutoAim);
        assert!(!result.is_cached);
    }

    #[tokio::test]
    async fn auto_aim_miss_is_a_noop() {
        let llm = ScriptedLlm::new(vec![ok("{\"id\": 109}")]);
        let planner = seeded_planner(llm);
        let result = planner.plan("right click | Options", &[TextFragment::new("Cancel", 1, 1)]).await;
        assert!(matches!(result.instruction, Instruction::Noop { .. }));
    }

    #[tokio::test]
    async fn reflex_bypasses_the_library() {
        let llm = ScriptedLlm::new(vec![]);
        let planner = seeded_planner(llm.clone());
        let result = planner.plan("echo \"hi\" > out.txt", &[]).await;
        assert_eq!(llm.calls(), 0);
        assert_eq!(result.instruction, Instruction::run(script("spawn \"echo \\\"hi\\\" > out.txt\"")));
        assert_eq!(result.source, PlanSource::Reflex);
        assert!(result.learnable().is_none());
    }

    #[tokio::test]
    async fn goal_reference_becomes_the_variable() {
        let mut vars = VariableStore::new();
        vars.set("4", "quarterly report");
        let llm = ScriptedLlm::new(vec![ok("{\"id\": 102, \"var\": \"ignored\"}")]);
        let planner = planner_with(
            vec![CommandEntry::new("type text", 102, script("type \"__VAR__\""))],
            llm,
            vars,
        );
        let result = planner.plan("type text $V4", &[]).await;
        assert_eq!(result.instruction, Instruction::run(script("type \"quarterly report\"")));
    }

    #[tokio::test]
    async fn model_variable_used_when_no_inline_one() {
        let llm = ScriptedLlm::new(vec![ok("```json\n{\"id\": 102, \"var\": \"hello\"}\n```")]);
        let planner = seeded_planner(llm);
        let result = planner.plan("type hello", &[]).await;
        assert_eq!(result.instruction, Instruction::run(script("type \"hello\"")));
    }

    #[tokio::test]
    async fn unmatched_goal_asks_for_keywords_then_falls_back_to_core() {
        let llm = ScriptedLlm::new(vec![ok("{\"keywords\": [\"zzz\"]}"), ok("{\"id\": 104}")]);
        let planner = planner_with(
            vec![
                CommandEntry::new("minimize", 104, CommandKind::Hotkey { keys: vec!["win".into(), "d".into()] }),
                CommandEntry::new("learned thing", 4321, script("type \"x\"")),
            ],
            llm.clone(),
            VariableStore::new(),
        );

        let result = planner.plan("hide everything", &[]).await;
        assert_eq!(llm.calls(), 2);
        assert!(llm.prompt(0).contains("keywords"));
        let listing = llm.prompt(1);
        assert!(listing.contains("ID 104: minimize"));
        assert!(!listing.contains("4321"));
        assert_eq!(
            result.instruction,
            Instruction::run(CommandKind::Hotkey { keys: vec!["win".into(), "d".into()] })
        );
    }

    #[tokio::test]
    async fn suggested_keywords_rescore_the_library() {
        let llm = ScriptedLlm::new(vec![ok("{\"keywords\": [\"desktop\", \"hide\"]}"), ok("{\"id\": 104}")]);
        let planner = seeded_planner(llm.clone());
        let result = planner.plan("make everything vanish", &[]).await;
        assert_eq!(llm.calls(), 2);
        assert!(llm.prompt(1).contains("ID 104: minimize"));
        assert!(result.is_cached);
    }

    #[tokio::test]
    async fn empty_library_fails() {
        let llm = ScriptedLlm::new(vec![]);
        let planner = planner_with(vec![], llm.clone(), VariableStore::new());
        let result = planner.plan("open app | calc", &[]).await;
        assert!(matches!(result.instruction, Instruction::Failed { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn directives_become_pseudo_instructions() {
        let llm = ScriptedLlm::new(vec![ok("{\"id\": 105}"), ok("{\"id\": 107}")]);
        let planner = seeded_planner(llm);

        let wait = planner.plan("wait for text | Saved", &[]).await;
        assert_eq!(wait.instruction, Instruction::WaitForText { text: "Saved".into() });

        let batch = planner.plan("note down | buy milk ;; call bob", &[]).await;
        assert_eq!(
            batch.instruction,
            Instruction::Batch {
                goals: vec!["buy milk".into(), "call bob".into()]
            }
        );
    }

    #[test]
    fn batch_falls_back_to_pipe() {
        assert_eq!(split_batch("a | b |"), vec!["a", "b"]);
        assert_eq!(split_batch("a | b ;; c"), vec!["a | b", "c"]);
        assert_eq!(split_batch("a\nb"), vec!["a", "b"]);
    }
}
