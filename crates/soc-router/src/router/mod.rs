//! Task-to-tier routing: a fixed task-type table plus a five-step
//! override chain, with a capability guard that demotes or escalates
//! the selected tier to one whose model actually supports what the
//! task needs.

use soc_core::{ModelConfig, ModelTier, Severity};
use soc_llm::{CircuitState, ProviderHealthRegistry};

use crate::error::RouterError;

/// The kind of work being routed. Each variant has a base tier in
/// [`base_tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    IocExtraction,
    LogSummarisation,
    EntityNormalisation,
    FpSuggestion,
    AlertClassification,
    SeverityAssessment,
    Investigation,
    CtemCorrelation,
    AtlasReasoning,
    AttackPathAnalysis,
    IncidentReport,
    PlaybookSelection,
    FpPatternTraining,
    PlaybookGeneration,
    AgentRedTeam,
    DetectionRuleGeneration,
    RetrospectiveAnalysis,
    ThreatLandscapeSummary,
}

/// Base tier for each task type. Unmapped task types default to
/// [`ModelTier::Tier1`] in [`base_tier`], though every variant above is
/// in fact mapped.
fn base_tier(task_type: TaskType) -> ModelTier {
    use TaskType::*;
    match task_type {
        IocExtraction | LogSummarisation | EntityNormalisation | FpSuggestion
        | AlertClassification | SeverityAssessment => ModelTier::Tier0,
        Investigation | CtemCorrelation | AtlasReasoning | AttackPathAnalysis
        | IncidentReport | PlaybookSelection => ModelTier::Tier1,
        FpPatternTraining | PlaybookGeneration | AgentRedTeam | DetectionRuleGeneration
        | RetrospectiveAnalysis | ThreatLandscapeSummary => ModelTier::Tier2,
    }
}

/// A capability a task may require of the model it's routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ExtendedThinking,
    ToolUse,
    PromptCaching,
    BatchEligible,
}

impl Capability {
    fn supported_by(self, config: &ModelConfig) -> bool {
        match self {
            Capability::ExtendedThinking => config.supports_extended_thinking,
            Capability::ToolUse => config.supports_tool_use,
            Capability::PromptCaching => config.supports_prompt_caching,
            Capability::BatchEligible => config.batch_eligible,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Capability::ExtendedThinking => "extended_thinking",
            Capability::ToolUse => "tool_use",
            Capability::PromptCaching => "prompt_caching",
            Capability::BatchEligible => "batch_eligible",
        }
    }
}

/// Describes the task being routed.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_type: TaskType,
    pub context_tokens: u32,
    pub time_budget_seconds: u32,
    pub alert_severity: Severity,
    pub requires_reasoning: bool,
    pub previous_confidence: Option<f64>,
    /// Capabilities the task needs from whichever model it's routed
    /// to. Most tasks need none; a task that calls tools or needs a
    /// cached system prompt lists them here.
    pub required_capabilities: Vec<Capability>,
}

impl TaskContext {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            context_tokens: 0,
            time_budget_seconds: 30,
            alert_severity: Severity::Medium,
            requires_reasoning: false,
            previous_confidence: None,
            required_capabilities: Vec::new(),
        }
    }
}

/// Output of [`route`]: the selected tier, its model config, and the
/// generation parameters to use.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub tier: ModelTier,
    pub model: ModelConfig,
    pub max_tokens: u32,
    pub temperature: f64,
    pub use_extended_thinking: bool,
    pub reason: String,
}

/// Tier ordering for `max()`-style comparisons in the override chain.
/// Tier2 (offline batch) ranks with Tier0 rather than above it: a
/// batch-eligible task is never "more capable" than a synchronous one
/// for the purposes of a latency-bound escalation.
pub fn tier_rank(tier: ModelTier) -> u8 {
    match tier {
        ModelTier::Tier0 => 0,
        ModelTier::Tier1 => 1,
        ModelTier::Tier1Plus => 2,
        ModelTier::Tier2 => 0,
    }
}

fn tier_max(a: ModelTier, b: ModelTier) -> ModelTier {
    if tier_rank(a) >= tier_rank(b) {
        a
    } else {
        b
    }
}

/// Route a task to a model tier, applying the five-step override
/// chain and the capability guard.
pub fn route(ctx: &TaskContext) -> Result<RoutingDecision, RouterError> {
    let mut reasons = Vec::new();

    // 1 — base tier
    let base = base_tier(ctx.task_type);
    let mut tier = base;
    reasons.push(format!("base={base:?}"));

    // 2 — time budget override
    if ctx.time_budget_seconds < 3 {
        tier = ModelTier::Tier0;
        reasons.push("time_budget<3s->tier_0".to_string());
    } else if ctx.alert_severity == Severity::Critical && ctx.requires_reasoning {
        // 3 — severity override
        let raised = tier_max(tier, ModelTier::Tier1);
        if raised != tier {
            tier = raised;
            reasons.push("critical+reasoning->min_tier_1".to_string());
        }
    }

    // 4 — context-size override
    if ctx.context_tokens > 100_000 && tier == ModelTier::Tier0 {
        tier = ModelTier::Tier1;
        reasons.push("context>100k->tier_1".to_string());
    }

    // 5 — escalation override, takes precedence over everything above
    if let Some(confidence) = ctx.previous_confidence {
        let applicable = matches!(ctx.alert_severity, Severity::Critical | Severity::High);
        if confidence < 0.6 && applicable {
            tier = ModelTier::Tier1Plus;
            reasons.push("low_confidence_escalation->tier_1+".to_string());
        }
    }

    let (tier, model) = apply_capability_guard(tier, &ctx.required_capabilities)?;
    let (max_tokens, temperature) = tier.defaults();

    Ok(RoutingDecision {
        tier,
        use_extended_thinking: tier == ModelTier::Tier1Plus,
        model,
        max_tokens,
        temperature,
        reason: reasons.join("; "),
    })
}

/// Route a task, then consult the provider health registry and
/// rewrite the decision onto a fallback model if the selected model's
/// provider is down and a differently-provided, capability-satisfying
/// model exists. Leaves the decision untouched if no fallback
/// qualifies — the resilient dispatch layer's own circuit breaker is
/// what ultimately refuses the call in that case.
pub async fn route_with_health(ctx: &TaskContext, health: &ProviderHealthRegistry) -> Result<RoutingDecision, RouterError> {
    let mut decision = route(ctx)?;

    let primary_provider = decision.model.provider.clone();
    let primary_up = health.breaker(&primary_provider).await.state().await != CircuitState::Open;
    if primary_up {
        return Ok(decision);
    }

    if let Some((tier, model)) = fallback_candidate(decision.tier, &primary_provider, &ctx.required_capabilities) {
        let (max_tokens, temperature) = tier.defaults();
        decision.reason = format!("{}; failover:{}->{}", decision.reason, primary_provider, model.provider);
        decision.use_extended_thinking = tier == ModelTier::Tier1Plus;
        decision.tier = tier;
        decision.max_tokens = max_tokens;
        decision.temperature = temperature;
        decision.model = model;
    }

    Ok(decision)
}

/// Cheapest model in a different tier that uses a different provider
/// than `primary_provider` and still satisfies `required`.
fn fallback_candidate(tier: ModelTier, primary_provider: &str, required: &[Capability]) -> Option<(ModelTier, ModelConfig)> {
    let mut candidates: Vec<(ModelTier, ModelConfig)> = [ModelTier::Tier0, ModelTier::Tier1, ModelTier::Tier1Plus, ModelTier::Tier2]
        .into_iter()
        .filter(|t| *t != tier)
        .map(|t| (t, t.config()))
        .filter(|(_, config)| config.provider != primary_provider)
        .filter(|(_, config)| required.iter().all(|c| c.supported_by(config)))
        .collect();

    candidates.sort_by(|a, b| a.1.cost_per_mtok_input.partial_cmp(&b.1.cost_per_mtok_input).unwrap());
    candidates.into_iter().next()
}

/// If the selected tier's model lacks a required capability, fall
/// back to the next lower-cost tier whose model has it. Returns an
/// error if no tier qualifies.
fn apply_capability_guard(
    tier: ModelTier,
    required: &[Capability],
) -> Result<(ModelTier, ModelConfig), RouterError> {
    let config = tier.config();
    if required.iter().all(|c| c.supported_by(&config)) {
        return Ok((tier, config));
    }

    let mut candidates = [ModelTier::Tier0, ModelTier::Tier2, ModelTier::Tier1, ModelTier::Tier1Plus];
    candidates.sort_by(|a, b| {
        a.config()
            .cost_per_mtok_input
            .partial_cmp(&b.config().cost_per_mtok_input)
            .unwrap()
    });

    for candidate in candidates {
        let candidate_config = candidate.config();
        if required.iter().all(|c| c.supported_by(&candidate_config)) {
            return Ok((candidate, candidate_config));
        }
    }

    let missing = required
        .iter()
        .find(|c| !c.supported_by(&config))
        .expect("guard only triggers when some capability is missing");
    Err(RouterError::NoCapableModel(tier, missing.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_rank_ranks_tier2_with_tier0_not_above_it() {
        assert_eq!(tier_rank(ModelTier::Tier2), tier_rank(ModelTier::Tier0));
        assert!(tier_rank(ModelTier::Tier1) > tier_rank(ModelTier::Tier2));
        assert!(tier_rank(ModelTier::Tier1Plus) > tier_rank(ModelTier::Tier1));
    }

    #[test]
    fn base_mapping_sends_extraction_to_tier0_and_investigation_to_tier1() {
        let decision = route(&TaskContext::new(TaskType::IocExtraction)).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier0);

        let decision = route(&TaskContext::new(TaskType::Investigation)).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier1);
    }

    #[test]
    fn time_budget_override_forces_tier0_even_for_investigation() {
        let mut ctx = TaskContext::new(TaskType::Investigation);
        ctx.time_budget_seconds = 1;
        let decision = route(&ctx).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier0);
        assert!(decision.reason.contains("time_budget<3s"));
    }

    #[test]
    fn critical_reasoning_raises_extraction_to_tier1() {
        let mut ctx = TaskContext::new(TaskType::IocExtraction);
        ctx.alert_severity = Severity::Critical;
        ctx.requires_reasoning = true;
        let decision = route(&ctx).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier1);
    }

    #[test]
    fn large_context_raises_tier0_task_to_tier1() {
        let mut ctx = TaskContext::new(TaskType::AlertClassification);
        ctx.context_tokens = 150_000;
        let decision = route(&ctx).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier1);
    }

    #[test]
    fn low_confidence_escalation_overrides_everything_else() {
        let mut ctx = TaskContext::new(TaskType::IocExtraction);
        ctx.time_budget_seconds = 1;
        ctx.alert_severity = Severity::High;
        ctx.previous_confidence = Some(0.4);
        let decision = route(&ctx).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier1Plus);
        assert!(decision.use_extended_thinking);
    }

    #[test]
    fn escalation_does_not_fire_on_medium_severity() {
        let mut ctx = TaskContext::new(TaskType::IocExtraction);
        ctx.previous_confidence = Some(0.2);
        ctx.alert_severity = Severity::Medium;
        let decision = route(&ctx).unwrap();
        assert_ne!(decision.tier, ModelTier::Tier1Plus);
    }

    #[test]
    fn capability_guard_falls_back_to_cheapest_tier_with_the_capability() {
        let mut ctx = TaskContext::new(TaskType::IocExtraction);
        ctx.required_capabilities = vec![Capability::ExtendedThinking];
        let decision = route(&ctx).unwrap();
        assert_eq!(decision.tier, ModelTier::Tier1Plus);
    }

    #[tokio::test]
    async fn healthy_primary_provider_is_not_failed_over() {
        let health = ProviderHealthRegistry::new(soc_llm::CircuitConfig::default());
        let ctx = TaskContext::new(TaskType::IocExtraction);
        let decision = route_with_health(&ctx, &health).await.unwrap();
        assert_eq!(decision.model.provider, "deepseek");
        assert!(!decision.reason.contains("failover"));
    }

    #[tokio::test]
    async fn open_primary_circuit_fails_over_to_a_different_provider() {
        let health = ProviderHealthRegistry::new(soc_llm::CircuitConfig { failure_threshold: 1, recovery_timeout: std::time::Duration::from_secs(300) });
        health.breaker("deepseek").await.record_failure().await;

        let ctx = TaskContext::new(TaskType::IocExtraction);
        let decision = route_with_health(&ctx, &health).await.unwrap();
        assert_ne!(decision.model.provider, "deepseek");
        assert!(decision.reason.contains("failover:deepseek->"));
    }

    #[tokio::test]
    async fn failover_respects_the_capability_guard() {
        let health = ProviderHealthRegistry::new(soc_llm::CircuitConfig { failure_threshold: 1, recovery_timeout: std::time::Duration::from_secs(300) });
        health.breaker("deepseek").await.record_failure().await;

        let mut ctx = TaskContext::new(TaskType::IocExtraction);
        ctx.required_capabilities = vec![Capability::ExtendedThinking];
        let decision = route_with_health(&ctx, &health).await.unwrap();
        assert!(decision.model.supports_extended_thinking);
    }
}
