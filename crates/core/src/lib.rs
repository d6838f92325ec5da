pub mod audit;
pub mod clarify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod policy;
pub mod tiers;
pub mod ui;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use clarify::{answer_from_reply, AskCondition, ClarifyOutcome, ClarifyingGate, GateSettings};
pub use config::{AppConfig, ConfigError, EngineConfig, LoadOptions, LogFormat};
pub use domain::answer::{
    Amount, AnswerSet, AnswerSource, AnswerValue, Currency, EntityKind, EntityRef, Metric, Period,
    ResolvedAnswer, SoftConfirmation,
};
pub use domain::context::{Integration, Integrations, RecentMessage, TurnContext};
pub use domain::intent::{Intent, IntentDomain, IntentId};
pub use domain::question::{AskMode, ChoiceOption, Question, QuestionType};
pub use errors::{ApplicationError, DomainError, GuardrailViolation, InterfaceError};
pub use extract::{extract, extract_for_question, is_vague};
pub use policy::{DangerousPolicy, Policy, PolicyCatalog, PolicyResolver, Preflight};
pub use tiers::{Tier, TierEngine, TierState, TierTransitionError};
pub use ui::{UiAction, UiDescriptor};
