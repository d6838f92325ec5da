use thiserror::Error;

use crate::tiers::{Tier, TierTransitionError};

/// Why a proposed tool call was refused before reaching the executor.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GuardrailViolation {
    #[error("tool `{tool}` is not allowed by the current policy")]
    ToolNotAllowed { tool: String },
    #[error("{requested} tool calls exceed the budget of {max}")]
    BudgetExceeded { requested: usize, max: u32 },
    #[error("dangerous tool `{tool}` requested in tier {tier}, only the actions tier may mutate")]
    OutsideActionsTier { tool: String, tier: Tier },
    #[error("dangerous tool `{tool}` requires an explicit approval")]
    ApprovalRequired { tool: String },
    #[error("dangerous tool `{tool}` was rejected by the user")]
    ApprovalRejected { tool: String },
    #[error("dangerous tools are disabled by configuration")]
    DangerousToolsDisabled { tool: String },
    #[error("clarification pending for fields {fields:?}")]
    ClarificationPending { fields: Vec<String> },
    #[error("preflight failed: {message}")]
    PreflightFailed { message: String },
}

impl GuardrailViolation {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ToolNotAllowed { .. } => "tool_not_allowed",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::OutsideActionsTier { .. } => "outside_actions_tier",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::ApprovalRejected { .. } => "approval_rejected",
            Self::DangerousToolsDisabled { .. } => "dangerous_tools_disabled",
            Self::ClarificationPending { .. } => "clarification_pending",
            Self::PreflightFailed { .. } => "preflight_failed",
        }
    }

    /// Natural-language explanation for the end user. Never exposes codes.
    pub fn user_message(&self) -> String {
        match self {
            Self::ToolNotAllowed { .. } | Self::BudgetExceeded { .. } => {
                "Это действие сейчас недоступно. Давайте сначала уточним задачу.".to_owned()
            }
            Self::OutsideActionsTier { .. } => {
                "Сначала разберём ситуацию, а изменения предложу на шаге действий.".to_owned()
            }
            Self::ApprovalRequired { .. } => "Подтвердите действие, прежде чем я его выполню.".to_owned(),
            Self::ApprovalRejected { .. } => "Хорошо, ничего не меняю.".to_owned(),
            Self::DangerousToolsDisabled { .. } => {
                "Изменения в кабинете сейчас отключены администратором.".to_owned()
            }
            Self::ClarificationPending { .. } => "Нужно ещё одно уточнение, прежде чем продолжить.".to_owned(),
            Self::PreflightFailed { message } => message.clone(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    TierTransition(#[from] TierTransitionError),
    #[error("guardrail violation: {0}")]
    Guardrail(#[from] GuardrailViolation),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("tool execution failure: {0}")]
    Execution(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Не получилось выполнить запрос. Проверьте данные и попробуйте ещё раз.",
            Self::ServiceUnavailable { .. } => "Сервис временно недоступен. Попробуйте чуть позже.",
            Self::Internal { .. } => "Произошла внутренняя ошибка.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Execution(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
