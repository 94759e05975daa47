//! Kubernetes-standard status condition helpers
//!
//! Provides the condition type shared by every CRD in this crate, the
//! transition-time aware update helper, and [`ConditionSet`], which derives a
//! resource's aggregate `Ready` condition from its member conditions.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate condition type present on every resource
pub const CONDITION_READY: &str = "Ready";

/// Member condition mirroring the dependent Topic's readiness
pub const CONDITION_TOPIC_READY: &str = "TopicReady";

/// Member condition mirroring the dependent PullSubscription's readiness
pub const CONDITION_PULL_SUBSCRIPTION_READY: &str = "PullSubscriptionReady";

/// Condition set shared by every PubSub-backed source kind
pub static PUBSUB_CONDITION_SET: ConditionSet =
    ConditionSet::new(&[CONDITION_TOPIC_READY, CONDITION_PULL_SUBSCRIPTION_READY]);

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Condition of a resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time the condition transitioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Build a condition with the current timestamp.
///
/// Empty `reason` or `message` strings are stored as absent.
pub fn build_condition(
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status,
        last_transition_time: Some(Utc::now().to_rfc3339()),
        reason: non_empty(reason),
        message: non_empty(message),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Set or update a condition in a list, preserving lastTransitionTime when status hasn't changed.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        if existing.status != new.status {
            *existing = new;
        } else {
            existing.reason = new.reason;
            existing.message = new.message;
        }
    } else {
        conditions.push(new);
    }
}

/// Carries `lastTransitionTime` over from `previous` for every condition
/// whose status is the same as before.
///
/// Lets a pass move conditions through intermediate states (a reset, then the
/// observed value) without stamping a transition that never happened.
pub fn preserve_transition_times(previous: &[Condition], conditions: &mut [Condition]) {
    for c in conditions.iter_mut() {
        if let Some(prev) = get_condition(previous, &c.r#type) {
            if prev.status == c.status {
                c.last_transition_time = prev.last_transition_time.clone();
            }
        }
    }
}

/// Look up a condition by type.
pub fn get_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Folds member statuses into the aggregate status.
///
/// Any `False` yields `False`. Otherwise any `Unknown` or absent member yields
/// `Unknown`. Only an all-`True` set (including the empty set) yields `True`.
pub fn fold_status<I>(members: I) -> ConditionStatus
where
    I: IntoIterator<Item = Option<ConditionStatus>>,
{
    members
        .into_iter()
        .fold(ConditionStatus::True, |acc, member| {
            match (acc, member.unwrap_or(ConditionStatus::Unknown)) {
                (ConditionStatus::False, _) | (_, ConditionStatus::False) => ConditionStatus::False,
                (ConditionStatus::Unknown, _) | (_, ConditionStatus::Unknown) => {
                    ConditionStatus::Unknown
                }
                _ => ConditionStatus::True,
            }
        })
}

/// The derived `Ready` condition together with the member it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

/// An ordered set of member condition types plus the implicit `Ready`.
#[derive(Debug)]
pub struct ConditionSet {
    members: &'static [&'static str],
}

impl ConditionSet {
    pub const fn new(members: &'static [&'static str]) -> Self {
        Self { members }
    }

    /// Member condition types, in declaration order.
    pub fn members(&self) -> &'static [&'static str] {
        self.members
    }

    pub fn contains(&self, condition_type: &str) -> bool {
        condition_type == CONDITION_READY || self.members.contains(&condition_type)
    }

    /// Computes `Ready` from the members present in `conditions`.
    ///
    /// Reason and message come from the first `False` member, or failing that
    /// the first non-`True` one.
    pub fn aggregate(&self, conditions: &[Condition]) -> Aggregate {
        let status = fold_status(
            self.members
                .iter()
                .map(|t| get_condition(conditions, t).map(|c| c.status)),
        );

        let culprit = |wanted: ConditionStatus| {
            self.members.iter().find_map(|t| match get_condition(conditions, t) {
                Some(c) if c.status == wanted => Some((
                    c.reason.clone().unwrap_or_default(),
                    c.message.clone().unwrap_or_default(),
                )),
                None if wanted == ConditionStatus::Unknown => {
                    Some((format!("{}Missing", t), format!("{} has not been reported", t)))
                }
                _ => None,
            })
        };

        let (reason, message) = match status {
            ConditionStatus::True => (String::new(), String::new()),
            other => culprit(other).unwrap_or_default(),
        };

        Aggregate {
            status,
            reason,
            message,
        }
    }

    /// Adds any missing member, and `Ready`, as `Unknown`.
    pub fn initialize(&self, conditions: &mut Vec<Condition>) {
        for t in self.members.iter().copied().chain([CONDITION_READY]) {
            if get_condition(conditions, t).is_none() {
                conditions.push(build_condition(t, ConditionStatus::Unknown, "", ""));
            }
        }
    }

    /// Sets a member condition and recomputes `Ready`.
    pub fn mark(
        &self,
        conditions: &mut Vec<Condition>,
        condition_type: &str,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) {
        set_condition(conditions, build_condition(condition_type, status, reason, message));
        self.recompute_ready(conditions);
    }

    /// Sets every member back to `Unknown` and recomputes `Ready`.
    pub fn reset(&self, conditions: &mut Vec<Condition>, reason: &str, message: &str) {
        for t in self.members {
            set_condition(
                conditions,
                build_condition(t, ConditionStatus::Unknown, reason, message),
            );
        }
        self.recompute_ready(conditions);
    }

    /// Forces `Ready` to `False` without touching the members.
    pub fn mark_not_ready(&self, conditions: &mut Vec<Condition>, reason: &str, message: &str) {
        set_condition(
            conditions,
            build_condition(CONDITION_READY, ConditionStatus::False, reason, message),
        );
    }

    pub fn recompute_ready(&self, conditions: &mut Vec<Condition>) {
        let agg = self.aggregate(conditions);
        set_condition(
            conditions,
            build_condition(CONDITION_READY, agg.status, &agg.reason, &agg.message),
        );
    }

    pub fn is_ready(&self, conditions: &[Condition]) -> bool {
        get_condition(conditions, CONDITION_READY).is_some_and(Condition::is_true)
    }
}
