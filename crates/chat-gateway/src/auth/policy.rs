//! Access decisions and the gateway policy document they serialize to.

use serde::Serialize;
use std::collections::BTreeMap;

/// IAM policy language version expected by the gateway.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action granted by an allow decision.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// The token subject.
    pub principal_id: String,
    pub effect: Effect,
    /// Resource exactly as supplied by the caller.
    pub resource: String,
    /// Flattened, string-valued user info.
    pub context: BTreeMap<String, String>,
}

impl AccessDecision {
    /// Allow `principal_id` to invoke `resource`.
    pub fn allow(
        principal_id: String,
        resource: String,
        context: BTreeMap<String, String>,
    ) -> Self {
        Self {
            principal_id,
            effect: Effect::Allow,
            resource,
            context,
        }
    }

    /// Gateway policy document for this decision.
    pub fn to_policy(&self) -> PolicyResponse<'_> {
        PolicyResponse {
            principal_id: &self.principal_id,
            policy_document: PolicyDocument {
                version: POLICY_VERSION,
                statement: [Statement {
                    action: INVOKE_ACTION,
                    effect: self.effect,
                    resource: &self.resource,
                }],
            },
            context: &self.context,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse<'a> {
    pub principal_id: &'a str,
    pub policy_document: PolicyDocument<'a>,
    pub context: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument<'a> {
    pub version: &'static str,
    pub statement: [Statement<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement<'a> {
    pub action: &'static str,
    pub effect: Effect,
    pub resource: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_shape() {
        let decision = AccessDecision::allow(
            "user-123".to_string(),
            "arn:aws:execute-api:eu-west-1:123:api/prod/POST/chat".to_string(),
            BTreeMap::from([("userId".to_string(), "user-123".to_string())]),
        );

        let json = serde_json::to_value(decision.to_policy()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "principalId": "user-123",
                "policyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": "execute-api:Invoke",
                        "Effect": "Allow",
                        "Resource": "arn:aws:execute-api:eu-west-1:123:api/prod/POST/chat"
                    }]
                },
                "context": {"userId": "user-123"}
            })
        );
    }

    #[test]
    fn test_deny_effect_serializes() {
        let mut decision = AccessDecision::allow("u".to_string(), "r".to_string(), BTreeMap::new());
        decision.effect = Effect::Deny;

        let json = serde_json::to_value(decision.to_policy()).unwrap();
        assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Deny");
    }
}
