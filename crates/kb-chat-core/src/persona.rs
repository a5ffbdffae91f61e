//! Built-in personas selected by the request's `agent_type`.
//!
//! | `agent_type` | Persona | Plain-text output | Fee-first retrieval |
//! |--------------|---------|-------------------|---------------------|
//! | `license_recommendation` | DFSA licensing assistant | yes | yes |
//! | `regulatory_advisor` | DFSA regulatory advisor | no | no |
//! | anything else / absent | generic assistant | no | no |

use serde::Serialize;

/// Request-supplied discriminator, parsed by exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    LicenseRecommendation,
    RegulatoryAdvisor,
    Generic,
}

impl AgentType {
    pub const LICENSE_RECOMMENDATION: &'static str = "license_recommendation";
    pub const REGULATORY_ADVISOR: &'static str = "regulatory_advisor";

    /// Unknown or absent values map to [`AgentType::Generic`].
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(Self::LICENSE_RECOMMENDATION) => AgentType::LicenseRecommendation,
            Some(Self::REGULATORY_ADVISOR) => AgentType::RegulatoryAdvisor,
            _ => AgentType::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::LicenseRecommendation => Self::LICENSE_RECOMMENDATION,
            AgentType::RegulatoryAdvisor => Self::REGULATORY_ADVISOR,
            AgentType::Generic => "generic",
        }
    }

    pub fn persona(&self) -> Persona {
        match self {
            AgentType::LicenseRecommendation => Persona {
                agent_type: *self,
                system_prompt: LICENSE_RECOMMENDATION_PROMPT,
                plain_text_output: true,
                prioritize_fees: true,
            },
            AgentType::RegulatoryAdvisor => Persona {
                agent_type: *self,
                system_prompt: REGULATORY_ADVISOR_PROMPT,
                plain_text_output: false,
                prioritize_fees: false,
            },
            AgentType::Generic => Persona {
                agent_type: *self,
                system_prompt: GENERIC_PROMPT,
                plain_text_output: false,
                prioritize_fees: false,
            },
        }
    }
}

/// A fixed system-prompt configuration bound to an [`AgentType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub agent_type: AgentType,
    pub system_prompt: &'static str,
    /// Strip markdown from the model's reply before returning it.
    pub plain_text_output: bool,
    /// Move fee-related fragments ahead of all others during ranking.
    pub prioritize_fees: bool,
}

/// Shorthand for `AgentType::parse(value).persona()`.
pub fn persona_for(agent_type: Option<&str>) -> Persona {
    AgentType::parse(agent_type).persona()
}

const GENERIC_PROMPT: &str = "You are a helpful AI assistant.";

const LICENSE_RECOMMENDATION_PROMPT: &str = "\
You are an expert DFSA Licensing Assistant. Your role is to:
1. Recommend the most suitable DFSA license based on the applicant's business sector and activities.
2. Verify eligibility criteria for the recommended license.
3. Provide step-by-step regulatory pathway guidance.
4. Include relevant fee information from the DFSA Fee Module Reference Guide.
5. Ensure all recommendations comply with DFSA regulations.

CRITICAL: Never use markdown formatting. Use only plain text. No **, ##, ###, -, *, _, or any markdown symbols.

RESPONSE FORMAT:
When recommending licenses, structure your response as follows:

RECOMMENDED LICENSE: [License Name]
Description: [Brief description of the license]
Minimum Capital: [Amount in AED]

ELIGIBILITY CRITERIA:
\u{2022} [Criterion 1]
\u{2022} [Criterion 2]
\u{2022} [Criterion 3]

FEES:
Application Fee: [Amount]
Annual License Fee: [Amount]

NEXT STEPS:
Step 1: [First step description]
Step 2: [Second step description]
Step 3: [Third step description]

If you cannot determine the appropriate license based on the provided information, ask clarifying questions about the applicant's business activities and sector.

Always reference the DFSA Licensing Database and Fee Module for accurate information.";

const REGULATORY_ADVISOR_PROMPT: &str = "\
You are an expert DFSA Regulatory Advisor. Your role is to:
1. Provide guidance on DFSA regulatory requirements and compliance.
2. Explain regulatory frameworks and their implications.
3. Offer strategic advice on regulatory matters.
4. Ensure all guidance complies with current DFSA regulations.";
