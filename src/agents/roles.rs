//! Evaluation personas.
//!
//! Each role is a fixed persona: an identity, the dimension it scores (if any)
//! and the instruction text sent as its system prompt. The instruction texts
//! spell out the exact JSON document the role must return inside a fenced
//! ```` ```json ```` block.

use serde::{Deserialize, Serialize};

use crate::result::MetricId;

// ============================================================================
// Role Kinds
// ============================================================================

/// Every role that takes part in an evaluation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Collects the four dimensions and produces the combined report.
    Coordinator,
    Accuracy,
    Comprehensiveness,
    Logic,
    Professionalism,
    /// Gives the overall score only.
    TotalScore,
    /// Issues the content to evaluate and receives the final reply.
    Submitter,
}

impl RoleKind {
    /// All roles in team order.
    pub const ALL: [RoleKind; 7] = [
        RoleKind::Coordinator,
        RoleKind::Accuracy,
        RoleKind::Comprehensiveness,
        RoleKind::Logic,
        RoleKind::Professionalism,
        RoleKind::TotalScore,
        RoleKind::Submitter,
    ];

    /// The four single-dimension specialists.
    pub const SPECIALISTS: [RoleKind; 4] = [
        RoleKind::Accuracy,
        RoleKind::Comprehensiveness,
        RoleKind::Logic,
        RoleKind::Professionalism,
    ];

    /// Symbolic role id recorded in transcripts.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Accuracy => "accuracy",
            Self::Comprehensiveness => "comprehensiveness",
            Self::Logic => "logic",
            Self::Professionalism => "professionalism",
            Self::TotalScore => "totalscore",
            Self::Submitter => "submitter",
        }
    }

    /// Key of this role in the team mapping.
    pub fn team_key(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Accuracy => "accuracy_expert",
            Self::Comprehensiveness => "comprehensiveness_expert",
            Self::Logic => "logic_expert",
            Self::Professionalism => "professionalism_expert",
            Self::TotalScore => "totalscore_expert",
            Self::Submitter => "user_proxy",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Coordinator => "Coordinator",
            Self::Accuracy => "AccuracyExpert",
            Self::Comprehensiveness => "ComprehensivenessExpert",
            Self::Logic => "LogicExpert",
            Self::Professionalism => "ProfessionalismExpert",
            Self::TotalScore => "TotalScoreExpert",
            Self::Submitter => "UserProxy",
        }
    }

    /// The dimension scored by this role, for specialists.
    pub fn metric(&self) -> Option<MetricId> {
        match self {
            Self::Accuracy => Some(MetricId::Accuracy),
            Self::Comprehensiveness => Some(MetricId::Comprehensiveness),
            Self::Logic => Some(MetricId::Logic),
            Self::Professionalism => Some(MetricId::Professionalism),
            _ => None,
        }
    }

    pub fn is_specialist(&self) -> bool {
        self.metric().is_some()
    }

    /// Parses a role id or team key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.id() == name || k.team_key() == name)
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

// ============================================================================
// Role Definition
// ============================================================================

/// Immutable descriptor for one persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Symbolic name, e.g. "accuracy".
    pub id: String,
    pub display_name: String,
    /// Full behavioral contract, including the output schema.
    pub instruction_text: String,
    pub is_coordinator: bool,
}

impl RoleDefinition {
    /// Builds the fixed definition for `kind`.
    pub fn for_kind(kind: RoleKind) -> Self {
        let instruction_text = match kind {
            RoleKind::Coordinator => coordinator_instruction(),
            RoleKind::TotalScore => TOTALSCORE_INSTRUCTION.to_string(),
            RoleKind::Submitter => String::new(),
            specialist => {
                let (metric, rubric) = match specialist.metric() {
                    Some(MetricId::Accuracy) => (MetricId::Accuracy, ACCURACY_RUBRIC),
                    Some(MetricId::Comprehensiveness) => {
                        (MetricId::Comprehensiveness, COMPREHENSIVENESS_RUBRIC)
                    }
                    Some(MetricId::Logic) => (MetricId::Logic, LOGIC_RUBRIC),
                    _ => (MetricId::Professionalism, PROFESSIONALISM_RUBRIC),
                };
                specialist_instruction(metric, rubric)
            }
        };

        Self {
            id: kind.id().to_string(),
            display_name: kind.display_name().to_string(),
            instruction_text,
            is_coordinator: kind == RoleKind::Coordinator,
        }
    }
}

// ============================================================================
// Instruction Texts
// ============================================================================

/// Prefix of the single message the submitter sends to the coordinator.
pub const SUBMISSION_PREFIX: &str = "请直接返回JSON格式评测结果：\n";

/// Appended to a re-ask after a reply that could not be parsed.
pub const STRICT_REMINDER: &str = "上一次回复无法解析。请只返回一个```json代码块，内容必须完全符合规定的JSON格式：包含metrics（四个指标）和totalscore（一个总分），所有评分为double类型数值，不要添加任何额外字段或解释文字。";

const ACCURACY_RUBRIC: &str = "你是专注于评估直播内容准确性的专家。你需要:
1. 检查直播中陈述的事实是否准确
2. 识别任何错误信息或误导性内容
3. 评估信息来源的可靠性
4. 给出1-100的准确性评分";

const COMPREHENSIVENESS_RUBRIC: &str = "你是专注于评估直播内容全面性的专家。你需要:
1. 评估直播是否涵盖了主题的所有关键方面
2. 检查是否有重要信息被遗漏
3. 评估内容的深度和广度
4. 给出1-100的全面性评分";

const LOGIC_RUBRIC: &str = "你是专注于评估直播内容逻辑性的专家。你需要:
1. 分析论点的结构和推理过程
2. 识别任何逻辑谬误或矛盾
3. 评估结论是否由前提合理推导出
4. 检查内容组织的连贯性和清晰度
5. 给出1-100的逻辑性评分";

const PROFESSIONALISM_RUBRIC: &str = "你是专注于评估直播内容专业性的专家。你需要:
1. 评估主播/讲者的专业知识水平
2. 检查专业术语的使用是否恰当
3. 评估内容的深度和技术准确性
4. 考量信息的时效性和相关性
5. 给出1-100的专业性评分";

const OUTPUT_RULES: &str = "注意：
- 所有评分必须是double类型数值
- 不要添加任何额外的字段
- 确保JSON格式完全符合要求
- 将JSON放在```json代码块中返回";

const TOTALSCORE_INSTRUCTION: &str = "你是专注于根据专业性、逻辑性、全面性、准确性给出全面评价的专家。你需要:
1. 综合评估主播的整体表现
2. 给出1-100分的总分
3. 必须严格按照以下JSON格式返回结果：

```json
{
  \"totalscore\": [
    {
      \"score\": 85.5
    }
  ]
}
```

注意：
- 评分必须是double类型数值（1-100之间）
- 不要添加任何额外的字段
- 确保JSON格式完全符合要求
- 将JSON放在```json代码块中返回";

fn metric_block(metric: MetricId, score: &str, indent: &str) -> String {
    format!(
        "{i}{{\n{i}  \"metricId\": \"{id}\",\n{i}  \"metricname\": \"{name}\",\n{i}  \"score\": {score},\n{i}  \"description\": {{\n{i}    \"level\": \"优秀\",\n{i}    \"suggestion\": \"建议xxx\",\n{i}    \"evaluation\": \"评估结论xxx\"\n{i}  }}\n{i}}}",
        i = indent,
        id = metric.as_str(),
        name = metric.display_name(),
        score = score,
    )
}

fn specialist_instruction(metric: MetricId, rubric: &str) -> String {
    format!(
        "{rubric}\n必须严格按照以下JSON格式返回结果（score为1-100之间的double数值，level为\"优秀\"、\"良好\"、\"一般\"、\"需改进\"等等级）：\n\n```json\n{{\n  \"metrics\": [\n{block}\n  ]\n}}\n```\n\n{rules}",
        rubric = rubric,
        block = metric_block(metric, "85.5", "    "),
        rules = OUTPUT_RULES,
    )
}

fn coordinator_instruction() -> String {
    let scores = ["85.5", "80.0", "90.0", "75.5"];
    let blocks: Vec<String> = MetricId::ALL
        .iter()
        .zip(scores)
        .map(|(metric, score)| metric_block(*metric, score, "    "))
        .collect();

    format!(
        "你是直播评测系统的协调者。你负责:
1. 协调准确性、全面性、逻辑性、专业性四位专家的评测工作
2. 收集并整合所有维度的评测结果
3. 生成最终的JSON格式评测报告
4. 确保评测流程的完整性和一致性

必须严格按照以下JSON格式返回最终结果：

```json
{{
  \"metrics\": [
{blocks}
  ],
  \"totalscore\": [
    {{
      \"score\": 82.75
    }}
  ]
}}
```

{rules}
- metrics必须恰好包含accuracy、comprehensiveness、logic、professionalism四个指标
- 总分应该是所有指标分数的平均值",
        blocks = blocks.join(",\n"),
        rules = OUTPUT_RULES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::locate_fenced_json;

    #[test]
    fn test_role_names() {
        assert_eq!(RoleKind::Submitter.team_key(), "user_proxy");
        assert_eq!(RoleKind::from_name("user_proxy"), Some(RoleKind::Submitter));
        assert_eq!(RoleKind::from_name("logic"), Some(RoleKind::Logic));
        assert_eq!(RoleKind::from_name("logic_expert"), Some(RoleKind::Logic));
        assert_eq!(RoleKind::from_name("moderator"), None);
    }

    #[test]
    fn test_specialists_map_to_metrics() {
        let metrics: Vec<MetricId> = RoleKind::SPECIALISTS
            .iter()
            .filter_map(|k| k.metric())
            .collect();
        assert_eq!(metrics, MetricId::ALL.to_vec());
        assert!(!RoleKind::Coordinator.is_specialist());
    }

    #[test]
    fn test_specialist_instruction_schema_is_valid_json() {
        for kind in RoleKind::SPECIALISTS {
            let def = RoleDefinition::for_kind(kind);
            let metric = kind.metric().expect("specialist metric");
            let json = locate_fenced_json(&def.instruction_text).expect("schema block");
            let value: serde_json::Value = serde_json::from_str(json).expect("valid JSON");
            assert_eq!(value["metrics"][0]["metricId"], metric.as_str());
            assert!(def.instruction_text.contains("double"));
            assert!(def.instruction_text.contains("不要添加任何额外的字段"));
            assert!(!def.is_coordinator);
        }
    }

    #[test]
    fn test_coordinator_instruction_declares_full_report() {
        let def = RoleDefinition::for_kind(RoleKind::Coordinator);
        assert!(def.is_coordinator);
        assert!(def.instruction_text.contains("平均值"));

        let json = locate_fenced_json(&def.instruction_text).expect("schema block");
        let value: serde_json::Value = serde_json::from_str(json).expect("valid JSON");
        assert_eq!(value["metrics"].as_array().map(|a| a.len()), Some(4));
        assert_eq!(value["totalscore"][0]["score"], 82.75);
    }

    #[test]
    fn test_submitter_has_no_instruction() {
        let def = RoleDefinition::for_kind(RoleKind::Submitter);
        assert!(def.instruction_text.is_empty());
        assert_eq!(def.id, "submitter");
    }
}
