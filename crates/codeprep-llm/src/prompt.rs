// Prompt templates for question generation and personalized question sets.
//
// Both prompts ask for a single JSON object so the answer can be parsed
// with `parse::extract_json` once streaming completes.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

/// System prompt for learning path generation.
pub fn question_system_prompt() -> String {
    "You are an expert technical interviewer creating coding interview questions.\n\
     You always answer with a single JSON object and nothing else: no prose, \
     no markdown fences."
        .to_string()
}

/// System prompt for the personalized question-set flow.
pub fn personalized_system_prompt() -> String {
    "You are an expert AI interviewer. You pick practice questions for a \
     candidate from a list produced by the suggestPracticeQuestions tool.\n\
     You always answer with a single JSON object and nothing else."
        .to_string()
}

// ---------------------------------------------------------------------------
// Learning path generation
// ---------------------------------------------------------------------------

/// Ask for `count` questions for a developer at `experience_level` working
/// with `tech_stack`.
pub fn build_generate_questions_prompt(
    experience_level: &str,
    tech_stack: &[String],
    count: u32,
) -> String {
    let stack = tech_stack.join(", ");
    format!(
        "Generate {count} high-quality coding interview questions for a {experience_level} \
developer with the following tech stack: {stack}.

Requirements:
1. Questions should be practical and relevant to real-world development
2. Difficulty should match the experience level ({experience_level})
3. Focus on the selected technologies: {stack}
4. Include clear requirements and helpful hints
5. Provide realistic time estimates

For each question, provide:
- A clear, concise title
- Detailed description explaining what needs to be built
- The technology category it belongs to
- Appropriate difficulty level
- 3-5 specific requirements
- 2-3 helpful hints
- Estimated completion time

Return the questions in JSON format matching this structure:
{{
  \"questions\": [
    {{
      \"title\": \"string\",
      \"description\": \"string\",
      \"category\": \"string\",
      \"difficulty\": \"BEGINNER\" | \"INTERMEDIATE\" | \"ADVANCED\",
      \"requirements\": [\"string\"],
      \"hints\": [\"string\"],
      \"estimatedTime\": \"string\"
    }}
  ]
}}"
    )
}

// ---------------------------------------------------------------------------
// Personalized question sets
// ---------------------------------------------------------------------------

/// A question offered by the suggestion tool, shown to the model by id and
/// title.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSuggestion {
    pub id: String,
    pub title: String,
    pub category: String,
    pub level: String,
}

/// Build the personalized prompt. The tool has already run locally; its
/// output is embedded as the only allowed answer set.
pub fn build_personalized_prompt(
    skill_level: &str,
    preferred_tech_stack: &[String],
    past_performance: Option<&BTreeMap<String, f64>>,
    suggestions: &[ToolSuggestion],
) -> String {
    let stack = if preferred_tech_stack.is_empty() {
        "any".to_string()
    } else {
        preferred_tech_stack.join(", ")
    };

    let performance = match past_performance {
        Some(map) if !map.is_empty() => map
            .iter()
            .map(|(id, score)| format!("- {id}: {score:.2}"))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "none recorded".to_string(),
    };

    let tool_output = if suggestions.is_empty() {
        "(no questions)".to_string()
    } else {
        suggestions
            .iter()
            .map(|s| format!("- {} | {} | {} | {}", s.id, s.title, s.category, s.level))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Based on the user's skill level ({skill_level}) and preferred technology stack \
({stack}), suggest a set of practice interview questions.

Past performance by question id (score 0-1):
{performance}

suggestPracticeQuestions tool output (id | title | category | level):
{tool_output}

Return only question ids from the tool output, most useful first, as:
{{\"questions\": [\"id\"]}}"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
