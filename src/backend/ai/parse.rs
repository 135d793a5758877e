//! Helpers for turning free-form model output into structured data.

use crate::shared::classroom::{Question, QuestionKind};

/// Remove a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost `[...]` span, if the text contains one.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse generated questions. Output that is not a JSON list of questions is
/// kept verbatim as a single theory question.
pub fn parse_questions(raw: &str) -> Vec<Question> {
    let parsed = extract_json_array(strip_code_fences(raw))
        .and_then(|array| serde_json::from_str::<Vec<Question>>(array).ok())
        .filter(|questions| !questions.is_empty());

    parsed.unwrap_or_else(|| {
        vec![Question {
            id: 1,
            kind: QuestionKind::Theory,
            question: raw.trim().to_string(),
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_extract_array() {
        assert_eq!(extract_json_array("Here you go: [1, 2] done"), Some("[1, 2]"));
        assert_eq!(extract_json_array("nothing"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn test_parse_questions() {
        let raw = "```json\n[{\"id\":1,\"type\":\"theory\",\"question\":\"Define a trait\"},{\"id\":2,\"type\":\"coding\",\"question\":\"Implement Display\"}]\n```";
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].kind, QuestionKind::Coding);
    }

    #[test]
    fn test_parse_questions_fallback() {
        let questions = parse_questions("Explain ownership in your own words.");
        assert_eq!(
            questions,
            vec![Question {
                id: 1,
                kind: QuestionKind::Theory,
                question: "Explain ownership in your own words.".to_string(),
            }]
        );
    }
}
