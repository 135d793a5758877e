//! Prompt templates and sampling temperatures for every LLM call the server makes.

use crate::shared::classroom::MARKS_PER_QUESTION;

pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const EVALUATION_TEMPERATURE: f32 = 0.3;
pub const GRADING_TEMPERATURE: f32 = 0.2;
pub const QUESTION_TEMPERATURE: f32 = 0.0;
pub const NOTES_TEMPERATURE: f32 = 0.0;

const AI_STUDENT_PERSONA: &str = "You are an enthusiastic student who is learning from the teacher. \
Keep every reply short (2-4 sentences). Ask clarifying questions when something is unclear, \
react to what the teacher just said, and do not lecture or explain the topic yourself.";

/// One chat turn of the AI student.
pub fn ai_student_reply(
    topic: &str,
    references: &str,
    history: &str,
    latest: &str,
    has_whiteboard: bool,
) -> String {
    let mut prompt = format!("{}\n\nTopic: {}\n", AI_STUDENT_PERSONA, topic);
    if !references.is_empty() {
        prompt.push_str(
            "\nReference Materials (treat these as the teacher's notes, not your knowledge):\n",
        );
        prompt.push_str(references);
        prompt.push('\n');
    }
    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        prompt.push_str(history);
        prompt.push('\n');
    }
    if has_whiteboard {
        prompt.push_str("\nThe teacher also shared the whiteboard drawing attached as an image.\n");
    }
    prompt.push_str("\nTeacher's latest explanation:\n");
    prompt.push_str(latest);
    prompt.push_str("\n\nRespond as the student, in character, with a short reply.");
    prompt
}

/// Scores a finished teach session.
pub fn teach_evaluation(topic: &str, transcript: &str, has_whiteboard: bool) -> String {
    let whiteboard = if has_whiteboard {
        "\nA drawing from the teacher's whiteboard is attached; consider it part of the explanation.\n"
    } else {
        ""
    };
    format!(
        "You evaluate how well a student taught the topic \"{topic}\" to an AI learner.\n\
         {whiteboard}\n\
         Transcript:\n{transcript}\n\n\
         Reply with JSON only, in this exact shape:\n\
         {{\"summary\": string, \"clarity_score\": integer 0-100, \"completeness_score\": integer 0-100, \
         \"feedback\": string, \"areas_for_improvement\": [string]}}"
    )
}

/// Generates the question set for an assignment.
pub fn question_generation(description: &str) -> String {
    format!(
        "Create exactly 3 questions for the following assignment. Each question is either \
         \"theory\" or \"coding\".\n\n\
         Assignment:\n{description}\n\n\
         Reply with a JSON list only, like:\n\
         [{{\"id\": 1, \"type\": \"theory\", \"question\": \"...\"}}]"
    )
}

/// Grades a student's answers. `qa_block` pairs each question with its answer.
pub fn grading(qa_block: &str, question_count: usize) -> String {
    let max_marks = question_count as i32 * MARKS_PER_QUESTION;
    format!(
        "You are grading a student's assignment. Each question is worth {MARKS_PER_QUESTION} marks, \
         for a maximum of {max_marks}.\n\n\
         {qa_block}\n\n\
         Reply with JSON only, in this exact shape:\n\
         {{\"answers\": [{{\"id\": number, \"marks\": number, \"feedback\": string}}], \
         \"total_marks\": number, \"final_feedback\": string}}"
    )
}

/// Produces study notes in Markdown.
pub fn study_notes(title: &str) -> String {
    format!(
        "Write detailed study notes in Markdown on \"{title}\". Use headings, short paragraphs, \
         bullet points and examples where they help. Return only the notes."
    )
}
