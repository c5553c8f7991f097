// Prompt text for the résumé optimization call.
//
// The wording below is part of the service's external contract: the reply
// parser expects exactly the JSON shape requested here, and edits change how
// often the backend's output parses. Change it together with `response.rs`.

use crate::extraction::{truncate_chars, MAX_RESUME_CHARS};

/// Opening role statement.
pub const ADVISOR_PREAMBLE: &str = "You are an expert career advisor. The candidate provided:";

/// Numbered task list placed after the embedded résumé and job description.
pub const OPTIMIZE_TASK_INSTRUCTIONS: &str = "\
TASK:
1. Rewrite the resume with strong, professional language and include keywords from the job description.
2. DO NOT change or remove the candidate's personal details (name, phone number, email, LinkedIn, etc.). Keep them exactly as written.
3. Keep the formatting professional and ATS-friendly.
4. Write a short, tailored cover letter connecting their projects/skills to the job.";

/// Output contract. Keys must match `GenerationReply`.
pub const JSON_REPLY_INSTRUCTION: &str = r#"Return ONLY a JSON object with exactly these two keys, both with string values:
{
  "optimizedResume": "...",
  "coverLetter": "..."
}"#;

/// Inputs for one optimization prompt. The résumé text is clamped to
/// `MAX_RESUME_CHARS` on construction.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    resume_text: &'a str,
    job_description: &'a str,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(resume_text: &'a str, job_description: &'a str) -> Self {
        Self {
            resume_text: truncate_chars(resume_text, MAX_RESUME_CHARS),
            job_description,
        }
    }

    pub fn resume_text(&self) -> &'a str {
        self.resume_text
    }

    /// Builds the single-turn instruction string. Both inputs are embedded verbatim.
    pub fn build_prompt(&self) -> String {
        format!(
            "{ADVISOR_PREAMBLE}\n\nResume:\n{}\n\nJob Description:\n{}\n\n{OPTIMIZE_TASK_INSTRUCTIONS}\n\n{JSON_REPLY_INSTRUCTION}\n",
            self.resume_text, self.job_description
        )
    }
}
