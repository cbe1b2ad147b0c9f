//! Instructions sent to the model on every extraction attempt.
//!
//! The reply format is fixed by [`hcc_core::parse_conditions`]: one condition
//! per line, no codes, no status, no list markers.

use crate::providers::ChatMessage;

/// System instruction for condition extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You extract medical conditions from clinical progress notes.

## Rules
1. Read ONLY the Assessment/Plan section of the note. Ignore history, medications, vitals and labs.
2. List every condition assessed in that section.
3. Output exactly one condition per line.
4. Output the condition name only. Remove diagnosis codes (for example "E11.9:"), status words
   ("stable", "improving", "unchanged", "worsening") and any explanation that follows the name.
5. Do not number the lines or use bullets, dashes or any other list markers.
6. If the section lists no conditions, reply with nothing.

## Example
Note:
  Assessment/Plan
  1. Hypertension - I10: Stable, continue lisinopril.
  2. E11.9: Type 2 diabetes mellitus - improving with metformin.

Reply:
Hypertension
Type 2 diabetes mellitus
"#;

/// Messages appended to the history for one attempt: the instruction, then the note.
pub fn attempt_messages(note: &str) -> [ChatMessage; 2] {
    [
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT.trim()),
        ChatMessage::user(note),
    ]
}
