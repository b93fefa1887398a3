//! The instruction sent to the vision model with every plant photo.
//!
//! The prompt is a system-owned constant rather than a configuration knob:
//! report layout splits the answer on blank lines and treats the first line
//! of each block as a heading, which only works if the model answers in
//! plain paragraphs. Any markup the model adds would show up verbatim in the
//! PDF.

/// Prompt sent alongside the inline image for every analysis.
pub const ANALYSIS_PROMPT: &str = "Analyze this plant image and provide its Indian name with a detailed analysis of its species, health, and care recommendations, its characteristics, care instructions, and any interesting facts. Please provide the response in plain text without using any markdown formatting. Separate each topic with a blank line and start each topic with a short title on its own line.";
