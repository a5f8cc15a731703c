//! Prompt construction for scene generation, repair and feedback-driven revision.
//!
//! Templates use `{placeholder}` substitution. Wording is not load-bearing; the fixed
//! entry-point name and the "code only" instruction are.

use crate::provider::ChatMessage;
use crate::types::{GenerationRequest, QualityTier, Subject, VoicePreset, SCENE_ENTRY_POINT};
use std::process::{Command, Stdio};

const SYSTEM_PROMPT: &str = "You write Python scene programs for the Manim animation library. \
Reply with the program only: no markdown, no explanations.";

const LESSON_TEMPLATE: &str = r#"CONTEXT: This is a fresh request. Ignore any previous topics or examples.

TOPIC TO EXPLAIN: "{topic}"
SUBJECT AREA: {subject}

Type: 2D motion graphics for education. Flat vector style, dark solid background,
large white sans-serif text. Clear old text before writing new text.

Scene outline (every section must be about "{topic}" only):
1. Definition: a clear text explanation. Clear the screen afterwards.
2. Analogy: simple shapes demonstrating the idea. Clear the screen afterwards.
3. Concrete example: a worked, step-by-step demonstration.

{narration}
Requirements:
- The class name must be '{entry_point}'.
- Import with `from manim import *`.
- Do not use MathTex or LaTeX; use Text for all text and formulas.
- Do not use SVGMobject or ImageMobject; use only built-in shapes.
- Do not set config values such as config.media_width in the code.
- The animation should last at least 60 seconds.
- Output only the Python code."#;

const REPAIR_TEMPLATE: &str = r#"CONTEXT: You are fixing a Manim scene program that failed to render.

TOPIC: "{topic}"

THE CODE THAT FAILED:
{source}

THE ERROR MESSAGE:
{diagnostic}

INSTRUCTIONS:
1. Work out from the error message what went wrong.
2. Fix the code so that it renders.
3. Keep the scene explaining the topic correctly.
4. Keep the class name '{entry_point}'.
5. Do not use SVGMobject or ImageMobject; use only built-in shapes.
6. Output only the fixed Python code."#;

const FEEDBACK_TEMPLATE: &str = r#"CONTEXT: You are improving a Manim scene program based on viewer feedback.

TOPIC: "{topic}"
SUBJECT: {subject}

THE ORIGINAL CODE:
{source}

VIEWER FEEDBACK (why the previous video fell short):
"{feedback}"

INSTRUCTIONS:
1. Change the code to address the feedback specifically.
2. Keep the scene explaining the topic correctly.
3. Keep the same visual style and the class name '{entry_point}'.
4. Do not use SVGMobject or ImageMobject; use only built-in shapes.
5. Output only the revised Python code."#;

/// A rendered prompt plus the tier that picks the model for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub messages: Vec<ChatMessage>,
    pub tier: QualityTier,
}

impl PromptSpec {
    fn new(user_prompt: String, tier: QualityTier) -> Self {
        Self {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt)],
            tier,
        }
    }

    /// Fresh scene for a request. `effects_available` reports whether the audio effects
    /// chain can actually run; when it cannot, narration is requested without effects.
    pub fn lesson(request: &GenerationRequest, effects_available: bool) -> Self {
        let narration = narration_section(
            request.voice(),
            request.use_effects_chain() && effects_available,
        );
        let rendered = LESSON_TEMPLATE
            .replace("{topic}", request.topic())
            .replace("{subject}", request.subject().display_name())
            .replace("{narration}", &narration)
            .replace("{entry_point}", SCENE_ENTRY_POINT);
        Self::new(rendered, request.quality())
    }

    /// Corrected version of `source` given the renderer's diagnostic.
    pub fn repair(source: &str, diagnostic: &str, topic: &str, tier: QualityTier) -> Self {
        let rendered = REPAIR_TEMPLATE
            .replace("{topic}", topic)
            .replace("{entry_point}", SCENE_ENTRY_POINT)
            .replace("{diagnostic}", diagnostic)
            .replace("{source}", source);
        Self::new(rendered, tier)
    }

    /// Revised version of `source` addressing free-text `feedback`.
    pub fn feedback(
        source: &str,
        feedback: &str,
        topic: &str,
        subject: Subject,
        tier: QualityTier,
    ) -> Self {
        let rendered = FEEDBACK_TEMPLATE
            .replace("{topic}", topic)
            .replace("{subject}", subject.display_name())
            .replace("{entry_point}", SCENE_ENTRY_POINT)
            .replace("{feedback}", feedback.trim())
            .replace("{source}", source);
        Self::new(rendered, tier)
    }

    /// The user-role prompt text.
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::provider::MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

fn narration_section(voice: Option<VoicePreset>, with_effects: bool) -> String {
    match voice {
        None => String::new(),
        Some(preset) => {
            let effects = if with_effects && preset.uses_effects() {
                "Apply the audio effects chain for this voice."
            } else {
                "Do not apply audio effects."
            };
            format!(
                "Narration:\n- Inherit from VoiceoverScene and narrate each section with \
                 self.voiceover(text=...).\n- Voice character: {} ({}).\n- {}\n",
                preset.key(),
                preset.description(),
                effects
            )
        }
    }
}

/// Whether the `sox` audio effects tool is installed and runnable.
pub fn effects_chain_available() -> bool {
    Command::new("sox")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
