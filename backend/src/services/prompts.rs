use crate::utils::language_name;

const SHORT_SUMMARY_PROMPT: &str = "\
Summarize the following video transcript in 50 to 100 words. Capture the main \
topic and the key takeaways. Write the summary in {language}, the language of the transcript.

Transcript:

---
{caption_text}
---

Reply with the summary text only, without headings or extra formatting.
";

const DETAILED_SUMMARY_PROMPT: &str = "\
Write a detailed, well-structured summary of the following video transcript. \
Write it in {language}, the language of the transcript. Use these sections:

**1. Key Points:**
   - A bulleted list of the main topics and ideas.

**2. Point by Point:**
   - For each key point, a thorough explanation of the arguments and concepts behind it.

**3. Notable Quotes:**
   - Quotes from the transcript that capture the essence of the discussion.

**4. Analysis:**
   - What the topics imply, plus the overall tone and sentiment of the video.

Transcript:

---
{caption_text}
---

Format the answer as markdown.
";

fn render(template: &str, caption_text: &str, language_code: &str) -> String {
    // Captions are substituted last so braces inside them are never treated as placeholders.
    template
        .replace("{language}", language_name(language_code))
        .replace("{caption_text}", caption_text)
}

pub fn short_summary_prompt(caption_text: &str, language_code: &str) -> String {
    render(SHORT_SUMMARY_PROMPT, caption_text, language_code)
}

pub fn detailed_summary_prompt(caption_text: &str, language_code: &str) -> String {
    render(DETAILED_SUMMARY_PROMPT, caption_text, language_code)
}
