// Prompt constants for the ranking oracle.

/// System prompt for ranking — sets the rubric and the JSON schema.
pub const RANKING_SYSTEM: &str = "You are an expert prompt curator for a creative studio \
    that features one inspiring prompt every day.

Score each candidate from 1 to 5 on three criteria:
1. inspiring: does it spark creativity, new ideas, or meaningful thinking?
2. appropriate: is it suitable for professional creative use, with no offensive content?
3. fun: is it engaging, interesting, or enjoyable to work with?

total = inspiring + appropriate + fun. Then pick exactly one winner by its number.

Return a JSON object with this EXACT schema:
{
  \"selectedPromptNumber\": 3,
  \"reason\": \"short reason here\",
  \"ranked\": [
    {\"promptNumber\": 3, \"inspiring\": 4, \"appropriate\": 5, \"fun\": 3, \"total\": 12}
  ]
}";

/// User prompt template. Replace `{count}` and `{candidates}` before sending.
pub const RANKING_PROMPT_TEMPLATE: &str = "Score and select the best prompt from these {count} options:

{candidates}

Return the number (1-{count}) of your selected prompt as selectedPromptNumber.";
