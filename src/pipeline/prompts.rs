//! Prompt templates for the sentiment and structuring stages
//!
//! Both stages require a JSON-object response; the format instructions are part
//! of the system message since the completion client pins the response format.

pub const SENTIMENT_SYSTEM: &str = "\
You are an expert sentiment and tone analyst for audiovisual content.
Your task is to analyze texts and determine:
1. The overall sentiment (positive, negative, or neutral)
2. A numerical sentiment score (0.0 = very negative, 0.5 = neutral, 1.0 = very positive)
3. The predominant tone of the speaker (e.g. formal, informal, technical, sarcastic, motivational, educational)

Respond with a JSON object containing exactly these fields:
{\"sentiment\": \"positive\" | \"negative\" | \"neutral\", \"sentiment_score\": <number between 0.0 and 1.0>, \"tone\": \"<tone descriptor>\"}";

pub fn sentiment_user(excerpt: &str) -> String {
    format!(
        "Analyze the following text extracted from a video:\n{}",
        excerpt
    )
}

pub const STRUCTURING_SYSTEM: &str = "\
You are an expert in summarizing content and extracting key ideas.
Your task is to identify the 3 most important points from a text.
Rules:
- YOU CANNOT invent information or add details that are not present in the text
- If the text holds fewer than 3 points worth of information, extract as many as possible and fill the rest with \"N/A\"
- Exactly 3 points
- Each point must be clear, concise, and self-contained
- Prioritize key information, insights, or main conclusions
- Write in complete sentences

Respond with a JSON object containing exactly this field:
{\"key_points\": [\"<point 1>\", \"<point 2>\", \"<point 3>\"]}";

pub fn structuring_user(excerpt: &str) -> String {
    format!(
        "Extract the 3 most important points from the following text:\n{}",
        excerpt
    )
}
