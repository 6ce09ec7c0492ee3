//! Prompt assembly for outreach copy.

use super::formulas::{Formula, SubjectStyle};

pub const SYSTEM_PROMPT: &str = "You're a professional B2B outreach specialist. \
    Generate business-appropriate emails for generic business email addresses. \
    Always return valid JSON with 'icebreaker' and 'subject_line' fields.";

/// Formula-specific writing instructions.
pub fn formula_instructions(
    formula: Formula,
    business_name: &str,
    category: &str,
    city: &str,
    has_website_content: bool,
) -> String {
    match formula {
        Formula::WebsiteInsight => {
            if has_website_content {
                "Open with one specific detail from their website (a service, a phrase, a \
                 specialty). Show you actually looked. Connect that detail to what you offer."
                    .to_string()
            } else {
                "No website content is available, so open with their category and location \
                 instead of inventing site details."
                    .to_string()
            }
        }
        Formula::LocalContext => format!(
            "Reference something concrete about operating a {category} in {city}. Make it feel \
             local and specific, not templated. Don't start with \"A few {city}...\" - that's \
             a different approach."
        ),
        Formula::IndustryQuestion => format!(
            "Open with a genuine question a {category} owner would actually weigh in on. The \
             question should hint at the problem you solve without pitching."
        ),
        Formula::SocialProof => format!(
            "Reference similar businesses getting a result, e.g. other {category}s nearby. \
             Keep it plausible and specific, never name-drop fake clients."
        ),
        Formula::DirectValue => format!(
            "Lead with the specific outcome you produce for {category}s. One concrete benefit, \
             stated plainly, then the question."
        ),
        Formula::CuriosityHook => format!(
            "Open with a pattern interrupt about {business_name} - something unexpected but \
             relevant. Create curiosity without clickbait."
        ),
        Formula::ProblemAgitation => format!(
            "Name a pain point {category} owners actually complain about, agitate it in one \
             sentence, then position the fix as a question."
        ),
    }
}

/// Everything the model needs for one icebreaker, with the rules that keep
/// replies coming: short, specific, one interrogative CTA, no spam phrases.
#[allow(clippy::too_many_arguments)]
pub fn build_user_prompt(
    business_name: &str,
    category: &str,
    city: &str,
    state: &str,
    rating: Option<f64>,
    reviews_count: Option<i64>,
    website_summaries: &[String],
    product_description: &str,
    value_proposition: &str,
    is_perfect_fit: bool,
    formula: Formula,
    subject_style: SubjectStyle,
) -> String {
    let has_website_content = !website_summaries.is_empty();
    let website_block = if has_website_content {
        website_summaries.join("\n")
    } else {
        "No website content - use their category and location instead".to_string()
    };
    let rating_line = match (rating, reviews_count) {
        (Some(r), Some(c)) => format!("{r}/5 ({c} reviews)"),
        (Some(r), None) => format!("{r}/5"),
        _ => "unknown".to_string(),
    };

    let instructions = formula_instructions(formula, business_name, category, city, has_website_content);
    let subject_instruction = subject_style.instruction(business_name, city, category);

    format!(
        r#"Write a cold email that sounds like a real person wrote it. Goal: get a reply.

THEIR BUSINESS (personalize with this)
Business: {business_name}
Type: {category}
Location: {city}, {state}
Rating: {rating_line}

Website insights:
{website_block}

YOUR APPROACH FOR THIS EMAIL: {formula_name}
{instructions}

WHAT YOU'RE OFFERING (context only)
Product: {product}
Value: {value}
Perfect fit: {fit}

WRITING RULES
Tone: like texting a business owner you respect but haven't met. Short
sentences. No corporate speak, no buzzwords.

Length: 3-4 sentences MAX, under 60 words total.

Structure:
- Line 1: hook them with something specific to THEM
- Line 2: connect it to what you do, briefly
- Line 3: simple question CTA, under 6 words

ABSOLUTELY FORBIDDEN (instant spam folder):
- "Quick question"
- "Hope this finds you well"
- "reaching out" or "wanted to connect"
- "crushing it"
- Starting with "I noticed" or "I saw"
- "businesses like yours"
- Anything over 4 sentences
- Promising to send materials, data, catalogs, or samples

CTA RULES:
- ONE question only, under 6 words, ending with ?
- Low commitment: "Worth a look?" "Curious?"
- No calls, demos, or meetings in a first email

SUBJECT LINE - MAX 40 CHARACTERS
Style: {subject_style_name}
Instruction: {subject_instruction}
- Maximum 40 characters, 25-35 is ideal
- No "Quick Q", "Quick question", or "Inquiry"
- Create curiosity without clickbait

Return valid JSON:
{{"icebreaker": "your 3-4 sentence email ending with a question CTA", "subject_line": "25-40 characters max"}}"#,
        formula_name = formula.as_str(),
        product = if product_description.is_empty() { "Not specified" } else { product_description },
        value = if value_proposition.is_empty() { "Not specified" } else { value_proposition },
        fit = if is_perfect_fit { "Yes - be confident" } else { "Maybe - ask first" },
        subject_style_name = subject_style.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_formula_and_subject_style() {
        let prompt = build_user_prompt(
            "Acme Dental",
            "dentist",
            "Austin",
            "TX",
            Some(4.7),
            Some(212),
            &["Family dentistry with same-day crowns.".to_string()],
            "patient take-home kits",
            "more repeat visits",
            true,
            Formula::WebsiteInsight,
            SubjectStyle::Question,
        );
        assert!(prompt.contains("website_insight"));
        assert!(prompt.contains("same-day crowns"));
        assert!(prompt.contains("Ask a short question"));
        assert!(prompt.contains("Yes - be confident"));
    }

    #[test]
    fn missing_website_swaps_in_fallback_instruction() {
        let prompt = build_user_prompt(
            "Acme",
            "salon",
            "Austin",
            "TX",
            None,
            None,
            &[],
            "",
            "",
            false,
            Formula::WebsiteInsight,
            SubjectStyle::Direct,
        );
        assert!(prompt.contains("No website content"));
        assert!(prompt.contains("Not specified"));
    }
}
