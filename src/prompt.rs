use crate::types::PriceQuery;

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// Instruction sent to the oracle for a market-price estimate.
pub const PRICE_PROMPT_TEMPLATE: &str = "\
You are an assistant that returns agricultural market prices in JSON.
Fetch or estimate the mandi price for:
- Commodity: {commodity}
- State: {state}
- District: {district}
- Market: {market}

Respond strictly in JSON only, no explanations, no markdown:
{{
  \"commodity\": \"string\",
  \"state\": \"string\",
  \"district\": \"string\",
  \"market\": \"string\",
  \"price\": number,
  \"unit\": \"string\",
  \"source\": \"string\"
}}
";

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with the matching values.
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use agri_gateway::prompt::render;
///
/// let result = render("Price of {commodity}: {{\"price\": 0}}", &[("commodity", "Wheat")]);
/// assert_eq!(result, r#"Price of Wheat: {"price": 0}"#);
/// ```
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    // Pass 2: substitute placeholders
    for (key, value) in vars {
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    rendered
}

/// Render the market-price instruction for a query. Deterministic: the same
/// query always yields the same prompt.
pub fn build_price_prompt(query: &PriceQuery) -> String {
    render(PRICE_PROMPT_TEMPLATE, &query.vars())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheat() -> PriceQuery {
        PriceQuery {
            commodity: "Wheat".into(),
            state: "Punjab".into(),
            district: "Ludhiana".into(),
            market: "Ludhiana Mandi".into(),
        }
    }

    #[test]
    fn test_render_basic() {
        let result = render("Hello {name}, price in {market}", &[("name", "Asha"), ("market", "Khanna")]);
        assert_eq!(result, "Hello Asha, price in Khanna");
    }

    #[test]
    fn test_render_no_placeholders() {
        assert_eq!(render("static prompt", &[]), "static prompt");
    }

    #[test]
    fn test_render_escaped_braces_no_substitution() {
        let result = render("Output format: {{\"result\": {{\"value\": 42}}}}", &[]);
        assert_eq!(result, r#"Output format: {"result": {"value": 42}}"#);
    }

    #[test]
    fn test_price_prompt_embeds_fields_and_schema() {
        let prompt = build_price_prompt(&wheat());
        assert!(prompt.contains("- Commodity: Wheat"));
        assert!(prompt.contains("- State: Punjab"));
        assert!(prompt.contains("- District: Ludhiana"));
        assert!(prompt.contains("- Market: Ludhiana Mandi"));
        assert!(prompt.contains("\"price\": number"));
        assert!(prompt.contains("no markdown"));
        assert!(!prompt.contains("{commodity}"));
        assert!(prompt.contains("{\n  \"commodity\""));
    }

    #[test]
    fn test_price_prompt_is_deterministic() {
        assert_eq!(build_price_prompt(&wheat()), build_price_prompt(&wheat()));
    }
}
