//! Pulling a JSON object out of model prose.

use serde::de::DeserializeOwned;

/// The outermost `{...}` of `text`, ignoring Markdown code fences and any
/// chatter around the object.
pub fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse the JSON object embedded in `text`.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let object = json_object(text).ok_or_else(|| "no JSON object in reply".to_string())?;
    serde_json::from_str(object).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn strips_fences_and_chatter() {
        let text = "Here you go:\n```json\n{\"svc\": \"add flag\"}\n```\n";
        let parsed: BTreeMap<String, String> = parse_object(text).unwrap();
        assert_eq!(parsed["svc"], "add flag");
    }

    #[test]
    fn nested_objects_survive() {
        let text = r#"{"self_summary": "s", "dependencies": {"lib": "x"}}"#;
        assert_eq!(json_object(text), Some(text));
    }

    #[test]
    fn missing_object_is_an_error() {
        assert!(parse_object::<BTreeMap<String, String>>("no json here").is_err());
        assert!(parse_object::<BTreeMap<String, String>>("} backwards {").is_err());
    }
}
