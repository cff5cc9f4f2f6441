use conecta_protocol::AssistantCommand;

use super::CompletionError;

/// Parse completion output into a command.
///
/// Tolerates prose or code fences around the JSON object; anything that
/// still fails the schema is reported as malformed.
pub fn parse_command(raw: &str) -> Result<AssistantCommand, CompletionError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| CompletionError::Malformed("no JSON object in output".to_string()))?;
    serde_json::from_str(json).map_err(|e| CompletionError::Malformed(e.to_string()))
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use conecta_protocol::AssistantAction;

    #[test]
    fn parses_plain_json() {
        let cmd = parse_command(
            r#"{"action":"SHOW_RANKING","payload":{},"assistantResponse":"Here it is"}"#,
        )
        .unwrap();
        assert_eq!(cmd.action, AssistantAction::ShowRanking);
        assert_eq!(cmd.assistant_response, "Here it is");
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"action\":\"NO_ACTION\",\"assistantResponse\":\"Hi!\"}\n```";
        let cmd = parse_command(raw).unwrap();
        assert_eq!(cmd.action, AssistantAction::NoAction);
        assert!(cmd.payload.task.is_none());
    }

    #[test]
    fn unknown_action_is_malformed() {
        let err = parse_command(r#"{"action":"FIRE_EVERYONE","assistantResponse":"ok"}"#)
            .unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
    }

    #[test]
    fn prose_without_json_is_malformed() {
        assert!(matches!(
            parse_command("Sorry, I cannot help with that."),
            Err(CompletionError::Malformed(_))
        ));
    }
}
