use adpilot_agent::intent::IntentClassifier;

use super::CommandResult;

pub fn run(message: &str, hint: Option<&str>) -> CommandResult {
    let intent = IntentClassifier::new().classify_with_hint(message, hint);
    CommandResult::json("classify", &intent)
}
