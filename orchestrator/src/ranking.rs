use comms::{Dataset, Sample};
use serde_json::Value;

/// Field holding a sample's prompt.
const PROMPT: &str = "prompt";

/// Length of a sample's prompt, in characters for text and items for arrays.
///
/// Samples without a prompt count as empty.
pub fn prompt_len(sample: &Sample) -> usize {
    match sample.get(PROMPT) {
        Some(Value::String(text)) => text.chars().count(),
        Some(Value::Array(tokens)) => tokens.len(),
        _ => 0,
    }
}

/// Reorders the dataset longest prompt first so batches hold prompts of
/// similar length. Ties keep their original order.
pub fn rank_by_prompt_length(dataset: &Dataset) -> Dataset {
    let mut samples = dataset.to_vec();
    samples.sort_by_key(|sample| std::cmp::Reverse(prompt_len(sample)));
    samples.into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn longest_prompts_come_first_and_ties_are_stable() {
        let dataset: Dataset = vec![
            json!({ "prompt": "ab", "id": 0 }),
            json!({ "prompt": [1, 2, 3, 4], "id": 1 }),
            json!({ "id": 2 }),
            json!({ "prompt": "xy", "id": 3 }),
        ]
        .into();

        let ids: Vec<_> = rank_by_prompt_length(&dataset)
            .iter()
            .map(|s| s["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 0, 3, 2]);
    }
}
