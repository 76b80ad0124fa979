//! Folding partial server updates into the accumulated [`OrchestratorState`].
//!
//! The merge is a recursive union where the incoming side wins:
//!
//! ```text
//! prev:    { stage: "SALES", offer: { amount: 5L, rate: 11.5 }, docs: [a] }
//! updates: { offer: { rate: 10.9 }, docs: [b, c], kyc_verified: null }
//! result:  { stage: "SALES", offer: { amount: 5L, rate: 10.9 }, docs: [b, c] }
//! ```
//!
//! * nested objects are unioned key by key,
//! * arrays and scalars are replaced wholesale,
//! * keys absent from the update (or sent as `null`) keep their old value.

use serde_json::{Map, Value};

use crate::orchestrator::OrchestratorState;

/// Merge `updates` into `prev`, returning a fresh snapshot.
///
/// `response_stage` is the top-level `stage` of the response.  It becomes the
/// merged `stage` only when `updates` does not carry a string `stage` itself.
pub fn merge_state(
    prev: &OrchestratorState,
    updates: &Map<String, Value>,
    response_stage: Option<&str>,
) -> OrchestratorState {
    let mut merged = prev.clone().into_map();
    union_into(&mut merged, updates);

    let nested_stage = updates.get("stage").and_then(Value::as_str).is_some();
    if !nested_stage {
        if let Some(stage) = response_stage.filter(|s| !s.is_empty()) {
            merged.insert("stage".into(), Value::String(stage.to_string()));
        }
    }

    OrchestratorState::from_map(merged)
}

fn union_into(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Null => {}
            Value::Object(nested) => match target.get_mut(key) {
                Some(Value::Object(existing)) => union_into(existing, nested),
                _ => {
                    let mut fresh = Map::new();
                    union_into(&mut fresh, nested);
                    target.insert(key.clone(), Value::Object(fresh));
                }
            },
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object literal")
    }

    fn state(v: Value) -> OrchestratorState {
        OrchestratorState::from_map(obj(v))
    }

    #[test]
    fn absent_keys_are_kept() {
        let prev = state(json!({ "loan_amount": 500000, "kyc_verified": true }));
        let next = merge_state(&prev, &obj(json!({ "emi": 10624.0 })), None);

        assert_eq!(next.loan_amount(), Some(500000.0));
        assert_eq!(next.kyc_verified(), Some(true));
        assert_eq!(next.emi(), Some(10624.0));
    }

    #[test]
    fn nested_objects_are_unioned() {
        let prev = state(json!({ "offer": { "amount": 500000, "rate": 11.5 } }));
        let next = merge_state(&prev, &obj(json!({ "offer": { "rate": 10.9 } })), None);

        assert_eq!(next.at(&["offer", "amount"]), Some(&json!(500000)));
        assert_eq!(next.at(&["offer", "rate"]), Some(&json!(10.9)));
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let prev = state(json!({ "badges": ["first_step"] }));
        let next = merge_state(&prev, &obj(json!({ "badges": ["kyc", "credit"] })), None);
        assert_eq!(next.get("badges"), Some(&json!(["kyc", "credit"])));
    }

    #[test]
    fn null_never_clears_a_known_field() {
        let prev = state(json!({ "credit_score": 780, "kyc": { "verified": true } }));
        let next = merge_state(
            &prev,
            &obj(json!({ "credit_score": null, "kyc": { "verified": null } })),
            None,
        );
        assert_eq!(next.credit_score(), Some(780.0));
        assert_eq!(next.kyc_verified(), Some(true));
    }

    #[test]
    fn object_replaces_scalar() {
        let prev = state(json!({ "sanction_data": "pending" }));
        let next = merge_state(
            &prev,
            &obj(json!({ "sanction_data": { "sanction_number": "SL-1", "note": null } })),
            None,
        );
        assert_eq!(
            next.get("sanction_data"),
            Some(&json!({ "sanction_number": "SL-1" }))
        );
    }

    #[test]
    fn nested_stage_beats_response_stage() {
        let next = merge_state(
            &OrchestratorState::new(),
            &obj(json!({ "stage": "B" })),
            Some("A"),
        );
        assert_eq!(next.stage(), Some("B"));
    }

    #[test]
    fn response_stage_used_when_updates_have_none() {
        let prev = state(json!({ "stage": "GREETING" }));
        let next = merge_state(&prev, &Map::new(), Some("SALES"));
        assert_eq!(next.stage(), Some("SALES"));

        let unchanged = merge_state(&prev, &Map::new(), Some(""));
        assert_eq!(unchanged.stage(), Some("GREETING"));
    }

    #[test]
    fn previous_snapshot_is_untouched() {
        let prev = state(json!({ "stage": "GREETING" }));
        let before = prev.clone();
        let _next = merge_state(&prev, &obj(json!({ "stage": "SALES", "x": 1 })), None);
        assert_eq!(prev, before);
    }

    // ---- properties ---

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[A-Z_]{1,8}".prop_map(Value::from),
            proptest::collection::vec(any::<i32>().prop_map(Value::from), 0..3).prop_map(Value::Array),
        ]
    }

    fn key() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["stage", "loan_amount", "kyc", "offer", "emotion", "verified"])
            .prop_map(String::from)
    }

    fn value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            proptest::collection::btree_map(key(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect()))
        })
    }

    fn update() -> impl Strategy<Value = Map<String, Value>> {
        proptest::collection::btree_map(key(), value(), 0..5).prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn set_fields_survive_updates_that_do_not_mention_them(
            updates in proptest::collection::vec(update(), 1..8)
        ) {
            let mut current = OrchestratorState::new();
            for upd in &updates {
                let next = merge_state(&current, upd, None);
                for (k, v) in current.as_map() {
                    prop_assert!(next.get(k).is_some(), "key {} disappeared", k);
                    if matches!(upd.get(k), None | Some(Value::Null)) {
                        prop_assert_eq!(next.get(k), Some(v));
                    }
                }
                current = next;
            }
        }

        #[test]
        fn merge_is_idempotent(base in update(), upd in update()) {
            let prev = OrchestratorState::from_map(base);
            let once = merge_state(&prev, &upd, Some("S"));
            let twice = merge_state(&once, &upd, Some("S"));
            prop_assert_eq!(once, twice);
        }
    }
}
