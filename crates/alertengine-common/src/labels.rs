use std::collections::HashMap;

/// Label set attached to rules and alert notifications.
pub type Labels = HashMap<String, String>;

/// Merge `overlay` into `base`; overlay values win on key collision.
///
/// Used by the evaluator to let per-series dimensions returned by the
/// metrics backend (e.g. `instance`) flow into notifications on top of
/// the rule's configured labels.
pub fn merge_labels(base: &Labels, overlay: &Labels) -> Labels {
    let mut merged = base.clone();
    for (k, v) in overlay {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Deterministic `k=v,k=v` rendering, sorted by key. Logging only.
pub fn format_labels(labels: &Labels) -> String {
    let mut pairs: Vec<_> = labels.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn overlay_wins_on_collision() {
        let base = labels(&[("severity", "warning"), ("team", "infra")]);
        let overlay = labels(&[("severity", "critical"), ("instance", "a")]);

        let merged = merge_labels(&base, &overlay);
        assert_eq!(merged.get("severity").unwrap(), "critical");
        assert_eq!(merged.get("team").unwrap(), "infra");
        assert_eq!(merged.get("instance").unwrap(), "a");
    }

    #[test]
    fn merge_with_empty_sides() {
        let base = labels(&[("a", "1")]);
        assert_eq!(merge_labels(&base, &Labels::new()), base);
        assert_eq!(merge_labels(&Labels::new(), &base), base);
        assert!(merge_labels(&Labels::new(), &Labels::new()).is_empty());
    }

    #[test]
    fn format_is_sorted_and_stable() {
        let l = labels(&[("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(format_labels(&l), "a=1,b=2,c=3");
        assert_eq!(format_labels(&Labels::new()), "");
    }
}
