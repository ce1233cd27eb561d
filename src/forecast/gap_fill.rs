/// Fill unknown values (encoded as 0) in a chronological series.
///
/// Each 0 takes the nearest known value before it; leading 0s then take the
/// first known value after them. An all-zero series stays all zero.
pub fn fill_gaps(values: &mut [f64]) {
    let mut last_known = None;
    for value in values.iter_mut() {
        if *value == 0.0 {
            if let Some(known) = last_known {
                *value = known;
            }
        } else {
            last_known = Some(*value);
        }
    }

    // only leading zeros can remain after the forward pass
    if let Some(first_known) = values.iter().copied().find(|v| *v != 0.0) {
        for value in values.iter_mut().take_while(|v| **v == 0.0) {
            *value = first_known;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_forward_then_backward() {
        let mut values = vec![0.0, 0.0, 40.0, 0.0, 45.0, 0.0];
        fill_gaps(&mut values);
        assert_eq!(values, vec![40.0, 40.0, 40.0, 40.0, 45.0, 45.0]);
    }

    #[test]
    fn test_all_zero_stays_zero() {
        let mut values = vec![0.0; 4];
        fill_gaps(&mut values);
        assert_eq!(values, vec![0.0; 4]);
    }

    #[test]
    fn test_empty() {
        let mut values: Vec<f64> = vec![];
        fill_gaps(&mut values);
        assert!(values.is_empty());
    }

    proptest! {
        #[test]
        fn prop_idempotent(
            raw in prop::collection::vec(prop_oneof![Just(0.0), 1.0..100.0f64], 0..64)
        ) {
            let mut once = raw.clone();
            fill_gaps(&mut once);
            let mut twice = once.clone();
            fill_gaps(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_no_zero_left_unless_all_zero(
            raw in prop::collection::vec(prop_oneof![Just(0.0), 1.0..100.0f64], 1..64)
        ) {
            let mut filled = raw.clone();
            fill_gaps(&mut filled);
            let all_zero = raw.iter().all(|v| *v == 0.0);
            prop_assert_eq!(filled.iter().any(|v| *v == 0.0), all_zero);
        }
    }
}
