use chrono::NaiveDate;

use crate::domain::{BatteryDayClass, BatteryDayResult};
use crate::ml::{BatteryBatchOutput, ModelError};

/// Index of the largest probability; the lowest index wins a tie.
pub fn argmax(probs: &[f64; 3]) -> usize {
    let mut best = 0;
    for (i, p) in probs.iter().enumerate().skip(1) {
        if *p > probs[best] {
            best = i;
        }
    }
    best
}

fn unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Turn one batch output into per-day results, in `dates` order.
pub fn classify_days(
    dates: &[NaiveDate],
    output: &BatteryBatchOutput,
) -> Result<Vec<BatteryDayResult>, ModelError> {
    output.check_days(dates.len())?;

    dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let class = BatteryDayClass::from_id(argmax(&output.class_probs[i])).ok_or_else(|| {
                ModelError::Inference("class index outside the label set".to_string())
            })?;
            Ok(BatteryDayResult::new(
                *date,
                class,
                unit(output.stress[i]),
                unit(output.utilization[i]),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([0.5, 0.5, 0.0], 0)]
    #[case([0.1, 0.3, 0.6], 2)]
    #[case([0.2, 0.4, 0.4], 1)]
    #[case([1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], 0)]
    fn test_argmax_lowest_index_on_tie(#[case] probs: [f64; 3], #[case] expected: usize) {
        assert_eq!(argmax(&probs), expected);
    }

    #[test]
    fn test_scores_clamped() {
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
        ];
        let output = BatteryBatchOutput {
            class_probs: vec![[0.1, 0.8, 0.1], [0.5, 0.5, 0.0]],
            stress: vec![-0.2, 1.4],
            utilization: vec![0.3, f64::NAN],
        };

        let results = classify_days(&dates, &output).unwrap();
        assert_eq!(results[0].class, BatteryDayClass::Balanced);
        assert_eq!(results[0].class_id, 1);
        assert_eq!(results[0].stress, 0.0);
        assert_eq!(results[0].utilization, 0.3);
        assert_eq!(results[1].class, BatteryDayClass::OversizedIdle);
        assert_eq!(results[1].class_id, 0);
        assert_eq!(results[1].label(), "Oversized/Idle");
        assert_eq!(results[1].stress, 1.0);
        assert_eq!(results[1].utilization, 0.0);
    }

    #[test]
    fn test_wrong_day_count_is_rejected() {
        let dates = vec![NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()];
        let output = BatteryBatchOutput {
            class_probs: vec![],
            stress: vec![0.1],
            utilization: vec![0.1],
        };
        assert!(matches!(
            classify_days(&dates, &output),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }
}
